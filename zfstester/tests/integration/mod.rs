mod util;
mod zfstester;

pub use util::*;
