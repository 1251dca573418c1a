// vim: tw=80
//! Provision a throwaway ZFS pool, fill it with empty entries until it runs
//! out of space, and account for where the space went.
//!
//! Everything except the exhaustion loop is a thin layer over external tools.
//! The stages are driven by [`tester::Tester`].

pub mod accounting;
pub mod command;
pub mod config;
pub mod exhaust;
pub mod pool;
pub mod preflight;
pub mod property;
pub mod tester;
pub mod types;

pub use crate::types::*;
