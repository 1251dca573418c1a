// vim: tw=80
//! Common type definitions used throughout zfstester

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// zfstester's error type.
///
/// Running out of space while filling the pool is not an error.  That outcome
/// is reported through [`crate::exhaust::Termination`] instead.
#[derive(Debug, Error)]
pub enum Error {
    // Preconditions.  None of these are raised after the first mutation.
    #[error("must be run as root")]
    NotRoot,
    #[error("loop device path {} is not block special", .0.display())]
    NotBlockSpecial(PathBuf),
    #[error("loop device {} already in use", .0.display())]
    LoopInUse(PathBuf),
    #[error("no free loop device available")]
    NoFreeLoop,
    #[error("zpool size {size_mb} MB is below the minimum of {min_mb} MB")]
    PoolTooSmall { size_mb: u64, min_mb: u64 },
    #[error(
        "invalid record size {0}: must be a power of two from 512 to 131072"
    )]
    InvalidRecordSize(u64),
    #[error("invalid property specification {0}")]
    InvalidProperty(String),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not empty", .0.display())]
    NotEmpty(PathBuf),

    // Failures of the external tools
    #[error("{program} failed with {status}: {stderr}")]
    Command {
        program: String,
        status:  ExitStatus,
        stderr:  String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// LCOV_EXCL_STOP
