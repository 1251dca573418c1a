// vim: tw=80
//! Fill a directory with empty entries until the file system refuses.
//!
//! Running out of space is the whole point of a run, so a failed creation is
//! not an error here.  It ends the loop and is returned as
//! [`Termination::Exhausted`].  Any failure counts, not just `ENOSPC`:
//! permission errors or overlong paths stop the loop in exactly the same way.

use std::{
    fmt,
    fs,
    io,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
    str::FromStr,
};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};

/// Length of every generated name: a 128-bit identifier in hex.
pub const NAME_LEN: usize = 32;

/// Report progress this often, in objects created.
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Target of the dangling symlinks created by [`EntryKind::Symlink`].
pub const SYMLINK_TARGET: &str = "None";

/// What kind of entry to create
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EntryKind {
    /// Empty directories
    #[default]
    Directory,
    /// Empty regular files
    File,
    /// Dangling symlinks, all pointing at [`SYMLINK_TARGET`]
    Symlink,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => "dir".fmt(f),
            EntryKind::File => "file".fmt(f),
            EntryKind::Symlink => "symlink".fmt(f),
        }
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dir" | "directory" => Ok(EntryKind::Directory),
            "file" => Ok(EntryKind::File),
            "symlink" => Ok(EntryKind::Symlink),
            _ => Err(Error::InvalidProperty(format!("entry-type={s}"))),
        }
    }
}

/// Result of a single attempt to create an entry.
#[derive(Debug)]
pub enum Creation {
    Created,
    /// The file system refused.  This is the expected way for a run to end.
    Exhausted(io::Error),
}

impl From<io::Result<()>> for Creation {
    fn from(r: io::Result<()>) -> Self {
        match r {
            Ok(()) => Creation::Created,
            Err(e) => Creation::Exhausted(e),
        }
    }
}

/// Creates one entry at a time.
pub trait EntryMaker {
    fn make(&mut self, path: &Path) -> Creation;
}

/// Creates real entries on the file system
#[derive(Clone, Copy, Debug, Default)]
pub struct FsEntryMaker {
    kind: EntryKind,
}

impl FsEntryMaker {
    pub fn new(kind: EntryKind) -> Self {
        FsEntryMaker { kind }
    }
}

impl EntryMaker for FsEntryMaker {
    fn make(&mut self, path: &Path) -> Creation {
        match self.kind {
            EntryKind::Directory => fs::create_dir(path).into(),
            EntryKind::File => fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map(drop)
                .into(),
            EntryKind::Symlink => symlink(SYMLINK_TARGET, path).into(),
        }
    }
}

/// Generate a fresh name for an entry.
pub fn entry_name() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Identify a run by its start time, as seconds and microseconds.
pub fn run_id(when: OffsetDateTime) -> String {
    format!("{}.{:06}", when.unix_timestamp(), when.microsecond())
}

/// Create a directory under `parent` named after `when`.
pub fn timestamped_dir(parent: &Path, when: OffsetDateTime) -> Result<PathBuf> {
    let dir = parent.join(run_id(when));
    fs::create_dir(&dir)?;
    tracing::debug!(dir = %dir.display(), "created run directory");
    Ok(dir)
}

/// Why did the loop stop?
#[derive(Debug)]
pub enum Termination {
    /// The requested number of entries was created.
    Limit,
    /// The file system refused to create another entry.
    Exhausted(io::Error),
}

/// The frozen counters of a finished run.
#[derive(Debug)]
pub struct Outcome {
    pub root:            PathBuf,
    pub start_time:      OffsetDateTime,
    pub objects_created: u64,
    pub bytes_in_names:  u64,
    pub termination:     Termination,
}

impl Outcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.termination, Termination::Exhausted(_))
    }
}

/// A single pass of the exhaustion loop over one directory.
#[derive(Debug)]
pub struct ExhaustionRun {
    root:            PathBuf,
    start_time:      OffsetDateTime,
    objects_created: u64,
    bytes_in_names:  u64,
}

impl ExhaustionRun {
    /// Prepare to fill `root`, which must be an existing, empty directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !fs::metadata(&root)?.is_dir() {
            return Err(Error::NotADirectory(root));
        }
        if fs::read_dir(&root)?.next().is_some() {
            return Err(Error::NotEmpty(root));
        }
        Ok(ExhaustionRun {
            root,
            start_time: OffsetDateTime::now_utc(),
            objects_created: 0,
            bytes_in_names: 0,
        })
    }

    /// Create entries until `max_count` is reached or `maker` fails.
    ///
    /// Entries already created are left in place.
    pub fn run<M>(mut self, maker: &mut M, max_count: Option<u64>) -> Outcome
    where
        M: EntryMaker,
    {
        tracing::info!(root = %self.root.display(), ?max_count, "filling");
        let termination = loop {
            if max_count.is_some_and(|max| self.objects_created >= max) {
                break Termination::Limit;
            }
            let name = entry_name();
            match maker.make(&self.root.join(&name)) {
                Creation::Created => {
                    self.objects_created += 1;
                    self.bytes_in_names += name.len() as u64;
                    if self.objects_created % PROGRESS_INTERVAL == 0 {
                        tracing::debug!(
                            objects = self.objects_created,
                            bytes = self.bytes_in_names,
                            "progress"
                        );
                    }
                }
                Creation::Exhausted(e) => {
                    tracing::warn!(
                        objects = self.objects_created,
                        error = %e,
                        "entry creation failed; stopping"
                    );
                    break Termination::Exhausted(e);
                }
            }
        };
        Outcome {
            root: self.root,
            start_time: self.start_time,
            objects_created: self.objects_created,
            bytes_in_names: self.bytes_in_names,
            termination,
        }
    }
}

// LCOV_EXCL_STOP
