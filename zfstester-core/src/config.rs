// vim: tw=80
//! Run configuration

use std::path::{Path, PathBuf};

use crate::{
    exhaust::EntryKind,
    property::{Property, DEFAULT_RECORDSIZE},
    Error,
    Result,
};

/// Smallest pool that `zpool create` will accept, in MB.
pub const MIN_POOL_SIZE_MB: u64 = 64;
pub const DEFAULT_POOL_SIZE_MB: u64 = MIN_POOL_SIZE_MB;
/// Name of the dataset created inside the test pool
pub const DATASET_NAME: &str = "spacetest";

/// How the backing file is presented to `zpool create`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum LoopSelection {
    /// Build the pool directly on the backing file.
    #[default]
    None,
    /// Attach the backing file to this loop device.
    Device(PathBuf),
    /// Attach the backing file to the first free loop device.
    Auto,
}

/// Everything needed to perform one run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Existing directory that will host the backing file
    pub destination:  PathBuf,
    pub loop_device:  LoopSelection,
    pub pool_size_mb: u64,
    /// Dataset record size in bytes
    pub recordsize:   u64,
    /// Stop after creating this many entries, even if space remains
    pub record_count: Option<u64>,
    pub entry_kind:   EntryKind,
    /// Defaults to `test_pool_<run id>`
    pub pool_name:    Option<String>,
    /// Defaults to `/<pool name>/spacetest`
    pub mountpoint:   Option<PathBuf>,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(destination: P) -> Self {
        Config {
            destination:  destination.into(),
            loop_device:  LoopSelection::default(),
            pool_size_mb: DEFAULT_POOL_SIZE_MB,
            recordsize:   DEFAULT_RECORDSIZE,
            record_count: None,
            entry_kind:   EntryKind::default(),
            pool_name:    None,
            mountpoint:   None,
        }
    }

    pub fn entry_kind(&mut self, kind: EntryKind) -> &mut Self {
        self.entry_kind = kind;
        self
    }

    pub fn loop_device(&mut self, sel: LoopSelection) -> &mut Self {
        self.loop_device = sel;
        self
    }

    pub fn mountpoint<P: Into<PathBuf>>(&mut self, mp: P) -> &mut Self {
        self.mountpoint = Some(mp.into());
        self
    }

    pub fn pool_name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.pool_name = Some(name.into());
        self
    }

    pub fn pool_size_mb(&mut self, size: u64) -> &mut Self {
        self.pool_size_mb = size;
        self
    }

    pub fn record_count(&mut self, count: Option<u64>) -> &mut Self {
        self.record_count = count;
        self
    }

    pub fn recordsize(&mut self, bytes: u64) -> &mut Self {
        self.recordsize = bytes;
        self
    }

    /// Pool size in bytes
    pub fn pool_size(&self) -> u64 {
        self.pool_size_mb << 20
    }

    /// The record size as a dataset property
    pub fn recordsize_property(&self) -> Result<Property> {
        Property::record_size(self.recordsize)
    }

    /// Name of the pool for the run identified by `run_id`
    pub fn pool_name_for(&self, run_id: &str) -> String {
        self.pool_name
            .clone()
            .unwrap_or_else(|| format!("test_pool_{run_id}"))
    }

    /// Mountpoint of the test dataset in pool `pool`
    pub fn mountpoint_for(&self, pool: &str) -> PathBuf {
        self.mountpoint
            .clone()
            .unwrap_or_else(|| Path::new("/").join(pool).join(DATASET_NAME))
    }

    /// Check everything that can be checked without touching the system.
    pub fn validate(&self) -> Result<()> {
        if !self.destination.is_dir() {
            return Err(Error::NotADirectory(self.destination.clone()));
        }
        if self.pool_size_mb < MIN_POOL_SIZE_MB {
            return Err(Error::PoolTooSmall {
                size_mb: self.pool_size_mb,
                min_mb:  MIN_POOL_SIZE_MB,
            });
        }
        self.recordsize_property()?;
        if let Some(name) = &self.pool_name {
            if name.is_empty() || name.contains('/') {
                return Err(Error::InvalidProperty(format!("pool={name}")));
            }
        }
        Ok(())
    }
}

// LCOV_EXCL_STOP
