// vim: tw=80
//! Drives a complete run: preflight, provisioning, exhaustion, accounting and
//! teardown.

use std::{
    fs,
    path::{self, Path, PathBuf},
};

use time::OffsetDateTime;

use crate::{
    accounting::{self, Report},
    command::Runner,
    config::{Config, DATASET_NAME},
    exhaust::{run_id, timestamped_dir, ExhaustionRun, FsEntryMaker},
    pool::{self, LoopDevice, Mount},
    preflight::preflight,
    Result,
};

pub struct Tester<R: Runner> {
    config: Config,
    runner: R,
}

impl<R: Runner> Tester<R> {
    pub fn new(config: Config, runner: R) -> Self {
        Tester { config, runner }
    }

    /// Perform a complete run.
    pub fn run(&self) -> Result<Report> {
        self.run_with(|_| Ok(()))
    }

    /// Perform a complete run, calling `inspect` with the run directory after
    /// accounting but before teardown.
    pub fn run_with<F>(&self, inspect: F) -> Result<Report>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let loop_dev = preflight(&self.runner, &self.config)?;
        self.execute(loop_dev.as_deref(), OffsetDateTime::now_utc(), inspect)
    }

    /// Everything after preflight.  Nothing here checks privileges.
    pub(crate) fn execute<F>(
        &self,
        loop_dev: Option<&Path>,
        start: OffsetDateTime,
        inspect: F,
    ) -> Result<Report>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let config = &self.config;
        let id = run_id(start);
        let pool_name = config.pool_name_for(&id);
        tracing::info!(run = %id, pool = %pool_name, "starting");

        // zpool and zfs both reject relative vdev and mountpoint paths
        let destination = fs::canonicalize(&config.destination)?;
        let mountpoint = path::absolute(config.mountpoint_for(&pool_name))?;

        let run_dir = timestamped_dir(&destination, start)?;
        let backing = run_dir.join(format!("test_pool_{id}"));
        pool::create_backing_file(&self.runner, &backing, config.pool_size_mb)?;

        // Guards are released in reverse order: unmount, then detach.
        let loop_guard = loop_dev
            .map(|dev| LoopDevice::attach(&self.runner, dev, &backing))
            .transpose()?;
        let vdev = loop_guard
            .as_ref()
            .map_or(backing.as_path(), LoopDevice::as_path);
        pool::create_pool(
            &self.runner,
            &pool_name,
            vdev,
            &pool::default_pool_properties(),
        )?;
        let mount = Mount::create(
            &self.runner,
            &pool_name,
            DATASET_NAME,
            &mountpoint,
            &config.recordsize_property()?,
        )?;
        for l in accounting::df_space(&self.runner, &pool_name)? {
            tracing::debug!("{l}");
        }

        let target = timestamped_dir(mount.mountpoint(), start)?;
        let mut maker = FsEntryMaker::new(config.entry_kind);
        let outcome =
            ExhaustionRun::new(target)?.run(&mut maker, config.record_count);
        tracing::info!(
            objects = outcome.objects_created,
            bytes = outcome.bytes_in_names,
            "finished filling"
        );

        let df_space = accounting::df_space(&self.runner, &pool_name)?;
        let df_inodes = accounting::df_inodes(&self.runner, &pool_name)?;
        let properties = accounting::properties(&self.runner, &pool_name)?;
        let compressed_size = accounting::compressed_size(
            &self.runner,
            &backing,
            &with_suffix(&backing, "rz"),
        )?;
        let sparse_copy_size = accounting::sparse_copy(
            &self.runner,
            &backing,
            &with_suffix(&backing, "sparse"),
        )?;

        inspect(&run_dir)?;

        Ok(Report {
            pool: pool_name,
            pool_size_mb: config.pool_size_mb,
            recordsize: config.recordsize,
            outcome,
            df_space,
            df_inodes,
            properties,
            compressed_size,
            compression_ratio: accounting::compression_ratio(
                compressed_size,
                config.pool_size_mb,
            ),
            sparse_copy_size,
        })
    }
}

/// `path` with `.suffix` appended to its file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

// LCOV_EXCL_STOP
