// vim: tw=80
//! Provisioning the test pool, and the guards that tear it down again.
//!
//! Each resource that needs cleanup is owned by a guard that releases it on
//! Drop.  Declare guards in acquisition order and Rust will release them in
//! reverse.

use std::path::{Path, PathBuf};

use crate::{
    command::{argv, Runner},
    property::Property,
    Result,
};

/// Properties set on the root dataset of every test pool
pub fn default_pool_properties() -> Vec<Property> {
    vec![
        Property::Atime(false),
        Property::Compression("lz4".to_owned()),
        Property::mountpoint("none"),
    ]
}

/// Allocate a zero-filled backing file of `size_mb` megabytes.
pub fn create_backing_file<R: Runner>(
    runner: &R,
    path: &Path,
    size_mb: u64,
) -> Result<()> {
    let args = argv([
        "if=/dev/zero".to_owned(),
        format!("of={}", path.display()),
        "bs=1M".to_owned(),
        format!("count={size_mb}"),
    ]);
    runner.run("dd", &args)?;
    tracing::info!(path = %path.display(), size_mb, "created backing file");
    Ok(())
}

/// A loop(4) device bound to a backing file.  Detached on Drop.
#[derive(Debug)]
pub struct LoopDevice<'a, R: Runner> {
    runner: &'a R,
    path:   PathBuf,
}

impl<'a, R: Runner> LoopDevice<'a, R> {
    pub fn attach(runner: &'a R, dev: &Path, file: &Path) -> Result<Self> {
        let args = argv([dev.to_string_lossy(), file.to_string_lossy()]);
        runner.run("losetup", &args)?;
        tracing::info!(dev = %dev.display(), file = %file.display(), "attached");
        Ok(LoopDevice {
            runner,
            path: dev.to_owned(),
        })
    }

    pub fn as_path(&self) -> &Path {
        self.path.as_path()
    }
}

impl<R: Runner> Drop for LoopDevice<'_, R> {
    fn drop(&mut self) {
        let args = argv(["-d".into(), self.path.to_string_lossy()]);
        match self.runner.run("losetup", &args) {
            Ok(_) => tracing::info!(dev = %self.path.display(), "detached"),
            Err(e) => tracing::error!(
                dev = %self.path.display(),
                error = %e,
                "failed to detach loop device"
            ),
        }
    }
}

/// Create a pool named `name` on a single vdev.
pub fn create_pool<R: Runner>(
    runner: &R,
    name: &str,
    vdev: &Path,
    props: &[Property],
) -> Result<()> {
    let mut args = argv(["create"]);
    for prop in props {
        args.push("-O".to_owned());
        args.push(prop.to_string());
    }
    args.push(name.to_owned());
    args.push(vdev.to_string_lossy().into_owned());
    runner.run("zpool", &args)?;
    tracing::info!(pool = name, vdev = %vdev.display(), "created pool");
    Ok(())
}

/// A mounted dataset.  Unmounted on Drop.
#[derive(Debug)]
pub struct Mount<'a, R: Runner> {
    runner:     &'a R,
    dataset:    String,
    mountpoint: PathBuf,
}

impl<'a, R: Runner> Mount<'a, R> {
    /// Create the dataset `<pool>/<name>`, mounted at `mountpoint`.
    pub fn create(
        runner: &'a R,
        pool: &str,
        name: &str,
        mountpoint: &Path,
        recordsize: &Property,
    ) -> Result<Self> {
        let dataset = format!("{pool}/{name}");
        let mp = Property::mountpoint(mountpoint.to_string_lossy());
        let args = argv([
            "create".to_owned(),
            "-o".to_owned(),
            mp.to_string(),
            "-o".to_owned(),
            recordsize.to_string(),
            dataset.clone(),
        ]);
        runner.run("zfs", &args)?;
        tracing::info!(%dataset, mountpoint = %mountpoint.display(), "mounted");
        Ok(Mount {
            runner,
            dataset,
            mountpoint: mountpoint.to_owned(),
        })
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }
}

impl<R: Runner> Drop for Mount<'_, R> {
    fn drop(&mut self) {
        let args = argv(["umount", self.dataset.as_str()]);
        match self.runner.run("zfs", &args) {
            Ok(_) => tracing::info!(dataset = %self.dataset, "unmounted"),
            Err(e) => tracing::error!(
                dataset = %self.dataset,
                error = %e,
                "failed to unmount"
            ),
        }
    }
}

// LCOV_EXCL_STOP
