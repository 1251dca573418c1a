// vim: tw=80
//! Checks performed before anything on the system is modified

use std::path::{Path, PathBuf};

use nix::{
    sys::stat::{stat, SFlag},
    unistd::Uid,
};

use crate::{
    command::{argv, Runner},
    config::{Config, LoopSelection},
    Error,
    Result,
};

/// Creating pools and attaching loop devices requires root.
pub fn require_root() -> Result<()> {
    if Uid::effective().is_root() {
        Ok(())
    } else {
        Err(Error::NotRoot)
    }
}

pub fn check_block_special(path: &Path) -> Result<()> {
    let st = stat(path)?;
    let fmt = SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT;
    if fmt == SFlag::S_IFBLK {
        Ok(())
    } else {
        Err(Error::NotBlockSpecial(path.to_owned()))
    }
}

/// Is `dev` mentioned anywhere in the output of `losetup -l`?
// A plain substring match, so /dev/loop1 is considered busy whenever
// /dev/loop10 is.  That errs on the side of refusing.
pub fn loop_in_use(dev: &Path, listing: &str) -> bool {
    listing.contains(&*dev.to_string_lossy())
}

pub fn check_loop_unused<R: Runner>(runner: &R, dev: &Path) -> Result<()> {
    let listing = runner.run("losetup", &argv(["-l"]))?;
    tracing::debug!(%listing, "loop devices in use");
    if loop_in_use(dev, &listing) {
        Err(Error::LoopInUse(dev.to_owned()))
    } else {
        Ok(())
    }
}

/// Ask `losetup` for the first unused loop device.
pub fn find_free_loop<R: Runner>(runner: &R) -> Result<PathBuf> {
    let out = runner.run("losetup", &argv(["-f"]))?;
    let dev = out.trim();
    if dev.is_empty() {
        Err(Error::NoFreeLoop)
    } else {
        Ok(PathBuf::from(dev))
    }
}

/// Validate the configuration and the loop device, in that order.
///
/// Returns the loop device to use, if any.
pub fn preflight<R: Runner>(
    runner: &R,
    config: &Config,
) -> Result<Option<PathBuf>> {
    config.validate()?;
    require_root()?;
    let dev = match &config.loop_device {
        LoopSelection::None => return Ok(None),
        LoopSelection::Device(dev) => dev.clone(),
        LoopSelection::Auto => find_free_loop(runner)?,
    };
    check_block_special(&dev)?;
    check_loop_unused(runner, &dev)?;
    tracing::info!(dev = %dev.display(), "loop device is available");
    Ok(Some(dev))
}

// LCOV_EXCL_START
#[cfg(test)]
mod t {
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::command::MockRunner;

    const LISTING: &str = "\
NAME       SIZELIMIT OFFSET AUTOCLEAR RO BACK-FILE                  DIO LOG-SEC
/dev/loop0         0      0         1  1 /var/lib/snapd/core.snap     0     512
/dev/loop12        0      0         0  0 /tmp/1.5/test_pool_1.5       0     512
";

    #[test]
    fn block_special_dev_null() {
        // /dev/null is a character device
        let e = check_block_special(Path::new("/dev/null")).unwrap_err();
        assert!(matches!(e, Error::NotBlockSpecial(_)));
    }

    #[test]
    fn block_special_enoent() {
        let e = check_block_special(Path::new("/dev/zfstester-nonexistent"))
            .unwrap_err();
        assert!(matches!(e, Error::Nix(nix::errno::Errno::ENOENT)));
    }

    #[test]
    fn block_special_regular_file() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("backing");
        std::fs::File::create(&path).unwrap();
        let e = check_block_special(&path).unwrap_err();
        assert!(matches!(e, Error::NotBlockSpecial(p) if p == path));
    }

    #[test]
    fn free_loop() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .with(eq("losetup"), function(|a: &[String]| a == ["-f"]))
            .times(1)
            .returning(|_, _| Ok("/dev/loop3\n".to_owned()));
        assert_eq!(find_free_loop(&runner).unwrap(), Path::new("/dev/loop3"));
    }

    #[test]
    fn free_loop_none() {
        let mut runner = MockRunner::new();
        runner.expect_run().returning(|_, _| Ok("\n".to_owned()));
        assert!(matches!(find_free_loop(&runner), Err(Error::NoFreeLoop)));
    }

    #[test]
    fn in_use() {
        assert!(loop_in_use(Path::new("/dev/loop0"), LISTING));
        assert!(loop_in_use(Path::new("/dev/loop12"), LISTING));
        assert!(!loop_in_use(Path::new("/dev/loop7"), LISTING));
        assert!(!loop_in_use(Path::new("/dev/loop7"), ""));
    }

    /// The match is by substring, so a prefix of a busy device is busy too
    #[test]
    fn in_use_prefix() {
        assert!(loop_in_use(Path::new("/dev/loop1"), LISTING));
    }

    #[test]
    fn unused() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .with(eq("losetup"), function(|a: &[String]| a == ["-l"]))
            .times(2)
            .returning(|_, _| Ok(LISTING.to_owned()));
        check_loop_unused(&runner, Path::new("/dev/loop7")).unwrap();
        let e = check_loop_unused(&runner, Path::new("/dev/loop0"))
            .unwrap_err();
        assert!(matches!(e, Error::LoopInUse(_)));
    }

    /// Configuration errors are reported before privileges are checked, and
    /// without running any commands.
    #[test]
    fn preflight_pool_too_small() {
        let tempdir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let mut config = Config::new(tempdir.path());
        config.pool_size_mb(63);
        let e = preflight(&runner, &config).unwrap_err();
        assert!(matches!(e, Error::PoolTooSmall { size_mb: 63, .. }));
        assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn preflight_not_root() {
        if Uid::effective().is_root() {
            return;
        }
        let tempdir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let config = Config::new(tempdir.path());
        assert!(matches!(preflight(&runner, &config), Err(Error::NotRoot)));
    }
}
// LCOV_EXCL_STOP
