//! Complete runs against a real pool.  These need root and ZFS.
use std::{
    fs,
    path::PathBuf,
    process::{id, Command},
};

use assert_cmd::prelude::*;
use function_name::named;
use predicates::prelude::*;
use regex::Regex;
use rstest::{fixture, rstest};
use tempfile::{Builder, TempDir};

use crate::{require_root, require_zfs, zfstester};

/// A destination and a mountpoint parent.  The pool a run leaves imported is
/// destroyed when the harness drops.
struct Harness {
    dest:       TempDir,
    mountpoint: TempDir,
    pool:       Option<String>,
}

impl Harness {
    /// A pool name that won't collide with concurrently running tests
    fn pool_name(&mut self, test: &str) -> String {
        let name = format!("zfstester_{}_{}", test, id());
        self.pool = Some(name.clone());
        name
    }

    fn mountpoint(&self) -> PathBuf {
        self.mountpoint.path().join("spacetest")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let _ = Command::new("zpool")
                .args(["destroy", "-f", pool.as_str()])
                .status();
        }
    }
}

#[fixture]
fn harness() -> Harness {
    let dest = Builder::new()
        .prefix(concat!(module_path!(), ".dest."))
        .tempdir()
        .unwrap();
    let mountpoint = Builder::new()
        .prefix(concat!(module_path!(), ".mnt."))
        .tempdir()
        .unwrap();
    Harness {
        dest,
        mountpoint,
        pool: None,
    }
}

fn objects_created(stdout: &[u8]) -> u64 {
    let re = Regex::new(r"(?m)^objects created: (\d+)$").unwrap();
    let stdout = String::from_utf8_lossy(stdout);
    re.captures(&stdout).unwrap()[1].parse().unwrap()
}

/// Stop early, well before the pool fills.
#[named]
#[rstest]
fn record_count(mut harness: Harness) {
    require_root!();
    require_zfs!();

    let pool = harness.pool_name(function_name!());
    zfstester()
        .args(["--record-count", "100", "--pool-name", pool.as_str()])
        .arg("--mountpoint")
        .arg(harness.mountpoint())
        .arg(harness.dest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("objects created: 100\n"))
        .stdout(predicate::str::contains("stopped: record count reached"));

    // Only the timestamped run directory, holding the backing file and copies
    let run_dirs = fs::read_dir(harness.dest.path()).unwrap().count();
    assert_eq!(run_dirs, 1);
}

/// Fill a minimal pool until it refuses more entries.
#[named]
#[rstest]
fn exhaust(mut harness: Harness) {
    require_root!();
    require_zfs!();

    let pool = harness.pool_name(function_name!());
    let output = zfstester()
        .args(["--zpool-size-mb", "64", "--pool-name", pool.as_str()])
        .arg("--mountpoint")
        .arg(harness.mountpoint())
        .arg(harness.dest.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let n = objects_created(&output.stdout);
    assert!((10_000..=200_000).contains(&n), "created {n} objects");
}
