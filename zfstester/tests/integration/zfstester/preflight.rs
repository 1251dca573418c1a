//! Failures that must happen before anything is created
use std::fs;

use assert_cmd::prelude::*;
use function_name::named;
use nix::unistd::Uid;
use predicates::prelude::*;
use rstest::{fixture, rstest};
use tempfile::{Builder, TempDir};

use crate::{require_root, zfstester};

/// An empty destination directory
#[fixture]
fn harness() -> TempDir {
    Builder::new()
        .prefix(concat!(module_path!(), "."))
        .tempdir()
        .unwrap()
}

fn assert_untouched(tempdir: &TempDir) {
    assert_eq!(fs::read_dir(tempdir.path()).unwrap().count(), 0);
}

#[test]
fn help() {
    zfstester().arg("-h").assert().success();
}

#[test]
fn version() {
    zfstester()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("zfstester"));
}

#[test]
fn destination_missing() {
    zfstester()
        .arg("/tmp/does_not_exist_6c1f0ad1a3d44b5c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

/// The destination must be a directory, not a file
#[rstest]
fn destination_is_file(harness: TempDir) {
    let path = harness.path().join("file");
    fs::File::create(&path).unwrap();
    zfstester()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[rstest]
#[case("63")]
#[case("1")]
fn pool_too_small(harness: TempDir, #[case] size: &str) {
    zfstester()
        .args(["--zpool-size-mb", size])
        .arg(harness.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("zpool-size-mb"));
    assert_untouched(&harness);
}

#[rstest]
fn recordsize_invalid(harness: TempDir) {
    zfstester()
        .args(["--recordsize", "1000"])
        .arg(harness.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("power of two"));
    assert_untouched(&harness);
}

#[rstest]
fn not_root(harness: TempDir) {
    if Uid::effective().is_root() {
        return;
    }
    zfstester()
        .arg(harness.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("must be run as root"));
    assert_untouched(&harness);
}

/// /dev/null is a character device, not a block device
#[named]
#[rstest]
fn loop_not_block_special(harness: TempDir) {
    require_root!();

    zfstester()
        .args(["--loop", "/dev/null"])
        .arg(harness.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not block special"));
    assert_untouched(&harness);
}
