use std::process::Command;

use assert_cmd::prelude::*;

pub fn zfstester() -> Command {
    Command::cargo_bin("zfstester").unwrap()
}

/// Are the ZFS userland tools installed and the kernel module loaded?
pub fn have_zfs() -> bool {
    Command::new("zpool")
        .arg("list")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Skip a test.
// Copied from nix.  Sure would be nice if the test harness knew about "skipped"
// tests as opposed to "passed" or "failed".
#[macro_export]
macro_rules! skip {
    ($($reason: expr),+) => {
        use ::std::io::{self, Write};

        let stderr = io::stderr();
        let mut handle = stderr.lock();
        writeln!(handle, $($reason),+).unwrap();
        return;
    }
}

/// Skip the test unless running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !::nix::unistd::Uid::effective().is_root() {
            $crate::skip!(
                "{} requires root privileges.  Skipping test.",
                concat!(::std::module_path!(), "::", function_name!())
            );
        }
    };
}

/// Skip the test unless ZFS is usable.
#[macro_export]
macro_rules! require_zfs {
    () => {
        if !$crate::have_zfs() {
            $crate::skip!(
                "{} requires ZFS.  Skipping test.",
                concat!(::std::module_path!(), "::", function_name!())
            );
        }
    };
}
