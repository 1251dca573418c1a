// vim: tw=80
//! Running external commands
//!
//! Every interaction with the system's storage stack goes through a
//! [`Runner`], so the stages can be tested without root or ZFS.

use std::process::Command;

#[cfg(test)] use mockall::automock;

use crate::{Error, Result};

/// Something that can run an external program to completion.
#[cfg_attr(test, automock)]
pub trait Runner {
    /// Run `program` with `args`, wait for it to exit, and return its
    /// standard output.
    ///
    /// A non-zero exit status is an [`Error::Command`].
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs commands on the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    #[tracing::instrument(skip(self))]
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let output = Command::new(program).args(args).output()?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            tracing::trace!(%stdout);
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Command {
                program: program.to_owned(),
                status:  output.status,
                stderr:  stderr.trim_end().to_owned(),
            })
        }
    }
}

/// Build an argument vector from anything string-like.
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

// LCOV_EXCL_STOP
