use std::{
    env,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{exit, Command, ExitStatus},
};

use clap::{crate_version, Parser};
use nix::sys::signal::{signal, SigHandler, Signal};
use tracing_subscriber::EnvFilter;
use zfstester_core::{
    command::SystemRunner,
    config::{Config, LoopSelection, DEFAULT_POOL_SIZE_MB, MIN_POOL_SIZE_MB},
    exhaust::EntryKind,
    property::{Property, DEFAULT_RECORDSIZE},
    tester::Tester,
    Result,
};

fn parse_recordsize(s: &str) -> std::result::Result<u64, String> {
    let prop = format!("recordsize={s}")
        .parse::<Property>()
        .map_err(|e| e.to_string())?;
    prop.as_bytes().ok_or_else(|| format!("invalid record size {s}"))
}

/// Fill a throwaway ZFS pool with empty entries until it runs out of space,
/// then report where the space went.
#[derive(Parser, Clone, Debug)]
#[clap(version = crate_version!())]
struct Cli {
    /// Existing directory that will hold the backing file
    #[clap(required(true))]
    destination:   PathBuf,
    /// Bind the backing file to this loop device
    #[clap(long = "loop", value_name = "DEV", conflicts_with = "loopback")]
    loop_dev:      Option<PathBuf>,
    /// Bind the backing file to the first free loop device
    #[clap(long)]
    loopback:      bool,
    /// Size of the pool in MB
    #[clap(
        long,
        default_value_t = DEFAULT_POOL_SIZE_MB,
        value_parser = clap::value_parser!(u64).range(MIN_POOL_SIZE_MB..)
    )]
    zpool_size_mb: u64,
    /// Dataset record size in bytes, a power of two from 512 to 131072
    #[clap(long, default_value_t = DEFAULT_RECORDSIZE, value_parser = parse_recordsize)]
    recordsize:    u64,
    /// Stop after creating this many entries
    #[clap(long)]
    record_count:  Option<u64>,
    /// Kind of entry to create: dir, file, or symlink
    #[clap(long, default_value = "dir")]
    entry_type:    EntryKind,
    /// Pool name.  Defaults to test_pool_<timestamp>
    #[clap(long)]
    pool_name:     Option<String>,
    /// Dataset mountpoint.  Defaults to /<pool name>/spacetest
    #[clap(long)]
    mountpoint:    Option<PathBuf>,
    /// Print intermediate values
    #[clap(short, long)]
    verbose:       bool,
    /// Open a shell in the run directory before tearing down
    #[clap(long, alias = "ipython")]
    shell:         bool,
}

impl Cli {
    fn config(&self) -> Config {
        let sel = if let Some(dev) = &self.loop_dev {
            LoopSelection::Device(dev.clone())
        } else if self.loopback {
            LoopSelection::Auto
        } else {
            LoopSelection::None
        };
        let mut config = Config::new(&self.destination);
        config
            .loop_device(sel)
            .pool_size_mb(self.zpool_size_mb)
            .recordsize(self.recordsize)
            .record_count(self.record_count)
            .entry_kind(self.entry_type);
        if let Some(name) = &self.pool_name {
            config.pool_name(name.as_str());
        }
        if let Some(mp) = &self.mountpoint {
            config.mountpoint(mp);
        }
        config
    }
}

/// Signals from the terminal that would kill us before the guards can run.
const INTERRUPTS: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

/// Ignores terminal interrupts until dropped, then restores the old handlers.
struct IgnoreInterrupts {
    saved: Vec<(Signal, SigHandler)>,
}

impl IgnoreInterrupts {
    fn new() -> Result<Self> {
        let mut guard = IgnoreInterrupts { saved: Vec::new() };
        for sig in INTERRUPTS {
            // SAFETY: SigIgn installs no Rust code as a handler.
            let old = unsafe { signal(sig, SigHandler::SigIgn) }?;
            guard.saved.push((sig, old));
        }
        Ok(guard)
    }
}

impl Drop for IgnoreInterrupts {
    fn drop(&mut self) {
        for (sig, old) in self.saved.drain(..) {
            // SAFETY: restores a handler that was installed before.
            if let Err(e) = unsafe { signal(sig, old) } {
                tracing::error!(?sig, error = %e, "failed to restore handler");
            }
        }
    }
}

/// Run an interactive child to completion.  While it runs, Ctrl-C belongs to
/// the child alone, so the pool is still torn down when it exits.
fn run_interactive(mut cmd: Command) -> Result<ExitStatus> {
    // SAFETY: signal(2) is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| {
            for sig in INTERRUPTS {
                signal(sig, SigHandler::SigDfl)?;
            }
            Ok(())
        });
    }
    let _guard = IgnoreInterrupts::new()?;
    Ok(cmd.status()?)
}

/// Let the user poke around the pool before it goes away.
fn spawn_shell(dir: &Path) -> Result<()> {
    let shell = env::var_os("SHELL").unwrap_or_else(|| "/bin/sh".into());
    eprintln!("Entering {}.  Exit the shell to tear down.", dir.display());
    let mut cmd = Command::new(shell);
    cmd.current_dir(dir);
    let status = run_interactive(cmd)?;
    if !status.success() {
        tracing::warn!(%status, "shell exited abnormally");
    }
    Ok(())
}

fn main() {
    let cli: Cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let tester = Tester::new(cli.config(), SystemRunner);
    let r = if cli.shell {
        tester.run_with(spawn_shell)
    } else {
        tester.run()
    };
    match r {
        Ok(report) => println!("{report}"),
        Err(e) => {
            eprintln!("Error: {e}");
            exit(1);
        }
    }
}
