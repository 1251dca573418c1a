// vim: tw=80
//! Where did the space go?
//!
//! After a run, gather the file system's own view of the pool and a few
//! derived numbers.  The derivations are pure functions so they can be checked
//! against fixed inputs.

use std::{
    fmt,
    fs,
    os::unix::fs::MetadataExt,
    path::Path,
};

use crate::{
    command::{argv, Runner},
    exhaust::{Outcome, Termination},
    Result,
};

/// `st_blocks` is always in units of this many bytes, whatever the file
/// system's block size.
pub const SECTOR_SIZE: u64 = 512;

/// Size of the compressed backing file relative to the pool, as a percentage
/// rounded to two places and suffixed with "x".
pub fn compression_ratio(compressed_bytes: u64, pool_size_mb: u64) -> String {
    let pool_bytes = pool_size_mb * 1024 * 1024;
    let ratio = compressed_bytes as f64 / pool_bytes as f64 * 100.0;
    // Always two places, so 100% prints as "100.00x", not "100.0x"
    format!("{ratio:.2}x")
}

/// Apparent space consumed by a sparse copy with `blocks` allocated sectors.
pub fn sparse_copy_size(blocks: u64) -> u64 {
    blocks * SECTOR_SIZE
}

/// Pool bytes per created object, the per-entry cost including overhead.
pub fn bytes_per_object(pool_size_mb: u64, objects: u64) -> Option<u64> {
    (pool_size_mb << 20).checked_div(objects)
}

/// The lines of a tool's tabular output that mention `needle`.
pub fn matching_lines(text: &str, needle: &str) -> Vec<String> {
    text.lines()
        .filter(|l| l.contains(needle))
        .map(str::to_owned)
        .collect()
}

/// Like [`matching_lines`], but keeps the header line as well.
fn table_excerpt(text: &str, needle: &str) -> Vec<String> {
    let mut lines = text.lines();
    let mut excerpt: Vec<String> =
        lines.next().map(str::to_owned).into_iter().collect();
    let rest = lines.collect::<Vec<_>>().join("\n");
    excerpt.extend(matching_lines(&rest, needle));
    excerpt
}

/// Free space table excerpt for `pool`, from `df -h`
pub fn df_space<R: Runner>(runner: &R, pool: &str) -> Result<Vec<String>> {
    let out = runner.run("df", &argv(["-h"]))?;
    Ok(table_excerpt(&out, pool))
}

/// Inode table excerpt for `pool`, from `df -i`
pub fn df_inodes<R: Runner>(runner: &R, pool: &str) -> Result<Vec<String>> {
    let out = runner.run("df", &argv(["-i"]))?;
    Ok(table_excerpt(&out, pool))
}

/// Every property of `pool` and its datasets, from `zfs get all`
pub fn properties<R: Runner>(runner: &R, pool: &str) -> Result<Vec<String>> {
    let out = runner.run("zfs", &argv(["get", "all", pool]))?;
    Ok(matching_lines(&out, pool))
}

/// Compress `file` into `out` with rzip, and return the compressed size.
pub fn compressed_size<R: Runner>(
    runner: &R,
    file: &Path,
    out: &Path,
) -> Result<u64> {
    runner.run("sync", &[])?;
    let args = argv([
        "-k".into(),
        "-o".into(),
        out.to_string_lossy(),
        file.to_string_lossy(),
    ]);
    runner.run("rzip", &args)?;
    let size = fs::metadata(out)?.len();
    tracing::debug!(out = %out.display(), size, "compressed");
    Ok(size)
}

/// Make a sparse copy of `file` at `out`, and return its allocated size.
pub fn sparse_copy<R: Runner>(
    runner: &R,
    file: &Path,
    out: &Path,
) -> Result<u64> {
    let args = argv([
        "--sparse=always".into(),
        file.to_string_lossy(),
        out.to_string_lossy(),
    ]);
    runner.run("cp", &args)?;
    let blocks = fs::metadata(out)?.blocks();
    tracing::debug!(out = %out.display(), blocks, "sparse copy");
    Ok(sparse_copy_size(blocks))
}

/// Everything printed at the end of a run
#[derive(Debug)]
pub struct Report {
    pub pool:              String,
    pub pool_size_mb:      u64,
    pub recordsize:        u64,
    pub outcome:           Outcome,
    pub df_space:          Vec<String>,
    pub df_inodes:         Vec<String>,
    pub properties:        Vec<String>,
    pub compressed_size:   u64,
    pub compression_ratio: String,
    pub sparse_copy_size:  u64,
}

impl Report {
    pub fn bytes_per_object(&self) -> Option<u64> {
        bytes_per_object(self.pool_size_mb, self.outcome.objects_created)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "zfs get all:")?;
        for l in self.properties.iter() {
            writeln!(f, "{l}")?;
        }
        writeln!(f)?;
        writeln!(f, "df -h:")?;
        for l in self.df_space.iter() {
            writeln!(f, "{l}")?;
        }
        writeln!(f)?;
        writeln!(f, "df -i:")?;
        for l in self.df_inodes.iter() {
            writeln!(f, "{l}")?;
        }
        writeln!(f)?;
        writeln!(f, "pool: {}", self.pool)?;
        writeln!(f, "pool size: {} MB", self.pool_size_mb)?;
        writeln!(f, "recordsize: {}", self.recordsize)?;
        writeln!(f, "root: {}", self.outcome.root.display())?;
        writeln!(f, "objects created: {}", self.outcome.objects_created)?;
        writeln!(f, "bytes in names: {}", self.outcome.bytes_in_names)?;
        match &self.outcome.termination {
            Termination::Limit => writeln!(f, "stopped: record count reached")?,
            Termination::Exhausted(e) => writeln!(f, "stopped: {e}")?,
        }
        if let Some(bpo) = self.bytes_per_object() {
            writeln!(f, "pool bytes per object: {bpo}")?;
        }
        writeln!(f, "compressed size: {}", self.compressed_size)?;
        writeln!(f, "compression ratio: {}", self.compression_ratio)?;
        write!(f, "sparse copy size: {}", self.sparse_copy_size)
    }
}

// LCOV_EXCL_STOP
