//vim: tw=80
//! Pool and dataset properties
//!
//! Only the handful of properties that zfstester sets are modeled.  They're
//! handed to `zpool create -O` and `zfs create -o` in `key=value` form.
use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Largest record size we allow, log base 2.  128 KB, the ZFS default.
pub const MAX_RECORDSIZE_SHIFT: u8 = 17;
/// Default record size in bytes.
pub const DEFAULT_RECORDSIZE: u64 = 1 << MAX_RECORDSIZE_SHIFT;

/// Pool and dataset properties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Property {
    /// Access time.  When off, reads never dirty metadata.
    Atime(bool),

    /// Compression algorithm, passed through verbatim.  "lz4", "off", etc.
    Compression(String),

    /// Mountpoint of the dataset, or "none" for an unmounted pool root.
    Mountpoint(String),

    /// Suggested block size for newly written data.
    ///
    /// Units are in bytes, log base 2.  So `RecordSize(16)` means 64KB records.
    RecordSize(u8),
}

impl Property {
    /// Helper to construct a Mountpoint property
    pub fn mountpoint<S: Into<String>>(s: S) -> Self {
        Property::Mountpoint(s.into())
    }

    /// Construct a RecordSize property from a size in bytes.
    ///
    /// The size must be a power of two from 512 bytes to 128 KB.
    pub fn record_size(bytes: u64) -> Result<Self> {
        // There are so few valid values that it's easier to use a LUT than to
        // take the log.
        match bytes {
            512 => Ok(Property::RecordSize(9)),
            1_024 => Ok(Property::RecordSize(10)),
            2_048 => Ok(Property::RecordSize(11)),
            4_096 => Ok(Property::RecordSize(12)),
            8_192 => Ok(Property::RecordSize(13)),
            16_384 => Ok(Property::RecordSize(14)),
            32_768 => Ok(Property::RecordSize(15)),
            65_536 => Ok(Property::RecordSize(16)),
            131_072 => Ok(Property::RecordSize(17)),
            _ => Err(Error::InvalidRecordSize(bytes)),
        }
    }

    /// The record size in bytes, if this is a RecordSize property.
    pub fn as_bytes(&self) -> Option<u64> {
        match self {
            Property::RecordSize(shift) => Some(1u64 << shift),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Atime(true) => write!(f, "atime=on"),
            Property::Atime(false) => write!(f, "atime=off"),
            Property::Compression(c) => write!(f, "compression={c}"),
            Property::Mountpoint(mp) => write!(f, "mountpoint={mp}"),
            Property::RecordSize(shift) => {
                write!(f, "recordsize={}", 1u64 << shift)
            }
        }
    }
}

impl FromStr for Property {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidProperty(s.to_owned());
        let mut words = s.splitn(2, '=');
        let propname = words.next().ok_or_else(invalid)?;
        let propval = words.next();
        if let Some(v) = propval {
            match propname {
                "atime" => match v {
                    "true" | "on" => Ok(Property::Atime(true)),
                    "false" | "off" => Ok(Property::Atime(false)),
                    _ => Err(invalid()),
                },
                "compression" if !v.is_empty() => {
                    Ok(Property::Compression(v.to_string()))
                }
                "mountpoint" if !v.is_empty() => {
                    Ok(Property::Mountpoint(v.to_string()))
                }
                "recordsize" => {
                    let bytes = v.parse::<u64>().map_err(|_| invalid())?;
                    Property::record_size(bytes)
                }
                _ => Err(invalid()),
            }
        } else {
            // Value may be omitted only for boolean options
            match propname {
                "atime" => Ok(Property::Atime(true)),
                _ => Err(invalid()),
            }
        }
    }
}

// LCOV_EXCL_STOP
