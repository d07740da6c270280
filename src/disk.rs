//! Logical block (sector) sizing for a GPT disk image.

use std::convert::TryFrom;
use std::{fmt, io};

/// Default size of a logical sector (bytes).
pub const DEFAULT_SECTOR_SIZE: LogicalBlockSize = LogicalBlockSize::Lb512;

/// Logical block/sector size of a GPT disk image.
///
/// The spec allows any positive multiple of 512 bytes; the two sizes
/// actually shipped on real media get named variants so callers have
/// something to match on, with [`LogicalBlockSize::Other`] covering the
/// rest (larger sectors used by some enterprise and optical media).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicalBlockSize {
    /// 512 bytes. The overwhelming default.
    Lb512,
    /// 4096 bytes ("4Kn").
    Lb4096,
    /// Any other positive multiple of 512 bytes.
    Other(u32),
}

impl LogicalBlockSize {
    /// Returns the logical block size as a `usize`.
    pub const fn as_usize(&self) -> usize {
        self.as_u64() as usize
    }

    /// Returns the logical block size as a `u64`.
    pub const fn as_u64(&self) -> u64 {
        match self {
            LogicalBlockSize::Lb512 => 512,
            LogicalBlockSize::Lb4096 => 4096,
            LogicalBlockSize::Other(n) => *n as u64,
        }
    }
}

impl From<LogicalBlockSize> for u64 {
    fn from(lb: LogicalBlockSize) -> u64 {
        lb.as_u64()
    }
}

impl From<LogicalBlockSize> for usize {
    fn from(lb: LogicalBlockSize) -> usize {
        lb.as_usize()
    }
}

impl TryFrom<u64> for LogicalBlockSize {
    type Error = io::Error;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        if v == 0 || v % 512 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "sector size must be a positive multiple of 512",
            ));
        }
        match v {
            512 => Ok(LogicalBlockSize::Lb512),
            4096 => Ok(LogicalBlockSize::Lb4096),
            other => Ok(LogicalBlockSize::Other(other as u32)),
        }
    }
}

impl fmt::Display for LogicalBlockSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl Default for LogicalBlockSize {
    fn default() -> Self {
        DEFAULT_SECTOR_SIZE
    }
}
