//! Error surface for the crate.

use std::{fmt, io};

/// Errors returned when interacting with a GPT disk image.
#[non_exhaustive]
#[derive(Debug)]
pub enum GptError {
    /// Generic IO error, propagated unchanged from the backing device.
    Io(io::Error),
    /// `total_bytes`/`sector_size` cannot produce a valid [`crate::geometry::Geometry`]
    /// (fewer than 67 usable sectors, or a sector size that isn't a
    /// positive multiple of 512).
    InvalidGeometry,
    /// A header frame's signature field was not `"EFI PART"`.
    BadSignature,
    /// A header frame's revision field was not `1.0`.
    BadRevision,
    /// A header frame's `header_size` field was not 92.
    BadHeaderSize,
    /// A byte buffer handed to the codec had the wrong length for the
    /// frame being packed or unpacked.
    InvalidFrameLength,
    /// A header frame's CRC32 did not match its recomputed value.
    BadHeaderCrc,
    /// The primary and backup partition entry arrays did not match on open.
    TableMismatch,
    /// `Image::create` was called against a path that already exists.
    Exists,
    /// The requested path, partition name, or partition GUID was not found.
    NotFound,
    /// A partition placement or resize would run past `last_usable_lba`.
    Overflow,
    /// A partition's size is smaller than one sector.
    TooSmall,
    /// A read or write against a partition's payload fell outside its
    /// allocated byte range.
    OutOfBounds,
}

impl From<io::Error> for GptError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::error::Error for GptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for GptError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use GptError::*;
        match self {
            Io(e) => write!(fmt, "GPT IO error: {e}"),
            InvalidGeometry => write!(fmt, "geometry invalid for the given size/sector size"),
            BadSignature => write!(fmt, "invalid GPT header signature"),
            BadRevision => write!(fmt, "unsupported GPT header revision"),
            BadHeaderSize => write!(fmt, "unexpected GPT header size"),
            InvalidFrameLength => write!(fmt, "byte buffer has the wrong length for this frame"),
            BadHeaderCrc => write!(fmt, "GPT header CRC32 does not match its recomputed value"),
            TableMismatch => write!(fmt, "primary and backup partition arrays do not match"),
            Exists => write!(fmt, "image already exists"),
            NotFound => write!(fmt, "not found"),
            Overflow => write!(fmt, "partition placement overflows the usable LBA range"),
            TooSmall => write!(fmt, "partition size is smaller than one sector"),
            OutOfBounds => write!(fmt, "read or write falls outside the partition's byte range"),
        }
    }
}
