//! Pure geometry calculations: derive every LBA and byte offset that
//! matters for a GPT disk image from nothing but its total size and
//! sector size.

use crate::disk::LogicalBlockSize;
use crate::error::GptError;

/// Number of partition entries in the array. Fixed by specification;
/// unlike [`crate::header::HeaderBuilder`]'s other knobs, this one is not
/// parameterised anywhere in this crate.
pub const ARRAY_ENTRY_COUNT: u32 = 128;
/// Size in bytes of a single partition entry frame.
pub const ARRAY_ENTRY_LENGTH: u32 = 128;
/// Total size in bytes of one partition entry array (`128 * 128`).
pub const ARRAY_MAX_LENGTH: u64 = (ARRAY_ENTRY_COUNT as u64) * (ARRAY_ENTRY_LENGTH as u64);
/// Size in bytes of a packed GPT header frame, before zero padding to a
/// full sector.
pub const HEADER_LENGTH: u32 = 92;

/// Minimum number of sectors an image needs to hold a protective MBR,
/// both headers, and both partition entry arrays, plus one usable sector.
const MIN_SECTORS: u64 = 67;

/// Derived geometry of a GPT disk image.
///
/// Immutable once constructed: every field here is a pure function of
/// `(total_bytes, sector_size)`, recomputed from scratch rather than
/// patched in place whenever a disk is resized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Geometry {
    /// Size of a logical sector, in bytes.
    pub sector_size: u64,
    /// Total size of the image, in bytes.
    pub total_bytes: u64,
    /// Total number of sectors in the image.
    pub total_sectors: u64,
    /// First LBA usable for partition payloads (inclusive).
    pub first_usable_lba: u64,
    /// Last LBA usable for partition payloads (inclusive).
    pub last_usable_lba: u64,
    /// LBA of the primary GPT header.
    pub primary_header_lba: u64,
    /// LBA of the start of the primary partition entry array.
    pub primary_array_lba: u64,
    /// LBA of the backup GPT header.
    pub backup_header_lba: u64,
    /// LBA of the start of the backup partition entry array.
    pub backup_array_lba: u64,
}

impl Geometry {
    /// Derive geometry from a raw image size and sector size.
    ///
    /// Fails with [`GptError::InvalidGeometry`] if `sector_size` is not a
    /// positive multiple of 512, or if the image is too small to hold a
    /// protective MBR, both headers, both partition arrays, and at least
    /// one usable sector (67 sectors, minimum).
    pub fn new(total_bytes: u64, sector_size: LogicalBlockSize) -> Result<Self, GptError> {
        let sector_size = sector_size.as_u64();
        if sector_size == 0 || sector_size % 512 != 0 {
            return Err(GptError::InvalidGeometry);
        }

        let total_sectors = total_bytes / sector_size;
        if total_sectors < MIN_SECTORS {
            return Err(GptError::InvalidGeometry);
        }

        let geometry = Geometry {
            sector_size,
            total_bytes,
            total_sectors,
            first_usable_lba: 34,
            last_usable_lba: total_sectors - 34,
            primary_header_lba: 1,
            primary_array_lba: 2,
            backup_header_lba: total_sectors - 1,
            backup_array_lba: total_sectors - 33,
        };
        debug!(
            "geometry: total_sectors={} first_usable={} last_usable={}",
            geometry.total_sectors, geometry.first_usable_lba, geometry.last_usable_lba
        );
        Ok(geometry)
    }

    /// Byte offset of an arbitrary LBA.
    pub const fn lba_byte(&self, lba: u64) -> u64 {
        lba * self.sector_size
    }

    /// Byte offset of the primary header.
    pub const fn primary_header_byte(&self) -> u64 {
        self.lba_byte(self.primary_header_lba)
    }

    /// Byte offset of the primary partition entry array.
    pub const fn primary_array_byte(&self) -> u64 {
        self.lba_byte(self.primary_array_lba)
    }

    /// Byte offset of the backup header.
    pub const fn backup_header_byte(&self) -> u64 {
        self.lba_byte(self.backup_header_lba)
    }

    /// Byte offset of the backup partition entry array.
    pub const fn backup_array_byte(&self) -> u64 {
        self.lba_byte(self.backup_array_lba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_mebibyte_disk() {
        let geo = Geometry::new(2 * 1024 * 1024, LogicalBlockSize::Lb512).unwrap();
        assert_eq!(geo.total_sectors, 4096);
        assert_eq!(geo.first_usable_lba, 34);
        assert_eq!(geo.last_usable_lba, 4096 - 34);
        assert_eq!(geo.backup_header_lba, 4095);
        assert_eq!(geo.backup_array_lba, 4063);
        assert_eq!(geo.primary_header_lba, 1);
        assert_eq!(geo.primary_array_lba, 2);
    }

    #[test]
    fn too_small_is_rejected() {
        let err = Geometry::new(66 * 512, LogicalBlockSize::Lb512).unwrap_err();
        assert!(matches!(err, GptError::InvalidGeometry));
    }

    #[test]
    fn bad_sector_size_is_rejected() {
        let err = Geometry::new(1 << 20, LogicalBlockSize::Other(513)).unwrap_err();
        assert!(matches!(err, GptError::InvalidGeometry));
    }

    #[test]
    fn byte_offsets_follow_lba() {
        let geo = Geometry::new(2 * 1024 * 1024, LogicalBlockSize::Lb512).unwrap();
        assert_eq!(geo.primary_header_byte(), 512);
        assert_eq!(geo.primary_array_byte(), 1024);
        assert_eq!(geo.backup_array_byte(), 4063 * 512);
        assert_eq!(geo.backup_header_byte(), 4095 * 512);
    }
}
