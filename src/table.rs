//! `Table`: MBR + primary/backup headers + partition array, with the
//! checksum-update orchestration that keeps them consistent.

use std::io::{Read, Seek, Write};

use uuid::Uuid;

use crate::array::PartitionArray;
use crate::disk::LogicalBlockSize;
use crate::error::GptError;
use crate::geometry::Geometry;
use crate::header::{calculate_crc32, Header, Role};
use crate::mbr::ProtectiveMbr;

/// Owns every structure that makes up a GPT disk image and keeps them
/// consistent with each other.
#[derive(Debug, Clone)]
pub struct Table {
    pub geometry: Geometry,
    pub mbr: ProtectiveMbr,
    pub primary_header: Header,
    pub backup_header: Header,
    pub array: PartitionArray,
}

impl Table {
    /// A fresh, empty table for a disk of `geometry` with a new random
    /// disk GUID.
    pub fn new(geometry: Geometry) -> Self {
        Self::with_disk_guid(geometry, Uuid::new_v4())
    }

    /// A fresh, empty table with an explicit disk GUID.
    pub fn with_disk_guid(geometry: Geometry, disk_guid: Uuid) -> Self {
        let mbr = ProtectiveMbr::new(geometry.total_sectors);
        let primary_header = Header::new(&geometry, disk_guid, Role::Primary);
        let backup_header = Header::new(&geometry, disk_guid, Role::Backup);
        let array = PartitionArray::new(geometry.sector_size, geometry.last_usable_lba);
        Table {
            geometry,
            mbr,
            primary_header,
            backup_header,
            array,
        }
    }

    /// Read an existing table off `device`. Fails with
    /// [`GptError::BadHeaderCrc`] if either header's own CRC32 doesn't
    /// match, or [`GptError::TableMismatch`] if the primary and backup
    /// partition arrays differ byte-for-byte.
    pub fn read<D: Read + Seek>(
        device: &mut D,
        geometry: Geometry,
    ) -> Result<Self, GptError> {
        let primary_header =
            Header::read_at(device, geometry.primary_header_lba, sector_size(&geometry))?;
        let backup_header =
            Header::read_at(device, geometry.backup_header_lba, sector_size(&geometry))?;

        let primary_bytes = read_array_bytes(device, geometry.primary_array_byte())?;
        let backup_bytes = read_array_bytes(device, geometry.backup_array_byte())?;
        if primary_bytes != backup_bytes {
            return Err(GptError::TableMismatch);
        }

        let array = PartitionArray::unmarshal(
            &primary_bytes,
            geometry.sector_size,
            geometry.last_usable_lba,
        )?;

        let mbr = ProtectiveMbr::new(geometry.total_sectors);

        Ok(Table {
            geometry,
            mbr,
            primary_header,
            backup_header,
            array,
        })
    }

    /// Recompute every checksum in the strict order the spec requires:
    /// marshal the array, CRC it, fold that CRC into both headers, then
    /// CRC each header over its own 92-byte frame with its own CRC field
    /// zeroed.
    ///
    /// Both steps happen on both header copies before anything is
    /// considered ready to write — there is no partial state where one
    /// header has a stale array CRC.
    pub fn update(&mut self) -> (u32, u32, [u8; 92], [u8; 92]) {
        let array_bytes = self.array.marshal();
        let array_crc = calculate_crc32(&array_bytes);
        trace!("partition array CRC32: {:#x}", array_crc);

        self.primary_header.crc32_parts = array_crc;
        self.backup_header.crc32_parts = array_crc;

        let primary_unchecksummed = self.primary_header.pack(0, array_crc);
        let primary_crc = calculate_crc32(&primary_unchecksummed);
        self.primary_header.crc32 = primary_crc;

        let backup_unchecksummed = self.backup_header.pack(0, array_crc);
        let backup_crc = calculate_crc32(&backup_unchecksummed);
        self.backup_header.crc32 = backup_crc;

        debug!(
            "header CRC32s: primary={:#x} backup={:#x}",
            primary_crc, backup_crc
        );

        let primary_frame = self.primary_header.pack(primary_crc, array_crc);
        let backup_frame = self.backup_header.pack(backup_crc, array_crc);
        (primary_crc, backup_crc, primary_frame, backup_frame)
    }

    /// Relocate payload bytes for any entry whose staged state differs
    /// from its committed one.
    pub(crate) fn relocate<D: Read + Write + Seek>(&mut self, device: &mut D) -> Result<(), GptError> {
        self.array.commit(device, self.geometry.total_bytes)
    }
}

fn sector_size(geometry: &Geometry) -> LogicalBlockSize {
    LogicalBlockSize::Other(geometry.sector_size as u32)
}

fn read_array_bytes<D: Read + Seek>(device: &mut D, byte_offset: u64) -> Result<Vec<u8>, GptError> {
    use std::io::SeekFrom;
    device.seek(SeekFrom::Start(byte_offset))?;
    let mut buf = vec![0u8; crate::geometry::ARRAY_MAX_LENGTH as usize];
    device.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LogicalBlockSize;

    fn geometry() -> Geometry {
        Geometry::new(2 * 1024 * 1024, LogicalBlockSize::Lb512).unwrap()
    }

    #[test]
    fn empty_table_crc_matches_known_vector() {
        let table = Table::new(geometry());
        let empty_array = table.array.marshal();
        assert_eq!(calculate_crc32(&empty_array), 0xAB54D286);
    }

    #[test]
    fn update_keeps_primary_and_backup_array_crc_equal() {
        let mut table = Table::new(geometry());
        let (primary_crc, backup_crc, _, _) = table.update();
        assert_eq!(table.primary_header.crc32_parts, table.backup_header.crc32_parts);
        assert_ne!(primary_crc, backup_crc); // they differ only because LBA fields differ
        assert_eq!(table.primary_header.disk_guid, table.backup_header.disk_guid);
    }
}
