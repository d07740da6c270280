//! Protective MBR: the legacy LBA0 record that makes the disk look like
//! a single `0xEE`-type partition to MBR-only tooling, so it leaves the
//! real GPT data alone.

use simple_bytes::{BytesArray, BytesRead, BytesWrite};

use crate::error::GptError;

/// Size in bytes of the protective MBR sector. Fixed regardless of the
/// disk's logical sector size — the MBR always lives in the first 512
/// bytes of the image.
pub const MBR_LENGTH: usize = 512;

const BOOTCODE_LENGTH: usize = 440;

/// A single MBR-style partition record, 16 bytes on disk.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PartRecord {
    /// `0x80` bootable, `0x00` otherwise. Always `0x00` for GPT.
    pub boot_indicator: u8,
    /// Legacy CHS start address; unused by any GPT-aware tooling.
    pub start_chs: [u8; 3],
    /// `0xEE` for the protective record, `0x00` for padding records.
    pub partition_type: u8,
    /// Legacy CHS end address; unused by any GPT-aware tooling.
    pub end_chs: [u8; 3],
    /// Starting LBA of the record, always `1` for the protective record.
    pub start_lba: u32,
    /// Size of the record in sectors, clamped to `u32::MAX` on huge disks.
    pub size_in_lba: u32,
}

impl PartRecord {
    /// The protective record: claims the whole disk (less the MBR
    /// sector itself) as a single `0xEE` partition.
    pub fn protective(total_sectors: u64) -> Self {
        let size_in_lba = (total_sectors.saturating_sub(1)).min(u32::MAX as u64) as u32;
        PartRecord {
            boot_indicator: 0x00,
            start_chs: [0x00, 0x02, 0x00],
            partition_type: 0xEE,
            end_chs: [0xFF, 0xFF, 0xFF],
            start_lba: 1,
            size_in_lba,
        }
    }

    /// An all-zero, unused record.
    pub fn zero() -> Self {
        PartRecord {
            boot_indicator: 0,
            start_chs: [0; 3],
            partition_type: 0,
            end_chs: [0; 3],
            start_lba: 0,
            size_in_lba: 0,
        }
    }

    fn pack<W: BytesWrite>(&self, bytes: &mut W) {
        BytesWrite::write(bytes, &[self.boot_indicator]);
        BytesWrite::write(bytes, &self.start_chs);
        BytesWrite::write(bytes, &[self.partition_type]);
        BytesWrite::write(bytes, &self.end_chs);
        bytes.write_le_u32(self.start_lba);
        bytes.write_le_u32(self.size_in_lba);
    }

    fn unpack<R: BytesRead>(bytes: &mut R) -> Self {
        let boot_indicator = BytesRead::read(bytes, 1)[0];
        let mut start_chs = [0u8; 3];
        start_chs.copy_from_slice(BytesRead::read(bytes, 3));
        let partition_type = BytesRead::read(bytes, 1)[0];
        let mut end_chs = [0u8; 3];
        end_chs.copy_from_slice(BytesRead::read(bytes, 3));
        let start_lba = bytes.read_le_u32();
        let size_in_lba = bytes.read_le_u32();
        PartRecord {
            boot_indicator,
            start_chs,
            partition_type,
            end_chs,
            start_lba,
            size_in_lba,
        }
    }
}

/// Protective MBR occupying LBA0, as required by the GPT spec.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProtectiveMbr {
    bootcode: [u8; BOOTCODE_LENGTH],
    disk_signature: [u8; 4],
    unknown: u16,
    records: [PartRecord; 4],
}

impl ProtectiveMbr {
    /// Build a fresh protective MBR sized for a disk of `total_sectors`
    /// logical sectors.
    pub fn new(total_sectors: u64) -> Self {
        debug!("building protective MBR for {} sectors", total_sectors);
        ProtectiveMbr {
            bootcode: [0u8; BOOTCODE_LENGTH],
            disk_signature: [0u8; 4],
            unknown: 0,
            records: [
                PartRecord::protective(total_sectors),
                PartRecord::zero(),
                PartRecord::zero(),
                PartRecord::zero(),
            ],
        }
    }

    /// The protective (first) record.
    pub fn protective_record(&self) -> &PartRecord {
        &self.records[0]
    }

    /// Pack to the fixed 512-byte on-disk frame.
    pub fn pack(&self) -> [u8; MBR_LENGTH] {
        let mut bytes = BytesArray::from([0u8; MBR_LENGTH]);
        BytesWrite::write(&mut bytes, &self.bootcode);
        BytesWrite::write(&mut bytes, &self.disk_signature);
        bytes.write_le_u16(self.unknown);
        for record in &self.records {
            record.pack(&mut bytes);
        }
        BytesWrite::write(&mut bytes, &[0x55, 0xAA]);
        bytes.into_array()
    }

    /// Unpack from a 512-byte frame.
    pub fn unpack(frame: &[u8]) -> Result<Self, GptError> {
        if frame.len() != MBR_LENGTH {
            return Err(GptError::InvalidFrameLength);
        }
        let mut array = [0u8; MBR_LENGTH];
        array.copy_from_slice(frame);
        let mut bytes = BytesArray::from(array);

        let mut bootcode = [0u8; BOOTCODE_LENGTH];
        bootcode.copy_from_slice(BytesRead::read(&mut bytes, BOOTCODE_LENGTH));
        let mut disk_signature = [0u8; 4];
        disk_signature.copy_from_slice(BytesRead::read(&mut bytes, 4));
        let unknown = bytes.read_le_u16();

        let records = [
            PartRecord::unpack(&mut bytes),
            PartRecord::unpack(&mut bytes),
            PartRecord::unpack(&mut bytes),
            PartRecord::unpack(&mut bytes),
        ];
        let signature = BytesRead::read(&mut bytes, 2);
        if signature != [0x55, 0xAA] {
            return Err(GptError::BadSignature);
        }

        Ok(ProtectiveMbr {
            bootcode,
            disk_signature,
            unknown,
            records,
        })
    }
}
