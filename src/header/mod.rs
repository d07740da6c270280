//! GPT-header object and helper functions.

mod builder;

pub use builder::HeaderBuilder;

use crc::Crc;
use std::fmt;
use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

use simple_bytes::{BytesArray, BytesRead, BytesSeek, BytesWrite};
use uuid::Uuid;

use crate::disk::LogicalBlockSize;
use crate::error::GptError;
use crate::geometry::Geometry;

/// Which of the two on-disk copies a [`Header`] describes.
///
/// A header's own identity depends on this: `current_lba`/`backup_lba`
/// and `part_start` swap depending on which copy it is. A `Header` never
/// mutates between roles in place — build a fresh one from [`Geometry`]
/// instead.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    Primary,
    Backup,
}

/// On-disk GPT header, 92 significant bytes zero-padded to a full sector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// GPT header magic signature, hardcoded to "EFI PART".
    pub signature: String,
    /// (major, minor)
    pub revision: (u16, u16),
    /// Size of the header structure in bytes, little endian on disk.
    pub header_size_le: u32,
    /// CRC32 of this header with the crc32 field itself zeroed.
    pub crc32: u32,
    /// Must be zero.
    pub reserved: u32,
    /// LBA of this header copy.
    pub current_lba: u64,
    /// LBA of the other header copy.
    pub backup_lba: u64,
    /// First usable LBA for partitions.
    pub first_usable: u64,
    /// Last usable LBA for partitions, inclusive.
    pub last_usable: u64,
    /// Disk-unique identifier.
    pub disk_guid: Uuid,
    /// Starting LBA of this copy's partition entry array.
    pub part_start: u64,
    /// Number of partition entries in the array.
    pub num_parts: u32,
    /// Size in bytes of a single partition entry.
    pub part_size: u32,
    /// CRC32 of the partition entry array.
    pub crc32_parts: u32,
}

impl Header {
    /// Build a fresh header for `role`, deriving every LBA field from
    /// `geometry` directly rather than copying and patching another
    /// header instance.
    pub fn new(geometry: &Geometry, disk_guid: Uuid, role: Role) -> Self {
        let (current_lba, backup_lba, part_start) = match role {
            Role::Primary => (
                geometry.primary_header_lba,
                geometry.backup_header_lba,
                geometry.primary_array_lba,
            ),
            Role::Backup => (
                geometry.backup_header_lba,
                geometry.primary_header_lba,
                geometry.backup_array_lba,
            ),
        };

        Header {
            signature: "EFI PART".to_string(),
            revision: (1, 0),
            header_size_le: crate::geometry::HEADER_LENGTH,
            crc32: 0,
            reserved: 0,
            current_lba,
            backup_lba,
            first_usable: geometry.first_usable_lba,
            last_usable: geometry.last_usable_lba,
            disk_guid,
            part_start,
            num_parts: crate::geometry::ARRAY_ENTRY_COUNT,
            part_size: crate::geometry::ARRAY_ENTRY_LENGTH,
            crc32_parts: 0,
        }
    }

    /// Whether this is the primary copy (`current_lba < backup_lba`).
    pub fn is_primary(&self) -> bool {
        self.current_lba < self.backup_lba
    }

    /// Pack to the fixed 92-byte on-disk frame, given the already
    /// computed CRC32 values. Callers are responsible for the ordering
    /// invariant: the array CRC must be computed and folded in here
    /// before the header CRC is computed over the result.
    pub fn pack(&self, header_crc32: u32, array_crc32: u32) -> [u8; 92] {
        let mut bytes = BytesArray::from([0u8; 92]);
        let guid_fields = self.disk_guid.as_fields();

        BytesWrite::write(&mut bytes, self.signature.as_bytes());
        bytes.write_le_u16(self.revision.1);
        bytes.write_le_u16(self.revision.0);
        bytes.write_le_u32(self.header_size_le);
        bytes.write_le_u32(header_crc32);
        bytes.write_le_u32(0);
        bytes.write_le_u64(self.current_lba);
        bytes.write_le_u64(self.backup_lba);
        bytes.write_le_u64(self.first_usable);
        bytes.write_le_u64(self.last_usable);
        bytes.write_le_u32(guid_fields.0);
        bytes.write_le_u16(guid_fields.1);
        bytes.write_le_u16(guid_fields.2);
        BytesWrite::write(&mut bytes, guid_fields.3);
        bytes.write_le_u64(self.part_start);
        bytes.write_le_u32(self.num_parts);
        bytes.write_le_u32(self.part_size);
        bytes.write_le_u32(array_crc32);

        bytes.into_array()
    }

    /// Unpack from a 92-byte frame, verifying the signature, revision,
    /// header size, and the header's own CRC32 (computed with the crc32
    /// field zeroed). The CRC32 check is this codec's own integrity
    /// check on a single frame; it's independent of
    /// [`GptError::TableMismatch`], which only ever comes from comparing
    /// the primary and backup partition arrays against each other.
    pub fn unpack(frame: &[u8]) -> Result<Self, GptError> {
        if frame.len() < 92 {
            return Err(GptError::InvalidFrameLength);
        }
        let mut array = [0u8; 92];
        array.copy_from_slice(&frame[..92]);
        let mut bytes = BytesArray::from(array);

        let sigstr = String::from_utf8_lossy(BytesRead::read(&mut bytes, 8)).into_owned();
        if sigstr != "EFI PART" {
            return Err(GptError::BadSignature);
        }

        let minor = bytes.read_le_u16();
        let major = bytes.read_le_u16();
        if (major, minor) != (1, 0) {
            return Err(GptError::BadRevision);
        }
        let header_size_le = bytes.read_le_u32();
        if header_size_le != 92 {
            return Err(GptError::BadHeaderSize);
        }
        let crc32 = bytes.read_le_u32();
        let reserved = bytes.read_le_u32();
        let current_lba = bytes.read_le_u64();
        let backup_lba = bytes.read_le_u64();
        let first_usable = bytes.read_le_u64();
        let last_usable = bytes.read_le_u64();
        let disk_guid = parse_uuid(&mut bytes)?;
        let part_start = bytes.read_le_u64();
        let num_parts = bytes.read_le_u32();
        let part_size = bytes.read_le_u32();
        let crc32_parts = bytes.read_le_u32();

        let header = Header {
            signature: sigstr,
            revision: (major, minor),
            header_size_le,
            crc32,
            reserved,
            current_lba,
            backup_lba,
            first_usable,
            last_usable,
            disk_guid,
            part_start,
            num_parts,
            part_size,
            crc32_parts,
        };

        BytesSeek::seek(&mut bytes, 16);
        bytes.write_le_u32(0);
        let computed = calculate_crc32(bytes.as_slice());
        trace!(
            "header CRC32: stored={:#x} computed={:#x}",
            header.crc32,
            computed
        );
        if computed != header.crc32 {
            return Err(GptError::BadHeaderCrc);
        }

        Ok(header)
    }

    /// Read this header's copy directly off `device` at its own LBA.
    pub fn read_at<D: Read + Seek>(
        device: &mut D,
        lba: u64,
        sector_size: LogicalBlockSize,
    ) -> Result<Self, GptError> {
        let offset = lba
            .checked_mul(sector_size.as_u64())
            .ok_or(GptError::Overflow)?;
        device.seek(SeekFrom::Start(offset))?;
        let mut frame = vec![0u8; 92];
        device.read_exact(&mut frame)?;
        Header::unpack(&frame)
    }

    /// Write this header copy to `device` at `self.current_lba`, zero
    /// padding the rest of the logical sector.
    pub fn write_at<D: Write + Seek>(
        &self,
        device: &mut D,
        header_crc32: u32,
        array_crc32: u32,
        sector_size: LogicalBlockSize,
    ) -> IoResult<usize> {
        let offset = self
            .current_lba
            .checked_mul(sector_size.as_u64())
            .expect("LBA overflow validated by geometry construction");
        device.seek(SeekFrom::Start(offset))?;

        let frame = self.pack(header_crc32, array_crc32);
        let mut sector = Vec::with_capacity(sector_size.as_usize());
        sector.extend_from_slice(&frame);
        sector.resize(sector_size.as_usize(), 0);
        device.write(&sector)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Disk:\t\t{}\nCRC32:\t\t{:#x}\nTable CRC:\t{:#x}",
            self.disk_guid, self.crc32, self.crc32_parts
        )
    }
}

/// Writes a UUID with the first three fields little-endian and the
/// last two big-endian, the mirror of [`parse_uuid`].
pub fn write_uuid<W: BytesWrite>(bytes: &mut W, uuid: &Uuid) {
    let fields = uuid.as_fields();
    bytes.write_le_u32(fields.0);
    bytes.write_le_u16(fields.1);
    bytes.write_le_u16(fields.2);
    BytesWrite::write(bytes, fields.3);
}

/// Parses a UUID with the first three fields little-endian and the
/// last two big-endian, per the Microsoft mixed-endian convention.
pub fn parse_uuid<R: BytesRead>(rdr: &mut R) -> Result<Uuid, GptError> {
    if rdr.remaining().len() < 16 {
        return Err(GptError::InvalidFrameLength);
    }
    let d1 = rdr.read_le_u32();
    let d2 = rdr.read_le_u16();
    let d3 = rdr.read_le_u16();
    let d4: [u8; 8] = BytesRead::read(rdr, 8).try_into().unwrap();
    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

const CRC_32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// CRC32 (ISO-HDLC) over an arbitrary byte buffer, used for both the
/// header checksum and the partition array checksum.
pub fn calculate_crc32(b: &[u8]) -> u32 {
    let mut digest = CRC_32.digest();
    digest.update(b);
    digest.finalize()
}
