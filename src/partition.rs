//! Partition entries: the 128-byte records making up a [`crate::array::PartitionArray`].

use std::fmt;

use bitflags::bitflags;
use simple_bytes::{BytesArray, BytesRead, BytesWrite};
use uuid::Uuid;

use crate::error::GptError;
use crate::geometry::ARRAY_ENTRY_LENGTH;
use crate::header::{parse_uuid, write_uuid};

const NAME_CODE_UNITS: usize = 36;
const NAME_BYTES: usize = NAME_CODE_UNITS * 2;

bitflags! {
    /// The 64-bit GPT partition-attribute bitset. Only the four
    /// high-order bits defined by the spec are named; the rest are
    /// reserved and round-trip unmodified.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
    pub struct PartitionAttributes: u64 {
        /// Bit 60: platform should treat the partition as read-only.
        const READ_ONLY = 1 << 60;
        /// Bit 61: partition is a shadow copy of another.
        const SHADOW_COPY = 1 << 61;
        /// Bit 62: partition should not be presented to the user.
        const HIDDEN = 1 << 62;
        /// Bit 63: no automatic drive letter assignment (Windows).
        const NO_DRIVE_LETTER = 1 << 63;
    }
}

/// A single named attribute bit, plus the "none" sentinel that clears
/// the whole bitset.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AttributeBit {
    ReadOnly,
    ShadowCopy,
    Hidden,
    NoDriveLetter,
    /// Clears every bit instead of setting one.
    None,
}

impl PartitionAttributes {
    /// Set a single named bit, or clear the whole set when passed
    /// [`AttributeBit::None`].
    pub fn set_bit(&mut self, bit: AttributeBit) {
        match bit {
            AttributeBit::ReadOnly => self.insert(Self::READ_ONLY),
            AttributeBit::ShadowCopy => self.insert(Self::SHADOW_COPY),
            AttributeBit::Hidden => self.insert(Self::HIDDEN),
            AttributeBit::NoDriveLetter => self.insert(Self::NO_DRIVE_LETTER),
            AttributeBit::None => *self = Self::empty(),
        }
    }

    /// Positions of every set bit, highest first.
    pub fn set_bits(&self) -> Vec<u8> {
        [
            (Self::NO_DRIVE_LETTER, 63u8),
            (Self::HIDDEN, 62),
            (Self::SHADOW_COPY, 61),
            (Self::READ_ONLY, 60),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, bit)| bit)
        .collect()
    }
}

/// A lookup key for [`crate::array::PartitionArray::find`] and
/// [`crate::array::PartitionArray::remove`].
///
/// Name matches are case-sensitive; GUID matches are case-insensitive
/// (GUIDs don't carry meaningful case).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Key {
    Name(String),
    Guid(Uuid),
}

/// A single partition entry.
///
/// `first_lba`/`last_lba`/`size` each carry a staged/committed pair:
/// mutating methods update the staged half, and [`PartitionEntry::mark_committed`]
/// (called by [`crate::array::PartitionArray::commit`] after relocating
/// payload bytes) copies staged into committed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PartitionEntry {
    /// Well-known type GUID. All-zero means the slot is unused.
    pub type_guid: Uuid,
    /// Disk-unique identifier for this partition.
    pub partition_guid: Uuid,
    /// Attribute bitset.
    pub attribute_flags: PartitionAttributes,
    /// Partition name, at most 36 UTF-16 code units.
    pub name: String,
    /// Placement alignment, in sectors.
    pub alignment: u64,
    committed_first_lba: u64,
    staged_first_lba: u64,
    committed_last_lba: u64,
    staged_last_lba: u64,
    committed_size: u64,
    staged_size: u64,
}

/// Default placement alignment in sectors.
pub const DEFAULT_ALIGNMENT: u64 = 8;

impl PartitionEntry {
    /// Build a new, unplaced partition entry. `size` is in bytes; the
    /// allocator fills in staged LBAs when the entry is added to a
    /// [`crate::array::PartitionArray`].
    pub fn new(name: impl Into<String>, type_guid: Uuid, size: u64, alignment: u64) -> Self {
        let name = truncate_name(name.into());
        PartitionEntry {
            type_guid,
            partition_guid: Uuid::new_v4(),
            attribute_flags: PartitionAttributes::empty(),
            name,
            alignment,
            committed_first_lba: 0,
            staged_first_lba: 0,
            committed_last_lba: 0,
            staged_last_lba: 0,
            committed_size: 0,
            staged_size: size,
        }
    }

    /// Whether this slot represents an unused entry (all-zero type GUID).
    pub fn is_unused(&self) -> bool {
        self.type_guid.is_nil()
    }

    /// Whether payload relocation and a checksum update are needed
    /// before this entry's on-disk state matches its staged state.
    pub fn needs_commit(&self) -> bool {
        self.staged_first_lba != self.committed_first_lba
            || self.staged_last_lba != self.committed_last_lba
            || self.staged_size != self.committed_size
    }

    /// Current (staged) first LBA.
    pub fn first_lba(&self) -> u64 {
        self.staged_first_lba
    }

    /// Current (staged) last LBA, inclusive.
    pub fn last_lba(&self) -> u64 {
        self.staged_last_lba
    }

    /// Current (staged) size in bytes.
    pub fn size(&self) -> u64 {
        self.staged_size
    }

    pub(crate) fn committed_first_lba(&self) -> u64 {
        self.committed_first_lba
    }

    pub(crate) fn committed_last_lba(&self) -> u64 {
        self.committed_last_lba
    }

    pub(crate) fn committed_size(&self) -> u64 {
        self.committed_size
    }

    /// Stage a new size. Takes effect on the next array placement pass.
    pub fn set_size(&mut self, size: u64) {
        self.staged_size = size;
    }

    pub(crate) fn place(&mut self, first_lba: u64, last_lba: u64) {
        self.staged_first_lba = first_lba;
        self.staged_last_lba = last_lba;
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed_first_lba = self.staged_first_lba;
        self.committed_last_lba = self.staged_last_lba;
        self.committed_size = self.staged_size;
    }

    fn matches(&self, key: &Key) -> bool {
        match key {
            Key::Name(n) => &self.name == n,
            Key::Guid(g) => self.partition_guid.as_simple().to_string().eq_ignore_ascii_case(
                &g.as_simple().to_string(),
            ),
        }
    }

    pub(crate) fn matches_key(&self, key: &Key) -> bool {
        self.matches(key)
    }

    /// Pack to the fixed 128-byte on-disk frame, using the *committed*
    /// LBAs — callers write entries to disk only after a commit pass has
    /// relocated payload bytes and copied staged into committed.
    pub fn pack(&self) -> [u8; ARRAY_ENTRY_LENGTH as usize] {
        let mut bytes = BytesArray::from([0u8; ARRAY_ENTRY_LENGTH as usize]);
        write_uuid(&mut bytes, &self.type_guid);
        write_uuid(&mut bytes, &self.partition_guid);
        bytes.write_le_u64(self.committed_first_lba);
        bytes.write_le_u64(self.committed_last_lba);
        bytes.write_le_u64(self.attribute_flags.bits());
        BytesWrite::write(&mut bytes, &pack_name(&self.name));
        bytes.into_array()
    }

    /// An all-zero frame, for unused slots.
    pub fn pack_unused() -> [u8; ARRAY_ENTRY_LENGTH as usize] {
        [0u8; ARRAY_ENTRY_LENGTH as usize]
    }

    /// Unpack from a 128-byte frame. Returns `Ok(None)` for an unused
    /// slot (all-zero type GUID) rather than an error.
    pub fn unpack(frame: &[u8], sector_size: u64) -> Result<Option<Self>, GptError> {
        if frame.len() != ARRAY_ENTRY_LENGTH as usize {
            return Err(GptError::InvalidFrameLength);
        }
        let mut array = [0u8; ARRAY_ENTRY_LENGTH as usize];
        array.copy_from_slice(frame);
        let mut bytes = BytesArray::from(array);

        let type_guid = parse_uuid(&mut bytes)?;
        if type_guid.is_nil() {
            return Ok(None);
        }
        let partition_guid = parse_uuid(&mut bytes)?;
        let first_lba = bytes.read_le_u64();
        let last_lba = bytes.read_le_u64();
        let attribute_flags = PartitionAttributes::from_bits_retain(bytes.read_le_u64());
        let name_bytes = BytesRead::read(&mut bytes, NAME_BYTES);
        let name = unpack_name(name_bytes);
        let size = (last_lba - first_lba + 1).saturating_mul(sector_size);

        Ok(Some(PartitionEntry {
            type_guid,
            partition_guid,
            attribute_flags,
            name,
            alignment: DEFAULT_ALIGNMENT,
            committed_first_lba: first_lba,
            staged_first_lba: first_lba,
            committed_last_lba: last_lba,
            staged_last_lba: last_lba,
            committed_size: size,
            staged_size: size,
        }))
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}-{}",
            self.name, self.partition_guid, self.staged_first_lba, self.staged_last_lba
        )
    }
}

fn truncate_name(name: String) -> String {
    if name.encode_utf16().count() <= NAME_CODE_UNITS {
        return name;
    }
    name.encode_utf16()
        .take(NAME_CODE_UNITS)
        .collect::<Vec<u16>>()
        .iter()
        .map(|&u| char::from_u32(u as u32).unwrap_or('\u{FFFD}'))
        .collect()
}

fn pack_name(name: &str) -> [u8; NAME_BYTES] {
    let mut out = [0u8; NAME_BYTES];
    for (i, unit) in name.encode_utf16().take(NAME_CODE_UNITS).enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    out
}

fn unpack_name(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let end = units.iter().rposition(|&u| u != 0).map_or(0, |i| i + 1);
    String::from_utf16_lossy(&units[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_set_and_clear() {
        let mut attrs = PartitionAttributes::empty();
        attrs.set_bit(AttributeBit::Hidden);
        attrs.set_bit(AttributeBit::ReadOnly);
        assert_eq!(attrs.set_bits(), vec![62, 60]);

        attrs.set_bit(AttributeBit::None);
        assert!(attrs.is_empty());
    }

    #[test]
    fn name_round_trips() {
        let packed = pack_name("boot");
        assert_eq!(unpack_name(&packed), "boot");
    }

    #[test]
    fn name_longer_than_36_units_is_truncated() {
        let long = "x".repeat(50);
        let truncated = truncate_name(long);
        assert_eq!(truncated.encode_utf16().count(), NAME_CODE_UNITS);
    }

    #[test]
    fn pack_unpack_round_trip() {
        let mut entry = PartitionEntry::new(
            "p1",
            Uuid::parse_str("0FC63DAF-8483-4772-8E79-3D69D8477DE4").unwrap(),
            2048,
            DEFAULT_ALIGNMENT,
        );
        entry.place(40, 43);
        entry.mark_committed();

        let frame = entry.pack();
        let parsed = PartitionEntry::unpack(&frame, 512).unwrap().unwrap();
        assert_eq!(parsed.type_guid, entry.type_guid);
        assert_eq!(parsed.name, "p1");
        assert_eq!(parsed.first_lba(), 40);
        assert_eq!(parsed.last_lba(), 43);
        assert_eq!(parsed.size(), 2048);
    }

    #[test]
    fn unused_slot_unpacks_to_none() {
        let frame = PartitionEntry::pack_unused();
        assert!(PartitionEntry::unpack(&frame, 512).unwrap().is_none());
    }

    #[test]
    fn needs_commit_tracks_staged_vs_committed() {
        let mut entry = PartitionEntry::new("p1", Uuid::new_v4(), 1024, DEFAULT_ALIGNMENT);
        entry.place(40, 41);
        assert!(entry.needs_commit());
        entry.mark_committed();
        assert!(!entry.needs_commit());
    }

    #[test]
    fn key_matching_name_is_case_sensitive_guid_is_not() {
        let mut entry = PartitionEntry::new("P1", Uuid::new_v4(), 1024, DEFAULT_ALIGNMENT);
        entry.place(40, 41);
        assert!(entry.matches_key(&Key::Name("P1".to_string())));
        assert!(!entry.matches_key(&Key::Name("p1".to_string())));

        let guid = entry.partition_guid;
        let upper = Uuid::parse_str(&guid.hyphenated().to_string().to_uppercase()).unwrap();
        assert!(entry.matches_key(&Key::Guid(upper)));
    }
}
