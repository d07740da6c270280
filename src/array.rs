//! The partition entry array: allocation, mutation, and payload
//! relocation on commit.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::GptError;
use crate::geometry::{ARRAY_ENTRY_COUNT, ARRAY_MAX_LENGTH};
use crate::partition::{Key, PartitionEntry};

/// Ordered collection of up to 128 partition entries, with the LBA
/// allocator and the commit-time payload relocation logic.
#[derive(Debug, Clone)]
pub struct PartitionArray {
    entries: Vec<PartitionEntry>,
    sector_size: u64,
    last_usable_lba: u64,
}

impl PartitionArray {
    /// An empty array sized for the given geometry.
    pub fn new(sector_size: u64, last_usable_lba: u64) -> Self {
        PartitionArray {
            entries: Vec::new(),
            sector_size,
            last_usable_lba,
        }
    }

    /// Non-empty entries, in array order.
    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    /// Mutable access to the non-empty entries, in array order.
    pub fn entries_mut(&mut self) -> &mut [PartitionEntry] {
        &mut self.entries
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the array has no occupied slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Place `entry` after the current last partition and append it.
    ///
    /// Fails with [`GptError::TooSmall`] if `entry.size()` is smaller
    /// than one sector, or [`GptError::Overflow`] if the array is full
    /// or the placement would run past `last_usable_lba`.
    pub fn add(&mut self, entry: PartitionEntry) -> Result<(), GptError> {
        if self.entries.len() >= ARRAY_ENTRY_COUNT as usize {
            return Err(GptError::Overflow);
        }
        if entry.size() < self.sector_size {
            return Err(GptError::TooSmall);
        }
        let end = self.entries.last().map(|e| e.last_lba()).unwrap_or(33);
        let (first_lba, last_lba) = self.place(end, entry.alignment, entry.size())?;
        debug!(
            "placing partition {:?}: first_lba={} last_lba={}",
            entry.name, first_lba, last_lba
        );

        let mut entry = entry;
        entry.place(first_lba, last_lba);
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the entry matching `key`, then repack every entry after it
    /// to close the gap. Fails with [`GptError::NotFound`] if no entry
    /// matches.
    pub fn remove(&mut self, key: &Key) -> Result<PartitionEntry, GptError> {
        let idx = self.index_of(key)?;
        let removed = self.entries.remove(idx);
        self.replace_from(idx)?;
        Ok(removed)
    }

    /// Stage a new size for the entry matching `key`, then repack it and
    /// every entry after it. Fails with [`GptError::NotFound`] or
    /// [`GptError::TooSmall`].
    pub fn resize(&mut self, key: &Key, new_size: u64) -> Result<(), GptError> {
        if new_size < self.sector_size {
            return Err(GptError::TooSmall);
        }
        let idx = self.index_of(key)?;
        self.entries[idx].set_size(new_size);
        self.replace_from(idx)
    }

    /// Find the entry matching `key`.
    pub fn find(&self, key: &Key) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.matches_key(key))
    }

    fn index_of(&self, key: &Key) -> Result<usize, GptError> {
        self.entries
            .iter()
            .position(|e| e.matches_key(key))
            .ok_or(GptError::NotFound)
    }

    /// Recompute staged LBAs for `entries[start..]`, each placed after
    /// the one before it (or after LBA 33 if `start == 0`).
    fn replace_from(&mut self, start: usize) -> Result<(), GptError> {
        for i in start..self.entries.len() {
            let end = if i == 0 {
                33
            } else {
                self.entries[i - 1].last_lba()
            };
            let alignment = self.entries[i].alignment;
            let size = self.entries[i].size();
            let (first_lba, last_lba) = self.place(end, alignment, size)?;
            self.entries[i].place(first_lba, last_lba);
        }
        Ok(())
    }

    /// The LBA allocator: round up to the next alignment boundary
    /// strictly greater than `end`, then span enough sectors for `size`
    /// bytes.
    fn place(&self, end: u64, alignment: u64, size: u64) -> Result<(u64, u64), GptError> {
        let alignment = alignment.max(1);
        let first_lba = (end / alignment + 1) * alignment;
        let sectors = div_ceil(size, self.sector_size);
        let last_lba = first_lba
            .checked_add(sectors)
            .and_then(|v| v.checked_sub(1))
            .ok_or(GptError::Overflow)?;
        if first_lba < 34 || last_lba > self.last_usable_lba {
            return Err(GptError::Overflow);
        }
        Ok((first_lba, last_lba))
    }

    /// Pack to the fixed 16 KiB on-disk form: each entry's 128-byte
    /// frame in array order, zero-padded to 128 slots.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ARRAY_MAX_LENGTH as usize);
        for entry in &self.entries {
            buf.extend_from_slice(&entry.pack());
        }
        for _ in self.entries.len()..ARRAY_ENTRY_COUNT as usize {
            buf.extend_from_slice(&PartitionEntry::pack_unused());
        }
        buf
    }

    /// Unpack a 16 KiB array frame into occupied entries, skipping
    /// unused slots.
    pub fn unmarshal(
        frame: &[u8],
        sector_size: u64,
        last_usable_lba: u64,
    ) -> Result<Self, GptError> {
        if frame.len() != ARRAY_MAX_LENGTH as usize {
            return Err(GptError::InvalidFrameLength);
        }
        let mut entries = Vec::new();
        for chunk in frame.chunks_exact(128) {
            if let Some(entry) = PartitionEntry::unpack(chunk, sector_size)? {
                entries.push(entry);
            }
        }
        Ok(PartitionArray {
            entries,
            sector_size,
            last_usable_lba,
        })
    }

    /// Relocate every entry whose staged LBAs/size differ from its
    /// committed ones: seed a scratch buffer with the device's *current*
    /// contents, then overwrite it with `min(committed_size, staged_size)`
    /// payload bytes copied from each relocating entry's committed
    /// location to its staged one, before replacing the device's
    /// contents with the scratch buffer. Entries that aren't relocating
    /// keep whatever bytes already sit at their (unchanged) location.
    ///
    /// No-op (and no scratch file created) if nothing needs relocating.
    pub(crate) fn commit<D: Read + Write + Seek>(
        &mut self,
        device: &mut D,
        total_bytes: u64,
    ) -> Result<(), GptError> {
        if !self.entries.iter().any(|e| e.needs_commit()) {
            return Ok(());
        }
        trace!("relocating partition payloads into scratch file");

        device.seek(SeekFrom::Start(0))?;
        let mut existing = vec![0u8; total_bytes as usize];
        device.read_exact(&mut existing)?;

        let mut scratch = tempfile::tempfile()?;
        scratch.set_len(total_bytes)?;
        scratch.write_all(&existing)?;

        for entry in &self.entries {
            if !entry.needs_commit() {
                continue;
            }
            let len = entry.committed_size().min(entry.size());
            if len == 0 {
                continue;
            }
            let src = (entry.committed_first_lba() * self.sector_size) as usize;
            let dst = entry.first_lba() * self.sector_size;
            let payload = &existing[src..src + len as usize];
            scratch.seek(SeekFrom::Start(dst))?;
            scratch.write_all(payload)?;
        }

        scratch.seek(SeekFrom::Start(0))?;
        let mut full = Vec::with_capacity(total_bytes as usize);
        scratch.read_to_end(&mut full)?;
        device.seek(SeekFrom::Start(0))?;
        device.write_all(&full)?;

        for entry in &mut self.entries {
            entry.mark_committed();
        }
        Ok(())
    }
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use uuid::Uuid;

    fn array() -> PartitionArray {
        // matches the 2 MiB / 512-byte-sector geometry used across the spec scenarios
        PartitionArray::new(512, 4096 - 34)
    }

    fn linux_fs() -> Uuid {
        Uuid::parse_str("0FC63DAF-8483-4772-8E79-3D69D8477DE4").unwrap()
    }

    #[test]
    fn first_partition_starts_at_40() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();
        let p1 = arr.find(&Key::Name("p1".to_string())).unwrap();
        assert_eq!(p1.first_lba(), 40);
        assert_eq!(p1.last_lba(), 43);
    }

    #[test]
    fn second_partition_packs_after_first() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();
        arr.add(PartitionEntry::new("p2", linux_fs(), 3072, 8)).unwrap();
        let p2 = arr.find(&Key::Name("p2".to_string())).unwrap();
        assert_eq!(p2.first_lba(), 48);
        assert_eq!(p2.last_lba(), 53);
    }

    #[test]
    fn oversized_partition_overflows() {
        let mut arr = array();
        let err = arr
            .add(PartitionEntry::new("huge", linux_fs(), 10 * 1024 * 1024, 8))
            .unwrap_err();
        assert!(matches!(err, GptError::Overflow));
    }

    #[test]
    fn remove_repacks_following_entries() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();
        arr.add(PartitionEntry::new("p2", linux_fs(), 3072, 8)).unwrap();

        arr.remove(&Key::Name("p1".to_string())).unwrap();
        let p2 = arr.find(&Key::Name("p2".to_string())).unwrap();
        assert_eq!(p2.first_lba(), 40);
        assert_eq!(p2.last_lba(), 45);
    }

    #[test]
    fn marshal_is_16_kib_and_round_trips() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();

        let total_bytes = 4096u64 * 512;
        let mut device = Cursor::new(vec![0u8; total_bytes as usize]);
        arr.commit(&mut device, total_bytes).unwrap();

        let frame = arr.marshal();
        assert_eq!(frame.len(), ARRAY_MAX_LENGTH as usize);

        let parsed = PartitionArray::unmarshal(&frame, 512, 4096 - 34).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.entries()[0].first_lba(), 40);
    }

    #[test]
    fn commit_relocates_payload_and_preserves_bytes() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();
        arr.add(PartitionEntry::new("p2", linux_fs(), 3072, 8)).unwrap();

        let total_bytes = 4096u64 * 512;
        let mut device = Cursor::new(vec![0u8; total_bytes as usize]);
        arr.commit(&mut device, total_bytes).unwrap();
        assert!(!arr.entries.iter().any(|e| e.needs_commit()));

        // write a recognisable payload into p2 at its committed location, then remove p1
        let p2_first = arr.find(&Key::Name("p2".to_string())).unwrap().first_lba();
        let payload = vec![0xAB; 3072];
        device
            .seek(SeekFrom::Start(p2_first * 512))
            .unwrap();
        device.write_all(&payload).unwrap();

        arr.remove(&Key::Name("p1".to_string())).unwrap();
        arr.commit(&mut device, total_bytes).unwrap();

        let p2 = arr.find(&Key::Name("p2".to_string())).unwrap();
        assert_eq!(p2.first_lba(), 40);

        let mut moved = vec![0u8; 3072];
        device.seek(SeekFrom::Start(40 * 512)).unwrap();
        device.read_exact(&mut moved).unwrap();
        assert_eq!(moved, payload);
    }

    #[test]
    fn commit_preserves_non_relocating_entry_when_another_is_added() {
        let mut arr = array();
        arr.add(PartitionEntry::new("p1", linux_fs(), 2048, 8)).unwrap();

        let total_bytes = 4096u64 * 512;
        let mut device = Cursor::new(vec![0u8; total_bytes as usize]);
        arr.commit(&mut device, total_bytes).unwrap();

        let p1_first = arr.find(&Key::Name("p1".to_string())).unwrap().first_lba();
        let payload = vec![0xCD; 2048];
        device.seek(SeekFrom::Start(p1_first * 512)).unwrap();
        device.write_all(&payload).unwrap();

        // p2 is a plain append: p1's placement is untouched, so p1 must
        // not need a commit pass even though the array as a whole does.
        arr.add(PartitionEntry::new("p2", linux_fs(), 3072, 8)).unwrap();
        assert!(!arr.find(&Key::Name("p1".to_string())).unwrap().needs_commit());
        arr.commit(&mut device, total_bytes).unwrap();

        let mut still_there = vec![0u8; 2048];
        device.seek(SeekFrom::Start(p1_first * 512)).unwrap();
        device.read_exact(&mut still_there).unwrap();
        assert_eq!(still_there, payload);
    }
}
