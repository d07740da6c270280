//! A pure-Rust library to build, mutate, and write byte-exact GPT disk
//! images.
//!
//! ```
//! use raw_gpt::{GptConfig, Key, PartitionEntry};
//! use std::io::Cursor;
//!
//! let device = Cursor::new(vec![0u8; 2 * 1024 * 1024]);
//! let mut image = GptConfig::new()
//!     .create_from_device(device, 2 * 1024 * 1024)
//!     .expect("failed to create image");
//!
//! image
//!     .add_partition(PartitionEntry::new(
//!         "root",
//!         raw_gpt::partition_types::LINUX_FILESYSTEM_DATA.guid,
//!         2048,
//!         8,
//!     ))
//!     .expect("failed to add partition");
//! image.commit().expect("failed to commit");
//!
//! assert!(image.find_partition(&Key::Name("root".to_string())).is_some());
//! ```

#[macro_use]
mod logging;
#[macro_use]
mod macros;

pub mod array;
pub mod disk;
pub mod error;
pub mod geometry;
pub mod header;
pub mod mbr;
pub mod partition;
pub mod partition_types;
pub mod table;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub use disk::LogicalBlockSize;
pub use error::GptError;
pub use geometry::Geometry;
pub use partition::{AttributeBit, Key, PartitionEntry};
pub use table::Table;

/// Anything an [`Image`] can be bound to: a real file, or an in-memory
/// buffer such as `std::io::Cursor<Vec<u8>>` for tests.
pub trait DiskDevice: Read + Write + Seek + fmt::Debug {}
impl<T: Read + Write + Seek + fmt::Debug> DiskDevice for T {}

/// Builder that binds a set of open/create options to a path or
/// arbitrary device, producing an [`Image`].
#[derive(Debug, Clone)]
pub struct GptConfig {
    writable: bool,
    logical_block_size: LogicalBlockSize,
    only_valid_headers: bool,
    change_partition_count: bool,
}

impl GptConfig {
    /// Defaults: read-only, 512-byte sectors, require both headers to
    /// check out on open, 128 fixed partition entries.
    pub fn new() -> Self {
        GptConfig {
            writable: false,
            logical_block_size: LogicalBlockSize::default(),
            only_valid_headers: true,
            change_partition_count: false,
        }
    }

    /// Open the backing file for writing as well as reading.
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Override the logical sector size used to derive geometry.
    pub fn logical_block_size(mut self, lb: LogicalBlockSize) -> Self {
        self.logical_block_size = lb;
        self
    }

    /// Require the primary and backup partition arrays to match
    /// byte-for-byte on open. Disabling this is not currently supported
    /// by [`Table::read`] and is reserved for a future relaxed-open mode.
    pub fn only_valid_headers(mut self, v: bool) -> Self {
        self.only_valid_headers = v;
        self
    }

    /// Permit changing the partition-entry count away from the fixed
    /// 128. Rejected by default; the array is always built with exactly
    /// 128 slots regardless of this flag today. Retained as the ambient
    /// configuration knob the format's tooling always exposes.
    pub fn change_partition_count(mut self, v: bool) -> Self {
        self.change_partition_count = v;
        self
    }

    /// Create a new image at `path`. Fails with [`GptError::Exists`] if
    /// the path already exists.
    pub fn create(&self, path: impl AsRef<Path>, size: u64) -> Result<Image<File>, GptError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(GptError::Exists);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(size)?;
        self.create_from_device(file, size)
    }

    /// Create a new image on an arbitrary device, which must already be
    /// `size` bytes long (or growable to it via `Write`).
    pub fn create_from_device<D: DiskDevice>(
        &self,
        device: D,
        size: u64,
    ) -> Result<Image<D>, GptError> {
        let geometry = Geometry::new(size, self.logical_block_size)?;
        debug!("creating new table for {} bytes", size);
        let table = Table::new(geometry);
        let mut image = Image {
            device,
            table,
            dirty: true,
        };
        image.commit()?;
        Ok(image)
    }

    /// Open an existing image at `path`. Fails with
    /// [`GptError::NotFound`] if the path does not exist.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Image<File>, GptError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GptError::NotFound);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(self.writable)
            .open(path)?;
        let size = file.metadata()?.len();
        self.open_from_device(file, size)
    }

    /// Open an existing image already sitting on an arbitrary device.
    pub fn open_from_device<D: DiskDevice>(
        &self,
        mut device: D,
        size: u64,
    ) -> Result<Image<D>, GptError> {
        let geometry = Geometry::new(size, self.logical_block_size)?;
        debug!("opening existing table for {} bytes", size);
        let table = Table::read(&mut device, geometry)?;
        Ok(Image {
            device,
            table,
            dirty: false,
        })
    }
}

impl Default for GptConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A GPT disk image bound to a backing device.
///
/// Mutating methods (`add_partition`, `remove_partition`,
/// `resize_partition`) only touch in-memory state; [`Image::commit`]
/// relocates any moved payload bytes, recomputes every checksum, and
/// writes the protective MBR, both headers, and both partition arrays
/// to the device in that fixed order.
#[derive(Debug)]
pub struct Image<D> {
    device: D,
    table: Table,
    dirty: bool,
}

impl<D: DiskDevice> Image<D> {
    /// The underlying table (geometry, MBR, headers, partition array).
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Whether there are staged mutations not yet reflected on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stage a new partition. Only touches in-memory state; call
    /// [`Image::commit`] to persist it.
    pub fn add_partition(&mut self, entry: PartitionEntry) -> Result<(), GptError> {
        self.table.array.add(entry)?;
        self.dirty = true;
        Ok(())
    }

    /// Stage removal of the partition matching `key`.
    pub fn remove_partition(&mut self, key: &Key) -> Result<PartitionEntry, GptError> {
        let removed = self.table.array.remove(key)?;
        self.dirty = true;
        Ok(removed)
    }

    /// Stage a resize of the partition matching `key`.
    pub fn resize_partition(&mut self, key: &Key, new_size: u64) -> Result<(), GptError> {
        self.table.array.resize(key, new_size)?;
        self.dirty = true;
        Ok(())
    }

    /// Look up a partition by name or GUID.
    pub fn find_partition(&self, key: &Key) -> Option<&PartitionEntry> {
        self.table.array.find(key)
    }

    /// All currently staged partitions, in array order.
    pub fn partitions(&self) -> &[PartitionEntry] {
        self.table.array.entries()
    }

    /// Relocate any moved payloads, recompute checksums, and write the
    /// protective MBR, both headers, and both partition arrays to disk,
    /// in that fixed order.
    pub fn commit(&mut self) -> Result<(), GptError> {
        self.table.relocate(&mut self.device)?;
        let (_, _, primary_frame, backup_frame) = self.table.update();

        let mbr_frame = self.table.mbr.pack();
        self.device.seek(SeekFrom::Start(0))?;
        self.device.write_all(&mbr_frame)?;
        trace!("wrote protective MBR");

        self.write_header_sector(self.table.geometry.primary_header_byte(), &primary_frame)?;
        self.write_array(self.table.geometry.primary_array_byte())?;
        self.write_header_sector(self.table.geometry.backup_header_byte(), &backup_frame)?;
        self.write_array(self.table.geometry.backup_array_byte())?;

        self.dirty = false;
        Ok(())
    }

    fn write_header_sector(&mut self, byte_offset: u64, frame: &[u8; 92]) -> Result<(), GptError> {
        self.device.seek(SeekFrom::Start(byte_offset))?;
        let sector_size = self.table.geometry.sector_size as usize;
        let mut sector = Vec::with_capacity(sector_size);
        sector.extend_from_slice(frame);
        sector.resize(sector_size, 0);
        self.device.write_all(&sector)?;
        Ok(())
    }

    fn write_array(&mut self, byte_offset: u64) -> Result<(), GptError> {
        let bytes = self.table.array.marshal();
        self.device.seek(SeekFrom::Start(byte_offset))?;
        self.device.write_all(&bytes)?;
        Ok(())
    }

    /// Write `data` into the partition matching `key` at `offset` bytes
    /// into its payload. Fails with [`GptError::OutOfBounds`] if
    /// `offset + data.len()` exceeds the partition's size.
    pub fn write_data(&mut self, key: &Key, data: &[u8], offset: u64) -> Result<usize, GptError> {
        let entry = self.table.array.find(key).ok_or(GptError::NotFound)?;
        let end = offset.checked_add(data.len() as u64).ok_or(GptError::Overflow)?;
        if end > entry.size() {
            return Err(GptError::OutOfBounds);
        }
        let start = entry.first_lba() * self.table.geometry.sector_size + offset;
        self.device.seek(SeekFrom::Start(start))?;
        Ok(self.device.write(data)?)
    }

    /// Read up to `min(partition.size, max_size)` bytes from the start
    /// of the partition matching `key`.
    pub fn read_data(&mut self, key: &Key, max_size: usize) -> Result<Vec<u8>, GptError> {
        let entry = self.table.array.find(key).ok_or(GptError::NotFound)?;
        let len = (entry.size() as usize).min(max_size);
        let start = entry.first_lba() * self.table.geometry.sector_size;
        self.device.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len];
        self.device.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn linux_fs() -> uuid::Uuid {
        partition_types::LINUX_FILESYSTEM_DATA.guid
    }

    #[test]
    fn create_add_commit_reopen_round_trips() {
        let size = 2 * 1024 * 1024u64;
        let device = Cursor::new(vec![0u8; size as usize]);
        let mut image = GptConfig::new()
            .create_from_device(device, size)
            .unwrap();

        image
            .add_partition(PartitionEntry::new("p1", linux_fs(), 2048, 8))
            .unwrap();
        image
            .add_partition(PartitionEntry::new("p2", linux_fs(), 3072, 8))
            .unwrap();
        image.commit().unwrap();

        let disk_guid = image.table().primary_header.disk_guid;
        let raw = image.device.into_inner();

        let device = Cursor::new(raw);
        let reopened = GptConfig::new().open_from_device(device, size).unwrap();

        assert_eq!(reopened.table().primary_header.disk_guid, disk_guid);
        assert_eq!(
            reopened.table().primary_header.crc32_parts,
            reopened.table().backup_header.crc32_parts
        );
        let p1 = reopened.find_partition(&Key::Name("p1".to_string())).unwrap();
        assert_eq!(p1.first_lba(), 40);
        assert_eq!(p1.last_lba(), 43);
        let p2 = reopened.find_partition(&Key::Name("p2".to_string())).unwrap();
        assert_eq!(p2.first_lba(), 48);
        assert_eq!(p2.last_lba(), 53);
    }

    #[test]
    fn create_rejects_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        GptConfig::new().create(&path, 2 * 1024 * 1024).unwrap();
        let err = GptConfig::new().create(&path, 2 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, GptError::Exists));
    }

    #[test]
    fn open_rejects_missing_path() {
        let err = GptConfig::new().open("/nonexistent/path/disk.img").unwrap_err();
        assert!(matches!(err, GptError::NotFound));
    }

    #[test]
    fn write_and_read_partition_payload() {
        let size = 2 * 1024 * 1024u64;
        let device = Cursor::new(vec![0u8; size as usize]);
        let mut image = GptConfig::new()
            .create_from_device(device, size)
            .unwrap();
        image
            .add_partition(PartitionEntry::new("p1", linux_fs(), 2048, 8))
            .unwrap();
        image.commit().unwrap();

        let key = Key::Name("p1".to_string());
        image.write_data(&key, b"hello gpt", 0).unwrap();
        let read_back = image.read_data(&key, 9).unwrap();
        assert_eq!(&read_back, b"hello gpt");
    }

    #[test]
    fn write_out_of_bounds_is_rejected() {
        let size = 2 * 1024 * 1024u64;
        let device = Cursor::new(vec![0u8; size as usize]);
        let mut image = GptConfig::new()
            .create_from_device(device, size)
            .unwrap();
        image
            .add_partition(PartitionEntry::new("p1", linux_fs(), 2048, 8))
            .unwrap();
        image.commit().unwrap();

        let key = Key::Name("p1".to_string());
        let err = image.write_data(&key, &[0u8; 4096], 0).unwrap_err();
        assert!(matches!(err, GptError::OutOfBounds));
    }

    #[test]
    fn remove_then_commit_preserves_surviving_payload() {
        let size = 2 * 1024 * 1024u64;
        let device = Cursor::new(vec![0u8; size as usize]);
        let mut image = GptConfig::new()
            .create_from_device(device, size)
            .unwrap();
        image
            .add_partition(PartitionEntry::new("p1", linux_fs(), 2048, 8))
            .unwrap();
        image
            .add_partition(PartitionEntry::new("p2", linux_fs(), 3072, 8))
            .unwrap();
        image.commit().unwrap();

        let p2_key = Key::Name("p2".to_string());
        image.write_data(&p2_key, &[0xCD; 3072], 0).unwrap();

        image.remove_partition(&Key::Name("p1".to_string())).unwrap();
        image.commit().unwrap();

        let p2 = image.find_partition(&p2_key).unwrap();
        assert_eq!(p2.first_lba(), 40);
        assert_eq!(p2.last_lba(), 45);

        let payload = image.read_data(&p2_key, 3072).unwrap();
        assert_eq!(payload, vec![0xCD; 3072]);
    }
}
