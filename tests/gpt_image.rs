//! On-disk round-trip tests, using real temp files rather than in-memory
//! buffers so the full `create`/`commit`/`open` path through `std::fs`
//! gets exercised.

use raw_gpt::{partition_types, GptConfig, Key, PartitionEntry};

const TWO_MIB: u64 = 2 * 1024 * 1024;

fn linux_fs() -> uuid::Uuid {
    partition_types::LINUX_FILESYSTEM_DATA.guid
}

#[test]
fn create_on_disk_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut image = GptConfig::new().writable(true).create(&path, TWO_MIB).unwrap();
    image
        .add_partition(PartitionEntry::new("root", linux_fs(), 2048, 8))
        .unwrap();
    image.commit().unwrap();

    let disk_guid = image.table().primary_header.disk_guid;
    drop(image);

    let reopened = GptConfig::new().open(&path).unwrap();
    assert_eq!(reopened.table().primary_header.disk_guid, disk_guid);
    let root = reopened.find_partition(&Key::Name("root".to_string())).unwrap();
    assert_eq!(root.first_lba(), 40);
    assert_eq!(root.last_lba(), 43);
}

#[test]
fn reopen_fails_on_tampered_backup_array() {
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut image = GptConfig::new().writable(true).create(&path, TWO_MIB).unwrap();
    image
        .add_partition(PartitionEntry::new("root", linux_fs(), 2048, 8))
        .unwrap();
    image.commit().unwrap();
    drop(image);

    let backup_array_byte = (4096 - 33) * 512;
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(backup_array_byte)).unwrap();
    file.write_all(&[0xFFu8; 16]).unwrap();
    drop(file);

    let err = GptConfig::new().open(&path).unwrap_err();
    assert!(matches!(err, raw_gpt::GptError::TableMismatch));
}

#[test]
fn second_create_on_same_path_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    GptConfig::new().create(&path, TWO_MIB).unwrap();
    let err = GptConfig::new().create(&path, TWO_MIB).unwrap_err();
    assert!(matches!(err, raw_gpt::GptError::Exists));
}

#[test]
fn commit_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut image = GptConfig::new().writable(true).create(&path, TWO_MIB).unwrap();
    image
        .add_partition(PartitionEntry::new("root", linux_fs(), 2048, 8))
        .unwrap();
    image.commit().unwrap();
    let first = std::fs::read(&path).unwrap();

    image.commit().unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
}
