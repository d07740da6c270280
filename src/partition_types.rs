//! A fixed catalogue of well-known GPT partition type GUIDs.
//!
//! This is deliberately closed: per spec, partition-type catalogue
//! maintenance beyond this enumeration is out of scope. There is no
//! dynamic registration and no external catalogue file; add a variant
//! here if the crate needs to recognise a new type GUID.

use uuid::Uuid;

/// A well-known GPT partition type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Type {
    /// The type GUID as it appears in a partition entry's `type_guid` field.
    pub guid: Uuid,
    /// The operating system or ecosystem this type is associated with.
    pub os: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

partition_types! {
    /// Marks a partition entry slot as unused.
    (UNUSED, "00000000-0000-0000-0000-000000000000", "None", "Unused entry"),
    (MBR_PARTITION_SCHEME, "024DEE41-33E7-11D3-9D69-0008C781F39F", "None", "MBR partition scheme"),
    (EFI_SYSTEM_PARTITION, "C12A7328-F81F-11D2-BA4B-00A0C93EC93B", "None", "EFI System Partition"),
    (BIOS_BOOT, "21686148-6449-6E6F-744E-656564454649", "None", "BIOS Boot Partition"),
    (MICROSOFT_RESERVED, "E3C9E316-0B5C-4DB8-817D-F92DF00215AE", "Windows", "Microsoft Reserved Partition"),
    (WINDOWS_BASIC_DATA, "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7", "Windows", "Basic Data Partition"),
    (WINDOWS_LDM_METADATA, "5808C8AA-7E8F-42E0-85D2-E1E90434CFB3", "Windows", "Logical Disk Manager Metadata Partition"),
    (WINDOWS_LDM_DATA, "AF9B60A0-1431-4F62-BC68-3311714A69AD", "Windows", "Logical Disk Manager Data Partition"),
    (WINDOWS_RECOVERY, "DE94BBA4-06D1-4D40-A16A-BFD50179D6AC", "Windows", "Windows Recovery Environment"),
    (WINDOWS_STORAGE_SPACES, "E75CAF8F-F680-4CEE-AFA3-B001E56EFC2D", "Windows", "Storage Spaces Partition"),
    (LINUX_FILESYSTEM_DATA, "0FC63DAF-8483-4772-8E79-3D69D8477DE4", "Linux", "Linux Filesystem Data"),
    (LINUX_RAID, "A19D880F-05FC-4D3B-A006-743F0F84911E", "Linux", "RAID Partition"),
    (LINUX_ROOT_X86_64, "4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709", "Linux", "Root Partition (x86-64)"),
    (LINUX_ROOT_ARM64, "B921B045-1DF0-41C3-AF44-4C6F280D3FAE", "Linux", "Root Partition (64-bit ARM/AArch64)"),
    (LINUX_SWAP, "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F", "Linux", "Swap Partition"),
    (LINUX_LVM, "E6D6D379-F507-44C2-A23C-238F2A3DF928", "Linux", "Logical Volume Manager Partition"),
    (LINUX_HOME, "933AC7E1-2EB4-4F13-B844-0E14E2AEF915", "Linux", "/home Partition"),
    (LINUX_SRV, "3B8F8425-20E0-4F3B-907F-1A25A76F98E8", "Linux", "/srv (Server Data) Partition"),
    (LINUX_DM_CRYPT, "7FFEC5C9-2D00-49B7-8941-3EA10A5586B7", "Linux", "Plain dm-crypt Partition"),
    (LINUX_LUKS, "CA7D7CCB-63ED-4C53-861C-1742536059CC", "Linux", "LUKS Partition"),
    (FREEBSD_BOOT, "83BD6B9D-7F41-11DC-BE0B-001560B84F0F", "FreeBSD", "Boot Partition"),
    (FREEBSD_DATA, "516E7CB4-6ECF-11D6-8FF8-00022D09712B", "FreeBSD", "Data Partition"),
    (FREEBSD_SWAP, "516E7CB5-6ECF-11D6-8FF8-00022D09712B", "FreeBSD", "Swap Partition"),
    (FREEBSD_UFS, "516E7CB6-6ECF-11D6-8FF8-00022D09712B", "FreeBSD", "Unix File System (UFS) Partition"),
    (FREEBSD_ZFS, "516E7CBA-6ECF-11D6-8FF8-00022D09712B", "FreeBSD", "ZFS Partition"),
    (MACOS_HFS_PLUS, "48465300-0000-11AA-AA11-00306543ECAC", "macOS Darwin", "Hierarchical File System Plus (HFS+) Partition"),
    (MACOS_APFS, "7C3457EF-0000-11AA-AA11-00306543ECAC", "macOS Darwin", "Apple APFS"),
    (MACOS_RAID, "52414944-0000-11AA-AA11-00306543ECAC", "macOS Darwin", "Apple RAID Partition"),
    (MACOS_BOOT, "426F6F74-0000-11AA-AA11-00306543ECAC", "macOS Darwin", "Apple Boot Partition (Recovery HD)"),
    (CHROMEOS_KERNEL, "FE3A2A5D-4F32-41A7-B725-ACCC3285A309", "ChromeOS", "Kernel"),
    (CHROMEOS_ROOTFS, "3CB8E202-3B7E-47DD-8A3C-7FF2A13CFCEC", "ChromeOS", "Root Filesystem"),
    (SOLARIS_ROOT, "6A85CF4D-1DD2-11B2-99A6-080020736631", "Solaris", "Root Partition"),
    (SOLARIS_USR_HOME, "6A898CC3-1DD2-11B2-99A6-080020736631", "Solaris", "/usr or /home Partition"),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unused_is_the_zero_guid() {
        assert_eq!(UNUSED.guid, Uuid::nil());
    }

    #[test]
    fn from_str_is_case_insensitive() {
        let t = Type::from_str("0fc63daf-8483-4772-8e79-3d69d8477de4").unwrap();
        assert_eq!(t.guid, LINUX_FILESYSTEM_DATA.guid);
    }

    #[test]
    fn from_str_rejects_unknown_guid() {
        assert!(Type::from_str("11111111-1111-1111-1111-111111111111").is_err());
    }

    #[test]
    fn all_entries_have_distinct_guids() {
        let mut guids: Vec<Uuid> = ALL.iter().map(|t| t.guid).collect();
        guids.sort();
        guids.dedup();
        assert_eq!(guids.len(), ALL.len());
    }
}
