use super::{Header, Role};
use crate::geometry::Geometry;

use uuid::Uuid;

/// Builds a [`Header`] for one role from a fixed [`Geometry`].
///
/// Unlike ad hoc field mutation, every value the builder produces is a
/// pure function of `(geometry, disk_guid, role)` — there is no path to
/// an inconsistent half-primary, half-backup header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderBuilder<'g> {
    geometry: &'g Geometry,
    disk_guid: Uuid,
    role: Role,
}

impl<'g> HeaderBuilder<'g> {
    /// Start building a header from `geometry`, defaulting to a random
    /// disk GUID and the primary role.
    pub fn new(geometry: &'g Geometry) -> Self {
        Self {
            geometry,
            disk_guid: Uuid::new_v4(),
            role: Role::Primary,
        }
    }

    /// Set the disk GUID. By default a fresh random one is generated.
    pub fn disk_guid(mut self, disk_guid: Uuid) -> Self {
        self.disk_guid = disk_guid;
        self
    }

    /// Set which copy to build.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Produce the header.
    pub fn build(self) -> Header {
        Header::new(self.geometry, self.disk_guid, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LogicalBlockSize;

    #[test]
    fn builder_matches_direct_construction() {
        let geo = Geometry::new(2 * 1024 * 1024, LogicalBlockSize::Lb512).unwrap();
        let guid = Uuid::new_v4();
        let built = HeaderBuilder::new(&geo).disk_guid(guid).role(Role::Backup).build();
        let direct = Header::new(&geo, guid, Role::Backup);
        assert_eq!(built, direct);
    }
}
