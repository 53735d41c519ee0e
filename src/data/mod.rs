/// `vtPack` archive container: table parsing, unpacking and repacking
pub mod pack;
/// Shared little-endian readers
pub mod parser_utils;
/// Archive listing serialization utilities
pub mod serialization;
/// Shared little-endian writers and the size-prefix scope
pub mod writer_utils;

use std::fmt;

/// Archive format version as stored in the `vtPack` header.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// The newest archive version this crate reads and the only one it writes.
    pub const CURRENT: Version = Version { major: 1, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Version {
        Version { major, minor }
    }

    /// Readable versions share the current major and have a minor no newer than ours.
    pub fn is_supported(&self) -> bool {
        self.major == Self::CURRENT.major && self.minor <= Self::CURRENT.minor
    }

    pub fn is_at_least(&self, other: &Version) -> bool {
        self >= other
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_older_newer(older: Version, newer: Version) {
        assert!(newer.is_at_least(&older));
        assert!(newer.is_at_least(&newer));
        assert!(!older.is_at_least(&newer));
    }

    #[test]
    fn different_minor() {
        assert_older_newer(Version::new(1, 0), Version::new(1, 1));
    }

    #[test]
    fn different_major() {
        assert_older_newer(Version::new(1, 9), Version::new(2, 0));
    }

    #[test]
    fn only_current_major_with_older_minor_is_supported() {
        assert!(Version::CURRENT.is_supported());
        assert!(!Version::new(1, 1).is_supported());
        assert!(!Version::new(0, 0).is_supported());
        assert!(!Version::new(2, 0).is_supported());
    }
}
