use itertools::Itertools;

use crate::data::pack::{ArchiveEntry, PackFile};

/// Flattened view of one archive entry, used for listings.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SerializedFile {
    pub path: String,
    is_directory: bool,
    size: u32,
    compressed_size: u32,
    offset: u32,
    timestamp: u32,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    unknown_kind: Option<u32>,
}

impl SerializedFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Raw type tag for entries that are neither files nor directories.
    pub fn unknown_kind(&self) -> Option<u32> {
        self.unknown_kind
    }

    /// Placeholder file entries carry no data.
    pub fn is_placeholder(&self) -> bool {
        !self.is_directory && self.unknown_kind.is_none() && (self.offset == 0 || self.size == 0)
    }
}

impl From<&ArchiveEntry> for SerializedFile {
    fn from(entry: &ArchiveEntry) -> Self {
        SerializedFile {
            path: entry.path().replace('\\', "/"),
            is_directory: entry.is_directory(),
            size: entry.size,
            compressed_size: entry.compressed_size,
            offset: entry.offset,
            timestamp: entry.timestamp,
            unknown_kind: entry.kind.unknown().copied(),
        }
    }
}

/// All entries of a pack, `/`-separated and sorted by path.
pub fn pack_to_serialized_files(pack: &PackFile) -> Vec<SerializedFile> {
    pack.entries
        .iter()
        .map(SerializedFile::from)
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect()
}
