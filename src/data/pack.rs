//! Codec for VToy `vtPack` archives.
//!
//! A pack is a flat, uncompressed container:
//! - A 34-byte header: magic `vtPack`, major/minor version, 12 reserved bytes,
//!   the entry count and the absolute offset of the entry table
//! - File payloads, stored back to back
//! - The entry table, one record per directory or file. Each record names its
//!   parent directory both by path and by table index.
//!
//! The format has a compressed-size field, but no known archive uses
//! compression: it always equals the uncompressed size.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use memmap2::MmapOptions;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::Version;
use crate::data::parser_utils::{ByteStream, ParseError, bounded_capacity, parse_magic};
use crate::data::writer_utils::{write_bytes, write_string, write_u32, write_zeros};
use crate::recognized::Recognized;

/// The archive magic tag.
pub const PACK_MAGIC: &[u8; 6] = b"vtPack";

/// Size of the fixed header preceding the first payload.
pub const HEADER_SIZE: usize = 34;

/// Parent index written for entries that sit at the archive root.
pub const NO_PARENT: u32 = 0xFFFF_FFFF;

const RESERVED_SIZE: usize = 12;
/// Offset of the entry count within the header; the table offset follows it.
const ENTRY_COUNT_OFFSET: usize = 26;
/// Smallest possible table record: two empty strings and six `u32` fields.
const MIN_ENTRY_SIZE: usize = 32;

const KIND_DIRECTORY: u32 = 1;
const KIND_FILE: u32 = 2;

const ARCHIVE_SEPARATOR: char = '\\';
const DUPLICATE_SUFFIX: &str = "_dup";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("bad magic: expected {expected:?}, got {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error("unsupported pack version {0}")]
    UnsupportedVersion(Version),
    #[error("writing pack version {0} is not implemented")]
    NotImplemented(Version),
    #[error(
        "entry {name:?} data at 0x{offset:X} (0x{size:X} bytes) extends beyond archive (len 0x{len:X})"
    )]
    EntryOutOfBounds {
        name: String,
        offset: u32,
        size: u32,
        len: usize,
    },
    #[error("entry path {0:?} escapes the output directory")]
    UnsafePath(String),
    #[error("{path}: {what} does not fit in 32 bits")]
    TooLarge { path: PathBuf, what: &'static str },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PackError + '_ {
    move |source| PackError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether a table record describes a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    pub fn from_raw(raw: u32) -> Recognized<EntryKind> {
        match raw {
            KIND_DIRECTORY => Recognized::Known(EntryKind::Directory),
            KIND_FILE => Recognized::Known(EntryKind::File),
            other => Recognized::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            EntryKind::Directory => KIND_DIRECTORY,
            EntryKind::File => KIND_FILE,
        }
    }
}

/// One record of the entry table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveEntry {
    /// Entry name without any directory part.
    pub name: String,
    /// Path of the containing directory, `\`-separated. Empty at the root.
    pub directory: String,
    /// Table index of the containing directory entry. `None` at the root.
    pub parent_index: Option<u32>,
    pub size: u32,
    pub compressed_size: u32,
    /// Absolute payload offset within the archive.
    pub offset: u32,
    /// Unix timestamp in seconds.
    pub timestamp: u32,
    pub kind: Recognized<EntryKind>,
}

impl ArchiveEntry {
    pub fn is_directory(&self) -> bool {
        self.kind.known() == Some(&EntryKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.kind.known() == Some(&EntryKind::File)
    }

    /// File entries without data. These exist in shipped archives and are skipped, not errors.
    pub fn is_placeholder(&self) -> bool {
        self.is_file() && (self.offset == 0 || self.size == 0)
    }

    /// Full `\`-separated path of this entry within the archive.
    pub fn path(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}{ARCHIVE_SEPARATOR}{}", self.directory, self.name)
        }
    }

    pub fn data_range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }
}

/// Parsed header and entry table of a pack.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackFile {
    pub version: Version,
    pub entries: Vec<ArchiveEntry>,
}

impl PackFile {
    pub fn directories(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|entry| entry.is_directory())
    }

    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|entry| entry.is_file())
    }
}

/// What [`unpack`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnpackSummary {
    pub directories: usize,
    pub files: usize,
    pub placeholders: usize,
    pub unknown_entries: usize,
    pub bytes: u64,
}

/// What [`repack`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RepackSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

// --- Parsing ---

fn parse_entry(stream: &mut ByteStream<'_>) -> Result<ArchiveEntry, ParseError> {
    let name = stream.string("entry name")?;
    let directory = stream.string("entry directory")?;
    let parent_index = stream.u32("entry parent index")?;
    let size = stream.u32("entry size")?;
    let compressed_size = stream.u32("entry compressed size")?;
    let offset = stream.u32("entry offset")?;
    let timestamp = stream.u32("entry timestamp")?;
    let kind = stream.u32("entry type")?;
    Ok(ArchiveEntry {
        name,
        directory,
        parent_index: (parent_index != NO_PARENT).then_some(parent_index),
        size,
        compressed_size,
        offset,
        timestamp,
        kind: EntryKind::from_raw(kind),
    })
}

/// Parse the header and entry table of a pack held in memory.
pub fn parse_pack(file_data: &[u8]) -> Result<PackFile, PackError> {
    let mut stream = ByteStream::new(file_data);

    let magic: [u8; 6] = stream.read("magic", parse_magic::<6>)?;
    if &magic != PACK_MAGIC {
        return Err(PackError::BadMagic {
            expected: "vtPack",
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    let version = Version::new(stream.u32("major version")?, stream.u32("minor version")?);
    if !version.is_supported() {
        return Err(PackError::UnsupportedVersion(version));
    }

    stream.skip("reserved header bytes", RESERVED_SIZE)?;
    let entry_count = stream.u32("entry count")?;
    let table_offset = stream.u32("table offset")?;
    stream.seek(table_offset as usize)?;

    let mut entries = Vec::with_capacity(bounded_capacity(
        entry_count,
        stream.remaining(),
        MIN_ENTRY_SIZE,
    ));
    for _ in 0..entry_count {
        entries.push(parse_entry(&mut stream)?);
    }

    debug!(%version, entries = entries.len(), "parsed pack table");
    Ok(PackFile { version, entries })
}

/// Memory-map a pack on disk and parse its table.
pub fn read_pack_file(archive_path: &Path) -> Result<PackFile, PackError> {
    let file = File::open(archive_path).map_err(io_error(archive_path))?;
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(io_error(archive_path))?;
    parse_pack(&mmap)
}

// --- Unpacking ---

/// Split an archive path into validated relative components.
///
/// Both `\` and `/` separate components. Empty components (leading or doubled
/// separators) are dropped. `.`, `..` and drive prefixes are rejected so an entry
/// can never resolve outside the output directory.
fn relative_path(archive_path: &str) -> Result<PathBuf, PackError> {
    let mut path = PathBuf::new();
    for component in archive_path.split(['\\', '/']) {
        if component.is_empty() {
            continue;
        }
        if component == "." || component == ".." || component.contains(':') {
            return Err(PackError::UnsafePath(archive_path.to_owned()));
        }
        path.push(component);
    }
    Ok(path)
}

/// First path that does not exist yet: `path`, then `path_dup`, `path_dup2`, ...
fn disambiguate(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let mut attempt = 1;
    loop {
        let suffix = if attempt == 1 {
            DUPLICATE_SUFFIX.to_owned()
        } else {
            format!("{DUPLICATE_SUFFIX}{attempt}")
        };
        let mut candidate = path.clone().into_os_string();
        candidate.push(&suffix);
        let candidate = PathBuf::from(candidate);
        if !candidate.exists() {
            return candidate;
        }
        attempt += 1;
    }
}

/// Apply an entry timestamp. Some archives carry implausible timestamps, and not
/// every platform can set times on directories, so failures are only logged.
fn apply_timestamp(path: &Path, timestamp: u32) {
    if timestamp == 0 {
        return;
    }

    let modified = UNIX_EPOCH + Duration::from_secs(timestamp as u64);
    if let Err(e) = File::open(path).and_then(|file| file.set_modified(modified)) {
        warn!(path = %path.display(), timestamp, "failed to apply timestamp: {e}");
    }
}

/// Extract every entry of `archive_path` below `out_dir`.
pub fn unpack(archive_path: &Path, out_dir: &Path) -> Result<UnpackSummary, PackError> {
    let file = File::open(archive_path).map_err(io_error(archive_path))?;
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(io_error(archive_path))?;
    let pack = parse_pack(&mmap)?;

    fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;

    let mut summary = UnpackSummary::default();
    // Creating files touches their parent's mtime, so directory times go last.
    let mut directory_times = Vec::new();

    for entry in &pack.entries {
        match entry.kind {
            Recognized::Known(EntryKind::Directory) => {
                let dir = out_dir.join(relative_path(&entry.path())?);
                fs::create_dir_all(&dir).map_err(io_error(&dir))?;
                directory_times.push((dir, entry.timestamp));
                summary.directories += 1;
            }
            Recognized::Known(EntryKind::File) => {
                if entry.is_placeholder() {
                    debug!(path = entry.path(), "skipping placeholder entry");
                    summary.placeholders += 1;
                    continue;
                }

                let range = entry.data_range();
                if range.end > mmap.len() {
                    return Err(PackError::EntryOutOfBounds {
                        name: entry.path(),
                        offset: entry.offset,
                        size: entry.size,
                        len: mmap.len(),
                    });
                }

                let name = relative_path(&entry.name)?;
                if name.as_os_str().is_empty() {
                    return Err(PackError::UnsafePath(entry.path()));
                }

                let dir = out_dir.join(relative_path(&entry.directory)?);
                fs::create_dir_all(&dir).map_err(io_error(&dir))?;

                let target = disambiguate(dir.join(name));
                debug!(
                    path = %target.display(),
                    offset = entry.offset,
                    size = entry.size,
                    "extracting"
                );
                fs::write(&target, &mmap[range]).map_err(io_error(&target))?;
                apply_timestamp(&target, entry.timestamp);

                summary.files += 1;
                summary.bytes += entry.size as u64;
            }
            Recognized::Unknown(raw) => {
                warn!(path = entry.path(), kind = raw, "skipping entry of unknown type");
                summary.unknown_entries += 1;
            }
        }
    }

    for (dir, timestamp) in directory_times.iter().rev() {
        apply_timestamp(dir, *timestamp);
    }

    info!(
        files = summary.files,
        directories = summary.directories,
        placeholders = summary.placeholders,
        "unpacked {}",
        archive_path.display()
    );
    Ok(summary)
}

// --- Repacking ---

fn write_header(buf: &mut Vec<u8>, version: Version, entry_count: u32, table_offset: u32) {
    write_bytes(buf, PACK_MAGIC);
    write_u32(buf, version.major);
    write_u32(buf, version.minor);
    write_zeros(buf, RESERVED_SIZE);
    write_u32(buf, entry_count);
    write_u32(buf, table_offset);
}

fn write_entry(buf: &mut Vec<u8>, entry: &ArchiveEntry) {
    write_string(buf, &entry.name);
    write_string(buf, &entry.directory);
    write_u32(buf, entry.parent_index.unwrap_or(NO_PARENT));
    write_u32(buf, entry.size);
    write_u32(buf, entry.compressed_size);
    write_u32(buf, entry.offset);
    write_u32(buf, entry.timestamp);
    let kind = match entry.kind {
        Recognized::Known(kind) => kind.raw(),
        Recognized::Unknown(raw) => raw,
    };
    write_u32(buf, kind);
}

/// All directories and files below `root` as relative paths, each list sorted.
fn collect_tree(root: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), PackError> {
    let mut directories = Vec::new();
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        let dir = root.join(&relative);
        for dir_entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let dir_entry = dir_entry.map_err(io_error(&dir))?;
            let file_type = dir_entry.file_type().map_err(io_error(&dir))?;
            let child = relative.join(dir_entry.file_name());
            if file_type.is_dir() {
                directories.push(child.clone());
                pending.push(child);
            } else if file_type.is_file() {
                files.push(child);
            } else {
                debug!(path = %child.display(), "skipping non-regular file");
            }
        }
    }

    directories.sort();
    files.sort();
    Ok((directories, files))
}

fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `\`-joined form of a relative directory path.
fn archive_directory(path: Option<&Path>) -> String {
    path.map(|path| {
        path.components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("\\")
    })
    .unwrap_or_default()
}

fn modified_timestamp(path: &Path) -> u32 {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map_or(0, |since| u32::try_from(since.as_secs()).unwrap_or(u32::MAX))
}

fn to_u32(value: u64, path: &Path, what: &'static str) -> Result<u32, PackError> {
    u32::try_from(value).map_err(|_| PackError::TooLarge {
        path: path.to_path_buf(),
        what,
    })
}

/// Build a current-version pack from every file below `input_dir`.
pub fn repack(input_dir: &Path, archive_path: &Path) -> Result<RepackSummary, PackError> {
    repack_with_version(input_dir, archive_path, Version::CURRENT)
}

/// Build a pack with an explicit version. Only [`Version::CURRENT`] can be written;
/// older layouts report [`PackError::NotImplemented`].
pub fn repack_with_version(
    input_dir: &Path,
    archive_path: &Path,
    version: Version,
) -> Result<RepackSummary, PackError> {
    if version != Version::CURRENT {
        return Err(PackError::NotImplemented(version));
    }

    let (directories, files) = collect_tree(input_dir)?;
    let mut entries = Vec::with_capacity(directories.len() + files.len());
    let mut directory_indices: HashMap<PathBuf, u32> = HashMap::with_capacity(directories.len());

    let parent_of = |relative: &Path, indices: &HashMap<PathBuf, u32>| {
        relative
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| (parent.to_path_buf(), indices.get(parent).copied()))
    };

    for relative in &directories {
        let parent = parent_of(relative, &directory_indices);
        entries.push(ArchiveEntry {
            name: archive_name(relative),
            directory: archive_directory(parent.as_ref().map(|(path, _)| path.as_path())),
            parent_index: parent.and_then(|(_, index)| index),
            size: 0,
            compressed_size: 0,
            offset: 0,
            timestamp: modified_timestamp(&input_dir.join(relative)),
            kind: Recognized::Known(EntryKind::Directory),
        });
        directory_indices.insert(relative.clone(), (entries.len() - 1) as u32);
    }

    let output = File::create(archive_path).map_err(io_error(archive_path))?;
    let mut writer = BufWriter::new(output);

    let mut header = Vec::with_capacity(HEADER_SIZE);
    write_header(&mut header, version, 0, 0);
    writer.write_all(&header).map_err(io_error(archive_path))?;

    let mut position = HEADER_SIZE as u64;
    let mut summary = RepackSummary {
        directories: directories.len(),
        ..Default::default()
    };

    for relative in &files {
        let source_path = input_dir.join(relative);
        let mut source = File::open(&source_path).map_err(io_error(&source_path))?;
        let copied = io::copy(&mut source, &mut writer).map_err(io_error(&source_path))?;

        let parent = parent_of(relative, &directory_indices);
        let size = to_u32(copied, &source_path, "file size")?;
        entries.push(ArchiveEntry {
            name: archive_name(relative),
            directory: archive_directory(parent.as_ref().map(|(path, _)| path.as_path())),
            parent_index: parent.and_then(|(_, index)| index),
            size,
            compressed_size: size,
            offset: to_u32(position, &source_path, "data offset")?,
            timestamp: modified_timestamp(&source_path),
            kind: Recognized::Known(EntryKind::File),
        });
        debug!(path = %relative.display(), offset = position, size, "packed");

        position += copied;
        summary.files += 1;
        summary.bytes += copied;
    }

    let table_offset = to_u32(position, archive_path, "table offset")?;
    let mut table = Vec::new();
    for entry in &entries {
        write_entry(&mut table, entry);
    }
    writer.write_all(&table).map_err(io_error(archive_path))?;

    header.clear();
    write_header(&mut header, version, entries.len() as u32, table_offset);
    writer
        .seek(SeekFrom::Start(ENTRY_COUNT_OFFSET as u64))
        .and_then(|_| writer.write_all(&header[ENTRY_COUNT_OFFSET..]))
        .and_then(|_| writer.flush())
        .map_err(io_error(archive_path))?;

    info!(
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "repacked {}",
        archive_path.display()
    );
    Ok(summary)
}
