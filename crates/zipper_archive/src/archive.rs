//! The boundary between the transfer engine and the archive codec.
//!
//! [`ArchiveWrite`] and [`ArchiveRead`] describe the smallest surface the entry writer and
//! entry reader need: open an entry, push bytes into it and close it on one side; move a
//! cursor over entries, inspect the current one and read its content on the other. The ZIP
//! codec in this crate implements both, tests implement them with in-memory stubs.

use std::io::Read;

use bon::Builder;

use crate::compression::CompressionMethod;
use crate::error::Result;
use crate::types::{FLAG_UTF8, ZIP64_BYTES_THRESHOLD};

/// Whether an entry is a regular file or a directory marker
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Framing variant chosen when an entry is opened
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SizeClass {
    /// Sizes fit the 32-bit header fields
    #[default]
    Standard,

    /// Sizes are carried in a ZIP64 extra field
    Large,
}

impl SizeClass {
    /// Pick the framing for content of `len` bytes.
    ///
    /// `0xFFFFFFFF` itself is the ZIP64 marker value, so content of exactly that length is
    /// already large.
    pub const fn for_len(len: u64) -> Self {
        if len >= ZIP64_BYTES_THRESHOLD {
            SizeClass::Large
        } else {
            SizeClass::Standard
        }
    }
}

/// How a new entry should be framed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct EntryOptions {
    /// The compression method for the entry data
    #[builder(default)]
    pub compression: CompressionMethod,

    /// The size framing for the entry, fixed once the entry is open
    #[builder(default)]
    pub size_class: SizeClass,
}

/// Result of moving the cursor of an archive reader
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The cursor now points at an entry
    Entry,

    /// There are no further entries
    EndOfArchive,
}

/// Metadata of an entry, as recorded in the central directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryInfo {
    /// Name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub name: Box<str>,
    /// Raw name as stored. To be used when `name` was decoded lossily.
    pub name_raw: Box<[u8]>,
    /// General purpose bit flags
    pub flags: u16,
    /// Raw compression method id
    pub compression: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Size of the entry in the archive
    pub compressed_size: u64,
    /// Size of the entry once extracted
    pub uncompressed_size: u64,
    /// Offset of the local file header
    pub local_header_offset: u64,
}

impl EntryInfo {
    /// Whether the stored name is flagged as UTF-8
    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    /// Directory markers are recognised by convention only: no content and a name ending in
    /// `/`. An empty file whose name ends in `/` is indistinguishable from one.
    pub fn kind(&self) -> EntryKind {
        if self.uncompressed_size == 0 && self.name_raw.last() == Some(&b'/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Writing side of an archive codec
///
/// Only one entry may be open at a time: `open_entry` → `write_entry`* → `close_entry`.
pub trait ArchiveWrite {
    /// Start a new entry named `name`
    fn open_entry(&mut self, name: &str, options: EntryOptions) -> Result<()>;

    /// Append bytes to the open entry
    fn write_entry(&mut self, bytes: &[u8]) -> Result<()>;

    /// Finish the open entry
    fn close_entry(&mut self) -> Result<()>;
}

/// Reading side of an archive codec
///
/// The reader keeps a cursor over its entries. Content is read through a value that borrows
/// the reader, so the cursor cannot move while content is open; dropping the value closes it.
pub trait ArchiveRead {
    /// Content stream of the current entry
    type Content<'a>: Read
    where
        Self: 'a;

    /// Move the cursor to the first entry
    fn go_to_first(&mut self) -> Result<Advance>;

    /// Move the cursor past the current entry
    fn go_to_next(&mut self) -> Result<Advance>;

    /// Move the cursor to the first entry named exactly `name`
    fn locate_by_name(&mut self, name: &str) -> bool;

    /// Metadata of the entry under the cursor
    fn current_entry(&self) -> Result<&EntryInfo>;

    /// Open the decompressed content of the entry under the cursor
    fn open_current_entry(&mut self) -> Result<Self::Content<'_>>;
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::archive::{EntryInfo, EntryKind, SizeClass};

    fn entry(name: &str, size: u64) -> EntryInfo {
        EntryInfo {
            name: name.into(),
            name_raw: name.as_bytes().into(),
            uncompressed_size: size,
            ..Default::default()
        }
    }

    #[test]
    fn size_class_threshold() {
        assert_eq!(SizeClass::for_len(0), SizeClass::Standard);
        assert_eq!(SizeClass::for_len(0xFFFF_FFFE), SizeClass::Standard);
        assert_eq!(SizeClass::for_len(0xFFFF_FFFF), SizeClass::Large);
        assert_eq!(SizeClass::for_len(0x1_0000_0000), SizeClass::Large);
    }

    #[test]
    fn directory_needs_trailing_separator_and_no_content() {
        assert_eq!(entry("Up/", 0).kind(), EntryKind::Directory);
        assert_eq!(entry("Up", 0).kind(), EntryKind::File);
        assert_eq!(entry("Up/M.txt", 8).kind(), EntryKind::File);
        assert_eq!(entry("odd/", 3).kind(), EntryKind::File);
    }

    #[test]
    fn empty_file_with_trailing_separator_reads_as_directory() {
        // Accepted ambiguity of the format: there is no stored type tag.
        assert_eq!(entry("empty-file/", 0).kind(), EntryKind::Directory);
    }
}
