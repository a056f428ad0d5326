//! This library streams files, in-memory buffers and directory markers into **ZIP** archives and
//! extracts them back onto a directory tree.
//!
//! The entry-level engine ([`entry_writer`], [`entry_reader`]) talks to the container through the
//! [`archive::ArchiveWrite`] and [`archive::ArchiveRead`] traits. [`ZipWriter`] and
//! [`ZipArchive`] implement them for the ZIP format; [`session`] drives whole archives.
//!
//! ```no_run
//! # fn doit() -> zipper_archive::error::Result<()> {
//! use zipper_archive::session::{ArchiveBuildSession, ArchiveExtractSession, ExtractOptions};
//! use zipper_archive::write::ZipWriterOptions;
//!
//! let mut build = ArchiveBuildSession::create("agents.zip", ZipWriterOptions::default())?;
//! build.add_directory("Up")?;
//! build.add_buffer("Up/M.txt", b"top guy\n")?;
//! build.finish()?;
//!
//! let mut extract = ArchiveExtractSession::open("agents.zip", ExtractOptions::default())?;
//! extract.extract_to("out", &mut ())?;
//! # Ok(())
//! # }
//! ```
//!
//! # ZIP Archive Format
//!
//! A ZIP file is a sequence of entries, each a local header followed by the entry data, closed
//! by a central directory listing every entry and an end record pointing at the directory.
//! Readers start from the end record, so anything in front of the first entry is ignored.
//!
//! ## Local File Header
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: `PK\x03\x04`                                   |
//! | 0x0004         | Version Needed         | 2 bytes: 20, or 45 when ZIP64 fields are used           |
//! | 0x0006         | Flags                  | 2 bytes: bit 11 marks a UTF-8 name                      |
//! | 0x0008         | Compression            | 2 bytes: `0` stored, `8` deflate                        |
//! | 0x000A         | Modified Time          | 2 bytes: MS-DOS time                                    |
//! | 0x000C         | Modified Date          | 2 bytes: MS-DOS date                                    |
//! | 0x000E         | CRC32                  | 4 bytes: checksum of the uncompressed data              |
//! | 0x0012         | Compressed Size        | 4 bytes: `0xFFFFFFFF` when held in the ZIP64 field      |
//! | 0x0016         | Uncompressed Size      | 4 bytes: `0xFFFFFFFF` when held in the ZIP64 field      |
//! | 0x001A         | Name Length            | 2 bytes                                                 |
//! | 0x001C         | Extra Length           | 2 bytes                                                 |
//! | 0x001E         | Name, Extra            | variable                                                |
//!
//! The writer emits the header with a zero checksum and sizes, streams the data, then seeks back
//! and patches the header once the entry is closed.
//!
//! ## Central Directory Header
//!
//! Same fields as the local header, preceded by the `PK\x01\x02` signature and the version made
//! by, followed by a comment length, the starting disk, internal and external attributes and the
//! offset of the local header. External attributes carry the Unix mode in the upper 16 bits
//! (`0100644` for files, `040755` for directories, which also set the MS-DOS directory bit).
//!
//! ## End Of Central Directory
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: `PK\x05\x06`                                   |
//! | 0x0004         | Disk Numbers           | 2 × 2 bytes: always 0                                   |
//! | 0x0008         | Entry Counts           | 2 × 2 bytes: entries on this disk, in total             |
//! | 0x000C         | Directory Size         | 4 bytes                                                 |
//! | 0x0010         | Directory Offset       | 4 bytes                                                 |
//! | 0x0014         | Comment Length         | 2 bytes, followed by the archive comment                |
//!
//! ## ZIP64
//!
//! When a size or offset doesn't fit 32 bits, the header field holds `0xFFFFFFFF` and the real
//! value moves to the extended information extra field (id `0x0001`), which lists the
//! uncompressed size, compressed size and local header offset, each only when its header field
//! is saturated. Entry counts above 16 bits, or a directory beyond 4 GiB, add a ZIP64 end record
//! (`PK\x06\x06`) and its locator (`PK\x06\x07`) in front of the end record.
//!
//! ## Directories
//!
//! The format has no entry type. A directory is an entry with no content whose name ends in `/`,
//! which also means an empty file named that way reads back as a directory.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.zip`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Timestamps**: every entry is dated 1980-01-01 00:00, the MS-DOS epoch
//!

pub mod archive;
pub mod buffer;
pub mod compression;
pub mod entry_reader;
pub mod entry_writer;
pub mod error;
pub mod fs;
pub mod materialize;
pub mod read;
pub mod session;
pub mod types;
pub mod write;

pub use archive::{Advance, ArchiveRead, ArchiveWrite, EntryKind, EntryOptions, SizeClass};
pub use buffer::ByteAccumulator;
pub use compression::CompressionMethod;
pub use entry_reader::EntryReader;
pub use entry_writer::EntryWriter;
pub use materialize::{DirectoryMaterializer, PathSeparator};
pub use read::ZipArchive;
pub use session::{ArchiveBuildSession, ArchiveExtractSession};
pub use write::ZipWriter;
