//! Types for reading ZIP archives
//!

use binrw::BinRead;
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::{debug, instrument};

use crate::{
    archive::{Advance, ArchiveRead, EntryInfo},
    compression::{CompressionMethod, EntryDataReader, ZIP_CRC},
    error::{Error, FileNotFoundError, Result},
    types::{
        CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, Zip64EndOfCentralDirectory,
        Zip64EndOfCentralDirectoryLocator, Zip64ExtraField, END_OF_CENTRAL_DIRECTORY_SIZE,
        LOCAL_HEADER_SIZE, ZIP64_LOCATOR_SIZE,
    },
};

const END_OF_CENTRAL_DIRECTORY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// A struct for reading the content of an entry from a ZIP file
///
/// The CRC-32 and size recorded in the central directory are checked once the content has been
/// read to its end; a mismatch surfaces as an [`io::ErrorKind::InvalidData`] error.
pub struct ZipEntryContent<'a, R: Read + Seek> {
    info: &'a EntryInfo,
    reader: EntryDataReader<&'a mut R>,
    digest: Option<crc::Digest<'static, u32>>,
    total: u64,
}

impl<'a, R: Read + Seek> Debug for ZipEntryContent<'a, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ZipEntryContent({:#?})", self.info)
    }
}

/// Methods for retrieving information on ZIP file entries
impl<'a, R: Read + Seek> ZipEntryContent<'a, R> {
    /// Get the name of the entry
    ///
    /// See [`EntryInfo::name`] before using it to build a path.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get the size of the entry, in bytes, when uncompressed
    pub fn size(&self) -> u64 {
        self.info.uncompressed_size
    }
}

impl<R: Read + Seek> Read for ZipEntryContent<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.reader.read(buf)?;

        if count > 0 {
            if let Some(digest) = self.digest.as_mut() {
                digest.update(&buf[..count]);
            }
            self.total += count as u64;
            return Ok(count);
        }

        if let Some(digest) = self.digest.take() {
            if self.total != self.info.uncompressed_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "entry {} is {} bytes long, expected {}",
                        self.info.name, self.total, self.info.uncompressed_size
                    ),
                ));
            }
            if digest.finalize() != self.info.crc32 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid checksum for entry {}", self.info.name),
                ));
            }
        }

        Ok(0)
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    entries: Vec<EntryInfo>,
    names: IndexMap<Box<str>, usize>,
    comment: Vec<u8>,
}

/// ZIP archive reader
///
/// Besides random access through [`ZipArchive::by_index`] and [`ZipArchive::by_name`], the
/// archive keeps a cursor used through [`ArchiveRead`].
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_zip_contents(reader: impl Read + Seek) -> zipper_archive::error::Result<()> {
///     let mut zip = zipper_archive::ZipArchive::new(reader)?;
///
///     for i in 0..zip.len() {
///         let mut file = zip.by_index(i)?;
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct ZipArchive<R> {
    reader: R,
    shared: Arc<Shared>,
    position: usize,
}

impl<R> ZipArchive<R> {
    /// Number of entries contained in this ZIP, duplicates included.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether this ZIP archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The archive comment, as stored
    pub fn comment(&self) -> &[u8] {
        &self.shared.comment
    }

    /// Returns an iterator over all the file and directory names in this archive, in order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.entries.iter().map(|e| e.name.as_ref())
    }

    /// Returns an iterator over the metadata of every entry, in order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryInfo> {
        self.shared.entries.iter()
    }

    /// Get the index of the first entry with this name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.names.get(name).copied()
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ZipArchive<BufReader<File>> {
    /// Open the archive at `path`
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(path.as_ref())?;
        ZipArchive::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Read a ZIP archive collecting the entries it contains.
    ///
    /// The cursor starts on the first entry.
    pub fn new(mut reader: R) -> Result<ZipArchive<R>> {
        let shared = Self::get_metadata(&mut reader)?;
        debug!(entries = shared.entries.len(), "read central directory");

        Ok(ZipArchive {
            reader,
            shared: shared.into(),
            position: 0,
        })
    }

    /// Search for an entry by name
    pub fn by_name(&mut self, name: &str) -> Result<ZipEntryContent<'_, R>> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained entry by index
    pub fn by_index(&mut self, file_number: usize) -> Result<ZipEntryContent<'_, R>> {
        let info = self
            .shared
            .entries
            .get(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;
        let method = CompressionMethod::try_from(info.compression)?;

        self.reader.seek(SeekFrom::Start(info.local_header_offset))?;
        let header = LocalFileHeader::read(&mut self.reader)?;
        let data_start = info.local_header_offset
            + LOCAL_HEADER_SIZE
            + header.name.len() as u64
            + header.extra.len() as u64;
        self.reader.seek(SeekFrom::Start(data_start))?;

        Ok(ZipEntryContent {
            info,
            reader: EntryDataReader::new(&mut self.reader, info.compressed_size, method),
            digest: Some(ZIP_CRC.digest()),
            total: 0,
        })
    }

    fn find_end_record(reader: &mut R) -> Result<(u64, EndOfCentralDirectory)> {
        let length = reader.seek(SeekFrom::End(0))?;
        if length < END_OF_CENTRAL_DIRECTORY_SIZE {
            return Err(Error::InvalidArchive("file is too short"));
        }

        // The end record is followed by at most a 65535 byte comment.
        let tail_start = length.saturating_sub(END_OF_CENTRAL_DIRECTORY_SIZE + u16::MAX as u64);
        let mut tail = vec![0; (length - tail_start) as usize];
        reader.seek(SeekFrom::Start(tail_start))?;
        reader.read_exact(&mut tail)?;

        let last = tail.len() - END_OF_CENTRAL_DIRECTORY_SIZE as usize;
        for offset in (0..=last).rev() {
            if &tail[offset..offset + 4] != END_OF_CENTRAL_DIRECTORY_MAGIC {
                continue;
            }
            let mut cursor = io::Cursor::new(&tail[offset..]);
            if let Ok(record) = EndOfCentralDirectory::read(&mut cursor) {
                return Ok((tail_start + offset as u64, record));
            }
        }

        Err(Error::InvalidArchive("could not find end of central directory"))
    }

    fn find_zip64_end_record(
        reader: &mut R,
        end_offset: u64,
    ) -> Result<Option<Zip64EndOfCentralDirectory>> {
        if end_offset < ZIP64_LOCATOR_SIZE {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(end_offset - ZIP64_LOCATOR_SIZE))?;
        let Ok(locator) = Zip64EndOfCentralDirectoryLocator::read(reader) else {
            return Ok(None);
        };

        reader.seek(SeekFrom::Start(locator.end_offset))?;
        Ok(Some(Zip64EndOfCentralDirectory::read(reader)?))
    }

    fn entry_info(header: CentralDirectoryHeader) -> Result<EntryInfo> {
        let needs_uncompressed = header.uncompressed_size == u32::MAX;
        let needs_compressed = header.compressed_size == u32::MAX;
        let needs_offset = header.local_header_offset == u32::MAX;

        let mut info = EntryInfo {
            name: String::from_utf8_lossy(&header.name).into(),
            name_raw: header.name.into(),
            flags: header.flags,
            compression: header.compression,
            crc32: header.crc32,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            local_header_offset: header.local_header_offset as u64,
        };

        if needs_uncompressed || needs_compressed || needs_offset {
            let zip64 = Zip64ExtraField::find(
                &header.extra,
                needs_uncompressed,
                needs_compressed,
                needs_offset,
            )?
            .ok_or(Error::InvalidArchive("missing zip64 extra field"))?;

            if let Some(size) = zip64.uncompressed_size {
                info.uncompressed_size = size;
            }
            if let Some(size) = zip64.compressed_size {
                info.compressed_size = size;
            }
            if let Some(offset) = zip64.local_header_offset {
                info.local_header_offset = offset;
            }
        }

        Ok(info)
    }

    fn get_metadata(reader: &mut R) -> Result<Shared> {
        let (end_offset, end) = Self::find_end_record(reader)?;

        let (count, directory_offset) = match Self::find_zip64_end_record(reader, end_offset)? {
            Some(zip64) => (zip64.entries_total, zip64.central_directory_offset),
            None => (
                end.entries_total as u64,
                end.central_directory_offset as u64,
            ),
        };

        if directory_offset > end_offset {
            return Err(Error::InvalidArchive("central directory offset is out of range"));
        }

        reader.seek(SeekFrom::Start(directory_offset))?;
        let mut entries = Vec::new();
        entries.try_reserve(count.min(u16::MAX as u64) as usize)?;
        let mut names = IndexMap::with_capacity(entries.capacity());

        for index in 0..count as usize {
            let header = CentralDirectoryHeader::read(reader)?;
            let info = Self::entry_info(header)?;
            names.entry(info.name.clone()).or_insert(index);
            entries.push(info);
        }

        Ok(Shared {
            entries,
            names,
            comment: end.comment,
        })
    }
}

impl<R: Read + Seek> ArchiveRead for ZipArchive<R> {
    type Content<'a> = ZipEntryContent<'a, R> where Self: 'a;

    fn go_to_first(&mut self) -> Result<Advance> {
        self.position = 0;
        Ok(if self.is_empty() {
            Advance::EndOfArchive
        } else {
            Advance::Entry
        })
    }

    fn go_to_next(&mut self) -> Result<Advance> {
        if self.position < self.len() {
            self.position += 1;
        }
        Ok(if self.position < self.len() {
            Advance::Entry
        } else {
            Advance::EndOfArchive
        })
    }

    fn locate_by_name(&mut self, name: &str) -> bool {
        match self.index_for_name(name) {
            Some(index) => {
                self.position = index;
                true
            }
            None => false,
        }
    }

    fn current_entry(&self) -> Result<&EntryInfo> {
        self.shared
            .entries
            .get(self.position)
            .ok_or(Error::NoCurrentEntry)
    }

    fn open_current_entry(&mut self) -> Result<Self::Content<'_>> {
        if self.position >= self.len() {
            return Err(Error::NoCurrentEntry);
        }
        self.by_index(self.position)
    }
}
