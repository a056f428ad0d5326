//! Types for writing ZIP archives
//!

use binrw::BinWrite;
use bon::Builder;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, instrument, Level};

use crate::archive::{ArchiveWrite, EntryOptions, SizeClass};
use crate::compression::{CompressionMethod, EntryDataWriter, ZIP_CRC};
use crate::error::{Error, Result};
use crate::types::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, Zip64EndOfCentralDirectory,
    Zip64EndOfCentralDirectoryLocator, Zip64ExtraField, DIRECTORY_ATTRIBUTES, DOS_EPOCH_DATE,
    FILE_ATTRIBUTES, FLAG_UTF8, LOCAL_HEADER_CRC_OFFSET, LOCAL_HEADER_SIZE, VERSION_DEFAULT,
    VERSION_MADE_BY, VERSION_ZIP64, ZIP64_BYTES_THRESHOLD, ZIP64_ENTRY_THRESHOLD,
};

/// Options for how the ZIP file should be written
#[derive(Debug, Clone, Builder)]
pub struct ZipWriterOptions {
    /// Deflate level used for compressed entries, 0 to 9
    #[builder(default = 6)]
    pub compression_level: u32,

    /// Archive comment stored in the end record
    #[builder(default)]
    pub comment: String,
}

impl Default for ZipWriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything the central directory needs to know about a finished entry
#[derive(Debug, Clone)]
struct EntryRecord {
    name: Vec<u8>,
    flags: u16,
    compression: CompressionMethod,
    size_class: SizeClass,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    header_start: u64,
    data_start: u64,
}

impl EntryRecord {
    fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    fn central_header(&self) -> CentralDirectoryHeader {
        let large = self.size_class == SizeClass::Large;
        let far = self.header_start >= ZIP64_BYTES_THRESHOLD;

        let zip64 = Zip64ExtraField {
            uncompressed_size: large.then_some(self.uncompressed_size),
            compressed_size: large.then_some(self.compressed_size),
            local_header_offset: far.then_some(self.header_start),
        };

        CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: if large || far {
                VERSION_ZIP64
            } else {
                VERSION_DEFAULT
            },
            flags: self.flags,
            compression: self.compression.as_u16(),
            modified_time: 0,
            modified_date: DOS_EPOCH_DATE,
            crc32: self.crc32,
            compressed_size: clamp_u32(self.compressed_size, large),
            uncompressed_size: clamp_u32(self.uncompressed_size, large),
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: if self.is_directory() {
                DIRECTORY_ATTRIBUTES
            } else {
                FILE_ATTRIBUTES
            },
            local_header_offset: clamp_u32(self.header_start, far),
            name: self.name.clone(),
            extra: if zip64.is_empty() {
                Vec::new()
            } else {
                zip64.serialize()
            },
            comment: Vec::new(),
        }
    }
}

fn clamp_u32(value: u64, zip64: bool) -> u32 {
    if zip64 {
        u32::MAX
    } else {
        value as u32
    }
}

struct OpenEntry {
    record: EntryRecord,
    data: EntryDataWriter<Vec<u8>>,
    digest: crc::Digest<'static, u32>,
    uncompressed: u64,
}

/// ZIP archive generator
///
/// ```
/// # fn doit() -> zipper_archive::error::Result<()>
/// # {
/// # use zipper_archive::ZipWriter;
/// use std::io::Write;
/// use zipper_archive::archive::EntryOptions;
/// use zipper_archive::write::ZipWriterOptions;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()), ZipWriterOptions::default());
///
/// zip.start_entry("hello_world.txt", EntryOptions::default())?;
/// zip.write_all(b"Hello, World!")?;
/// zip.finish_entry()?;
///
/// // Write the central directory.
/// zip.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct ZipWriter<W: Write + Seek> {
    inner: W,
    options: ZipWriterOptions,
    records: Vec<EntryRecord>,
    current: Option<OpenEntry>,
}

impl ZipWriter<BufWriter<File>> {
    /// Create (or truncate) the archive at `path`
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn create(
        path: impl AsRef<Path>,
        options: ZipWriterOptions,
    ) -> Result<ZipWriter<BufWriter<File>>> {
        let file = File::create(path.as_ref())?;
        Ok(ZipWriter::new(BufWriter::new(file), options))
    }
}

impl<W: Write + Seek> ZipWriter<W> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`ZipWriter::start_entry`] function should be called.
    /// Offsets are taken from the stream position of `inner`, so data already in front of the
    /// archive (a self-extracting stub, for example) is preserved.
    pub fn new(inner: W, options: ZipWriterOptions) -> ZipWriter<W> {
        ZipWriter {
            inner,
            options,
            records: Vec::new(),
            current: None,
        }
    }

    /// Returns true if an entry is currently open for writing.
    pub const fn is_writing_entry(&self) -> bool {
        self.current.is_some()
    }

    /// Number of entries finished so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no entry has been finished yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Start a new entry with the requested framing.
    ///
    /// Fails with [`Error::EntryAlreadyOpen`] while another entry is still open.
    #[instrument(skip(self), err)]
    pub fn start_entry(&mut self, name: &str, options: EntryOptions) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::EntryAlreadyOpen);
        }
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::CustomError(format!(
                "entry name is longer than {} bytes",
                u16::MAX
            )));
        }

        let header_start = self.inner.stream_position()?;
        let large = options.size_class == SizeClass::Large;
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };

        let header = LocalFileHeader {
            version_needed: if large { VERSION_ZIP64 } else { VERSION_DEFAULT },
            flags,
            compression: options.compression.as_u16(),
            modified_time: 0,
            modified_date: DOS_EPOCH_DATE,
            crc32: 0,
            compressed_size: clamp_u32(0, large),
            uncompressed_size: clamp_u32(0, large),
            name: name.as_bytes().to_vec(),
            extra: if large {
                Zip64ExtraField {
                    uncompressed_size: Some(0),
                    compressed_size: Some(0),
                    local_header_offset: None,
                }
                .serialize()
            } else {
                Vec::new()
            },
        };
        header.write(&mut self.inner)?;

        let data_start = self.inner.stream_position()?;
        debug!(header_start, data_start, "opened entry");

        self.current = Some(OpenEntry {
            record: EntryRecord {
                name: header.name,
                flags,
                compression: options.compression,
                size_class: options.size_class,
                crc32: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                header_start,
                data_start,
            },
            data: EntryDataWriter::new(
                Vec::new(),
                options.compression,
                self.options.compression_level,
            ),
            digest: ZIP_CRC.digest(),
            uncompressed: 0,
        });

        Ok(())
    }

    /// Finish the open entry, patching its local header with the final sizes and checksum
    #[instrument(skip(self), err)]
    pub fn finish_entry(&mut self) -> Result<()> {
        let OpenEntry {
            mut record,
            data,
            digest,
            uncompressed,
        } = self.current.take().ok_or(Error::NoEntryOpen)?;

        let rest = data.finalize()?;
        self.inner.write_all(&rest)?;
        let end = self.inner.stream_position()?;

        record.crc32 = digest.finalize();
        record.uncompressed_size = uncompressed;
        record.compressed_size = end - record.data_start;

        if record.size_class == SizeClass::Standard
            && record.compressed_size >= ZIP64_BYTES_THRESHOLD
        {
            return Err(Error::EntryTooLarge(
                String::from_utf8_lossy(&record.name).into_owned(),
            ));
        }

        self.patch_local_header(&record)?;
        self.inner.seek(SeekFrom::Start(end))?;

        debug!(
            crc32 = record.crc32,
            compressed = record.compressed_size,
            uncompressed = record.uncompressed_size,
            "closed entry"
        );
        self.records.push(record);

        Ok(())
    }

    fn patch_local_header(&mut self, record: &EntryRecord) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(
            record.header_start + LOCAL_HEADER_CRC_OFFSET,
        ))?;
        self.inner.write_u32::<LittleEndian>(record.crc32)?;

        match record.size_class {
            SizeClass::Standard => {
                self.inner
                    .write_u32::<LittleEndian>(record.compressed_size as u32)?;
                self.inner
                    .write_u32::<LittleEndian>(record.uncompressed_size as u32)?;
            }
            SizeClass::Large => {
                // Skip the 32-bit fields and the extra field header (id and size).
                self.inner.seek(SeekFrom::Start(
                    record.header_start + LOCAL_HEADER_SIZE + record.name.len() as u64 + 4,
                ))?;
                self.inner
                    .write_u64::<LittleEndian>(record.uncompressed_size)?;
                self.inner.write_u64::<LittleEndian>(record.compressed_size)?;
            }
        }

        Ok(())
    }

    /// Finish the last entry and write the central directory and end records
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        if self.current.is_some() {
            self.finish_entry()?;
        }
        if self.options.comment.len() > u16::MAX as usize {
            return Err(Error::CustomError(format!(
                "archive comment is longer than {} bytes",
                u16::MAX
            )));
        }

        let central_start = self.inner.stream_position()?;
        for record in &self.records {
            record.central_header().write(&mut self.inner)?;
        }
        let central_end = self.inner.stream_position()?;
        let central_size = central_end - central_start;
        let count = self.records.len() as u64;

        let zip64 = count >= ZIP64_ENTRY_THRESHOLD
            || central_start >= ZIP64_BYTES_THRESHOLD
            || central_size >= ZIP64_BYTES_THRESHOLD;

        if zip64 {
            Zip64EndOfCentralDirectory {
                record_size: 44,
                version_made_by: VERSION_MADE_BY,
                version_needed: VERSION_ZIP64,
                disk_number: 0,
                central_directory_disk: 0,
                entries_on_disk: count,
                entries_total: count,
                central_directory_size: central_size,
                central_directory_offset: central_start,
            }
            .write(&mut self.inner)?;

            Zip64EndOfCentralDirectoryLocator {
                end_disk: 0,
                end_offset: central_end,
                total_disks: 1,
            }
            .write(&mut self.inner)?;
        }

        let entries = count.min(ZIP64_ENTRY_THRESHOLD) as u16;
        EndOfCentralDirectory {
            disk_number: 0,
            central_directory_disk: 0,
            entries_on_disk: entries,
            entries_total: entries,
            central_directory_size: central_size.min(ZIP64_BYTES_THRESHOLD) as u32,
            central_directory_offset: central_start.min(ZIP64_BYTES_THRESHOLD) as u32,
            comment: self.options.comment.as_bytes().to_vec(),
        }
        .write(&mut self.inner)?;

        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for ZipWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(entry) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No entry has been started",
            ));
        };

        if entry.record.size_class == SizeClass::Standard
            && entry.uncompressed + buf.len() as u64 >= ZIP64_BYTES_THRESHOLD
        {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "entry outgrew 32-bit sizes without large framing",
            ));
        }

        let written = entry.data.write(buf)?;
        entry.digest.update(&buf[..written]);
        entry.uncompressed += written as u64;

        let pending = entry.data.pending_mut();
        self.inner.write_all(pending)?;
        pending.clear();

        Ok(written)
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> ArchiveWrite for ZipWriter<W> {
    fn open_entry(&mut self, name: &str, options: EntryOptions) -> Result<()> {
        self.start_entry(name, options)
    }

    fn write_entry(&mut self, bytes: &[u8]) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::NoEntryOpen);
        }
        self.write_all(bytes)?;
        Ok(())
    }

    fn close_entry(&mut self) -> Result<()> {
        self.finish_entry()
    }
}

#[cfg(test)]
mod test {
    use binrw::BinRead;
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use crate::archive::{EntryOptions, SizeClass};
    use crate::compression::{CompressionMethod, ZIP_CRC};
    use crate::error::{Error, Result};
    use crate::types::{CentralDirectoryHeader, LocalFileHeader, Zip64ExtraField};
    use crate::write::{ZipWriter, ZipWriterOptions};
    use std::io::{Cursor, Seek, SeekFrom, Write};

    fn stored() -> EntryOptions {
        EntryOptions::builder()
            .compression(CompressionMethod::Stored)
            .build()
    }

    #[traced_test]
    #[test]
    fn zip_empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            // End record
            0x50, 0x4B, 0x05, 0x06,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];

        let writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        let result = writer.finish()?;
        assert_eq!(result.get_ref().len(), expected.len());
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[traced_test]
    #[test]
    fn zip_stored_entry_write() -> Result<()> {
        let file_data = b"secretary\n";

        #[rustfmt::skip]
        let mut expected: Vec<u8> = vec![
            // Local header
            0x50, 0x4B, 0x03, 0x04,
            0x14, 0x00,
            0x00, 0x00,
            0x00, 0x00,
            0x00, 0x00,
            0x21, 0x00,
        ];
        expected.extend_from_slice(&ZIP_CRC.checksum(file_data).to_le_bytes());
        #[rustfmt::skip]
        expected.extend_from_slice(&[
            0x0A, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
            0x01, 0x00,
            0x00, 0x00,
            0x6D,
        ]);
        expected.extend_from_slice(file_data);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        writer.start_entry("m", stored())?;
        writer.write_all(file_data)?;
        writer.finish_entry()?;

        let result = writer.finish()?;
        assert_str_eq!(
            format!("{:02X?}", &result.get_ref()[..expected.len()]),
            format!("{:02X?}", expected)
        );

        // Central header follows the data, end record closes the file.
        let mut cursor = Cursor::new(result.into_inner());
        cursor.seek(SeekFrom::Start(expected.len() as u64))?;
        let central = CentralDirectoryHeader::read(&mut cursor)?;
        assert_eq!(central.name, b"m");
        assert_eq!(central.compressed_size, 10);
        assert_eq!(central.local_header_offset, 0);
        assert!(central.extra.is_empty());

        Ok(())
    }

    #[traced_test]
    #[test]
    fn zip_second_entry_while_open_is_rejected() -> Result<()> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        writer.start_entry("first", EntryOptions::default())?;

        assert!(matches!(
            writer.start_entry("second", EntryOptions::default()),
            Err(Error::EntryAlreadyOpen)
        ));
        assert!(writer.is_writing_entry());

        writer.finish_entry()?;
        assert!(matches!(writer.finish_entry(), Err(Error::NoEntryOpen)));
        assert_eq!(writer.len(), 1);

        Ok(())
    }

    #[test]
    fn zip_write_without_entry_fails() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        assert!(writer.write_all(b"orphan").is_err());
    }

    #[traced_test]
    #[test]
    fn zip_large_entry_uses_zip64_framing() -> Result<()> {
        let file_data = b"top guy\n";

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        writer.start_entry(
            "Up/M.txt",
            EntryOptions::builder()
                .compression(CompressionMethod::Stored)
                .size_class(SizeClass::Large)
                .build(),
        )?;
        writer.write_all(file_data)?;
        writer.finish_entry()?;

        let mut cursor = writer.finish()?;
        cursor.rewind()?;

        let local = LocalFileHeader::read(&mut cursor)?;
        assert_eq!(local.version_needed, 45);
        assert_eq!(local.compressed_size, u32::MAX);
        assert_eq!(local.uncompressed_size, u32::MAX);
        assert_eq!(local.crc32, ZIP_CRC.checksum(file_data));
        assert_eq!(
            Zip64ExtraField::find(&local.extra, true, true, false)?,
            Some(Zip64ExtraField {
                uncompressed_size: Some(8),
                compressed_size: Some(8),
                local_header_offset: None,
            })
        );

        cursor.seek(SeekFrom::Current(file_data.len() as i64))?;
        let central = CentralDirectoryHeader::read(&mut cursor)?;
        assert_eq!(central.uncompressed_size, u32::MAX);
        assert_eq!(
            Zip64ExtraField::find(&central.extra, true, true, false)?
                .and_then(|f| f.uncompressed_size),
            Some(8)
        );

        Ok(())
    }

    #[test]
    fn zip_non_ascii_name_sets_utf8_flag() -> Result<()> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()), ZipWriterOptions::default());
        writer.start_entry("résumé.txt", stored())?;
        writer.finish_entry()?;

        let mut cursor = writer.finish()?;
        cursor.rewind()?;
        let local = LocalFileHeader::read(&mut cursor)?;
        assert_eq!(local.flags, 1 << 11);

        Ok(())
    }
}
