//! Entry data compression and decompression handling.

use std::io::{self, Read, Write};

use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// CRC-32 as used by ZIP (ISO-HDLC, reflected, polynomial `0x04C11DB7`)
pub(crate) static ZIP_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Identifies the storage format used for an entry inside the ZIP file
///
/// Files added through [`crate::write::ZipWriter::start_entry`] pick their method through
/// [`crate::archive::EntryOptions`]. Directory markers are always stored.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    Stored,

    /// Compress the data using raw deflate
    #[default]
    Deflated,
}

impl CompressionMethod {
    /// The method id as written in the file headers
    pub const fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
        }
    }
}

impl TryFrom<u16> for CompressionMethod {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(CompressionMethod::Stored),
            8 => Ok(CompressionMethod::Deflated),
            other => Err(Error::UnsupportedCompression(other)),
        }
    }
}

pub(crate) enum EntryDataReader<R: Read> {
    Raw(io::Take<R>),
    Compressed(Box<DeflateDecoder<io::Take<R>>>),
}

impl<R: Read> EntryDataReader<R> {
    /// Wrap a reader positioned at the start of the entry data, limited to the stored size
    #[instrument(skip(reader))]
    pub fn new(reader: R, limit: u64, compression: CompressionMethod) -> Self {
        let limit_reader = reader.take(limit);
        match compression {
            CompressionMethod::Stored => EntryDataReader::Raw(limit_reader),
            CompressionMethod::Deflated => {
                EntryDataReader::Compressed(Box::new(DeflateDecoder::new(limit_reader)))
            }
        }
    }
}

impl<R: Read> Read for EntryDataReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryDataReader::Raw(r) => r.read(buf),
            EntryDataReader::Compressed(r) => r.read(buf),
        }
    }
}

/// Compresses entry data into an in-memory block that the archive writer drains after every
/// write.
pub(crate) enum EntryDataWriter<W: Write> {
    Raw(W),
    Compressed(Box<DeflateEncoder<W>>),
}

impl<W: Write> EntryDataWriter<W> {
    #[instrument(skip(writer))]
    pub fn new(writer: W, compression: CompressionMethod, level: u32) -> Self {
        match compression {
            CompressionMethod::Stored => EntryDataWriter::Raw(writer),
            CompressionMethod::Deflated => EntryDataWriter::Compressed(Box::new(
                DeflateEncoder::new(writer, Compression::new(level)),
            )),
        }
    }

    /// Output produced so far that has not been taken yet
    pub fn pending_mut(&mut self) -> &mut W {
        match self {
            EntryDataWriter::Raw(w) => w,
            EntryDataWriter::Compressed(w) => w.get_mut(),
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<W> {
        match self {
            EntryDataWriter::Raw(w) => Ok(w),
            EntryDataWriter::Compressed(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for EntryDataWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EntryDataWriter::Raw(w) => w.write(buf),
            EntryDataWriter::Compressed(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EntryDataWriter::Raw(w) => w.flush(),
            EntryDataWriter::Compressed(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;

    use crate::compression::{CompressionMethod, EntryDataReader, EntryDataWriter, ZIP_CRC};
    use crate::error::{Error, Result};

    #[test]
    fn method_ids() -> Result<()> {
        assert_eq!(CompressionMethod::try_from(0)?, CompressionMethod::Stored);
        assert_eq!(CompressionMethod::try_from(8)?, CompressionMethod::Deflated);
        assert!(matches!(
            CompressionMethod::try_from(12),
            Err(Error::UnsupportedCompression(12))
        ));
        Ok(())
    }

    #[test]
    fn crc_check_value() {
        assert_eq!(ZIP_CRC.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn deflated_block_reads_back_within_limit() -> Result<()> {
        let mut writer = EntryDataWriter::new(Vec::new(), CompressionMethod::Deflated, 6);
        writer.write_all(b"secret agent\n")?;
        let mut block = writer.finalize()?;
        let stored = block.len() as u64;
        block.extend_from_slice(b"trailing bytes of the next header");

        let mut actual = Vec::new();
        EntryDataReader::new(block.as_slice(), stored, CompressionMethod::Deflated)
            .read_to_end(&mut actual)?;

        assert_eq!(actual, b"secret agent\n");
        Ok(())
    }
}
