//! Base types for the on-disk structure of a ZIP file.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Size of a local file header before its name and extra field
pub const LOCAL_HEADER_SIZE: u64 = 30;

/// Offset of the CRC-32 field inside a local file header
pub const LOCAL_HEADER_CRC_OFFSET: u64 = 14;

/// Size of the end of central directory record without its comment
pub const END_OF_CENTRAL_DIRECTORY_SIZE: u64 = 22;

/// Size of the ZIP64 end of central directory locator
pub const ZIP64_LOCATOR_SIZE: u64 = 20;

/// Any size or offset at or above this value needs ZIP64 framing
pub const ZIP64_BYTES_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Entry counts at or above this value need a ZIP64 end record
pub const ZIP64_ENTRY_THRESHOLD: u64 = 0xFFFF;

/// Header id of the ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// General purpose flag marking the entry name as UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Version needed to extract a regular entry (deflate)
pub const VERSION_DEFAULT: u16 = 20;

/// Version needed to extract an entry using ZIP64 framing
pub const VERSION_ZIP64: u16 = 45;

/// Unix host, APPNOTE version 4.5
pub const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_ZIP64;

/// MS-DOS date for 1980-01-01, the earliest representable day
pub const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;

/// External attributes for a regular file (`0100644`)
pub const FILE_ATTRIBUTES: u32 = 0o100644 << 16;

/// External attributes for a directory (`040755` plus the MS-DOS directory bit)
pub const DIRECTORY_ATTRIBUTES: u32 = (0o040755 << 16) | 0x10;

/// ZIP local file header
///
/// Precedes the data of every entry. The sizes and checksum are patched in place once the entry
/// data has been written.
#[binrw]
#[brw(magic = b"PK\x03\x04", little)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalFileHeader {
    /// Minimum APPNOTE version needed to extract the entry
    pub version_needed: u16,

    /// General purpose bit flags
    pub flags: u16,

    /// Raw compression method
    pub compression: u16,

    /// MS-DOS modification time
    pub modified_time: u16,

    /// MS-DOS modification date
    pub modified_date: u16,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Size of the stored data, `0xFFFFFFFF` when held in the ZIP64 extra field
    pub compressed_size: u32,

    /// Size of the data once extracted, `0xFFFFFFFF` when held in the ZIP64 extra field
    pub uncompressed_size: u32,

    #[bw(calc = name.len() as u16)]
    name_length: u16,

    #[bw(calc = extra.len() as u16)]
    extra_length: u16,

    /// Raw entry name
    #[br(count = name_length)]
    pub name: Vec<u8>,

    /// Raw extra field block
    #[br(count = extra_length)]
    pub extra: Vec<u8>,
}

/// ZIP central directory file header
#[binrw]
#[brw(magic = b"PK\x01\x02", little)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentralDirectoryHeader {
    /// Host system and APPNOTE version that wrote the entry
    pub version_made_by: u16,

    /// Minimum APPNOTE version needed to extract the entry
    pub version_needed: u16,

    /// General purpose bit flags
    pub flags: u16,

    /// Raw compression method
    pub compression: u16,

    /// MS-DOS modification time
    pub modified_time: u16,

    /// MS-DOS modification date
    pub modified_date: u16,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Size of the stored data
    pub compressed_size: u32,

    /// Size of the data once extracted
    pub uncompressed_size: u32,

    #[bw(calc = name.len() as u16)]
    name_length: u16,

    #[bw(calc = extra.len() as u16)]
    extra_length: u16,

    #[bw(calc = comment.len() as u16)]
    comment_length: u16,

    /// Disk on which the entry starts
    pub disk_number_start: u16,

    /// Internal file attributes
    pub internal_attributes: u16,

    /// Host dependent file attributes
    pub external_attributes: u32,

    /// Offset from the start of the archive to the local file header
    pub local_header_offset: u32,

    /// Raw entry name
    #[br(count = name_length)]
    pub name: Vec<u8>,

    /// Raw extra field block
    #[br(count = extra_length)]
    pub extra: Vec<u8>,

    /// Raw entry comment
    #[br(count = comment_length)]
    pub comment: Vec<u8>,
}

/// ZIP end of central directory record
#[binrw]
#[brw(magic = b"PK\x05\x06", little)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk
    pub disk_number: u16,

    /// Disk holding the start of the central directory
    pub central_directory_disk: u16,

    /// Entries in the central directory on this disk
    pub entries_on_disk: u16,

    /// Entries in the central directory
    pub entries_total: u16,

    /// Size of the central directory in bytes
    pub central_directory_size: u32,

    /// Offset from the start of the archive to the central directory
    pub central_directory_offset: u32,

    #[bw(calc = comment.len() as u16)]
    comment_length: u16,

    /// Archive comment
    #[br(count = comment_length)]
    pub comment: Vec<u8>,
}

/// ZIP64 end of central directory record
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq)]
#[brw(magic = b"PK\x06\x06", little)]
pub struct Zip64EndOfCentralDirectory {
    /// Size of the remaining record, always 44 for the version written here
    pub record_size: u64,

    /// Host system and APPNOTE version that wrote the archive
    pub version_made_by: u16,

    /// Minimum APPNOTE version needed to extract
    pub version_needed: u16,

    /// Number of this disk
    pub disk_number: u32,

    /// Disk holding the start of the central directory
    pub central_directory_disk: u32,

    /// Entries in the central directory on this disk
    pub entries_on_disk: u64,

    /// Entries in the central directory
    pub entries_total: u64,

    /// Size of the central directory in bytes
    pub central_directory_size: u64,

    /// Offset from the start of the archive to the central directory
    pub central_directory_offset: u64,
}

/// ZIP64 end of central directory locator
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq)]
#[brw(magic = b"PK\x06\x07", little)]
pub struct Zip64EndOfCentralDirectoryLocator {
    /// Disk holding the ZIP64 end record
    pub end_disk: u32,

    /// Offset from the start of the archive to the ZIP64 end record
    pub end_offset: u64,

    /// Total number of disks
    pub total_disks: u32,
}

/// ZIP64 extended information extra field
///
/// Only the values whose 32-bit counterpart in the header holds `0xFFFFFFFF` are present, in
/// this order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
}

impl Zip64ExtraField {
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.local_header_offset.is_none()
    }

    /// Encode the field including its header id and data size
    pub fn serialize(&self) -> Vec<u8> {
        let values = [
            self.uncompressed_size,
            self.compressed_size,
            self.local_header_offset,
        ];
        let values = values.iter().flatten();

        let mut out = Vec::with_capacity(4 + 3 * 8);
        out.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        out.extend_from_slice(&((values.clone().count() * 8) as u16).to_le_bytes());
        for value in values {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Look for the ZIP64 field in an extra field block and decode the requested values
    pub fn find(
        extra: &[u8],
        uncompressed_size: bool,
        compressed_size: bool,
        local_header_offset: bool,
    ) -> Result<Option<Self>> {
        let mut cursor = Cursor::new(extra);
        let total = extra.len() as u64;

        while cursor.position() + 4 <= total {
            let id = cursor.read_u16::<LittleEndian>()?;
            let size = cursor.read_u16::<LittleEndian>()? as u64;
            let data_start = cursor.position();
            if data_start + size > total {
                return Err(Error::InvalidArchive("extra field overruns its block"));
            }

            if id != ZIP64_EXTRA_ID {
                cursor.set_position(data_start + size);
                continue;
            }

            let mut field = Self::default();
            if uncompressed_size {
                field.uncompressed_size = Some(cursor.read_u64::<LittleEndian>()?);
            }
            if compressed_size {
                field.compressed_size = Some(cursor.read_u64::<LittleEndian>()?);
            }
            if local_header_offset {
                field.local_header_offset = Some(cursor.read_u64::<LittleEndian>()?);
            }
            if cursor.position() > data_start + size {
                return Err(Error::InvalidArchive("zip64 extra field is too short"));
            }
            return Ok(Some(field));
        }

        Ok(None)
    }
}
