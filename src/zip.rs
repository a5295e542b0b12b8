use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use binrw::BinRead;
use num_enum::TryFromPrimitive;

/// Compression methods that appear in engine pakfiles.
///
/// https://sourcegraph.com/github.com/lua9520/source-engine-2018-hl2_src@3bf9df6b2785fa6d951086978a3e66f49427166a/-/blob/public/zip_utils.h?L26:3-26:24
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum ZipCompressionMethod {
    None = 0,
    Lzma = 14,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct EndOfCentralDirectory {
    pub signature: u32,
    pub disk_number: u16,
    pub central_directory_disk: u16,
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_length: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
}

impl Packed for EndOfCentralDirectory {
    const SIZE: usize = 22;
}

/// Central-directory record (`PK\x01\x02`).
#[derive(Debug, Clone, Copy, BinRead)]
pub struct ZipFileHeader {
    pub signature: u32,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub modified_time: u16,
    pub modified_date: u16,
    pub crc: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u32,
}

impl ZipFileHeader {
    pub const SIGNATURE: u32 = 0x0201_4b50;
}

impl Packed for ZipFileHeader {
    const SIZE: usize = 46;
}

#[derive(Debug, Clone, Copy, BinRead)]
struct LocalFileHeader {
    signature: u32,
    _version_needed: u16,
    _flags: u16,
    _compression_method: u16,
    _modified_time: u16,
    _modified_date: u16,
    _crc: u32,
    _compressed_size: u32,
    _uncompressed_size: u32,
    file_name_length: u16,
    extra_field_length: u16,
}

impl LocalFileHeader {
    const SIGNATURE: u32 = 0x0403_4b50;
}

impl Packed for LocalFileHeader {
    const SIZE: usize = 30;
}

/// Per-entry compression descriptor stored at the front of an LZMA entry's
/// payload.
#[derive(Debug, Clone, Copy, BinRead)]
struct CompressionPayload {
    major_version: u8,
    minor_version: u8,
    properties_size: u16,
    properties: [u8; 5],
}

impl Packed for CompressionPayload {
    const SIZE: usize = 9;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipFileLzma {
    pub major_version: u8,
    pub minor_version: u8,
    pub uncompressed_size: u32,
    pub properties: [u8; 5],
    pub compression_header_size: u8,
}

/// One pakfile entry. `file_name` and `data` borrow from the archive bytes;
/// for LZMA entries `data` is the compressed stream proper, past the
/// [`CompressionPayload`].
#[derive(Debug, Clone)]
pub struct ZipFileEntry<'a> {
    pub header: ZipFileHeader,
    pub file_name: &'a str,
    pub data: &'a [u8],
    pub lzma_metadata: Option<ZipFileLzma>,
}

/// Walks the central directory of a pakfile without decompressing anything.
pub fn read_file_entries(zip_data: &[u8]) -> Result<Vec<ZipFileEntry<'_>>> {
    let view = OffsetDataView::new(zip_data);
    let end = find_end_of_central_directory(zip_data, &view)?;

    let mut entries = Vec::with_capacity(end.total_entries as usize);
    let mut record_offset = end.central_directory_offset as i64;

    for _ in 0..end.total_entries {
        let header: ZipFileHeader =
            view.parse_struct(record_offset, "failed to parse central directory record")?;
        if header.signature != ZipFileHeader::SIGNATURE {
            return Err(Error::InvalidBody(
                "central directory record has a bad signature".to_string(),
            ));
        }

        let file_name = std::str::from_utf8(view.bytes(
            record_offset + ZipFileHeader::SIZE as i64,
            header.file_name_length as usize,
            "central directory file name overruns the archive",
        )?)
        .map_err(|e| Error::InvalidBody(format!("pakfile entry name is not UTF-8: {e}")))?;

        entries.push(resolve_entry(&view, header, file_name)?);

        record_offset += (ZipFileHeader::SIZE
            + header.file_name_length as usize
            + header.extra_field_length as usize
            + header.comment_length as usize) as i64;
    }

    Ok(entries)
}

fn find_end_of_central_directory(
    zip_data: &[u8],
    view: &OffsetDataView,
) -> Result<EndOfCentralDirectory> {
    let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();

    let position = zip_data
        .windows(4)
        .rev()
        .position(|window| window == signature)
        .map(|from_end| zip_data.len() - 4 - from_end)
        .ok_or(Error::OutOfBoundsAccess(
            "no end-of-central-directory signature in pakfile",
        ))?;

    view.parse_struct(position as i64, "failed to parse end of central directory")
}

fn resolve_entry<'a>(
    view: &OffsetDataView<'a>,
    header: ZipFileHeader,
    file_name: &'a str,
) -> Result<ZipFileEntry<'a>> {
    let local: LocalFileHeader = view.parse_struct(
        header.local_header_offset as i64,
        "failed to parse local file header",
    )?;
    if local.signature != LocalFileHeader::SIGNATURE {
        return Err(Error::InvalidBody(format!(
            "local header of \"{file_name}\" has a bad signature"
        )));
    }

    let data_offset = header.local_header_offset as i64
        + LocalFileHeader::SIZE as i64
        + local.file_name_length as i64
        + local.extra_field_length as i64;
    let compressed_size = header.compressed_size as usize;

    let method = ZipCompressionMethod::try_from(header.compression_method).map_err(|_| {
        Error::InvalidBody(format!(
            "entry \"{file_name}\" uses unrecognised compression method {}",
            header.compression_method
        ))
    })?;

    match method {
        ZipCompressionMethod::None => Ok(ZipFileEntry {
            header,
            file_name,
            data: view.bytes(data_offset, compressed_size, "entry data overruns the archive")?,
            lzma_metadata: None,
        }),
        ZipCompressionMethod::Lzma => {
            let payload: CompressionPayload =
                view.parse_struct(data_offset, "failed to parse LZMA compression payload")?;
            if payload.properties_size != 5 {
                return Err(Error::InvalidBody(format!(
                    "entry \"{file_name}\" advertises {} LZMA properties bytes",
                    payload.properties_size
                )));
            }
            if compressed_size < CompressionPayload::SIZE {
                return Err(Error::InvalidBody(format!(
                    "entry \"{file_name}\" is too small for its LZMA compression payload"
                )));
            }

            Ok(ZipFileEntry {
                header,
                file_name,
                data: view.bytes(
                    data_offset + CompressionPayload::SIZE as i64,
                    compressed_size - CompressionPayload::SIZE,
                    "entry data overruns the archive",
                )?,
                lzma_metadata: Some(ZipFileLzma {
                    major_version: payload.major_version,
                    minor_version: payload.minor_version,
                    uncompressed_size: header.uncompressed_size,
                    properties: payload.properties,
                    compression_header_size: CompressionPayload::SIZE as u8,
                }),
            })
        }
    }
}
