use crate::bsp::LumpType;
use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use binrw::BinRead;

/// Properties handed to the decompression callback alongside the raw
/// compressed stream. Valve stores the LZMA properties out-of-band, so the
/// stream itself is headerless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaMetadata {
    pub uncompressed_size: u32,
    pub properties: [u8; 5],
}

/// Caller-supplied decompressor. The crate never links a compression
/// library into the parse path; pass [`lzma_rs_callback`] if the bundled
/// `lzma-rs` implementation is acceptable.
pub type LzmaCallback<'a> = &'a dyn Fn(&[u8], &LzmaMetadata) -> Result<Vec<u8>>;

/// Sub-header in front of every LZMA-compressed lump.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct LzmaHeader {
    pub id: u32,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub properties: [u8; 5],
}

impl LzmaHeader {
    pub const LZMA_ID: u32 = u32::from_le_bytes(*b"LZMA");
}

impl Packed for LzmaHeader {
    const SIZE: usize = 17;
}

/// Validates the LZMA sub-header at the start of `data` and hands the
/// compressed stream to the callback. The callback's output must match the
/// advertised uncompressed size exactly.
pub(crate) fn decompress_lump(
    lump: LumpType,
    data: &[u8],
    callback: Option<LzmaCallback>,
) -> Result<Vec<u8>> {
    let view = OffsetDataView::new(data);
    let header: LzmaHeader =
        view.parse_struct(0, "failed to parse LZMA header for compressed lump")?;

    if header.id != LzmaHeader::LZMA_ID {
        return Err(Error::InvalidBody(format!(
            "compressed {lump:?} lump does not start with an LZMA header"
        )));
    }

    let callback = callback.ok_or(Error::MissingDecompressCallback(lump))?;

    let compressed = view.bytes(
        LzmaHeader::SIZE as i64,
        header.compressed_size as usize,
        "compressed lump stream overruns the lump",
    )?;

    let metadata = LzmaMetadata {
        uncompressed_size: header.uncompressed_size,
        properties: header.properties,
    };

    tracing::debug!(
        ?lump,
        compressed = header.compressed_size,
        uncompressed = header.uncompressed_size,
        "decompressing lump"
    );

    let decompressed = callback(compressed, &metadata)?;
    if decompressed.len() != header.uncompressed_size as usize {
        return Err(Error::InvalidBody(format!(
            "decompressed {lump:?} lump is {} bytes but its header advertises {}",
            decompressed.len(),
            header.uncompressed_size
        )));
    }

    Ok(decompressed)
}

/// Ready-made [`LzmaCallback`] backed by `lzma-rs`'s raw decoder.
pub fn lzma_rs_callback(compressed: &[u8], metadata: &LzmaMetadata) -> Result<Vec<u8>> {
    use lzma_rs::decompress::raw::{LzmaDecoder, LzmaParams, LzmaProperties};

    let packed = metadata.properties[0] as u32;
    if packed >= 9 * 5 * 5 {
        return Err(Error::InvalidBody(format!(
            "invalid LZMA properties byte {packed:#x}"
        )));
    }
    let properties = LzmaProperties {
        lc: packed % 9,
        lp: (packed / 9) % 5,
        pb: packed / 45,
    };
    let dict_size = u32::from_le_bytes(metadata.properties[1..5].try_into().unwrap());

    let params = LzmaParams::new(properties, dict_size, Some(metadata.uncompressed_size as u64));
    let mut decoder = LzmaDecoder::new(params, None)
        .map_err(|e| Error::InvalidBody(format!("failed to initialize LZMA decoder: {e}")))?;

    let mut output = Vec::with_capacity(metadata.uncompressed_size as usize);
    let mut input = compressed;
    decoder
        .decompress(&mut input, &mut output)
        .map_err(|e| Error::InvalidBody(format!("LZMA decompression failed: {e}")))?;

    Ok(output)
}
