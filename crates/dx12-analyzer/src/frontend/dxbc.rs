//! Minimal reader for DXBC containers
//!
//! Both legacy DXBC and DXIL bytecode are wrapped in the same chunked container.
//! The analyzer only needs to locate chunks (the embedded root signature lives in
//! `RTS0`), so this reader validates the header and offset table and hands out
//! chunk payloads by FourCC. Every offset is bounds checked; malformed input is
//! reported, never trusted.

use std::fmt;

/// Magic at the start of every container
pub const DXBC_MAGIC: [u8; 4] = *b"DXBC";
/// magic + checksum + reserved + total_size + chunk_count
const DXBC_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4;
/// Chunk header: fourcc + size
const CHUNK_HEADER_LEN: usize = 8;
/// Upper bound on the chunk count; real containers hold a handful of chunks
const MAX_CHUNK_COUNT: u32 = 4096;

/// FourCC of the serialized root signature chunk
pub const ROOT_SIGNATURE_FOURCC: [u8; 4] = *b"RTS0";

/// Size of a serialized root parameter header
const ROOT_PARAMETER_LEN: usize = 12;
/// Size of a serialized static sampler before version 1.2
const STATIC_SAMPLER_LEN: usize = 52;
/// Size of a serialized static sampler in version 1.2
const STATIC_SAMPLER_LEN_1_2: usize = 60;

/// One chunk of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// Chunk identifier, e.g. `DXIL`, `RTS0`
    pub fourcc: [u8; 4],
    /// Chunk payload
    pub data: &'a [u8],
}

/// Parses the container in `bytes` and returns its chunks in file order
pub fn parse_chunks(bytes: &[u8]) -> Result<Vec<DxbcChunk<'_>>, DxbcError> {
    if bytes.len() < DXBC_HEADER_LEN {
        return Err(DxbcError::Truncated { needed: DXBC_HEADER_LEN, available: bytes.len() });
    }
    if bytes[..4] != DXBC_MAGIC {
        return Err(DxbcError::BadMagic);
    }

    let total_size = read_u32(bytes, 24)? as usize;
    let chunk_count = read_u32(bytes, 28)?;
    if chunk_count > MAX_CHUNK_COUNT {
        return Err(DxbcError::TooManyChunks(chunk_count));
    }
    if total_size < DXBC_HEADER_LEN || total_size > bytes.len() {
        return Err(DxbcError::BadTotalSize { total_size, available: bytes.len() });
    }
    let bytes = &bytes[..total_size];

    let table_end = DXBC_HEADER_LEN + chunk_count as usize * 4;
    if table_end > bytes.len() {
        return Err(DxbcError::Truncated { needed: table_end, available: bytes.len() });
    }

    let mut chunks = Vec::with_capacity(chunk_count as usize);
    for index in 0..chunk_count as usize {
        let offset = read_u32(bytes, DXBC_HEADER_LEN + index * 4)? as usize;
        if offset < table_end {
            return Err(DxbcError::BadChunkOffset { index, offset });
        }

        let header_end = offset.checked_add(CHUNK_HEADER_LEN).ok_or(DxbcError::BadChunkOffset { index, offset })?;
        if header_end > bytes.len() {
            return Err(DxbcError::BadChunkOffset { index, offset });
        }

        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&bytes[offset..offset + 4]);
        let size = read_u32(bytes, offset + 4)? as usize;
        let data_end = header_end.checked_add(size).ok_or(DxbcError::BadChunkSize { index, size })?;
        if data_end > bytes.len() {
            return Err(DxbcError::BadChunkSize { index, size });
        }

        chunks.push(DxbcChunk { fourcc, data: &bytes[header_end..data_end] });
    }

    Ok(chunks)
}

/// Returns the payload of the first chunk with `fourcc`, if any
pub fn find_chunk<'a>(bytes: &'a [u8], fourcc: [u8; 4]) -> Result<Option<&'a [u8]>, DxbcError> {
    Ok(parse_chunks(bytes)?.into_iter().find(|chunk| chunk.fourcc == fourcc).map(|chunk| chunk.data))
}

/// Header of a serialized root signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootSignatureHeader {
    /// 1 = 1.0, 2 = 1.1, 3 = 1.2
    pub version: u32,
    /// Number of root parameters
    pub num_parameters: u32,
    /// Number of static samplers
    pub num_static_samplers: u32,
    /// Root signature flags
    pub flags: u32,
}

/// Validates the header of a serialized `RTS0` payload
///
/// Checks the version and that the parameter and static sampler tables fit in the
/// payload. The parameter contents themselves are left to the driver.
pub fn parse_root_signature(data: &[u8]) -> Result<RootSignatureHeader, DxbcError> {
    let version = read_u32(data, 0)?;
    let num_parameters = read_u32(data, 4)?;
    let parameters_offset = read_u32(data, 8)? as usize;
    let num_static_samplers = read_u32(data, 12)?;
    let static_samplers_offset = read_u32(data, 16)? as usize;
    let flags = read_u32(data, 20)?;

    let sampler_len = match version {
        1 | 2 => STATIC_SAMPLER_LEN,
        3 => STATIC_SAMPLER_LEN_1_2,
        other => return Err(DxbcError::UnsupportedRootSignatureVersion(other)),
    };

    let parameters_end = parameters_offset.saturating_add(num_parameters as usize * ROOT_PARAMETER_LEN);
    if num_parameters > 0 && parameters_end > data.len() {
        return Err(DxbcError::Truncated { needed: parameters_end, available: data.len() });
    }
    let samplers_end = static_samplers_offset.saturating_add(num_static_samplers as usize * sampler_len);
    if num_static_samplers > 0 && samplers_end > data.len() {
        return Err(DxbcError::Truncated { needed: samplers_end, available: data.len() });
    }

    Ok(RootSignatureHeader {
        version,
        num_parameters,
        num_static_samplers,
        flags,
    })
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DxbcError::Truncated { needed: offset + 4, available: bytes.len() })
}

/// Errors produced while reading a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DxbcError {
    /// The input ends before a required field (needed, available)
    Truncated { needed: usize, available: usize },
    /// The input does not start with `DXBC`
    BadMagic,
    /// The declared total size is inconsistent with the input
    BadTotalSize { total_size: usize, available: usize },
    /// The chunk count exceeds the supported maximum
    TooManyChunks(u32),
    /// A chunk offset points outside the container or into its header
    BadChunkOffset { index: usize, offset: usize },
    /// A chunk size runs past the end of the container
    BadChunkSize { index: usize, size: usize },
    /// The serialized root signature version is unknown
    UnsupportedRootSignatureVersion(u32),
}

impl fmt::Display for DxbcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => write!(f, "truncated data: need {needed} bytes, got {available}"),
            Self::BadMagic => write!(f, "not a DXBC container"),
            Self::BadTotalSize { total_size, available } => write!(f, "declared size {total_size} does not match buffer length {available}"),
            Self::TooManyChunks(count) => write!(f, "chunk count {count} exceeds maximum {MAX_CHUNK_COUNT}"),
            Self::BadChunkOffset { index, offset } => write!(f, "chunk {index} has invalid offset {offset}"),
            Self::BadChunkSize { index, size } => write!(f, "chunk {index} size {size} runs past the end of the container"),
            Self::UnsupportedRootSignatureVersion(version) => write!(f, "unsupported root signature version {version}"),
        }
    }
}

impl std::error::Error for DxbcError {}

/// Builds a container holding `chunks`, for tests
#[cfg(test)]
pub(crate) fn build_container(chunks: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let table_end = DXBC_HEADER_LEN + chunks.len() * 4;
    let total_size = table_end + chunks.iter().map(|(_, data)| CHUNK_HEADER_LEN + data.len()).sum::<usize>();

    let mut bytes = Vec::with_capacity(total_size);
    bytes.extend_from_slice(&DXBC_MAGIC);
    bytes.extend_from_slice(&[0u8; 16]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&(total_size as u32).to_le_bytes());
    bytes.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let mut offset = table_end;
    for (_, data) in chunks {
        bytes.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += CHUNK_HEADER_LEN + data.len();
    }
    for (fourcc, data) in chunks {
        bytes.extend_from_slice(fourcc);
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
    }
    bytes
}

/// Serializes a root signature header with no parameters, for tests
#[cfg(test)]
pub(crate) fn empty_root_signature(version: u32) -> Vec<u8> {
    [version, 0, 24, 0, 24, 0].iter().flat_map(|v| v.to_le_bytes()).collect()
}
