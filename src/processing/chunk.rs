//! PNG chunk codec.
//!
//! A container is the 8-byte signature followed by chunks framed as
//! `length(u32 BE) || type || data || crc32(type || data)`, ending with a
//! single `IEND`. [`PngContainer`] keeps that invariant for every value it
//! hands out: the last chunk is always the one and only `IEND`.

use std::fmt;

use crate::utils::DataError;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const LENGTH_FIELD_SIZE: usize = 4;
const TYPE_FIELD_SIZE: usize = 4;
const CRC_FIELD_SIZE: usize = 4;

/// Framing bytes around every chunk's data.
pub const CHUNK_OVERHEAD: usize = LENGTH_FIELD_SIZE + TYPE_FIELD_SIZE + CRC_FIELD_SIZE;

/// Four-byte chunk type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: Self = Self(*b"IHDR");
    pub const PLTE: Self = Self(*b"PLTE");
    pub const IDAT: Self = Self(*b"IDAT");
    pub const IEND: Self = Self(*b"IEND");
    pub const TEXT: Self = Self(*b"tEXt");
    pub const ZTXT: Self = Self(*b"zTXt");
    pub const ITXT: Self = Self(*b"iTXt");
    pub const TIME: Self = Self(*b"tIME");
    pub const EXIF: Self = Self(*b"eXIf");

    /// Critical chunks have an uppercase first letter.
    pub fn is_critical(&self) -> bool {
        self.0[0].is_ascii_uppercase()
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({self})")
    }
}

/// One chunk. Length and CRC are derived on serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        Self { chunk_type, data }
    }

    /// Builds a `tEXt` chunk: `keyword NUL text`.
    pub fn text(keyword: &str, text: &str) -> Self {
        let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
        data.extend_from_slice(keyword.as_bytes());
        data.push(0);
        data.extend_from_slice(text.as_bytes());
        Self::new(ChunkType::TEXT, data)
    }

    /// Splits a `tEXt` payload on its first NUL into (keyword, text).
    ///
    /// Returns `None` for other chunk types or payloads without a separator.
    pub fn text_parts(&self) -> Option<(&[u8], &[u8])> {
        if self.chunk_type != ChunkType::TEXT {
            return None;
        }
        let nul = self.data.iter().position(|&b| b == 0)?;
        Some((&self.data[..nul], &self.data[nul + 1..]))
    }

    /// CRC-32 over type and data, as stored in the chunk trailer.
    pub fn crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.chunk_type.0);
        hasher.update(&self.data);
        hasher.finalize()
    }

    /// Serialized size including framing.
    pub fn encoded_len(&self) -> usize {
        CHUNK_OVERHEAD + self.data.len()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.chunk_type.0);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.crc().to_be_bytes());
    }
}

/// Parsed PNG: the chunk sequence behind the fixed signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngContainer {
    chunks: Vec<Chunk>,
}

impl PngContainer {
    /// Parses `data` up to and including the first `IEND`.
    ///
    /// Stored CRCs are not verified; they are recomputed on serialization.
    /// Bytes after `IEND` are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, DataError> {
        if data.len() < PNG_SIGNATURE.len() || data[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
            return Err(DataError::InvalidSignature);
        }

        let mut chunks = Vec::new();
        let mut offset = PNG_SIGNATURE.len();
        loop {
            let available = data.len() - offset;
            if available == 0 {
                return Err(DataError::MissingTerminalChunk);
            }
            if available < CHUNK_OVERHEAD {
                return Err(DataError::TruncatedChunk {
                    offset,
                    needed: CHUNK_OVERHEAD,
                    available,
                });
            }

            let length = u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            let needed = CHUNK_OVERHEAD.saturating_add(length);
            if available < needed {
                return Err(DataError::TruncatedChunk {
                    offset,
                    needed,
                    available,
                });
            }

            let type_start = offset + LENGTH_FIELD_SIZE;
            let data_start = type_start + TYPE_FIELD_SIZE;
            let chunk_type = ChunkType([
                data[type_start],
                data[type_start + 1],
                data[type_start + 2],
                data[type_start + 3],
            ]);
            chunks.push(Chunk::new(chunk_type, data[data_start..data_start + length].to_vec()));
            offset += needed;

            if chunk_type == ChunkType::IEND {
                return Ok(Self { chunks });
            }
        }
    }

    /// Builds a container from chunks, which must end with the only `IEND`.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, DataError> {
        let ends = chunks.iter().filter(|c| c.chunk_type == ChunkType::IEND).count();
        match chunks.last() {
            Some(last) if last.chunk_type == ChunkType::IEND && ends == 1 => Ok(Self { chunks }),
            _ => Err(DataError::MissingTerminalChunk),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Keeps chunks matching `keep`. `IEND` is always kept.
    pub fn retain(&mut self, mut keep: impl FnMut(&Chunk) -> bool) {
        self.chunks
            .retain(|chunk| chunk.chunk_type == ChunkType::IEND || keep(chunk));
    }

    /// Inserts `chunk` immediately before `IEND`.
    pub fn insert_before_end(&mut self, chunk: Chunk) {
        let end = self.chunks.len() - 1;
        self.chunks.insert(end, chunk);
    }

    /// Serialized size including the signature.
    pub fn encoded_len(&self) -> usize {
        PNG_SIGNATURE.len() + self.chunks.iter().map(Chunk::encoded_len).sum::<usize>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&PNG_SIGNATURE);
        for chunk in &self.chunks {
            chunk.write_to(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn minimal() -> PngContainer {
        PngContainer::from_chunks(vec![
            Chunk::new(ChunkType::IHDR, vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]),
            Chunk::new(ChunkType::IDAT, vec![1, 2, 3]),
            Chunk::new(ChunkType::IEND, Vec::new()),
        ])
        .unwrap()
    }

    #[test]
    fn crc_matches_known_value() {
        // Every PNG ends with this exact IEND trailer.
        assert_eq!(Chunk::new(ChunkType::IEND, Vec::new()).crc(), 0xAE42_6082);
    }

    #[test]
    fn serializes_framing() {
        let bytes = minimal().to_bytes();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
        assert_eq!(&bytes[bytes.len() - 12..], &[0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
        assert_eq!(bytes.len(), minimal().encoded_len());
    }

    #[test]
    fn rejects_bad_signature() {
        assert_eq!(PngContainer::parse(b"GIF89a.."), Err(DataError::InvalidSignature));
        assert_eq!(PngContainer::parse(&[]), Err(DataError::InvalidSignature));
    }

    #[test]
    fn rejects_missing_iend() {
        let mut bytes = minimal().to_bytes();
        bytes.truncate(bytes.len() - 12);
        assert_eq!(PngContainer::parse(&bytes), Err(DataError::MissingTerminalChunk));
    }

    #[test]
    fn rejects_oversized_length() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"IDAT");
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            PngContainer::parse(&bytes),
            Err(DataError::TruncatedChunk { offset: 8, needed: 112, .. })
        ));
    }

    #[test]
    fn ignores_trailing_bytes() {
        let mut bytes = minimal().to_bytes();
        bytes.extend_from_slice(b"trailing garbage");
        assert_eq!(PngContainer::parse(&bytes).unwrap(), minimal());
    }

    #[test]
    fn retain_and_insert_keep_iend_last() {
        let mut png = minimal();
        png.retain(|_| false);
        assert_eq!(png.chunks().len(), 1);
        png.insert_before_end(Chunk::text("k", "v"));
        assert_eq!(png.chunks()[0].text_parts(), Some((&b"k"[..], &b"v"[..])));
        assert_eq!(png.chunks().last().unwrap().chunk_type, ChunkType::IEND);
    }

    #[test]
    fn from_chunks_requires_single_trailing_iend() {
        let iend = Chunk::new(ChunkType::IEND, Vec::new());
        let idat = Chunk::new(ChunkType::IDAT, Vec::new());
        assert!(PngContainer::from_chunks(vec![]).is_err());
        assert!(PngContainer::from_chunks(vec![iend.clone(), idat.clone()]).is_err());
        assert!(PngContainer::from_chunks(vec![iend.clone(), iend.clone()]).is_err());
        assert!(PngContainer::from_chunks(vec![idat, iend]).is_ok());
    }

    #[test]
    fn critical_bit() {
        assert!(ChunkType::IHDR.is_critical());
        assert!(!ChunkType::TEXT.is_critical());
    }

    fn arb_chunk() -> impl Strategy<Value = Chunk> {
        (prop::array::uniform4(b'a'..=b'z'), prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(tag, data)| Chunk::new(ChunkType(tag), data))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn parse_inverts_serialize(mut chunks in prop::collection::vec(arb_chunk(), 0..8)) {
            chunks.push(Chunk::new(ChunkType::IEND, Vec::new()));
            let png = PngContainer::from_chunks(chunks).unwrap();
            let parsed = PngContainer::parse(&png.to_bytes()).unwrap();
            prop_assert_eq!(parsed, png);
        }
    }
}
