//! Reads and writes the `LightFile` record stored in a `tEXt` chunk.

use crate::core::{COMMENT_KEYWORD, LightFileComment};
use crate::processing::chunk::{CHUNK_OVERHEAD, Chunk, PngContainer};
use crate::utils::DataError;

/// A record found in a file.
///
/// `parsed` is `None` when the text is not valid record JSON; foreign or
/// damaged payloads are reported, not rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedComment {
    pub raw: String,
    pub parsed: Option<LightFileComment>,
}

impl EmbeddedComment {
    /// Tool named by the record, if it parsed and names one.
    pub fn optimized_by(&self) -> Option<&str> {
        self.parsed
            .as_ref()
            .map(|comment| comment.by.as_str())
            .filter(|by| !by.is_empty())
    }
}

fn is_record_chunk(chunk: &Chunk) -> bool {
    matches!(chunk.text_parts(), Some((keyword, _)) if keyword == COMMENT_KEYWORD.as_bytes())
}

/// Looks up the record in an already parsed container.
pub fn find_comment(png: &PngContainer) -> Option<EmbeddedComment> {
    let (_, text) = png.chunks().iter().find(|c| is_record_chunk(c))?.text_parts()?;
    let raw = String::from_utf8_lossy(text).into_owned();
    let parsed = serde_json::from_str::<LightFileComment>(&raw).ok();
    Some(EmbeddedComment { raw, parsed })
}

/// Parses `data` and looks up the record. Only a malformed container is an error.
pub fn read_comment(data: &[u8]) -> Result<Option<EmbeddedComment>, DataError> {
    let png = PngContainer::parse(data)?;
    Ok(find_comment(&png))
}

/// Serializes `comment` and returns the text with the number of bytes the
/// chunk holding it adds to a file.
pub fn build_comment(comment: &LightFileComment) -> Result<(String, usize), DataError> {
    let text = serde_json::to_string(comment).map_err(|e| DataError::Comment(e.to_string()))?;
    let cost = embed_cost(&text);
    Ok((text, cost))
}

/// Framing, keyword and NUL separator plus the text itself.
pub fn embed_cost(text: &str) -> usize {
    CHUNK_OVERHEAD + COMMENT_KEYWORD.len() + 1 + text.len()
}

/// Replaces every record chunk in `data` with a single one holding `text`,
/// placed right before `IEND`.
pub fn write_comment(data: &[u8], text: &str) -> Result<Vec<u8>, DataError> {
    let mut png = PngContainer::parse(data)?;
    png.retain(|chunk| !is_record_chunk(chunk));
    png.insert_before_end(Chunk::text(COMMENT_KEYWORD, text));
    Ok(png.to_bytes())
}
