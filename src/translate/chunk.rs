use serde::{Deserialize, Serialize};

use crate::subtitle::Segment;

/// Default serialized-size budget per chunk, in characters. Conservative
/// against typical model context limits; tokens usually outnumber
/// characters.
pub const DEFAULT_CHUNK_SIZE_LIMIT: usize = 8000;

/// Minimal projection of a segment sent to the model. Timing stays local
/// to keep the request payload small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkItem {
    pub id: i64,
    pub text: String,
}

/// Partition segments into order-preserving, size-bounded chunks.
///
/// The budget is an estimate: each item contributes its standalone
/// serialized length, so shared array overhead is not counted. The limit
/// is checked only when appending to a non-empty chunk, so the first item
/// of a chunk is always admitted; a single oversized segment forms its
/// own one-item chunk and is never split, since a chunk is the unit of
/// one contiguous model call.
pub fn chunk_segments(segments: &[Segment], size_limit: usize) -> Vec<Vec<ChunkItem>> {
    let mut chunks = Vec::new();
    let mut current: Vec<ChunkItem> = Vec::new();
    let mut current_size = 0usize;

    for segment in segments {
        let item = ChunkItem {
            id: segment.id,
            text: segment.text.trim().to_string(),
        };
        let item_size = serialized_size(&item);

        if !current.is_empty() && current_size + item_size > size_limit {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }

        current_size += item_size;
        current.push(item);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Standalone serialized length of one item, in characters. Counting
/// characters rather than bytes matches a budget expressed in characters
/// for CJK-heavy subtitle text.
fn serialized_size(item: &ChunkItem) -> usize {
    serde_json::to_string(item)
        .map(|serialized| serialized.chars().count())
        .unwrap_or_else(|_| item.text.chars().count())
}
