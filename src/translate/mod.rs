// Chunked, concurrent subtitle translation.
//
// An ordered segment sequence is partitioned into size-bounded chunks
// (`chunk`), each chunk is translated in one structured LLM call with
// retries (`llm`), chunks fan out over a bounded worker pool and the
// results are merged back into the original segment order (`pipeline`).

pub mod chunk;
pub mod llm;
pub mod pipeline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub use chunk::{ChunkItem, DEFAULT_CHUNK_SIZE_LIMIT, chunk_segments};
pub use llm::LlmTranslator;
pub use pipeline::{DEFAULT_MAX_WORKERS, reassemble, translate_all};

use crate::error::Result;
use crate::subtitle::{BilingualSegment, Segment};

/// Placeholder used when a whole chunk failed every retry attempt.
pub const CHUNK_FAILED_MARKER: &str = "[Chunk Translation Failed]";

/// Placeholder used when no translation was produced for a segment.
pub const TRANSLATION_FAILED_MARKER: &str = "[Translation Failed]";

/// One translated segment as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTranslation {
    pub id: i64,
    pub translated_text: String,
    /// Optional echo of the source text. Advisory only: it is reconciled
    /// against the locally held original before any output is produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

/// Translates one chunk of segments in a single model call.
///
/// Implementations degrade to sentinel results instead of failing once
/// retries are exhausted; an `Err` here means the invocation itself broke
/// and is caught by the coordinator without aborting sibling chunks.
#[async_trait]
pub trait ChunkTranslator: Send + Sync {
    async fn translate_chunk(
        &self,
        chunk: &[ChunkItem],
        target_language: &str,
    ) -> Result<Vec<SegmentTranslation>>;
}

/// Full pipeline: chunk the segments, fan the chunks out to the
/// translator, and reassemble the results in original segment order.
pub async fn translate_segments(
    translator: Arc<dyn ChunkTranslator>,
    segments: &[Segment],
    target_language: &str,
    max_workers: usize,
    size_limit: usize,
) -> Result<Vec<BilingualSegment>> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let chunks = chunk_segments(segments, size_limit);
    info!(
        "Translating {} segments in {} chunks to {}",
        segments.len(),
        chunks.len(),
        target_language
    );

    let originals: HashMap<i64, String> = segments
        .iter()
        .map(|segment| (segment.id, segment.text.trim().to_string()))
        .collect();

    let results = translate_all(translator, chunks, &originals, target_language, max_workers).await;

    Ok(reassemble(segments, results))
}
