use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ChunkItem, ChunkTranslator, SegmentTranslation, TRANSLATION_FAILED_MARKER};
use crate::subtitle::{BilingualSegment, Segment};

/// Default bound on concurrent in-flight chunk translations.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Fan all chunks out to the translator over a bounded worker pool and
/// collect the flattened results in completion order.
///
/// An `Err` from one chunk's invocation is logged and dropped without
/// aborting sibling chunks; its segment ids fall through to the sentinel
/// fill at reassembly. Echoed original text is reconciled against the
/// locally held source per completed chunk, before flattening.
pub async fn translate_all(
    translator: Arc<dyn ChunkTranslator>,
    chunks: Vec<Vec<ChunkItem>>,
    originals: &HashMap<i64, String>,
    target_language: &str,
    max_workers: usize,
) -> Vec<SegmentTranslation> {
    let total = chunks.len();
    let progress = chunk_progress_bar(total as u64);

    let mut completions = stream::iter(chunks.into_iter().enumerate())
        .map(|(index, chunk)| {
            let translator = Arc::clone(&translator);
            let target_language = target_language.to_string();
            async move {
                let chunk_len = chunk.len();
                let result = translator.translate_chunk(&chunk, &target_language).await;
                (index, chunk_len, result)
            }
        })
        .buffer_unordered(max_workers.max(1));

    let mut flattened = Vec::new();
    while let Some((index, chunk_len, result)) = completions.next().await {
        progress.inc(1);

        match result {
            Ok(mut translations) => {
                reconcile_echoes(&mut translations, originals);
                debug!(
                    "Chunk {}/{} completed with {} translations",
                    index + 1,
                    total,
                    translations.len()
                );
                flattened.extend(translations);
            }
            Err(e) => {
                warn!(
                    "Chunk {}/{} of {} segments failed: {}",
                    index + 1,
                    total,
                    chunk_len,
                    e
                );
            }
        }
    }

    progress.finish_with_message("All chunks translated");
    flattened
}

/// Merge flattened chunk results back into the original segment order.
///
/// Duplicate ids are logged and resolved last-write-wins; segments with
/// no returned translation receive the failure sentinel.
pub fn reassemble(
    segments: &[Segment],
    results: Vec<SegmentTranslation>,
) -> Vec<BilingualSegment> {
    let mut translation_map: HashMap<i64, String> = HashMap::with_capacity(results.len());
    for result in results {
        if translation_map
            .insert(result.id, result.translated_text)
            .is_some()
        {
            warn!(
                "Duplicate translation for segment {}, keeping the later one",
                result.id
            );
        }
    }

    let mut missing = 0usize;
    let output: Vec<BilingualSegment> = segments
        .iter()
        .map(|segment| {
            let translated_text = match translation_map.remove(&segment.id) {
                Some(text) => text,
                None => {
                    warn!("No translation returned for segment {}", segment.id);
                    missing += 1;
                    TRANSLATION_FAILED_MARKER.to_string()
                }
            };

            BilingualSegment {
                start: segment.start,
                end: segment.end,
                original_text: segment.text.trim().to_string(),
                translated_text,
            }
        })
        .collect();

    if missing > 0 {
        warn!(
            "{} of {} segments have no translation",
            missing,
            segments.len()
        );
    }

    output
}

/// Replace or back-fill the echoed original text with the authoritative
/// local source text. The model's echo is advisory and never trusted.
fn reconcile_echoes(
    translations: &mut [SegmentTranslation],
    originals: &HashMap<i64, String>,
) {
    for translation in translations.iter_mut() {
        let Some(local_text) = originals.get(&translation.id) else {
            warn!("Model returned unknown segment id {}", translation.id);
            continue;
        };

        match translation.original_text.as_deref() {
            Some(echo) if echo != local_text => {
                warn!(
                    "Echoed original text for segment {} differs from source, using source",
                    translation.id
                );
                translation.original_text = Some(local_text.clone());
            }
            None => translation.original_text = Some(local_text.clone()),
            _ => {}
        }
    }
}

fn chunk_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_message("Translating");
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SublateError};
    use crate::subtitle::Segment;
    use crate::translate::{CHUNK_FAILED_MARKER, chunk_segments, translate_segments};
    use async_trait::async_trait;
    use std::time::Duration;

    fn segment(id: i64, text: &str) -> Segment {
        Segment {
            id,
            start: id as f64,
            end: id as f64 + 1.0,
            text: text.to_string(),
        }
    }

    fn originals_of(segments: &[Segment]) -> HashMap<i64, String> {
        segments
            .iter()
            .map(|s| (s.id, s.text.trim().to_string()))
            .collect()
    }

    /// Returns scripted translations per id; ids without a script are
    /// dropped from the response.
    struct MapTranslator {
        translations: HashMap<i64, String>,
        echoes: HashMap<i64, String>,
    }

    impl MapTranslator {
        fn new(pairs: &[(i64, &str)]) -> Self {
            Self {
                translations: pairs
                    .iter()
                    .map(|(id, text)| (*id, text.to_string()))
                    .collect(),
                echoes: HashMap::new(),
            }
        }

        fn with_echo(mut self, id: i64, echo: &str) -> Self {
            self.echoes.insert(id, echo.to_string());
            self
        }
    }

    #[async_trait]
    impl ChunkTranslator for MapTranslator {
        async fn translate_chunk(
            &self,
            chunk: &[ChunkItem],
            _target_language: &str,
        ) -> Result<Vec<SegmentTranslation>> {
            // Make the first chunk finish last so completion order differs
            // from submission order.
            if chunk.first().map(|item| item.id) == Some(0) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            Ok(chunk
                .iter()
                .filter_map(|item| {
                    self.translations.get(&item.id).map(|text| SegmentTranslation {
                        id: item.id,
                        translated_text: text.clone(),
                        original_text: self.echoes.get(&item.id).cloned(),
                    })
                })
                .collect())
        }
    }

    /// Simulates a retry-exhausted chunk: sentinel markers for every id.
    struct ExhaustedTranslator;

    #[async_trait]
    impl ChunkTranslator for ExhaustedTranslator {
        async fn translate_chunk(
            &self,
            chunk: &[ChunkItem],
            _target_language: &str,
        ) -> Result<Vec<SegmentTranslation>> {
            Ok(chunk
                .iter()
                .map(|item| SegmentTranslation {
                    id: item.id,
                    translated_text: CHUNK_FAILED_MARKER.to_string(),
                    original_text: None,
                })
                .collect())
        }
    }

    /// Breaks on the chunk containing the given id, succeeds elsewhere.
    struct BrokenChunkTranslator {
        broken_id: i64,
    }

    #[async_trait]
    impl ChunkTranslator for BrokenChunkTranslator {
        async fn translate_chunk(
            &self,
            chunk: &[ChunkItem],
            _target_language: &str,
        ) -> Result<Vec<SegmentTranslation>> {
            if chunk.iter().any(|item| item.id == self.broken_id) {
                return Err(SublateError::Translation("worker exploded".to_string()));
            }

            Ok(chunk
                .iter()
                .map(|item| SegmentTranslation {
                    id: item.id,
                    translated_text: format!("translated {}", item.id),
                    original_text: None,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_single_chunk_success_scenario() {
        let segments = vec![segment(0, "Hello"), segment(1, "World")];
        let translator = Arc::new(MapTranslator::new(&[(0, "你好"), (1, "世界")]));

        let output = translate_segments(translator, &segments, "Chinese", 5, 8000)
            .await
            .unwrap();

        assert_eq!(
            output,
            vec![
                BilingualSegment {
                    start: 0.0,
                    end: 1.0,
                    original_text: "Hello".to_string(),
                    translated_text: "你好".to_string(),
                },
                BilingualSegment {
                    start: 1.0,
                    end: 2.0,
                    original_text: "World".to_string(),
                    translated_text: "世界".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_output_order_independent_of_completion_order() {
        let segments = vec![segment(0, "first"), segment(1, "second")];
        // A limit of 1 forces one segment per chunk; MapTranslator delays
        // the chunk holding id 0 so chunk 1 completes first.
        let chunks = chunk_segments(&segments, 1);
        assert_eq!(chunks.len(), 2);

        let translator = Arc::new(MapTranslator::new(&[(0, "premier"), (1, "deuxième")]));
        let output = translate_segments(translator, &segments, "French", 5, 1)
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].original_text, "first");
        assert_eq!(output[0].translated_text, "premier");
        assert_eq!(output[1].original_text, "second");
        assert_eq!(output[1].translated_text, "deuxième");
    }

    #[tokio::test]
    async fn test_exhausted_chunk_yields_sentinels_for_all_ids() {
        let segments = vec![segment(0, "a"), segment(1, "b")];
        let translator = Arc::new(ExhaustedTranslator);

        let output = translate_segments(translator, &segments, "Chinese", 5, 8000)
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        for entry in &output {
            assert_eq!(entry.translated_text, CHUNK_FAILED_MARKER);
        }
        assert_eq!(output[0].original_text, "a");
        assert_eq!(output[1].original_text, "b");
    }

    #[tokio::test]
    async fn test_broken_chunk_does_not_abort_siblings() {
        let segments = vec![segment(0, "alpha"), segment(1, "beta")];
        // One segment per chunk; the chunk holding id 0 errors outright.
        let translator = Arc::new(BrokenChunkTranslator { broken_id: 0 });

        let output = translate_segments(translator, &segments, "German", 5, 1)
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].translated_text, TRANSLATION_FAILED_MARKER);
        assert_eq!(output[1].translated_text, "translated 1");
    }

    #[tokio::test]
    async fn test_echo_mismatch_replaced_by_local_text() {
        let segments = vec![segment(0, "Hello")];
        let translator =
            Arc::new(MapTranslator::new(&[(0, "你好")]).with_echo(0, "Hallucinated echo"));

        let output = translate_segments(translator, &segments, "Chinese", 5, 8000)
            .await
            .unwrap();

        assert_eq!(output[0].original_text, "Hello");
        assert_eq!(output[0].translated_text, "你好");
    }

    #[tokio::test]
    async fn test_missing_translation_backfilled_with_sentinel() {
        let segments = vec![segment(0, "kept"), segment(1, "dropped by model")];
        // Only id 0 is scripted; id 1 vanishes from the response.
        let translator = Arc::new(MapTranslator::new(&[(0, "behalten")]));

        let output = translate_segments(translator, &segments, "German", 5, 8000)
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].translated_text, "behalten");
        assert_eq!(output[1].translated_text, TRANSLATION_FAILED_MARKER);
        assert_eq!(output[1].original_text, "dropped by model");
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let translator = Arc::new(MapTranslator::new(&[]));
        let output = translate_segments(translator, &[], "Chinese", 5, 8000)
            .await
            .unwrap();

        assert!(output.is_empty());
    }

    #[test]
    fn test_reassemble_preserves_length_and_order() {
        let segments: Vec<Segment> = (0..5)
            .map(|id| segment(id, &format!("line {}", id)))
            .collect();

        // Results arrive shuffled, as if chunks completed out of order.
        let results: Vec<SegmentTranslation> = [3, 0, 4, 1, 2]
            .iter()
            .map(|&id| SegmentTranslation {
                id,
                translated_text: format!("t{}", id),
                original_text: None,
            })
            .collect();

        let output = reassemble(&segments, results);

        assert_eq!(output.len(), segments.len());
        for (index, entry) in output.iter().enumerate() {
            assert_eq!(entry.original_text, format!("line {}", index));
            assert_eq!(entry.translated_text, format!("t{}", index));
        }
    }

    #[test]
    fn test_reassemble_duplicate_id_last_write_wins() {
        let segments = vec![segment(0, "once")];
        let results = vec![
            SegmentTranslation {
                id: 0,
                translated_text: "first".to_string(),
                original_text: None,
            },
            SegmentTranslation {
                id: 0,
                translated_text: "second".to_string(),
                original_text: None,
            },
        ];

        let output = reassemble(&segments, results);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].translated_text, "second");
    }

    #[test]
    fn test_reconcile_echoes_backfills_missing_echo() {
        let segments = vec![segment(0, "source text")];
        let originals = originals_of(&segments);
        let mut translations = vec![SegmentTranslation {
            id: 0,
            translated_text: "übersetzt".to_string(),
            original_text: None,
        }];

        reconcile_echoes(&mut translations, &originals);
        assert_eq!(translations[0].original_text.as_deref(), Some("source text"));
    }

    #[test]
    fn test_reconcile_echoes_keeps_matching_echo() {
        let segments = vec![segment(0, "same")];
        let originals = originals_of(&segments);
        let mut translations = vec![SegmentTranslation {
            id: 0,
            translated_text: "pareil".to_string(),
            original_text: Some("same".to_string()),
        }];

        reconcile_echoes(&mut translations, &originals);
        assert_eq!(translations[0].original_text.as_deref(), Some("same"));
    }

    #[test]
    fn test_reconcile_echoes_ignores_unknown_id() {
        let originals = HashMap::new();
        let mut translations = vec![SegmentTranslation {
            id: 42,
            translated_text: "ghost".to_string(),
            original_text: Some("never existed".to_string()),
        }];

        reconcile_echoes(&mut translations, &originals);
        // Unknown ids are left alone; reassembly ignores them anyway.
        assert_eq!(
            translations[0].original_text.as_deref(),
            Some("never existed")
        );
    }
}
