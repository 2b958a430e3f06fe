use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{Result, SublateError};
use crate::subtitle::Segment;

/// Transcriber backed by the system `whisper` command.
pub struct Transcriber {
    config: TranscriberConfig,
}

impl Transcriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Transcribe an audio or video file into ordered segments.
    ///
    /// Whisper writes its JSON output next to nothing we control, so it
    /// is pointed at a temporary directory and the `{stem}.json` file is
    /// read back from there.
    pub async fn transcribe(&self, input: &Path, model: Option<&str>) -> Result<Vec<Segment>> {
        let model = model.unwrap_or(&self.config.model);
        info!(
            "Transcribing {} with whisper model {}",
            input.display(),
            model
        );

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SublateError::Transcribe(format!("Failed to create temp directory: {}", e)))?;

        let output = Command::new(&self.config.binary_path)
            .arg(input)
            .arg("--model")
            .arg(model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(temp_dir.path())
            .output()
            .map_err(|e| SublateError::Transcribe(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SublateError::Transcribe(format!(
                "Whisper failed: {}",
                stderr
            )));
        }

        let stem = input
            .file_stem()
            .ok_or_else(|| SublateError::Transcribe("Invalid input filename".to_string()))?;
        let json_path = temp_dir
            .path()
            .join(format!("{}.json", stem.to_string_lossy()));

        debug!("Reading whisper output from {}", json_path.display());
        let json_content = std::fs::read_to_string(&json_path).map_err(|e| {
            SublateError::Transcribe(format!("Failed to read whisper output: {}", e))
        })?;

        let segments = parse_whisper_output(&json_content)?;
        info!("Transcription produced {} segments", segments.len());
        Ok(segments)
    }
}

/// Parse whisper's JSON output into segments. Ids are assigned by
/// position so downstream stages can rely on a dense 0-based sequence
/// regardless of what whisper emitted.
pub fn parse_whisper_output(json_content: &str) -> Result<Vec<Segment>> {
    let json: serde_json::Value = serde_json::from_str(json_content)
        .map_err(|e| SublateError::Transcribe(format!("Failed to parse whisper JSON: {}", e)))?;

    let raw_segments = json["segments"]
        .as_array()
        .ok_or_else(|| SublateError::Transcribe("Whisper output has no segments array".to_string()))?;

    Ok(raw_segments
        .iter()
        .enumerate()
        .map(|(index, seg)| Segment {
            id: index as i64,
            start: seg["start"].as_f64().unwrap_or(0.0),
            end: seg["end"].as_f64().unwrap_or(0.0),
            text: seg["text"].as_str().unwrap_or("").trim().to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_output() {
        let json = r#"{
            "text": " Hello. World.",
            "segments": [
                {"id": 5, "start": 0.0, "end": 1.5, "text": " Hello."},
                {"id": 9, "start": 1.5, "end": 3.0, "text": " World."}
            ],
            "language": "en"
        }"#;

        let segments = parse_whisper_output(json).unwrap();
        assert_eq!(segments.len(), 2);

        // Ids come from position, not from whisper's own numbering.
        assert_eq!(segments[0].id, 0);
        assert_eq!(segments[1].id, 1);
        assert_eq!(segments[0].text, "Hello.");
        assert_eq!(segments[1].start, 1.5);
        assert_eq!(segments[1].end, 3.0);
    }

    #[test]
    fn test_parse_whisper_output_empty_segments() {
        let segments = parse_whisper_output(r#"{"segments": []}"#).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_parse_whisper_output_rejects_missing_segments() {
        assert!(parse_whisper_output(r#"{"text": "no segments"}"#).is_err());
        assert!(parse_whisper_output("garbage").is_err());
    }
}
