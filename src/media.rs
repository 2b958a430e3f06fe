use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::{Result, SublateError};

/// One embedded subtitle stream found in a media container.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStream {
    /// Position among the file's subtitle streams, usable as `0:s:N`.
    pub index: usize,
    pub language: String,
    pub title: String,
}

/// ffprobe/ffmpeg wrapper for inspecting containers and pulling out
/// embedded subtitle tracks.
pub struct MediaProbe {
    config: MediaConfig,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    language: Option<String>,
    title: Option<String>,
}

impl MediaProbe {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// List the embedded subtitle streams of a media file.
    ///
    /// A probe failure is not fatal: the caller falls back to
    /// transcription, so this logs a warning and reports no streams.
    pub async fn probe_subtitle_streams(&self, input: &Path) -> Result<Vec<SubtitleStream>> {
        debug!("Probing {} for subtitle streams", input.display());

        let output = Command::new(&self.config.ffprobe_path)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(input)
            .output();

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("ffprobe failed on {}: {}", input.display(), stderr);
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!("Failed to execute ffprobe: {}", e);
                return Ok(Vec::new());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout)
    }

    /// Extract one embedded subtitle stream as SRT text.
    pub async fn extract_subtitle(&self, input: &Path, stream_index: usize) -> Result<String> {
        info!(
            "Extracting subtitle stream {} from {}",
            stream_index,
            input.display()
        );

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .arg("-map")
            .arg(format!("0:s:{}", stream_index))
            .arg("-f")
            .arg("srt")
            .arg("pipe:1")
            .output()
            .map_err(|e| SublateError::Media(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SublateError::Media(format!(
                "ffmpeg subtitle extraction failed: {}",
                stderr
            )));
        }

        let srt = String::from_utf8_lossy(&output.stdout).to_string();
        if srt.trim().is_empty() {
            return Err(SublateError::Media(format!(
                "Subtitle stream {} produced no content",
                stream_index
            )));
        }

        Ok(srt)
    }
}

/// Parse ffprobe's JSON stream listing, keeping only subtitle streams.
/// The reported index is the position among subtitle streams so it maps
/// directly onto ffmpeg's `0:s:N` selector.
pub fn parse_probe_output(json_content: &str) -> Result<Vec<SubtitleStream>> {
    let probe: ProbeOutput = serde_json::from_str(json_content)
        .map_err(|e| SublateError::Media(format!("Failed to parse ffprobe output: {}", e)))?;

    Ok(probe
        .streams
        .into_iter()
        .filter(|stream| stream.codec_type.as_deref() == Some("subtitle"))
        .enumerate()
        .map(|(index, stream)| SubtitleStream {
            index,
            language: stream.tags.language.unwrap_or_else(|| "unknown".to_string()),
            title: stream.tags.title.unwrap_or_else(|| "No Title".to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_filters_subtitle_streams() {
        let json = r#"{
            "streams": [
                {"codec_type": "video"},
                {"codec_type": "audio", "tags": {"language": "eng"}},
                {"codec_type": "subtitle", "tags": {"language": "eng", "title": "English (SDH)"}},
                {"codec_type": "subtitle", "tags": {"language": "chi"}}
            ]
        }"#;

        let streams = parse_probe_output(json).unwrap();
        assert_eq!(streams.len(), 2);

        // Indexes count subtitle streams only, matching ffmpeg's 0:s:N.
        assert_eq!(streams[0].index, 0);
        assert_eq!(streams[0].language, "eng");
        assert_eq!(streams[0].title, "English (SDH)");
        assert_eq!(streams[1].index, 1);
        assert_eq!(streams[1].language, "chi");
        assert_eq!(streams[1].title, "No Title");
    }

    #[test]
    fn test_parse_probe_output_no_streams() {
        assert!(parse_probe_output(r#"{"streams": []}"#).unwrap().is_empty());
        assert!(parse_probe_output("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_probe_output_rejects_invalid_json() {
        assert!(parse_probe_output("not json").is_err());
    }
}
