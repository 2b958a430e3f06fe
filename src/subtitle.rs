use serde::{Deserialize, Serialize};

use crate::error::{Result, SublateError};

/// A single timed unit of transcript text with a stable id.
///
/// Ids are assigned 0-based by input order when segments are produced
/// (transcription or SRT parsing) and are never renumbered downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

/// A timed entry pairing original text with its translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilingualSegment {
    pub start: f64,
    pub end: f64,
    pub original_text: String,
    pub translated_text: String,
}

/// Parse SRT content into segments, assigning ids by block order.
pub fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let normalized = content.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut lines = block.lines();
        let first_line = lines
            .next()
            .ok_or_else(|| SublateError::Parse("Empty subtitle block".to_string()))?;

        // Some files omit the counter line; accept a time range in its place.
        let time_line = if first_line.contains("-->") {
            first_line
        } else {
            lines.next().ok_or_else(|| {
                SublateError::Parse(format!("Subtitle block has no time range: {}", first_line))
            })?
        };

        let (start_raw, end_raw) = time_line.split_once("-->").ok_or_else(|| {
            SublateError::Parse(format!("Invalid subtitle time range: {}", time_line))
        })?;

        let start = parse_srt_time(start_raw)?;
        let end = parse_srt_time(end_raw)?;
        let text = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        segments.push(Segment {
            id: segments.len() as i64,
            start,
            end,
            text,
        });
    }

    if segments.is_empty() {
        return Err(SublateError::Parse(
            "No subtitle entries found in input".to_string(),
        ));
    }

    Ok(segments)
}

/// Compose segments into SRT format content.
pub fn to_srt(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            segment.text.trim()
        ));
    }

    srt_content
}

/// Compose bilingual segments into SRT format content.
///
/// Each entry carries the translated text on the first line and the
/// original text on the second.
pub fn to_bilingual_srt(subtitles: &[BilingualSegment]) -> String {
    let mut srt_content = String::new();

    for (index, subtitle) in subtitles.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n{}\n\n",
            index + 1,
            format_srt_time(subtitle.start),
            format_srt_time(subtitle.end),
            subtitle.translated_text,
            subtitle.original_text
        ));
    }

    srt_content
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    // Round to the nearest millisecond; truncation would drift values
    // like 8.777 down to 8776 ms.
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT time stamp (HH:MM:SS,mmm) into seconds.
fn parse_srt_time(raw: &str) -> Result<f64> {
    let raw = raw.trim().replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();

    if parts.len() != 3 {
        return Err(SublateError::Parse(format!(
            "Invalid SRT time stamp: {}",
            raw
        )));
    }

    let hours: u64 = parts[0]
        .parse()
        .map_err(|_| SublateError::Parse(format!("Invalid hours in time stamp: {}", raw)))?;
    let minutes: u64 = parts[1]
        .parse()
        .map_err(|_| SublateError::Parse(format!("Invalid minutes in time stamp: {}", raw)))?;
    let seconds: f64 = parts[2]
        .parse()
        .map_err(|_| SublateError::Parse(format!("Invalid seconds in time stamp: {}", raw)))?;

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
