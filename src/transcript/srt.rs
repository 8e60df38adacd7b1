use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use super::{Segment, Transcript};
use crate::error::{CaptionError, Result};

/// SRT (SubRip Subtitle) entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtEntry {
    /// Sequential number
    pub index: u32,
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
    /// Subtitle text
    pub text: String,
}

impl SrtEntry {
    pub fn new(index: u32, start: Duration, end: Duration, text: String) -> Self {
        Self {
            index,
            start,
            end,
            text: text.trim().to_string(),
        }
    }

    /// Convert to a transcript segment; multi-line cues are joined with spaces
    pub fn to_segment(&self) -> Segment {
        let start = self.start.as_secs_f64();
        let duration = self.end.saturating_sub(self.start).as_secs_f64();
        Segment::new(start, duration, clean_text(&self.text))
    }
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

/// Reads SubRip content into entries
pub struct SrtParser;

impl SrtParser {
    /// Parse SRT content; blocks without a timing line are rejected
    pub fn parse(content: &str) -> Result<Vec<SrtEntry>> {
        let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let mut entries = Vec::new();

        for block in normalized.split("\n\n") {
            let mut lines = block.lines().filter(|l| !l.trim().is_empty()).peekable();
            let Some(first) = lines.next() else {
                continue;
            };

            // The index line is optional in the wild
            let (index, timing) = if first.contains("-->") {
                ((entries.len() + 1) as u32, first)
            } else {
                let index = first
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| CaptionError::Srt(format!("invalid cue index: {}", first.trim())))?;
                let timing = lines
                    .next()
                    .ok_or_else(|| CaptionError::Srt(format!("cue {} has no timing line", index)))?;
                (index, timing)
            };

            let (start, end) = parse_timing_line(timing)?;
            let text = lines.collect::<Vec<_>>().join("\n");
            entries.push(SrtEntry::new(index, start, end, text));
        }

        Ok(entries)
    }

    /// Parse SRT content directly into a transcript for `video_id`
    pub fn parse_transcript(video_id: &str, content: &str, skip_annotations: bool) -> Result<Transcript> {
        let segments = Self::parse(content)?.iter().map(SrtEntry::to_segment).collect();
        let segments = super::normalize_segments(segments, skip_annotations);
        Ok(Transcript::from_segments(video_id, segments))
    }

    /// Read and parse an SRT file
    pub async fn read_transcript<P: AsRef<Path>>(
        video_id: &str,
        path: P,
        skip_annotations: bool,
    ) -> Result<Transcript> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::parse_transcript(video_id, &content, skip_annotations)
    }
}

/// SRT file writer
#[derive(Debug, Clone, Default)]
pub struct SrtWriter {
    entries: Vec<SrtEntry>,
}

impl SrtWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build entries from a transcript's segments
    ///
    /// Segments whose times do not fit a `Duration` are skipped.
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let mut writer = Self::new();
        for segment in &transcript.segments {
            let times = Duration::try_from_secs_f64(segment.start)
                .and_then(|start| Duration::try_from_secs_f64(segment.end).map(|end| (start, end)));
            match times {
                Ok((start, end)) => writer.add_entry(SrtEntry::new(
                    (writer.len() + 1) as u32,
                    start,
                    end,
                    segment.text.clone(),
                )),
                Err(e) => warn!("Skipping caption at {}s: {}", segment.start, e),
            }
        }
        writer
    }

    pub fn add_entry(&mut self, entry: SrtEntry) {
        self.entries.push(entry);
    }

    /// Sort entries by start time and re-index
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.start.cmp(&b.start));

        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.index = (i + 1) as u32;
        }
    }

    /// Generate SRT content as string
    pub fn generate(&self) -> String {
        let mut srt_content = String::new();

        for entry in &self.entries {
            srt_content.push_str(&entry.to_string());
            srt_content.push('\n');
        }

        srt_content
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.generate();
        tokio::fs::write(path.as_ref(), content).await?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SrtEntry] {
        &self.entries
    }
}

/// Collapse whitespace and line breaks to single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format duration as SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let milliseconds = duration.subsec_millis();

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, milliseconds)
}

fn parse_timing_line(line: &str) -> Result<(Duration, Duration)> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return Err(CaptionError::Srt(format!("invalid timing line: {}", line)));
    }

    // Cue settings may follow the end timestamp
    let end = parts[1].split_whitespace().next().unwrap_or_default();
    Ok((parse_timestamp(parts[0].trim())?, parse_timestamp(end)?))
}

/// Parse a single timestamp (HH:MM:SS,mmm); a dot separator is accepted too
pub fn parse_timestamp(timestamp: &str) -> Result<Duration> {
    let invalid = || CaptionError::Srt(format!("invalid timestamp: {}", timestamp));

    let (hms, millis) = timestamp
        .split_once(',')
        .or_else(|| timestamp.split_once('.'))
        .ok_or_else(invalid)?;

    let hms_parts: Vec<&str> = hms.split(':').collect();
    if hms_parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = hms_parts[0].trim().parse().map_err(|_| invalid())?;
    let minutes: u64 = hms_parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = hms_parts[2].parse().map_err(|_| invalid())?;
    let milliseconds: u64 = millis.trim().parse().map_err(|_| invalid())?;

    let total_millis = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(milliseconds))
        .ok_or_else(invalid)?;
    Ok(Duration::from_millis(total_millis))
}
