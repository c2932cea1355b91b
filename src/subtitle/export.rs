//! Экспорт сегментов в SRT и WebVTT.
//!
//! Записи нумеруются `1..=n` по порядку. Пересечения и нулевые длительности
//! не исправляются: экспорт завершается ошибкой `Validation`.

use std::path::Path;

use log::info;

use crate::error::{DubSyncError, Result};
use crate::subtitle::segment::{Segment, TextSource};
use crate::subtitle::store::validate_segments;
use crate::subtitle::timecode::{format_srt_timestamp, format_vtt_timestamp};

/// Формат выходного файла субтитров
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("srt") => Ok(Self::Srt),
            Some("vtt") => Ok(Self::Vtt),
            _ => Err(DubSyncError::Validation(format!(
                "cannot infer subtitle format from {}",
                path.display()
            ))),
        }
    }
}

pub fn to_srt(segments: &[Segment], text: TextSource) -> Result<String> {
    validate_segments(segments)?;

    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end),
            segment.text(text)
        ));
    }
    Ok(out)
}

pub fn to_vtt(segments: &[Segment], text: TextSource) -> Result<String> {
    validate_segments(segments)?;

    let mut out = String::from("WEBVTT\n\n");
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end),
            segment.text(text)
        ));
    }
    Ok(out)
}

/// Записывает субтитры в файл, формат выбирается по расширению
pub fn write_subtitle_file<P: AsRef<Path>>(
    segments: &[Segment],
    path: P,
    text: TextSource,
) -> Result<()> {
    let path = path.as_ref();
    let content = match SubtitleFormat::from_path(path)? {
        SubtitleFormat::Srt => to_srt(segments, text)?,
        SubtitleFormat::Vtt => to_vtt(segments, text)?,
    };
    std::fs::write(path, content)?;
    info!("Wrote {} subtitles to {}", segments.len(), path.display());
    Ok(())
}
