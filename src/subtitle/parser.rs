//! Модуль для парсинга субтитров
//!
//! Читает SRT и WebVTT в список сегментов. Индексы назначаются по порядку
//! `1..=n`, номера и идентификаторы реплик из файла игнорируются.

use std::path::Path;

use log::{debug, warn};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::{DubSyncError, Result};
use crate::subtitle::segment::Segment;
use crate::subtitle::timecode::parse_timestamp;

static TIMING_RE: OnceCell<Regex> = OnceCell::new();
static MARKUP_RE: OnceCell<Regex> = OnceCell::new();

fn timing_regex() -> Result<&'static Regex> {
    TIMING_RE.get_or_try_init(|| {
        Regex::new(r"^\s*(\S+)\s+-->\s+(\S+)").map_err(|e| DubSyncError::SubtitleParsing(e.to_string()))
    })
}

fn markup_regex() -> Result<&'static Regex> {
    MARKUP_RE.get_or_try_init(|| {
        Regex::new(r"<[^>]*>").map_err(|e| DubSyncError::SubtitleParsing(e.to_string()))
    })
}

/// Парсинг файла субтитров; формат определяется по расширению
pub fn parse_subtitle_file<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("srt") => parse_srt(&content),
        Some("vtt") => parse_vtt(&content),
        other => Err(DubSyncError::SubtitleParsing(format!(
            "unsupported subtitle format {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

/// Парсинг содержимого SRT
pub fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let segments = parse_blocks(content, &[])?;
    debug!("Parsed {} SRT entries", segments.len());
    Ok(segments)
}

/// Парсинг содержимого WebVTT.
///
/// Отсутствие заголовка `WEBVTT` не считается ошибкой, только предупреждением.
/// Блоки `NOTE`, `STYLE` и `REGION` пропускаются.
pub fn parse_vtt(content: &str) -> Result<Vec<Segment>> {
    let content = content.trim_start_matches('\u{feff}');
    let body = match content.trim_start().strip_prefix("WEBVTT") {
        Some(rest) => rest.split_once('\n').map(|(_, body)| body).unwrap_or(""),
        None => {
            warn!("VTT content has no WEBVTT header, parsing anyway");
            content
        }
    };

    let segments = parse_blocks(body, &["NOTE", "STYLE", "REGION"])?;
    debug!("Parsed {} VTT cues", segments.len());
    Ok(segments)
}

fn parse_blocks(content: &str, skipped_blocks: &[&str]) -> Result<Vec<Segment>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let timing_re = timing_regex()?;

    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    // Пустая строка в конце закрывает последний блок
    for line in content.lines().chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }

        let first = block[0].trim_start();
        if skipped_blocks.iter().any(|kind| first.starts_with(kind)) {
            block.clear();
            continue;
        }

        let Some(timing_pos) = block.iter().position(|l| l.contains("-->")) else {
            warn!("Skipping subtitle block without timing line: {:?}", first);
            block.clear();
            continue;
        };

        let caps = timing_re.captures(block[timing_pos]).ok_or_else(|| {
            DubSyncError::SubtitleParsing(format!("malformed timing line '{}'", block[timing_pos]))
        })?;
        let start = parse_timestamp(&caps[1])?;
        let end = parse_timestamp(&caps[2])?;
        if end <= start {
            return Err(DubSyncError::SubtitleParsing(format!(
                "entry '{}' ends before it starts",
                block[timing_pos].trim()
            )));
        }

        let text = clean_text(&block[timing_pos + 1..])?;
        let index = segments.len() as u32 + 1;
        segments.push(Segment::new(index, start, end, text));
        block.clear();
    }

    Ok(segments)
}

/// Склеивает строки текста реплики, убирая разметку вида `<i>` и `<v Speaker>`
fn clean_text(lines: &[&str]) -> Result<String> {
    let markup_re = markup_regex()?;
    Ok(lines
        .iter()
        .map(|line| markup_re.replace_all(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_srt_basic() {
        let content = "1\r\n00:00:01,000 --> 00:00:02,500\r\nHello there\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\n<i>General</i>\r\nKenobi\r\n";
        let segments = parse_srt(content).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 1);
        assert_eq!(segments[0].start, 1000);
        assert_eq!(segments[0].end, 2500);
        assert_eq!(segments[0].source_text, "Hello there");
        assert_eq!(segments[1].source_text, "General\nKenobi");
    }

    #[test]
    fn test_parse_vtt_with_settings_and_notes() {
        let content = "WEBVTT - demo\n\nNOTE this is a comment\n\nintro\n00:01.000 --> 00:02.000 align:start\n<v Bob>Hi</v>\n";
        let segments = parse_vtt(content).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1000);
        assert_eq!(segments[0].end, 2000);
        assert_eq!(segments[0].source_text, "Hi");
    }

    #[test]
    fn test_parse_vtt_without_header() {
        let segments = parse_vtt("00:00:01.000 --> 00:00:02.000\nText\n").unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_inverted_entry_is_rejected() {
        let result = parse_srt("1\n00:00:05,000 --> 00:00:04,000\nBackwards\n");
        assert!(matches!(result, Err(DubSyncError::SubtitleParsing(_))));
    }
}
