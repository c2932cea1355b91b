//! Временные метки субтитров.
//!
//! Разбор `HH:MM:SS,mmm`, `HH:MM:SS.mmm` и `MM:SS.mmm`, форматирование для
//! SRT и WebVTT. Все значения в миллисекундах.

use crate::error::{DubSyncError, Result};

/// `HH:MM:SS,mmm`
pub fn format_srt_timestamp(ms: u64) -> String {
    let (h, m, s, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, millis)
}

/// `HH:MM:SS.mmm`
pub fn format_vtt_timestamp(ms: u64) -> String {
    let (h, m, s, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

fn split_ms(ms: u64) -> (u64, u64, u64, u64) {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    (hours, minutes, seconds, ms % 1000)
}

/// Разбор временной метки в миллисекунды
pub fn parse_timestamp(value: &str) -> Result<u64> {
    let value = value.trim();
    let invalid = || DubSyncError::SubtitleParsing(format!("invalid timestamp '{}'", value));

    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds_part) = match parts.as_slice() {
        [h, m, s] => (parse_number(h).ok_or_else(invalid)?, parse_number(m).ok_or_else(invalid)?, *s),
        [m, s] => (0, parse_number(m).ok_or_else(invalid)?, *s),
        _ => return Err(invalid()),
    };

    let (seconds, fraction) = match seconds_part.split_once([',', '.']) {
        Some((s, f)) => (s, Some(f)),
        None => (seconds_part, None),
    };
    let seconds = parse_number(seconds).ok_or_else(invalid)?;
    let millis = match fraction {
        Some(f) => parse_fraction(f).ok_or_else(invalid)?,
        None => 0,
    };

    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}

fn parse_number(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Дробная часть секунды с любым числом знаков, приведенная к миллисекундам
fn parse_fraction(value: &str) -> Option<u64> {
    let digits = parse_number(value)?;
    Some(match value.len() {
        1 => digits * 100,
        2 => digits * 10,
        3 => digits,
        n => digits / 10_u64.pow(n as u32 - 3),
    })
}
