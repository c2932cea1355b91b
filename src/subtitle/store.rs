//! # Segment Store
//!
//! Упорядоченный набор сегментов с проверкой инвариантов:
//! сегменты отсортированы по началу и не пересекаются
//! (`segments[i].end <= segments[i + 1].start`).
//!
//! Любая неудачная операция оставляет хранилище без изменений.
//! Хранилище нельзя изменять, пока запущен пакет синтеза, ссылающийся
//! на его сегменты по индексам.

use log::debug;

use crate::error::{DubSyncError, Result};
use crate::subtitle::segment::Segment;
use crate::tts::VoiceProfile;

/// Точка разрезания текста при разделении сегмента (в символах)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplit {
    pub source: usize,
    pub translated: usize,
}

/// Владелец последовательности сегментов
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    next_index: u32,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Загружает список сегментов от внешнего поставщика (все или ничего)
    pub fn from_segments<I>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut incoming: Vec<Segment> = segments.into_iter().collect();
        incoming.sort_by_key(|s| s.start);

        let mut store = Self::new();
        for segment in incoming {
            store.insert(segment)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: u32) -> Option<&Segment> {
        self.position_of(index).map(|pos| &self.segments[pos])
    }

    /// Позиция сегмента в порядке сортировки
    pub fn position_of(&self, index: u32) -> Option<usize> {
        self.segments.iter().position(|s| s.index == index)
    }

    /// Сегмент, следующий за указанным
    pub fn next_after(&self, index: u32) -> Option<&Segment> {
        self.position_of(index)
            .and_then(|pos| self.segments.get(pos + 1))
    }

    /// Конец последнего сегмента
    pub fn total_end(&self) -> u64 {
        self.segments.last().map(|s| s.end).unwrap_or(0)
    }

    /// Вставляет сегмент с сохранением порядка
    pub fn insert(&mut self, segment: Segment) -> Result<()> {
        validate_window(segment.start, segment.end)?;
        if self.position_of(segment.index).is_some() {
            return Err(DubSyncError::Validation(format!(
                "segment index {} is already in use",
                segment.index
            )));
        }

        let pos = self.segments.partition_point(|s| s.start < segment.start);
        self.check_neighbours(pos, None, segment.start, segment.end)?;

        self.next_index = self.next_index.max(segment.index.saturating_add(1));
        self.segments.insert(pos, segment);
        Ok(())
    }

    /// Сливает два соседних сегмента; `index_b` должен идти сразу за `index_a`
    pub fn merge(&mut self, index_a: u32, index_b: u32) -> Result<&Segment> {
        let pos_a = self.require(index_a)?;
        let pos_b = self.require(index_b)?;
        if pos_b != pos_a + 1 {
            return Err(DubSyncError::InvalidOperation(format!(
                "segments {} and {} are not adjacent subtitle entries",
                index_a, index_b
            )));
        }

        let second = self.segments.remove(pos_b);
        let first = &mut self.segments[pos_a];
        first.end = second.end;
        first.source_text = join_text(&first.source_text, &second.source_text);
        first.translated_text = join_text(&first.translated_text, &second.translated_text);

        debug!("Merged segment {} into {}", index_b, index_a);
        Ok(&self.segments[pos_a])
    }

    /// Делит сегмент в момент `at`; возвращает индекс новой второй половины.
    ///
    /// Без `text_split` весь текст остается в первой половине, вторая получает
    /// пустой текст: границы слов после распознавания не сохраняются.
    pub fn split(&mut self, index: u32, at: u64, text_split: Option<TextSplit>) -> Result<u32> {
        let pos = self.require(index)?;
        let segment = &self.segments[pos];
        if at <= segment.start || at >= segment.end {
            return Err(DubSyncError::Validation(format!(
                "split point {}ms is outside segment {} ({}..{}ms)",
                at, index, segment.start, segment.end
            )));
        }

        let ((source_a, source_b), (translated_a, translated_b)) = match text_split {
            Some(split) => (
                split_text(&segment.source_text, split.source)?,
                split_text(&segment.translated_text, split.translated)?,
            ),
            None => (
                (segment.source_text.clone(), String::new()),
                (segment.translated_text.clone(), String::new()),
            ),
        };

        let new_index = self.next_index;
        let next_index = new_index.checked_add(1).ok_or_else(|| {
            DubSyncError::InvalidOperation("segment index space exhausted".to_string())
        })?;

        let second = Segment {
            index: new_index,
            start: at,
            end: segment.end,
            source_text: source_b,
            translated_text: translated_b,
            voice: segment.voice.clone(),
        };

        let first = &mut self.segments[pos];
        first.end = at;
        first.source_text = source_a;
        first.translated_text = translated_a;

        self.segments.insert(pos + 1, second);
        self.next_index = next_index;

        debug!("Split segment {} at {}ms, new segment {}", index, at, new_index);
        Ok(new_index)
    }

    /// Сдвигает все сегменты на `delta_ms`
    pub fn shift_all(&mut self, delta_ms: i64) -> Result<()> {
        let shifted = self
            .segments
            .iter()
            .map(|s| {
                let start = s.start.checked_add_signed(delta_ms);
                let end = s.end.checked_add_signed(delta_ms);
                start.zip(end).ok_or_else(|| {
                    DubSyncError::Validation(format!(
                        "shifting segment {} by {}ms moves it out of range",
                        s.index, delta_ms
                    ))
                })
            })
            .collect::<Result<Vec<(u64, u64)>>>()?;

        for (segment, (start, end)) in self.segments.iter_mut().zip(shifted) {
            segment.start = start;
            segment.end = end;
        }
        Ok(())
    }

    /// Прямое редактирование окна одного сегмента
    pub fn adjust_timing(&mut self, index: u32, new_start: u64, new_end: u64) -> Result<()> {
        let pos = self.require(index)?;
        validate_window(new_start, new_end)?;
        self.check_neighbours(pos, Some(pos), new_start, new_end)?;

        let segment = &mut self.segments[pos];
        segment.start = new_start;
        segment.end = new_end;
        Ok(())
    }

    /// Удаляет сегмент
    pub fn remove(&mut self, index: u32) -> Result<Segment> {
        let pos = self.require(index)?;
        Ok(self.segments.remove(pos))
    }

    /// Заменяет оба текста сегмента
    pub fn edit_text(
        &mut self,
        index: u32,
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
    ) -> Result<()> {
        let pos = self.require(index)?;
        let segment = &mut self.segments[pos];
        segment.source_text = source_text.into();
        segment.translated_text = translated_text.into();
        Ok(())
    }

    pub fn set_voice(&mut self, index: u32, voice: Option<VoiceProfile>) -> Result<()> {
        let pos = self.require(index)?;
        self.segments[pos].voice = voice;
        Ok(())
    }

    /// Применяет переводы ко всем сегментам по порядку
    pub fn apply_translations<I, S>(&mut self, translations: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let translations: Vec<String> = translations.into_iter().map(Into::into).collect();
        if translations.len() != self.segments.len() {
            return Err(DubSyncError::Validation(format!(
                "got {} translations for {} segments",
                translations.len(),
                self.segments.len()
            )));
        }
        for (segment, text) in self.segments.iter_mut().zip(translations) {
            segment.translated_text = text;
        }
        Ok(())
    }

    /// Перенумеровывает сегменты 1..=n в порядке времени
    pub fn renumber(&mut self) {
        for (i, segment) in self.segments.iter_mut().enumerate() {
            segment.index = i as u32 + 1;
        }
        self.next_index = self.segments.len() as u32 + 1;
    }

    /// Проверяет инвариант порядка и непересечения
    pub fn validate(&self) -> Result<()> {
        validate_segments(&self.segments)
    }

    fn require(&self, index: u32) -> Result<usize> {
        self.position_of(index).ok_or_else(|| {
            DubSyncError::InvalidOperation(format!("segment {} does not exist", index))
        })
    }

    /// Проверяет соседей позиции `pos`; `skip` - позиция самого редактируемого сегмента
    fn check_neighbours(&self, pos: usize, skip: Option<usize>, start: u64, end: u64) -> Result<()> {
        let prev = if pos > 0 { self.segments.get(pos - 1) } else { None };
        let next_pos = if skip == Some(pos) { pos + 1 } else { pos };
        let next = self.segments.get(next_pos);

        if let Some(prev) = prev {
            if prev.end > start {
                return Err(DubSyncError::Validation(format!(
                    "window {}..{}ms overlaps segment {} ({}..{}ms)",
                    start, end, prev.index, prev.start, prev.end
                )));
            }
        }
        if let Some(next) = next {
            if next.start < end {
                return Err(DubSyncError::Validation(format!(
                    "window {}..{}ms overlaps segment {} ({}..{}ms)",
                    start, end, next.index, next.start, next.end
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SegmentStore {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Проверяет инвариант для произвольного среза сегментов
pub fn validate_segments(segments: &[Segment]) -> Result<()> {
    for segment in segments {
        validate_window(segment.start, segment.end).map_err(|_| {
            DubSyncError::Validation(format!(
                "segment {} has a non-positive duration ({}..{}ms)",
                segment.index, segment.start, segment.end
            ))
        })?;
    }
    for pair in segments.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(DubSyncError::Validation(format!(
                "segment {} ({}..{}ms) overlaps segment {} ({}..{}ms)",
                pair[0].index, pair[0].start, pair[0].end, pair[1].index, pair[1].start, pair[1].end
            )));
        }
    }
    Ok(())
}

fn validate_window(start: u64, end: u64) -> Result<()> {
    if end <= start {
        return Err(DubSyncError::Validation(format!(
            "segment window {}..{}ms must have a positive duration",
            start, end
        )));
    }
    Ok(())
}

fn join_text(a: &str, b: &str) -> String {
    match (a.trim(), b.trim()) {
        ("", b) => b.to_string(),
        (a, "") => a.to_string(),
        (a, b) => format!("{} {}", a, b),
    }
}

fn split_text(text: &str, at_char: usize) -> Result<(String, String)> {
    let char_count = text.chars().count();
    if at_char > char_count {
        return Err(DubSyncError::Validation(format!(
            "text split point {} is past the end of a {}-character text",
            at_char, char_count
        )));
    }
    let byte = text
        .char_indices()
        .nth(at_char)
        .map(|(b, _)| b)
        .unwrap_or(text.len());
    Ok((text[..byte].trim().to_string(), text[byte..].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_text() {
        assert_eq!(join_text("Hello", "world"), "Hello world");
        assert_eq!(join_text("Hello ", ""), "Hello");
        assert_eq!(join_text("", " world"), "world");
    }

    #[test]
    fn test_split_text_counts_chars() {
        let (a, b) = split_text("Привет мир", 6).unwrap();
        assert_eq!(a, "Привет");
        assert_eq!(b, "мир");
        assert!(split_text("abc", 4).is_err());
        assert_eq!(split_text("abc", 3).unwrap(), ("abc".to_string(), String::new()));
    }
}
