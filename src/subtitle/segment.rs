use serde::{Deserialize, Serialize};

use crate::media::reconcile::TimeWindow;
use crate::tts::VoiceProfile;

/// Какой текст сегмента озвучивать или экспортировать
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Только перевод
    Translated,
    /// Только исходный текст
    Source,
    /// Перевод, а если его нет - исходный текст
    #[default]
    TranslatedOrSource,
}

/// Один субтитр: окно времени и тексты
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// Стабильный ключ, уникальный в пределах хранилища
    pub index: u32,
    /// Начало, мс
    pub start: u64,
    /// Конец, мс
    pub end: u64,
    /// Текст на исходном языке
    pub source_text: String,
    /// Перевод; может быть пустым до применения перевода
    #[serde(default)]
    pub translated_text: String,
    /// Голос сегмента; `None` - голос пакета по умолчанию
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceProfile>,
}

impl Segment {
    pub fn new(index: u32, start: u64, end: u64, source_text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            source_text: source_text.into(),
            translated_text: String::new(),
            voice: None,
        }
    }

    pub fn with_translation(mut self, translated_text: impl Into<String>) -> Self {
        self.translated_text = translated_text.into();
        self
    }

    pub fn with_voice(mut self, voice: VoiceProfile) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Текст сегмента согласно выбранному источнику
    pub fn text(&self, source: TextSource) -> &str {
        match source {
            TextSource::Translated => &self.translated_text,
            TextSource::Source => &self.source_text,
            TextSource::TranslatedOrSource => {
                if self.translated_text.trim().is_empty() {
                    &self.source_text
                } else {
                    &self.translated_text
                }
            }
        }
    }
}
