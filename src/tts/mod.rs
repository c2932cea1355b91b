//! # TTS (Text-to-Speech) модуль
//!
//! Абстракция бэкенда синтеза речи. Каждый вызов [`SpeechSynthesizer::synthesize`]
//! независим от остальных, поэтому сегменты можно озвучивать параллельно.
//!
//! Реализации:
//! - [`openai::HttpSpeechSynthesizer`] - OpenAI-совместимый HTTP сервис
//! - [`fake::FixedToneSynthesizer`] - детерминированная заглушка для тестов
//! - [`cache::CachingSynthesizer`] - кэширующая обертка над любой реализацией

pub mod cache;
pub mod fake;
pub mod openai;
pub mod voice;

use async_trait::async_trait;

use crate::error::Result;
use crate::media::audio::duration_ms;

pub use voice::{Bounds, Gender, VoiceCatalogue, VoiceInfo, VoiceProfile};

/// Запрос на синтез речи для одного сегмента
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Индекс исходного сегмента
    pub segment_index: u32,
    /// Текст для озвучивания
    pub text: &'a str,
    /// Голос, скорость и высота тона
    pub profile: &'a VoiceProfile,
}

/// Синтезированный аудиоклип одного сегмента
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    /// Обратная ссылка на сегмент (только для поиска)
    pub segment_index: u32,
    /// PCM семплы (f32, моно)
    pub samples: Vec<f32>,
    /// Частота дискретизации
    pub sample_rate: u32,
    /// Измеренная длительность в миллисекундах
    pub natural_duration: u64,
}

impl SynthesizedClip {
    /// Создает клип и измеряет его длительность по числу семплов
    pub fn new(segment_index: u32, samples: Vec<f32>, sample_rate: u32) -> Self {
        let natural_duration = duration_ms(samples.len(), sample_rate);
        Self {
            segment_index,
            samples,
            sample_rate,
            natural_duration,
        }
    }
}

/// Трейт, который реализуют все TTS бэкенды
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезирует речь для одного сегмента.
    ///
    /// При отказе бэкенда возвращает `DubSyncError::Synthesis` с индексом сегмента.
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesizedClip>;

    /// Имя бэкенда для логов
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: SpeechSynthesizer + ?Sized> SpeechSynthesizer for std::sync::Arc<S> {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesizedClip> {
        (**self).synthesize(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
