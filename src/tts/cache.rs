//! Модуль для кэширования результатов TTS
//!
//! Клипы хранятся в памяти по ключу md5(текст, голос, скорость, тон), поэтому
//! повторный прогон сегментов с тем же текстом не обращается к бэкенду.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;

use crate::error::Result;
use crate::tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip};

/// Кэширующая обертка над любым синтезатором
pub struct CachingSynthesizer<S> {
    inner: S,
    clips: Mutex<HashMap<String, SynthesizedClip>>,
}

impl<S: SpeechSynthesizer> CachingSynthesizer<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            clips: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Количество закэшированных клипов
    pub fn len(&self) -> usize {
        self.clips.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.lock().is_empty()
    }

    pub fn clear(&self) {
        self.clips.lock().clear();
    }

    fn cache_key(request: &SynthesisRequest<'_>) -> String {
        let mut hasher = md5::Context::new();
        hasher.consume(request.text.trim().as_bytes());
        hasher.consume([0u8]);
        hasher.consume(request.profile.voice_id.as_bytes());
        hasher.consume([0u8]);
        hasher.consume(request.profile.rate_percent.to_le_bytes());
        hasher.consume(request.profile.pitch_hz.to_le_bytes());

        format!("{:x}", hasher.compute())
    }
}

#[async_trait]
impl<S: SpeechSynthesizer> SpeechSynthesizer for CachingSynthesizer<S> {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesizedClip> {
        let key = Self::cache_key(request);

        // Блокировка не удерживается через await
        let cached = self.clips.lock().get(&key).cloned();
        if let Some(mut clip) = cached {
            debug!("Cache hit for segment {}", request.segment_index);
            clip.segment_index = request.segment_index;
            return Ok(clip);
        }

        let clip = self.inner.synthesize(request).await?;
        self.clips.lock().insert(key, clip.clone());
        Ok(clip)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
