//! Детерминированный синтезатор для тестов и прогонов без сети.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{DubSyncError, Result, SynthesisErrorKind};
use crate::media::audio::ms_to_samples;
use crate::tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip};

/// Как выбирается длительность клипа
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneDuration {
    /// Одинаковая длительность для любого текста, мс
    Fixed(u64),
    /// Длительность на символ текста, мс
    PerChar(u64),
}

/// Синтезатор, возвращающий постоянный сигнал заданной длины
#[derive(Debug)]
pub struct FixedToneSynthesizer {
    duration: ToneDuration,
    value: f32,
    sample_rate: u32,
    failing: HashSet<u32>,
    calls: AtomicUsize,
}

impl FixedToneSynthesizer {
    pub fn new(duration: ToneDuration, value: f32, sample_rate: u32) -> Self {
        Self {
            duration,
            value,
            sample_rate,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Сегменты, для которых синтез всегда завершается отказом бэкенда
    pub fn failing_on<I: IntoIterator<Item = u32>>(mut self, indices: I) -> Self {
        self.failing.extend(indices);
        self
    }

    /// Сколько раз вызывался `synthesize`
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn duration_for(&self, text: &str) -> u64 {
        match self.duration {
            ToneDuration::Fixed(ms) => ms,
            ToneDuration::PerChar(ms) => ms * text.trim().chars().count() as u64,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedToneSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesizedClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = request.segment_index;

        if request.text.trim().is_empty() {
            return Err(DubSyncError::synthesis(
                SynthesisErrorKind::EmptyText,
                "segment has no text to speak",
            )
            .for_segment(index));
        }
        if self.failing.contains(&index) {
            return Err(DubSyncError::synthesis(
                SynthesisErrorKind::BackendRejected,
                "forced failure",
            )
            .for_segment(index));
        }

        let samples = ms_to_samples(self.duration_for(request.text), self.sample_rate);
        Ok(SynthesizedClip::new(
            index,
            vec![self.value; samples],
            self.sample_rate,
        ))
    }

    fn name(&self) -> &str {
        "fixed-tone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::VoiceProfile;

    #[tokio::test]
    async fn test_per_char_duration() {
        let synth = FixedToneSynthesizer::new(ToneDuration::PerChar(100), 0.5, 1000);
        let profile = VoiceProfile::default();
        let clip = synth
            .synthesize(&SynthesisRequest {
                segment_index: 1,
                text: "hello",
                profile: &profile,
            })
            .await
            .unwrap();
        assert_eq!(clip.natural_duration, 500);
        assert!(clip.samples.iter().all(|&s| s == 0.5));
        assert_eq!(synth.calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_failure() {
        let synth = FixedToneSynthesizer::new(ToneDuration::Fixed(100), 0.5, 1000).failing_on([3]);
        let profile = VoiceProfile::default();
        let err = synth
            .synthesize(&SynthesisRequest {
                segment_index: 3,
                text: "hello",
                profile: &profile,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DubSyncError::Synthesis {
                index: Some(3),
                kind: SynthesisErrorKind::BackendRejected,
                ..
            }
        ));
    }
}
