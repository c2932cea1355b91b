//! # Track Mixer
//!
//! Накладывает размещенные клипы на оригинальную дорожку в одном из трех
//! режимов. Режим выбирается на весь пакет.
//!
//! - **Replace** - внутри окон оригинал обнуляется, затем добавляется клип
//! - **Duck** - внутри окон оригинал ослабляется на фиксированный коэффициент
//! - **Overlay** - клип добавляется поверх оригинала без изменений
//!
//! Пересекающиеся клипы суммируются. Длина результата всегда равна длине
//! оригинала: все, что выходит за конец дорожки, отбрасывается.

use std::fmt;
use std::path::Path;

use dasp::interpolate::linear::Linear;
use dasp::{signal, Signal};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{DubSyncError, Result};
use crate::media::audio::{duration_ms, ms_to_samples, write_wav, AudioTrack};
use crate::media::reconcile::PlacementDecision;
use crate::tts::SynthesizedClip;

/// Коэффициент ослабления оригинала в режиме Duck по умолчанию
pub const DEFAULT_DUCK_GAIN: f32 = 0.3;

/// Режим микширования
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MixMode {
    /// Полная замена оригинала в окнах
    #[default]
    Replace,
    /// Приглушение оригинала в окнах
    Duck,
    /// Наложение поверх оригинала
    Overlay,
}

impl fmt::Display for MixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Replace => "replace",
            Self::Duck => "duck",
            Self::Overlay => "overlay",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for MixMode {
    type Err = DubSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "duck" => Ok(Self::Duck),
            "overlay" => Ok(Self::Overlay),
            other => Err(DubSyncError::Configuration(format!(
                "unknown mix mode '{}', expected replace, duck or overlay",
                other
            ))),
        }
    }
}

/// Клип вместе с решением о его размещении
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedClip {
    pub clip: SynthesizedClip,
    pub decision: PlacementDecision,
}

/// Итоговая дорожка; после создания не изменяется
#[derive(Debug, Clone, PartialEq)]
pub struct MixedTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl MixedTrack {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.samples.len(), self.sample_rate)
    }

    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_wav(&self.samples, self.sample_rate, path)
    }
}

/// Микшер дорожек
#[derive(Debug, Clone)]
pub struct TrackMixer {
    duck_gain: f32,
}

impl Default for TrackMixer {
    fn default() -> Self {
        Self {
            duck_gain: DEFAULT_DUCK_GAIN,
        }
    }
}

impl TrackMixer {
    pub fn new(duck_gain: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&duck_gain) {
            return Err(DubSyncError::Configuration(format!(
                "duck gain must be within [0.0, 1.0], got {}",
                duck_gain
            )));
        }
        Ok(Self { duck_gain })
    }

    pub fn duck_gain(&self) -> f32 {
        self.duck_gain
    }

    /// Микширует клипы с оригинальной дорожкой за один последовательный проход
    pub fn mix(
        &self,
        original: &AudioTrack,
        placements: &[PlacedClip],
        mode: MixMode,
    ) -> Result<MixedTrack> {
        original.check_well_formed()?;
        let rate = original.sample_rate;
        let len = original.samples.len();

        info!(
            "Mixing {} clips onto {}ms track (mode: {})",
            placements.len(),
            original.duration_ms(),
            mode
        );

        let mut output = original.samples.clone();

        let original_gain = match mode {
            MixMode::Replace => Some(0.0),
            MixMode::Duck => Some(self.duck_gain),
            MixMode::Overlay => None,
        };

        // Маска окон: ослабление применяется к семплу один раз,
        // даже если окна пересекаются
        if let Some(gain) = original_gain {
            let mut covered = vec![false; len];
            for placed in placements {
                let (start, end) = window_range(&placed.decision, rate, len);
                covered[start..end].fill(true);
            }
            for (sample, inside) in output.iter_mut().zip(covered) {
                if inside {
                    *sample *= gain;
                }
            }
        }

        for placed in placements {
            let rendered = render_clip(placed, rate)?;
            let (start, end) = window_range(&placed.decision, rate, len);
            if start >= end {
                debug!(
                    "Segment {}: placement lies outside the track, skipped",
                    placed.decision.segment_index
                );
                continue;
            }
            for (out, sample) in output[start..end].iter_mut().zip(rendered.iter()) {
                *out += sample;
            }
        }

        Ok(MixedTrack {
            samples: output,
            sample_rate: rate,
        })
    }

    /// Дорожка только с озвучкой: режим Replace поверх тишины заданной длины
    pub fn render_dub_only(
        &self,
        placements: &[PlacedClip],
        total_ms: u64,
        sample_rate: u32,
    ) -> Result<MixedTrack> {
        let base = AudioTrack::silent(total_ms, sample_rate);
        self.mix(&base, placements, MixMode::Replace)
    }

    /// Склеивает клипы подряд с паузами между ними
    pub fn concatenate(
        &self,
        clips: &[SynthesizedClip],
        gap_ms: u64,
        sample_rate: u32,
    ) -> Result<AudioTrack> {
        if sample_rate == 0 {
            return Err(DubSyncError::AudioProcessing(
                "cannot concatenate into a 0 Hz track".to_string(),
            ));
        }
        let gap = ms_to_samples(gap_ms, sample_rate);
        let mut samples = Vec::new();

        for (i, clip) in clips.iter().enumerate() {
            if clip.sample_rate == 0 {
                return Err(DubSyncError::AudioProcessing(format!(
                    "clip for segment {} has a sample rate of 0",
                    clip.segment_index
                )));
            }
            if i > 0 {
                samples.resize(samples.len() + gap, 0.0);
            }
            let target_len = scaled_len(clip.samples.len(), clip.sample_rate, sample_rate, 1.0);
            samples.extend(resample(&clip.samples, target_len));
        }

        Ok(AudioTrack::new(samples, sample_rate))
    }
}

/// Диапазон семплов окна размещения, обрезанный по длине дорожки
fn window_range(decision: &PlacementDecision, rate: u32, len: usize) -> (usize, usize) {
    let start = ms_to_samples(decision.placed_start, rate).min(len);
    let end = ms_to_samples(decision.placed_end, rate).min(len);
    (start, end.max(start))
}

/// Приводит клип к частоте дорожки и применяет коэффициент сжатия
fn render_clip(placed: &PlacedClip, track_rate: u32) -> Result<Vec<f32>> {
    let clip = &placed.clip;
    if clip.sample_rate == 0 {
        return Err(DubSyncError::AudioProcessing(format!(
            "clip for segment {} has a sample rate of 0",
            clip.segment_index
        )));
    }

    let target_len = scaled_len(
        clip.samples.len(),
        clip.sample_rate,
        track_rate,
        placed.decision.scale_factor,
    );
    let mut rendered = resample(&clip.samples, target_len);

    // Обрезанное решение заканчивается раньше клипа
    let window_len = ms_to_samples(placed.decision.placed_duration(), track_rate);
    if rendered.len() > window_len {
        rendered.truncate(window_len);
    }

    Ok(rendered)
}

fn scaled_len(len: usize, from_rate: u32, to_rate: u32, scale: f64) -> usize {
    (len as f64 * to_rate as f64 / from_rate as f64 * scale).round() as usize
}

/// Меняет скорость воспроизведения линейной интерполяцией до `output_len` семплов
fn resample(input: &[f32], output_len: usize) -> Vec<f32> {
    let Some(&last) = input.last() else {
        return Vec::new();
    };
    if output_len == 0 {
        return Vec::new();
    }
    if input.len() == output_len {
        return input.to_vec();
    }
    if input.len() == 1 {
        return vec![input[0]; output_len];
    }

    // После конца клипа держим последний семпл, а не тишину
    let mut source = signal::from_iter(input.iter().copied().chain(std::iter::repeat(last)));
    let left = source.next();
    let right = source.next();
    let interpolator = Linear::new(left, right);
    let step = input.len() as f64 / output_len as f64;

    source
        .scale_hz(interpolator, step)
        .take(output_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::reconcile::{PlacementStrategy, TimeWindow, TruncationWarning};

    // 1 семпл = 1 мс
    const RATE: u32 = 1000;

    fn placed(index: u32, start: u64, value: f32, len: usize) -> PlacedClip {
        let clip = SynthesizedClip::new(index, vec![value; len], RATE);
        PlacedClip {
            decision: PlacementDecision {
                segment_index: index,
                target: TimeWindow::new(start, start + len as u64),
                placed_start: start,
                placed_end: start + len as u64,
                scale_factor: 1.0,
                strategy: PlacementStrategy::FitAsIs,
                truncation: None,
            },
            clip,
        }
    }

    fn original(len: usize) -> AudioTrack {
        AudioTrack::new(vec![0.5; len], RATE)
    }

    #[test]
    fn test_replace_zeroes_window() {
        let mixer = TrackMixer::default();
        let mixed = mixer.mix(&original(100), &[placed(1, 10, 0.2, 20)], MixMode::Replace).unwrap();

        assert_eq!(mixed.len(), 100);
        assert_eq!(mixed.samples()[5], 0.5);
        assert!((mixed.samples()[15] - 0.2).abs() < 1e-6);
        assert_eq!(mixed.samples()[30], 0.5);
    }

    #[test]
    fn test_duck_attenuates_and_adds() {
        let mixer = TrackMixer::new(0.25).unwrap();
        let mixed = mixer.mix(&original(100), &[placed(1, 10, 0.2, 20)], MixMode::Duck).unwrap();

        for i in 10..30 {
            assert!((mixed.samples()[i] - (0.5 * 0.25 + 0.2)).abs() < 1e-6, "sample {}", i);
        }
        assert_eq!(mixed.samples()[9], 0.5);
        assert_eq!(mixed.samples()[30], 0.5);
    }

    #[test]
    fn test_overlay_keeps_original_volume() {
        let mixer = TrackMixer::default();
        let mixed = mixer.mix(&original(50), &[placed(1, 0, 0.2, 10)], MixMode::Overlay).unwrap();
        assert!((mixed.samples()[3] - 0.7).abs() < 1e-6);
        assert_eq!(mixed.samples()[20], 0.5);
    }

    #[test]
    fn test_overlapping_windows_are_summed() {
        let mixer = TrackMixer::new(0.5).unwrap();
        let clips = vec![placed(1, 10, 0.1, 30), placed(2, 20, 0.3, 30)];

        let overlay = mixer.mix(&original(100), &clips, MixMode::Overlay).unwrap();
        assert!((overlay.samples()[25] - (0.5 + 0.1 + 0.3)).abs() < 1e-6);

        let replace = mixer.mix(&original(100), &clips, MixMode::Replace).unwrap();
        assert!((replace.samples()[25] - 0.4).abs() < 1e-6);
        assert!((replace.samples()[15] - 0.1).abs() < 1e-6);
        assert!((replace.samples()[45] - 0.3).abs() < 1e-6);

        // ослабление не накапливается в пересечении
        let duck = mixer.mix(&original(100), &clips, MixMode::Duck).unwrap();
        assert!((duck.samples()[25] - (0.25 + 0.4)).abs() < 1e-6);
    }

    #[test]
    fn test_clip_past_track_end_is_cut() {
        let mixer = TrackMixer::default();
        let mixed = mixer.mix(&original(50), &[placed(1, 40, 0.2, 30)], MixMode::Replace).unwrap();
        assert_eq!(mixed.len(), 50);
        assert!((mixed.samples()[49] - 0.2).abs() < 1e-6);

        let beyond = mixer.mix(&original(50), &[placed(2, 80, 0.2, 10)], MixMode::Replace).unwrap();
        assert_eq!(beyond.samples(), original(50).samples.as_slice());
    }

    #[test]
    fn test_stretched_clip_fills_window() {
        let mut stretched = placed(1, 0, 0.2, 140);
        stretched.decision.placed_end = 100;
        stretched.decision.target = TimeWindow::new(0, 100);
        stretched.decision.scale_factor = 100.0 / 140.0;
        stretched.decision.strategy = PlacementStrategy::TimeStretch;

        let mixed = TrackMixer::default()
            .mix(&original(200), &[stretched], MixMode::Replace)
            .unwrap();
        assert!((mixed.samples()[0] - 0.2).abs() < 1e-6);
        assert!((mixed.samples()[99] - 0.2).abs() < 1e-6);
        assert_eq!(mixed.samples()[100], 0.5);
    }

    #[test]
    fn test_truncated_clip_stops_at_placed_end() {
        let mut truncated = placed(1, 0, 0.2, 80);
        truncated.decision.placed_end = 50;
        truncated.decision.strategy = PlacementStrategy::Overflow;
        truncated.decision.truncation = Some(TruncationWarning {
            segment_index: 1,
            natural_end: 80,
            cut_at: 50,
            dropped_ms: 30,
        });

        let mixed = TrackMixer::default()
            .mix(&original(100), &[truncated], MixMode::Overlay)
            .unwrap();
        assert!((mixed.samples()[49] - 0.7).abs() < 1e-6);
        assert_eq!(mixed.samples()[50], 0.5);
    }

    #[test]
    fn test_clip_resampled_to_track_rate() {
        let clip = SynthesizedClip::new(1, vec![0.2; 200], 2000);
        assert_eq!(clip.natural_duration, 100);
        let placed = PlacedClip {
            decision: PlacementDecision {
                segment_index: 1,
                target: TimeWindow::new(0, 100),
                placed_start: 0,
                placed_end: 100,
                scale_factor: 1.0,
                strategy: PlacementStrategy::FitAsIs,
                truncation: None,
            },
            clip,
        };
        let rendered = render_clip(&placed, RATE).unwrap();
        assert_eq!(rendered.len(), 100);
        assert!(rendered.iter().all(|s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_upsampled_clip_holds_last_sample() {
        let rendered = resample(&[0.2; 100], 200);
        assert_eq!(rendered.len(), 200);
        assert!(rendered[195..].iter().all(|s| (s - 0.2).abs() < 1e-6));

        let ramp: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let slowed = resample(&ramp, 25);
        assert!(slowed.iter().all(|&s| s >= 0.0 && s <= 0.9 + 1e-6));
        assert!((slowed[24] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_original_is_fatal() {
        let broken = AudioTrack::new(vec![0.0; 10], 0);
        assert!(matches!(
            TrackMixer::default().mix(&broken, &[], MixMode::Replace),
            Err(DubSyncError::AudioProcessing(_))
        ));
    }

    #[test]
    fn test_dub_only_and_concatenate() {
        let mixer = TrackMixer::default();
        let dub = mixer.render_dub_only(&[placed(1, 10, 0.2, 10)], 50, RATE).unwrap();
        assert_eq!(dub.len(), 50);
        assert_eq!(dub.samples()[0], 0.0);
        assert!((dub.samples()[12] - 0.2).abs() < 1e-6);

        let clips = vec![
            SynthesizedClip::new(1, vec![0.1; 10], RATE),
            SynthesizedClip::new(2, vec![0.2; 10], RATE),
        ];
        let joined = mixer.concatenate(&clips, 5, RATE).unwrap();
        assert_eq!(joined.len(), 25);
        assert_eq!(joined.samples[12], 0.0);
        assert!((joined.samples[20] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_mix_mode_parsing() {
        assert_eq!("Duck".parse::<MixMode>().unwrap(), MixMode::Duck);
        assert_eq!(MixMode::Overlay.to_string(), "overlay");
        assert!("loud".parse::<MixMode>().is_err());
        assert!(TrackMixer::new(1.5).is_err());
    }
}
