//! # Duration Reconciler
//!
//! Сопоставляет естественную длительность синтезированного клипа с окном
//! сегмента и выбирает размещение:
//!
//! 1. **Fit as-is** - клип помещается в окно, остаток окна остается тишиной.
//! 2. **Time-stretch** - превышение в пределах допуска, клип сжимается
//!    (`scale_factor < 1.0`) ровно до длительности окна.
//! 3. **Overflow** - клип выходит за конец окна, но не дальше начала
//!    следующего размещенного клипа. Если и этого мало, решение помечается
//!    предупреждением об обрезке.
//!
//! Начало размещения никогда не предшествует началу окна.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DubSyncError, Result};
use crate::tts::SynthesizedClip;

/// Допуск по умолчанию: клип может быть в 1.5 раза длиннее окна
pub const DEFAULT_OVERFLOW_TOLERANCE: f64 = 1.5;

/// Временное окно в миллисекундах, `[start, end)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u64,
    pub end: u64,
}

impl TimeWindow {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Выбранная стратегия размещения
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    FitAsIs,
    TimeStretch,
    Overflow,
}

/// Нефатальное предупреждение: клип не поместился даже с заимствованием времени
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TruncationWarning {
    pub segment_index: u32,
    /// Где клип закончился бы без обрезки
    pub natural_end: u64,
    /// Где клип обрезан
    pub cut_at: u64,
    /// Сколько миллисекунд речи отброшено
    pub dropped_ms: u64,
}

/// Решение о размещении клипа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementDecision {
    pub segment_index: u32,
    /// Исходное окно сегмента
    pub target: TimeWindow,
    pub placed_start: u64,
    pub placed_end: u64,
    /// 1.0 = без изменений, < 1.0 = сжатие при микшировании
    pub scale_factor: f64,
    pub strategy: PlacementStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationWarning>,
}

impl PlacementDecision {
    pub fn placed_duration(&self) -> u64 {
        self.placed_end - self.placed_start
    }

    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Параметры согласования длительности
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReconcilerConfig {
    /// Максимальное отношение длительности клипа к окну для time-stretch
    pub overflow_tolerance: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            overflow_tolerance: DEFAULT_OVERFLOW_TOLERANCE,
        }
    }
}

/// Чистый синхронный расчет размещения клипов
#[derive(Debug, Clone)]
pub struct DurationReconciler {
    config: ReconcilerConfig,
}

impl DurationReconciler {
    pub fn new(config: ReconcilerConfig) -> Result<Self> {
        if !config.overflow_tolerance.is_finite() || config.overflow_tolerance < 1.0 {
            return Err(DubSyncError::Configuration(format!(
                "overflow tolerance must be >= 1.0, got {}",
                config.overflow_tolerance
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Рассчитывает размещение одного клипа.
    ///
    /// `limit` - начало размещения следующего сегмента (или конец дорожки для
    /// последнего сегмента); `None` означает, что ограничения нет.
    pub fn reconcile(
        &self,
        clip: &SynthesizedClip,
        target: TimeWindow,
        limit: Option<u64>,
    ) -> PlacementDecision {
        let natural = clip.natural_duration;
        let window = target.duration();

        if natural <= window {
            debug!(
                "Segment {}: {}ms fits into {}ms window",
                clip.segment_index, natural, window
            );
            return PlacementDecision {
                segment_index: clip.segment_index,
                target,
                placed_start: target.start,
                placed_end: target.start + natural,
                scale_factor: 1.0,
                strategy: PlacementStrategy::FitAsIs,
                truncation: None,
            };
        }

        let overrun = natural as f64 / window as f64;
        if window > 0 && overrun <= self.config.overflow_tolerance {
            let scale_factor = window as f64 / natural as f64;
            debug!(
                "Segment {}: stretching {}ms into {}ms (scale {:.3})",
                clip.segment_index, natural, window, scale_factor
            );
            return PlacementDecision {
                segment_index: clip.segment_index,
                target,
                placed_start: target.start,
                placed_end: target.end,
                scale_factor,
                strategy: PlacementStrategy::TimeStretch,
                truncation: None,
            };
        }

        let natural_end = target.start + natural;
        let (placed_end, truncation) = match limit {
            Some(limit) if natural_end > limit => {
                // Предел не может быть раньше конца собственного окна
                let cut_at = limit.max(target.end);
                let warning = TruncationWarning {
                    segment_index: clip.segment_index,
                    natural_end,
                    cut_at,
                    dropped_ms: natural_end - cut_at,
                };
                debug!(
                    "Segment {}: {}ms of speech does not fit before {}ms, dropping {}ms",
                    clip.segment_index, natural, cut_at, warning.dropped_ms
                );
                (cut_at, Some(warning))
            }
            _ => (natural_end, None),
        };

        debug!(
            "Segment {}: overflow {:.2}x, placed {}..{}ms (window ends at {}ms)",
            clip.segment_index, overrun, target.start, placed_end, target.end
        );

        PlacementDecision {
            segment_index: clip.segment_index,
            target,
            placed_start: target.start,
            placed_end,
            scale_factor: 1.0,
            strategy: PlacementStrategy::Overflow,
            truncation,
        }
    }

    /// Один проход слева направо с просмотром на один сегмент вперед.
    ///
    /// `entries` упорядочены по времени; `next_starts[i]` - начало окна сегмента,
    /// следующего за i-м в хранилище (успешного или нет), либо `None` для последнего.
    /// Размещение следующего сегмента всегда начинается с начала его окна,
    /// поэтому его окно и служит пределом для переполнения.
    pub fn reconcile_all(
        &self,
        entries: &[(&SynthesizedClip, TimeWindow)],
        next_starts: &[Option<u64>],
        track_end: Option<u64>,
    ) -> Vec<PlacementDecision> {
        let mut decisions: Vec<PlacementDecision> = Vec::with_capacity(entries.len());

        for (i, (clip, target)) in entries.iter().enumerate() {
            let limit = next_starts.get(i).copied().flatten().or(track_end);
            decisions.push(self.reconcile(clip, *target, limit));
        }

        decisions
    }
}
