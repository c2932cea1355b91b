//! Отчет о пакете озвучки.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DubSyncError, Result, SynthesisErrorKind};
use crate::media::mixer::MixMode;
use crate::media::reconcile::{PlacementDecision, PlacementStrategy, TruncationWarning};

/// Категория отказа сегмента
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Скорость или тон вне допустимых границ
    InvalidProfile,
    EmptyText,
    UnsupportedVoice,
    BackendUnavailable,
    BackendRejected,
    InvalidAudio,
    Other,
}

impl FailureKind {
    pub fn from_error(err: &DubSyncError) -> Self {
        match err {
            DubSyncError::Validation(_) => Self::InvalidProfile,
            DubSyncError::Synthesis { kind, .. } => match kind {
                SynthesisErrorKind::EmptyText => Self::EmptyText,
                SynthesisErrorKind::UnsupportedVoice => Self::UnsupportedVoice,
                SynthesisErrorKind::BackendUnavailable => Self::BackendUnavailable,
                SynthesisErrorKind::BackendRejected => Self::BackendRejected,
                SynthesisErrorKind::InvalidAudio => Self::InvalidAudio,
            },
            DubSyncError::Http(_) => Self::BackendUnavailable,
            _ => Self::Other,
        }
    }
}

/// Сегмент, который не удалось озвучить
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentFailure {
    pub segment_index: u32,
    pub kind: FailureKind,
    pub message: String,
}

impl SegmentFailure {
    pub fn from_error(segment_index: u32, err: &DubSyncError) -> Self {
        let message = match err {
            DubSyncError::Synthesis { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            segment_index,
            kind: FailureKind::from_error(err),
            message,
        }
    }
}

/// Краткое описание размещения для отчета
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementSummary {
    pub segment_index: u32,
    pub placed_start: u64,
    pub placed_end: u64,
    pub scale_factor: f64,
    pub strategy: PlacementStrategy,
    pub truncated: bool,
}

impl From<&PlacementDecision> for PlacementSummary {
    fn from(decision: &PlacementDecision) -> Self {
        Self {
            segment_index: decision.segment_index,
            placed_start: decision.placed_start,
            placed_end: decision.placed_end,
            scale_factor: decision.scale_factor,
            strategy: decision.strategy,
            truncated: decision.is_truncated(),
        }
    }
}

/// Итог пакета: размещения, отказы и предупреждения
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Имя использованного TTS бэкенда
    pub synthesizer: String,
    pub mix_mode: MixMode,
    /// Сегментов, вошедших в пакет
    pub total_segments: usize,
    pub placements: Vec<PlacementSummary>,
    pub failures: Vec<SegmentFailure>,
    pub warnings: Vec<TruncationWarning>,
}

impl BatchReport {
    pub fn new(synthesizer: &str, mix_mode: MixMode, total_segments: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            synthesizer: synthesizer.to_string(),
            mix_mode,
            total_segments,
            placements: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failed_indices(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.segment_index).collect()
    }

    /// Все сегменты озвучены без отказов
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
