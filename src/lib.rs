//! Основной файл библиотеки dub-sync
//!
//! Озвучка по субтитрам: сегменты с окнами времени синтезируются в речь,
//! клипы согласуются по длительности со своими окнами и накладываются на
//! оригинальную дорожку.

pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod subtitle;
pub mod tts;
pub mod utils;

// Публично экспортируем основные типы и API для удобства использования
pub use config::{BackendConfig, DubSyncConfig};
pub use error::{DubSyncError, Result, SynthesisErrorKind};
pub use media::{
    AudioTrack, DurationReconciler, MixMode, MixedTrack, PlacedClip, PlacementDecision,
    PlacementStrategy, TimeWindow, TrackMixer, TruncationWarning,
};
pub use pipeline::{BatchOrchestrator, BatchReport, BatchResult, FailureKind, SegmentFailure};
pub use progress::ProgressUpdate;
pub use subtitle::{Segment, SegmentStore, TextSource, TextSplit};
pub use tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip, VoiceCatalogue, VoiceProfile};
