//! Модуль для работы с аудио
//!
//! Согласование длительности клипов, микширование и ввод-вывод WAV.

pub mod audio;
pub mod mixer;
pub mod reconcile;

pub use audio::AudioTrack;
pub use mixer::{MixMode, MixedTrack, PlacedClip, TrackMixer};
pub use reconcile::{
    DurationReconciler, PlacementDecision, PlacementStrategy, ReconcilerConfig, TimeWindow,
    TruncationWarning,
};
