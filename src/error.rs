//! Модуль обработки ошибок библиотеки dub-sync
//!
//! Ошибки делятся на структурные (нарушение инвариантов хранилища сегментов),
//! ошибки синтеза (изолированы на уровне одного сегмента) и фатальные ошибки
//! обработки аудио. Предупреждение об обрезке не является ошибкой и живет
//! в [`crate::media::reconcile::TruncationWarning`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Причина отказа TTS-бэкенда
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisErrorKind {
    /// Пустой текст сегмента
    EmptyText,
    /// Голос отсутствует в каталоге
    UnsupportedVoice,
    /// Сервис недоступен (сеть, таймаут)
    BackendUnavailable,
    /// Сервис вернул ошибку
    BackendRejected,
    /// Ответ не удалось декодировать как аудио
    InvalidAudio,
}

/// Ошибки библиотеки dub-sync
#[derive(Debug, Error)]
pub enum DubSyncError {
    /// Нарушение инварианта сегмента (ошибка вызывающей стороны)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Структурно запрещенная операция, например слияние несоседних сегментов
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Ошибка синтеза речи для одного сегмента
    #[error("Synthesis error for segment {}: {kind:?}: {message}", display_index(.index))]
    Synthesis {
        index: Option<u32>,
        kind: SynthesisErrorKind,
        message: String,
    },

    /// Ошибка обработки аудио (фатальна для пакета)
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка парсинга субтитров
    #[error("Subtitle parsing error: {0}")]
    SubtitleParsing(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Пакет был отменен до завершения
    #[error("Batch cancelled")]
    Cancelled,

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка чтения/записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

fn display_index(index: &Option<u32>) -> String {
    match index {
        Some(i) => i.to_string(),
        None => "?".to_string(),
    }
}

impl DubSyncError {
    /// Создает ошибку синтеза без привязки к сегменту
    pub fn synthesis(kind: SynthesisErrorKind, message: impl Into<String>) -> Self {
        Self::Synthesis {
            index: None,
            kind,
            message: message.into(),
        }
    }

    /// Привязывает ошибку синтеза к индексу сегмента; остальные ошибки не меняются
    pub fn for_segment(self, segment_index: u32) -> Self {
        match self {
            Self::Synthesis { kind, message, .. } => Self::Synthesis {
                index: Some(segment_index),
                kind,
                message,
            },
            other => other,
        }
    }
}

/// Тип Result для библиотеки dub-sync
pub type Result<T> = std::result::Result<T, DubSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_segment_attaches_index() {
        let err = DubSyncError::synthesis(SynthesisErrorKind::EmptyText, "nothing to say")
            .for_segment(7);
        match &err {
            DubSyncError::Synthesis { index, kind, .. } => {
                assert_eq!(*index, Some(7));
                assert_eq!(*kind, SynthesisErrorKind::EmptyText);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("segment 7"));
    }

    #[test]
    fn test_for_segment_keeps_other_errors() {
        let err = DubSyncError::Validation("bad".into()).for_segment(3);
        assert!(matches!(err, DubSyncError::Validation(_)));
    }
}
