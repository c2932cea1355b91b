//! Модуль конфигурации библиотеки dub-sync
//!
//! Конфигурация читается из JSON; отсутствующие поля получают значения
//! по умолчанию.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DubSyncError, Result};
use crate::media::mixer::{MixMode, DEFAULT_DUCK_GAIN};
use crate::media::reconcile::{ReconcilerConfig, DEFAULT_OVERFLOW_TOLERANCE};
use crate::subtitle::TextSource;
use crate::tts::voice::{DEFAULT_PITCH_BOUNDS, DEFAULT_RATE_BOUNDS};
use crate::tts::{Bounds, VoiceCatalogue, VoiceProfile};

/// Переменная окружения с API ключом, если он не указан в конфигурации
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Параметры OpenAI-совместимого TTS сервиса
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Базовый URL API, например `https://api.openai.com/v1`
    pub base_url: String,
    /// API ключ; пустая строка означает "взять из окружения"
    pub api_key: String,
    /// Модель TTS
    pub model: String,
    /// Таймаут одного запроса в секундах
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    /// API ключ из конфигурации или из `OPENAI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DubSyncConfig {
    /// Каталог доступных голосов
    pub voices: VoiceCatalogue,
    /// Голос для сегментов без собственного профиля
    pub default_voice: VoiceProfile,
    /// Допустимое изменение скорости, %
    pub rate_bounds: Bounds,
    /// Допустимое изменение высоты тона, Гц
    pub pitch_bounds: Bounds,
    /// Режим микширования
    pub mix_mode: MixMode,
    /// Максимальное отношение длительности клипа к окну для сжатия
    pub overflow_tolerance: f64,
    /// Множитель громкости оригинала в режиме duck
    pub duck_gain: f32,
    /// Максимальное количество одновременных запросов к TTS
    pub max_concurrent_requests: usize,
    /// Какой текст сегмента озвучивать
    pub text_source: TextSource,
    /// Параметры TTS сервиса
    pub backend: BackendConfig,
    /// Кэшировать синтезированные клипы в памяти
    pub cache: bool,
}

impl Default for DubSyncConfig {
    fn default() -> Self {
        Self {
            voices: VoiceCatalogue::default(),
            default_voice: VoiceProfile::default(),
            rate_bounds: DEFAULT_RATE_BOUNDS,
            pitch_bounds: DEFAULT_PITCH_BOUNDS,
            mix_mode: MixMode::default(),
            overflow_tolerance: DEFAULT_OVERFLOW_TOLERANCE,
            duck_gain: DEFAULT_DUCK_GAIN,
            max_concurrent_requests: 5,
            text_source: TextSource::default(),
            backend: BackendConfig::default(),
            cache: true,
        }
    }
}

impl DubSyncConfig {
    /// Загружает и проверяет конфигурацию из JSON файла
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Проверяет согласованность параметров
    pub fn validate(&self) -> Result<()> {
        if !self.overflow_tolerance.is_finite() || self.overflow_tolerance < 1.0 {
            return Err(DubSyncError::Configuration(format!(
                "overflow_tolerance must be >= 1.0, got {}",
                self.overflow_tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.duck_gain) {
            return Err(DubSyncError::Configuration(format!(
                "duck_gain must be within [0, 1], got {}",
                self.duck_gain
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(DubSyncError::Configuration(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        for (name, bounds) in [("rate_bounds", self.rate_bounds), ("pitch_bounds", self.pitch_bounds)] {
            if bounds.min > bounds.max {
                return Err(DubSyncError::Configuration(format!(
                    "{} min {} is greater than max {}",
                    name, bounds.min, bounds.max
                )));
            }
        }
        if self.voices.is_empty() {
            return Err(DubSyncError::Configuration("voice catalogue is empty".to_string()));
        }
        self.default_voice
            .validate(&self.voices, self.rate_bounds, self.pitch_bounds)
            .map_err(|e| DubSyncError::Configuration(format!("invalid default voice: {}", e)))?;
        if self.backend.timeout_secs == 0 {
            return Err(DubSyncError::Configuration(
                "backend.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            overflow_tolerance: self.overflow_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DubSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.mix_mode, MixMode::Replace);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = DubSyncConfig::default();
        config.duck_gain = 1.5;
        assert!(matches!(config.validate(), Err(DubSyncError::Configuration(_))));

        let mut config = DubSyncConfig::default();
        config.default_voice = VoiceProfile::new("nobody");
        assert!(matches!(config.validate(), Err(DubSyncError::Configuration(_))));

        let mut config = DubSyncConfig::default();
        config.rate_bounds = Bounds::new(10, -10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configured_api_key_wins() {
        let backend = BackendConfig {
            api_key: " sk-test ".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(backend.resolved_api_key().as_deref(), Some("sk-test"));
    }
}
