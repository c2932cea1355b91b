//! # Голоса и каталог голосов
//!
//! Профиль голоса сегмента (голос, скорость, высота тона) и неизменяемый
//! каталог голосов, который загружается один раз и явно передается
//! синтезатору и оркестратору.

use serde::{Deserialize, Serialize};

use crate::error::{DubSyncError, Result, SynthesisErrorKind};

/// Пол голоса в каталоге
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

/// Описание одного голоса каталога
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Идентификатор голоса в бэкенде
    pub id: String,
    /// Поддерживаемая локаль, например `en-US`
    pub locale: String,
    /// Пол голоса
    pub gender: Gender,
    /// Отображаемое имя
    #[serde(default)]
    pub display_name: String,
}

impl VoiceInfo {
    pub fn new(id: &str, locale: &str, gender: Gender, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            locale: locale.to_string(),
            gender,
            display_name: display_name.to_string(),
        }
    }
}

/// Неизменяемый каталог голосов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct VoiceCatalogue {
    voices: Vec<VoiceInfo>,
}

impl VoiceCatalogue {
    /// Создает каталог из списка голосов; первый голос локали считается голосом по умолчанию
    pub fn new(voices: Vec<VoiceInfo>) -> Self {
        Self { voices }
    }

    /// Ищет голос по идентификатору
    pub fn get(&self, voice_id: &str) -> Option<&VoiceInfo> {
        self.voices.iter().find(|v| v.id == voice_id)
    }

    pub fn contains(&self, voice_id: &str) -> bool {
        self.get(voice_id).is_some()
    }

    /// Голоса для локали
    pub fn voices_for_locale<'a>(&'a self, locale: &'a str) -> impl Iterator<Item = &'a VoiceInfo> + 'a {
        self.voices.iter().filter(move |v| v.locale == locale)
    }

    /// Голос по умолчанию для локали
    pub fn default_voice(&self, locale: &str) -> Option<&VoiceInfo> {
        self.voices.iter().find(|v| v.locale == locale)
    }

    /// Список поддерживаемых локалей без повторов, в порядке каталога
    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = Vec::new();
        for voice in &self.voices {
            if !locales.contains(&voice.locale.as_str()) {
                locales.push(&voice.locale);
            }
        }
        locales
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

/// Голоса OpenAI `audio/speech` (многоязычные, локаль условная)
pub const OPENAI_LOCALE: &str = "multi";

/// Голос по умолчанию, принимаемый OpenAI `audio/speech`
pub const DEFAULT_VOICE_ID: &str = "nova";

impl VoiceCatalogue {
    /// Голоса OpenAI `audio/speech`
    pub fn openai() -> Self {
        use Gender::{Female, Male};
        Self::new(vec![
            VoiceInfo::new("alloy", OPENAI_LOCALE, Female, "Alloy"),
            VoiceInfo::new("echo", OPENAI_LOCALE, Male, "Echo"),
            VoiceInfo::new("fable", OPENAI_LOCALE, Male, "Fable"),
            VoiceInfo::new("onyx", OPENAI_LOCALE, Male, "Onyx"),
            VoiceInfo::new("nova", OPENAI_LOCALE, Female, "Nova"),
            VoiceInfo::new("shimmer", OPENAI_LOCALE, Female, "Shimmer"),
        ])
    }

    /// Нейронные голоса Edge для совместимых серверов, которые их принимают.
    /// Подключается явно, вместе с `backend.base_url` такого сервера.
    pub fn edge_neural() -> Self {
        use Gender::{Female, Male};
        Self::new(vec![
            VoiceInfo::new("zh-CN-XiaoxiaoNeural", "zh-CN", Female, "Xiaoxiao"),
            VoiceInfo::new("zh-CN-XiaoyiNeural", "zh-CN", Female, "Xiaoyi"),
            VoiceInfo::new("zh-CN-YunxiNeural", "zh-CN", Male, "Yunxi"),
            VoiceInfo::new("zh-CN-YunjianNeural", "zh-CN", Male, "Yunjian"),
            VoiceInfo::new("zh-CN-YunyangNeural", "zh-CN", Male, "Yunyang"),
            VoiceInfo::new("en-US-JennyNeural", "en-US", Female, "Jenny"),
            VoiceInfo::new("en-US-GuyNeural", "en-US", Male, "Guy"),
            VoiceInfo::new("en-US-AriaNeural", "en-US", Female, "Aria"),
            VoiceInfo::new("en-US-DavisNeural", "en-US", Male, "Davis"),
            VoiceInfo::new("ja-JP-NanamiNeural", "ja-JP", Female, "Nanami"),
            VoiceInfo::new("ja-JP-KeitaNeural", "ja-JP", Male, "Keita"),
            VoiceInfo::new("ko-KR-SunHiNeural", "ko-KR", Female, "SunHi"),
            VoiceInfo::new("ko-KR-InJoonNeural", "ko-KR", Male, "InJoon"),
            VoiceInfo::new("es-ES-ElviraNeural", "es-ES", Female, "Elvira"),
            VoiceInfo::new("es-ES-AlvaroNeural", "es-ES", Male, "Alvaro"),
            VoiceInfo::new("fr-FR-DeniseNeural", "fr-FR", Female, "Denise"),
            VoiceInfo::new("fr-FR-HenriNeural", "fr-FR", Male, "Henri"),
            VoiceInfo::new("de-DE-KatjaNeural", "de-DE", Female, "Katja"),
            VoiceInfo::new("de-DE-ConradNeural", "de-DE", Male, "Conrad"),
            VoiceInfo::new("ru-RU-SvetlanaNeural", "ru-RU", Female, "Svetlana"),
            VoiceInfo::new("ru-RU-DmitryNeural", "ru-RU", Male, "Dmitry"),
            VoiceInfo::new("pt-BR-FranciscaNeural", "pt-BR", Female, "Francisca"),
            VoiceInfo::new("pt-BR-AntonioNeural", "pt-BR", Male, "Antonio"),
            VoiceInfo::new("ar-SA-ZariyahNeural", "ar-SA", Female, "Zariyah"),
            VoiceInfo::new("ar-SA-HamedNeural", "ar-SA", Male, "Hamed"),
        ])
    }
}

/// По умолчанию каталог совпадает с бэкендом по умолчанию (OpenAI)
impl Default for VoiceCatalogue {
    fn default() -> Self {
        Self::openai()
    }
}

/// Замкнутый диапазон допустимых значений
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bounds {
    pub min: i32,
    pub max: i32,
}

impl Bounds {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Диапазон изменения скорости речи в процентах
pub const DEFAULT_RATE_BOUNDS: Bounds = Bounds::new(-50, 100);
/// Диапазон изменения высоты тона в герцах
pub const DEFAULT_PITCH_BOUNDS: Bounds = Bounds::new(-50, 50);

/// Профиль голоса сегмента
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VoiceProfile {
    /// Идентификатор голоса из каталога
    pub voice_id: String,
    /// Изменение скорости речи, %
    #[serde(default)]
    pub rate_percent: i32,
    /// Изменение высоты тона, Гц
    #[serde(default)]
    pub pitch_hz: i32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE_ID)
    }
}

impl VoiceProfile {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            rate_percent: 0,
            pitch_hz: 0,
        }
    }

    pub fn with_rate(mut self, rate_percent: i32) -> Self {
        self.rate_percent = rate_percent;
        self
    }

    pub fn with_pitch(mut self, pitch_hz: i32) -> Self {
        self.pitch_hz = pitch_hz;
        self
    }

    /// Параметр скорости в виде `+10%` / `-20%`
    pub fn rate_param(&self) -> String {
        format!("{:+}%", self.rate_percent)
    }

    /// Параметр высоты тона в виде `+5Hz` / `-5Hz`
    pub fn pitch_param(&self) -> String {
        format!("{:+}Hz", self.pitch_hz)
    }

    /// Множитель скорости воспроизведения (1.0 = без изменений)
    pub fn speed(&self) -> f32 {
        1.0 + self.rate_percent as f32 / 100.0
    }

    /// Проверяет границы скорости/тона и наличие голоса в каталоге
    pub fn validate(&self, catalogue: &VoiceCatalogue, rate: Bounds, pitch: Bounds) -> Result<()> {
        if !rate.contains(self.rate_percent) {
            return Err(DubSyncError::Validation(format!(
                "rate adjustment {} is outside [{}%, {}%]",
                self.rate_param(),
                rate.min,
                rate.max
            )));
        }
        if !pitch.contains(self.pitch_hz) {
            return Err(DubSyncError::Validation(format!(
                "pitch adjustment {} is outside [{}Hz, {}Hz]",
                self.pitch_param(),
                pitch.min,
                pitch.max
            )));
        }
        if !catalogue.contains(&self.voice_id) {
            return Err(DubSyncError::synthesis(
                SynthesisErrorKind::UnsupportedVoice,
                format!("voice '{}' is not in the catalogue", self.voice_id),
            ));
        }
        Ok(())
    }
}
