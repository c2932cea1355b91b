//! Модуль для интеграции с OpenAI-совместимым TTS API
//!
//! `POST {base_url}/audio/speech` с JSON телом, ответ - WAV. Скорость
//! передается как `speed`. Ненулевая высота тона уходит расширенным полем
//! `pitch`, которое учитывают только совместимые серверы; при нулевом тоне
//! поле не отправляется. Постобработки нет.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::BackendConfig;
use crate::error::{DubSyncError, Result, SynthesisErrorKind};
use crate::media::audio::AudioTrack;
use crate::tts::voice::{Bounds, VoiceCatalogue};
use crate::tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip};

/// Тело запроса `audio/speech`
#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<String>,
}

/// Синтезатор речи поверх HTTP API
pub struct HttpSpeechSynthesizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    voices: VoiceCatalogue,
    rate_bounds: Bounds,
    pitch_bounds: Bounds,
}

impl HttpSpeechSynthesizer {
    /// Создает клиент; API ключ берется из конфигурации или окружения
    pub fn new(
        backend: &BackendConfig,
        voices: VoiceCatalogue,
        rate_bounds: Bounds,
        pitch_bounds: Bounds,
    ) -> Result<Self> {
        let api_key = backend.resolved_api_key().ok_or_else(|| {
            DubSyncError::Configuration("TTS API key is required for speech synthesis".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(backend.timeout_secs))
            .build()?;

        let endpoint = format!("{}/audio/speech", backend.base_url.trim_end_matches('/'));
        info!("TTS backend: {} (model {})", endpoint, backend.model);

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: backend.model.clone(),
            voices,
            rate_bounds,
            pitch_bounds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Проверки, выполняемые до обращения к сети
    fn check_request(&self, request: &SynthesisRequest<'_>) -> Result<()> {
        if request.text.trim().is_empty() {
            return Err(DubSyncError::synthesis(
                SynthesisErrorKind::EmptyText,
                "segment has no text to speak",
            ));
        }
        request
            .profile
            .validate(&self.voices, self.rate_bounds, self.pitch_bounds)
    }

    fn speech_body<'a>(&'a self, request: &'a SynthesisRequest<'_>) -> SpeechBody<'a> {
        let profile = request.profile;
        SpeechBody {
            model: &self.model,
            input: request.text.trim(),
            voice: &profile.voice_id,
            speed: profile.speed(),
            response_format: "wav",
            pitch: (profile.pitch_hz != 0).then(|| profile.pitch_param()),
        }
    }

    async fn request_audio(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>> {
        let body = self.speech_body(request);

        debug!(
            "Sending TTS request for segment {} ({} chars, voice {})",
            request.segment_index,
            body.input.chars().count(),
            body.voice
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send TTS request for segment {}: {}", request.segment_index, e);
                DubSyncError::synthesis(SynthesisErrorKind::BackendUnavailable, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(text) => extract_error_message(&text),
                Err(e) => format!("Failed to read error response: {}", e),
            };
            error!(
                "TTS API error for segment {} (status {}): {}",
                request.segment_index, status, error_text
            );
            return Err(DubSyncError::synthesis(
                classify_status(status),
                format!("status {}: {}", status, error_text),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            DubSyncError::synthesis(SynthesisErrorKind::BackendUnavailable, e.to_string())
        })?;
        if bytes.is_empty() {
            return Err(DubSyncError::synthesis(
                SynthesisErrorKind::InvalidAudio,
                "empty audio response",
            ));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesizedClip> {
        let index = request.segment_index;
        self.check_request(request).map_err(|e| e.for_segment(index))?;

        let bytes = self.request_audio(request).await.map_err(|e| e.for_segment(index))?;
        let track = decode_clip(&bytes).map_err(|e| e.for_segment(index))?;

        debug!(
            "Segment {}: received {} samples at {} Hz",
            index,
            track.len(),
            track.sample_rate
        );
        Ok(SynthesizedClip::new(index, track.samples, track.sample_rate))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

fn decode_clip(bytes: &[u8]) -> Result<AudioTrack> {
    let track = AudioTrack::from_wav_bytes(bytes).map_err(|e| {
        DubSyncError::synthesis(SynthesisErrorKind::InvalidAudio, format!("undecodable audio: {}", e))
    })?;
    if track.is_empty() {
        return Err(DubSyncError::synthesis(
            SynthesisErrorKind::InvalidAudio,
            "audio response contains no samples",
        ));
    }
    track.check_well_formed().map_err(|e| {
        DubSyncError::synthesis(SynthesisErrorKind::InvalidAudio, e.to_string())
    })?;
    Ok(track)
}

/// 5xx и 429 - сервис временно недоступен, остальное - отказ
fn classify_status(status: StatusCode) -> SynthesisErrorKind {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SynthesisErrorKind::BackendUnavailable
    } else {
        SynthesisErrorKind::BackendRejected
    }
}

/// Достает `error.message` из JSON ответа, иначе возвращает текст как есть
fn extract_error_message(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string())
}
