//! # Audio Format Handling
//!
//! Аудиодорожка в памяти (моно PCM f32), чтение и запись WAV через `hound`
//! и преобразования между миллисекундами и семплами.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;

use crate::error::{DubSyncError, Result};

/// Длительность в миллисекундах для заданного числа семплов
pub fn duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (sample_count as u64 * 1000 + sample_rate as u64 / 2) / sample_rate as u64
}

/// Позиция в семплах для смещения в миллисекундах
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128 + 500) / 1000) as usize
}

/// Моно аудиодорожка
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Тишина заданной длительности
    pub fn silent(duration: u64, sample_rate: u32) -> Self {
        Self::new(vec![0.0; ms_to_samples(duration, sample_rate)], sample_rate)
    }

    /// Длительность в миллисекундах
    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.samples.len(), self.sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Проверяет, что дорожку вообще можно микшировать
    pub fn check_well_formed(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(DubSyncError::AudioProcessing(
                "track has a sample rate of 0".to_string(),
            ));
        }
        if let Some(pos) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(DubSyncError::AudioProcessing(format!(
                "track contains a non-finite sample at position {}",
                pos
            )));
        }
        Ok(())
    }

    /// Читает WAV-файл и сводит его к моно
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        let track = decode_wav(reader)?;
        info!(
            "Loaded WAV {}: {} samples at {} Hz",
            path.as_ref().display(),
            track.samples.len(),
            track.sample_rate
        );
        Ok(track)
    }

    /// Декодирует WAV из памяти (например, ответ TTS сервиса)
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        decode_wav(reader)
    }

    /// Записывает дорожку в WAV (32-бит float, моно)
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_wav(&self.samples, self.sample_rate, path)
    }
}

fn decode_wav<R: Read>(mut reader: WavReader<R>) -> Result<AudioTrack> {
    let spec = reader.spec();

    let pcm: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        (format, bits) => {
            return Err(DubSyncError::AudioProcessing(format!(
                "unsupported WAV format: {:?}, {} bits",
                format, bits
            )));
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels > 1 {
        pcm.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        pcm
    };

    Ok(AudioTrack::new(samples, spec.sample_rate))
}

/// Кодирует PCM семплы в WAV-файл (32-бит float, моно)
pub fn write_wav<P: AsRef<Path>>(samples: &[f32], sample_rate: u32, path: P) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!(
        "Saved WAV {} ({} samples, {} Hz)",
        path.as_ref().display(),
        samples.len(),
        sample_rate
    );
    Ok(())
}

/// Среднеквадратичное значение семплов
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
