//! # Batch Orchestrator
//!
//! Пакетная озвучка хранилища сегментов:
//!
//! 1. Проверка профилей голосов и текста (без обращения к бэкенду)
//! 2. Параллельный синтез с ограничением числа одновременных запросов
//! 3. Расчет размещения строго по порядку сегментов
//! 4. Микширование одним проходом, только когда весь пакет известен
//!
//! Отказ синтеза одного сегмента не прерывает пакет: сегмент попадает в отчет,
//! а его окно в итоговой дорожке остается оригинальным. Отмена пакета
//! возвращает [`DubSyncError::Cancelled`] и не производит дорожку.
//!
//! Хранилище нельзя изменять между `run` и `rerun_failed` для того же
//! результата: сохраненные клипы ссылаются на сегменты по индексам.

pub mod report;

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::config::DubSyncConfig;
use crate::error::{DubSyncError, Result, SynthesisErrorKind};
use crate::media::audio::{compute_rms, AudioTrack};
use crate::media::mixer::{MixedTrack, PlacedClip, TrackMixer};
use crate::media::reconcile::{DurationReconciler, TimeWindow};
use crate::progress::{send_progress, ProgressUpdate};
use crate::subtitle::SegmentStore;
use crate::tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip, VoiceProfile};

pub use report::{BatchReport, FailureKind, PlacementSummary, SegmentFailure};

/// Результат пакета: размещенные клипы и отчет
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Успешно озвученные сегменты в порядке хранилища
    pub placements: Vec<PlacedClip>,
    pub report: BatchReport,
}

impl BatchResult {
    pub fn placement_for(&self, segment_index: u32) -> Option<&PlacedClip> {
        self.placements
            .iter()
            .find(|p| p.decision.segment_index == segment_index)
    }
}

/// Задание на синтез одного сегмента
struct Job<'a> {
    position: usize,
    index: u32,
    text: &'a str,
    profile: &'a VoiceProfile,
}

/// Оркестратор пакетной озвучки
pub struct BatchOrchestrator<S> {
    config: DubSyncConfig,
    synthesizer: S,
    reconciler: DurationReconciler,
    mixer: TrackMixer,
    cancel: CancellationToken,
    progress: Option<Sender<ProgressUpdate>>,
}

impl<S: SpeechSynthesizer> BatchOrchestrator<S> {
    pub fn new(config: DubSyncConfig, synthesizer: S) -> Result<Self> {
        config.validate()?;
        let reconciler = DurationReconciler::new(config.reconciler_config())?;
        let mixer = TrackMixer::new(config.duck_gain)?;

        Ok(Self {
            config,
            synthesizer,
            reconciler,
            mixer,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Токен, отмена которого прерывает текущий и последующие пакеты
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, sender: Sender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &DubSyncConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    /// Озвучивает все сегменты хранилища
    pub async fn run(&self, store: &SegmentStore) -> Result<BatchResult> {
        self.run_batch(store, None, None, None).await
    }

    /// Озвучивает только указанные сегменты; неизвестный индекс - ошибка
    pub async fn run_subset(&self, store: &SegmentStore, indices: &[u32]) -> Result<BatchResult> {
        let selected = self.resolve_indices(store, indices)?;
        self.run_batch(store, Some(&selected), None, None).await
    }

    /// Повторяет синтез для сегментов, которые не были озвучены в `previous`.
    ///
    /// Успешные клипы предыдущего результата сохраняются, размещение
    /// пересчитывается целиком.
    pub async fn rerun_failed(
        &self,
        store: &SegmentStore,
        previous: &BatchResult,
    ) -> Result<BatchResult> {
        let kept: HashMap<u32, &SynthesizedClip> = previous
            .placements
            .iter()
            .map(|p| (p.clip.segment_index, &p.clip))
            .collect();
        info!(
            "Re-running {} failed segments, keeping {} clips",
            previous.report.failures.len(),
            kept.len()
        );
        self.run_batch(store, None, Some(&kept), None).await
    }

    /// Микширует успешные размещения с оригиналом в режиме из конфигурации
    pub async fn mix(&self, original: &AudioTrack, result: &BatchResult) -> Result<MixedTrack> {
        self.report_progress(ProgressUpdate::Mixing).await;
        let mixed = self
            .mixer
            .mix(original, &result.placements, self.config.mix_mode)?;
        self.report_progress(ProgressUpdate::Finished).await;
        Ok(mixed)
    }

    /// Полный цикл: синтез, размещение с учетом конца дорожки, микширование
    pub async fn dub(
        &self,
        store: &SegmentStore,
        original: &AudioTrack,
    ) -> Result<(MixedTrack, BatchReport)> {
        original.check_well_formed()?;
        let result = self
            .run_batch(store, None, None, Some(original.duration_ms()))
            .await?;
        let mixed = self.mix(original, &result).await?;
        Ok((mixed, result.report))
    }

    async fn report_progress(&self, update: ProgressUpdate) {
        send_progress(&self.progress, update, &self.cancel).await;
    }

    fn resolve_indices(&self, store: &SegmentStore, indices: &[u32]) -> Result<HashSet<u32>> {
        indices
            .iter()
            .map(|&index| {
                store.get(index).map(|s| s.index).ok_or_else(|| {
                    DubSyncError::InvalidOperation(format!("segment {} does not exist", index))
                })
            })
            .collect()
    }

    /// `selected` - сегменты для синтеза (все, если `None`);
    /// `kept` - готовые клипы, которые не синтезируются повторно
    async fn run_batch(
        &self,
        store: &SegmentStore,
        selected: Option<&HashSet<u32>>,
        kept: Option<&HashMap<u32, &SynthesizedClip>>,
        track_end: Option<u64>,
    ) -> Result<BatchResult> {
        if self.cancel.is_cancelled() {
            return Err(DubSyncError::Cancelled);
        }

        let segments = store.as_slice();
        let mut clips: Vec<Option<SynthesizedClip>> = vec![None; segments.len()];
        let mut failures: Vec<(usize, SegmentFailure)> = Vec::new();
        let mut jobs: Vec<Job<'_>> = Vec::new();
        let mut total = 0;

        for (position, segment) in segments.iter().enumerate() {
            if let Some(clip) = kept.and_then(|k| k.get(&segment.index)) {
                clips[position] = Some((*clip).clone());
                total += 1;
                continue;
            }
            if selected.is_some_and(|s| !s.contains(&segment.index)) {
                continue;
            }
            total += 1;

            let profile = segment.voice.as_ref().unwrap_or(&self.config.default_voice);
            let text = segment.text(self.config.text_source);

            let check = profile
                .validate(
                    &self.config.voices,
                    self.config.rate_bounds,
                    self.config.pitch_bounds,
                )
                .and_then(|_| {
                    if text.trim().is_empty() {
                        Err(DubSyncError::synthesis(
                            SynthesisErrorKind::EmptyText,
                            "segment has no text to speak",
                        ))
                    } else {
                        Ok(())
                    }
                });

            match check {
                Ok(()) => jobs.push(Job {
                    position,
                    index: segment.index,
                    text,
                    profile,
                }),
                Err(e) => {
                    let e = e.for_segment(segment.index);
                    warn!("Segment {} skipped: {}", segment.index, e);
                    failures.push((position, SegmentFailure::from_error(segment.index, &e)));
                }
            }
        }

        info!(
            "Starting batch with {} segments ({} to synthesize via {})",
            total,
            jobs.len(),
            self.synthesizer.name()
        );
        self.report_progress(ProgressUpdate::Started { total }).await;
        for (_, failure) in &failures {
            self.report_progress(ProgressUpdate::SegmentFailed {
                index: failure.segment_index,
            })
            .await;
        }

        let pending = jobs.len();
        let synthesizer = &self.synthesizer;
        let mut results = stream::iter(jobs.into_iter().map(|job| async move {
            let request = SynthesisRequest {
                segment_index: job.index,
                text: job.text,
                profile: job.profile,
            };
            (job.position, job.index, synthesizer.synthesize(&request).await)
        }))
        .buffer_unordered(self.config.max_concurrent_requests);

        let mut completed = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Batch cancelled with {} of {} syntheses finished", completed, pending);
                    return Err(DubSyncError::Cancelled);
                }
                next = results.next() => {
                    let Some((position, index, result)) = next else {
                        break;
                    };
                    completed += 1;
                    match result {
                        Ok(clip) => {
                            let rms = compute_rms(&clip.samples);
                            if rms == 0.0 {
                                warn!("Segment {}: synthesized clip is silent", index);
                            } else {
                                debug!(
                                    "Segment {}: {}ms clip, rms {:.3}",
                                    index, clip.natural_duration, rms
                                );
                            }
                            clips[position] = Some(clip);
                        }
                        Err(e) => {
                            error!("Failed to synthesize segment {}: {}", index, e);
                            failures.push((position, SegmentFailure::from_error(index, &e)));
                            self.report_progress(ProgressUpdate::SegmentFailed { index }).await;
                        }
                    }
                    self.report_progress(ProgressUpdate::Synthesizing { completed, total: pending })
                        .await;
                }
            }
        }

        self.report_progress(ProgressUpdate::Reconciling).await;

        let mut entries: Vec<(&SynthesizedClip, TimeWindow)> = Vec::new();
        let mut next_starts: Vec<Option<u64>> = Vec::new();
        for (position, clip) in clips.iter().enumerate() {
            if let Some(clip) = clip {
                entries.push((clip, segments[position].window()));
                next_starts.push(segments.get(position + 1).map(|s| s.start));
            }
        }
        let decisions = self
            .reconciler
            .reconcile_all(&entries, &next_starts, track_end);

        let mut report = BatchReport::new(self.synthesizer.name(), self.config.mix_mode, total);
        for decision in &decisions {
            if let Some(warning) = &decision.truncation {
                warn!(
                    "Segment {}: speech cut at {}ms, {}ms dropped",
                    warning.segment_index, warning.cut_at, warning.dropped_ms
                );
                report.warnings.push(warning.clone());
            }
            report.placements.push(decision.into());
        }

        failures.sort_by_key(|(position, _)| *position);
        report.failures = failures.into_iter().map(|(_, f)| f).collect();

        let placements: Vec<PlacedClip> = clips
            .into_iter()
            .flatten()
            .zip(decisions)
            .map(|(clip, decision)| PlacedClip { clip, decision })
            .collect();

        info!(
            "Batch {} finished: {} placed, {} failed, {} truncated",
            report.batch_id,
            placements.len(),
            report.failures.len(),
            report.warnings.len()
        );

        Ok(BatchResult { placements, report })
    }
}
