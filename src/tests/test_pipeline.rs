//! Тесты пакетной озвучки на детерминированном синтезаторе

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use crate::config::DubSyncConfig;
use crate::error::{DubSyncError, Result};
use crate::media::{AudioTrack, MixMode, PlacementStrategy};
use crate::pipeline::{BatchOrchestrator, FailureKind};
use crate::progress::ProgressUpdate;
use crate::subtitle::{Segment, SegmentStore};
use crate::tts::cache::CachingSynthesizer;
use crate::tts::fake::{FixedToneSynthesizer, ToneDuration};
use crate::tts::{SpeechSynthesizer, SynthesisRequest, SynthesizedClip, VoiceProfile};

// 1 семпл = 1 мс
const RATE: u32 = 1000;

fn store() -> SegmentStore {
    SegmentStore::from_segments(vec![
        Segment::new(1, 0, 1000, "One").with_translation("Один"),
        Segment::new(2, 1500, 2500, "Two").with_translation("Два"),
        Segment::new(3, 3000, 4000, "Three").with_translation("Три"),
    ])
    .unwrap()
}

fn tone(ms: u64) -> FixedToneSynthesizer {
    FixedToneSynthesizer::new(ToneDuration::Fixed(ms), 0.5, RATE)
}

fn original(ms: u64) -> AudioTrack {
    AudioTrack::new(vec![1.0; ms as usize], RATE)
}

/// Синтезатор, который никогда не отвечает
struct HangingSynthesizer;

#[async_trait]
impl SpeechSynthesizer for HangingSynthesizer {
    async fn synthesize(&self, _request: &SynthesisRequest<'_>) -> Result<SynthesizedClip> {
        futures::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

#[tokio::test]
async fn test_failed_segment_keeps_original_audio() {
    let orchestrator =
        BatchOrchestrator::new(DubSyncConfig::default(), tone(800).failing_on([2])).unwrap();
    let store = store();

    let result = orchestrator.run(&store).await.unwrap();
    assert_eq!(result.report.failed_indices(), vec![2]);
    assert_eq!(result.report.failures[0].kind, FailureKind::BackendRejected);
    assert_eq!(result.placements.len(), 2);
    assert!(result.placement_for(2).is_none());

    let mixed = orchestrator.mix(&original(5000), &result).await.unwrap();
    let samples = mixed.samples();
    assert_eq!(samples.len(), 5000);
    assert!(samples[..800].iter().all(|&s| s == 0.5));
    assert!(samples[800..1500].iter().all(|&s| s == 1.0));
    // Окно неудачного сегмента не тронуто
    assert!(samples[1500..2500].iter().all(|&s| s == 1.0));
    assert!(samples[3000..3800].iter().all(|&s| s == 0.5));
    assert!(samples[3800..].iter().all(|&s| s == 1.0));
}

#[tokio::test]
async fn test_invalid_segments_never_reach_backend() {
    let mut store = store();
    store
        .set_voice(1, Some(VoiceProfile::new("xx-XX-Nobody")))
        .unwrap();
    store
        .set_voice(2, Some(VoiceProfile::default().with_pitch(200)))
        .unwrap();
    store.edit_text(3, "", " ").unwrap();
    store.insert(Segment::new(4, 5000, 6000, "Four")).unwrap();

    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(500)).unwrap();
    let result = orchestrator.run(&store).await.unwrap();

    let kinds: Vec<(u32, FailureKind)> = result
        .report
        .failures
        .iter()
        .map(|f| (f.segment_index, f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (1, FailureKind::UnsupportedVoice),
            (2, FailureKind::InvalidProfile),
            (3, FailureKind::EmptyText),
        ]
    );
    assert_eq!(orchestrator.synthesizer().calls(), 1);
    assert_eq!(result.placements.len(), 1);
    assert_eq!(result.report.total_segments, 4);
}

#[tokio::test]
async fn test_placement_strategies() {
    let store = SegmentStore::from_segments(vec![
        Segment::new(1, 0, 1000, "0123456789"),
        Segment::new(2, 2000, 3000, "01234567890123"),
        Segment::new(3, 4000, 5000, "01234567890123456789"),
        Segment::new(4, 5200, 6000, "0123456789"),
    ])
    .unwrap();
    // 100 мс на символ: 1000, 1400, 2000 и 1000 мс
    let synth = FixedToneSynthesizer::new(ToneDuration::PerChar(100), 0.5, RATE);
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), synth).unwrap();

    let result = orchestrator.run(&store).await.unwrap();
    let decisions: Vec<_> = result.placements.iter().map(|p| &p.decision).collect();

    assert_eq!(decisions[0].strategy, PlacementStrategy::FitAsIs);
    assert_eq!(decisions[1].strategy, PlacementStrategy::TimeStretch);
    assert_eq!((decisions[1].placed_start, decisions[1].placed_end), (2000, 3000));
    assert_eq!(decisions[2].strategy, PlacementStrategy::Overflow);
    assert_eq!(decisions[2].placed_end, 5200);
    assert!(decisions[2].is_truncated());
    assert_eq!(decisions[3].strategy, PlacementStrategy::TimeStretch);

    for pair in decisions.windows(2) {
        assert!(pair[0].placed_end <= pair[1].placed_start);
    }
    for decision in &decisions {
        assert!(decision.placed_start >= decision.target.start);
    }
    assert_eq!(result.report.warnings.len(), 1);
    assert_eq!(result.report.warnings[0].dropped_ms, 800);
}

#[tokio::test]
async fn test_dub_limits_last_segment_to_track_end() {
    let store = SegmentStore::from_segments(vec![Segment::new(1, 0, 1000, "Long")]).unwrap();
    let mut config = DubSyncConfig::default();
    config.mix_mode = MixMode::Duck;
    let orchestrator = BatchOrchestrator::new(config, tone(2500)).unwrap();

    let (mixed, report) = orchestrator.dub(&store, &original(1800)).await.unwrap();
    assert_eq!(mixed.len(), 1800);
    assert_eq!(report.mix_mode, MixMode::Duck);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].cut_at, 1800);
    assert!((mixed.samples()[900] - (1.0 * 0.3 + 0.5)).abs() < 1e-6);
}

#[tokio::test]
async fn test_dub_rejects_malformed_original_before_synthesis() {
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(500)).unwrap();
    let broken = AudioTrack::new(vec![0.0, f32::NAN], RATE);

    let err = orchestrator.dub(&store(), &broken).await.unwrap_err();
    assert!(matches!(err, DubSyncError::AudioProcessing(_)));
    assert_eq!(orchestrator.synthesizer().calls(), 0);
}

#[tokio::test]
async fn test_cancellation_before_run() {
    let token = CancellationToken::new();
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(500))
        .unwrap()
        .with_cancellation(token.clone());
    token.cancel();

    assert!(matches!(
        orchestrator.run(&store()).await,
        Err(DubSyncError::Cancelled)
    ));
    assert_eq!(orchestrator.synthesizer().calls(), 0);
}

#[tokio::test]
async fn test_cancellation_abandons_in_flight_synthesis() {
    let token = CancellationToken::new();
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), HangingSynthesizer)
        .unwrap()
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&store()))
        .await
        .expect("cancelled batch must return promptly");
    assert!(matches!(result, Err(DubSyncError::Cancelled)));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_cancellation_with_stalled_progress_receiver() {
    let token = CancellationToken::new();
    // Получатель жив, но канал никто не читает
    let (tx, _rx) = mpsc::channel(1);
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(500))
        .unwrap()
        .with_cancellation(token.clone())
        .with_progress(tx);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&store()))
        .await
        .expect("cancelled batch must not wait for a full progress channel");
    assert!(matches!(result, Err(DubSyncError::Cancelled)));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_rerun_failed_keeps_successful_clips() {
    let store = store();
    let first = BatchOrchestrator::new(DubSyncConfig::default(), tone(800).failing_on([2]))
        .unwrap()
        .run(&store)
        .await
        .unwrap();
    assert!(!first.report.is_complete());

    let retry = BatchOrchestrator::new(DubSyncConfig::default(), tone(800)).unwrap();
    let second = assert_ok!(retry.rerun_failed(&store, &first).await);

    assert_eq!(retry.synthesizer().calls(), 1);
    assert!(second.report.is_complete());
    assert_eq!(second.placements.len(), 3);
    assert_eq!(second.report.total_segments, 3);
    assert_ne!(second.report.batch_id, first.report.batch_id);
}

#[tokio::test]
async fn test_run_subset() {
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(800)).unwrap();
    let store = store();

    let result = orchestrator.run_subset(&store, &[3]).await.unwrap();
    assert_eq!(orchestrator.synthesizer().calls(), 1);
    assert_eq!(result.placements.len(), 1);
    assert_eq!(result.placements[0].decision.segment_index, 3);

    assert!(matches!(
        orchestrator.run_subset(&store, &[3, 99]).await,
        Err(DubSyncError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn test_progress_updates() {
    let (tx, mut rx) = mpsc::channel(100);
    let orchestrator = BatchOrchestrator::new(DubSyncConfig::default(), tone(500).failing_on([2]))
        .unwrap()
        .with_progress(tx);

    let result = orchestrator.run(&store()).await.unwrap();
    orchestrator.mix(&original(5000), &result).await.unwrap();
    drop(orchestrator);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }

    assert_eq!(updates.first(), Some(&ProgressUpdate::Started { total: 3 }));
    assert_eq!(updates.last(), Some(&ProgressUpdate::Finished));
    assert!(updates.contains(&ProgressUpdate::SegmentFailed { index: 2 }));
    assert!(updates.contains(&ProgressUpdate::Synthesizing { completed: 3, total: 3 }));
    assert!(updates.contains(&ProgressUpdate::Reconciling));
    assert!(updates.contains(&ProgressUpdate::Mixing));
}

#[tokio::test]
async fn test_cache_reuses_clips_for_repeated_text() {
    let store = SegmentStore::from_segments(vec![
        Segment::new(1, 0, 1000, "Да"),
        Segment::new(2, 2000, 3000, "Да"),
        Segment::new(3, 4000, 5000, "Нет"),
    ])
    .unwrap();
    let mut config = DubSyncConfig::default();
    config.max_concurrent_requests = 1;

    let orchestrator =
        BatchOrchestrator::new(config, CachingSynthesizer::new(tone(500))).unwrap();
    let result = orchestrator.run(&store).await.unwrap();
    assert_eq!(result.placements.len(), 3);
    assert_eq!(orchestrator.synthesizer().inner().calls(), 2);

    orchestrator.run(&store).await.unwrap();
    assert_eq!(orchestrator.synthesizer().inner().calls(), 2);
}
