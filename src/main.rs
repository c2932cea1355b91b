use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use dub_sync::subtitle::parse_subtitle_file;
use dub_sync::tts::cache::CachingSynthesizer;
use dub_sync::tts::openai::HttpSpeechSynthesizer;
use dub_sync::tts::SpeechSynthesizer;
use dub_sync::utils::init_logger;
use dub_sync::{AudioTrack, BatchOrchestrator, DubSyncConfig, MixMode, SegmentStore};

/// Озвучка WAV дорожки по файлу субтитров
#[derive(Debug, Parser)]
#[command(name = "dub-sync", version, about)]
struct Args {
    /// JSON файл конфигурации
    #[arg(long)]
    config: Option<PathBuf>,

    /// Субтитры (.srt или .vtt)
    #[arg(long)]
    subtitles: PathBuf,

    /// Оригинальная дорожка (WAV)
    #[arg(long)]
    original: PathBuf,

    /// Куда записать итоговую дорожку (WAV)
    #[arg(long)]
    output: PathBuf,

    /// Куда записать отчет о пакете (JSON)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Режим микширования: replace, duck или overlay
    #[arg(long)]
    mode: Option<MixMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DubSyncConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DubSyncConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mix_mode = mode;
    }

    let segments = parse_subtitle_file(&args.subtitles)
        .with_context(|| format!("failed to read subtitles {}", args.subtitles.display()))?;
    let store = SegmentStore::from_segments(segments).context("subtitles contain overlapping entries")?;
    let original = AudioTrack::read_wav(&args.original)
        .with_context(|| format!("failed to read {}", args.original.display()))?;

    info!(
        "Loaded {} segments and {}ms of original audio",
        store.len(),
        original.duration_ms()
    );

    let http = HttpSpeechSynthesizer::new(
        &config.backend,
        config.voices.clone(),
        config.rate_bounds,
        config.pitch_bounds,
    )?;
    let synthesizer: Arc<dyn SpeechSynthesizer> = if config.cache {
        Arc::new(CachingSynthesizer::new(http))
    } else {
        Arc::new(http)
    };

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling batch");
            ctrl_c_token.cancel();
        }
    });

    let orchestrator = BatchOrchestrator::new(config, synthesizer)?.with_cancellation(token);
    let (mixed, report) = orchestrator.dub(&store, &original).await?;

    mixed
        .write_wav(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Wrote dubbed track to {}", args.output.display());

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    } else {
        println!("{}", report.to_json()?);
    }

    if !report.is_complete() {
        bail!(
            "{} segments could not be dubbed: {:?}",
            report.failures.len(),
            report.failed_indices()
        );
    }
    Ok(())
}
