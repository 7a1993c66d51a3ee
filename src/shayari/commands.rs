use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use super::audio::PcmMixer;
use super::batch::run_batch;
use super::cancel::CancelToken;
use super::capabilities::{Capabilities, GenerationMode};
use super::check::run_checks;
use super::cli::{CheckArgs, InitConfigArgs, RunArgs, ShayariCommands};
use super::compose::FfmpegCompositor;
use super::config::PipelineConfig;
use super::input::InputBatch;
use super::orchestrator::Orchestrator;
use super::report::{BatchSummary, EXIT_FAILURE, EXIT_OK, print_report};
use super::support::ffmpeg::FfprobeProbe;
use super::vertex::{GeminiAligner, VertexClient, VeoGenerator};
use crate::common::paths;
use crate::ui::prelude::*;

/// Dispatch a subcommand and return the process exit code.
pub async fn handle_shayari_command(
    command: ShayariCommands,
    config_path: Option<&Path>,
) -> Result<u8> {
    match command {
        ShayariCommands::Run(args) => handle_run(args, config_path).await,
        ShayariCommands::Check(args) => handle_check(args, config_path),
        ShayariCommands::InitConfig(args) => handle_init_config(args, config_path),
    }
}

async fn handle_run(args: RunArgs, config_path: Option<&Path>) -> Result<u8> {
    let mut config = PipelineConfig::load(config_path)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(library) = args.library {
        config.paths.audio_library = library;
    }
    if let Some(outputs) = args.outputs {
        config.paths.outputs = outputs;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.sequential {
        config.sequential_stages = true;
    }

    let batch = InputBatch::load(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;

    let caps = build_capabilities(&config)?;
    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();

    let mut orchestrator = Orchestrator::new(
        caps,
        config.paths.audio_library.clone(),
        config.paths.outputs.clone(),
    )
    .with_style(config.subtitles.base_style(), config.subtitles.palette.clone())
    .sequential(config.sequential_stages)
    .with_cancel(cancel);
    if let Some(seed) = config.seed {
        orchestrator = orchestrator.with_seed(seed);
    }
    emit(
        Level::Debug,
        "shayari.run.seed",
        &format!("run seed {}", orchestrator.run_seed()),
        Some(serde_json::json!({"seed": orchestrator.run_seed()})),
    );

    let results = run_batch(&orchestrator, &batch, args.index, args.force, config.jobs)
        .await
        .context("running batch")?;
    print_report(&results);
    Ok(BatchSummary::from_results(&results).exit_code())
}

/// Vertex AI generators and aligner plus the local ffmpeg stages.
fn build_capabilities(config: &PipelineConfig) -> Result<Capabilities> {
    let client = Arc::new(VertexClient::new(&config.service).context("configuring Vertex AI")?);
    let generator = |mode| {
        Arc::new(VeoGenerator::new(
            client.clone(),
            mode,
            &config.service,
            &config.clip,
            &config.poll,
            &config.retry,
        ))
    };
    Ok(Capabilities {
        recital: generator(GenerationMode::Recital),
        ambient: generator(GenerationMode::Ambient),
        synthesizer: Arc::new(GeminiAligner::new(
            client.clone(),
            config.service.transcription_model.clone(),
            &config.retry,
            config.subtitles.granularity,
        )),
        mixer: Arc::new(PcmMixer),
        compositor: Arc::new(FfmpegCompositor::default()),
        probe: Arc::new(FfprobeProbe),
    })
}

fn handle_check(args: CheckArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = PipelineConfig::load(config_path)?;
    let results = run_checks(&config, args.input.as_deref());

    separator();
    for result in &results {
        match get_output_format() {
            OutputFormat::Text => println!("{}", result),
            OutputFormat::Json => emit(
                Level::Info,
                "shayari.check",
                result.status.message(),
                Some(serde_json::json!({
                    "check": result.name,
                    "status": result.status.label(),
                })),
            ),
        }
    }

    let failed = results.iter().filter(|r| r.status.is_failure()).count();
    if failed > 0 {
        emit(
            Level::Error,
            "shayari.check.failed",
            &format!("{} check(s) failed", failed),
            None,
        );
        Ok(EXIT_FAILURE)
    } else {
        emit(
            Level::Success,
            "shayari.check.ok",
            "Ready to generate",
            None,
        );
        Ok(EXIT_OK)
    }
}

fn handle_init_config(args: InitConfigArgs, config_path: Option<&Path>) -> Result<u8> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => paths::default_config_path()?,
    };
    if path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    PipelineConfig::default().save_to_path(&path)?;
    emit(
        Level::Success,
        "shayari.config.written",
        &format!("Wrote default config to {}", path.display()),
        Some(serde_json::json!({"path": path})),
    );
    Ok(EXIT_OK)
}
