//! Drives one item through the stage graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use rand::seq::SliceRandom;
use serde_json::json;

use super::cancel::CancelToken;
use super::capabilities::{Capabilities, GenerationMode, GenerationRequest};
use super::error::PipelineError;
use super::graph::{Stage, StageProgress, topological_order};
use super::library::AudioLibrary;
use super::model::{Item, MediaHandle, MixSpec, PipelineResult, SubtitleSegment};
use super::subtitles::ass::{AssStyle, PaletteColor, default_palette};
use super::subtitles::segment::validate_segments;
use super::support::seed::{derive_seed, rng_for};
use crate::ui::prelude::*;

pub const OUTPUT_FILE_NAME: &str = "ambient_video.mp4";
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Final artifact location for an item; also the cache key.
pub fn output_path_for(outputs_root: &Path, stem: &str, item_id: &str) -> PathBuf {
    outputs_root.join(stem).join(item_id).join(OUTPUT_FILE_NAME)
}

pub struct Orchestrator {
    caps: Capabilities,
    library_dir: PathBuf,
    outputs_root: PathBuf,
    base_style: AssStyle,
    palette: Vec<PaletteColor>,
    sequential: bool,
    cancel: CancelToken,
    run_seed: u64,
}

impl Orchestrator {
    pub fn new(caps: Capabilities, library_dir: PathBuf, outputs_root: PathBuf) -> Self {
        Self {
            caps,
            library_dir,
            outputs_root,
            base_style: AssStyle::default(),
            palette: default_palette(),
            sequential: false,
            cancel: CancelToken::new(),
            run_seed: rand::random(),
        }
    }

    pub fn with_style(mut self, base_style: AssStyle, palette: Vec<PaletteColor>) -> Self {
        self.base_style = base_style;
        self.palette = palette;
        self
    }

    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.run_seed = seed;
        self
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    #[cfg(test)]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn output_path(&self, stem: &str, item_id: &str) -> PathBuf {
        output_path_for(&self.outputs_root, stem, item_id)
    }

    /// Run one item. Never panics on stage failure; every outcome is a result.
    pub async fn run(&self, item: &Item, stem: &str, force: bool) -> PipelineResult {
        let output = self.output_path(stem, &item.id);

        if !force && output.is_file() {
            emit(
                Level::Info,
                "shayari.item.skip",
                &format!("{}: already generated at {}", item.id, output.display()),
                Some(json!({"item_id": item.id, "output": output})),
            );
            return PipelineResult::skipped(&item.id, output);
        }

        if self.cancel.is_cancelled() {
            return PipelineResult::failed(&item.id, output, PipelineError::Cancelled);
        }

        emit(
            Level::Info,
            "shayari.item.start",
            &format!("{}: generating{}", item.id, if force { " (forced)" } else { "" }),
            Some(json!({"item_id": item.id, "force": force})),
        );

        match self.execute(item, &output).await {
            Ok(()) => {
                emit(
                    Level::Success,
                    "shayari.item.done",
                    &format!("{}: wrote {}", item.id, output.display()),
                    Some(json!({"item_id": item.id, "output": output})),
                );
                PipelineResult::success(&item.id, output)
            }
            Err(err) => {
                emit(
                    Level::Error,
                    "shayari.item.fail",
                    &format!("{}: {}", item.id, err),
                    Some(json!({"item_id": item.id, "error_kind": err.kind_name()})),
                );
                PipelineResult::failed(&item.id, output, err)
            }
        }
    }

    async fn execute(&self, item: &Item, output: &Path) -> Result<(), PipelineError> {
        if item.text.trim().is_empty() {
            return Err(PipelineError::Input(format!("item {} has no text", item.id)));
        }

        // Checked up front so an empty library never costs a generation call.
        let library = AudioLibrary::scan(&self.library_dir)?;
        library.ensure_not_empty()?;

        let item_dir = output
            .parent()
            .ok_or_else(|| PipelineError::Internal("output path has no parent".to_string()))?
            .to_path_buf();
        let created_dir = !item_dir.exists();
        std::fs::create_dir_all(&item_dir).map_err(|e| {
            PipelineError::Mux(format!("cannot create {}: {}", item_dir.display(), e))
        })?;

        let result = self.execute_in(item, output, &item_dir, library).await;

        if result.is_err() && created_dir {
            // Only succeeds if nothing else was left behind.
            let _ = std::fs::remove_dir(&item_dir);
        }
        result
    }

    async fn execute_in(
        &self,
        item: &Item,
        output: &Path,
        item_dir: &Path,
        library: AudioLibrary,
    ) -> Result<(), PipelineError> {
        let scratch = tempfile::Builder::new()
            .prefix(".work-")
            .tempdir_in(item_dir)
            .map_err(|e| {
                PipelineError::Mux(format!("cannot create scratch dir in {}: {}", item_dir.display(), e))
            })?;

        let seed = derive_seed(self.run_seed, &item.id);
        let ctx = Arc::new(StageContext {
            caps: self.caps.clone(),
            item: item.clone(),
            library,
            scratch: scratch.path().to_path_buf(),
            output: output.to_path_buf(),
            seed,
            style: self.style_for(seed),
        });

        let outputs = if self.sequential {
            run_sequential(&ctx, &self.cancel).await?
        } else {
            run_concurrent(&ctx, &self.cancel).await?
        };

        if let Err(err) = write_metadata(&ctx, &outputs, item_dir) {
            emit(
                Level::Warn,
                "shayari.item.metadata",
                &format!("{}: metadata not written: {:#}", item.id, err),
                None,
            );
        }

        // Intermediates go with the scratch dir.
        drop(scratch);
        Ok(())
    }

    fn style_for(&self, seed: u64) -> AssStyle {
        let mut rng = rng_for(seed, "subtitle-colour");
        match self.palette.choose(&mut rng) {
            Some(color) => self.base_style.clone().with_color(color),
            None => self.base_style.clone(),
        }
    }
}

/// Everything a stage needs, owned so stage futures are `'static`.
struct StageContext {
    caps: Capabilities,
    item: Item,
    library: AudioLibrary,
    scratch: PathBuf,
    output: PathBuf,
    seed: u64,
    style: AssStyle,
}

enum StageOutput {
    Track(MediaHandle),
    Recital(MediaHandle),
    Ambient(MediaHandle),
    Subtitles(Vec<SubtitleSegment>),
    Mix(MediaHandle),
    Composed,
}

#[derive(Debug, Clone, Default)]
struct StageOutputs {
    track: Option<MediaHandle>,
    recital: Option<MediaHandle>,
    ambient: Option<MediaHandle>,
    subtitles: Option<Vec<SubtitleSegment>>,
    mixed: Option<MediaHandle>,
}

impl StageOutputs {
    fn record(&mut self, output: StageOutput) {
        match output {
            StageOutput::Track(h) => self.track = Some(h),
            StageOutput::Recital(h) => self.recital = Some(h),
            StageOutput::Ambient(h) => self.ambient = Some(h),
            StageOutput::Subtitles(s) => self.subtitles = Some(s),
            StageOutput::Mix(h) => self.mixed = Some(h),
            StageOutput::Composed => {}
        }
    }
}

fn need<'a, T>(value: &'a Option<T>, what: &str, stage: Stage) -> Result<&'a T, PipelineError> {
    value.as_ref().ok_or_else(|| {
        PipelineError::Internal(format!("{} started before its {} was ready", stage, what))
    })
}

impl StageContext {
    fn request(&self, mode: GenerationMode) -> GenerationRequest {
        GenerationRequest {
            item_id: self.item.id.clone(),
            text: self.item.text.clone(),
            mode,
            seed: derive_seed(self.seed, mode.as_str()),
        }
    }

    async fn execute(&self, stage: Stage, inputs: &StageOutputs) -> Result<StageOutput, PipelineError> {
        match stage {
            Stage::SelectTrack => {
                let mut rng = rng_for(self.seed, "background-track");
                let track = self.library.select(&mut rng, self.caps.probe.as_ref()).await?;
                emit(
                    Level::Debug,
                    "shayari.stage.track",
                    &format!("{}: background {}", self.item.id, track.path.display()),
                    None,
                );
                Ok(StageOutput::Track(track))
            }
            Stage::Recital => {
                let dest = self.scratch.join("recital_video.mp4");
                let clip = self
                    .caps
                    .recital
                    .generate(&self.request(GenerationMode::Recital), &dest)
                    .await?;
                Ok(StageOutput::Recital(clip))
            }
            Stage::Ambient => {
                let dest = self.scratch.join("ambient_raw.mp4");
                let clip = self
                    .caps
                    .ambient
                    .generate(&self.request(GenerationMode::Ambient), &dest)
                    .await?;
                Ok(StageOutput::Ambient(clip))
            }
            Stage::Subtitles => {
                let recital = need(&inputs.recital, "recital clip", stage)?;
                let segments = self
                    .caps
                    .synthesizer
                    .synthesize(recital, &self.item.text, &self.scratch)
                    .await?;
                validate_segments(&segments, recital.duration_seconds)?;
                Ok(StageOutput::Subtitles(segments))
            }
            Stage::Mix => {
                let recital = need(&inputs.recital, "recital clip", stage)?;
                let track = need(&inputs.track, "background track", stage)?;
                let spec = MixSpec::recital_over_music(recital.clone(), track.clone());
                let mixed = self
                    .caps
                    .mixer
                    .mix(&spec, &self.scratch.join("mixed_audio.wav"))
                    .await?;
                Ok(StageOutput::Mix(mixed))
            }
            Stage::Compose => {
                let ambient = need(&inputs.ambient, "ambient clip", stage)?;
                let mixed = need(&inputs.mixed, "mixed audio", stage)?;
                let subtitles = need(&inputs.subtitles, "subtitles", stage)?;
                self.caps
                    .compositor
                    .compose(ambient, mixed, subtitles, &self.style, &self.output)
                    .await?;
                Ok(StageOutput::Composed)
            }
        }
    }
}

type StageFuture = BoxFuture<'static, (Stage, Result<StageOutput, PipelineError>)>;

fn launch(
    ctx: &Arc<StageContext>,
    stage: Stage,
    inputs: &StageOutputs,
    cancel: &CancelToken,
) -> StageFuture {
    let ctx = Arc::clone(ctx);
    let inputs = inputs.clone();
    let cancel = cancel.clone();
    emit(
        Level::Debug,
        "shayari.stage.start",
        &format!("{}: {}", ctx.item.id, stage),
        None,
    );
    Box::pin(async move {
        let result = cancel.guard(ctx.execute(stage, &inputs)).await;
        (stage, result)
    })
}

async fn run_sequential(
    ctx: &Arc<StageContext>,
    cancel: &CancelToken,
) -> Result<StageOutputs, PipelineError> {
    let mut outputs = StageOutputs::default();
    for stage in topological_order()? {
        let (_, result) = launch(ctx, stage, &outputs, cancel).await;
        outputs.record(result?);
    }
    Ok(outputs)
}

/// Start every stage as soon as its dependencies finish. The first failure
/// drops the remaining in-flight stages.
async fn run_concurrent(
    ctx: &Arc<StageContext>,
    cancel: &CancelToken,
) -> Result<StageOutputs, PipelineError> {
    let mut progress = StageProgress::new();
    let mut outputs = StageOutputs::default();
    let mut in_flight = FuturesUnordered::new();

    loop {
        for stage in progress.ready() {
            progress.mark_started(stage);
            in_flight.push(launch(ctx, stage, &outputs, cancel));
        }
        let Some((stage, result)) = in_flight.next().await else {
            break;
        };
        outputs.record(result?);
        progress.mark_done(stage);
    }

    if !progress.all_done() {
        return Err(PipelineError::Internal(
            "stage graph stalled before compose".to_string(),
        ));
    }
    Ok(outputs)
}

fn write_metadata(
    ctx: &StageContext,
    outputs: &StageOutputs,
    item_dir: &Path,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::io::Write;

    let metadata = json!({
        "item_id": ctx.item.id,
        "text": ctx.item.text,
        "seed": ctx.seed,
        "background_track": outputs.track.as_ref().map(|t| &t.path),
        "subtitle_color": {
            "name": ctx.style.color_name,
            "ass": ctx.style.primary_color,
        },
        "recital_seconds": outputs.recital.as_ref().map(|h| h.duration_seconds),
        "ambient_seconds": outputs.ambient.as_ref().map(|h| h.duration_seconds),
        "mixed_seconds": outputs.mixed.as_ref().map(|h| h.duration_seconds),
        "generators": {
            "recital": ctx.caps.recital.name(),
            "ambient": ctx.caps.ambient.name(),
        },
        "segments": outputs.subtitles,
    });

    let mut staged = tempfile::Builder::new()
        .prefix(".metadata-")
        .suffix(".json")
        .tempfile_in(item_dir)
        .context("creating metadata file")?;
    staged.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;
    staged
        .persist(item_dir.join(METADATA_FILE_NAME))
        .context("moving metadata into place")?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fakes::Builder;
    use super::*;
    use crate::shayari::model::ItemStatus;
    use std::fs;
    use std::time::Duration;

    struct Workspace {
        _root: tempfile::TempDir,
        library: PathBuf,
        outputs: PathBuf,
    }

    fn workspace(with_track: bool) -> Workspace {
        let root = tempfile::tempdir().unwrap();
        let library = root.path().join("audio_library");
        let outputs = root.path().join("outputs");
        fs::create_dir_all(&library).unwrap();
        if with_track {
            fs::write(library.join("rain.mp3"), b"id3").unwrap();
        }
        Workspace {
            _root: root,
            library,
            outputs,
        }
    }

    fn item(id: &str, text: &str) -> Item {
        Item {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn orchestrator(ws: &Workspace, caps: Capabilities) -> Orchestrator {
        Orchestrator::new(caps, ws.library.clone(), ws.outputs.clone()).with_seed(7)
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn success_writes_artifact_and_removes_intermediates() {
        let ws = workspace(true);
        let fakes = Builder::default();
        let orch = orchestrator(&ws, fakes.build());

        let result = orch.run(&item("shayari_0000", "दिल की बात"), "verses", false).await;

        assert_eq!(result.status, ItemStatus::Success);
        assert_eq!(
            result.output_path,
            ws.outputs.join("verses/shayari_0000/ambient_video.mp4")
        );
        assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "video");
        let mut files = leftovers(result.output_path.parent().unwrap());
        files.sort();
        assert_eq!(files, vec!["ambient_video.mp4", "metadata.json"]);
        assert_eq!(fakes.calls.total(), 5);
    }

    #[tokio::test]
    async fn second_run_is_skipped_and_leaves_output_untouched() {
        let ws = workspace(true);
        let first = Builder::default();
        let verse = item("a", "चाँद");
        let result = orchestrator(&ws, first.build()).run(&verse, "s", false).await;
        assert_eq!(result.status, ItemStatus::Success);

        let second = Builder {
            contents: "second".to_string(),
            ..Builder::default()
        };
        let result = orchestrator(&ws, second.build()).run(&verse, "s", false).await;
        assert_eq!(result.status, ItemStatus::Skipped);
        assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "video");
        assert_eq!(second.calls.total(), 0);
    }

    #[tokio::test]
    async fn force_reruns_every_stage_and_overwrites() {
        let ws = workspace(true);
        let verse = item("a", "चाँद");
        orchestrator(&ws, Builder::default().build())
            .run(&verse, "s", false)
            .await;

        let forced = Builder {
            contents: "fresh".to_string(),
            ..Builder::default()
        };
        let result = orchestrator(&ws, forced.build()).run(&verse, "s", true).await;
        assert_eq!(result.status, ItemStatus::Success);
        assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "fresh");
        assert_eq!(forced.calls.total(), 5);
    }

    #[tokio::test]
    async fn empty_library_fails_before_any_generation() {
        let ws = workspace(false);
        let fakes = Builder::default();
        let result = orchestrator(&ws, fakes.build())
            .run(&item("a", "चाँद"), "s", false)
            .await;
        assert!(matches!(result.error, Some(PipelineError::EmptyLibrary(_))));
        assert_eq!(fakes.calls.total(), 0);
        assert!(!ws.outputs.join("s/a").exists());
    }

    #[tokio::test]
    async fn compose_failure_leaves_no_output_or_intermediates() {
        let ws = workspace(true);
        let fakes = Builder {
            compose_fails: true,
            ..Builder::default()
        };
        let result = orchestrator(&ws, fakes.build())
            .run(&item("a", "चाँद"), "s", false)
            .await;
        assert!(matches!(result.error, Some(PipelineError::Mux(_))));
        assert!(!result.output_path.exists());
        assert!(!ws.outputs.join("s/a").exists());
    }

    #[tokio::test]
    async fn generator_failure_is_reported_with_its_kind() {
        let ws = workspace(true);
        let fakes = Builder {
            fail_marker: Some("टूटा".to_string()),
            ..Builder::default()
        };
        let result = orchestrator(&ws, fakes.build())
            .run(&item("b", "टूटा दिल"), "s", false)
            .await;
        assert_eq!(result.status, ItemStatus::Failed);
        assert_eq!(
            result.error.as_ref().map(|e| e.kind_name()),
            Some("generation_error_permanent")
        );
        assert_eq!(fakes.calls.compose.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_text_is_an_input_error() {
        let ws = workspace(true);
        let fakes = Builder::default();
        let result = orchestrator(&ws, fakes.build())
            .run(&item("blank", "   "), "s", false)
            .await;
        assert!(matches!(result.error, Some(PipelineError::Input(_))));
        assert_eq!(fakes.calls.total(), 0);
    }

    #[tokio::test]
    async fn sequential_and_concurrent_schedulers_agree() {
        for sequential in [false, true] {
            let ws = workspace(true);
            let fakes = Builder::default();
            let orch = orchestrator(&ws, fakes.build()).sequential(sequential);
            let result = orch.run(&item("a", "चाँद"), "s", false).await;
            assert_eq!(result.status, ItemStatus::Success, "sequential={}", sequential);
            assert_eq!(fakes.calls.total(), 5);

            let metadata: serde_json::Value = serde_json::from_str(
                &fs::read_to_string(ws.outputs.join("s/a/metadata.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(metadata["item_id"], "a");
            assert_eq!(metadata["segments"][0]["text"], "चाँद");
        }
    }

    #[tokio::test]
    async fn cancellation_resolves_as_cancelled() {
        let ws = workspace(true);
        let fakes = Builder {
            hang: true,
            ..Builder::default()
        };
        let orch = orchestrator(&ws, fakes.build());
        let token = orch.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = orch.run(&item("a", "चाँद"), "s", false).await;
        assert!(matches!(result.error, Some(PipelineError::Cancelled)));
        assert!(!result.output_path.exists());
    }

    #[test]
    fn colour_choice_is_stable_per_seed() {
        let ws = workspace(true);
        let orch = orchestrator(&ws, Builder::default().build());
        assert_eq!(orch.style_for(11), orch.style_for(11));
        let palette = default_palette();
        let chosen = orch.style_for(11).color_name;
        assert!(palette.iter().any(|c| c.name == chosen));
    }
}
