use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::capabilities::Compositor;
use super::error::PipelineError;
use super::model::{MediaHandle, SubtitleSegment};
use super::subtitles::ass::{AssStyle, PLAY_RES, generate_ass_file};
use super::support::ffmpeg::{FfmpegRunner, SystemFfmpegRunner};
use crate::ui::prelude::*;

/// Muxes the ambient clip, the mixdown and burned-in captions with ffmpeg.
///
/// ffmpeg writes into a hidden temporary file beside the destination which
/// is renamed over it only after a clean exit.
#[derive(Clone)]
pub struct FfmpegCompositor {
    runner: Arc<dyn FfmpegRunner>,
}

impl Default for FfmpegCompositor {
    fn default() -> Self {
        Self::with_runner(Arc::new(SystemFfmpegRunner))
    }
}

impl FfmpegCompositor {
    pub fn with_runner(runner: Arc<dyn FfmpegRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        visual: &MediaHandle,
        audio: &MediaHandle,
        subtitles: &[SubtitleSegment],
        style: &AssStyle,
        output: &Path,
    ) -> Result<(), PipelineError> {
        for input in [visual.path(), audio.path()] {
            if !input.is_file() {
                return Err(PipelineError::Mux(format!(
                    "input {} does not exist",
                    input.display()
                )));
            }
        }
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| {
            PipelineError::Mux(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let mut captions = tempfile::Builder::new()
            .prefix(".captions-")
            .suffix(".ass")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::Mux(format!("cannot create caption file: {}", e)))?;
        captions
            .write_all(generate_ass_file(subtitles, style, PLAY_RES).as_bytes())
            .map_err(|e| PipelineError::Mux(format!("cannot write caption file: {}", e)))?;

        let staged = tempfile::Builder::new()
            .prefix(".ambient_video-")
            .suffix(".mp4")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::Mux(format!("cannot create staging file: {}", e)))?;

        let args = build_compose_args(
            visual,
            audio.path(),
            captions.path(),
            staged.path(),
        );
        emit(
            Level::Debug,
            "shayari.compose.ffmpeg",
            &format!("ffmpeg {}", args.join(" ")),
            None,
        );
        self.runner
            .run(&args)
            .await
            .map_err(|e| PipelineError::Mux(format!("{:#}", e)))?;

        staged.persist(output).map_err(|e| {
            PipelineError::Mux(format!("cannot move video into {}: {}", output.display(), e))
        })?;
        Ok(())
    }
}

/// The mixdown is padded with silence or cut so the output lasts exactly as
/// long as the visual.
fn build_compose_args(
    visual: &MediaHandle,
    audio: &Path,
    captions: &Path,
    staged_output: &Path,
) -> Vec<String> {
    let duration = format!("{:.3}", visual.duration_seconds);
    let filter = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,ass='{ass}'[v];[1:a]apad,atrim=0:{d},asetpts=PTS-STARTPTS[a]",
        w = PLAY_RES.0,
        h = PLAY_RES.1,
        ass = escape_ffmpeg_path(captions),
        d = duration,
    );
    vec![
        "-y".into(),
        "-i".into(),
        visual.path().to_string_lossy().into_owned(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "[a]".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-crf".into(),
        "20".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-t".into(),
        duration,
        "-movflags".into(),
        "+faststart".into(),
        staged_output.to_string_lossy().into_owned(),
    ]
}

/// Escape a path for use inside a quoted ffmpeg filter argument.
fn escape_ffmpeg_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_burn_captions_and_follow_visual_duration() {
        let visual = MediaHandle::new("/work/ambient.mp4", 8.0, false);
        let args = build_compose_args(
            &visual,
            Path::new("/work/mix.wav"),
            Path::new("/out/.captions-x.ass"),
            Path::new("/out/.ambient_video-x.mp4"),
        );
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("ass='/out/.captions-x.ass'"));
        assert!(filter.contains("apad,atrim=0:8.000"));
        let t = &args[args.iter().position(|a| a == "-t").unwrap() + 1];
        assert_eq!(t, "8.000");
        assert_eq!(args.last().unwrap(), "/out/.ambient_video-x.mp4");
    }

    #[test]
    fn filter_paths_are_escaped() {
        assert_eq!(escape_ffmpeg_path(Path::new("/a:b/it's.ass")), "/a\\:b/it'\\''s.ass");
    }

    #[tokio::test]
    async fn missing_inputs_fail_without_touching_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ambient_video.mp4");
        let err = FfmpegCompositor::default()
            .compose(
                &MediaHandle::new(dir.path().join("missing.mp4"), 8.0, false),
                &MediaHandle::new(dir.path().join("missing.wav"), 8.0, true),
                &[],
                &AssStyle::default(),
                &output,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Mux(_)));
        assert!(!output.exists());
    }

    /// Writes partial output to the staged file, then fails like a crashed
    /// encoder would; `finish` makes it succeed instead.
    struct StagedRunner {
        finish: bool,
    }

    #[async_trait]
    impl FfmpegRunner for StagedRunner {
        async fn run(&self, args: &[String]) -> anyhow::Result<()> {
            let staged = args.last().expect("output path");
            std::fs::write(staged, b"partial")?;
            if self.finish {
                std::fs::write(staged, b"finished")?;
                return Ok(());
            }
            anyhow::bail!("ffmpeg exited with status Some(1): Conversion failed!")
        }
    }

    struct Scene {
        _root: tempfile::TempDir,
        visual: MediaHandle,
        audio: MediaHandle,
        out_dir: std::path::PathBuf,
        output: std::path::PathBuf,
    }

    fn scene() -> Scene {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        let out_dir = root.path().join("out");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(work.join("ambient.mp4"), b"video").unwrap();
        std::fs::write(work.join("mix.wav"), b"audio").unwrap();
        Scene {
            visual: MediaHandle::new(work.join("ambient.mp4"), 8.0, false),
            audio: MediaHandle::new(work.join("mix.wav"), 8.0, true),
            output: out_dir.join("ambient_video.mp4"),
            out_dir,
            _root: root,
        }
    }

    async fn compose_with(runner: StagedRunner, scene: &Scene) -> Result<(), PipelineError> {
        let segments = vec![SubtitleSegment {
            start_seconds: 0.5,
            end_seconds: 2.0,
            text: "दिल".to_string(),
        }];
        FfmpegCompositor::with_runner(Arc::new(runner))
            .compose(
                &scene.visual,
                &scene.audio,
                &segments,
                &AssStyle::default(),
                &scene.output,
            )
            .await
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "ambient_video.mp4")
            .collect()
    }

    #[tokio::test]
    async fn encoder_failure_leaves_no_output_or_staging_files() {
        let scene = scene();
        let err = compose_with(StagedRunner { finish: false }, &scene)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Mux(_)));
        assert!(!scene.output.exists());
        assert!(leftovers(&scene.out_dir).is_empty(), "{:?}", leftovers(&scene.out_dir));
    }

    #[tokio::test]
    async fn encoder_failure_keeps_the_previous_video() {
        let scene = scene();
        std::fs::write(&scene.output, b"previous render").unwrap();

        compose_with(StagedRunner { finish: false }, &scene)
            .await
            .unwrap_err();
        assert_eq!(std::fs::read(&scene.output).unwrap(), b"previous render");
        assert!(leftovers(&scene.out_dir).is_empty());
    }

    #[tokio::test]
    async fn clean_exit_replaces_the_output() {
        let scene = scene();
        std::fs::write(&scene.output, b"previous render").unwrap();

        compose_with(StagedRunner { finish: true }, &scene).await.unwrap();
        assert_eq!(std::fs::read(&scene.output).unwrap(), b"finished");
        assert!(leftovers(&scene.out_dir).is_empty());
    }
}
