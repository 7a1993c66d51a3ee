use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::shayari::capabilities::MediaProbe;
use crate::shayari::error::PipelineError;
use crate::shayari::model::MediaHandle;

/// Runs one ffmpeg invocation.
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFfmpegRunner;

#[async_trait]
impl FfmpegRunner for SystemFfmpegRunner {
    async fn run(&self, args: &[String]) -> Result<()> {
        run_ffmpeg(args).await
    }
}

/// Run ffmpeg to completion. Failing runs report the stderr lines that
/// mention an error, or the last line when none do.
///
/// The child is killed if the returned future is dropped.
pub async fn run_ffmpeg(args: &[String]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-nostdin"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to spawn ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "ffmpeg exited with status {:?}: {}",
            output.status.code(),
            collect_error_lines(&stderr)
        );
    }
    Ok(())
}

fn collect_error_lines(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let errors: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.contains("error") || l.contains("Error") || l.contains("ERROR"))
        .collect();
    if errors.is_empty() {
        lines.last().copied().unwrap_or_default().to_string()
    } else {
        errors.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

pub async fn probe_media(path: &Path) -> Result<MediaHandle> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type",
            "-of",
            "json",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

    if !output.status.success() {
        bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_probe_json(path, &String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_json(path: &Path, json: &str) -> Result<MediaHandle> {
    let probe: ProbeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;
    let duration: f64 = probe
        .format
        .and_then(|f| f.duration)
        .with_context(|| format!("ffprobe reported no duration for {}", path.display()))?
        .trim()
        .parse()
        .context("Failed to parse ffprobe duration as f64")?;
    if !duration.is_finite() || duration <= 0.0 {
        bail!("{} has no playable duration", path.display());
    }
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    Ok(MediaHandle::new(path, duration, has_audio))
}

pub async fn extract_audio_to_mp3(input: &Path, output: &Path) -> Result<()> {
    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-map".to_string(),
        "0:a:0".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-q:a".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ];
    run_ffmpeg(&args)
        .await
        .with_context(|| format!("Failed to extract audio from {}", input.display()))
}

/// Decode the first audio stream to interleaved stereo f32 PCM, reading at
/// most `max_seconds` of it.
pub async fn decode_audio_f32_stereo(
    path: &Path,
    sample_rate: u32,
    max_seconds: f64,
) -> Result<Vec<f32>> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(path)
        .args([
            "-t",
            &format!("{:.3}", max_seconds),
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to run ffmpeg for audio decode")?;

    if !output.status.success() {
        bail!(
            "ffmpeg audio decode failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    if output.stdout.len() % 4 != 0 {
        bail!("decoded audio byte length is not aligned to f32 samples");
    }

    Ok(output
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// `MediaProbe` over ffprobe, used for background tracks.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaHandle, PipelineError> {
        probe_media(path)
            .await
            .map_err(|e| PipelineError::Input(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_json_reports_duration_and_audio() {
        let json = r#"{
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}],
            "format": {"duration": "8.000000"}
        }"#;
        let handle = parse_probe_json(Path::new("clip.mp4"), json).unwrap();
        assert_eq!(handle.duration_seconds, 8.0);
        assert!(handle.has_audio);
    }

    #[test]
    fn silent_video_has_no_audio() {
        let json = r#"{"streams": [{"codec_type": "video"}], "format": {"duration": "7.5"}}"#;
        let handle = parse_probe_json(Path::new("ambient.mp4"), json).unwrap();
        assert!(!handle.has_audio);
    }

    #[test]
    fn missing_duration_is_an_error() {
        assert!(parse_probe_json(Path::new("x"), r#"{"streams": []}"#).is_err());
        assert!(parse_probe_json(Path::new("x"), r#"{"format": {"duration": "N/A"}}"#).is_err());
    }

    #[test]
    fn error_lines_are_preferred_over_last_line() {
        let stderr = "Input #0\nError opening filters!\nConversion failed!\n";
        assert_eq!(collect_error_lines(stderr), "Error opening filters!");
        assert_eq!(collect_error_lines("a\nlast line\n"), "last line");
    }
}
