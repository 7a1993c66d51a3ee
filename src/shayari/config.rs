use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::retry::RetryPolicy;
use super::subtitles::ass::{AssStyle, PaletteColor, default_palette};
use super::subtitles::segment::Granularity;
use crate::common::paths;

/// Vertex AI endpoint and model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub project_id: Option<String>,
    pub location: String,
    /// Writes the per-item video prompts
    pub text_model: String,
    /// Produces word timestamps from the recital audio
    pub transcription_model: String,
    pub video_model: String,
    /// Static bearer token; `gcloud auth print-access-token` is used when unset
    pub access_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us-central1".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            transcription_model: "gemini-2.0-flash".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub person_generation: String,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "9:16".to_string(),
            duration_seconds: 8,
            person_generation: "allow_adult".to_string(),
        }
    }
}

/// Long-running video operations are polled at `interval_secs` until `max_wait_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_wait_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub granularity: Granularity,
    pub font_name: String,
    pub font_size: u32,
    pub min_font_size: u32,
    pub outline: u32,
    pub palette: Vec<PaletteColor>,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        let style = AssStyle::default();
        Self {
            granularity: Granularity::default(),
            font_name: style.font_name,
            font_size: style.font_size,
            min_font_size: style.min_font_size,
            outline: style.outline,
            palette: default_palette(),
        }
    }
}

impl SubtitleConfig {
    /// Caption style with everything but the per-item colour filled in.
    pub fn base_style(&self) -> AssStyle {
        AssStyle {
            font_name: self.font_name.clone(),
            font_size: self.font_size,
            min_font_size: self.min_font_size,
            outline: self.outline,
            ..AssStyle::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub audio_library: PathBuf,
    pub outputs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audio_library: PathBuf::from("inputs/audio_library"),
            outputs: PathBuf::from("outputs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items processed at the same time
    pub jobs: usize,
    /// Run the stages of one item one after another instead of concurrently
    pub sequential_stages: bool,
    /// Fixes every random choice of a run when set
    pub seed: Option<u64>,
    pub service: ServiceConfig,
    pub clip: ClipConfig,
    pub retry: RetryPolicy,
    pub poll: PollConfig,
    pub subtitles: SubtitleConfig,
    pub paths: PathsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: 2,
            sequential_stages: false,
            seed: None,
            service: ServiceConfig::default(),
            clip: ClipConfig::default(),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
            subtitles: SubtitleConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load `path`, or the default config location when `None`. A missing
    /// file yields defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => paths::default_config_path()?,
        };
        let mut config = Self::load_from_path(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.sanitize();
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(project) = non_empty("PROJECT_ID") {
            self.service.project_id = Some(project);
        }
        if let Some(location) = non_empty("LOCATION") {
            self.service.location = location;
        }
        if let Some(token) = non_empty("SHAYARI_ACCESS_TOKEN") {
            self.service.access_token = Some(token);
        }
    }

    fn sanitize(&mut self) {
        if self.jobs == 0 {
            self.jobs = 1;
        }
        if self.subtitles.palette.iter().all(|c| c.to_ass().is_none()) {
            self.subtitles.palette = default_palette();
        }
        if self.poll.interval_secs == 0 {
            self.poll.interval_secs = PollConfig::default().interval_secs;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let toml = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, toml).with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }
}
