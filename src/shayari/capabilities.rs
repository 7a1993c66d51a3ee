//! Narrow interfaces over the external collaborators of an item pipeline.
//!
//! The orchestrator only talks to these traits; the Vertex AI and ffmpeg
//! backends implement them, and tests substitute in-process fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::PipelineError;
use super::model::{MediaHandle, MixSpec, SubtitleSegment};
use super::subtitles::ass::AssStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Person speaking the verse, with synchronized speech audio.
    Recital,
    /// Mood-matched visuals without audio.
    Ambient,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Recital => "recital",
            GenerationMode::Ambient => "ambient",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub item_id: String,
    pub text: String,
    pub mode: GenerationMode,
    /// Drives prompt diversity so a rerun with the same seed asks for the same scene.
    pub seed: u64,
}

#[async_trait]
pub trait MediaGenerator: Send + Sync {
    /// Produce a playable clip at `dest` and report its probed duration.
    async fn generate(
        &self,
        request: &GenerationRequest,
        dest: &Path,
    ) -> Result<MediaHandle, PipelineError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait SubtitleSynthesizer: Send + Sync {
    /// Time-aligned caption segments for the spoken recital audio.
    ///
    /// `scratch` is a directory owned by the calling pipeline run.
    async fn synthesize(
        &self,
        recital: &MediaHandle,
        source_text: &str,
        scratch: &Path,
    ) -> Result<Vec<SubtitleSegment>, PipelineError>;
}

#[async_trait]
pub trait AudioMixer: Send + Sync {
    async fn mix(&self, spec: &MixSpec, dest: &Path) -> Result<MediaHandle, PipelineError>;
}

#[async_trait]
pub trait Compositor: Send + Sync {
    /// Mux visuals, audio and burned-in captions into `output`.
    ///
    /// Implementations must never leave a partial file at `output`.
    async fn compose(
        &self,
        visual: &MediaHandle,
        audio: &MediaHandle,
        subtitles: &[SubtitleSegment],
        style: &AssStyle,
        output: &Path,
    ) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaHandle, PipelineError>;
}

/// The full set of collaborators one orchestrator drives.
#[derive(Clone)]
pub struct Capabilities {
    pub recital: Arc<dyn MediaGenerator>,
    pub ambient: Arc<dyn MediaGenerator>,
    pub synthesizer: Arc<dyn SubtitleSynthesizer>,
    pub mixer: Arc<dyn AudioMixer>,
    pub compositor: Arc<dyn Compositor>,
    pub probe: Arc<dyn MediaProbe>,
}
