use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::PipelineError;

/// One verse from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub text: String,
}

/// A generated or selected media file owned by a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaHandle {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub has_audio: bool,
}

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>, duration_seconds: f64, has_audio: bool) -> Self {
        Self {
            path: path.into(),
            duration_seconds,
            has_audio,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

pub const PRIMARY_WEIGHT: f64 = 0.8;
pub const SECONDARY_WEIGHT: f64 = 0.2;

/// Inputs of a two-track mixdown. The output always lasts as long as the primary track.
#[derive(Debug, Clone, PartialEq)]
pub struct MixSpec {
    pub primary_track: MediaHandle,
    pub secondary_track: MediaHandle,
    pub primary_weight: f64,
    pub secondary_weight: f64,
    pub output_duration_seconds: f64,
}

impl MixSpec {
    /// Recital over background music at the fixed 80/20 ratio.
    pub fn recital_over_music(recital: MediaHandle, music: MediaHandle) -> Self {
        let output_duration_seconds = recital.duration_seconds;
        Self {
            primary_track: recital,
            secondary_track: music,
            primary_weight: PRIMARY_WEIGHT,
            secondary_weight: SECONDARY_WEIGHT,
            output_duration_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let weights = [self.primary_weight, self.secondary_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::Mix(format!(
                "mix weights must be non-negative, got {:?}",
                weights
            )));
        }
        if ((self.primary_weight + self.secondary_weight) - 1.0).abs() > 1e-6 {
            return Err(PipelineError::Mix(format!(
                "mix weights must sum to 1.0, got {:.4}",
                self.primary_weight + self.secondary_weight
            )));
        }
        if !self.output_duration_seconds.is_finite() || self.output_duration_seconds <= 0.0 {
            return Err(PipelineError::Mix(format!(
                "output duration must be positive, got {}",
                self.output_duration_seconds
            )));
        }
        if !self.primary_track.has_audio || !self.secondary_track.has_audio {
            return Err(PipelineError::Mix(
                "both mix inputs must carry an audio stream".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Skipped,
    Failed,
}

impl ItemStatus {
    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Success => "SUCCESS",
            ItemStatus::Skipped => "SKIPPED",
            ItemStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug)]
pub struct PipelineResult {
    pub item_id: String,
    pub output_path: PathBuf,
    pub status: ItemStatus,
    pub error: Option<PipelineError>,
}

impl PipelineResult {
    pub fn success(item_id: &str, output_path: PathBuf) -> Self {
        Self {
            item_id: item_id.to_string(),
            output_path,
            status: ItemStatus::Success,
            error: None,
        }
    }

    pub fn skipped(item_id: &str, output_path: PathBuf) -> Self {
        Self {
            item_id: item_id.to_string(),
            output_path,
            status: ItemStatus::Skipped,
            error: None,
        }
    }

    pub fn failed(item_id: &str, output_path: PathBuf, error: PipelineError) -> Self {
        Self {
            item_id: item_id.to_string(),
            output_path,
            status: ItemStatus::Failed,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ItemStatus::Failed
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "item_id": self.item_id,
            "output_path": self.output_path,
            "status": self.status,
            "error_kind": self.error.as_ref().map(|e| e.kind_name()),
            "error": self.error.as_ref().map(|e| e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(path: &str, duration: f64) -> MediaHandle {
        MediaHandle::new(path, duration, true)
    }

    #[test]
    fn recital_over_music_uses_recital_duration() {
        let spec = MixSpec::recital_over_music(audio("voice.mp4", 7.5), audio("bg.mp3", 180.0));
        assert_eq!(spec.output_duration_seconds, 7.5);
        assert_eq!(spec.primary_weight, 0.8);
        assert_eq!(spec.secondary_weight, 0.2);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut spec = MixSpec::recital_over_music(audio("a", 8.0), audio("b", 8.0));
        spec.secondary_weight = 0.5;
        assert!(matches!(spec.validate(), Err(PipelineError::Mix(_))));
    }

    #[test]
    fn rejects_silent_inputs() {
        let spec = MixSpec::recital_over_music(
            MediaHandle::new("ambient.mp4", 8.0, false),
            audio("bg.mp3", 30.0),
        );
        assert!(spec.validate().is_err());
    }

    #[test]
    fn failed_result_serializes_error_kind() {
        let result = PipelineResult::failed(
            "s1",
            PathBuf::from("outputs/x/s1/ambient_video.mp4"),
            PipelineError::Cancelled,
        );
        let json = result.to_json();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "cancelled");
    }
}
