use std::fmt;

use thiserror::Error;

/// Why a generation backend call did not produce media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Backend unreachable or answered with a 5xx.
    Unavailable,
    /// Quota exhausted or HTTP 429.
    RateLimited,
    /// The backend refused the request (bad prompt, safety filter, 4xx).
    Rejected,
    /// The long-running operation did not finish within the polling budget.
    Timeout,
    /// The backend answered but the payload was unusable.
    InvalidResponse,
}

impl GenerationFailure {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            GenerationFailure::Unavailable
                | GenerationFailure::RateLimited
                | GenerationFailure::Timeout
        )
    }

    pub fn retry_class(self) -> &'static str {
        if self.is_transient() {
            "transient"
        } else {
            "permanent"
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GenerationFailure::Unavailable => "service unavailable",
            GenerationFailure::RateLimited => "rate limited",
            GenerationFailure::Rejected => "request rejected",
            GenerationFailure::Timeout => "timed out",
            GenerationFailure::InvalidResponse => "invalid response",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("No background audio found in {0}")]
    EmptyLibrary(String),

    #[error("Generation failed ({kind}, {}): {message}", .kind.retry_class())]
    Generation {
        kind: GenerationFailure,
        message: String,
    },

    #[error("Subtitle alignment failed: {0}")]
    Alignment(String),

    #[error("Audio mix failed: {0}")]
    Mix(String),

    #[error("Compose failed: {0}")]
    Mux(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Stage graph error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn generation(kind: GenerationFailure, message: impl Into<String>) -> Self {
        PipelineError::Generation {
            kind,
            message: message.into(),
        }
    }

    /// Only transient generation failures may be retried, and only by the client.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Generation { kind, .. } if kind.is_transient())
    }

    /// Stable short name used in reports and JSON events.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PipelineError::Input(_) => "input_error",
            PipelineError::EmptyLibrary(_) => "empty_library",
            PipelineError::Generation { kind, .. } if kind.is_transient() => {
                "generation_error_transient"
            }
            PipelineError::Generation { .. } => "generation_error_permanent",
            PipelineError::Alignment(_) => "alignment_failure",
            PipelineError::Mix(_) => "mix_error",
            PipelineError::Mux(_) => "mux_failure",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Map an HTTP status from a generation backend to a failure kind.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let kind = match status {
            429 => GenerationFailure::RateLimited,
            408 | 500..=599 => GenerationFailure::Unavailable,
            _ => GenerationFailure::Rejected,
        };
        let snippet: String = body.chars().take(300).collect();
        Self::generation(kind, format!("HTTP {}: {}", status, snippet.trim()))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return PipelineError::from_http_status(status.as_u16(), &err.to_string());
        }
        let kind = if err.is_decode() {
            GenerationFailure::InvalidResponse
        } else {
            GenerationFailure::Unavailable
        };
        PipelineError::generation(kind, err.to_string())
    }
}
