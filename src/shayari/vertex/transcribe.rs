use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use super::VertexApi;
use super::prompts::{TRANSCRIPTION_PROMPT, strip_code_fence};
use crate::shayari::capabilities::SubtitleSynthesizer;
use crate::shayari::error::{GenerationFailure, PipelineError};
use crate::shayari::model::{MediaHandle, SubtitleSegment};
use crate::shayari::retry::RetryPolicy;
use crate::shayari::subtitles::segment::{Granularity, WordStamp, build_segments};
use crate::shayari::support::ffmpeg::extract_audio_to_mp3;
use crate::ui::prelude::*;

/// Captions from Gemini word timestamps over the recital's own audio.
pub struct GeminiAligner {
    client: Arc<dyn VertexApi>,
    model: String,
    retry: RetryPolicy,
    granularity: Granularity,
}

impl GeminiAligner {
    pub fn new(
        client: Arc<dyn VertexApi>,
        model: impl Into<String>,
        retry: &RetryPolicy,
        granularity: Granularity,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            retry: retry.clone(),
            granularity,
        }
    }
}

#[async_trait]
impl SubtitleSynthesizer for GeminiAligner {
    async fn synthesize(
        &self,
        recital: &MediaHandle,
        source_text: &str,
        scratch: &Path,
    ) -> Result<Vec<SubtitleSegment>, PipelineError> {
        if !recital.has_audio {
            return Err(PipelineError::Alignment(
                "recital clip has no audio track to align against".to_string(),
            ));
        }

        let voice = scratch.join("recital_voice.mp3");
        extract_audio_to_mp3(recital.path(), &voice)
            .await
            .map_err(|e| PipelineError::Alignment(format!("{:#}", e)))?;
        let audio = tokio::fs::read(&voice)
            .await
            .map_err(|e| PipelineError::Alignment(format!("reading {}: {}", voice.display(), e)))?;
        let encoded = STANDARD.encode(&audio);

        let text = self
            .retry
            .run("gemini transcription", || {
                self.client.generate_content(
                    &self.model,
                    vec![
                        json!({"inlineData": {"mimeType": "audio/mp3", "data": encoded}}),
                        json!({"text": TRANSCRIPTION_PROMPT}),
                    ],
                    0.3,
                )
            })
            .await?;

        let words = parse_word_stamps(&text)?;
        emit(
            Level::Debug,
            "shayari.subtitles.words",
            &format!("{} words transcribed", words.len()),
            None,
        );
        build_segments(&words, source_text, recital.duration_seconds, self.granularity)
    }
}

/// Parse the `[{"word", "start"}]` array the transcription prompt asks for.
pub fn parse_word_stamps(text: &str) -> Result<Vec<WordStamp>, PipelineError> {
    let body = strip_code_fence(text);
    let start = body.find('[');
    let end = body.rfind(']');
    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => body,
    };
    serde_json::from_str(slice).map_err(|e| {
        PipelineError::generation(
            GenerationFailure::InvalidResponse,
            format!("word timestamps are not a JSON array: {}", e),
        )
    })
}
