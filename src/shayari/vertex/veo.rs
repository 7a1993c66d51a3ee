use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::time::sleep;

use super::VertexApi;
use super::prompts::{
    AmbientScene, RecitalCharacter, ambient_prompt_request, recital_timeline_request,
    recital_video_prompt, strip_code_fence,
};
use crate::shayari::capabilities::{GenerationMode, GenerationRequest, MediaGenerator};
use crate::shayari::config::{ClipConfig, PollConfig, ServiceConfig};
use crate::shayari::error::{GenerationFailure, PipelineError};
use crate::shayari::model::MediaHandle;
use crate::shayari::retry::RetryPolicy;
use crate::shayari::support::ffmpeg::probe_media;
use crate::shayari::support::seed::rng_for;
use crate::ui::prelude::*;

/// Text-to-video generation with Veo, one instance per generation mode.
///
/// A Gemini call writes the video prompt first, using scene parameters drawn
/// from the request seed.
pub struct VeoGenerator {
    client: Arc<dyn VertexApi>,
    mode: GenerationMode,
    text_model: String,
    video_model: String,
    clip: ClipConfig,
    poll: PollConfig,
    retry: RetryPolicy,
}

impl VeoGenerator {
    pub fn new(
        client: Arc<dyn VertexApi>,
        mode: GenerationMode,
        service: &ServiceConfig,
        clip: &ClipConfig,
        poll: &PollConfig,
        retry: &RetryPolicy,
    ) -> Self {
        Self {
            client,
            mode,
            text_model: service.text_model.clone(),
            video_model: service.video_model.clone(),
            clip: clip.clone(),
            poll: poll.clone(),
            retry: retry.clone(),
        }
    }

    async fn write_prompt(&self, request: &GenerationRequest) -> Result<String, PipelineError> {
        match request.mode {
            GenerationMode::Recital => {
                let character = RecitalCharacter::random(&mut rng_for(request.seed, "recital"));
                let ask = recital_timeline_request(&request.text);
                let timeline = self
                    .retry
                    .run("gemini timeline", || {
                        self.client.generate_content(
                            &self.text_model,
                            vec![json!({"text": ask})],
                            0.7,
                        )
                    })
                    .await?;
                Ok(recital_video_prompt(
                    &character,
                    &timeline,
                    self.clip.duration_seconds,
                ))
            }
            GenerationMode::Ambient => {
                let scene = AmbientScene::random(&mut rng_for(request.seed, "ambient"));
                let ask = ambient_prompt_request(
                    &request.text,
                    &scene,
                    self.clip.duration_seconds,
                    &self.clip.aspect_ratio,
                );
                let prompt = self
                    .retry
                    .run("gemini ambient prompt", || {
                        self.client.generate_content(
                            &self.text_model,
                            vec![json!({"text": ask})],
                            0.7,
                        )
                    })
                    .await?;
                Ok(strip_code_fence(&prompt).to_string())
            }
        }
    }

    fn predict_body(&self, prompt: &str) -> Value {
        json!({
            "instances": [{"prompt": prompt}],
            "parameters": {
                "aspectRatio": self.clip.aspect_ratio,
                "durationSeconds": self.clip.duration_seconds,
                "personGeneration": self.clip.person_generation,
                "generateAudio": self.mode == GenerationMode::Recital,
                "sampleCount": 1,
            }
        })
    }

    /// Submit one long-running prediction and poll it to completion.
    ///
    /// Only the submission is retried. An operation that outlives the poll
    /// budget is reported as timed out and never resubmitted.
    async fn render(&self, item_id: &str, prompt: &str) -> Result<Vec<u8>, PipelineError> {
        let label = format!("veo {}", self.mode.as_str());
        let operation = self.retry.run(&label, || self.submit(prompt)).await?;
        emit(
            Level::Debug,
            "shayari.veo.submitted",
            &format!("{}: {} operation {}", item_id, self.mode.as_str(), operation),
            None,
        );
        self.await_operation(item_id, &operation).await
    }

    async fn submit(&self, prompt: &str) -> Result<String, PipelineError> {
        let submitted = self
            .client
            .post_json(&self.video_model, "predictLongRunning", &self.predict_body(prompt))
            .await?;
        submitted["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::generation(
                    GenerationFailure::InvalidResponse,
                    "predictLongRunning returned no operation name",
                )
            })
    }

    async fn await_operation(
        &self,
        item_id: &str,
        operation: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let started = Instant::now();
        let max_wait = Duration::from_secs(self.poll.max_wait_secs);
        let interval = Duration::from_secs(self.poll.interval_secs.max(1));
        let fetch_body = json!({"operationName": operation});

        while started.elapsed() < max_wait {
            sleep(interval).await;
            let polled = match self
                .client
                .post_json(&self.video_model, "fetchPredictOperation", &fetch_body)
                .await
            {
                Ok(value) => value,
                Err(err) if err.is_transient() => {
                    emit(
                        Level::Debug,
                        "shayari.veo.poll",
                        &format!("{}: poll failed, retrying: {}", item_id, err),
                        None,
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            if polled["done"].as_bool() == Some(true) {
                return decode_finished_operation(&polled);
            }
            emit(
                Level::Debug,
                "shayari.veo.poll",
                &format!(
                    "{}: {} clip still rendering ({}s)",
                    item_id,
                    self.mode.as_str(),
                    started.elapsed().as_secs()
                ),
                None,
            );
        }

        Err(PipelineError::generation(
            GenerationFailure::Timeout,
            format!(
                "video operation did not finish within {}s",
                self.poll.max_wait_secs
            ),
        ))
    }
}

#[async_trait]
impl MediaGenerator for VeoGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        dest: &Path,
    ) -> Result<MediaHandle, PipelineError> {
        if request.text.trim().is_empty() {
            return Err(PipelineError::Input("verse text is empty".to_string()));
        }

        let prompt = self.write_prompt(request).await?;
        emit(
            Level::Debug,
            "shayari.veo.prompt",
            &format!("{} {} prompt: {}", request.item_id, self.mode.as_str(), prompt),
            None,
        );

        let bytes = self.render(&request.item_id, &prompt).await?;

        tokio::fs::write(dest, &bytes).await.map_err(|e| {
            PipelineError::generation(
                GenerationFailure::InvalidResponse,
                format!("cannot store clip at {}: {}", dest.display(), e),
            )
        })?;

        let handle = probe_media(dest).await.map_err(|e| {
            PipelineError::generation(
                GenerationFailure::InvalidResponse,
                format!("generated clip is not playable: {:#}", e),
            )
        })?;
        if self.mode == GenerationMode::Recital && !handle.has_audio {
            return Err(PipelineError::generation(
                GenerationFailure::InvalidResponse,
                "recital clip came back without an audio track",
            ));
        }
        Ok(handle)
    }

    fn name(&self) -> &'static str {
        match self.mode {
            GenerationMode::Recital => "veo-recital",
            GenerationMode::Ambient => "veo-ambient",
        }
    }
}

/// Pull the first video out of a finished operation.
fn decode_finished_operation(op: &Value) -> Result<Vec<u8>, PipelineError> {
    if let Some(error) = op.get("error") {
        let code = error["code"].as_i64().unwrap_or(0);
        let message = error["message"].as_str().unwrap_or("unknown error");
        // google.rpc codes: 8 RESOURCE_EXHAUSTED, 14 UNAVAILABLE, 4 DEADLINE_EXCEEDED
        let kind = match code {
            8 => GenerationFailure::RateLimited,
            14 => GenerationFailure::Unavailable,
            4 => GenerationFailure::Timeout,
            _ => GenerationFailure::Rejected,
        };
        return Err(PipelineError::generation(
            kind,
            format!("video operation failed ({}): {}", code, message),
        ));
    }

    let response = &op["response"];
    let encoded = response["videos"][0]["bytesBase64Encoded"]
        .as_str()
        .or_else(|| {
            response["generatedSamples"]
                .as_array()?
                .iter()
                .find_map(|s| s["video"]["bytesBase64Encoded"].as_str())
        });

    let Some(encoded) = encoded else {
        if response["raiMediaFilteredCount"].as_i64().unwrap_or(0) > 0 {
            return Err(PipelineError::generation(
                GenerationFailure::Rejected,
                "video was removed by the safety filter",
            ));
        }
        return Err(PipelineError::generation(
            GenerationFailure::InvalidResponse,
            "finished operation contains no inline video",
        ));
    };

    STANDARD.decode(encoded.trim()).map_err(|e| {
        PipelineError::generation(
            GenerationFailure::InvalidResponse,
            format!("video payload is not valid base64: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shayari::vertex::VertexClient;
    use std::sync::Mutex;

    /// Scripted Vertex API: each method pops its next canned reply and the
    /// last reply repeats.
    struct ScriptedApi {
        replies: Mutex<Vec<(&'static str, Result<Value, GenerationFailure>)>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(replies: Vec<(&'static str, Result<Value, GenerationFailure>)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn count(&self, method: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
        }
    }

    #[async_trait]
    impl VertexApi for ScriptedApi {
        async fn post_json(
            &self,
            _model: &str,
            method: &str,
            _body: &Value,
        ) -> Result<Value, PipelineError> {
            self.calls.lock().unwrap().push(method.to_string());
            let mut replies = self.replies.lock().unwrap();
            let matching: Vec<usize> = replies
                .iter()
                .enumerate()
                .filter(|(_, (m, _))| *m == method)
                .map(|(i, _)| i)
                .collect();
            let reply = match matching.as_slice() {
                [] => panic!("no scripted reply for {}", method),
                [only] => replies[*only].1.clone(),
                [first, ..] => replies.remove(*first).1,
            };
            reply.map_err(|kind| PipelineError::generation(kind, "scripted"))
        }
    }

    fn generator(api: Arc<ScriptedApi>, poll: PollConfig) -> VeoGenerator {
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        };
        VeoGenerator::new(
            api,
            GenerationMode::Ambient,
            &ServiceConfig::default(),
            &ClipConfig::default(),
            &poll,
            &retry,
        )
    }

    #[tokio::test]
    async fn timed_out_operation_is_submitted_once() {
        let api = ScriptedApi::new(vec![
            ("predictLongRunning", Ok(json!({"name": "operations/1"}))),
            ("fetchPredictOperation", Ok(json!({"done": false}))),
        ]);
        let veo = generator(
            api.clone(),
            PollConfig {
                interval_secs: 1,
                max_wait_secs: 1,
            },
        );

        let err = veo.render("one", "prompt").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Generation {
                kind: GenerationFailure::Timeout,
                ..
            }
        ));
        assert_eq!(api.count("predictLongRunning"), 1);
        assert!(api.count("fetchPredictOperation") >= 1);
    }

    #[tokio::test]
    async fn transient_submit_failures_are_retried() {
        let api = ScriptedApi::new(vec![
            ("predictLongRunning", Err(GenerationFailure::RateLimited)),
            ("predictLongRunning", Ok(json!({"name": "operations/2"}))),
            (
                "fetchPredictOperation",
                Ok(json!({"done": true, "response": {"videos": [{"bytesBase64Encoded": "AAEC"}]}})),
            ),
        ]);
        let veo = generator(
            api.clone(),
            PollConfig {
                interval_secs: 1,
                max_wait_secs: 30,
            },
        );

        assert_eq!(veo.render("two", "prompt").await.unwrap(), vec![0, 1, 2]);
        assert_eq!(api.count("predictLongRunning"), 2);
        assert_eq!(api.count("fetchPredictOperation"), 1);
    }

    #[tokio::test]
    async fn failed_operations_are_not_resubmitted() {
        let api = ScriptedApi::new(vec![
            ("predictLongRunning", Ok(json!({"name": "operations/3"}))),
            (
                "fetchPredictOperation",
                Ok(json!({"done": true, "error": {"code": 8, "message": "quota"}})),
            ),
        ]);
        let veo = generator(
            api.clone(),
            PollConfig {
                interval_secs: 1,
                max_wait_secs: 30,
            },
        );

        let err = veo.render("three", "prompt").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(api.count("predictLongRunning"), 1);
    }

    #[test]
    fn decodes_inline_video_bytes() {
        let op = json!({"done": true, "response": {"videos": [{"bytesBase64Encoded": "AAEC"}]}});
        assert_eq!(decode_finished_operation(&op).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn falls_back_to_generated_samples() {
        let op = json!({
            "done": true,
            "response": {"generatedSamples": [{"video": {"bytesBase64Encoded": "AQ=="}}]}
        });
        assert_eq!(decode_finished_operation(&op).unwrap(), vec![1]);
    }

    #[test]
    fn operation_errors_keep_their_retry_class() {
        let quota = json!({"done": true, "error": {"code": 8, "message": "quota"}});
        assert!(decode_finished_operation(&quota).unwrap_err().is_transient());

        let invalid = json!({"done": true, "error": {"code": 3, "message": "bad prompt"}});
        assert!(!decode_finished_operation(&invalid).unwrap_err().is_transient());
    }

    #[test]
    fn safety_filtered_output_is_rejected() {
        let op = json!({"done": true, "response": {"raiMediaFilteredCount": 1}});
        let err = decode_finished_operation(&op).unwrap_err();
        assert!(err.to_string().contains("safety"));
        assert!(!err.is_transient());
    }

    #[test]
    fn predict_body_requests_audio_only_for_recitals() {
        let service = ServiceConfig {
            project_id: Some("proj".into()),
            ..ServiceConfig::default()
        };
        let client = Arc::new(VertexClient::new(&service).unwrap());
        let make = |mode| {
            VeoGenerator::new(
                client.clone(),
                mode,
                &service,
                &ClipConfig::default(),
                &PollConfig::default(),
                &RetryPolicy::default(),
            )
        };
        let recital = make(GenerationMode::Recital).predict_body("p");
        let ambient = make(GenerationMode::Ambient).predict_body("p");
        assert_eq!(recital["parameters"]["generateAudio"], true);
        assert_eq!(ambient["parameters"]["generateAudio"], false);
        assert_eq!(ambient["parameters"]["aspectRatio"], "9:16");
        assert_eq!(ambient["parameters"]["durationSeconds"], 8);
    }
}
