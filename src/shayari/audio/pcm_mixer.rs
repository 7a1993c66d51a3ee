use std::path::Path;

use async_trait::async_trait;

use super::mix::{MIX_CHANNELS, MIX_SAMPLE_RATE, frames_for_duration, mixdown};
use crate::shayari::cancel::CancelToken;
use crate::shayari::capabilities::AudioMixer;
use crate::shayari::error::PipelineError;
use crate::shayari::model::{MediaHandle, MixSpec};
use crate::shayari::support::ffmpeg::decode_audio_f32_stereo;
use crate::ui::prelude::*;

/// Decodes both tracks with ffmpeg, mixes in-process and writes a float WAV.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmMixer;

#[async_trait]
impl AudioMixer for PcmMixer {
    async fn mix(&self, spec: &MixSpec, dest: &Path) -> Result<MediaHandle, PipelineError> {
        spec.validate()?;

        let limit = spec.output_duration_seconds + 0.5;
        let (primary, secondary) = tokio::try_join!(
            decode_audio_f32_stereo(spec.primary_track.path(), MIX_SAMPLE_RATE, limit),
            decode_audio_f32_stereo(spec.secondary_track.path(), MIX_SAMPLE_RATE, limit),
        )
        .map_err(|e| PipelineError::Mix(format!("{:#}", e)))?;

        let frames = frames_for_duration(spec.output_duration_seconds, MIX_SAMPLE_RATE);
        let (primary_weight, secondary_weight) =
            (spec.primary_weight as f32, spec.secondary_weight as f32);

        // A dropped stage cannot abort the blocking task, so it is told to stop.
        let stop = StopOnDrop(CancelToken::new());
        let token = stop.0.clone();
        let dest_owned = dest.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mixed = mixdown(
                &primary,
                &secondary,
                MIX_CHANNELS,
                frames,
                primary_weight,
                secondary_weight,
            )?;
            write_wav(&dest_owned, &mixed, &token)
        })
        .await
        .map_err(|e| PipelineError::Mix(format!("mix task failed: {}", e)))??;

        emit(
            Level::Debug,
            "shayari.mix.done",
            &format!(
                "Mixed {:.2}s ({} + {})",
                spec.output_duration_seconds,
                spec.primary_track.path().display(),
                spec.secondary_track.path().display()
            ),
            None,
        );

        Ok(MediaHandle::new(
            dest,
            frames as f64 / f64::from(MIX_SAMPLE_RATE),
            true,
        ))
    }
}

struct StopOnDrop(CancelToken);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Samples written between checks of `stop`.
const STOP_CHECK_INTERVAL: usize = 64 * 1024;

/// Write interleaved float samples. A stop request removes the partial file.
fn write_wav(path: &Path, samples: &[f32], stop: &CancelToken) -> Result<(), PipelineError> {
    let spec = hound::WavSpec {
        channels: MIX_CHANNELS,
        sample_rate: MIX_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let to_mix_error =
        |e: hound::Error| PipelineError::Mix(format!("cannot write {}: {}", path.display(), e));
    let abandon = |writer: hound::WavWriter<_>| {
        drop(writer);
        let _ = std::fs::remove_file(path);
        Err(PipelineError::Cancelled)
    };

    if stop.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    let mut writer = hound::WavWriter::create(path, spec).map_err(to_mix_error)?;
    for chunk in samples.chunks(STOP_CHECK_INTERVAL) {
        if stop.is_cancelled() {
            return abandon(writer);
        }
        for &sample in chunk {
            writer.write_sample(sample).map_err(to_mix_error)?;
        }
    }
    if stop.is_cancelled() {
        return abandon(writer);
    }
    writer.finalize().map_err(to_mix_error)
}
