use crate::shayari::error::PipelineError;

pub const MIX_SAMPLE_RATE: u32 = 48_000;
pub const MIX_CHANNELS: u16 = 2;

/// Weighted two-track mixdown over interleaved f32 PCM.
///
/// The output holds exactly `output_frames` frames. The primary track is
/// zero-padded or trimmed to that length, the secondary is looped or trimmed.
/// When the weighted sum peaks above full scale the whole buffer is scaled
/// down so the peak sits at 1.0.
pub fn mixdown(
    primary: &[f32],
    secondary: &[f32],
    channels: u16,
    output_frames: usize,
    primary_weight: f32,
    secondary_weight: f32,
) -> Result<Vec<f32>, PipelineError> {
    let channels = usize::from(channels);
    if channels == 0 {
        return Err(PipelineError::Mix("channel count must be positive".into()));
    }
    if output_frames == 0 {
        return Err(PipelineError::Mix("output duration rounds to zero frames".into()));
    }
    if primary.len() % channels != 0 || secondary.len() % channels != 0 {
        return Err(PipelineError::Mix(
            "PCM buffers are not aligned to the channel count".into(),
        ));
    }
    let secondary_frames = secondary.len() / channels;
    if secondary_frames == 0 {
        return Err(PipelineError::Mix("background track decoded to silence".into()));
    }
    if primary.is_empty() {
        return Err(PipelineError::Mix("recital track decoded to silence".into()));
    }

    let mut out = vec![0.0f32; output_frames * channels];
    let mut peak = 0.0f32;
    for frame in 0..output_frames {
        let sec_frame = frame % secondary_frames;
        for ch in 0..channels {
            let p = primary.get(frame * channels + ch).copied().unwrap_or(0.0);
            let s = secondary[sec_frame * channels + ch];
            let v = p * primary_weight + s * secondary_weight;
            peak = peak.max(v.abs());
            out[frame * channels + ch] = v;
        }
    }

    if peak > 1.0 {
        let scale = 1.0 / peak;
        for s in &mut out {
            *s *= scale;
        }
    }
    Ok(out)
}

pub fn frames_for_duration(seconds: f64, sample_rate: u32) -> usize {
    (seconds * f64::from(sample_rate)).round().max(0.0) as usize
}
