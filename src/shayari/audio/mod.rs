//! Recital-over-music mixdown.

pub mod mix;
pub mod pcm_mixer;

pub use pcm_mixer::PcmMixer;
