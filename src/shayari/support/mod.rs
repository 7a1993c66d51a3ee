pub mod ffmpeg;
pub mod seed;
