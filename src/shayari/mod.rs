//! Shayari video generation: verses in, recited videos with captions out.

pub mod audio;
pub mod batch;
pub mod cancel;
pub mod capabilities;
pub mod check;
pub mod cli;
pub mod commands;
pub mod compose;
pub mod config;
pub mod error;
pub mod graph;
pub mod input;
pub mod library;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod subtitles;
pub mod support;
pub mod vertex;

pub use cli::ShayariCommands;
pub use commands::handle_shayari_command;
