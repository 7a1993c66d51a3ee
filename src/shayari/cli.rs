use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum ShayariCommands {
    /// Generate videos for the verses in an input JSON file
    Run(RunArgs),
    /// Check tools, credentials, the audio library and optionally an input file
    Check(CheckArgs),
    /// Write a config file with every default filled in
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON array of {"id"?, "shayari"} objects
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Only process the item at this zero-based position
    #[arg(short, long)]
    pub index: Option<usize>,

    /// Regenerate even if the output video already exists
    #[arg(short, long)]
    pub force: bool,

    /// Items processed at the same time (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Background music directory (overrides config)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub library: Option<PathBuf>,

    /// Root of the output tree (overrides config)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub outputs: Option<PathBuf>,

    /// Fix every random choice of this run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run the stages of each item one after another
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Input file to validate as well
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InitConfigArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
