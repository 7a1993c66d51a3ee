mod common;
mod shayari;
mod ui;

use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::shayari::ShayariCommands;
use crate::ui::prelude::*;

/// Turn Hindi shayari into recited videos with background music and captions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for events and reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: ShayariCommands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color && std::io::stdout().is_terminal());
    ui::set_debug_mode(cli.debug);
    if cli.debug {
        emit(Level::Debug, "shayari.debug", "Debug mode is on", None);
    }

    match shayari::handle_shayari_command(cli.command, cli.config.as_deref()).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            emit(Level::Error, "shayari.error", &format!("Error: {:#}", e), None);
            ExitCode::from(shayari::report::EXIT_FAILURE)
        }
    }
}
