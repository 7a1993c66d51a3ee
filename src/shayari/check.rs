//! Preflight checks run by `shayari-video check`.

use std::fmt::Display;
use std::path::Path;

use colored::*;

use super::config::PipelineConfig;
use super::input::InputBatch;
use super::library::AudioLibrary;

#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Pass(String),
    Fail(String),
    Warning(String),
}

impl CheckStatus {
    pub fn message(&self) -> &str {
        match self {
            CheckStatus::Pass(msg) | CheckStatus::Fail(msg) | CheckStatus::Warning(msg) => msg,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CheckStatus::Fail(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass(_) => "pass",
            CheckStatus::Fail(_) => "fail",
            CheckStatus::Warning(_) => "warn",
        }
    }

    pub fn color_status(&self) -> impl Display {
        match self {
            CheckStatus::Pass(_) => "PASS".green(),
            CheckStatus::Fail(_) => "FAIL".red(),
            CheckStatus::Warning(_) => "WARN".yellow(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
}

impl Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{: <18} {: <6} {}",
            self.name.bold(),
            self.status.color_status(),
            self.status.message()
        )
    }
}

pub fn run_checks(config: &PipelineConfig, input: Option<&Path>) -> Vec<CheckResult> {
    let mut results = vec![
        tool_check("ffmpeg", "needed to extract, mix and compose"),
        tool_check("ffprobe", "needed to measure clip durations"),
    ];
    results.push(CheckResult {
        name: "credentials",
        status: credentials_status(config),
    });
    results.push(CheckResult {
        name: "project",
        status: match config.service.project_id.as_deref() {
            Some(p) if !p.trim().is_empty() => CheckStatus::Pass(format!(
                "{} in {} ({} / {})",
                p, config.service.location, config.service.video_model, config.service.text_model
            )),
            _ => CheckStatus::Fail(
                "PROJECT_ID is not set (env or [service].project_id)".to_string(),
            ),
        },
    });
    results.push(CheckResult {
        name: "audio library",
        status: library_status(&config.paths.audio_library),
    });
    if let Some(input) = input {
        results.push(CheckResult {
            name: "input",
            status: input_status(input),
        });
    }
    results
}

fn tool_check(tool: &'static str, purpose: &str) -> CheckResult {
    let status = match which::which(tool) {
        Ok(path) => CheckStatus::Pass(path.display().to_string()),
        Err(_) => CheckStatus::Fail(format!("{} not found in PATH ({})", tool, purpose)),
    };
    CheckResult { name: tool, status }
}

fn credentials_status(config: &PipelineConfig) -> CheckStatus {
    if config.service.access_token.is_some() {
        return CheckStatus::Pass("access token from configuration".to_string());
    }
    match which::which("gcloud") {
        Ok(_) => CheckStatus::Pass("gcloud auth print-access-token".to_string()),
        Err(_) => CheckStatus::Fail(
            "no SHAYARI_ACCESS_TOKEN and gcloud not found in PATH".to_string(),
        ),
    }
}

fn library_status(dir: &Path) -> CheckStatus {
    match AudioLibrary::scan(dir) {
        Ok(library) if library.is_empty() => CheckStatus::Fail(format!(
            "no audio files in {}",
            library.dir().display()
        )),
        Ok(library) => CheckStatus::Pass(format!(
            "{} track(s) in {}",
            library.len(),
            library.dir().display()
        )),
        Err(err) => CheckStatus::Fail(err.to_string()),
    }
}

fn input_status(path: &Path) -> CheckStatus {
    match InputBatch::load(path) {
        Ok(batch) if batch.is_empty() => {
            CheckStatus::Warning(format!("{} contains no items", path.display()))
        }
        Ok(batch) => {
            let blank = batch
                .items
                .iter()
                .filter(|i| i.text.trim().is_empty())
                .count();
            if blank > 0 {
                CheckStatus::Warning(format!(
                    "{} item(s), {} with empty text",
                    batch.len(),
                    blank
                ))
            } else {
                CheckStatus::Pass(format!("{} item(s) -> outputs/{}/", batch.len(), batch.stem))
            }
        }
        Err(err) => CheckStatus::Fail(err.to_string()),
    }
}
