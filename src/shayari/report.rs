use super::model::{ItemStatus, PipelineResult};
use crate::ui::prelude::*;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PARTIAL: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[PipelineResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                ItemStatus::Success => summary.succeeded += 1,
                ItemStatus::Skipped => summary.skipped += 1,
                ItemStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// 0 when nothing failed, 2 when some items failed, 1 when all did.
    pub fn exit_code(&self) -> u8 {
        if self.failed == 0 {
            EXIT_OK
        } else if self.failed == self.total() {
            EXIT_FAILURE
        } else {
            EXIT_PARTIAL
        }
    }
}

pub fn print_report(results: &[PipelineResult]) {
    separator();
    for result in results {
        let (level, line) = match (&result.status, &result.error) {
            (ItemStatus::Failed, Some(err)) => (
                Level::Error,
                format!(
                    "{:<8} {} [{}] {}",
                    result.status.label(),
                    result.item_id,
                    err.kind_name(),
                    err
                ),
            ),
            (ItemStatus::Success, _) => (
                Level::Success,
                format!(
                    "{:<8} {} -> {}",
                    result.status.label(),
                    result.item_id,
                    result.output_path.display()
                ),
            ),
            _ => (
                Level::Info,
                format!(
                    "{:<8} {} -> {}",
                    result.status.label(),
                    result.item_id,
                    result.output_path.display()
                ),
            ),
        };
        emit(level, "shayari.report.item", &line, Some(result.to_json()));
    }

    let summary = BatchSummary::from_results(results);
    let level = match summary.exit_code() {
        EXIT_OK => Level::Success,
        EXIT_PARTIAL => Level::Warn,
        _ => Level::Error,
    };
    emit(
        level,
        "shayari.report.summary",
        &format!(
            "{} item(s): {} succeeded, {} skipped, {} failed",
            summary.total(),
            summary.succeeded,
            summary.skipped,
            summary.failed
        ),
        Some(serde_json::json!({
            "succeeded": summary.succeeded,
            "skipped": summary.skipped,
            "failed": summary.failed,
            "exit_code": summary.exit_code(),
        })),
    );
}
