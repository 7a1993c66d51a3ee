use futures_util::StreamExt;
use futures_util::stream;

use super::error::PipelineError;
use super::input::InputBatch;
use super::model::PipelineResult;
use super::orchestrator::Orchestrator;
use crate::common::progress::{create_batch_bar, finish_bar_with_message};
use crate::ui::is_debug_enabled;
use crate::ui::prelude::*;

/// Run the selected items, at most `jobs` at a time.
///
/// Results come back in input order. A failing item never stops the rest;
/// only a bad `index` fails the batch as a whole.
pub async fn run_batch(
    orchestrator: &Orchestrator,
    batch: &InputBatch,
    index: Option<usize>,
    force: bool,
    jobs: usize,
) -> Result<Vec<PipelineResult>, PipelineError> {
    let items = batch.select(index)?;

    emit(
        Level::Info,
        "shayari.batch.start",
        &format!(
            "Processing {} of {} item(s) from {} ({} at a time)",
            items.len(),
            batch.len(),
            batch.source.display(),
            jobs.max(1)
        ),
        Some(serde_json::json!({
            "input": batch.source,
            "selected": items.len(),
            "total": batch.len(),
            "jobs": jobs.max(1),
            "force": force,
        })),
    );

    let pb = match get_output_format() {
        OutputFormat::Text if !is_debug_enabled() => {
            Some(create_batch_bar(items.len() as u64, batch.stem.clone()))
        }
        _ => None,
    };

    let results: Vec<PipelineResult> = stream::iter(items.iter())
        .map(|item| {
            let pb = pb.clone();
            async move {
                let result = orchestrator.run(item, &batch.stem, force).await;
                if let Some(pb) = pb {
                    pb.inc(1);
                    pb.set_message(format!("{} {}", item.id, result.status.label()));
                }
                result
            }
        })
        .buffered(jobs.max(1))
        .collect()
        .await;

    if let Some(pb) = pb {
        let failed = results.iter().filter(|r| r.is_failed()).count();
        finish_bar_with_message(
            pb,
            format!("{} item(s) processed, {} failed", results.len(), failed),
        );
    }

    Ok(results)
}
