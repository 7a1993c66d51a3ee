use std::fmt;

use super::error::PipelineError;

/// One node of the per-item stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    SelectTrack,
    Recital,
    Ambient,
    Subtitles,
    Mix,
    Compose,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::SelectTrack,
        Stage::Recital,
        Stage::Ambient,
        Stage::Subtitles,
        Stage::Mix,
        Stage::Compose,
    ];

    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Stage::SelectTrack | Stage::Recital | Stage::Ambient => &[],
            Stage::Subtitles => &[Stage::Recital],
            Stage::Mix => &[Stage::Recital, Stage::SelectTrack],
            Stage::Compose => &[Stage::Ambient, Stage::Mix, Stage::Subtitles],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::SelectTrack => "select_track",
            Stage::Recital => "recital",
            Stage::Ambient => "ambient",
            Stage::Subtitles => "subtitles",
            Stage::Mix => "mix",
            Stage::Compose => "compose",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion bookkeeping shared by the sequential and concurrent schedulers.
#[derive(Debug, Clone, Default)]
pub struct StageProgress {
    started: [bool; 6],
    done: [bool; 6],
}

impl StageProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, stage: Stage) -> bool {
        self.done[stage.index()]
    }

    pub fn all_done(&self) -> bool {
        self.done.iter().all(|d| *d)
    }

    pub fn mark_started(&mut self, stage: Stage) {
        self.started[stage.index()] = true;
    }

    pub fn mark_done(&mut self, stage: Stage) {
        self.done[stage.index()] = true;
    }

    /// Stages not yet started whose dependencies have all completed.
    pub fn ready(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| !self.started[s.index()])
            .filter(|s| s.dependencies().iter().all(|d| self.is_done(*d)))
            .collect()
    }
}

/// Kahn's algorithm over `Stage::ALL`; ties keep declaration order.
pub fn topological_order() -> Result<Vec<Stage>, PipelineError> {
    let mut progress = StageProgress::new();
    let mut order = Vec::with_capacity(Stage::ALL.len());
    while order.len() < Stage::ALL.len() {
        let ready = progress.ready();
        let Some(next) = ready.first().copied() else {
            return Err(PipelineError::Internal(
                "stage graph contains a cycle".to_string(),
            ));
        };
        progress.mark_started(next);
        progress.mark_done(next);
        order.push(next);
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Stage], stage: Stage) -> usize {
        order.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn topological_order_respects_every_edge() {
        let order = topological_order().unwrap();
        assert_eq!(order.len(), Stage::ALL.len());
        for stage in Stage::ALL {
            for dep in stage.dependencies() {
                assert!(
                    position(&order, *dep) < position(&order, stage),
                    "{dep} must run before {stage}"
                );
            }
        }
        assert_eq!(order.last(), Some(&Stage::Compose));
    }

    #[test]
    fn independent_stages_are_ready_together() {
        let progress = StageProgress::new();
        assert_eq!(
            progress.ready(),
            vec![Stage::SelectTrack, Stage::Recital, Stage::Ambient]
        );
    }

    #[test]
    fn mix_waits_for_recital_and_track() {
        let mut progress = StageProgress::new();
        for s in [Stage::SelectTrack, Stage::Recital, Stage::Ambient] {
            progress.mark_started(s);
        }
        progress.mark_done(Stage::Recital);
        assert_eq!(progress.ready(), vec![Stage::Subtitles]);
        progress.mark_done(Stage::SelectTrack);
        assert_eq!(progress.ready(), vec![Stage::Subtitles, Stage::Mix]);
        assert!(!progress.all_done());
    }
}
