//! Deterministic recomputation of a pipeline's active prefix.
//!
//! [`run`] walks the operation list in order, feeding each step the
//! previous step's artifact (the source image for the first step),
//! timing every registry call, and stopping at the first inactive
//! operation or the first failure. There is no caching: every run
//! recomputes the whole prefix from the source image, so two runs over
//! the same source and pipeline produce bit-identical artifacts.
//!
//! Stopping (rather than skipping) at an inactive operation is the
//! recovery policy for non-prefix active patterns: the executor never
//! assumes the store kept the invariant for it.
//!
//! Step failures are data, not errors — [`run`] always returns a
//! [`RunOutcome`] carrying the steps that did succeed, and the caller
//! decides how to surface the failure.

use std::time::Duration;

use web_time::Instant;

use crate::artifact::{Artifact, SourceImage};
use crate::registry::{self, ApplyError};
use crate::store::{OpId, Pipeline};

/// The artifact and cost of one successfully executed operation.
///
/// Rebuilt wholesale on every run; never persisted.
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Id of the operation that produced this step.
    pub id: OpId,
    /// The operation's output.
    pub result: Artifact,
    /// Wall-clock time spent inside the registry call. Diagnostics
    /// only; no correctness contract depends on it.
    pub elapsed: Duration,
}

/// The step at which a run stopped early, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Id of the failing operation.
    pub id: OpId,
    /// The registry's rejection.
    pub error: ApplyError,
}

/// Id and cost of one step, without the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTiming {
    /// Id of the operation.
    pub id: OpId,
    /// Wall-clock time spent inside the registry call.
    pub elapsed: Duration,
}

/// Everything one executor run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    steps: Vec<PipelineStep>,
    failure: Option<StepFailure>,
}

impl RunOutcome {
    /// The successfully executed steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// The failure that stopped the run, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&StepFailure> {
        self.failure.as_ref()
    }

    /// The last successful step's artifact, or `None` when no step
    /// succeeded (callers fall back to the source image).
    #[must_use]
    pub fn result_at_end(&self) -> Option<&Artifact> {
        self.steps.last().map(|step| &step.result)
    }

    /// The artifact feeding the step with the given id — the result of
    /// the step immediately before it. `None` means the source image:
    /// either the id names the first step, or no step carries the id.
    #[must_use]
    pub fn result_before(&self, id: OpId) -> Option<&Artifact> {
        let index = self.steps.iter().position(|step| step.id == id)?;
        if index == 0 {
            return None;
        }
        Some(&self.steps[index - 1].result)
    }

    /// Ids and per-step costs, without the artifacts.
    #[must_use]
    pub fn timings(&self) -> Vec<StepTiming> {
        self.steps
            .iter()
            .map(|step| StepTiming {
                id: step.id,
                elapsed: step.elapsed,
            })
            .collect()
    }
}

/// Recompute the pipeline's active prefix from the source image.
///
/// Invoked synchronously whenever the pipeline or the source changes;
/// the previous outcome is superseded wholesale.
#[must_use]
pub fn run(source: &SourceImage, pipeline: &Pipeline) -> RunOutcome {
    let mut steps: Vec<PipelineStep> = Vec::new();
    let mut failure = None;

    for op in pipeline.operations() {
        if !op.active {
            break;
        }

        let input = steps.last().map_or(source.artifact(), |step| &step.result);
        let started = Instant::now();
        match registry::apply(&op.kind, input) {
            Ok(result) => {
                steps.push(PipelineStep {
                    id: op.id,
                    result,
                    elapsed: started.elapsed(),
                });
            }
            Err(error) => {
                failure = Some(StepFailure { id: op.id, error });
                break;
            }
        }
    }

    RunOutcome { steps, failure }
}
