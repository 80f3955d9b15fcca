//! Run diagnostics: per-step timing and output summaries.
//!
//! Collected from every executor run for UI display and parameter
//! experimentation. Durations use [`std::time::Duration`] internally and
//! serialize as fractional seconds (`f64`) for JSON compatibility, since
//! `Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactClass;
use crate::executor::RunOutcome;
use crate::store::{OpId, Pipeline};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDiagnostics {
    /// Id of the operation.
    pub id: OpId,
    /// Kebab-case kind name.
    pub kind: String,
    /// Wall-clock duration of the registry call (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Class of the step's output artifact.
    pub output_class: ArtifactClass,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// The failure that stopped a run, flattened for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDiagnostics {
    /// Id of the failing operation.
    pub id: OpId,
    /// Kebab-case kind name.
    pub kind: String,
    /// The registry's rejection message.
    pub message: String,
}

/// Diagnostics collected from a single executor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// One entry per successfully executed step, in order.
    pub steps: Vec<StepDiagnostics>,
    /// Total wall-clock duration across all executed steps (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Number of operations in the pipeline, executed or not.
    pub pipeline_length: usize,
    /// The failure that stopped the run, if any.
    pub failure: Option<FailureDiagnostics>,
}

impl RunDiagnostics {
    /// Build diagnostics from a run and the pipeline it executed.
    #[must_use]
    pub fn collect(pipeline: &Pipeline, outcome: &RunOutcome) -> Self {
        let steps: Vec<StepDiagnostics> = outcome
            .steps()
            .iter()
            .map(|step| {
                let (width, height) = step.result.dimensions();
                StepDiagnostics {
                    id: step.id,
                    kind: pipeline
                        .get(step.id)
                        .map_or_else(String::new, |op| op.kind.name().to_string()),
                    duration: step.elapsed,
                    output_class: step.result.class(),
                    width,
                    height,
                }
            })
            .collect();

        let total_duration = steps.iter().map(|step| step.duration).sum();

        let failure = outcome.failure().map(|failure| FailureDiagnostics {
            id: failure.id,
            kind: pipeline
                .get(failure.id)
                .map_or_else(String::new, |op| op.kind.name().to_string()),
            message: failure.error.to_string(),
        });

        Self {
            steps,
            total_duration,
            pipeline_length: pipeline.len(),
            failure,
        }
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Run Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Steps executed: {} of {}  |  Total: {:.3}ms",
            self.steps.len(),
            self.pipeline_length,
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<8} {:<20} {:>10} {:>9}  {}",
            "Step", "Kind", "Duration", "% Total", "Output"
        ));
        lines.push("-".repeat(64));

        let total_ms = duration_ms(self.total_duration);
        for step in &self.steps {
            let ms = duration_ms(step.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "{:<8} {:<20} {ms:>8.3}ms {pct:>8.1}%  {} {}x{}",
                step.id.to_string(),
                step.kind,
                step.output_class,
                step.width,
                step.height,
            ));
        }

        if let Some(ref failure) = self.failure {
            lines.push(String::new());
            lines.push(format!(
                "Stopped at {} ({}): {}",
                failure.id, failure.kind, failure.message,
            ));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::artifact::SourceImage;
    use crate::executor;
    use crate::ops::OperationKind;
    use crate::store::{ImageId, PipelineStore};

    const IMG: ImageId = ImageId(0);

    fn source() -> SourceImage {
        SourceImage::new(image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(
            8,
            8,
            |x, _| image::Rgb([(x * 30) as u8; 3]),
        )))
    }

    #[test]
    fn collect_lists_one_row_per_executed_step() {
        let mut store = PipelineStore::new();
        store.register(IMG);
        store.append(IMG, OperationKind::Grey).unwrap();
        store.append(IMG, OperationKind::Invert).unwrap();

        let pipeline = store.pipeline(IMG).unwrap();
        let outcome = executor::run(&source(), pipeline);
        let diagnostics = RunDiagnostics::collect(pipeline, &outcome);

        assert_eq!(diagnostics.steps.len(), 2);
        assert_eq!(diagnostics.pipeline_length, 2);
        assert_eq!(diagnostics.steps[0].kind, "grey");
        assert_eq!(diagnostics.steps[1].kind, "invert");
        assert!(diagnostics.failure.is_none());
    }

    #[test]
    fn collect_records_the_failure() {
        let mut store = PipelineStore::new();
        store.register(IMG);
        store.append(IMG, OperationKind::Dilate { radius: 1 }).unwrap();

        let pipeline = store.pipeline(IMG).unwrap();
        let outcome = executor::run(&source(), pipeline);
        let diagnostics = RunDiagnostics::collect(pipeline, &outcome);

        assert!(diagnostics.steps.is_empty());
        let failure = diagnostics.failure.unwrap();
        assert_eq!(failure.kind, "dilate");
        assert!(failure.message.contains("requires a mask"));
    }

    #[test]
    fn report_produces_nonempty_table() {
        let mut store = PipelineStore::new();
        store.register(IMG);
        store.append(IMG, OperationKind::Grey).unwrap();

        let pipeline = store.pipeline(IMG).unwrap();
        let outcome = executor::run(&source(), pipeline);
        let report = RunDiagnostics::collect(pipeline, &outcome).report();

        assert!(report.contains("Pipeline Run Report"));
        assert!(report.contains("grey"));
        assert!(report.contains("8x8"));
    }

    #[test]
    fn serde_round_trip() {
        let diagnostics = RunDiagnostics {
            steps: vec![StepDiagnostics {
                id: OpId(3),
                kind: "blur".to_string(),
                duration: Duration::from_millis(12),
                output_class: ArtifactClass::Raster,
                width: 64,
                height: 48,
            }],
            total_duration: Duration::from_millis(12),
            pipeline_length: 2,
            failure: Some(FailureDiagnostics {
                id: OpId(4),
                kind: "dilate".to_string(),
                message: "dilate requires a mask input, got raster".to_string(),
            }),
        };

        let json = serde_json::to_string(&diagnostics).unwrap();
        let back: RunDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.steps.len(), 1);
        assert_eq!(back.steps[0].id, OpId(3));
        assert_eq!(back.total_duration, Duration::from_millis(12));
        assert_eq!(back.failure.unwrap().kind, "dilate");
    }

    #[test]
    fn duration_ms_converts_correctly() {
        assert!((duration_ms(Duration::from_millis(1234)) - 1234.0).abs() < 0.01);
    }
}
