//! kasane-pipeline: non-destructive image processing pipelines (sans-IO).
//!
//! Each loaded image owns an ordered list of toggle-able transform
//! steps. The store applies structural edits as pure transitions, the
//! executor recomputes the active prefix from the source image after
//! every change, and the registry maps each operation kind onto the
//! `image`/`imageproc` algorithm that implements it.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and returns structured data. Decoding, persistence, and all
//! presentation live outside.

pub mod artifact;
pub mod diagnostics;
pub mod executor;
pub mod ops;
pub mod registry;
pub mod store;

pub use artifact::{Artifact, ArtifactClass, BitDepth, ColorModel, ImageMeta, SourceImage};
pub use executor::{PipelineStep, RunOutcome, StepFailure, StepTiming, run};
pub use ops::{FlipDirection, OperationKind, ResizeFilter, Rotation, ThresholdPolarity};
pub use registry::{ApplyError, apply};
pub use store::{ImageId, OpId, Operation, Pipeline, PipelineAction, PipelineStore, StoreError};
