//! kasane-session: per-image session state for kasane pipelines.
//!
//! Ties the pipeline store, the executor, and the ROI state together
//! behind a single mutation point: every structural edit synchronously
//! recomputes the affected image's active prefix before returning, and
//! the query surface (`result_at_end`, `result_before`, `list_steps`,
//! ROI listing and filtering) reads only fully-consistent state.

pub mod bundle;
pub mod session;

pub use bundle::SessionBundle;
pub use session::{ImageSession, SessionError, Workspace};
