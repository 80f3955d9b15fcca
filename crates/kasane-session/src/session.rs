//! Per-image session state and the workspace that serializes edits.
//!
//! An [`ImageSession`] owns everything derived from one loaded image:
//! the immutable source, the latest run outcome, the ROI list, the
//! range-filter set, and the visible-column preferences. The
//! [`Workspace`] owns the pipeline store plus every session and is the
//! single mutation point: each structural edit synchronously re-runs
//! the executor for the affected image before returning, so readers
//! always observe a fully-consistent state.
//!
//! Callers serialize edits per image (in practice the hosting UI's
//! single-threaded update loop); nothing here is reentrant.

use std::collections::BTreeMap;

use kasane_pipeline::artifact::{Artifact, ArtifactClass, SourceImage};
use kasane_pipeline::diagnostics::RunDiagnostics;
use kasane_pipeline::executor::{self, RunOutcome, StepFailure, StepTiming};
use kasane_pipeline::ops::OperationKind;
use kasane_pipeline::store::{ImageId, OpId, Pipeline, PipelineStore, StoreError};
use kasane_roi::extract::{self, ExtractOptions};
use kasane_roi::filter::{FilterSet, column_bounds};
use kasane_roi::roi::{Roi, RoiColumn};
use kasane_roi::store::RoiStore;

/// Errors surfaced by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A structural pipeline edit failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// ROI extraction was requested but the pipeline's end result is
    /// not a binary mask.
    #[error("the pipeline result for {image} is a {actual}, not a mask")]
    NotAMask {
        /// The image whose result was queried.
        image: ImageId,
        /// The class the end result actually has.
        actual: ArtifactClass,
    },
}

/// Everything derived from one loaded image.
#[derive(Debug, Clone)]
pub struct ImageSession {
    pub(crate) source: SourceImage,
    pub(crate) outcome: RunOutcome,
    pub(crate) rois: RoiStore,
    pub(crate) filters: FilterSet,
    pub(crate) visible_columns: Vec<RoiColumn>,
}

impl ImageSession {
    fn new(source: SourceImage) -> Self {
        Self {
            source,
            outcome: RunOutcome::default(),
            rois: RoiStore::new(),
            filters: FilterSet::new(),
            visible_columns: RoiColumn::ALL.to_vec(),
        }
    }
}

/// All sessions plus the pipeline store, behind one mutation point.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub(crate) store: PipelineStore,
    pub(crate) sessions: BTreeMap<ImageId, ImageSession>,
    next_image: u64,
}

impl Workspace {
    /// An empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Register a decoded image, creating its session and empty
    /// pipeline.
    pub fn load_image(&mut self, image: image::DynamicImage) -> ImageId {
        let id = ImageId(self.next_image);
        self.next_image += 1;
        self.store.register(id);
        self.sessions.insert(id, ImageSession::new(SourceImage::new(image)));
        id
    }

    /// Close an image, destroying its pipeline, ROI list, and filters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn close_image(&mut self, image: ImageId) -> Result<(), SessionError> {
        self.store.unregister(image)?;
        self.sessions.remove(&image);
        Ok(())
    }

    /// Ids of every loaded image, in load order.
    #[must_use]
    pub fn images(&self) -> Vec<ImageId> {
        self.sessions.keys().copied().collect()
    }

    /// The source image for one session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn source(&self, image: ImageId) -> Result<&SourceImage, SessionError> {
        Ok(&self.session(image)?.source)
    }

    /// The pipeline for one image.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn pipeline(&self, image: ImageId) -> Result<&Pipeline, SessionError> {
        Ok(self.store.pipeline(image)?)
    }

    // -----------------------------------------------------------------
    // Structural edits (each synchronously recomputes)
    // -----------------------------------------------------------------

    /// Append an operation and recompute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn append_operation(
        &mut self,
        image: ImageId,
        kind: OperationKind,
    ) -> Result<OpId, SessionError> {
        let id = self.store.append(image, kind)?;
        self.recompute(image)?;
        Ok(id)
    }

    /// Edit an operation in place (or append it under the given id when
    /// absent) and recompute. Edit and add share this one path; the
    /// engine never tracks which modal is open.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn edit_operation(
        &mut self,
        image: ImageId,
        op: OpId,
        kind: OperationKind,
    ) -> Result<(), SessionError> {
        self.store.upsert(image, op, kind)?;
        self.recompute(image)
    }

    /// Remove an operation and recompute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] or
    /// [`StoreError::OperationNotFound`]; the pipeline is unchanged on
    /// error.
    pub fn remove_operation(&mut self, image: ImageId, op: OpId) -> Result<(), SessionError> {
        self.store.remove(image, op)?;
        self.recompute(image)
    }

    /// Toggle an operation (recomputing every active flag from index
    /// comparisons) and recompute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] or
    /// [`StoreError::OperationNotFound`].
    pub fn toggle_operation(
        &mut self,
        image: ImageId,
        op: OpId,
        checked: bool,
    ) -> Result<(), SessionError> {
        self.store.toggle(image, op, checked)?;
        self.recompute(image)
    }

    /// Append a copy of `source`'s pipeline to `target`'s (fresh ids)
    /// and recompute the target.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if either image is
    /// unknown.
    pub fn copy_pipeline(
        &mut self,
        source: ImageId,
        target: ImageId,
    ) -> Result<Vec<OpId>, SessionError> {
        let ids = self.store.copy_from(source, target)?;
        self.recompute(target)?;
        Ok(ids)
    }

    // -----------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------

    /// The cumulative result at the end of the active prefix, falling
    /// back to the source image when no step succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn result_at_end(&self, image: ImageId) -> Result<&Artifact, SessionError> {
        let session = self.session(image)?;
        Ok(session
            .outcome
            .result_at_end()
            .unwrap_or_else(|| session.source.artifact()))
    }

    /// The result feeding the step with the given id — the step
    /// immediately before it, or the source image when the id names the
    /// first step or no step at all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn result_before(&self, image: ImageId, op: OpId) -> Result<&Artifact, SessionError> {
        let session = self.session(image)?;
        Ok(session
            .outcome
            .result_before(op)
            .unwrap_or_else(|| session.source.artifact()))
    }

    /// Ids and per-step costs of the latest run, without artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn list_steps(&self, image: ImageId) -> Result<Vec<StepTiming>, SessionError> {
        Ok(self.session(image)?.outcome.timings())
    }

    /// The failure that stopped the latest run, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn run_failure(&self, image: ImageId) -> Result<Option<&StepFailure>, SessionError> {
        Ok(self.session(image)?.outcome.failure())
    }

    /// Diagnostics for the latest run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn diagnostics(&self, image: ImageId) -> Result<RunDiagnostics, SessionError> {
        let pipeline = self.store.pipeline(image)?;
        let session = self.session(image)?;
        Ok(RunDiagnostics::collect(pipeline, &session.outcome))
    }

    // -----------------------------------------------------------------
    // ROI state
    // -----------------------------------------------------------------

    /// Extract ROIs from the pipeline's end result and store the list
    /// wholesale, replacing any previous list. Returns the record
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAMask`] when the end result is not a
    /// binary mask, and [`StoreError::ImageNotFound`] for unknown
    /// images.
    pub fn extract_rois(
        &mut self,
        image: ImageId,
        options: &ExtractOptions,
    ) -> Result<usize, SessionError> {
        let artifact = self.result_at_end(image)?;
        let Some(mask) = artifact.as_mask() else {
            return Err(SessionError::NotAMask {
                image,
                actual: artifact.class(),
            });
        };
        let rois = extract::extract(mask, options);
        let count = rois.len();
        self.session_mut(image)?.rois.replace(rois);
        Ok(count)
    }

    /// The stored ROI list (unfiltered).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn rois(&self, image: ImageId) -> Result<&[Roi], SessionError> {
        Ok(self.session(image)?.rois.rois())
    }

    /// The records passing the current filter set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn visible_rois(&self, image: ImageId) -> Result<Vec<&Roi>, SessionError> {
        let session = self.session(image)?;
        Ok(session
            .rois
            .rois()
            .iter()
            .filter(|roi| session.filters.matches(roi))
            .collect())
    }

    /// Replace the stored list with the currently visible subset and
    /// clear the filter set (the constraints are baked into the new
    /// list). Returns the new record count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn commit_filters(&mut self, image: ImageId) -> Result<usize, SessionError> {
        let session = self.session_mut(image)?;
        let kept: Vec<Roi> = session
            .rois
            .rois()
            .iter()
            .filter(|roi| session.filters.matches(roi))
            .cloned()
            .collect();
        let count = kept.len();
        session.rois.replace(kept);
        session.filters.clear();
        Ok(count)
    }

    // -----------------------------------------------------------------
    // Range filters and column preferences
    // -----------------------------------------------------------------

    /// The active filter set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn filters(&self, image: ImageId) -> Result<&FilterSet, SessionError> {
        Ok(&self.session(image)?.filters)
    }

    /// Move a column's lower bound. The global bounds are derived from
    /// the records visible when that column's own filter is ignored;
    /// with no visible record the update is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn update_filter_min(
        &mut self,
        image: ImageId,
        column: RoiColumn,
        requested: f64,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(image)?;
        if let Some(bounds) = column_bounds(session.rois.rois(), &session.filters, column) {
            session.filters.update_min(column, requested, bounds);
        }
        Ok(())
    }

    /// Move a column's upper bound. Mirror image of
    /// [`update_filter_min`](Self::update_filter_min).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn update_filter_max(
        &mut self,
        image: ImageId,
        column: RoiColumn,
        requested: f64,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(image)?;
        if let Some(bounds) = column_bounds(session.rois.rois(), &session.filters, column) {
            session.filters.update_max(column, requested, bounds);
        }
        Ok(())
    }

    /// Delete a column's filter unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn remove_filter(&mut self, image: ImageId, column: RoiColumn) -> Result<(), SessionError> {
        self.session_mut(image)?.filters.remove(column);
        Ok(())
    }

    /// The visible-column preference set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn visible_columns(&self, image: ImageId) -> Result<&[RoiColumn], SessionError> {
        Ok(&self.session(image)?.visible_columns)
    }

    /// Replace the visible-column preference set, clearing any filter
    /// on a column that is no longer visible.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn set_visible_columns(
        &mut self,
        image: ImageId,
        columns: Vec<RoiColumn>,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(image)?;
        session.filters.retain_columns(&columns);
        session.visible_columns = columns;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    pub(crate) fn session(&self, image: ImageId) -> Result<&ImageSession, SessionError> {
        self.sessions
            .get(&image)
            .ok_or(SessionError::Store(StoreError::ImageNotFound(image)))
    }

    pub(crate) fn session_mut(&mut self, image: ImageId) -> Result<&mut ImageSession, SessionError> {
        self.sessions
            .get_mut(&image)
            .ok_or(SessionError::Store(StoreError::ImageNotFound(image)))
    }

    pub(crate) fn recompute(&mut self, image: ImageId) -> Result<(), SessionError> {
        let pipeline = self.store.pipeline(image)?;
        let session = self
            .sessions
            .get_mut(&image)
            .ok_or(SessionError::Store(StoreError::ImageNotFound(image)))?;
        let outcome = executor::run(&session.source, pipeline);
        session.outcome = outcome;
        Ok(())
    }
}
