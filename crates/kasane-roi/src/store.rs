//! Holds the ROI list from the most recent extraction or filter
//! commit.
//!
//! Replacement is always wholesale: a new extraction or a committed
//! filter pass supersedes the previous list entirely, and closing the
//! image clears it. There is no incremental merge.

use crate::roi::Roi;

/// The per-image ROI list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiStore {
    rois: Vec<Roi>,
}

impl RoiStore {
    /// An empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self { rois: Vec::new() }
    }

    /// The current list.
    #[must_use]
    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rois.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Replace the list wholesale.
    pub fn replace(&mut self, rois: Vec<Roi>) {
        self.rois = rois;
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.rois.clear();
    }
}
