//! The persisted-state boundary: everything of a session that
//! round-trips through the surrounding application's bundle format.
//!
//! A [`SessionBundle`] snapshots the ordered operation list (kind +
//! options + id + active flag per step) and the ROI view preferences
//! (range filters and visible columns). Operation ids are preserved
//! across a round trip so in-place edits keep referring to the same
//! step after an import.

use serde::{Deserialize, Serialize};

use kasane_pipeline::store::{ImageId, Operation};
use kasane_roi::filter::{FilterSet, RoiFilter};
use kasane_roi::roi::RoiColumn;

use crate::session::{SessionError, Workspace};

/// The serializable snapshot of one image's session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBundle {
    /// The ordered operation list, ids included.
    pub operations: Vec<Operation>,
    /// The active range filters.
    pub filters: Vec<RoiFilter>,
    /// The visible-column preference set.
    pub visible_columns: Vec<RoiColumn>,
}

impl Workspace {
    /// Snapshot an image's pipeline and ROI view preferences.
    ///
    /// # Errors
    ///
    /// Returns `ImageNotFound` if the image is unknown.
    pub fn export_bundle(&self, image: ImageId) -> Result<SessionBundle, SessionError> {
        let operations = self.pipeline(image)?.operations().to_vec();
        let session = self.session(image)?;
        Ok(SessionBundle {
            operations,
            filters: session.filters.filters().to_vec(),
            visible_columns: session.visible_columns.clone(),
        })
    }

    /// Replay a bundle onto an image: the pipeline is replaced
    /// wholesale (preserving the bundled ids), the filter and column
    /// preferences are restored, and the pipeline is recomputed.
    /// Filters on columns the bundle hides are discarded.
    ///
    /// # Errors
    ///
    /// Returns `ImageNotFound` if the image is unknown.
    pub fn import_bundle(
        &mut self,
        image: ImageId,
        bundle: SessionBundle,
    ) -> Result<(), SessionError> {
        self.store.restore(image, bundle.operations)?;
        {
            let session = self.session_mut(image)?;
            let mut filters = FilterSet::from_filters(bundle.filters);
            filters.retain_columns(&bundle.visible_columns);
            session.filters = filters;
            session.visible_columns = bundle.visible_columns;
        }
        self.recompute(image)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kasane_pipeline::ops::{OperationKind, ThresholdPolarity};
    use kasane_roi::extract::ExtractOptions;

    /// Two bright blobs (surfaces 16 and 4) on a dark background, so
    /// surface filters have a non-degenerate global range.
    fn blob_image() -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(12, 12, |x, y| {
            let in_big = (2..6).contains(&x) && (2..6).contains(&y);
            let in_small = (8..10).contains(&x) && (8..10).contains(&y);
            if in_big || in_small {
                image::Rgb([200, 200, 200])
            } else {
                image::Rgb([20, 20, 20])
            }
        }))
    }

    fn threshold() -> OperationKind {
        OperationKind::Threshold {
            value: 100,
            polarity: ThresholdPolarity::Bright,
        }
    }

    #[test]
    fn round_trip_preserves_operations_and_preferences() {
        let mut workspace = Workspace::new();
        let image = workspace.load_image(blob_image());
        let grey = workspace.append_operation(image, OperationKind::Grey).unwrap();
        let thresh = workspace.append_operation(image, threshold()).unwrap();
        workspace.toggle_operation(image, grey, true).unwrap();
        workspace
            .set_visible_columns(image, vec![RoiColumn::Id, RoiColumn::Surface])
            .unwrap();

        let bundle = workspace.export_bundle(image).unwrap();
        let json = serde_json::to_string(&bundle).unwrap();
        let parsed: SessionBundle = serde_json::from_str(&json).unwrap();

        let mut restored = Workspace::new();
        let target = restored.load_image(blob_image());
        restored.import_bundle(target, parsed).unwrap();

        let pipeline = restored.pipeline(target).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.operations()[0].id, grey);
        assert_eq!(pipeline.operations()[1].id, thresh);
        assert!(pipeline.operations()[0].active);
        assert!(!pipeline.operations()[1].active, "active flags round-trip");
        assert_eq!(
            restored.visible_columns(target).unwrap(),
            &[RoiColumn::Id, RoiColumn::Surface],
        );
        // Import recomputed: the grey step ran.
        assert_eq!(restored.list_steps(target).unwrap().len(), 1);
    }

    #[test]
    fn imported_ids_still_address_the_same_steps() {
        let mut workspace = Workspace::new();
        let image = workspace.load_image(blob_image());
        let grey = workspace.append_operation(image, OperationKind::Grey).unwrap();

        let bundle = workspace.export_bundle(image).unwrap();
        let mut restored = Workspace::new();
        let target = restored.load_image(blob_image());
        restored.import_bundle(target, bundle).unwrap();

        // Editing by the old id must hit the imported step, not append.
        restored
            .edit_operation(target, grey, OperationKind::Invert)
            .unwrap();
        let pipeline = restored.pipeline(target).unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.operations()[0].kind, OperationKind::Invert);

        // And fresh appends never collide with the imported id.
        let fresh = restored
            .append_operation(target, OperationKind::Grey)
            .unwrap();
        assert_ne!(fresh, grey);
    }

    #[test]
    fn filters_round_trip_and_hidden_columns_are_dropped() {
        let mut workspace = Workspace::new();
        let image = workspace.load_image(blob_image());
        workspace.append_operation(image, threshold()).unwrap();
        workspace
            .extract_rois(image, &ExtractOptions::default())
            .unwrap();
        workspace
            .update_filter_min(image, RoiColumn::Surface, 10.0)
            .unwrap();

        let mut bundle = workspace.export_bundle(image).unwrap();
        assert_eq!(bundle.filters.len(), 1);

        // A bundle whose column preferences hide the filtered column
        // must not resurrect the filter on import.
        bundle.visible_columns = vec![RoiColumn::Id];
        let mut restored = Workspace::new();
        let target = restored.load_image(blob_image());
        restored.import_bundle(target, bundle.clone()).unwrap();
        assert!(restored.filters(target).unwrap().is_empty());

        // With the column visible, the filter survives.
        bundle.visible_columns = vec![RoiColumn::Id, RoiColumn::Surface];
        let mut restored = Workspace::new();
        let target = restored.load_image(blob_image());
        restored.import_bundle(target, bundle).unwrap();
        let filters = restored.filters(target).unwrap();
        assert_eq!(filters.filters().len(), 1);
        assert_eq!(filters.get(RoiColumn::Surface).unwrap().min, Some(10.0));
    }
}
