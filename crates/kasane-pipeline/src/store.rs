//! Per-image ordered operation lists and the structural edits that
//! change them.
//!
//! Edits are modeled as pure transitions: [`Pipeline::apply`] takes the
//! current value and a [`PipelineAction`] and builds the successor value
//! without touching the original. [`PipelineStore`] is the single
//! serialization point — it validates, applies, and swaps the new value
//! in only when the transition succeeded, so a failed edit can never
//! leave a partially-mutated pipeline behind.
//!
//! # Active prefix
//!
//! The executable part of a pipeline is its leading run of `active`
//! operations. [`PipelineAction::Toggle`] recomputes every flag from
//! index comparisons alone: enabling the operation at index `i`
//! activates exactly the indices `<= i`, disabling it leaves exactly the
//! indices `< i` active. Appending always starts a step as `active`,
//! which can place an active step behind an inactive tail; the executor
//! stops at the first inactive step, so such a step stays dormant until
//! a toggle re-forms the prefix.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ops::OperationKind;

/// Opaque identifier of one loaded image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

/// Opaque identifier of one operation, assigned at creation and stable
/// across in-place edits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OpId(pub u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// One toggle-able transform step in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Identifier, stable across edits.
    pub id: OpId,
    /// The transform and its options.
    pub kind: OperationKind,
    /// Whether this step participates in the active prefix.
    pub active: bool,
}

/// Errors raised by structural pipeline edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The image id is not known to the store.
    #[error("unknown {0}")]
    ImageNotFound(ImageId),

    /// The operation id does not exist in the image's pipeline.
    #[error("unknown {0}")]
    OperationNotFound(OpId),
}

/// A structural edit, applied as a pure transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineAction {
    /// Insert a new operation at the end, `active=true`.
    Append {
        /// Pre-allocated id for the new operation.
        id: OpId,
        /// The transform to append.
        kind: OperationKind,
    },
    /// Replace an operation's kind/options in place, preserving its
    /// position and `active` flag; unknown ids append instead.
    Upsert {
        /// Id of the operation to edit (or to create).
        id: OpId,
        /// The replacement transform.
        kind: OperationKind,
    },
    /// Delete an operation.
    Remove {
        /// Id of the operation to delete.
        id: OpId,
    },
    /// Recompute every `active` flag relative to one operation's index.
    Toggle {
        /// The operation the user interacted with.
        id: OpId,
        /// `true` to activate through that operation, `false` to
        /// deactivate from it onwards.
        checked: bool,
    },
}

/// The ordered operation list belonging to one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    operations: Vec<Operation>,
}

impl Pipeline {
    /// An empty pipeline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// All operations in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the pipeline has no operations.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Look up an operation by id.
    #[must_use]
    pub fn get(&self, id: OpId) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Index of an operation by id.
    #[must_use]
    pub fn position(&self, id: OpId) -> Option<usize> {
        self.operations.iter().position(|op| op.id == id)
    }

    /// Whether the `active` flags form a contiguous leading run.
    #[must_use]
    pub fn has_prefix_active(&self) -> bool {
        let first_inactive = self
            .operations
            .iter()
            .position(|op| !op.active)
            .unwrap_or(self.operations.len());
        self.operations[first_inactive..].iter().all(|op| !op.active)
    }

    /// Build the successor pipeline for one action.
    ///
    /// The receiver is left untouched; callers swap in the returned
    /// value only on success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OperationNotFound`] for a `Remove` or
    /// `Toggle` naming an id this pipeline does not contain.
    pub fn apply(&self, action: &PipelineAction) -> Result<Self, StoreError> {
        let mut operations = self.operations.clone();
        match action {
            PipelineAction::Append { id, kind } => {
                operations.push(Operation {
                    id: *id,
                    kind: kind.clone(),
                    active: true,
                });
            }
            PipelineAction::Upsert { id, kind } => {
                if let Some(index) = self.position(*id) {
                    operations[index].kind = kind.clone();
                } else {
                    operations.push(Operation {
                        id: *id,
                        kind: kind.clone(),
                        active: true,
                    });
                }
            }
            PipelineAction::Remove { id } => {
                let index = self.position(*id).ok_or(StoreError::OperationNotFound(*id))?;
                operations.remove(index);
            }
            PipelineAction::Toggle { id, checked } => {
                let pivot = self.position(*id).ok_or(StoreError::OperationNotFound(*id))?;
                for (index, op) in operations.iter_mut().enumerate() {
                    op.active = if *checked { index <= pivot } else { index < pivot };
                }
            }
        }
        Ok(Self { operations })
    }
}

/// All pipelines, keyed by image, plus the id allocator.
///
/// Operation ids are unique across the whole store (not just within one
/// image), which keeps copies and bundle imports collision-free.
#[derive(Debug, Clone, Default)]
pub struct PipelineStore {
    pipelines: BTreeMap<ImageId, Pipeline>,
    next_op: u64,
}

impl PipelineStore {
    /// An empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pipelines: BTreeMap::new(),
            next_op: 0,
        }
    }

    /// Register an image with an empty pipeline. Registering an already
    /// known image leaves its pipeline untouched.
    pub fn register(&mut self, image: ImageId) {
        self.pipelines.entry(image).or_default();
    }

    /// Drop an image and its pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn unregister(&mut self, image: ImageId) -> Result<(), StoreError> {
        self.pipelines
            .remove(&image)
            .map(|_| ())
            .ok_or(StoreError::ImageNotFound(image))
    }

    /// The pipeline for an image.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn pipeline(&self, image: ImageId) -> Result<&Pipeline, StoreError> {
        self.pipelines
            .get(&image)
            .ok_or(StoreError::ImageNotFound(image))
    }

    /// Append a new operation with a fresh id, `active=true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn append(&mut self, image: ImageId, kind: OperationKind) -> Result<OpId, StoreError> {
        let id = self.peek_id(image)?;
        let next = self
            .pipeline(image)?
            .apply(&PipelineAction::Append { id, kind })?;
        self.commit(image, next);
        self.next_op += 1;
        Ok(id)
    }

    /// Replace an operation's kind/options in place, or append it under
    /// the given id when absent. Edit and add share this one path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn upsert(
        &mut self,
        image: ImageId,
        id: OpId,
        kind: OperationKind,
    ) -> Result<(), StoreError> {
        let next = self
            .pipeline(image)?
            .apply(&PipelineAction::Upsert { id, kind })?;
        self.commit(image, next);
        // Keep the allocator ahead of externally supplied ids.
        if id.0 >= self.next_op {
            self.next_op = id.0 + 1;
        }
        Ok(())
    }

    /// Delete an operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] for an unknown image and
    /// [`StoreError::OperationNotFound`] for an unknown operation; in
    /// both cases the store is unchanged.
    pub fn remove(&mut self, image: ImageId, id: OpId) -> Result<(), StoreError> {
        let next = self
            .pipeline(image)?
            .apply(&PipelineAction::Remove { id })?;
        self.commit(image, next);
        Ok(())
    }

    /// Recompute every `active` flag relative to one operation's index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] for an unknown image and
    /// [`StoreError::OperationNotFound`] for an unknown operation.
    pub fn toggle(&mut self, image: ImageId, id: OpId, checked: bool) -> Result<(), StoreError> {
        let next = self
            .pipeline(image)?
            .apply(&PipelineAction::Toggle { id, checked })?;
        self.commit(image, next);
        Ok(())
    }

    /// Append a copy of every operation in `source`'s pipeline to
    /// `target`'s, each under a freshly generated id.
    ///
    /// Returns the ids assigned to the copies, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if either image is unknown;
    /// the target is unchanged on error.
    pub fn copy_from(
        &mut self,
        source: ImageId,
        target: ImageId,
    ) -> Result<Vec<OpId>, StoreError> {
        let copied: Vec<Operation> = self.pipeline(source)?.operations().to_vec();
        // Validate the target before allocating any ids.
        let mut next = self.pipeline(target)?.clone();

        let mut ids = Vec::with_capacity(copied.len());
        for op in copied {
            let id = OpId(self.next_op + ids.len() as u64);
            next = next.apply(&PipelineAction::Append {
                id,
                kind: op.kind,
            })?;
            // Append marks the copy active; carry the source flag over.
            if let Some(last) = next.operations.last_mut() {
                last.active = op.active;
            }
            ids.push(id);
        }
        self.next_op += ids.len() as u64;
        self.commit(target, next);
        Ok(ids)
    }

    /// Replace an image's pipeline wholesale, preserving the given ids
    /// (bundle import path).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImageNotFound`] if the image is unknown.
    pub fn restore(
        &mut self,
        image: ImageId,
        operations: Vec<Operation>,
    ) -> Result<(), StoreError> {
        if !self.pipelines.contains_key(&image) {
            return Err(StoreError::ImageNotFound(image));
        }
        if let Some(max_id) = operations.iter().map(|op| op.id.0).max() {
            self.next_op = self.next_op.max(max_id + 1);
        }
        self.commit(image, Pipeline { operations });
        Ok(())
    }

    fn peek_id(&self, image: ImageId) -> Result<OpId, StoreError> {
        // Validates the image before the id is consumed.
        self.pipeline(image)?;
        Ok(OpId(self.next_op))
    }

    fn commit(&mut self, image: ImageId, pipeline: Pipeline) {
        self.pipelines.insert(image, pipeline);
    }
}
