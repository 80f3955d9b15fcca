//! kasane-roi: region-of-interest analysis for binary masks (sans-IO).
//!
//! Extracts connected components from a mask produced by the pipeline,
//! computes their geometric descriptors (surface, Feret diameters,
//! convex hull, minimal bounding rectangle, fill ratio), and keeps a
//! sparse set of per-column range filters consistent as the user
//! adjusts bounds.

pub mod extract;
pub mod filter;
pub mod roi;
pub mod store;

pub use extract::{ExtractOptions, MaskPolarity, extract};
pub use filter::{Bounds, FilterSet, RoiFilter, column_bounds};
pub use roi::{Roi, RoiColumn, RoiPoint};
pub use store::RoiStore;
