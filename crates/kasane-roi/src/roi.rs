//! ROI records and the columns they expose to sorting and filtering.
//!
//! A [`Roi`] is a connected-component record extracted from a binary
//! mask, carrying the geometric descriptors the surrounding application
//! tabulates. Records are immutable once extracted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates (pixel corners, so values may land
/// on integer grid lines).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiPoint {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl RoiPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One connected-component record with its geometric descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Sequential id within one extraction (0-based, largest surface
    /// first).
    pub id: u32,
    /// Leftmost column of the bounding box.
    pub column: u32,
    /// Topmost row of the bounding box.
    pub row: u32,
    /// Bounding box width in pixels.
    pub width: u32,
    /// Bounding box height in pixels.
    pub height: u32,
    /// Number of foreground pixels.
    pub surface: u32,
    /// Exposed pixel-side count along the component boundary.
    pub perimeter: f64,
    /// Minimum caliper width over the convex hull.
    pub feret_min: f64,
    /// Maximum caliper width over the convex hull.
    pub feret_max: f64,
    /// `feret_min / feret_max`.
    pub aspect_ratio: f64,
    /// `4·surface / (π·feret_max²)`; 1.0 for a disc.
    pub roundness: f64,
    /// `surface / convex hull area`; 1.0 for a convex shape.
    pub solidity: f64,
    /// `2·√(π·surface) / perimeter`; 1.0 for a disc.
    pub sphericity: f64,
    /// `surface / (surface + enclosed holes)`; 1.0 for a hole-free
    /// shape.
    pub fill_ratio: f64,
    /// Convex hull vertices in order (pixel corner coordinates).
    pub convex_hull: Vec<RoiPoint>,
    /// Corners of the minimal (rotated) bounding rectangle.
    pub min_bounding_rect: [RoiPoint; 4],
}

/// The filterable numeric columns of a [`Roi`].
///
/// Used both for the visible-column preference set and to key range
/// filters; the kebab-case serde names are the persistence format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoiColumn {
    /// Sequential id.
    Id,
    /// Bounding box left column.
    Column,
    /// Bounding box top row.
    Row,
    /// Bounding box width.
    Width,
    /// Bounding box height.
    Height,
    /// Foreground pixel count.
    Surface,
    /// Boundary length.
    Perimeter,
    /// Minimum Feret diameter.
    FeretMin,
    /// Maximum Feret diameter.
    FeretMax,
    /// Feret min/max ratio.
    AspectRatio,
    /// Disc-likeness by Feret diameter.
    Roundness,
    /// Convexity measure.
    Solidity,
    /// Disc-likeness by perimeter.
    Sphericity,
    /// Hole-freeness measure.
    FillRatio,
}

impl RoiColumn {
    /// Every column, in display order.
    pub const ALL: [Self; 14] = [
        Self::Id,
        Self::Column,
        Self::Row,
        Self::Width,
        Self::Height,
        Self::Surface,
        Self::Perimeter,
        Self::FeretMin,
        Self::FeretMax,
        Self::AspectRatio,
        Self::Roundness,
        Self::Solidity,
        Self::Sphericity,
        Self::FillRatio,
    ];

    /// The record's value for this column.
    #[must_use]
    pub fn value(self, roi: &Roi) -> f64 {
        match self {
            Self::Id => f64::from(roi.id),
            Self::Column => f64::from(roi.column),
            Self::Row => f64::from(roi.row),
            Self::Width => f64::from(roi.width),
            Self::Height => f64::from(roi.height),
            Self::Surface => f64::from(roi.surface),
            Self::Perimeter => roi.perimeter,
            Self::FeretMin => roi.feret_min,
            Self::FeretMax => roi.feret_max,
            Self::AspectRatio => roi.aspect_ratio,
            Self::Roundness => roi.roundness,
            Self::Solidity => roi.solidity,
            Self::Sphericity => roi.sphericity,
            Self::FillRatio => roi.fill_ratio,
        }
    }

    /// Stable kebab-case name, matching the serde representation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Column => "column",
            Self::Row => "row",
            Self::Width => "width",
            Self::Height => "height",
            Self::Surface => "surface",
            Self::Perimeter => "perimeter",
            Self::FeretMin => "feret-min",
            Self::FeretMax => "feret-max",
            Self::AspectRatio => "aspect-ratio",
            Self::Roundness => "roundness",
            Self::Solidity => "solidity",
            Self::Sphericity => "sphericity",
            Self::FillRatio => "fill-ratio",
        }
    }
}

impl fmt::Display for RoiColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
