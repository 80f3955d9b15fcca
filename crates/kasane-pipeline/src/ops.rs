//! The closed set of operation kinds and their per-kind options.
//!
//! [`OperationKind`] is a tagged union: each variant carries exactly the
//! options that kind needs, so a pipeline step serializes as one unit and
//! the registry's dispatch is exhaustively checked — adding a kind is a
//! compile error until every match arm is extended.
//!
//! The declarative half of the registry contract lives here:
//! [`input_class`](OperationKind::input_class) and
//! [`output_class`](OperationKind::output_class) say what kind of
//! [`Artifact`](crate::artifact::Artifact) each kind accepts and produces.
//! The executor uses these to refuse a step before any pixel work happens.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactClass, BitDepth, ColorModel};

/// Direction for the flip operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlipDirection {
    /// Mirror left-right.
    Horizontal,
    /// Mirror top-bottom.
    Vertical,
}

/// Clockwise quarter-turn rotations.
///
/// Arbitrary-angle rotation would resample; quarter turns are exact and
/// keep recomputes bit-deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    /// 90 degrees clockwise.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees clockwise.
    ThreeQuarter,
}

/// Resampling filter used by the resize operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest for photos.
    Lanczos3,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        Self::Triangle
    }
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    #[must_use]
    pub const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Which side of the threshold becomes mask foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdPolarity {
    /// Pixels above the threshold become foreground (255).
    #[default]
    Bright,
    /// Pixels at or below the threshold become foreground (255).
    Dark,
}

/// One named, parameterized transform step.
///
/// Serialization is internally tagged so a step round-trips through the
/// surrounding application's bundle format as a single
/// `{"type": "...", ...options}` unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperationKind {
    /// Convert to single-channel luminance, preserving bit depth.
    Grey,
    /// Convert to a target color model at the current bit depth.
    ConvertColor {
        /// Target color model.
        model: ColorModel,
    },
    /// Convert to a target bit depth, preserving the color model.
    ConvertBitDepth {
        /// Target bits per sample.
        depth: BitDepth,
    },
    /// Box blur with the given radius. Radius 0 is the identity.
    Blur {
        /// Kernel radius in pixels.
        radius: u32,
    },
    /// Gaussian blur. Non-positive sigma is the identity.
    GaussianBlur {
        /// Standard deviation of the Gaussian kernel.
        sigma: f32,
    },
    /// Invert every channel.
    Invert,
    /// Mirror the image along one axis.
    Flip {
        /// Axis to mirror along.
        direction: FlipDirection,
    },
    /// Brightness and contrast adjustment.
    Level {
        /// Additive brightness offset per channel.
        brightness: i32,
        /// Contrast adjustment; positive increases contrast.
        contrast: f32,
    },
    /// Downsample-then-upsample with nearest-neighbor, producing visible
    /// blocks of `block_size` pixels.
    Pixelate {
        /// Edge length of each block in pixels. Must be at least 1.
        block_size: u32,
    },
    /// Median filter over a square window.
    MedianFilter {
        /// Window width in pixels. Must be odd and at least 3.
        size: u32,
    },
    /// Global threshold on luminance, producing a binary mask.
    Threshold {
        /// Threshold value on the 8-bit luminance channel.
        value: u8,
        /// Which side of the threshold becomes foreground.
        #[serde(default)]
        polarity: ThresholdPolarity,
    },
    /// Morphological dilation of a mask.
    Dilate {
        /// Chebyshev radius of the structuring element.
        radius: u8,
    },
    /// Morphological erosion of a mask.
    Erode {
        /// Chebyshev radius of the structuring element.
        radius: u8,
    },
    /// Erosion followed by dilation (removes small foreground specks).
    Open {
        /// Chebyshev radius of the structuring element.
        radius: u8,
    },
    /// Dilation followed by erosion (closes small holes).
    Close {
        /// Chebyshev radius of the structuring element.
        radius: u8,
    },
    /// Resample to exact dimensions.
    Resize {
        /// Target width in pixels. Must be at least 1.
        width: u32,
        /// Target height in pixels. Must be at least 1.
        height: u32,
        /// Resampling filter.
        #[serde(default)]
        filter: ResizeFilter,
    },
    /// Exact quarter-turn rotation.
    Rotate {
        /// Amount of clockwise rotation.
        rotation: Rotation,
    },
    /// Sobel gradient magnitude of the luminance channel.
    GradientFilter,
}

impl OperationKind {
    /// Stable kebab-case name for display and reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Grey => "grey",
            Self::ConvertColor { .. } => "convert-color",
            Self::ConvertBitDepth { .. } => "convert-bit-depth",
            Self::Blur { .. } => "blur",
            Self::GaussianBlur { .. } => "gaussian-blur",
            Self::Invert => "invert",
            Self::Flip { .. } => "flip",
            Self::Level { .. } => "level",
            Self::Pixelate { .. } => "pixelate",
            Self::MedianFilter { .. } => "median-filter",
            Self::Threshold { .. } => "threshold",
            Self::Dilate { .. } => "dilate",
            Self::Erode { .. } => "erode",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Resize { .. } => "resize",
            Self::Rotate { .. } => "rotate",
            Self::GradientFilter => "gradient-filter",
        }
    }

    /// The artifact class this kind accepts.
    #[must_use]
    pub const fn input_class(&self) -> ArtifactClass {
        match self {
            Self::Dilate { .. } | Self::Erode { .. } | Self::Open { .. } | Self::Close { .. } => {
                ArtifactClass::Mask
            }
            _ => ArtifactClass::Raster,
        }
    }

    /// The artifact class this kind produces.
    #[must_use]
    pub const fn output_class(&self) -> ArtifactClass {
        match self {
            Self::Threshold { .. }
            | Self::Dilate { .. }
            | Self::Erode { .. }
            | Self::Open { .. }
            | Self::Close { .. } => ArtifactClass::Mask,
            _ => ArtifactClass::Raster,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
