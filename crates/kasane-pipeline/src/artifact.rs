//! The values flowing between pipeline steps: full raster images and
//! binary masks.
//!
//! Every operation consumes and produces an [`Artifact`]. Most operations
//! work on full rasters; thresholding produces a [`Artifact::Mask`] and the
//! morphological operators require one. [`ArtifactClass`] is the
//! declarative half of that contract, used to reject mismatched inputs
//! before any pixel work happens.

use std::fmt;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Color model of a raster image, as exposed in image metadata and
/// targeted by the convert-color operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorModel {
    /// Single luminance channel.
    Grey,
    /// Luminance plus alpha.
    GreyAlpha,
    /// Three color channels.
    Rgb,
    /// Three color channels plus alpha.
    Rgba,
}

impl ColorModel {
    /// Number of channels in this color model.
    #[must_use]
    pub const fn channel_count(self) -> u8 {
        match self {
            Self::Grey => 1,
            Self::GreyAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

impl fmt::Display for ColorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grey => f.write_str("grey"),
            Self::GreyAlpha => f.write_str("grey-alpha"),
            Self::Rgb => f.write_str("rgb"),
            Self::Rgba => f.write_str("rgba"),
        }
    }
}

/// Bit depth of a raster image's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BitDepth {
    /// 8 bits per sample.
    Eight,
    /// 16 bits per sample.
    Sixteen,
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eight => f.write_str("8-bit"),
            Self::Sixteen => f.write_str("16-bit"),
        }
    }
}

/// Static metadata recorded when a source image is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per sample.
    pub bit_depth: BitDepth,
    /// Number of channels.
    pub channels: u8,
    /// Color model.
    pub color_model: ColorModel,
}

impl ImageMeta {
    /// Derive metadata from a decoded image.
    ///
    /// Floating-point sample formats are classified as 16-bit since the
    /// pipeline's convert-bit-depth operation only distinguishes 8 from
    /// deeper-than-8.
    #[must_use]
    pub fn of(image: &DynamicImage) -> Self {
        use image::ColorType;

        let (color_model, bit_depth) = match image.color() {
            ColorType::L8 => (ColorModel::Grey, BitDepth::Eight),
            ColorType::La8 => (ColorModel::GreyAlpha, BitDepth::Eight),
            ColorType::Rgb8 => (ColorModel::Rgb, BitDepth::Eight),
            ColorType::Rgba8 => (ColorModel::Rgba, BitDepth::Eight),
            ColorType::L16 => (ColorModel::Grey, BitDepth::Sixteen),
            ColorType::La16 => (ColorModel::GreyAlpha, BitDepth::Sixteen),
            ColorType::Rgb16 => (ColorModel::Rgb, BitDepth::Sixteen),
            ColorType::Rgba16 => (ColorModel::Rgba, BitDepth::Sixteen),
            other => {
                let model = if other.channel_count() == 3 {
                    ColorModel::Rgb
                } else {
                    ColorModel::Rgba
                };
                (model, BitDepth::Sixteen)
            }
        };

        Self {
            width: image.width(),
            height: image.height(),
            bit_depth,
            channels: color_model.channel_count(),
            color_model,
        }
    }
}

/// An immutable decoded source image plus its static metadata.
///
/// Created once per loaded file and never mutated afterwards; the
/// executor borrows it on every run and never writes through it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    artifact: Artifact,
    meta: ImageMeta,
}

impl SourceImage {
    /// Wrap a decoded image.
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        let meta = ImageMeta::of(&image);
        Self {
            artifact: Artifact::Raster(image),
            meta,
        }
    }

    /// The source as the artifact fed into the first pipeline step.
    #[must_use]
    pub const fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Static metadata recorded at load time.
    #[must_use]
    pub const fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    /// Source dimensions in pixels.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }
}

/// Whether an artifact (or an operation's input/output contract) is a
/// full raster image or a binary mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactClass {
    /// A full raster image in any color model and bit depth.
    Raster,
    /// A single-channel binary mask (pixels are 0 or 255).
    Mask,
}

impl fmt::Display for ArtifactClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => f.write_str("raster"),
            Self::Mask => f.write_str("mask"),
        }
    }
}

/// The value produced by one pipeline step and consumed by the next.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// A full raster image.
    Raster(DynamicImage),
    /// A binary mask produced by thresholding (pixels are 0 or 255).
    Mask(GrayImage),
}

impl Artifact {
    /// Which class this artifact belongs to.
    #[must_use]
    pub const fn class(&self) -> ArtifactClass {
        match self {
            Self::Raster(_) => ArtifactClass::Raster,
            Self::Mask(_) => ArtifactClass::Mask,
        }
    }

    /// Dimensions in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Raster(image) => (image.width(), image.height()),
            Self::Mask(mask) => (mask.width(), mask.height()),
        }
    }

    /// The mask, if this artifact is one.
    #[must_use]
    pub const fn as_mask(&self) -> Option<&GrayImage> {
        match self {
            Self::Raster(_) => None,
            Self::Mask(mask) => Some(mask),
        }
    }

    /// The raster image, if this artifact is one.
    #[must_use]
    pub const fn as_raster(&self) -> Option<&DynamicImage> {
        match self {
            Self::Raster(image) => Some(image),
            Self::Mask(_) => None,
        }
    }
}

// `DynamicImage` comparison goes through the raw sample bytes so equality
// holds exactly when the decoded pixel data is bit-identical.
impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raster(a), Self::Raster(b)) => {
                a.color() == b.color()
                    && a.width() == b.width()
                    && a.height() == b.height()
                    && a.as_bytes() == b.as_bytes()
            }
            (Self::Mask(a), Self::Mask(b)) => a == b,
            _ => false,
        }
    }
}
