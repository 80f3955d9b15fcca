//! The operation registry: maps each [`OperationKind`] to its pixel
//! algorithm and enforces the input/output contract.
//!
//! Pixel math is delegated to the `image` and `imageproc` crates;
//! this module contributes only the dispatch, the parameter validation,
//! and thin glue where the ecosystem has no single call (pixelation,
//! gradient magnitude, per-channel box blur).
//!
//! [`apply`] is pure and synchronous. It never coerces a mismatched
//! input: an operation that requires a raster fails on a mask with
//! [`ApplyError::TypeMismatch`], and vice versa.

use image::{DynamicImage, GrayImage};
use imageproc::contrast::ThresholdType;
use imageproc::distance_transform::Norm;

use crate::artifact::{Artifact, ArtifactClass, BitDepth, ColorModel};
use crate::ops::{FlipDirection, OperationKind, Rotation, ThresholdPolarity};

/// Why an operation could not be applied.
///
/// These are step-local failures: the executor captures them in the run
/// outcome rather than propagating them as hard errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The operation was given the wrong class of artifact.
    #[error("{kind} requires a {expected} input, got {actual}")]
    TypeMismatch {
        /// Name of the offending operation kind.
        kind: &'static str,
        /// The class the kind accepts.
        expected: ArtifactClass,
        /// The class it was given.
        actual: ArtifactClass,
    },

    /// A kind-specific parameter violated its contract.
    #[error("invalid options for {kind}: {reason}")]
    InvalidOptions {
        /// Name of the offending operation kind.
        kind: &'static str,
        /// What was wrong with the options.
        reason: String,
    },
}

/// Apply one operation to an artifact.
///
/// # Errors
///
/// Returns [`ApplyError::TypeMismatch`] if the artifact's class does not
/// match the kind's declared input class, and
/// [`ApplyError::InvalidOptions`] if the kind's parameters are out of
/// contract (even median window, zero pixelate block, zero resize
/// dimension, non-finite sigma or contrast). Validation happens before
/// any pixel work.
pub fn apply(kind: &OperationKind, input: &Artifact) -> Result<Artifact, ApplyError> {
    let actual = input.class();
    let expected = kind.input_class();
    if actual != expected {
        return Err(ApplyError::TypeMismatch {
            kind: kind.name(),
            expected,
            actual,
        });
    }

    match (kind, input) {
        (OperationKind::Grey, Artifact::Raster(image)) => Ok(Artifact::Raster(image.grayscale())),

        (OperationKind::ConvertColor { model }, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(convert_color(image, *model)))
        }

        (OperationKind::ConvertBitDepth { depth }, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(convert_depth(image, *depth)))
        }

        (OperationKind::Blur { radius }, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(box_blur(image, *radius)))
        }

        (OperationKind::GaussianBlur { sigma }, Artifact::Raster(image)) => {
            if !sigma.is_finite() {
                return Err(invalid(kind, "sigma must be finite"));
            }
            if *sigma <= 0.0 {
                return Ok(Artifact::Raster(image.clone()));
            }
            Ok(Artifact::Raster(image.blur(*sigma)))
        }

        (OperationKind::Invert, Artifact::Raster(image)) => {
            let mut inverted = image.clone();
            inverted.invert();
            Ok(Artifact::Raster(inverted))
        }

        (OperationKind::Flip { direction }, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(match direction {
                FlipDirection::Horizontal => image.fliph(),
                FlipDirection::Vertical => image.flipv(),
            }))
        }

        (
            OperationKind::Level {
                brightness,
                contrast,
            },
            Artifact::Raster(image),
        ) => {
            if !contrast.is_finite() {
                return Err(invalid(kind, "contrast must be finite"));
            }
            Ok(Artifact::Raster(
                image.brighten(*brightness).adjust_contrast(*contrast),
            ))
        }

        (OperationKind::Pixelate { block_size }, Artifact::Raster(image)) => {
            if *block_size == 0 {
                return Err(invalid(kind, "block size must be at least 1"));
            }
            Ok(Artifact::Raster(pixelate(image, *block_size)))
        }

        (OperationKind::MedianFilter { size }, Artifact::Raster(image)) => {
            if *size % 2 == 0 {
                return Err(invalid(kind, format!("window size must be odd, got {size}")));
            }
            if *size < 3 {
                return Err(invalid(kind, format!("window size must be at least 3, got {size}")));
            }
            let radius = size / 2;
            let filtered = imageproc::filter::median_filter(&image.to_rgba8(), radius, radius);
            Ok(Artifact::Raster(DynamicImage::ImageRgba8(filtered)))
        }

        (OperationKind::Threshold { value, polarity }, Artifact::Raster(image)) => {
            let grey = image.to_luma8();
            let threshold_type = match polarity {
                ThresholdPolarity::Bright => ThresholdType::Binary,
                ThresholdPolarity::Dark => ThresholdType::BinaryInverted,
            };
            Ok(Artifact::Mask(imageproc::contrast::threshold(
                &grey,
                *value,
                threshold_type,
            )))
        }

        (OperationKind::Dilate { radius }, Artifact::Mask(mask)) => Ok(Artifact::Mask(
            imageproc::morphology::dilate(mask, Norm::LInf, *radius),
        )),

        (OperationKind::Erode { radius }, Artifact::Mask(mask)) => Ok(Artifact::Mask(
            imageproc::morphology::erode(mask, Norm::LInf, *radius),
        )),

        (OperationKind::Open { radius }, Artifact::Mask(mask)) => Ok(Artifact::Mask(
            imageproc::morphology::open(mask, Norm::LInf, *radius),
        )),

        (OperationKind::Close { radius }, Artifact::Mask(mask)) => Ok(Artifact::Mask(
            imageproc::morphology::close(mask, Norm::LInf, *radius),
        )),

        (
            OperationKind::Resize {
                width,
                height,
                filter,
            },
            Artifact::Raster(image),
        ) => {
            if *width == 0 || *height == 0 {
                return Err(invalid(kind, "target dimensions must be at least 1x1"));
            }
            Ok(Artifact::Raster(image.resize_exact(
                *width,
                *height,
                filter.to_image_filter(),
            )))
        }

        (OperationKind::Rotate { rotation }, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(match rotation {
                Rotation::Quarter => image.rotate90(),
                Rotation::Half => image.rotate180(),
                Rotation::ThreeQuarter => image.rotate270(),
            }))
        }

        (OperationKind::GradientFilter, Artifact::Raster(image)) => {
            Ok(Artifact::Raster(gradient_magnitude(image)))
        }

        // The class check above already rejected every mismatched pairing.
        (kind, input) => Err(ApplyError::TypeMismatch {
            kind: kind.name(),
            expected: kind.input_class(),
            actual: input.class(),
        }),
    }
}

fn invalid(kind: &OperationKind, reason: impl Into<String>) -> ApplyError {
    ApplyError::InvalidOptions {
        kind: kind.name(),
        reason: reason.into(),
    }
}

/// Convert to a target color model, keeping the current bit depth.
fn convert_color(image: &DynamicImage, model: ColorModel) -> DynamicImage {
    let sixteen = matches!(
        crate::artifact::ImageMeta::of(image).bit_depth,
        BitDepth::Sixteen
    );
    match (model, sixteen) {
        (ColorModel::Grey, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (ColorModel::Grey, true) => DynamicImage::ImageLuma16(image.to_luma16()),
        (ColorModel::GreyAlpha, false) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (ColorModel::GreyAlpha, true) => DynamicImage::ImageLumaA16(image.to_luma_alpha16()),
        (ColorModel::Rgb, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (ColorModel::Rgb, true) => DynamicImage::ImageRgb16(image.to_rgb16()),
        (ColorModel::Rgba, false) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (ColorModel::Rgba, true) => DynamicImage::ImageRgba16(image.to_rgba16()),
    }
}

/// Convert to a target bit depth, keeping the current color model.
fn convert_depth(image: &DynamicImage, depth: BitDepth) -> DynamicImage {
    let model = crate::artifact::ImageMeta::of(image).color_model;
    match (model, depth) {
        (ColorModel::Grey, BitDepth::Eight) => DynamicImage::ImageLuma8(image.to_luma8()),
        (ColorModel::Grey, BitDepth::Sixteen) => DynamicImage::ImageLuma16(image.to_luma16()),
        (ColorModel::GreyAlpha, BitDepth::Eight) => {
            DynamicImage::ImageLumaA8(image.to_luma_alpha8())
        }
        (ColorModel::GreyAlpha, BitDepth::Sixteen) => {
            DynamicImage::ImageLumaA16(image.to_luma_alpha16())
        }
        (ColorModel::Rgb, BitDepth::Eight) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (ColorModel::Rgb, BitDepth::Sixteen) => DynamicImage::ImageRgb16(image.to_rgb16()),
        (ColorModel::Rgba, BitDepth::Eight) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (ColorModel::Rgba, BitDepth::Sixteen) => DynamicImage::ImageRgba16(image.to_rgba16()),
    }
}

/// Box blur applied independently to each RGBA channel.
///
/// `imageproc::filter::box_filter` only accepts `GrayImage`, so the
/// image is split into four single-channel planes, filtered, and
/// reassembled. Radius 0 returns the input unchanged.
fn box_blur(image: &DynamicImage, radius: u32) -> DynamicImage {
    if radius == 0 {
        return image.clone();
    }

    let rgba = image.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([rgba.get_pixel(x, y).0[c]]))
    });
    let filtered: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::box_filter(&channels[c], radius, radius));

    DynamicImage::ImageRgba8(image::RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            filtered[0].get_pixel(x, y).0[0],
            filtered[1].get_pixel(x, y).0[0],
            filtered[2].get_pixel(x, y).0[0],
            filtered[3].get_pixel(x, y).0[0],
        ])
    }))
}

/// Nearest-neighbor downsample then upsample back to the original size.
fn pixelate(image: &DynamicImage, block_size: u32) -> DynamicImage {
    if block_size == 1 {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());
    let small_w = (w / block_size).max(1);
    let small_h = (h / block_size).max(1);
    image
        .resize_exact(small_w, small_h, image::imageops::FilterType::Nearest)
        .resize_exact(w, h, image::imageops::FilterType::Nearest)
}

/// Sobel gradient magnitude of the luminance channel, clamped to 8 bits.
fn gradient_magnitude(image: &DynamicImage) -> DynamicImage {
    let grey = image.to_luma8();
    let horizontal = imageproc::gradients::horizontal_sobel(&grey);
    let vertical = imageproc::gradients::vertical_sobel(&grey);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let magnitude = GrayImage::from_fn(grey.width(), grey.height(), |x, y| {
        let h = f64::from(horizontal.get_pixel(x, y).0[0]);
        let v = f64::from(vertical.get_pixel(x, y).0[0]);
        image::Luma([h.hypot(v).min(255.0) as u8])
    });
    DynamicImage::ImageLuma8(magnitude)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 10x10 RGB image, left half dark, right half light.
    fn split_rgb() -> Artifact {
        Artifact::Raster(DynamicImage::ImageRgb8(image::RgbImage::from_fn(
            10,
            10,
            |x, _y| {
                if x < 5 {
                    image::Rgb([20, 20, 20])
                } else {
                    image::Rgb([230, 230, 230])
                }
            },
        )))
    }

    /// 10x10 mask with a 4x4 foreground square at (3,3).
    fn square_mask() -> Artifact {
        let mut mask = GrayImage::new(10, 10);
        for y in 3..7 {
            for x in 3..7 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        Artifact::Mask(mask)
    }

    fn mask_foreground_count(artifact: &Artifact) -> usize {
        artifact
            .as_mask()
            .unwrap()
            .pixels()
            .filter(|p| p.0[0] == 255)
            .count()
    }

    #[test]
    fn grey_produces_single_channel() {
        let out = apply(&OperationKind::Grey, &split_rgb()).unwrap();
        let raster = out.as_raster().unwrap();
        assert_eq!(raster.color().channel_count(), 1);
        assert_eq!(raster.width(), 10);
    }

    #[test]
    fn threshold_produces_binary_mask() {
        let kind = OperationKind::Threshold {
            value: 128,
            polarity: ThresholdPolarity::Bright,
        };
        let out = apply(&kind, &split_rgb()).unwrap();
        assert_eq!(out.class(), ArtifactClass::Mask);
        let mask = out.as_mask().unwrap();
        for pixel in mask.pixels() {
            assert!(pixel.0[0] == 0 || pixel.0[0] == 255);
        }
        // The light half passes the threshold.
        assert_eq!(mask_foreground_count(&out), 50);
    }

    #[test]
    fn threshold_dark_polarity_inverts_selection() {
        let kind = OperationKind::Threshold {
            value: 128,
            polarity: ThresholdPolarity::Dark,
        };
        let out = apply(&kind, &split_rgb()).unwrap();
        assert_eq!(mask_foreground_count(&out), 50);
        // Foreground is now the dark half.
        assert_eq!(out.as_mask().unwrap().get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn morphology_on_raster_is_type_mismatch() {
        let result = apply(&OperationKind::Dilate { radius: 1 }, &split_rgb());
        assert!(matches!(
            result,
            Err(ApplyError::TypeMismatch {
                kind: "dilate",
                expected: ArtifactClass::Mask,
                actual: ArtifactClass::Raster,
            }),
        ));
    }

    #[test]
    fn blur_on_mask_is_type_mismatch() {
        let result = apply(&OperationKind::Blur { radius: 1 }, &square_mask());
        assert!(matches!(
            result,
            Err(ApplyError::TypeMismatch {
                kind: "blur",
                expected: ArtifactClass::Raster,
                actual: ArtifactClass::Mask,
            }),
        ));
    }

    #[test]
    fn dilate_grows_the_square() {
        let before = mask_foreground_count(&square_mask());
        let out = apply(&OperationKind::Dilate { radius: 1 }, &square_mask()).unwrap();
        assert!(mask_foreground_count(&out) > before);
    }

    #[test]
    fn erode_shrinks_the_square() {
        let before = mask_foreground_count(&square_mask());
        let out = apply(&OperationKind::Erode { radius: 1 }, &square_mask()).unwrap();
        assert!(mask_foreground_count(&out) < before);
    }

    #[test]
    fn open_removes_single_pixel_speck() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(1, 1, image::Luma([255]));
        let out = apply(&OperationKind::Open { radius: 1 }, &Artifact::Mask(mask)).unwrap();
        assert_eq!(mask_foreground_count(&out), 0);
    }

    #[test]
    fn even_median_window_is_invalid() {
        let result = apply(&OperationKind::MedianFilter { size: 4 }, &split_rgb());
        assert!(matches!(
            result,
            Err(ApplyError::InvalidOptions { kind: "median-filter", .. }),
        ));
    }

    #[test]
    fn tiny_median_window_is_invalid() {
        let result = apply(&OperationKind::MedianFilter { size: 1 }, &split_rgb());
        assert!(matches!(result, Err(ApplyError::InvalidOptions { .. })));
    }

    #[test]
    fn zero_pixelate_block_is_invalid() {
        let result = apply(&OperationKind::Pixelate { block_size: 0 }, &split_rgb());
        assert!(matches!(result, Err(ApplyError::InvalidOptions { .. })));
    }

    #[test]
    fn zero_resize_dimension_is_invalid() {
        let kind = OperationKind::Resize {
            width: 0,
            height: 10,
            filter: crate::ops::ResizeFilter::Nearest,
        };
        let result = apply(&kind, &split_rgb());
        assert!(matches!(result, Err(ApplyError::InvalidOptions { .. })));
    }

    #[test]
    fn non_finite_sigma_is_invalid() {
        let result = apply(
            &OperationKind::GaussianBlur { sigma: f32::NAN },
            &split_rgb(),
        );
        assert!(matches!(result, Err(ApplyError::InvalidOptions { .. })));
    }

    #[test]
    fn zero_sigma_is_identity() {
        let input = split_rgb();
        let out = apply(&OperationKind::GaussianBlur { sigma: 0.0 }, &input).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn zero_blur_radius_is_identity() {
        let input = split_rgb();
        let out = apply(&OperationKind::Blur { radius: 0 }, &input).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn invert_is_an_involution() {
        let input = split_rgb();
        let once = apply(&OperationKind::Invert, &input).unwrap();
        assert_ne!(once, input);
        let twice = apply(&OperationKind::Invert, &once).unwrap();
        assert_eq!(twice, input);
    }

    #[test]
    fn flip_horizontal_mirrors_columns() {
        let out = apply(
            &OperationKind::Flip {
                direction: FlipDirection::Horizontal,
            },
            &split_rgb(),
        )
        .unwrap();
        let raster = out.as_raster().unwrap().to_rgb8();
        // The dark half is now on the right.
        assert_eq!(raster.get_pixel(0, 0).0[0], 230);
        assert_eq!(raster.get_pixel(9, 0).0[0], 20);
    }

    #[test]
    fn rotate_quarter_swaps_dimensions() {
        let input = Artifact::Raster(DynamicImage::ImageRgb8(image::RgbImage::new(6, 4)));
        let out = apply(
            &OperationKind::Rotate {
                rotation: Rotation::Quarter,
            },
            &input,
        )
        .unwrap();
        assert_eq!(out.dimensions(), (4, 6));
    }

    #[test]
    fn resize_hits_exact_dimensions() {
        let kind = OperationKind::Resize {
            width: 5,
            height: 7,
            filter: crate::ops::ResizeFilter::Nearest,
        };
        let out = apply(&kind, &split_rgb()).unwrap();
        assert_eq!(out.dimensions(), (5, 7));
    }

    #[test]
    fn pixelate_produces_uniform_blocks() {
        let input = Artifact::Raster(DynamicImage::ImageRgb8(image::RgbImage::from_fn(
            8,
            8,
            |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 0]),
        )));
        let out = apply(&OperationKind::Pixelate { block_size: 4 }, &input).unwrap();
        let raster = out.as_raster().unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (8, 8));
        // Every pixel within a 4x4 block is identical.
        let reference = raster.get_pixel(0, 0);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(raster.get_pixel(x, y), reference);
            }
        }
    }

    #[test]
    fn gradient_of_flat_image_is_zero_inside() {
        let flat = Artifact::Raster(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([100, 100, 100]),
        )));
        let out = apply(&OperationKind::GradientFilter, &flat).unwrap();
        let raster = out.as_raster().unwrap().to_luma8();
        // Interior pixels see no intensity change.
        for y in 1..7 {
            for x in 1..7 {
                assert_eq!(raster.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn gradient_responds_to_the_boundary() {
        let out = apply(&OperationKind::GradientFilter, &split_rgb()).unwrap();
        let raster = out.as_raster().unwrap().to_luma8();
        assert!(raster.get_pixel(5, 5).0[0] > 0);
    }

    #[test]
    fn convert_color_to_rgba_adds_alpha() {
        let out = apply(
            &OperationKind::ConvertColor {
                model: ColorModel::Rgba,
            },
            &split_rgb(),
        )
        .unwrap();
        assert_eq!(out.as_raster().unwrap().color().channel_count(), 4);
    }

    #[test]
    fn convert_bit_depth_to_sixteen() {
        let out = apply(
            &OperationKind::ConvertBitDepth {
                depth: BitDepth::Sixteen,
            },
            &split_rgb(),
        )
        .unwrap();
        let meta = crate::artifact::ImageMeta::of(out.as_raster().unwrap());
        assert_eq!(meta.bit_depth, BitDepth::Sixteen);
        assert_eq!(meta.color_model, ColorModel::Rgb);
    }

    #[test]
    fn apply_is_deterministic() {
        let kind = OperationKind::GaussianBlur { sigma: 1.4 };
        let a = apply(&kind, &split_rgb()).unwrap();
        let b = apply(&kind, &split_rgb()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_options_reported_before_pixel_work() {
        // A 1x1 input would make median filtering fail in strange ways if
        // validation ran after the algorithm; the error must be about the
        // options, not the image.
        let tiny = Artifact::Raster(DynamicImage::ImageRgb8(image::RgbImage::new(1, 1)));
        let result = apply(&OperationKind::MedianFilter { size: 2 }, &tiny);
        assert!(matches!(
            result,
            Err(ApplyError::InvalidOptions { kind: "median-filter", .. }),
        ));
    }
}
