//! rwsnake-pipeline: contour refinement by seeded segmentation (sans-IO).
//!
//! Turns a closed polygon outlining an object into a refined polygon
//! through:
//! rasterize -> seed propagation -> segmentation -> post-filter ->
//! contour extraction.
//!
//! The segmentation solver is supplied by the caller through the
//! [`Segmenter`] trait. This crate has **no I/O dependencies**: it
//! operates on in-memory images and returns structured data.

pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod outline;
pub mod pipeline;
pub mod raster;
pub mod seeds;
pub mod segment;
pub mod types;

pub use config::{ConfigValue, MaskLimit, RawConfig, SegmentationParameters, marshal};
pub use pipeline::{Pipeline, RefineResult, TRACKING_STEP};
pub use seeds::SeedBundle;
pub use segment::{Segmenter, SegmenterError};
pub use types::{Contour, ContourId, Dimensions, PipelineError, Point, SeedRole};

use image::DynamicImage;

/// Refine a contour against a source image.
///
/// The image may have any pixel format; it is converted to 8-bit
/// grayscale first. The returned contour carries the identity of
/// `contour`.
///
/// # Pipeline steps
///
/// 1. Rasterize the contour into an object mask
/// 2. Erode/dilate the mask into foreground and background seeds
/// 3. Run `engine` on the seeds
/// 4. Optionally clean the label mask (median, morphology, hole fill)
/// 5. Trace the largest object outline, sampled every
///    [`TRACKING_STEP`] border points
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `params` fail
/// [`SegmentationParameters::validate`],
/// [`PipelineError::InvalidGeometry`] if the contour cannot be
/// rasterized, [`PipelineError::DegenerateSeed`] if a seed ends up
/// empty, [`PipelineError::SegmentationFailed`] if the engine fails and
/// [`PipelineError::NoContourFound`] if the label mask has no usable
/// outline.
pub fn refine<S: Segmenter + ?Sized>(
    contour: &Contour,
    image: &DynamicImage,
    params: &SegmentationParameters,
    engine: &S,
) -> Result<Contour, PipelineError> {
    Ok(Pipeline::new(contour.clone(), image, params.clone())
        .rasterize()?
        .propagate()?
        .segment(engine)?
        .clean()
        .extract()?
        .into_contour())
}

/// [`refine`], then hand the refined contour to `on_complete`.
///
/// `on_complete` runs exactly once when refinement succeeds and never
/// when it fails.
///
/// # Errors
///
/// Returns the same errors as [`refine`].
pub fn refine_with<S, F>(
    contour: &Contour,
    image: &DynamicImage,
    params: &SegmentationParameters,
    engine: &S,
    on_complete: F,
) -> Result<Contour, PipelineError>
where
    S: Segmenter + ?Sized,
    F: FnOnce(&Contour),
{
    let refined = refine(contour, image, params, engine).inspect_err(|e| {
        log::debug!("refinement of contour {} failed: {e}", contour.id());
    })?;
    on_complete(&refined);
    Ok(refined)
}
