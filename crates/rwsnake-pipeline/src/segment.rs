//! Segmentation adapter: hands seeds to an external engine and checks
//! what comes back.
//!
//! The solver itself is not part of this crate. Anything implementing
//! [`Segmenter`] can be plugged in, including plain closures, which keeps
//! the rest of the pipeline testable with trivial stand-ins.

use image::Luma;

use crate::config::{MaskLimit, SegmentationParameters};
use crate::seeds::SeedBundle;
use crate::types::{BACKGROUND, Dimensions, GrayImage, OBJECT, PipelineError, SeedRole};

/// Errors reported by a segmentation engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmenterError {
    /// The solver hit its iteration cap without reaching the threshold.
    #[error("solver did not converge after {iterations} iterations")]
    NotConverged {
        /// Iterations performed before giving up.
        iterations: u32,
    },

    /// The engine rejected the seeds it was given.
    #[error("seeds rejected: {0}")]
    InvalidSeeds(String),

    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

impl From<SegmenterError> for PipelineError {
    fn from(err: SegmenterError) -> Self {
        Self::SegmentationFailed(err.to_string())
    }
}

/// A seeded binary segmentation engine.
///
/// Given the source image and a [`SeedBundle`], returns a label mask of
/// the image dimensions whose non-zero pixels are the object.
pub trait Segmenter {
    /// Segment `image` starting from `seeds`.
    ///
    /// # Errors
    ///
    /// Returns a [`SegmenterError`] when the engine cannot produce a
    /// label mask.
    fn segment(
        &self,
        image: &GrayImage,
        seeds: &SeedBundle,
        params: &SegmentationParameters,
    ) -> Result<GrayImage, SegmenterError>;
}

impl<F> Segmenter for F
where
    F: Fn(&GrayImage, &SeedBundle, &SegmentationParameters) -> Result<GrayImage, SegmenterError>,
{
    fn segment(
        &self,
        image: &GrayImage,
        seeds: &SeedBundle,
        params: &SegmentationParameters,
    ) -> Result<GrayImage, SegmenterError> {
        self(image, seeds, params)
    }
}

/// Run `engine` and normalize its label mask.
///
/// Every non-zero pixel of the engine output becomes [`OBJECT`]. With
/// [`MaskLimit::Seeds`], object pixels inside the background seed are
/// cleared.
///
/// # Errors
///
/// Returns [`PipelineError::SegmentationFailed`] if `image` does not
/// match the seed dimensions, if the engine fails, or if the returned
/// mask has the wrong dimensions. The engine is called at most once.
pub fn segment<S: Segmenter + ?Sized>(
    engine: &S,
    image: &GrayImage,
    seeds: &SeedBundle,
    params: &SegmentationParameters,
) -> Result<GrayImage, PipelineError> {
    let expected = seeds.dimensions();
    let actual = Dimensions::of(image);
    if actual != expected {
        return Err(PipelineError::SegmentationFailed(format!(
            "image is {actual} but seeds are {expected}"
        )));
    }

    let labels = engine.segment(image, seeds, params).map_err(|e| {
        log::debug!("segmentation engine failed: {e}");
        PipelineError::from(e)
    })?;

    let returned = Dimensions::of(&labels);
    if returned != expected {
        return Err(PipelineError::SegmentationFailed(format!(
            "engine returned a {returned} mask for a {expected} image"
        )));
    }

    let background = seeds.get(SeedRole::Background);
    let limit = params.mask_limit;
    Ok(GrayImage::from_fn(expected.width, expected.height, |x, y| {
        let object = labels.get_pixel(x, y).0[0] != BACKGROUND;
        let clipped = limit == MaskLimit::Seeds && background.get_pixel(x, y).0[0] != BACKGROUND;
        if object && !clipped {
            Luma([OBJECT])
        } else {
            Luma([BACKGROUND])
        }
    }))
}
