//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::refine`], which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use rwsnake_pipeline::{Contour, Pipeline, PipelineError, SegmentationParameters};
//! # use rwsnake_pipeline::segment::Segmenter;
//! # fn run(contour: Contour, image: &image::DynamicImage, engine: &impl Segmenter)
//! #     -> Result<(), PipelineError> {
//! let refined = Pipeline::new(contour, image, SegmentationParameters::default())
//!     .rasterize()?
//!     .propagate()?
//!     .segment(engine)?
//!     .clean()
//!     .extract()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the intermediates later
//! stages or the caller still need. The caller can inspect the current
//! stage's output via accessor methods at any point.

use image::DynamicImage;

use crate::config::SegmentationParameters;
use crate::diagnostics::StageMetrics;
use crate::outline::Outline;
use crate::seeds::SeedBundle;
use crate::segment::Segmenter;
use crate::types::{
    Contour, Dimensions, GrayImage, PipelineError, RgbImage, SeedRole, count_object_pixels,
};

/// Sampling step, in border points, used when extracting the refined
/// contour with [`Cleaned::extract`].
pub const TRACKING_STEP: usize = 2;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`rasterize`](Self::rasterize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .rasterize() to continue"]
pub struct Pending {
    params: SegmentationParameters,
    contour: Contour,
    image: GrayImage,
}

impl Pending {
    /// The contour being refined.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.contour
    }

    /// The 8-bit grayscale source image.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    /// The parameters for this run.
    #[must_use]
    pub const fn params(&self) -> &SegmentationParameters {
        &self.params
    }

    /// Validate the parameters, rasterize the contour and advance to the
    /// [`Rasterized`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the parameters fail
    /// [`SegmentationParameters::validate`] and
    /// [`PipelineError::InvalidGeometry`] if the contour cannot be
    /// rasterized.
    pub fn rasterize(self) -> Result<Rasterized, PipelineError> {
        self.params.validate()?;
        let dimensions = Dimensions::of(&self.image);
        let mask = crate::raster::rasterize(&self.contour, dimensions)?;
        log::debug!(
            "contour {} rasterized to {} object pixels on {dimensions}",
            self.contour.id(),
            count_object_pixels(&mask)
        );
        Ok(Rasterized {
            params: self.params,
            contour: self.contour,
            image: self.image,
            dimensions,
            mask,
        })
    }
}

// ───────────────────────── Stage 1: Rasterized ───────────────────────

/// Pipeline state after rasterizing the input contour.
///
/// Call [`propagate`](Self::propagate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .propagate() to continue"]
pub struct Rasterized {
    params: SegmentationParameters,
    contour: Contour,
    image: GrayImage,
    dimensions: Dimensions,
    mask: GrayImage,
}

impl Rasterized {
    /// The binary object mask of the input contour.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Derive seeds and advance to the [`Propagated`] stage.
    ///
    /// The seed composite is rendered here when
    /// [`SegmentationParameters::show_seeds`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateSeed`] if shrinking or
    /// expanding empties a seed.
    pub fn propagate(self) -> Result<Propagated, PipelineError> {
        let seeds = crate::seeds::propagate(
            &self.mask,
            self.params.shrink_distance,
            self.params.expand_distance,
        )?;
        log::debug!(
            "seeds: {} foreground, {} background, {} unassigned",
            count_object_pixels(seeds.get(SeedRole::Foreground)),
            count_object_pixels(seeds.get(SeedRole::Background)),
            seeds.unassigned_count()
        );
        let composite = self
            .params
            .show_seeds
            .then(|| seeds.composite(&self.image));
        Ok(Propagated {
            params: self.params,
            contour: self.contour,
            image: self.image,
            dimensions: self.dimensions,
            seeds,
            composite,
        })
    }
}

// ───────────────────────── Stage 2: Propagated ───────────────────────

/// Pipeline state after seed propagation.
///
/// Call [`segment`](Self::segment) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Propagated {
    params: SegmentationParameters,
    contour: Contour,
    image: GrayImage,
    dimensions: Dimensions,
    seeds: SeedBundle,
    composite: Option<RgbImage>,
}

impl Propagated {
    /// The seed bundle handed to the engine.
    #[must_use]
    pub const fn seeds(&self) -> &SeedBundle {
        &self.seeds
    }

    /// The seed composite, if the parameters asked for it.
    #[must_use]
    pub const fn composite(&self) -> Option<&RgbImage> {
        self.composite.as_ref()
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Run the segmentation engine and advance to the [`Segmented`]
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SegmentationFailed`] if the engine fails
    /// or returns a mask of the wrong size.
    pub fn segment<S: Segmenter + ?Sized>(self, engine: &S) -> Result<Segmented, PipelineError> {
        let label_mask = crate::segment::segment(engine, &self.image, &self.seeds, &self.params)?;
        log::debug!(
            "engine labeled {} object pixels",
            count_object_pixels(&label_mask)
        );
        Ok(Segmented {
            params: self.params,
            contour: self.contour,
            dimensions: self.dimensions,
            seeds: self.seeds,
            composite: self.composite,
            label_mask,
        })
    }
}

// ───────────────────────── Stage 3: Segmented ────────────────────────

/// Pipeline state after segmentation.
///
/// Call [`clean`](Self::clean) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .clean() to continue"]
pub struct Segmented {
    params: SegmentationParameters,
    contour: Contour,
    dimensions: Dimensions,
    seeds: SeedBundle,
    composite: Option<RgbImage>,
    label_mask: GrayImage,
}

impl Segmented {
    /// The normalized engine output.
    #[must_use]
    pub const fn label_mask(&self) -> &GrayImage {
        &self.label_mask
    }

    /// Post-filter the label mask (when enabled) and advance to the
    /// [`Cleaned`] stage.
    pub fn clean(self) -> Cleaned {
        let cleaned = crate::filter::clean(&self.label_mask, self.params.clean);
        Cleaned {
            params: self.params,
            contour: self.contour,
            dimensions: self.dimensions,
            seeds: self.seeds,
            composite: self.composite,
            label_mask: self.label_mask,
            cleaned,
        }
    }
}

// ───────────────────────── Stage 4: Cleaned ──────────────────────────

/// Pipeline state after post-filtering.
///
/// Call [`extract`](Self::extract) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .extract() to continue"]
pub struct Cleaned {
    params: SegmentationParameters,
    contour: Contour,
    dimensions: Dimensions,
    seeds: SeedBundle,
    composite: Option<RgbImage>,
    label_mask: GrayImage,
    cleaned: GrayImage,
}

impl Cleaned {
    /// The label mask after post-filtering. Equal to the engine output
    /// when cleaning is disabled.
    #[must_use]
    pub const fn cleaned(&self) -> &GrayImage {
        &self.cleaned
    }

    /// Extract the refined contour with [`TRACKING_STEP`] sampling.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoContourFound`] if the cleaned mask has
    /// no usable object outline.
    pub fn extract(self) -> Result<Extracted, PipelineError> {
        self.extract_with_step(TRACKING_STEP)
    }

    /// Extract the refined contour, keeping every `step`-th border point.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if `step` is zero and
    /// [`PipelineError::NoContourFound`] if the cleaned mask has no
    /// usable object outline.
    pub fn extract_with_step(self, step: usize) -> Result<Extracted, PipelineError> {
        let candidates: Vec<Outline> = crate::outline::outlines(&self.cleaned, step)?;
        let candidate_count = candidates.len();
        let refined = crate::outline::select(candidates, self.contour.id())?;
        Ok(Extracted {
            dimensions: self.dimensions,
            input_point_count: self.contour.len(),
            seeds: self.seeds,
            composite: self.composite,
            label_mask: self.label_mask,
            cleaned: self.cleaned,
            clean_enabled: self.params.clean,
            refined,
            candidate_count,
            step,
        })
    }
}

// ───────────────────────── Stage 5: Extracted ────────────────────────

/// Pipeline state after extracting the refined contour.
///
/// This is the final stage. Use [`contour`](Self::contour) to inspect
/// the result, or [`into_result`](Self::into_result) to take every
/// retained intermediate.
#[must_use = "call .into_result() or .into_contour() to take the refined contour"]
pub struct Extracted {
    dimensions: Dimensions,
    input_point_count: usize,
    seeds: SeedBundle,
    composite: Option<RgbImage>,
    label_mask: GrayImage,
    cleaned: GrayImage,
    clean_enabled: bool,
    refined: Contour,
    candidate_count: usize,
    step: usize,
}

impl Extracted {
    /// The refined contour.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.refined
    }

    /// Number of candidate outlines the cleaned mask produced.
    #[must_use]
    pub const fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    /// Consume the pipeline and return only the refined contour.
    #[must_use]
    pub fn into_contour(self) -> Contour {
        self.refined
    }

    /// Consume the pipeline and return every retained intermediate.
    #[must_use]
    pub fn into_result(self) -> RefineResult {
        RefineResult {
            contour: self.refined,
            dimensions: self.dimensions,
            seeds: self.seeds,
            label_mask: self.label_mask,
            cleaned_mask: self.cleaned,
            composite: self.composite,
        }
    }
}

/// Everything a completed refinement produced.
#[derive(Debug, Clone)]
pub struct RefineResult {
    /// The refined contour, carrying the input identity.
    pub contour: Contour,
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Seeds handed to the engine.
    pub seeds: SeedBundle,
    /// Normalized engine output.
    pub label_mask: GrayImage,
    /// Label mask after post-filtering.
    pub cleaned_mask: GrayImage,
    /// Seed composite, when requested.
    pub composite: Option<RgbImage>,
}

// ─────────────────────── PipelineStage trait ─────────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every pipeline stage so diagnostics can treat
/// them uniformly.
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"source"`, `"clean"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Extracted).
    const INDEX: usize;

    /// Metrics describing this stage's output.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Source {
            vertex_count: self.contour.len(),
            width: self.image.width(),
            height: self.image.height(),
        }
    }
}

impl PipelineStage for Rasterized {
    const NAME: &str = "rasterize";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Rasterize {
            object_pixels: count_object_pixels(&self.mask),
            total_pixels: self.dimensions.pixel_count(),
        }
    }
}

impl PipelineStage for Propagated {
    const NAME: &str = "propagate";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Propagate {
            shrink_distance: self.params.shrink_distance,
            expand_distance: self.params.expand_distance,
            foreground_pixels: count_object_pixels(self.seeds.get(SeedRole::Foreground)),
            background_pixels: count_object_pixels(self.seeds.get(SeedRole::Background)),
            unassigned_pixels: self.seeds.unassigned_count(),
        }
    }
}

impl PipelineStage for Segmented {
    const NAME: &str = "segment";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Segment {
            mask_limit: self.params.mask_limit.to_string(),
            object_pixels: count_object_pixels(&self.label_mask),
        }
    }
}

impl PipelineStage for Cleaned {
    const NAME: &str = "clean";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Clean {
            enabled: self.params.clean,
            pixels_before: count_object_pixels(&self.label_mask),
            pixels_after: count_object_pixels(&self.cleaned),
        }
    }
}

impl PipelineStage for Extracted {
    const NAME: &str = "extract";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Extract {
            step: self.step,
            candidate_count: self.candidate_count,
            input_points: self.input_point_count,
            output_points: self.refined.len(),
            clean_enabled: self.clean_enabled,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental contour refinement pipeline.
///
/// Created via [`Pipeline::new`], which stores the contour, image and
/// parameters without doing any processing. The caller then chains
/// stage methods to advance through the pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a contour, a source image of any pixel
    /// format, and parameters.
    ///
    /// The image is converted to 8-bit grayscale; nothing else happens
    /// until [`.rasterize()`](Pending::rasterize) is called.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(contour: Contour, image: &DynamicImage, params: SegmentationParameters) -> Pending {
        Self::from_gray(contour, image.to_luma8(), params)
    }

    /// Create a new pipeline from an image that is already 8-bit
    /// grayscale.
    pub const fn from_gray(
        contour: Contour,
        image: GrayImage,
        params: SegmentationParameters,
    ) -> Pending {
        Pending {
            params,
            contour,
            image,
        }
    }
}
