//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`refine_with_diagnostics`] runs the whole
//! pipeline; [`seeds_with_diagnostics`] stops after seed propagation so
//! shrink/expand settings can be explored without an engine.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps come from a caller-supplied [`Clock`]; [`WebClock`] uses
//! the `web-time` crate, which maps to `performance.now()` on WASM and
//! `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::SegmentationParameters;
use crate::pipeline::{Pipeline, PipelineStage, Propagated, RefineResult};
use crate::segment::Segmenter;
use crate::types::{Contour, ContourId, Dimensions, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single refinement run.
///
/// Stages after seed propagation are `None` when the run stopped before
/// reaching them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineDiagnostics {
    /// Stage 0: pipeline inputs and grayscale conversion.
    pub source: StageDiagnostics,
    /// Stage 1: contour rasterization.
    pub rasterize: StageDiagnostics,
    /// Stage 2: seed propagation.
    pub propagate: StageDiagnostics,
    /// Stage 3: segmentation engine call.
    pub segment: Option<StageDiagnostics>,
    /// Stage 4: label mask post-filter.
    pub clean: Option<StageDiagnostics>,
    /// Stage 5: contour extraction.
    pub extract: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: RefineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Pipeline inputs, before any processing.
    Source {
        /// Vertices in the input contour.
        vertex_count: usize,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Contour rasterization metrics.
    Rasterize {
        /// Object pixels in the rasterized mask.
        object_pixels: u64,
        /// Total pixel count of the image.
        total_pixels: u64,
    },
    /// Seed propagation metrics.
    Propagate {
        /// Erosion distance for the foreground seed.
        shrink_distance: u8,
        /// Dilation distance for the background seed.
        expand_distance: u8,
        /// Pixels in the foreground seed.
        foreground_pixels: u64,
        /// Pixels in the background seed.
        background_pixels: u64,
        /// Pixels in neither seed.
        unassigned_pixels: u64,
    },
    /// Segmentation metrics.
    Segment {
        /// Mask limiting mode applied to the engine output.
        mask_limit: String,
        /// Object pixels in the normalized label mask.
        object_pixels: u64,
    },
    /// Post-filter metrics.
    Clean {
        /// Whether cleaning was enabled.
        enabled: bool,
        /// Object pixels before cleaning.
        pixels_before: u64,
        /// Object pixels after cleaning.
        pixels_after: u64,
    },
    /// Contour extraction metrics.
    Extract {
        /// Sampling step in border points.
        step: usize,
        /// Candidate outlines found in the mask.
        candidate_count: usize,
        /// Vertices in the input contour.
        input_points: usize,
        /// Vertices in the refined contour.
        output_points: usize,
        /// Whether the mask was cleaned before extraction.
        clean_enabled: bool,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineSummary {
    /// Identity of the contour being refined.
    pub contour_id: ContourId,
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Vertices in the input contour.
    pub input_points: usize,
    /// Vertices in the refined contour, if extraction ran.
    pub output_points: Option<usize>,
}

impl RefineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Refinement Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Contour {}: {}x{} image ({} pixels)",
            self.summary.contour_id,
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Source", &self.source),
            ("Rasterize", &self.rasterize),
            ("Propagate", &self.propagate),
        ];
        if let Some(ref s) = self.segment {
            stages.push(("Segment", s));
        }
        if let Some(ref c) = self.clean {
            stages.push(("Clean", c));
        }
        if let Some(ref e) = self.extract {
            stages.push(("Extract", e));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let output = self
            .summary
            .output_points
            .map_or_else(|| "-".to_owned(), |n| n.to_string());
        lines.push(format!(
            "Input points: {}  |  Refined points: {output}",
            self.summary.input_points,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Share of `part` in `total` as a percentage.
#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source {
            vertex_count,
            width,
            height,
        } => format!("{vertex_count} vertices on {width}x{height}"),
        StageMetrics::Rasterize {
            object_pixels,
            total_pixels,
        } => {
            format!(
                "{object_pixels} px ({:.1}%)",
                percent(*object_pixels, *total_pixels),
            )
        }
        StageMetrics::Propagate {
            shrink_distance,
            expand_distance,
            foreground_pixels,
            background_pixels,
            unassigned_pixels,
        } => {
            format!(
                "shrink={shrink_distance} expand={expand_distance} fg={foreground_pixels} bg={background_pixels} unassigned={unassigned_pixels}",
            )
        }
        StageMetrics::Segment {
            mask_limit,
            object_pixels,
        } => format!("limit={mask_limit} object={object_pixels} px"),
        StageMetrics::Clean {
            enabled,
            pixels_before,
            pixels_after,
        } => {
            if *enabled {
                format!("{pixels_before}->{pixels_after} px")
            } else {
                "disabled".to_owned()
            }
        }
        StageMetrics::Extract {
            step,
            candidate_count,
            input_points,
            output_points,
            clean_enabled,
        } => {
            let mask = if *clean_enabled { "cleaned" } else { "raw" };
            format!(
                "step={step} candidates={candidate_count} pts {input_points}->{output_points} ({mask} mask)",
            )
        }
    }
}

/// Time one stage transition and record the new stage's metrics.
fn timed<T, C, F>(clock: &C, advance: F) -> Result<(T, StageDiagnostics), PipelineError>
where
    T: PipelineStage,
    C: Clock,
    F: FnOnce() -> Result<T, PipelineError>,
{
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    Ok((stage, StageDiagnostics { duration, metrics }))
}

fn summary(
    contour: &Contour,
    dimensions: Dimensions,
    output_points: Option<usize>,
) -> RefineSummary {
    RefineSummary {
        contour_id: contour.id(),
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        input_points: contour.len(),
        output_points,
    }
}

/// Run rasterization and seed propagation, collecting diagnostics.
///
/// Returns the [`Propagated`] stage so the caller can inspect the seeds
/// or continue the pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidGeometry`] or
/// [`PipelineError::DegenerateSeed`] as the stages do.
pub fn seeds_with_diagnostics<C: Clock>(
    contour: &Contour,
    image: &DynamicImage,
    params: &SegmentationParameters,
    clock: &C,
) -> Result<(Propagated, RefineDiagnostics), PipelineError> {
    let start = clock.now();
    let (pending, source) = timed(clock, || {
        Ok(Pipeline::new(contour.clone(), image, params.clone()))
    })?;
    let (rasterized, rasterize) = timed(clock, || pending.rasterize())?;
    let (propagated, propagate) = timed(clock, || rasterized.propagate())?;
    let dimensions = propagated.dimensions();

    let diagnostics = RefineDiagnostics {
        source,
        rasterize,
        propagate,
        segment: None,
        clean: None,
        extract: None,
        total_duration: clock.elapsed(&start),
        summary: summary(contour, dimensions, None),
    };
    Ok((propagated, diagnostics))
}

/// Run the full refinement pipeline, collecting diagnostics.
///
/// # Errors
///
/// Returns the first [`PipelineError`] any stage produces.
pub fn refine_with_diagnostics<S, C>(
    contour: &Contour,
    image: &DynamicImage,
    params: &SegmentationParameters,
    engine: &S,
    clock: &C,
) -> Result<(RefineResult, RefineDiagnostics), PipelineError>
where
    S: Segmenter + ?Sized,
    C: Clock,
{
    let start = clock.now();
    let (pending, source) = timed(clock, || {
        Ok(Pipeline::new(contour.clone(), image, params.clone()))
    })?;
    let (rasterized, rasterize) = timed(clock, || pending.rasterize())?;
    let (propagated, propagate) = timed(clock, || rasterized.propagate())?;
    let (segmented, segment) = timed(clock, || propagated.segment(engine))?;
    let (cleaned, clean) = timed(clock, || Ok(segmented.clean()))?;
    let (extracted, extract) = timed(clock, || cleaned.extract())?;

    let result = extracted.into_result();
    let diagnostics = RefineDiagnostics {
        source,
        rasterize,
        propagate,
        segment: Some(segment),
        clean: Some(clean),
        extract: Some(extract),
        total_duration: clock.elapsed(&start),
        summary: summary(contour, result.dimensions, Some(result.contour.len())),
    };
    Ok((result, diagnostics))
}
