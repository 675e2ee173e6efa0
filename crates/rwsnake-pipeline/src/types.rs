//! Shared types for the contour refinement pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for the seed composite preview.
pub use image::RgbImage;

/// Pixel value marking object pixels in every mask produced here.
pub const OBJECT: u8 = 255;

/// Pixel value marking pixels outside the object.
pub const BACKGROUND: u8 = 0;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Z component of the cross product `(a - self) x (b - self)`.
    ///
    /// Zero when the three points are collinear.
    #[must_use]
    pub fn cross(self, a: Self, b: Self) -> f64 {
        (a.x - self.x).mul_add(b.y - self.y, -((a.y - self.y) * (b.x - self.x)))
    }
}

/// Identity token of a tracked object.
///
/// Carried unchanged from the input contour to the refined one so the
/// caller can update the same logical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContourId(pub u32);

impl fmt::Display for ContourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A closed polygon outlining one object.
///
/// The last point implicitly connects back to the first. Construction
/// guarantees at least three points that are not all collinear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContourData")]
pub struct Contour {
    id: ContourId,
    points: Vec<Point>,
}

/// Unvalidated serde shape of [`Contour`].
#[derive(Deserialize)]
struct ContourData {
    id: ContourId,
    points: Vec<Point>,
}

impl TryFrom<ContourData> for Contour {
    type Error = PipelineError;

    fn try_from(data: ContourData) -> Result<Self, Self::Error> {
        Self::new(data.id, data.points)
    }
}

impl Contour {
    /// Create a contour, validating its geometry.
    ///
    /// Repeated consecutive points are collapsed and an explicit closing
    /// point equal to the first point is dropped, since closure is
    /// implicit.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidGeometry`] if a coordinate is not
    /// finite, fewer than three points remain, or all points are
    /// collinear.
    pub fn new(id: ContourId, mut points: Vec<Point>) -> Result<Self, PipelineError> {
        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(PipelineError::InvalidGeometry(format!(
                "contour {id} has a non-finite coordinate"
            )));
        }
        if points.len() < 3 {
            return Err(PipelineError::InvalidGeometry(format!(
                "contour {id} has {} points, need at least 3",
                points.len()
            )));
        }
        if is_collinear(&points) {
            return Err(PipelineError::InvalidGeometry(format!(
                "contour {id} is degenerate: all points are collinear"
            )));
        }
        Ok(Self { id, points })
    }

    /// The identity token.
    #[must_use]
    pub const fn id(&self) -> ContourId {
        self.id
    }

    /// The polygon vertices, without a repeated closing point.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`: a valid contour has at least three points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consumes the contour and returns its vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}

/// Returns `true` when every point lies on the line through the first
/// point and the first point distinct from it.
pub(crate) fn is_collinear(points: &[Point]) -> bool {
    let Some(&origin) = points.first() else {
        return true;
    };
    let Some(&direction) = points.iter().find(|&&p| p != origin) else {
        return true;
    };
    points
        .iter()
        .all(|&p| origin.cross(direction, p).abs() <= f64::EPSILON)
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The role a seed mask plays in the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedRole {
    /// Pixels known to belong to the object.
    Foreground,
    /// Pixels known to lie outside the object.
    Background,
    /// The unmodified rasterized object, used for local statistics.
    RoughMask,
}

impl fmt::Display for SeedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreground => write!(f, "foreground"),
            Self::Background => write!(f, "background"),
            Self::RoughMask => write!(f, "rough mask"),
        }
    }
}

/// Count object (non-zero) pixels in a mask.
#[must_use]
pub fn count_object_pixels(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != BACKGROUND)).sum()
}

/// Errors that can occur while refining a contour.
///
/// Every variant aborts the current refinement; nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The input contour cannot be rasterized.
    #[error("invalid contour geometry: {0}")]
    InvalidGeometry(String),

    /// A configuration value is missing its expected type or range.
    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParameter {
        /// The offending configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Shrinking or expanding left one of the seeds empty.
    #[error("{0} seed is empty after propagation")]
    DegenerateSeed(SeedRole),

    /// The external segmentation engine failed.
    #[error("segmentation failed: {0}")]
    SegmentationFailed(String),

    /// The label mask has no usable object outline.
    #[error("no contour found in the label mask")]
    NoContourFound,
}

impl PipelineError {
    pub(crate) fn invalid_parameter(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}
