//! Mask-to-contour extraction.
//!
//! Outer borders of the object components are traced with Suzuki-Abe
//! border following (`imageproc::contours::find_contours`). Holes are
//! ignored. Of the candidate borders, the one enclosing the largest area
//! becomes the refined contour; ties go to the border found first in
//! raster order.

use geo::{Area, LineString, Polygon};
use image::Luma;
use imageproc::contours::BorderType;

use crate::types::{
    BACKGROUND, Contour, ContourId, GrayImage, PipelineError, Point, is_collinear,
};

/// One candidate object outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    points: Vec<Point>,
    area: f64,
}

impl Outline {
    /// Sampled border vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Area enclosed by the full, unsampled border in square pixels.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }
}

/// Every usable outer border of `label_mask`, largest area first.
///
/// Borders are sampled every `step` points. If that leaves fewer than
/// three points, or only collinear ones, the full border is kept.
/// Borders enclosing no area (single pixels, one-pixel-wide lines) are
/// skipped.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for a `step` of zero.
pub fn outlines(label_mask: &GrayImage, step: usize) -> Result<Vec<Outline>, PipelineError> {
    if step == 0 {
        return Err(PipelineError::invalid_parameter(
            "step",
            "sampling step must be at least 1",
        ));
    }

    // Border following never starts on the image frame, so trace a copy
    // framed by one background pixel and shift the result back.
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&pad(label_mask));

    let mut candidates: Vec<Outline> = contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 3)
        .filter_map(|c| {
            let border: Vec<Point> = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x) - 1.0, f64::from(p.y) - 1.0))
                .collect();
            let area = enclosed_area(&border);
            (area > 0.0).then(|| Outline {
                points: sample(border, step),
                area,
            })
        })
        .collect();

    // Stable sort keeps raster order among equal areas.
    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
    Ok(candidates)
}

/// Extract the refined contour from a label mask.
///
/// The result carries `id` unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for a `step` of zero and
/// [`PipelineError::NoContourFound`] if the mask holds no component that
/// can form a polygon.
pub fn extract(
    label_mask: &GrayImage,
    step: usize,
    id: ContourId,
) -> Result<Contour, PipelineError> {
    select(outlines(label_mask, step)?, id)
}

/// Turn the first of `candidates` into a contour with identity `id`.
pub(crate) fn select(candidates: Vec<Outline>, id: ContourId) -> Result<Contour, PipelineError> {
    if candidates.len() > 1 {
        log::warn!(
            "label mask for contour {id} has {} components, keeping the largest",
            candidates.len()
        );
    }
    let best = candidates
        .into_iter()
        .next()
        .ok_or(PipelineError::NoContourFound)?;
    log::debug!(
        "contour {id}: {} points enclosing {:.1} px",
        best.points.len(),
        best.area
    );
    Contour::new(id, best.points)
}

/// Copy of `mask` with a one-pixel background frame.
fn pad(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width + 2, height + 2, |x, y| {
        if x == 0 || y == 0 || x > width || y > height {
            Luma([BACKGROUND])
        } else {
            *mask.get_pixel(x - 1, y - 1)
        }
    })
}

/// Area of the polygon through `border`.
fn enclosed_area(border: &[Point]) -> f64 {
    let ring: LineString<f64> = border.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Keep every `step`-th point, falling back to the full border when the
/// sample could not form a polygon.
fn sample(border: Vec<Point>, step: usize) -> Vec<Point> {
    if step == 1 {
        return border;
    }
    let sampled: Vec<Point> = border.iter().step_by(step).copied().collect();
    if sampled.len() < 3 || is_collinear(&sampled) {
        border
    } else {
        sampled
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::raster::rasterize;
    use crate::types::{Dimensions, OBJECT};

    fn fill_rect(mask: &mut GrayImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) {
        for y in ys {
            for x in xs.clone() {
                mask.put_pixel(x, y, Luma([OBJECT]));
            }
        }
    }

    fn bounds(contour: &Contour) -> (f64, f64, f64, f64) {
        contour.points().iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    fn polygon_area(points: &[Point]) -> f64 {
        enclosed_area(points)
    }

    fn perimeter(points: &[Point]) -> f64 {
        let n = points.len();
        (0..n)
            .map(|i| points[i].distance_squared(points[(i + 1) % n]).sqrt())
            .sum()
    }

    #[test]
    fn empty_mask_has_no_contour() {
        let err = extract(&GrayImage::new(20, 20), 2, ContourId(1)).unwrap_err();
        assert_eq!(err, PipelineError::NoContourFound);
    }

    #[test]
    fn single_pixel_has_no_contour() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(10, 10, Luma([OBJECT]));
        let err = extract(&mask, 1, ContourId(1)).unwrap_err();
        assert_eq!(err, PipelineError::NoContourFound);
    }

    #[test]
    fn thin_line_has_no_contour() {
        let mut mask = GrayImage::new(20, 20);
        fill_rect(&mut mask, 3..15, 8..9);
        let err = extract(&mask, 1, ContourId(1)).unwrap_err();
        assert_eq!(err, PipelineError::NoContourFound);
    }

    #[test]
    fn zero_step_is_rejected() {
        let mut mask = GrayImage::new(20, 20);
        fill_rect(&mut mask, 5..15, 5..15);
        let err = extract(&mask, 0, ContourId(1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { ref key, .. } if key == "step"));
    }

    #[test]
    fn identity_is_preserved() {
        let mut mask = GrayImage::new(20, 20);
        fill_rect(&mut mask, 5..15, 5..15);
        let contour = extract(&mask, 2, ContourId(314)).unwrap();
        assert_eq!(contour.id(), ContourId(314));
    }

    #[test]
    fn square_border_runs_through_pixel_centers() {
        let mut mask = GrayImage::new(30, 30);
        fill_rect(&mut mask, 5..15, 5..15);
        let contour = extract(&mask, 1, ContourId(1)).unwrap();
        assert_eq!(bounds(&contour), (5.0, 5.0, 14.0, 14.0));
        assert!((polygon_area(contour.points()) - 81.0).abs() < 1e-9);
    }

    #[test]
    fn largest_component_wins() {
        let mut mask = GrayImage::new(50, 50);
        fill_rect(&mut mask, 2..8, 2..8);
        fill_rect(&mut mask, 20..40, 20..40);
        fill_rect(&mut mask, 42..48, 2..10);
        let contour = extract(&mask, 1, ContourId(1)).unwrap();
        assert_eq!(bounds(&contour), (20.0, 20.0, 39.0, 39.0));
        assert_eq!(outlines(&mask, 1).unwrap().len(), 3);
    }

    #[test]
    fn ties_go_to_first_in_raster_order() {
        let mut mask = GrayImage::new(40, 40);
        fill_rect(&mut mask, 5..15, 25..35);
        fill_rect(&mut mask, 25..35, 5..15);
        let contour = extract(&mask, 1, ContourId(1)).unwrap();
        assert_eq!(bounds(&contour), (25.0, 5.0, 34.0, 14.0));
    }

    #[test]
    fn holes_are_ignored() {
        let mut mask = GrayImage::new(40, 40);
        fill_rect(&mut mask, 5..35, 5..35);
        for y in 15..25 {
            for x in 15..25 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let candidates = outlines(&mask, 1).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].area() - 29.0 * 29.0).abs() < 1e-9);
    }

    #[test]
    fn object_touching_the_frame_is_traced() {
        let mask = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { OBJECT } else { 0 }]));
        let contour = extract(&mask, 1, ContourId(1)).unwrap();
        assert_eq!(bounds(&contour), (0.0, 0.0, 9.0, 19.0));
        assert!((polygon_area(contour.points()) - 9.0 * 19.0).abs() < 1e-9);
    }

    #[test]
    fn corner_block_is_traced() {
        let mask = GrayImage::from_fn(20, 20, |x, y| {
            Luma([if x < 10 && y < 10 { OBJECT } else { 0 }])
        });
        let contour = extract(&mask, 2, ContourId(6)).unwrap();
        assert_eq!(contour.id(), ContourId(6));
        let (x0, y0, x1, y1) = bounds(&contour);
        assert_eq!((x0, y0), (0.0, 0.0));
        assert!(x1 <= 9.0 && y1 <= 9.0);
    }

    #[test]
    fn full_mask_is_one_candidate() {
        let mask = GrayImage::from_pixel(12, 8, Luma([OBJECT]));
        let candidates = outlines(&mask, 1).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].area() - 11.0 * 7.0).abs() < 1e-9);
        for p in candidates[0].points() {
            assert!((0.0..=11.0).contains(&p.x) && (0.0..=7.0).contains(&p.y));
        }
    }

    #[test]
    fn sampling_keeps_every_nth_point() {
        let mut mask = GrayImage::new(40, 40);
        fill_rect(&mut mask, 5..25, 5..25);
        let full = extract(&mask, 1, ContourId(1)).unwrap();
        let sampled = extract(&mask, 2, ContourId(1)).unwrap();
        assert!(sampled.len() >= 3);
        assert!(sampled.len() <= full.len().div_ceil(2));
        assert_eq!(sampled.points()[0], full.points()[0]);
        assert_eq!(sampled.points()[1], full.points()[2]);
    }

    #[test]
    fn coarse_sampling_falls_back_to_full_border() {
        let mut mask = GrayImage::new(20, 20);
        fill_rect(&mut mask, 5..7, 5..7);
        let full = extract(&mask, 1, ContourId(1)).unwrap();
        let coarse = extract(&mask, 100, ContourId(1)).unwrap();
        assert_eq!(full, coarse);
    }

    #[test]
    fn convex_round_trip_preserves_area() {
        let polygons: [&[(f64, f64)]; 3] = [
            &[(10.0, 10.0), (40.0, 12.0), (45.0, 40.0), (15.0, 45.0)],
            &[(30.0, 5.0), (55.0, 30.0), (30.0, 55.0), (5.0, 30.0)],
            &[(8.0, 50.0), (32.0, 6.0), (56.0, 50.0)],
        ];
        let dims = Dimensions {
            width: 64,
            height: 64,
        };
        for points in polygons {
            let input = Contour::new(
                ContourId(9),
                points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            )
            .unwrap();
            let mask = rasterize(&input, dims).unwrap();
            let output = extract(&mask, 1, input.id()).unwrap();

            let expected = polygon_area(input.points());
            let actual = polygon_area(output.points());
            let tolerance = perimeter(input.points());
            assert!(
                (expected - actual).abs() <= tolerance,
                "area {actual} vs {expected} (tolerance {tolerance})"
            );
            assert_eq!(output.id(), ContourId(9));
        }
    }
}
