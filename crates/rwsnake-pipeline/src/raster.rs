//! Geometry rasterization: contour polygon to binary object mask.
//!
//! The interior is filled with an even-odd scanline rule sampled at
//! pixel centers, so the result does not depend on winding direction.
//! Each edge is then stroked with
//! [`imageproc::drawing::draw_line_segment_mut`] between the rounded
//! vertices, so boundary pixels always belong to the object.
//!
//! Crossings use a half-open rule (an edge covers `y0 <= y < y1`), which
//! keeps the crossing count of every row even, including rows through
//! vertices and horizontal edges. Parts of the polygon outside the raster
//! are clipped.

use geo::Line;
use geo::algorithm::line_intersection::line_intersection;
use image::Luma;
use imageproc::point::Point as PixelPoint;

use crate::types::{Contour, Dimensions, GrayImage, OBJECT, PipelineError, Point, is_collinear};

/// Rasterize a contour into a mask of the given dimensions.
///
/// Pixels enclosed by the polygon, including its boundary, are set to
/// [`OBJECT`]; all others are zero.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidGeometry`] if two non-adjacent edges
/// of the polygon touch or cross, or if fewer than three distinct,
/// non-collinear pixel vertices remain after rounding.
pub fn rasterize(contour: &Contour, dimensions: Dimensions) -> Result<GrayImage, PipelineError> {
    if let Some((i, j)) = find_self_intersection(contour.points()) {
        return Err(PipelineError::InvalidGeometry(format!(
            "contour {} self-intersects: edges {i} and {j} meet",
            contour.id()
        )));
    }

    let vertices = pixel_vertices(contour.points());
    if vertices.len() < 3 {
        return Err(PipelineError::InvalidGeometry(format!(
            "contour {} collapses to {} pixel(s)",
            contour.id(),
            vertices.len()
        )));
    }
    let as_points: Vec<Point> = vertices
        .iter()
        .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
        .collect();
    if is_collinear(&as_points) {
        return Err(PipelineError::InvalidGeometry(format!(
            "contour {} collapses to a line at pixel resolution",
            contour.id()
        )));
    }

    let mut mask = GrayImage::new(dimensions.width, dimensions.height);
    fill_even_odd(&mut mask, contour.points());
    stroke_outline(&mut mask, &vertices);
    Ok(mask)
}

/// Fill pixels whose centers lie inside the polygon (even-odd rule).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn fill_even_odd(mask: &mut GrayImage, points: &[Point]) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let max_x = f64::from(width - 1);
    let y_lo = points
        .iter()
        .map(|p| p.y)
        .fold(f64::INFINITY, f64::min)
        .ceil()
        .max(0.0);
    let y_hi = points
        .iter()
        .map(|p| p.y)
        .fold(f64::NEG_INFINITY, f64::max)
        .floor()
        .min(f64::from(height - 1));
    if y_lo > y_hi {
        return;
    }

    let n = points.len();
    let mut crossings: Vec<f64> = Vec::with_capacity(n);
    for y in (y_lo as u32)..=(y_hi as u32) {
        let yf = f64::from(y);
        crossings.clear();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            if (a.y <= yf && yf < b.y) || (b.y <= yf && yf < a.y) {
                let t = (yf - a.y) / (b.y - a.y);
                crossings.push(t.mul_add(b.x - a.x, a.x));
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let from = span[0].ceil().max(0.0);
            let to = span[1].floor().min(max_x);
            if from > to {
                continue;
            }
            for x in (from as u32)..=(to as u32) {
                mask.put_pixel(x, y, Luma([OBJECT]));
            }
        }
    }
}

/// Margin, in pixels, kept around the raster when clipping edges.
const CLIP_MARGIN: f64 = 2.0;

/// Stroke every polygon edge between rounded vertices.
///
/// Endpoints are ordered before drawing so an edge produces the same
/// pixels whichever direction the polygon winds. Edges are clipped to
/// the raster first, so the cost depends on the raster size and not on
/// how far the contour reaches outside it.
fn stroke_outline(mask: &mut GrayImage, vertices: &[PixelPoint<i32>]) {
    let lo = -CLIP_MARGIN;
    let hi = (
        f64::from(mask.width()) - 1.0 + CLIP_MARGIN,
        f64::from(mask.height()) - 1.0 + CLIP_MARGIN,
    );
    let n = vertices.len();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let (start, end) = if (a.x, a.y) <= (b.x, b.y) { (a, b) } else { (b, a) };
        let start = Point::new(f64::from(start.x), f64::from(start.y));
        let end = Point::new(f64::from(end.x), f64::from(end.y));
        if let Some((from, to)) = clip_segment(start, end, (lo, lo), hi) {
            draw_segment(mask, from, to);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn draw_segment(mask: &mut GrayImage, from: Point, to: Point) {
    imageproc::drawing::draw_line_segment_mut(
        mask,
        (from.x as f32, from.y as f32),
        (to.x as f32, to.y as f32),
        Luma([OBJECT]),
    );
}

/// Clip the segment `a`-`b` to the rectangle spanned by `lo` and `hi`.
///
/// Parametric form `P(t) = a + t*(b - a)`: each rectangle side narrows
/// the visible `t` interval (Liang-Barsky). Returns `None` when the
/// segment misses the rectangle.
fn clip_segment(a: Point, b: Point, lo: (f64, f64), hi: (f64, f64)) -> Option<(Point, Point)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, a.x - lo.0),
        (dx, hi.0 - a.x),
        (-dy, a.y - lo.1),
        (dy, hi.1 - a.y),
    ] {
        if p == 0.0 {
            // Parallel to this side: fully outside or no constraint.
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((
        Point::new(t0.mul_add(dx, a.x), t0.mul_add(dy, a.y)),
        Point::new(t1.mul_add(dx, a.x), t1.mul_add(dy, a.y)),
    ))
}

/// Round vertices to pixel coordinates, dropping consecutive duplicates.
///
/// The wrap-around duplicate (last equal to first) is dropped too.
#[allow(clippy::cast_possible_truncation)]
fn pixel_vertices(points: &[Point]) -> Vec<PixelPoint<i32>> {
    let mut vertices: Vec<PixelPoint<i32>> = Vec::with_capacity(points.len());
    for p in points {
        let v = PixelPoint::new(p.x.round() as i32, p.y.round() as i32);
        if vertices.last() != Some(&v) {
            vertices.push(v);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

/// Find a pair of non-adjacent polygon edges that touch or cross.
///
/// Edge `i` runs from vertex `i` to vertex `i + 1` (wrapping). Returns
/// the first offending pair in index order.
fn find_self_intersection(points: &[Point]) -> Option<(usize, usize)> {
    let n = points.len();
    let edge = |i: usize| {
        let a = points[i];
        let b = points[(i + 1) % n];
        Line::new((a.x, a.y), (b.x, b.y))
    };
    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share vertex 0.
            if i == 0 && j == n - 1 {
                continue;
            }
            if line_intersection(edge(i), edge(j)).is_some() {
                return Some((i, j));
            }
        }
    }
    None
}
