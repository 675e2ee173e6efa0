//! Post-filter for label masks: median smoothing, morphology, hole fill.
//!
//! Solver output tends to carry isolated specks, ragged edges and small
//! holes. Cleaning runs, in order:
//!
//! 1. 3x3 median ([`imageproc::filter::median_filter`])
//! 2. binary opening with a radius-1 chessboard element
//! 3. binary closing with the same element
//! 4. hole filling: background regions that do not reach the image
//!    border become object
//!
//! Every step is deterministic, so equal inputs give equal outputs.

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::seeds::{binarize, invert};
use crate::types::{BACKGROUND, GrayImage, OBJECT};

/// Radius of the median window and the morphology element, in pixels.
const RADIUS: u8 = 1;

/// Clean a label mask, or return it unchanged when `enabled` is false.
#[must_use]
pub fn clean(label_mask: &GrayImage, enabled: bool) -> GrayImage {
    if !enabled {
        return label_mask.clone();
    }
    let binary = binarize(label_mask);
    let r = u32::from(RADIUS);
    let smoothed = imageproc::filter::median_filter(&binary, r, r);
    let opened = imageproc::morphology::open(&smoothed, Norm::LInf, RADIUS);
    let closed = imageproc::morphology::close(&opened, Norm::LInf, RADIUS);
    fill_holes(&closed)
}

/// Turn enclosed background regions into object.
///
/// Background pixels are grouped with 4-connectivity, the dual of the
/// 8-connected object boundary traced downstream. Any group touching the
/// image border is real background; every other group is a hole.
pub(crate) fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }
    let outside = invert(mask);
    let labels = connected_components(&outside, Connectivity::Four, Luma([BACKGROUND]));

    let mut touches_border = vec![false; 1];
    let mut mark = |label: u32| {
        let i = label as usize;
        if i >= touches_border.len() {
            touches_border.resize(i + 1, false);
        }
        touches_border[i] = true;
    };
    for x in 0..width {
        mark(labels.get_pixel(x, 0).0[0]);
        mark(labels.get_pixel(x, height - 1).0[0]);
    }
    for y in 0..height {
        mark(labels.get_pixel(0, y).0[0]);
        mark(labels.get_pixel(width - 1, y).0[0]);
    }

    GrayImage::from_fn(width, height, |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        let is_outside = label != 0 && touches_border.get(label as usize).copied().unwrap_or(false);
        if is_outside {
            Luma([BACKGROUND])
        } else {
            Luma([OBJECT])
        }
    })
}
