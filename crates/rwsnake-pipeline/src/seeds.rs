//! Seed propagation: object mask to foreground/background seeds.
//!
//! The rasterized contour is treated as an approximate object boundary.
//! Eroding it by the shrink distance gives a conservative foreground
//! seed; the complement of a dilation by the expand distance gives a
//! conservative background seed. Pixels between the two stay unassigned
//! and are left for the segmentation engine to resolve.
//!
//! Distances use the chessboard metric ([`Norm::LInf`]) of
//! [`imageproc::morphology`]. Pixels outside the raster never count as
//! background, so an object touching the image border is not eroded from
//! that side.

use image::{Luma, Rgb};
use imageproc::distance_transform::Norm;

use crate::types::{
    BACKGROUND, Dimensions, GrayImage, OBJECT, PipelineError, RgbImage, SeedRole,
    count_object_pixels,
};

/// Foreground, background and rough-mask seeds for one object.
///
/// Invariants: all three masks share dimensions; the foreground and
/// background seeds are disjoint and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedBundle {
    foreground: GrayImage,
    background: GrayImage,
    rough_mask: GrayImage,
}

impl SeedBundle {
    /// The mask for the given role.
    #[must_use]
    pub const fn get(&self, role: SeedRole) -> &GrayImage {
        match role {
            SeedRole::Foreground => &self.foreground,
            SeedRole::Background => &self.background,
            SeedRole::RoughMask => &self.rough_mask,
        }
    }

    /// Dimensions shared by all seed masks.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.foreground)
    }

    /// Number of pixels in neither the foreground nor the background seed.
    #[must_use]
    pub fn unassigned_count(&self) -> u64 {
        self.foreground
            .pixels()
            .zip(self.background.pixels())
            .map(|(f, b)| u64::from(f.0[0] == BACKGROUND && b.0[0] == BACKGROUND))
            .sum()
    }

    /// Overlay the seeds on a grayscale image for visual inspection.
    ///
    /// Foreground seed pixels are tinted red, background seed pixels
    /// green; unassigned pixels keep their gray value. `image` must have
    /// the seed dimensions; pixels beyond either extent are left black.
    #[must_use]
    pub fn composite(&self, image: &GrayImage) -> RgbImage {
        let Dimensions { width, height } = self.dimensions();
        RgbImage::from_fn(width, height, |x, y| {
            if x >= image.width() || y >= image.height() {
                return Rgb([0, 0, 0]);
            }
            let g = image.get_pixel(x, y).0[0];
            if self.foreground.get_pixel(x, y).0[0] != BACKGROUND {
                Rgb([blend(g, 255), blend(g, 0), blend(g, 0)])
            } else if self.background.get_pixel(x, y).0[0] != BACKGROUND {
                Rgb([blend(g, 0), blend(g, 255), blend(g, 0)])
            } else {
                Rgb([g, g, g])
            }
        })
    }
}

/// Average of a gray value and a tint channel.
#[allow(clippy::cast_possible_truncation)]
const fn blend(gray: u8, tint: u8) -> u8 {
    ((gray as u16 + tint as u16) / 2) as u8
}

/// Derive seeds from an object mask.
///
/// Non-zero pixels of `mask` are the object. The foreground seed is the
/// object eroded by `shrink` pixels, the background seed everything
/// farther than `expand` pixels from the object, and the rough mask a
/// verbatim copy of `mask`. A distance of zero leaves the region as is.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateSeed`] with
/// [`SeedRole::Foreground`] if the erosion leaves nothing (including an
/// empty input), or with [`SeedRole::Background`] if the dilation covers
/// the whole image.
pub fn propagate(mask: &GrayImage, shrink: u8, expand: u8) -> Result<SeedBundle, PipelineError> {
    let object = binarize(mask);

    let foreground = if shrink == 0 {
        object.clone()
    } else {
        imageproc::morphology::erode(&object, Norm::LInf, shrink)
    };
    if count_object_pixels(&foreground) == 0 {
        log::debug!("foreground seed vanished after shrinking by {shrink} px");
        return Err(PipelineError::DegenerateSeed(SeedRole::Foreground));
    }

    let expanded = if expand == 0 {
        object
    } else {
        imageproc::morphology::dilate(&object, Norm::LInf, expand)
    };
    let background = invert(&expanded);
    if count_object_pixels(&background) == 0 {
        log::debug!("background seed vanished after expanding by {expand} px");
        return Err(PipelineError::DegenerateSeed(SeedRole::Background));
    }

    Ok(SeedBundle {
        foreground,
        background,
        rough_mask: mask.clone(),
    })
}

/// Map every non-zero pixel to [`OBJECT`].
pub(crate) fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == BACKGROUND {
            Luma([BACKGROUND])
        } else {
            Luma([OBJECT])
        }
    })
}

/// Swap object and background pixels of a binary mask.
pub(crate) fn invert(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == BACKGROUND {
            Luma([OBJECT])
        } else {
            Luma([BACKGROUND])
        }
    })
}
