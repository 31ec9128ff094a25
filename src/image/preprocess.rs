//! Frame normalization shared by captured frames and template sources.
//!
//! Color is reduced to BT.601 luma with the 14-bit fixed-point weights common
//! to vision libraries, then the intensity range is stretched to `[0, 255]`
//! (min-max) so gamma and brightness differences between capture time and
//! template-authoring time do not bias correlation.

use crate::image::OwnedImage;
use crate::util::AutoSceneResult;
use image::RgbImage;

/// A captured still, three channels, alpha already dropped.
pub type Frame = RgbImage;

const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

/// Converts an RGB frame into a min-max normalized grayscale image.
pub fn normalize(frame: &Frame) -> AutoSceneResult<OwnedImage> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let mut gray: Vec<u8> = frame
        .as_raw()
        .chunks_exact(3)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();
    stretch_min_max(&mut gray);
    OwnedImage::new(gray, width, height)
}

/// Fixed-point BT.601 luma.
#[inline]
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    let acc = u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B;
    ((acc + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Rescales intensities in place so the darkest pixel is 0 and the brightest
/// is 255. A constant buffer becomes all zeros.
pub fn stretch_min_max(pixels: &mut [u8]) {
    let Some(&min) = pixels.iter().min() else {
        return;
    };
    let max = pixels.iter().copied().max().unwrap_or(min);
    if max == min {
        pixels.fill(0);
        return;
    }
    let range = u32::from(max - min);
    for px in pixels.iter_mut() {
        let shifted = u32::from(*px - min) * 255;
        *px = ((shifted + range / 2) / range) as u8;
    }
}
