//! Scale bands for grayscale `u8` images.
//!
//! Unlike an octave pyramid, a scale band holds a few copies of one image at
//! nearby sizes (for example 60%, 80% and 100%). Resizing uses area
//! resampling: every destination pixel is the coverage-weighted mean of the
//! source pixels its footprint overlaps, which is the antialiased choice for
//! shrinking. Destination sizes are `round(size * scale)`.
//!
//! Coarse search levels use an integer box filter instead, so a block of the
//! frame and the matching block of a template reduce to the same pixel.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AutoSceneError, AutoSceneResult};

/// Scale band configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleBand {
    /// Number of levels in the band.
    pub levels: usize,
    /// Smallest scale factor relative to the authored size.
    pub min_scale: f32,
    /// Largest scale factor relative to the authored size.
    pub max_scale: f32,
}

impl Default for ScaleBand {
    fn default() -> Self {
        Self {
            levels: 3,
            min_scale: 0.6,
            max_scale: 1.0,
        }
    }
}

impl ScaleBand {
    /// Returns evenly spaced scale factors from `min_scale` to `max_scale`.
    pub fn scales(&self) -> Vec<f32> {
        match self.levels {
            0 => Vec::new(),
            1 => vec![self.max_scale],
            n => {
                let step = (self.max_scale - self.min_scale) / (n - 1) as f32;
                (0..n)
                    .map(|i| self.min_scale + step * i as f32)
                    .collect()
            }
        }
    }
}

/// A resized copy of a base image.
pub struct ScaledLevel {
    /// Scale factor this level was produced with.
    pub scale: f32,
    /// Resampled pixels.
    pub image: OwnedImage,
}

/// Builds one resized copy per scale factor, skipping factors that collapse
/// the image to zero pixels.
pub fn build_scale_band(base: ImageView<'_, u8>, scales: &[f32]) -> AutoSceneResult<Vec<ScaledLevel>> {
    let mut levels = Vec::with_capacity(scales.len());
    for &scale in scales {
        if !(scale.is_finite() && scale > 0.0) {
            continue;
        }
        let dst_width = (base.width() as f64 * f64::from(scale)).round() as usize;
        let dst_height = (base.height() as f64 * f64::from(scale)).round() as usize;
        if dst_width == 0 || dst_height == 0 {
            continue;
        }
        let image = resize_area(base, dst_width, dst_height)?;
        levels.push(ScaledLevel { scale, image });
    }
    Ok(levels)
}

/// Resizes a grayscale view to `dst_width x dst_height` with area resampling.
pub fn resize_area(
    src: ImageView<'_, u8>,
    dst_width: usize,
    dst_height: usize,
) -> AutoSceneResult<OwnedImage> {
    if dst_width == 0 || dst_height == 0 {
        return Err(AutoSceneError::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }
    if dst_width == src.width() && dst_height == src.height() {
        return OwnedImage::from_view(src);
    }

    let x_taps = area_taps(src.width(), dst_width);
    let y_taps = area_taps(src.height(), dst_height);

    // Horizontal pass into a float buffer of src_height x dst_width.
    let mut horizontal = vec![0f32; src.height() * dst_width];
    for y in 0..src.height() {
        let row = src.row(y).ok_or(AutoSceneError::BufferTooSmall {
            needed: (y + 1) * src.stride(),
            got: src.as_slice().len(),
        })?;
        let out = &mut horizontal[y * dst_width..(y + 1) * dst_width];
        for (dst, taps) in out.iter_mut().zip(&x_taps) {
            *dst = taps
                .iter()
                .map(|&(idx, weight)| f32::from(row[idx]) * weight)
                .sum();
        }
    }

    let mut data = vec![0u8; dst_width * dst_height];
    for (dy, taps) in y_taps.iter().enumerate() {
        for dx in 0..dst_width {
            let value: f32 = taps
                .iter()
                .map(|&(sy, weight)| horizontal[sy * dst_width + dx] * weight)
                .sum();
            data[dy * dst_width + dx] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    OwnedImage::new(data, dst_width, dst_height)
}

/// Shrinks a view by an integer `factor` with a box filter and integer
/// rounding: `dst = (sum + f*f/2) / (f*f)`. Trailing rows and columns that do
/// not fill a whole block are dropped.
pub fn downsample_box(src: ImageView<'_, u8>, factor: usize) -> AutoSceneResult<OwnedImage> {
    let dst_width = src.width().checked_div(factor).unwrap_or(0);
    let dst_height = src.height().checked_div(factor).unwrap_or(0);
    if dst_width == 0 || dst_height == 0 {
        return Err(AutoSceneError::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }

    let area = (factor * factor) as u32;
    let mut data = vec![0u8; dst_width * dst_height];
    let mut acc = vec![0u32; dst_width];
    for (dy, out) in data.chunks_exact_mut(dst_width).enumerate() {
        acc.fill(0);
        for sy in dy * factor..(dy + 1) * factor {
            let row = src.row(sy).ok_or(AutoSceneError::BufferTooSmall {
                needed: (sy + 1) * src.stride(),
                got: src.as_slice().len(),
            })?;
            for (block, total) in row.chunks_exact(factor).zip(acc.iter_mut()) {
                *total += block.iter().map(|&v| u32::from(v)).sum::<u32>();
            }
        }
        for (dst, &total) in out.iter_mut().zip(&acc) {
            *dst = ((total + area / 2) / area) as u8;
        }
    }

    OwnedImage::new(data, dst_width, dst_height)
}

/// Source indices and normalized coverage weights for each destination index.
fn area_taps(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let ratio = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * ratio;
            let end = (start + ratio).min(src_len as f64);
            let mut taps = Vec::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                let coverage = hi - lo;
                if coverage > 1e-9 {
                    taps.push((s, (coverage / ratio) as f32));
                }
                s += 1;
            }
            taps
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{area_taps, build_scale_band, downsample_box, resize_area, ScaleBand};
    use crate::image::ImageView;

    #[test]
    fn default_band_matches_linspace() {
        let scales = ScaleBand::default().scales();
        assert_eq!(scales.len(), 3);
        assert!((scales[0] - 0.6).abs() < 1e-6);
        assert!((scales[1] - 0.8).abs() < 1e-6);
        assert!((scales[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn area_taps_weights_sum_to_one() {
        for (src, dst) in [(10, 6), (7, 3), (5, 5), (3, 7)] {
            for taps in area_taps(src, dst) {
                let total: f32 = taps.iter().map(|&(_, w)| w).sum();
                assert!((total - 1.0).abs() < 1e-5, "{src}->{dst}: {total}");
            }
        }
    }

    #[test]
    fn halving_averages_blocks() {
        let data = [10u8, 30, 50, 70, 10, 30, 50, 70];
        let view = ImageView::from_slice(&data, 4, 2).unwrap();
        let out = resize_area(view, 2, 1).unwrap();
        assert_eq!(out.data(), &[20, 60]);
    }

    #[test]
    fn scale_band_sizes_are_rounded() {
        let data = vec![128u8; 50 * 20];
        let view = ImageView::from_slice(&data, 50, 20).unwrap();
        let band = build_scale_band(view, &[0.6, 0.8, 1.0]).unwrap();
        let sizes: Vec<_> = band
            .iter()
            .map(|l| (l.image.width(), l.image.height()))
            .collect();
        assert_eq!(sizes, vec![(30, 12), (40, 16), (50, 20)]);
    }

    #[test]
    fn tiny_scales_are_skipped() {
        let data = vec![1u8; 4];
        let view = ImageView::from_slice(&data, 2, 2).unwrap();
        let band = build_scale_band(view, &[0.1, 1.0]).unwrap();
        assert_eq!(band.len(), 1);
    }

    #[test]
    fn box_downsample_rounds_and_drops_partial_blocks() {
        let data = [10u8, 30, 50, 71, 9, 10, 30, 50, 71, 9, 1, 1, 1, 1, 1];
        let view = ImageView::from_slice(&data, 5, 3).unwrap();
        let out = downsample_box(view, 2).unwrap();
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.data(), &[20, 61]);
    }

    #[test]
    fn box_downsample_rejects_empty_output() {
        let data = [1u8; 6];
        let view = ImageView::from_slice(&data, 3, 2).unwrap();
        assert!(downsample_box(view, 4).is_err());
        assert!(downsample_box(view, 0).is_err());
    }
}
