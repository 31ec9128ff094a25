//! Summed-area tables for constant-time window statistics.
//!
//! Tables are `(width + 1) x (height + 1)` with a zero first row and column so
//! that any window sum is four lookups. Values are exact integers.

use crate::image::ImageView;

/// Integral images of pixel values and squared pixel values.
pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    /// Builds the summed-area tables for a grayscale view.
    pub fn build(image: ImageView<'_, u8>) -> Self {
        let width = image.width();
        let height = image.height();
        let cols = width + 1;
        let mut sum = vec![0u64; cols * (height + 1)];
        let mut sum_sq = vec![0u64; cols * (height + 1)];

        for y in 0..height {
            let row = image.row(y).unwrap_or(&[]);
            let mut run = 0u64;
            let mut run_sq = 0u64;
            for (x, &value) in row.iter().enumerate() {
                let v = u64::from(value);
                run += v;
                run_sq += v * v;
                let idx = (y + 1) * cols + x + 1;
                sum[idx] = sum[idx - cols] + run;
                sum_sq[idx] = sum_sq[idx - cols] + run_sq;
            }
        }

        Self {
            width,
            height,
            sum,
            sum_sq,
        }
    }

    /// Returns the source image width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the source image height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(sum, sum of squares)` over the `w x h` window at `(x, y)`.
    ///
    /// The caller guarantees the window lies inside the image.
    #[inline]
    pub fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let cols = self.width + 1;
        let a = y * cols + x;
        let b = a + w;
        let c = (y + h) * cols + x;
        let d = c + w;
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sum_sq[d] + self.sum_sq[a] - self.sum_sq[b] - self.sum_sq[c],
        )
    }
}
