//! Scalar reference kernel for zero-mean normalized cross-correlation.
//!
//! For a window `I` under template `T` with `n` pixels:
//!
//! ```text
//! score = (n * sum(T*I) - sum(T) * sum(I))
//!       / sqrt((n * sum(T^2) - sum(T)^2) * (n * sum(I^2) - sum(I)^2))
//! ```
//!
//! Window sums come from the frame's integral images, the dot product is
//! accumulated in integers, and only the final division is floating point.

use crate::image::integral::IntegralImage;
use crate::image::ImageView;
use crate::kernel::ScoreMap;
use crate::template::TemplatePlan;
use rayon::prelude::*;

/// Computes the full score map of `plan` over `image`.
///
/// Rows of the map are scored in parallel on the current rayon pool.
/// Returns `None` when the template does not fit inside the image. Windows
/// with zero variance score `0.0`.
pub fn zncc_score_map(
    image: ImageView<'_, u8>,
    integral: &IntegralImage,
    plan: &TemplatePlan,
) -> Option<ScoreMap> {
    let (map_width, map_height) = placements(image, plan)?;
    debug_assert_eq!(integral.width(), image.width());
    debug_assert_eq!(integral.height(), image.height());

    let mut scores = vec![0f32; map_width * map_height];
    scores
        .par_chunks_mut(map_width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, score) in row.iter_mut().enumerate() {
                *score = zncc_at(image, integral, plan, x, y);
            }
        });

    Some(ScoreMap::new(map_width, map_height, scores))
}

/// Returns the placement grid size of `plan` over `image`, or `None` when the
/// template does not fit.
pub fn placements(image: ImageView<'_, u8>, plan: &TemplatePlan) -> Option<(usize, usize)> {
    if image.width() < plan.width() || image.height() < plan.height() {
        return None;
    }
    Some((
        image.width() - plan.width() + 1,
        image.height() - plan.height() + 1,
    ))
}

/// Scores the single placement with the template's top-left corner at
/// `(x, y)`.
///
/// The caller guarantees the template fits at that placement.
pub fn zncc_at(
    image: ImageView<'_, u8>,
    integral: &IntegralImage,
    plan: &TemplatePlan,
    x: usize,
    y: usize,
) -> f32 {
    let tpl_width = plan.width();
    let tpl_height = plan.height();

    let mut dot = 0u64;
    for (ty, tpl_row) in plan.pixels().chunks_exact(tpl_width).enumerate() {
        let Some(img_row) = image.row(y + ty) else {
            return 0.0;
        };
        let row_dot: u32 = tpl_row
            .iter()
            .zip(&img_row[x..x + tpl_width])
            .map(|(&t, &i)| u32::from(t) * u32::from(i))
            .sum();
        dot += u64::from(row_dot);
    }

    let n = plan.count() as i128;
    let (sum_i, sum_i2) = integral.window(x, y, tpl_width, tpl_height);
    let sum_i = i128::from(sum_i);
    let var_i = n * i128::from(sum_i2) - sum_i * sum_i;
    if var_i <= 0 {
        return 0.0;
    }

    let numerator = n * i128::from(dot) - i128::from(plan.sum()) * sum_i;
    let score = numerator as f64 / (plan.scaled_var() as f64 * var_i as f64).sqrt();
    score.clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::{zncc_at, zncc_score_map};
    use crate::image::integral::IntegralImage;
    use crate::image::ImageView;
    use crate::template::TemplatePlan;

    fn pattern(width: usize, height: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(((x * 17 + y * 9 + x * y) & 0xFF) as u8);
            }
        }
        data
    }

    #[test]
    fn zncc_matches_bruteforce_float() {
        let (img_width, img_height) = (9, 7);
        let image = pattern(img_width, img_height);
        let (tpl_width, tpl_height) = (3, 2);
        let tpl: Vec<u8> = (0..tpl_width * tpl_height)
            .map(|i| ((i * 41 + 3) & 0xFF) as u8)
            .collect();

        let image_view = ImageView::from_slice(&image, img_width, img_height).unwrap();
        let tpl_view = ImageView::from_slice(&tpl, tpl_width, tpl_height).unwrap();
        let plan = TemplatePlan::from_view(tpl_view).unwrap();
        let integral = IntegralImage::build(image_view);
        let map = zncc_score_map(image_view, &integral, &plan).unwrap();
        assert_eq!((map.width(), map.height()), (7, 6));

        let n = (tpl_width * tpl_height) as f64;
        let t_mean = tpl.iter().map(|&v| v as f64).sum::<f64>() / n;
        for y in 0..map.height() {
            for x in 0..map.width() {
                let mut i_sum = 0.0;
                for ty in 0..tpl_height {
                    for tx in 0..tpl_width {
                        i_sum += image[(y + ty) * img_width + x + tx] as f64;
                    }
                }
                let i_mean = i_sum / n;
                let (mut num, mut dt, mut di) = (0.0, 0.0, 0.0);
                for ty in 0..tpl_height {
                    for tx in 0..tpl_width {
                        let t = tpl[ty * tpl_width + tx] as f64 - t_mean;
                        let i = image[(y + ty) * img_width + x + tx] as f64 - i_mean;
                        num += t * i;
                        dt += t * t;
                        di += i * i;
                    }
                }
                let expected = if di <= 0.0 { 0.0 } else { num / (dt * di).sqrt() };
                let got = map.get(x, y).unwrap() as f64;
                assert!((got - expected).abs() < 1e-5, "({x},{y}) {got} vs {expected}");
            }
        }
    }

    #[test]
    fn embedded_copy_scores_exactly_one() {
        let (img_width, img_height) = (20, 16);
        let image = pattern(img_width, img_height);
        let (x0, y0, w, h) = (5, 4, 8, 6);
        let mut tpl = Vec::with_capacity(w * h);
        for y in 0..h {
            tpl.extend_from_slice(&image[(y0 + y) * img_width + x0..(y0 + y) * img_width + x0 + w]);
        }

        let image_view = ImageView::from_slice(&image, img_width, img_height).unwrap();
        let plan = TemplatePlan::from_view(ImageView::from_slice(&tpl, w, h).unwrap()).unwrap();
        let integral = IntegralImage::build(image_view);
        let map = zncc_score_map(image_view, &integral, &plan).unwrap();
        assert_eq!(map.get(x0, y0), Some(1.0));
        assert_eq!(map.max(), 1.0);
        assert_eq!(zncc_at(image_view, &integral, &plan, x0, y0), 1.0);
    }

    #[test]
    fn oversized_template_has_no_map() {
        let image = pattern(4, 4);
        let tpl = pattern(5, 2);
        let image_view = ImageView::from_slice(&image, 4, 4).unwrap();
        let plan = TemplatePlan::from_view(ImageView::from_slice(&tpl, 5, 2).unwrap()).unwrap();
        let integral = IntegralImage::build(image_view);
        assert!(zncc_score_map(image_view, &integral, &plan).is_none());
    }
}
