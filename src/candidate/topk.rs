//! Top-k reduction of score maps.

/// Returns the mean of the `k` largest finite-ordered values, or `None` for an
/// empty input or `k == 0`. `k` larger than the input uses every value.
///
/// Selection is linear-time (`select_nth_unstable_by`); the input is copied so
/// the caller's map stays intact.
pub fn top_k_mean(values: &[f32], k: usize) -> Option<f32> {
    if values.is_empty() || k == 0 {
        return None;
    }
    let k = k.min(values.len());
    let mut scratch = values.to_vec();
    if k < scratch.len() {
        scratch.select_nth_unstable_by(k - 1, |a, b| b.total_cmp(a));
    }
    let sum: f64 = scratch[..k].iter().map(|&v| f64::from(v)).sum();
    Some((sum / k as f64) as f32)
}
