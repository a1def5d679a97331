/// Rounds to two decimal places, the precision results are reported at.
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Inclusive sweep from `-span / 2` to `span / 2` in `steps` equal increments.
///
/// Offsets are computed from the step index so the far edge is hit exactly
/// rather than accumulating float error.
pub(crate) fn symmetric_offsets(span: f64, steps: usize) -> impl Iterator<Item = f64> {
    let half = span / 2.0;
    let step = if steps == 0 { 0.0 } else { span / steps as f64 };
    (0..=steps).map(move |n| -half + step * n as f64)
}
