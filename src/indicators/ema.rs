//! Exponential moving average

/// EMA seeded with the first value, smoothing constant `2 / (period + 1)`
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return out;
    };

    let k = 2.0 / (period as f64 + 1.0);
    out.push(first);
    for &v in &values[1..] {
        let prev = out[out.len() - 1];
        out.push(v * k + prev * (1.0 - k));
    }
    out
}
