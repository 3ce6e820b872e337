//! Relative Strength Index with Wilder smoothing

/// Calculate RSI for the given closes.
///
/// The output has the same length as `closes`. Entries before `period` stay
/// zero because there is not enough data yet. The first average gain/loss is
/// a simple mean over the first `period` differences; after that each average
/// is smoothed as `(prev * (period - 1) + current) / period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let p = period as f64;
    let mut gain = 0.0;
    let mut loss = 0.0;
    for i in 1..=period {
        let diff = closes[i] - closes[i - 1];
        if diff > 0.0 {
            gain += diff;
        } else {
            loss -= diff;
        }
    }

    let mut avg_gain = gain / p;
    let mut avg_loss = loss / p;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..closes.len() {
        let diff = closes[i] - closes[i - 1];
        let (up, down) = if diff > 0.0 { (diff, 0.0) } else { (0.0, -diff) };
        avg_gain = (avg_gain * (p - 1.0) + up) / p;
        avg_loss = (avg_loss * (p - 1.0) + down) / p;
        out[i] = rsi_value(avg_gain, avg_loss);
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
