//! Technical Indicators
//!
//! Pure functions over price slices. Rolling indicators return a series aligned
//! with the input, `None` until the window is full, so callers can read the
//! latest value or compare it with the previous bar.

/// Simple moving average over `period` values
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| window.iter().sum::<f64>() / window.len() as f64)
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first value (no bias adjustment)
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out: Vec<f64> = Vec::with_capacity(values.len());

    for &value in values {
        let next = match out.last() {
            Some(&prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        out.push(next);
    }

    out
}

/// Relative Strength Index from simple rolling means of gains and losses.
///
/// The first bar has no delta and counts as zero movement. Wherever the
/// average loss is zero or the window is not yet full the value is 50.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let deltas: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| if i == 0 { 0.0 } else { c - closes[i - 1] })
        .collect();

    let gains: Vec<f64> = deltas.iter().map(|&d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| (-d).max(0.0)).collect();

    sma(&gains, period)
        .into_iter()
        .zip(sma(&losses, period))
        .map(|(gain, loss)| match (gain, loss) {
            (Some(gain), Some(loss)) if loss > 0.0 => 100.0 - 100.0 / (1.0 + gain / loss),
            _ => 50.0,
        })
        .collect()
}

/// MACD line, signal line and histogram
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD(fast, slow, signal) on closing prices
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    MacdSeries {
        line,
        signal: signal_line,
        histogram,
    }
}

/// True range per bar: the largest of high-low, |high - prev close| and
/// |low - prev close|. The first bar has no previous close and uses high-low.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..high.len().min(low.len()).min(close.len()))
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                return range;
            }
            let prev_close = close[i - 1];
            range
                .max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs())
        })
        .collect()
}

/// Average True Range: simple rolling mean of the true range
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    sma(&true_range(high, low, close), period)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BollingerBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands: rolling mean ± `width` sample standard deviations
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Vec<Option<BollingerBand>> {
    let means = sma(closes, period);
    let deviations = rolling(closes, period, sample_std);

    means
        .into_iter()
        .zip(deviations)
        .map(|(mean, std)| {
            let (middle, std) = (mean?, std?);
            Some(BollingerBand {
                upper: middle + width * std,
                middle,
                lower: middle - width * std,
            })
        })
        .collect()
}

/// Least-squares slope of `values` against 0, 1, .., n-1
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;

    let (num, den) = values.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, &y)| {
        let dx = i as f64 - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });

    num / den
}

fn sample_std(window: &[f64]) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| (i + 1 >= period).then(|| f(&values[i + 1 - period..=i])))
        .collect()
}

/// Latest value of an aligned series
pub fn last<T: Copy>(series: &[Option<T>]) -> Option<T> {
    series.last().copied().flatten()
}
