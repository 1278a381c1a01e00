//! Post-hoc analysis of backtest ledgers.
//!
//! Everything here consumes the per-game performance files a replay writes
//! out: significance testing against randomized nulls, cross-strategy
//! correlation, ruin probability from drawdown depths, and the long-shot
//! bias study over raw closing prices.

use rust_decimal::Decimal;

pub mod correlation;
pub mod longshot;
pub mod ruin;
pub mod significance;

/// One density histogram bin with the fitted curve sampled at its midpoint
#[derive(Debug, Clone, Copy)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub density: f64,
    pub fitted_density: f64,
}

// Helper: model math runs in f64, ledgers store Decimal
pub(crate) fn as_f64(value: Decimal) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with the n - 1 correction
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Standard deviation without correction, as a maximum likelihood fit uses
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Equal-width density histogram with `pdf` sampled at each bin midpoint.
///
/// The top edge is closed so the maximum lands in the last bin.
pub fn histogram(values: &[f64], bins: usize, pdf: impl Fn(f64) -> f64) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &value in values {
        lo = lo.min(value);
        hi = hi.max(value);
    }
    let span = if hi > lo { hi - lo } else { 1.0 };
    let lo = if hi > lo { lo } else { lo - 0.5 };
    let width = span / bins as f64;

    let mut counts = vec![0usize; bins];
    for &value in values {
        let index = (((value - lo) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    let n = values.len() as f64;
    counts
        .iter()
        .enumerate()
        .map(|(index, &count)| {
            let bin_lo = lo + index as f64 * width;
            let bin_hi = bin_lo + width;
            HistogramBin {
                lo: bin_lo,
                hi: bin_hi,
                density: count as f64 / (n * width),
                fitted_density: pdf((bin_lo + bin_hi) / 2.0),
            }
        })
        .collect()
}
