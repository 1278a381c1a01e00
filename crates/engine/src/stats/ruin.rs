//! Probability of ruin from historical drawdown depths.
//!
//! The combined per-game returns of every strategy are cut into break-even
//! cycles: each cycle runs until the cumulative return crosses back above
//! zero, and its depth is the worst cumulative loss seen inside it. Cycle
//! depths are fitted to a shifted exponential, and ruin over a horizon of n
//! cycles is the chance at least one depth exceeds the starting capital,
//! 1 - F(capital)^n. An unfinished trailing cycle is discarded; its depth
//! is still growing.

use anyhow::{bail, Context, Result};
use statrs::distribution::{Continuous, ContinuousCDF, Exp};
use tracing::info;

use crate::stats::correlation::StrategySeries;
use crate::stats::{histogram, mean, HistogramBin};

const HISTOGRAM_BINS: usize = 30;

#[derive(Debug, Clone)]
pub struct RuinConfig {
    pub starting_capital: f64,
}

impl Default for RuinConfig {
    fn default() -> Self {
        Self {
            starting_capital: 15000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuinReport {
    /// Worst cumulative loss inside each completed break-even cycle
    pub troughs: Vec<f64>,
    /// Shifted exponential fit of the troughs
    pub location: f64,
    pub scale: f64,
    pub p_ruin: f64,
    pub starting_capital: f64,
    pub histogram: Vec<HistogramBin>,
}

/// Sums the strategies' returns per game over the union of their game ids.
///
/// Game ids sort chronologically, so the combined series replays in the
/// order the games were actually played.
pub fn combine_series(series: &[StrategySeries]) -> Vec<(String, f64)> {
    let mut combined: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
    for strategy in series {
        for (game_id, &value) in &strategy.returns {
            *combined.entry(game_id.clone()).or_insert(0.0) += value;
        }
    }
    combined.into_iter().collect()
}

/// Depths of the completed break-even cycles, as positive losses
pub fn break_even_troughs(returns: &[f64]) -> Vec<f64> {
    let mut troughs = Vec::new();
    let mut segment: Vec<f64> = Vec::new();
    let mut cumulative = 0.0;

    for &value in returns {
        segment.push(value);
        cumulative += value;

        if cumulative >= 0.0 {
            let mut running = 0.0;
            let mut worst = f64::INFINITY;
            for &step in &segment {
                running += step;
                worst = worst.min(running);
            }
            if worst < 0.0 {
                troughs.push(worst.abs());
            }
            segment.clear();
            cumulative = 0.0;
        }
    }
    troughs
}

/// Maximum likelihood shifted exponential: location at the smallest trough,
/// scale the mean excess over it
pub fn fit_exponential(troughs: &[f64]) -> Result<(f64, f64)> {
    if troughs.len() < 2 {
        bail!(
            "need at least two break-even cycles with losses, got {}",
            troughs.len()
        );
    }
    let location = troughs.iter().copied().fold(f64::INFINITY, f64::min);
    let scale = mean(troughs) - location;
    if scale <= 0.0 {
        bail!("trough depths are constant, exponential fit is degenerate");
    }
    Ok((location, scale))
}

/// Fits the troughs of the combined ledger and bounds the chance of ruin
pub fn ruin_probability(series: &[StrategySeries], config: &RuinConfig) -> Result<RuinReport> {
    let combined = combine_series(series);
    let returns: Vec<f64> = combined.iter().map(|(_, value)| *value).collect();
    let troughs = break_even_troughs(&returns);

    let (location, scale) = fit_exponential(&troughs)?;
    let dist = Exp::new(1.0 / scale).context("Failed to build exponential distribution")?;

    let cdf_at = |x: f64| {
        if x >= location {
            dist.cdf(x - location)
        } else {
            0.0
        }
    };
    let p_ruin = 1.0 - cdf_at(config.starting_capital).powi(troughs.len() as i32);

    let bins = histogram(&troughs, HISTOGRAM_BINS, |x| {
        if x >= location {
            dist.pdf(x - location)
        } else {
            0.0
        }
    });

    info!(
        cycles = troughs.len(),
        location, scale, p_ruin, "ruin bound estimated"
    );
    Ok(RuinReport {
        troughs,
        location,
        scale,
        p_ruin,
        starting_capital: config.starting_capital,
        histogram: bins,
    })
}
