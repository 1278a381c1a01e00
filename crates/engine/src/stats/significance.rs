//! Is a strategy's edge distinguishable from luck?
//!
//! Two randomized nulls are replayed over the same ledger. The team
//! selection null keeps the stake sizing but picks sides by coin flip; the
//! bet sizing null keeps the real picks but draws stakes uniformly between
//! the smallest and largest the strategy used. Each null run samples many
//! alternate histories, keeps the best mean return per repetition, and the
//! strategy's own mean return is t-tested against that best-case
//! distribution. A strategy that cannot beat cherry-picked noise has no
//! business going live.

use anyhow::{bail, Result};
use rand::Rng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal, StudentsT};
use tracing::debug;

use crate::stats::{as_f64, histogram, mean, population_std, sample_std, HistogramBin};
use crate::types::{BetRecord, GameSide};

#[derive(Debug, Clone)]
pub struct SignificanceConfig {
    /// Alternate histories per repetition; the best one is kept
    pub samples: usize,
    pub reps: usize,
    /// Base unit for the odds-scaled stakes of the team selection null
    pub unit: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            reps: 1000,
            unit: 100.0,
        }
    }
}

/// Null distribution summary and the test against the strategy's mean
#[derive(Debug, Clone)]
pub struct SignificanceReport {
    pub strategy_mean: f64,
    pub null_mean: f64,
    pub null_std: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub samples: Vec<f64>,
}

impl SignificanceReport {
    /// Sample histogram with the fitted normal density overlaid
    pub fn histogram(&self, bins: usize) -> Vec<HistogramBin> {
        let normal = Normal::new(self.null_mean, self.null_std).ok();
        histogram(&self.samples, bins, |x| {
            normal.as_ref().map_or(0.0, |fitted| fitted.pdf(x))
        })
    }
}

fn flat_return(prediction: i8, winner: i8, odds: f64, wager: f64) -> f64 {
    if prediction == winner {
        (odds - 1.0) * wager
    } else {
        -wager
    }
}

struct LedgerRow {
    home_odds: f64,
    away_odds: f64,
    winner: i8,
    prediction: i8,
    wager: f64,
    wager_return: f64,
}

fn rows(bets: &[BetRecord]) -> Vec<LedgerRow> {
    bets.iter()
        .map(|bet| LedgerRow {
            home_odds: as_f64(bet.odds.home),
            away_odds: as_f64(bet.odds.away),
            winner: bet.winner.label_for(GameSide::Home),
            prediction: bet.prediction.label(),
            wager: as_f64(bet.stake),
            wager_return: as_f64(bet.wager_return),
        })
        .collect()
}

/// Mean return of the ledger as wagered, the figure under test
pub fn strategy_mean(bets: &[BetRecord]) -> f64 {
    let returns: Vec<f64> = bets.iter().map(|bet| as_f64(bet.wager_return)).collect();
    mean(&returns)
}

/// Best-of-sample mean returns when sides are picked by coin flip
pub fn team_selection_null<R: Rng>(
    bets: &[BetRecord],
    config: &SignificanceConfig,
    rng: &mut R,
) -> Vec<f64> {
    let ledger = rows(bets);
    let mut results = Vec::with_capacity(config.reps);

    for _ in 0..config.reps {
        let mut best = f64::NEG_INFINITY;
        for _ in 0..config.samples {
            let mut returns = Vec::with_capacity(ledger.len());
            for row in &ledger {
                let prediction: i8 = if rng.gen_bool(0.5) { 1 } else { -1 };
                let odds = if prediction == 1 {
                    row.home_odds
                } else {
                    row.away_odds
                };
                returns.push(flat_return(prediction, row.winner, odds, config.unit * odds));
            }
            best = best.max(mean(&returns));
        }
        results.push(best);
    }
    debug!(reps = results.len(), "team selection null sampled");
    results
}

/// Best-of-sample mean returns when stakes are drawn uniformly between the
/// smallest and largest wager the strategy placed
pub fn bet_sizing_null<R: Rng>(
    bets: &[BetRecord],
    config: &SignificanceConfig,
    rng: &mut R,
) -> Result<Vec<f64>> {
    if bets.is_empty() {
        bail!("cannot sample bet sizes from an empty ledger");
    }
    let ledger = rows(bets);
    let min_wager = ledger.iter().map(|row| row.wager).fold(f64::INFINITY, f64::min);
    let max_wager = ledger
        .iter()
        .map(|row| row.wager)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut results = Vec::with_capacity(config.reps);
    for _ in 0..config.reps {
        let mut best = f64::NEG_INFINITY;
        for _ in 0..config.samples {
            let mut returns = Vec::with_capacity(ledger.len());
            for row in &ledger {
                let wager = min_wager + rng.gen::<f64>() * (max_wager - min_wager);
                let odds = if row.prediction == 1 {
                    row.home_odds
                } else {
                    row.away_odds
                };
                returns.push(flat_return(row.prediction, row.winner, odds, wager));
            }
            best = best.max(mean(&returns));
        }
        results.push(best);
    }
    debug!(reps = results.len(), "bet sizing null sampled");
    Ok(results)
}

/// One-sample two-sided t-test of the null samples against the strategy mean
pub fn evaluate(samples: &[f64], strategy_mean: f64) -> Result<SignificanceReport> {
    if samples.len() < 2 {
        bail!("significance test needs at least two null samples");
    }

    let null_mean = mean(samples);
    let null_std = population_std(samples);

    let s = sample_std(samples);
    if s == 0.0 {
        bail!("null samples are constant, t statistic undefined");
    }
    let n = samples.len() as f64;
    let t_statistic = (null_mean - strategy_mean) / (s / n.sqrt());
    let dist = StudentsT::new(0.0, 1.0, n - 1.0)?;
    let p_value = 2.0 * (1.0 - dist.cdf(t_statistic.abs()));

    Ok(SignificanceReport {
        strategy_mean,
        null_mean,
        null_std,
        t_statistic,
        p_value,
        samples: samples.to_vec(),
    })
}
