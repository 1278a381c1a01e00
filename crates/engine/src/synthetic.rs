//! Post-first-quarter score prediction for playoff games.
//!
//! Every game becomes two running-points curves (home and away) sampled on a
//! sixty second grid covering regulation plus three overtimes. A playoff
//! game's remaining path is predicted as a weighted blend of regular season
//! donor games: donors are ranked by how closely their first quarter
//! point-difference curve tracks the playoff game's, and blend weights come
//! from a ridge fit on the stacked first-quarter rows of both curves. The
//! donor pool spans the whole league rather than the two teams involved.

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::numeric::{solve_linear, NumericError};
use crate::types::{GameType, NbaGamePair, PointsTick};

/// Bucket width in seconds
pub const TIME_GRAN: usize = 60;
/// Last grid instant: four quarters plus three five minute overtimes
pub const GRID_END: usize = 3780;
/// Grid points from 0 to `GRID_END` inclusive
pub const GRID_LEN: usize = GRID_END / TIME_GRAN + 1;
/// Buckets covering the first quarter, 0 through 720 inclusive
pub const TRAIN_LEN: usize = 720 / TIME_GRAN + 1;

const REGULATION_BUCKET: usize = 2880 / TIME_GRAN;
const OVERTIME_BUCKETS: [usize; 3] = [3180 / TIME_GRAN, 3480 / TIME_GRAN, 3780 / TIME_GRAN];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Donor games kept after the first-quarter similarity cut
    pub donors: usize,
    pub ridge_lambda: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            donors: 24,
            ridge_lambda: 1.0,
        }
    }
}

/// A game's two curves on the full grid
#[derive(Debug, Clone)]
pub struct GameCurves {
    pub game_id: String,
    pub home: Vec<f64>,
    pub away: Vec<f64>,
}

impl GameCurves {
    fn diff(&self, bucket: usize) -> f64 {
        self.home[bucket] - self.away[bucket]
    }
}

/// Predicted and observed point difference at one grid instant
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pub predicted: f64,
    pub actual: f64,
}

/// Point-difference checkpoints at the end of regulation and each overtime
#[derive(Debug, Clone)]
pub struct ScorePrediction {
    pub game_id: String,
    pub regulation: Checkpoint,
    pub overtime: [Checkpoint; 3],
}

/// Snaps a tick series onto the grid, carrying the last known score forward.
///
/// Ticks past triple overtime are dropped. Returns `None` when the series
/// starts after the first bucket; a curve with no first-quarter anchor cannot
/// be forward filled from anything.
fn bucket_curve(ticks: &[PointsTick]) -> Option<Vec<f64>> {
    let mut slots: Vec<Option<f64>> = vec![None; GRID_LEN];
    for tick in ticks {
        let index = tick.seconds as usize / TIME_GRAN;
        if index < GRID_LEN {
            slots[index] = Some(f64::from(tick.points));
        }
    }

    let mut filled = Vec::with_capacity(GRID_LEN);
    let mut last: Option<f64> = None;
    for slot in slots {
        let value = slot.or(last)?;
        last = Some(value);
        filled.push(value);
    }
    Some(filled)
}

/// Both curves for a game, or `None` when either side misses the first quarter
pub fn curves_for(pair: &NbaGamePair) -> Option<GameCurves> {
    let home = bucket_curve(&pair.home_points)?;
    let away = bucket_curve(&pair.away_points)?;
    Some(GameCurves {
        game_id: pair.game_id.clone(),
        home,
        away,
    })
}

/// Indices of the donors whose first-quarter difference curve sits closest
/// to the key's, by RMSE, nearest first
fn rank_donors(key: &GameCurves, pool: &[GameCurves], keep: usize) -> Vec<usize> {
    let mut errors: Vec<(usize, f64)> = pool
        .iter()
        .enumerate()
        .map(|(index, donor)| {
            let sse: f64 = (0..TRAIN_LEN)
                .map(|bucket| {
                    let gap = key.diff(bucket) - donor.diff(bucket);
                    gap * gap
                })
                .sum();
            (index, (sse / TRAIN_LEN as f64).sqrt())
        })
        .collect();
    errors.sort_by(|a, b| a.1.total_cmp(&b.1));
    errors.truncate(keep);
    errors.into_iter().map(|(index, _)| index).collect()
}

fn stacked_row(curves: &GameCurves, row: usize) -> f64 {
    if row < TRAIN_LEN {
        curves.home[row]
    } else {
        curves.away[row - TRAIN_LEN]
    }
}

/// Ridge blend weights fitted on the stacked home and away first-quarter rows
fn ridge_weights(
    donors: &[&GameCurves],
    key: &GameCurves,
    lambda: f64,
) -> Result<Vec<f64>, NumericError> {
    let n = donors.len();
    let mut gram = vec![vec![0.0; n]; n];
    let mut rhs = vec![0.0; n];

    for row in 0..2 * TRAIN_LEN {
        let target = stacked_row(key, row);
        for i in 0..n {
            let xi = stacked_row(donors[i], row);
            rhs[i] += xi * target;
            for j in i..n {
                gram[i][j] += xi * stacked_row(donors[j], row);
            }
        }
    }
    for i in 0..n {
        for j in 0..i {
            gram[i][j] = gram[j][i];
        }
        gram[i][i] += lambda;
    }

    solve_linear(gram, rhs)
}

/// Predicts every playoff game in `pairs` from that season's regular games
pub fn predict_playoffs(
    pairs: &[NbaGamePair],
    config: &SyntheticConfig,
) -> Result<Vec<ScorePrediction>> {
    let mut pool: Vec<GameCurves> = Vec::new();
    let mut keys: Vec<GameCurves> = Vec::new();

    for pair in pairs {
        match curves_for(pair) {
            Some(curves) => {
                if pair.game_type == GameType::Regular {
                    pool.push(curves);
                } else {
                    keys.push(curves);
                }
            }
            None => {
                warn!(game_id = %pair.game_id, "skipping game missing the 1st quarter");
            }
        }
    }

    if keys.is_empty() {
        return Ok(Vec::new());
    }
    if pool.is_empty() {
        bail!("no usable regular season games to build controls from");
    }

    let mut predictions = Vec::with_capacity(keys.len());
    for key in &keys {
        let picked = rank_donors(key, &pool, config.donors.min(pool.len()));
        let donors: Vec<&GameCurves> = picked.iter().map(|&index| &pool[index]).collect();
        let weights = ridge_weights(&donors, key, config.ridge_lambda)
            .with_context(|| format!("Failed to fit control weights for {}", key.game_id))?;

        let predict = |bucket: usize| -> f64 {
            donors
                .iter()
                .zip(&weights)
                .map(|(donor, weight)| weight * donor.diff(bucket))
                .sum()
        };
        let checkpoint = |bucket: usize| Checkpoint {
            predicted: predict(bucket),
            actual: key.diff(bucket),
        };

        debug!(game_id = %key.game_id, donors = donors.len(), "playoff game predicted");
        predictions.push(ScorePrediction {
            game_id: key.game_id.clone(),
            regulation: checkpoint(REGULATION_BUCKET),
            overtime: [
                checkpoint(OVERTIME_BUCKETS[0]),
                checkpoint(OVERTIME_BUCKETS[1]),
                checkpoint(OVERTIME_BUCKETS[2]),
            ],
        });
    }
    Ok(predictions)
}
