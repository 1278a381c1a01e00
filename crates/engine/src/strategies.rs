//! Betting strategies replayed by the backtester.
//!
//! A strategy sees one season of priced games in id order and returns the
//! bets it wants settled. Skipped games simply do not appear in the ledger.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::markov::MarkovModel;
use crate::types::{GamePair, GameSide, GameType, Pick};

/// A bet on one game of the season slice handed to [`Strategy::select`]
#[derive(Debug, Clone, Copy)]
pub struct StrategyBet {
    pub pair_index: usize,
    pub pick: Pick,
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Bets to place for one season of games, ordered by game id
    fn select(&self, season: &[GamePair]) -> Result<Vec<StrategyBet>>;
}

// ============================================================================
// Markov playoff strategy
// ============================================================================

/// Fits the strength model on the regular season and backs the favoured side
/// of every playoff game
#[derive(Debug, Default)]
pub struct MarkovPlayoff;

impl Strategy for MarkovPlayoff {
    fn name(&self) -> &str {
        "markov-playoff"
    }

    fn select(&self, season: &[GamePair]) -> Result<Vec<StrategyBet>> {
        let regular: Vec<GamePair> = season
            .iter()
            .filter(|game| game.game_type == GameType::Regular)
            .cloned()
            .collect();
        let model = MarkovModel::fit(&regular)?;

        let mut bets = Vec::new();
        for (pair_index, game) in season.iter().enumerate() {
            if game.game_type != GameType::Playoff {
                continue;
            }
            let pick = model
                .predict(&game.home.team_id, &game.away.team_id)
                .with_context(|| {
                    format!("playoff team missing from the model in game {}", game.game_id)
                })?;
            bets.push(StrategyBet { pair_index, pick });
        }
        Ok(bets)
    }
}

// ============================================================================
// Streak fade strategy
// ============================================================================

/// Fades winning streaks: when exactly one side has won all of its last
/// `window` games, bet the other side
#[derive(Debug)]
pub struct StreakFade {
    pub window: usize,
}

impl Default for StreakFade {
    fn default() -> Self {
        Self { window: 3 }
    }
}

impl Strategy for StreakFade {
    fn name(&self) -> &str {
        "streak-fade"
    }

    fn select(&self, season: &[GamePair]) -> Result<Vec<StrategyBet>> {
        let mut history: HashMap<&str, Vec<f64>> = HashMap::new();
        let mut bets = Vec::new();

        for (pair_index, game) in season.iter().enumerate() {
            let home_hot = is_hot(history.get(game.home.team_id.as_str()), self.window);
            let away_hot = is_hot(history.get(game.away.team_id.as_str()), self.window);
            let pick = match (home_hot, away_hot) {
                (true, false) => Pick::Away,
                (false, true) => Pick::Home,
                _ => Pick::Skip,
            };
            if pick != Pick::Skip {
                bets.push(StrategyBet { pair_index, pick });
            }

            history
                .entry(game.home.team_id.as_str())
                .or_default()
                .push(game.winner.credit_for(GameSide::Home));
            history
                .entry(game.away.team_id.as_str())
                .or_default()
                .push(game.winner.credit_for(GameSide::Away));
        }
        Ok(bets)
    }
}

/// A perfect run over the last `window` games; overtime ties break it
fn is_hot(history: Option<&Vec<f64>>, window: usize) -> bool {
    let Some(history) = history else {
        return false;
    };
    history.len() >= window
        && history[history.len() - window..]
            .iter()
            .all(|&credit| credit == 1.0)
}

// ============================================================================
// Rest fade strategy
// ============================================================================

/// Fades short-rested outsiders: when exactly one side is playing again
/// within `threshold_hours` and the odds already call it the outsider, back
/// the opponent
#[derive(Debug)]
pub struct RestFade {
    pub threshold_hours: f64,
}

impl Default for RestFade {
    fn default() -> Self {
        Self {
            threshold_hours: 26.0,
        }
    }
}

impl Strategy for RestFade {
    fn name(&self) -> &str {
        "rest-fade"
    }

    fn select(&self, season: &[GamePair]) -> Result<Vec<StrategyBet>> {
        let mut last_played: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut bets = Vec::new();

        for (pair_index, game) in season.iter().enumerate() {
            let home_rest = rest_hours(last_played.get(game.home.team_id.as_str()), game.date);
            let away_rest = rest_hours(last_played.get(game.away.team_id.as_str()), game.date);
            let home_short = home_rest.is_some_and(|hours| hours < self.threshold_hours);
            let away_short = away_rest.is_some_and(|hours| hours < self.threshold_hours);

            // No favourite, no edge
            let pick = if game.odds.home == game.odds.away {
                Pick::Skip
            } else {
                let home_favourite = game.odds.home < game.odds.away;
                match (home_short, away_short) {
                    (true, false) if !home_favourite => Pick::Away,
                    (false, true) if home_favourite => Pick::Home,
                    _ => Pick::Skip,
                }
            };
            if pick != Pick::Skip {
                debug!(
                    game_id = %game.game_id,
                    home_rest = ?home_rest,
                    away_rest = ?away_rest,
                    pick = ?pick,
                    "fading a short-rested outsider"
                );
                bets.push(StrategyBet { pair_index, pick });
            }

            last_played.insert(game.home.team_id.as_str(), game.date);
            last_played.insert(game.away.team_id.as_str(), game.date);
        }
        Ok(bets)
    }
}

fn rest_hours(previous: Option<&DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    let previous = *previous?;
    Some((now - previous).num_minutes() as f64 / 60.0)
}
