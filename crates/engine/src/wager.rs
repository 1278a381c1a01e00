//! Wager tickets for upcoming games from a fitted bet matrix.
//!
//! The bet matrix is the season's model exported ahead of time; at game time
//! the only manual input is the best legitimate price per side. Each
//! candidate gets the model's side, the stake at the wager convention, and a
//! pseudo expected value per unit staked for ranking. A candidate whose
//! teams never appeared in the fitted season is skipped rather than aborting
//! the whole slate.

use rust_decimal::Decimal;
use tracing::warn;

use crate::markov::BetMatrix;
use crate::stats::as_f64;
use crate::types::GameSide;

/// An upcoming game with the best price found per side
#[derive(Debug, Clone)]
pub struct WagerCandidate {
    pub game_id: String,
    pub home_id: String,
    pub home_name: String,
    pub away_id: String,
    pub away_name: String,
    pub home_odds: Decimal,
    pub away_odds: Decimal,
}

/// A recommended bet, ranked by pseudo expected value
#[derive(Debug, Clone)]
pub struct WagerTicket {
    pub game_id: String,
    pub side: GameSide,
    pub team_id: String,
    pub team_name: String,
    pub odds: Decimal,
    pub stake: Decimal,
    pub win_probability: f64,
    /// `P(pick) * odds - 1`, positive when the model disagrees with the price
    pub pseudo_ev: f64,
}

/// Prices every candidate against the matrix, best value first
pub fn recommend(
    matrix: &BetMatrix,
    candidates: &[WagerCandidate],
    unit: Decimal,
) -> Vec<WagerTicket> {
    let mut tickets: Vec<WagerTicket> = candidates
        .iter()
        .filter_map(|candidate| {
            let home_win = match matrix.home_win_probability(&candidate.home_id, &candidate.away_id)
            {
                Some(p) => p,
                None => {
                    warn!(
                        game_id = %candidate.game_id,
                        home = %candidate.home_id,
                        away = %candidate.away_id,
                        "candidate teams missing from the bet matrix, skipping"
                    );
                    return None;
                }
            };

            let (side, team_id, team_name, odds, win_probability) = if home_win > 0.5 {
                (
                    GameSide::Home,
                    candidate.home_id.clone(),
                    candidate.home_name.clone(),
                    candidate.home_odds,
                    home_win,
                )
            } else {
                (
                    GameSide::Away,
                    candidate.away_id.clone(),
                    candidate.away_name.clone(),
                    candidate.away_odds,
                    1.0 - home_win,
                )
            };

            Some(WagerTicket {
                game_id: candidate.game_id.clone(),
                side,
                team_id,
                team_name,
                odds,
                stake: unit * odds,
                win_probability,
                pseudo_ev: win_probability * as_f64(odds) - 1.0,
            })
        })
        .collect();

    tickets.sort_by(|a, b| b.pseudo_ev.total_cmp(&a.pseudo_ev));
    tickets
}
