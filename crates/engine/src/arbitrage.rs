//! Dutching across the three-way moneyline.
//!
//! Best prices are taken per leg across the allowed books. When the implied
//! probabilities sum below one (k = 1/h + 1/t + 1/a < 1), staking
//! `bankroll / (k * odds)` on every leg pays `bankroll / k` whichever way the
//! game goes, locking `bankroll * (1 - k) / k` before the puck drops. The
//! ledger keeps every priced game so the equity curve shows how rarely the
//! books leave money on the table.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::backtest::SeasonData;
use crate::types::{EquityPoint, GameWinner, MatchOdds, Season};

#[derive(Debug, Clone)]
pub struct ArbitrageConfig {
    /// Budget committed per game; profits accumulate but are not re-staked
    pub bankroll: Decimal,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            bankroll: dec!(5000),
        }
    }
}

/// Per-leg stakes for one game, zero when no arbitrage exists
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutchStakes {
    pub home: Decimal,
    pub tie: Decimal,
    pub away: Decimal,
}

impl DutchStakes {
    pub const ZERO: Self = Self {
        home: Decimal::ZERO,
        tie: Decimal::ZERO,
        away: Decimal::ZERO,
    };

    pub fn total(&self) -> Decimal {
        self.home + self.tie + self.away
    }
}

/// One ledger row of the dutching replay
#[derive(Debug, Clone)]
pub struct DutchBook {
    pub game_id: String,
    pub season: Season,
    pub odds: MatchOdds,
    pub winner: GameWinner,
    pub stakes: DutchStakes,
    pub locked_return: Decimal,
}

#[derive(Debug, Clone)]
pub struct DutchReport {
    pub seasons: Vec<Season>,
    pub games_considered: u32,
    pub opportunities: u32,
    pub total_return: Decimal,
    pub initial_notional: Decimal,
    pub final_notional: Decimal,
    pub books: Vec<DutchBook>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Stakes and locked profit for one game's best prices.
///
/// Any unpriced leg kills the book: equal payout across all three outcomes
/// needs every leg covered.
pub fn dutch_game(odds: &MatchOdds, bankroll: Decimal) -> (DutchStakes, Decimal) {
    if !odds.is_complete() {
        return (DutchStakes::ZERO, Decimal::ZERO);
    }
    let k = Decimal::ONE / odds.home + Decimal::ONE / odds.tie + Decimal::ONE / odds.away;
    if k >= Decimal::ONE {
        return (DutchStakes::ZERO, Decimal::ZERO);
    }
    let payout = bankroll / k;
    let stakes = DutchStakes {
        home: payout / odds.home,
        tie: payout / odds.tie,
        away: payout / odds.away,
    };
    (stakes, payout - bankroll)
}

/// Replays the dutching book over the priced games of each season
pub fn run_dutch_replay(seasons: &[SeasonData], config: &ArbitrageConfig) -> DutchReport {
    let mut books: Vec<DutchBook> = Vec::new();
    let mut curve: Vec<EquityPoint> = Vec::new();
    let mut notional = config.bankroll;
    let mut opportunities = 0u32;
    let mut game_number = 0usize;

    if let Some(first) = seasons.first() {
        curve.push(EquityPoint {
            game_number: 0,
            season: first.season,
            notional,
        });
    }

    for season_data in seasons {
        let mut season_locked = Decimal::ZERO;

        for game in &season_data.games {
            let (stakes, locked_return) = dutch_game(&game.odds, config.bankroll);
            if locked_return > Decimal::ZERO {
                opportunities += 1;
                season_locked += locked_return;
            }

            notional += locked_return;
            game_number += 1;
            curve.push(EquityPoint {
                game_number,
                season: season_data.season,
                notional,
            });
            books.push(DutchBook {
                game_id: game.game_id.clone(),
                season: season_data.season,
                odds: game.odds,
                winner: game.winner,
                stakes,
                locked_return,
            });
        }

        info!(
            season = %season_data.season,
            games = season_data.games.len(),
            locked = %season_locked,
            "season scanned for arbitrage"
        );
    }

    DutchReport {
        seasons: seasons.iter().map(|s| s.season).collect(),
        games_considered: books.len() as u32,
        opportunities,
        total_return: notional - config.bankroll,
        initial_notional: config.bankroll,
        final_notional: notional,
        books,
        equity_curve: curve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GamePair, GameType, TeamSide};
    use chrono::TimeZone;

    fn priced_game(id: &str, home: Decimal, tie: Decimal, away: Decimal) -> GamePair {
        GamePair {
            game_id: id.to_string(),
            season: Season::of_game_id(id).unwrap(),
            game_type: GameType::Regular,
            date: chrono::Utc.with_ymd_and_hms(2017, 11, 4, 0, 0, 0).unwrap(),
            home: TeamSide {
                team_id: "5".to_string(),
                team_name: "Team 5".to_string(),
                goals: 2,
            },
            away: TeamSide {
                team_id: "17".to_string(),
                team_name: "Team 17".to_string(),
                goals: 4,
            },
            winner: GameWinner::Away,
            ot_winner: GameWinner::Away,
            final_period: 3,
            odds: MatchOdds { home, tie, away },
        }
    }

    #[test]
    fn dutch_book_locks_equal_payout() {
        // k = 1/2 + 1/10 + 1/5 = 0.8, payout 5000 / 0.8 = 6250
        let odds = MatchOdds {
            home: dec!(2),
            tie: dec!(10),
            away: dec!(5),
        };
        let (stakes, locked) = dutch_game(&odds, dec!(5000));

        assert_eq!(stakes.home, dec!(3125));
        assert_eq!(stakes.tie, dec!(625));
        assert_eq!(stakes.away, dec!(1250));
        assert_eq!(stakes.total(), dec!(5000));
        assert_eq!(locked, dec!(1250));

        // Every outcome pays the same
        assert_eq!(stakes.home * odds.home, dec!(6250));
        assert_eq!(stakes.tie * odds.tie, dec!(6250));
        assert_eq!(stakes.away * odds.away, dec!(6250));
    }

    #[test]
    fn overround_book_stays_flat() {
        // k = 1/1.90 + 1/4.20 + 1/2.00 > 1
        let odds = MatchOdds {
            home: dec!(1.90),
            tie: dec!(4.20),
            away: dec!(2.00),
        };
        let (stakes, locked) = dutch_game(&odds, dec!(5000));
        assert_eq!(stakes, DutchStakes::ZERO);
        assert_eq!(locked, Decimal::ZERO);
    }

    #[test]
    fn missing_leg_kills_the_book() {
        // Without the tie leg k would be under one, but the tie outcome
        // would wipe the other two stakes
        let odds = MatchOdds {
            home: dec!(3.00),
            tie: Decimal::ZERO,
            away: dec!(3.50),
        };
        let (stakes, locked) = dutch_game(&odds, dec!(5000));
        assert_eq!(stakes, DutchStakes::ZERO);
        assert_eq!(locked, Decimal::ZERO);
    }

    #[test]
    fn replay_keeps_every_priced_game() {
        let seasons = vec![SeasonData {
            season: Season(2017),
            games: vec![
                priced_game("2017020001", dec!(2), dec!(10), dec!(5)),
                priced_game("2017020002", dec!(1.90), dec!(4.20), dec!(2.00)),
            ],
        }];

        let report = run_dutch_replay(&seasons, &ArbitrageConfig::default());

        assert_eq!(report.games_considered, 2);
        assert_eq!(report.opportunities, 1);
        assert_eq!(report.total_return, dec!(1250));
        assert_eq!(report.final_notional, dec!(6250));
        assert_eq!(report.books.len(), 2);
        assert_eq!(report.books[1].locked_return, Decimal::ZERO);

        let notionals: Vec<Decimal> = report
            .equity_curve
            .iter()
            .map(|point| point.notional)
            .collect();
        assert_eq!(notionals, vec![dec!(5000), dec!(6250), dec!(6250)]);
    }
}
