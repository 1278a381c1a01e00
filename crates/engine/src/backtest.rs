//! Strategy replay over historical seasons.
//!
//! Seasons are replayed in order and the bankroll carries across them, so an
//! equity curve covers a decade the way a real bettor would have lived it.
//! Settlement follows the wager convention: an odds-scaled bet stakes
//! `unit * odds`, paying (odds - 1) * odds * unit on a win and losing the
//! whole stake otherwise. Overtime ties settle as losses.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use persistence::repository::backtests::{BacktestRepository, BacktestRunRecord};
use persistence::SqlitePool;

use crate::strategies::Strategy;
use crate::types::{
    BacktestReport, BetRecord, EquityPoint, GamePair, GameSide, GameWinner, MatchOdds, Pick,
    Season,
};

/// Stake and bankroll settings for a replay
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Base unit; odds-scaled bets put `unit * odds` on the line
    pub unit: Decimal,
    pub initial_notional: Decimal,
    /// Flat staking bets `unit` regardless of the price
    pub flat_stakes: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            unit: dec!(100),
            initial_notional: dec!(2000),
            flat_stakes: false,
        }
    }
}

/// One season's priced games, ordered by game id
#[derive(Debug, Clone)]
pub struct SeasonData {
    pub season: Season,
    pub games: Vec<GamePair>,
}

/// Stake and settled return for a pick at the game's closing odds
pub fn settle(
    pick: Pick,
    winner: GameWinner,
    odds: &MatchOdds,
    unit: Decimal,
    flat: bool,
) -> (Decimal, Decimal) {
    let side = match pick {
        Pick::Home => GameSide::Home,
        Pick::Away => GameSide::Away,
        Pick::Skip => return (Decimal::ZERO, Decimal::ZERO),
    };
    let price = odds.for_side(side);
    let stake = if flat { unit } else { unit * price };
    let wager_return = if winner.label_for(side) == 1 {
        (price - Decimal::ONE) * stake
    } else {
        -stake
    };
    (stake, wager_return)
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Replays `strategy` across the seasons, carrying the bankroll forward
    pub fn run(&self, strategy: &dyn Strategy, seasons: &[SeasonData]) -> Result<BacktestReport> {
        let mut bets: Vec<BetRecord> = Vec::new();
        let mut curve: Vec<EquityPoint> = Vec::new();
        let mut notional = self.config.initial_notional;
        let mut games_considered = 0u32;
        let mut wins = 0u32;
        let mut losses = 0u32;
        let mut game_number = 0usize;

        if let Some(first) = seasons.first() {
            curve.push(EquityPoint {
                game_number: 0,
                season: first.season,
                notional,
            });
        }

        for season_data in seasons {
            let season_start = notional;
            let selected = strategy.select(&season_data.games)?;
            games_considered += season_data.games.len() as u32;

            for bet in &selected {
                let game = season_data
                    .games
                    .get(bet.pair_index)
                    .context("strategy selected a game outside the season")?;
                let (stake, wager_return) = settle(
                    bet.pick,
                    game.winner,
                    &game.odds,
                    self.config.unit,
                    self.config.flat_stakes,
                );
                if let Some(side) = match bet.pick {
                    Pick::Home => Some(GameSide::Home),
                    Pick::Away => Some(GameSide::Away),
                    Pick::Skip => None,
                } {
                    if game.winner.label_for(side) == 1 {
                        wins += 1;
                    } else {
                        losses += 1;
                    }
                }

                notional += wager_return;
                game_number += 1;
                curve.push(EquityPoint {
                    game_number,
                    season: season_data.season,
                    notional,
                });
                bets.push(BetRecord {
                    game_id: game.game_id.clone(),
                    season: season_data.season,
                    odds: game.odds,
                    winner: game.winner,
                    prediction: bet.pick,
                    stake,
                    wager_return,
                });
            }

            info!(
                season = %season_data.season,
                bets = selected.len(),
                season_pnl = %(notional - season_start),
                notional = %notional,
                "season replayed"
            );
        }

        let mut peak = self.config.initial_notional;
        let mut max_drawdown = Decimal::ZERO;
        for point in &curve {
            if point.notional > peak {
                peak = point.notional;
            }
            let drawdown = peak - point.notional;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        let decided = wins + losses;
        let hit_rate = if decided > 0 {
            (Decimal::from(wins) * dec!(100) / Decimal::from(decided)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(BacktestReport {
            strategy: strategy.name().to_string(),
            seasons: seasons.iter().map(|s| s.season).collect(),
            games_considered,
            bets_placed: bets.len() as u32,
            wins,
            losses,
            hit_rate,
            total_return: notional - self.config.initial_notional,
            initial_notional: self.config.initial_notional,
            final_notional: notional,
            max_drawdown,
            bets,
            equity_curve: curve,
        })
    }
}

// ============================================================================
// Run archive
// ============================================================================

/// Identifies a run by what produced it, not when it ran
pub fn params_hash(strategy: &str, seasons: &str, params: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", strategy, seasons, params));
    format!("{:x}", hasher.finalize())
}

/// Stores a run summary keyed by its parameter hash; repeat runs are no-ops
pub async fn archive_report(
    pool: &SqlitePool,
    report: &BacktestReport,
    params: &Value,
) -> Result<()> {
    let seasons = report
        .seasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let params_json = serde_json::to_string(params)?;
    let hash = params_hash(&report.strategy, &seasons, &params_json);

    let repo = BacktestRepository::new(pool);
    if repo.exists_by_hash(&hash).await? {
        debug!(strategy = %report.strategy, "run already archived");
        return Ok(());
    }

    let record = BacktestRunRecord {
        id: None,
        params_hash: hash,
        strategy_name: report.strategy.clone(),
        seasons,
        params: params_json,
        games_considered: i64::from(report.games_considered),
        bets_placed: i64::from(report.bets_placed),
        wins: i64::from(report.wins),
        losses: i64::from(report.losses),
        hit_rate: report.hit_rate.to_string(),
        total_return: report.total_return.to_string(),
        final_notional: report.final_notional.to_string(),
        max_drawdown: Some(report.max_drawdown.to_string()),
        created_at: None,
    };
    let id = repo.save(&record).await?;
    info!(id, strategy = %report.strategy, "backtest run archived");
    Ok(())
}
