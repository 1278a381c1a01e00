//! Wagerlab Engine — scrapers, backtests, and wager statistics
//!
//! Self-contained research crate for historical sports wagering.
//! Provides:
//! - NHL and NBA stats API scrapers plus an odds archive feed client
//! - Markov chain playoff model with fitted logistic strength curves
//! - Season replay engine with streak, rest, and dutching rules
//! - Synthetic control score prediction for NBA playoff games
//! - Significance, correlation, ruin, and long-shot bias analysis

pub mod api;
pub mod arbitrage;
pub mod backtest;
pub mod dataset;
pub mod markov;
pub mod numeric;
pub mod stats;
pub mod strategies;
pub mod synthetic;
pub mod types;
pub mod wager;

// Re-exports for convenience
pub use api::{NbaClient, NhlClient, OddsFeedClient};
pub use arbitrage::{dutch_game, run_dutch_replay, ArbitrageConfig, DutchBook, DutchReport};
pub use backtest::{archive_report, BacktestConfig, BacktestEngine, SeasonData};
pub use markov::{BetMatrix, MarkovModel};
pub use numeric::{fit_logistic, LogisticCurve};
pub use stats::correlation::StrategySeries;
pub use strategies::{MarkovPlayoff, RestFade, StreakFade, Strategy, StrategyBet};
pub use synthetic::{predict_playoffs, ScorePrediction, SyntheticConfig};
pub use types::*;
pub use wager::{recommend, WagerCandidate, WagerTicket};
