//! Long-shot bias in closing prices.
//!
//! For every priced game three fixed policies are settled at unit stakes:
//! always back the favourite, always the tie, always the long shot. If the
//! books priced outcomes fairly the three mean returns would agree; a
//! one-way ANOVA says whether the gaps between them are real. Games where
//! the two sides trade at the same price have no favourite and are dropped.

use anyhow::{bail, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::info;

use crate::stats::{as_f64, mean, population_std};
use crate::types::{GamePair, GameSide, GameWinner};

/// Unit-stake returns of the three policies on one game
#[derive(Debug, Clone)]
pub struct PolicyReturns {
    pub game_id: String,
    pub favourite: f64,
    pub tie: f64,
    pub long_shot: f64,
}

#[derive(Debug, Clone)]
pub struct LongshotReport {
    pub games: Vec<PolicyReturns>,
    pub favourite_mean: f64,
    pub tie_mean: f64,
    pub long_shot_mean: f64,
    pub favourite_std: f64,
    pub tie_std: f64,
    pub long_shot_std: f64,
    pub f_statistic: f64,
    pub p_value: f64,
}

fn unit_return(odds: f64, won: bool) -> f64 {
    if won {
        odds - 1.0
    } else {
        -1.0
    }
}

fn policy_returns(pair: &GamePair) -> PolicyReturns {
    let home = as_f64(pair.odds.home);
    let away = as_f64(pair.odds.away);
    let (favourite_side, favourite_odds, long_shot_side, long_shot_odds) = if home < away {
        (GameSide::Home, home, GameSide::Away, away)
    } else {
        (GameSide::Away, away, GameSide::Home, home)
    };

    PolicyReturns {
        game_id: pair.game_id.clone(),
        favourite: unit_return(favourite_odds, pair.winner.label_for(favourite_side) == 1),
        tie: unit_return(as_f64(pair.odds.tie), pair.winner == GameWinner::Tie),
        long_shot: unit_return(long_shot_odds, pair.winner.label_for(long_shot_side) == 1),
    }
}

/// One-way ANOVA of the policy return groups
fn f_oneway(groups: &[&[f64]]) -> Result<(f64, f64)> {
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    let grand = mean(&groups.iter().flat_map(|g| g.iter().copied()).collect::<Vec<_>>());

    let ss_between: f64 = groups
        .iter()
        .map(|g| g.len() as f64 * (mean(g) - grand).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.iter().map(|x| (x - m).powi(2)).sum::<f64>()
        })
        .sum();

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    if ss_within == 0.0 {
        // Zero variance inside every group, the gaps are exact
        return Ok((f64::INFINITY, 0.0));
    }
    let f = (ss_between / df_between) / (ss_within / df_within);
    let dist = FisherSnedecor::new(df_between, df_within)?;
    Ok((f, 1.0 - dist.cdf(f)))
}

/// Settles the three policies across the merged seasons and tests the means
pub fn analyze(pairs: &[GamePair]) -> Result<LongshotReport> {
    let games: Vec<PolicyReturns> = pairs
        .iter()
        .filter(|pair| pair.odds.is_complete() && pair.odds.home != pair.odds.away)
        .map(policy_returns)
        .collect();

    if games.len() < 2 {
        bail!("long-shot study needs at least two priced games, got {}", games.len());
    }

    let favourites: Vec<f64> = games.iter().map(|g| g.favourite).collect();
    let ties: Vec<f64> = games.iter().map(|g| g.tie).collect();
    let long_shots: Vec<f64> = games.iter().map(|g| g.long_shot).collect();

    let (f_statistic, p_value) = f_oneway(&[&favourites, &ties, &long_shots])?;

    info!(
        games = games.len(),
        f_statistic, p_value, "long-shot bias tested"
    );
    Ok(LongshotReport {
        favourite_mean: mean(&favourites),
        tie_mean: mean(&ties),
        long_shot_mean: mean(&long_shots),
        favourite_std: population_std(&favourites),
        tie_std: population_std(&ties),
        long_shot_std: population_std(&long_shots),
        f_statistic,
        p_value,
        games,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameType, MatchOdds, Season, TeamSide};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn game(id: &str, home: Decimal, tie: Decimal, away: Decimal, winner: GameWinner) -> GamePair {
        GamePair {
            game_id: id.to_string(),
            season: Season::of_game_id(id).unwrap(),
            game_type: GameType::Regular,
            date: chrono::Utc.with_ymd_and_hms(2017, 12, 2, 0, 0, 0).unwrap(),
            home: TeamSide {
                team_id: "12".to_string(),
                team_name: "Team 12".to_string(),
                goals: 3,
            },
            away: TeamSide {
                team_id: "21".to_string(),
                team_name: "Team 21".to_string(),
                goals: 1,
            },
            winner,
            ot_winner: winner,
            final_period: 3,
            odds: MatchOdds { home, tie, away },
        }
    }

    #[test]
    fn favourite_is_the_shorter_side() {
        let returns = policy_returns(&game(
            "2017020001",
            dec!(1.50),
            dec!(4.00),
            dec!(2.50),
            GameWinner::Home,
        ));
        assert!((returns.favourite - 0.5).abs() < 1e-12);
        assert_eq!(returns.tie, -1.0);
        assert_eq!(returns.long_shot, -1.0);

        let returns = policy_returns(&game(
            "2017020002",
            dec!(3.00),
            dec!(3.80),
            dec!(1.40),
            GameWinner::Away,
        ));
        assert!((returns.favourite - 0.4).abs() < 1e-12);
        assert_eq!(returns.long_shot, -1.0);
    }

    #[test]
    fn tie_policy_pays_on_overtime() {
        let returns = policy_returns(&game(
            "2017020003",
            dec!(2.10),
            dec!(3.90),
            dec!(3.10),
            GameWinner::Tie,
        ));
        assert!((returns.tie - 2.9).abs() < 1e-12);
        assert_eq!(returns.favourite, -1.0);
        assert_eq!(returns.long_shot, -1.0);
    }

    #[test]
    fn anova_matches_hand_calculation() {
        let pairs = vec![
            game("2017020001", dec!(1.50), dec!(4.00), dec!(2.50), GameWinner::Home),
            game("2017020002", dec!(3.00), dec!(3.80), dec!(1.40), GameWinner::Away),
        ];

        let report = analyze(&pairs).unwrap();
        assert!((report.favourite_mean - 0.45).abs() < 1e-12);
        assert_eq!(report.tie_mean, -1.0);
        assert_eq!(report.long_shot_mean, -1.0);
        // SSB = 2.8033..., SSW = 0.005, df = (2, 3)
        assert!((report.f_statistic - 841.0).abs() < 1e-9);
        assert!(report.p_value < 0.001);
    }

    #[test]
    fn evenly_priced_games_are_dropped() {
        let pairs = vec![
            game("2017020001", dec!(2.00), dec!(4.00), dec!(2.00), GameWinner::Home),
            game("2017020002", dec!(1.80), Decimal::ZERO, dec!(2.30), GameWinner::Home),
        ];
        assert!(analyze(&pairs).is_err());
    }
}
