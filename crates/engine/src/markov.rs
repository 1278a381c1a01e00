//! Markov chain team strength model.
//!
//! Each team occupies two states, one per venue, and regular season results
//! drive the chain:
//!
//! 1. Bucket games by goal differential; credit each bucket with the home
//!    result of the two teams' next meeting and fit a logistic
//!    win-probability curve over the differentials.
//! 2. Spread every game's curve probability over the two teams' venue states
//!    to build a row-stochastic transition matrix.
//! 3. Solve for the stationary distribution; a team's mass at home and away
//!    is its venue strength.
//! 4. Refit the logistic curve against strength differentials, crediting each
//!    pairing's observed home results.
//!
//! The refitted curve maps a home-away strength gap straight to a home win
//! probability, which is what the playoff strategy and the bet matrix use.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::numeric::{fit_logistic, solve_linear, LogisticCurve};
use crate::types::{GamePair, GameSide, Pick};

/// Stationary probability mass a team holds at each venue
#[derive(Debug, Clone, Copy)]
pub struct TeamStrength {
    pub home: f64,
    pub away: f64,
}

/// Home win probabilities for every pairing of modeled teams
#[derive(Debug, Clone)]
pub struct BetMatrix {
    pub teams: Vec<String>,
    /// `probs[i][j]` is P(team i at home beats team j on the road)
    pub probs: Vec<Vec<f64>>,
}

impl BetMatrix {
    pub fn home_win_probability(&self, home_id: &str, away_id: &str) -> Option<f64> {
        let row = self.teams.iter().position(|team| team == home_id)?;
        let col = self.teams.iter().position(|team| team == away_id)?;
        Some(self.probs[row][col])
    }
}

pub struct MarkovModel {
    pub teams: Vec<String>,
    pub goal_curve: LogisticCurve,
    pub steady_curve: LogisticCurve,
    strengths: HashMap<String, TeamStrength>,
}

impl MarkovModel {
    /// Fits the model to one season of regular season games, which must be
    /// ordered by game id.
    pub fn fit(regular: &[GamePair]) -> Result<MarkovModel> {
        if regular.is_empty() {
            anyhow::bail!("no regular season games to fit");
        }

        let teams = collect_teams(regular);
        debug!(teams = teams.len(), games = regular.len(), "fitting strength model");

        let goal_points = win_table(regular);
        let goal_curve = fit_logistic(&goal_points)
            .context("Failed to fit the goal differential curve")?;
        info!(samples = goal_points.len(), curve = %goal_curve, "goal differential curve");

        let transition = transition_matrix(regular, &goal_curve, &teams)?;
        let stationary = steady_state(transition)?;
        let strengths: HashMap<String, TeamStrength> = teams
            .iter()
            .enumerate()
            .map(|(i, team)| {
                (
                    team.clone(),
                    TeamStrength {
                        home: stationary[i * 2],
                        away: stationary[i * 2 + 1],
                    },
                )
            })
            .collect();

        let steady_points = steady_table(regular, &strengths);
        let steady_curve = fit_logistic(&steady_points)
            .context("Failed to fit the steady state curve")?;
        info!(samples = steady_points.len(), curve = %steady_curve, "steady state curve");

        Ok(MarkovModel {
            teams,
            goal_curve,
            steady_curve,
            strengths,
        })
    }

    pub fn strength(&self, team_id: &str) -> Option<&TeamStrength> {
        self.strengths.get(team_id)
    }

    /// Probability that `home_id` beats `away_id`, `None` for unmodeled teams
    pub fn home_win_probability(&self, home_id: &str, away_id: &str) -> Option<f64> {
        let home = self.strengths.get(home_id)?;
        let away = self.strengths.get(away_id)?;
        Some(self.steady_curve.eval(home.home - away.away))
    }

    /// Side to back at even stakes; the model never abstains
    pub fn predict(&self, home_id: &str, away_id: &str) -> Option<Pick> {
        let p = self.home_win_probability(home_id, away_id)?;
        Some(if p > 0.5 { Pick::Home } else { Pick::Away })
    }

    pub fn bet_matrix(&self) -> BetMatrix {
        let probs = self
            .teams
            .iter()
            .map(|home| {
                self.teams
                    .iter()
                    .map(|away| {
                        self.home_win_probability(home, away)
                            .unwrap_or(0.5)
                    })
                    .collect()
            })
            .collect();
        BetMatrix {
            teams: self.teams.clone(),
            probs,
        }
    }
}

/// Distinct team ids in numeric order
fn collect_teams(regular: &[GamePair]) -> Vec<String> {
    let unique: BTreeSet<&str> = regular
        .iter()
        .flat_map(|game| [game.home.team_id.as_str(), game.away.team_id.as_str()])
        .collect();
    let mut teams: Vec<String> = unique.into_iter().map(str::to_string).collect();
    teams.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    });
    teams
}

#[derive(Default)]
struct Tally {
    wins: f64,
    games: u32,
}

/// Win probability per goal differential.
///
/// Each game's differential is credited with the home result of the same
/// pairing's next meeting, so a bucket answers "after winning at home by d,
/// how does the rematch go?".
fn win_table(regular: &[GamePair]) -> Vec<(f64, f64)> {
    let mut buckets: BTreeMap<i32, Tally> = BTreeMap::new();
    for (i, game) in regular.iter().enumerate() {
        let next = regular[i + 1..].iter().find(|later| {
            later.id_num() > game.id_num()
                && later.home.team_id == game.home.team_id
                && later.away.team_id == game.away.team_id
        });
        let Some(next) = next else {
            continue;
        };
        let tally = buckets.entry(game.goal_diff()).or_default();
        tally.wins += next.winner.credit_for(GameSide::Home);
        tally.games += 1;
    }
    buckets
        .into_iter()
        .map(|(diff, tally)| (f64::from(diff), tally.wins / f64::from(tally.games)))
        .collect()
}

/// Row-stochastic transition matrix over the 2T venue states
fn transition_matrix(
    regular: &[GamePair],
    curve: &LogisticCurve,
    teams: &[String],
) -> Result<Vec<Vec<f64>>> {
    let index: HashMap<&str, usize> = teams
        .iter()
        .enumerate()
        .map(|(i, team)| (team.as_str(), i))
        .collect();
    let n = teams.len() * 2;
    let mut matrix = vec![vec![0.0; n]; n];
    let mut counts = vec![0u32; n];

    for game in regular {
        let home_slot = index
            .get(game.home.team_id.as_str())
            .context("home team missing from index")?
            * 2;
        let away_slot = index
            .get(game.away.team_id.as_str())
            .context("away team missing from index")?
            * 2
            + 1;
        let p = curve.eval(f64::from(game.goal_diff()));
        for row in [home_slot, away_slot] {
            for col in [home_slot, away_slot] {
                matrix[row][col] += if col == away_slot { 1.0 - p } else { p };
            }
            counts[row] += 1;
        }
    }

    for (slot, count) in counts.iter().enumerate() {
        if *count == 0 {
            anyhow::bail!(
                "team {} has no {} games to estimate transitions",
                teams[slot / 2],
                if slot % 2 == 0 { "home" } else { "away" }
            );
        }
        for col in 0..n {
            matrix[slot][col] /= f64::from(*count);
        }
    }
    Ok(matrix)
}

/// Stationary distribution of the chain: solve (P - I)' x = 0 with the last
/// balance equation swapped for the requirement that x sums to one
fn steady_state(transition: Vec<Vec<f64>>) -> Result<Vec<f64>> {
    let n = transition.len();
    let mut a = vec![vec![0.0; n]; n];
    for row in 0..n {
        for col in 0..n {
            a[col][row] = transition[row][col] - if row == col { 1.0 } else { 0.0 };
        }
    }
    a[n - 1] = vec![1.0; n];
    let mut b = vec![0.0; n];
    b[n - 1] = 1.0;
    solve_linear(a, b).context("Failed to solve for the stationary distribution")
}

/// Win probability per strength differential, bucketed by exact value so each
/// ordered pairing lands in one bucket
fn steady_table(
    regular: &[GamePair],
    strengths: &HashMap<String, TeamStrength>,
) -> Vec<(f64, f64)> {
    let mut buckets: HashMap<u64, Tally> = HashMap::new();
    for game in regular {
        let (Some(home), Some(away)) = (
            strengths.get(&game.home.team_id),
            strengths.get(&game.away.team_id),
        ) else {
            continue;
        };
        let diff = home.home - away.away;
        let tally = buckets.entry(diff.to_bits()).or_default();
        tally.wins += game.winner.credit_for(GameSide::Home);
        tally.games += 1;
    }
    let mut points: Vec<(f64, f64)> = buckets
        .into_iter()
        .map(|(bits, tally)| (f64::from_bits(bits), tally.wins / f64::from(tally.games)))
        .collect();
    points.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));
    points
}
