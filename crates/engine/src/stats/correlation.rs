//! Return correlation between strategies.
//!
//! Ledgers rarely cover the same games: the playoff model only bets in
//! spring, the dutching scan only where the books disagree. Each pairwise
//! coefficient therefore uses exactly the games both strategies wagered on,
//! and comes out NaN when they never overlap.

use std::collections::BTreeMap;

use crate::stats::as_f64;
use crate::types::BetRecord;

/// One strategy's per-game returns keyed by game id
#[derive(Debug, Clone)]
pub struct StrategySeries {
    pub name: String,
    pub returns: BTreeMap<String, f64>,
}

impl StrategySeries {
    pub fn from_bets(name: &str, bets: &[BetRecord]) -> Self {
        let returns = bets
            .iter()
            .map(|bet| (bet.game_id.clone(), as_f64(bet.wager_return)))
            .collect();
        Self {
            name: name.to_string(),
            returns,
        }
    }
}

/// Pearson coefficient over paired observations, NaN when degenerate
fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }

    let cov = n * sxy - sx * sy;
    let var_x = n * sxx - sx * sx;
    let var_y = n * syy - sy * sy;
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    cov / denom
}

/// Symmetric matrix of pairwise-complete correlations, in input order
pub fn correlation_matrix(series: &[StrategySeries]) -> Vec<Vec<f64>> {
    let n = series.len();
    let mut matrix = vec![vec![f64::NAN; n]; n];

    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = series[i]
                .returns
                .iter()
                .filter_map(|(game_id, &x)| series[j].returns.get(game_id).map(|&y| (x, y)))
                .collect();
            let r = pearson(&pairs);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, rows: &[(&str, f64)]) -> StrategySeries {
        StrategySeries {
            name: name.to_string(),
            returns: rows
                .iter()
                .map(|(id, v)| (id.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn identical_series_correlate_perfectly() {
        let a = series("a", &[("g1", 10.0), ("g2", -5.0), ("g3", 3.0)]);
        let b = series("b", &[("g1", 10.0), ("g2", -5.0), ("g3", 3.0)]);
        let c = series("c", &[("g1", -10.0), ("g2", 5.0), ("g3", -3.0)]);

        let matrix = correlation_matrix(&[a, b, c]);
        assert!((matrix[0][0] - 1.0).abs() < 1e-12);
        assert!((matrix[0][1] - 1.0).abs() < 1e-12);
        assert!((matrix[0][2] + 1.0).abs() < 1e-12);
        assert_eq!(matrix[1][2], matrix[2][1]);
    }

    #[test]
    fn only_shared_games_enter_the_pair() {
        // On the three shared games the series move together; the extra
        // games would wreck that if they leaked in
        let a = series(
            "a",
            &[("g1", 1.0), ("g2", 2.0), ("g3", 3.0), ("g9", -50.0)],
        );
        let b = series(
            "b",
            &[("g1", 2.0), ("g2", 4.0), ("g3", 6.0), ("g8", 100.0)],
        );

        let matrix = correlation_matrix(&[a, b]);
        assert!((matrix[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_series_have_no_coefficient() {
        let a = series("a", &[("g1", 1.0), ("g2", 2.0)]);
        let b = series("b", &[("g3", 1.0), ("g4", 2.0)]);

        let matrix = correlation_matrix(&[a, b]);
        assert!(matrix[0][1].is_nan());
        assert!((matrix[0][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_are_degenerate() {
        let a = series("a", &[("g1", 5.0), ("g2", 5.0), ("g3", 5.0)]);
        let b = series("b", &[("g1", 1.0), ("g2", 2.0), ("g3", 3.0)]);

        let matrix = correlation_matrix(&[a, b]);
        assert!(matrix[0][1].is_nan());
        assert!(matrix[0][0].is_nan());
    }
}
