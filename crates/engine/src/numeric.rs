//! Dense linear solves and logistic curve fitting.
//!
//! The win-probability curve has the form:
//!
//!   p(x) = exp(-(a*x + b)) / (1 + exp(-(a*x + b)))
//!
//! which is a two-parameter logistic in the score differential x. Fitting is
//! least squares: a linearized seed (log-odds regression) refined by damped
//! Gauss-Newton steps.

use std::fmt;

use thiserror::Error;

const MAX_FIT_ITERATIONS: usize = 200;
const PROBABILITY_CLIP: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum NumericError {
    #[error("singular linear system")]
    Singular,
    #[error("curve fit needs at least {min} points, got {got}")]
    NotEnoughPoints { min: usize, got: usize },
}

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Consumes its inputs; `a` must be square and `b` the matching length.
pub fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, NumericError> {
    let n = b.len();
    debug_assert!(a.len() == n && a.iter().all(|row| row.len() == n));

    for col in 0..n {
        // Pivot on the largest remaining entry in this column
        let pivot_row = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or(NumericError::Singular)?;
        if a[pivot_row][col].abs() < 1e-12 {
            return Err(NumericError::Singular);
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for col in (row + 1)..n {
            sum -= a[row][col] * x[col];
        }
        x[row] = sum / a[row][row];
    }
    Ok(x)
}

/// A fitted two-parameter logistic win-probability curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticCurve {
    pub a: f64,
    pub b: f64,
}

impl LogisticCurve {
    /// Win probability at differential `x`
    pub fn eval(&self, x: f64) -> f64 {
        1.0 / (1.0 + (self.a * x + self.b).exp())
    }
}

impl fmt::Display for LogisticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p(x) = exp(-({:.6}x + {:.6})) / (1 + exp(-({:.6}x + {:.6})))",
            self.a, self.b, self.a, self.b
        )
    }
}

/// Fits the logistic curve to `(x, probability)` points.
pub fn fit_logistic(points: &[(f64, f64)]) -> Result<LogisticCurve, NumericError> {
    if points.len() < 2 {
        return Err(NumericError::NotEnoughPoints {
            min: 2,
            got: points.len(),
        });
    }

    // Seed from the linearization: ln(1/p - 1) = a*x + b
    let clipped: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, p)| (x, p.clamp(PROBABILITY_CLIP, 1.0 - PROBABILITY_CLIP)))
        .collect();
    let (mut sxx, mut sx, mut sxz, mut sz) = (0.0, 0.0, 0.0, 0.0);
    for &(x, p) in &clipped {
        let z = (1.0 / p - 1.0).ln();
        sxx += x * x;
        sx += x;
        sxz += x * z;
        sz += z;
    }
    let n = clipped.len() as f64;
    let seed = solve_linear(vec![vec![sxx, sx], vec![sx, n]], vec![sxz, sz])?;
    let mut curve = LogisticCurve {
        a: seed[0],
        b: seed[1],
    };

    // Damped Gauss-Newton refinement on the untransformed residuals
    let sse = |c: &LogisticCurve| -> f64 {
        clipped
            .iter()
            .map(|&(x, p)| {
                let r = c.eval(x) - p;
                r * r
            })
            .sum()
    };
    let mut best = sse(&curve);
    let mut lambda = 1e-3;
    for _ in 0..MAX_FIT_ITERATIONS {
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(x, p) in &clipped {
            let value = curve.eval(x);
            let slope = value * (1.0 - value);
            let da = -x * slope;
            let db = -slope;
            let r = value - p;
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let step = solve_linear(
            vec![
                vec![jaa * (1.0 + lambda), jab],
                vec![jab, jbb * (1.0 + lambda)],
            ],
            vec![-ga, -gb],
        );
        let step = match step {
            Ok(step) => step,
            Err(_) => {
                lambda *= 10.0;
                if lambda > 1e10 {
                    break;
                }
                continue;
            }
        };

        let trial = LogisticCurve {
            a: curve.a + step[0],
            b: curve.b + step[1],
        };
        let trial_sse = sse(&trial);
        if trial_sse.is_finite() && trial_sse < best {
            let improvement = best - trial_sse;
            curve = trial;
            best = trial_sse;
            lambda = (lambda / 10.0).max(1e-12);
            if improvement < 1e-12 {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e10 {
                break;
            }
        }
    }

    Ok(curve)
}
