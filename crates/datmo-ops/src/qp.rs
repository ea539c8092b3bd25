//! Dense convex quadratic programming on the scaled simplex.
//!
//! Solves
//!
//! ```text
//! minimize    ½ xᵀ H x + fᵀ x
//! subject to  x ≥ 0,  Σ x = D
//! ```
//!
//! with a primal active-set method. `H` is made strictly positive definite
//! by a small ridge, so every equality-constrained subproblem has a unique
//! solution obtained from the KKT system
//!
//! ```text
//! [ H_FF  1 ] [ x_F ]   [ -f_F ]
//! [ 1ᵀ    0 ] [ ν   ] = [  D   ]
//! ```
//!
//! over the free set `F`. Multipliers of bound constraints are
//! `μ_i = (Hx + f)_i + ν`; a negative one releases its variable.
//!
//! # Example
//!
//! ```rust
//! use datmo_ops::qp::QuadraticProgram;
//!
//! // Two variables sharing a unit budget, the first twice as attractive.
//! let mut qp = QuadraticProgram::new(2, 1.0);
//! qp.add_squared_residual(0, 1, 1.0, 0.8);
//! qp.add_squared_residual(1, 2, 1.0, 0.4);
//! let sol = qp.solve(None).unwrap();
//! assert!(sol.converged);
//! assert!((sol.x[0] - 0.7).abs() < 1e-6);
//! assert!((sol.x[1] - 0.3).abs() < 1e-6);
//! ```

use crate::{TmoError, TmoResult};
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Relative ridge added to the Hessian diagonal.
const RIDGE: f64 = 1e-10;

/// Result of a QP solve.
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    /// Feasible minimiser (or last feasible iterate when not converged).
    pub x: Vec<f64>,
    /// Active-set iterations performed.
    pub iterations: usize,
    /// `false` when the iteration cap stopped the solver.
    pub converged: bool,
}

/// Quadratic objective with non-negativity and a fixed sum.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticProgram {
    n: usize,
    hessian: Vec<f64>,
    linear: Vec<f64>,
    total: f64,
}

impl QuadraticProgram {
    /// Zero objective over `n` variables summing to `total`.
    pub fn new(n: usize, total: f64) -> Self {
        Self {
            n,
            hessian: vec![0.0; n * n],
            linear: vec![0.0; n],
            total,
        }
    }

    /// Number of variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    /// `true` when there are no variables.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Required sum of the variables.
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Hessian entry `H[i][j]`.
    #[inline]
    pub fn hessian(&self, i: usize, j: usize) -> f64 {
        self.hessian[i * self.n + j]
    }

    /// Linear term `f[i]`.
    #[inline]
    pub fn linear(&self, i: usize) -> f64 {
        self.linear[i]
    }

    /// Adds `weight * (Σ_{k in lo..hi} x_k − target)²` to the objective.
    pub fn add_squared_residual(&mut self, lo: usize, hi: usize, weight: f64, target: f64) {
        debug_assert!(lo < hi && hi <= self.n);
        let w2 = 2.0 * weight;
        for i in lo..hi {
            let row = i * self.n;
            for j in lo..hi {
                self.hessian[row + j] += w2;
            }
            self.linear[i] -= w2 * target;
        }
    }

    /// Objective value at `x`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        let mut acc = 0.0;
        for i in 0..self.n {
            let hx: f64 = (0..self.n).map(|j| self.hessian(i, j) * x[j]).sum();
            acc += x[i] * (0.5 * hx + self.linear[i]);
        }
        acc
    }

    fn gradient(&self, h: &[f64], x: &[f64]) -> Vec<f64> {
        (0..self.n)
            .map(|i| {
                let row = &h[i * self.n..(i + 1) * self.n];
                row.iter().zip(x).map(|(a, b)| a * b).sum::<f64>() + self.linear[i]
            })
            .collect()
    }

    /// Solves the program, optionally warm-started from `start`.
    ///
    /// A warm start is projected onto the feasible set first (negatives
    /// clipped, then rescaled to the required sum). Fails with
    /// [`TmoError::Infeasible`] when the constraints admit no point or the
    /// data is not finite; hitting the iteration cap is not an error.
    pub fn solve(&self, start: Option<&[f64]>) -> TmoResult<QpSolution> {
        let n = self.n;
        let d = self.total;
        if !d.is_finite() || d < 0.0 {
            return Err(TmoError::Infeasible(format!("variable sum must be >= 0, got {d}")));
        }
        if n == 0 {
            if d > 0.0 {
                return Err(TmoError::Infeasible(format!(
                    "no variables to carry a sum of {d}"
                )));
            }
            return Ok(QpSolution {
                x: Vec::new(),
                iterations: 0,
                converged: true,
            });
        }
        if self.hessian.iter().chain(&self.linear).any(|v| !v.is_finite()) {
            return Err(TmoError::Infeasible("objective contains non-finite values".into()));
        }
        if d == 0.0 {
            return Ok(QpSolution {
                x: vec![0.0; n],
                iterations: 0,
                converged: true,
            });
        }

        let mut h = self.hessian.clone();
        let scale = (0..n).map(|i| h[i * n + i].abs()).fold(1.0f64, f64::max);
        for i in 0..n {
            h[i * n + i] += RIDGE * scale;
        }

        let mut x = initial_point(start, n, d);
        let mut free: Vec<bool> = x.iter().map(|&v| v > 0.0).collect();
        let max_iter = 10 * n + 50;

        for iter in 1..=max_iter {
            let idx: Vec<usize> = (0..n).filter(|&i| free[i]).collect();
            let (x_free, nu) = self.solve_kkt(&h, &idx)?;

            // Longest step towards the subproblem minimum keeping x >= 0
            let mut alpha = 1.0f64;
            let mut blocking = None;
            for (&i, &target) in idx.iter().zip(&x_free) {
                let p = target - x[i];
                if p < 0.0 && x[i] + p < 0.0 {
                    let a = x[i] / -p;
                    if a < alpha {
                        alpha = a;
                        blocking = Some(i);
                    }
                }
            }
            for (&i, &target) in idx.iter().zip(&x_free) {
                x[i] = (x[i] + alpha * (target - x[i])).max(0.0);
            }
            if let Some(i) = blocking {
                trace!(iter, var = i, alpha, "bound becomes active");
                x[i] = 0.0;
                free[i] = false;
                continue;
            }

            // x minimises the subproblem; check the bound multipliers
            let g = self.gradient(&h, &x);
            let g_scale = g.iter().fold(1.0f64, |m, v| m.max(v.abs()));
            let release = (0..n)
                .filter(|&i| !free[i])
                .map(|i| (i, g[i] + nu))
                .filter(|&(_, mu)| mu < -1e-10 * g_scale)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match release {
                Some((i, mu)) => {
                    trace!(iter, var = i, mu, "release bound");
                    free[i] = true;
                }
                None => {
                    trace!(iter, "qp converged");
                    return Ok(QpSolution {
                        x,
                        iterations: iter,
                        converged: true,
                    });
                }
            }
        }

        debug!(max_iter, "qp iteration cap reached");
        Ok(QpSolution {
            x,
            iterations: max_iter,
            converged: false,
        })
    }

    /// Solves the equality-constrained subproblem over the free set `idx`.
    fn solve_kkt(&self, h: &[f64], idx: &[usize]) -> TmoResult<(Vec<f64>, f64)> {
        let n = self.n;
        let m = idx.len() + 1;
        let mut a = vec![0.0; m * m];
        let mut b = vec![0.0; m];
        for (r, &i) in idx.iter().enumerate() {
            for (c, &j) in idx.iter().enumerate() {
                a[r * m + c] = h[i * n + j];
            }
            a[r * m + m - 1] = 1.0;
            a[(m - 1) * m + r] = 1.0;
            b[r] = -self.linear[i];
        }
        b[m - 1] = self.total;

        lu_solve(&mut a, &mut b, m)
            .ok_or_else(|| TmoError::Infeasible("singular KKT system".into()))?;
        let nu = b[m - 1];
        b.truncate(m - 1);
        Ok((b, nu))
    }
}

fn initial_point(start: Option<&[f64]>, n: usize, d: f64) -> Vec<f64> {
    if let Some(s) = start.filter(|s| s.len() == n) {
        let clipped: Vec<f64> = s
            .iter()
            .map(|&v| if v.is_finite() { v.max(0.0) } else { 0.0 })
            .collect();
        let sum: f64 = clipped.iter().sum();
        if sum > 0.0 {
            return clipped.into_iter().map(|v| v * d / sum).collect();
        }
    }
    vec![d / n as f64; n]
}

/// Gaussian elimination with partial pivoting; the solution replaces `b`.
fn lu_solve(a: &mut [f64], b: &mut [f64], n: usize) -> Option<()> {
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    for k in 0..n {
        let pivot = (k..n).max_by(|&i, &j| a[i * n + k].abs().total_cmp(&a[j * n + k].abs()))?;
        if a[pivot * n + k].abs() <= 1e-14 * scale {
            return None;
        }
        if pivot != k {
            for c in 0..n {
                a.swap(k * n + c, pivot * n + c);
            }
            b.swap(k, pivot);
        }
        let inv = 1.0 / a[k * n + k];
        for r in k + 1..n {
            let factor = a[r * n + k] * inv;
            if factor == 0.0 {
                continue;
            }
            for c in k..n {
                a[r * n + c] -= factor * a[k * n + c];
            }
            b[r] -= factor * b[k];
        }
    }
    for k in (0..n).rev() {
        let mut acc = b[k];
        for c in k + 1..n {
            acc -= a[k * n + c] * b[c];
        }
        b[k] = acc / a[k * n + k];
    }
    Some(())
}
