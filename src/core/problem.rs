//! Test-problem descriptors and the built-in problem registry.
//!
//! A problem is a square or overdetermined nonlinear system `r(x) = 0` with
//! `r: ℝⁿ → ℝᵐ`, `m ≥ n`, presented as an immutable [`ProblemDescriptor`]:
//! a stable id, the residual and Jacobian evaluation functions, a canonical
//! starting point, and a feasible-set descriptor used to draw randomized
//! starting points.
//!
//! The registry ships the classic small nonlinear test systems
//! (Rosenbrock, Freudenstein-Roth, Powell badly scaled, Powell singular,
//! helical valley, Beale, Brown almost-linear, Broyden tridiagonal) with
//! analytic Jacobians. Ids are stable: they are never reused or renumbered,
//! so persisted result logs stay meaningful across releases.

use crate::core::CoreError;
use nalgebra::{DMatrix, DVector, dvector};
use rand::Rng;
use std::f64::consts::PI;

/// Feasible-set descriptor controlling where randomized starts are drawn.
#[derive(Debug, Clone)]
pub enum FeasibleSet {
    /// No constraints; random starts are drawn uniformly from a cube of the
    /// given half-width centered on the canonical starting point.
    Unbounded { radius: f64 },
    /// Axis-aligned box; random starts are drawn uniformly inside it.
    Box {
        lower: DVector<f64>,
        upper: DVector<f64>,
    },
}

/// Immutable description of one test problem.
///
/// Created once by the registry (or by callers defining their own systems)
/// and borrowed by the run driver for the duration of a trial.
#[derive(Debug, Clone)]
pub struct ProblemDescriptor {
    /// Stable identity; never reused or renumbered.
    pub id: u32,
    /// Human-readable name, also persisted in result rows.
    pub name: &'static str,
    /// Variable dimension.
    pub n: usize,
    /// Residual dimension (`m ≥ n`).
    pub m: usize,
    /// Canonical starting point.
    pub x0: DVector<f64>,
    /// Where randomized starts are drawn from.
    pub feasible: FeasibleSet,
    residual_fn: fn(&DVector<f64>) -> DVector<f64>,
    jacobian_fn: fn(&DVector<f64>) -> DMatrix<f64>,
}

impl ProblemDescriptor {
    /// Define a problem from its dimensions, canonical start, feasible set
    /// and analytic evaluation functions.
    pub fn new(
        id: u32,
        name: &'static str,
        n: usize,
        m: usize,
        x0: DVector<f64>,
        feasible: FeasibleSet,
        residual_fn: fn(&DVector<f64>) -> DVector<f64>,
        jacobian_fn: fn(&DVector<f64>) -> DMatrix<f64>,
    ) -> Self {
        Self {
            id,
            name,
            n,
            m,
            x0,
            feasible,
            residual_fn,
            jacobian_fn,
        }
    }

    /// Evaluate the residual vector `r(x)`.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        (self.residual_fn)(x)
    }

    /// Evaluate the Jacobian matrix `J(x) = ∂r/∂x` (m × n).
    pub fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        (self.jacobian_fn)(x)
    }

    /// Draw one randomized starting point from the feasible set.
    pub fn sample_start<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        match &self.feasible {
            FeasibleSet::Unbounded { radius } => DVector::from_iterator(
                self.n,
                self.x0.iter().map(|&c| rng.gen_range(c - radius..c + radius)),
            ),
            FeasibleSet::Box { lower, upper } => DVector::from_iterator(
                self.n,
                lower
                    .iter()
                    .zip(upper.iter())
                    .map(|(&lo, &hi)| rng.gen_range(lo..hi)),
            ),
        }
    }
}

/// All registered problems, in id order.
pub fn registry() -> Vec<ProblemDescriptor> {
    vec![
        ProblemDescriptor::new(
            1,
            "rosenbrock",
            2,
            2,
            dvector![-1.2, 1.0],
            FeasibleSet::Box {
                lower: dvector![-2.048, -2.048],
                upper: dvector![2.048, 2.048],
            },
            rosenbrock_residual,
            rosenbrock_jacobian,
        ),
        ProblemDescriptor::new(
            2,
            "freudenstein_roth",
            2,
            2,
            dvector![0.5, -2.0],
            FeasibleSet::Unbounded { radius: 5.0 },
            freudenstein_roth_residual,
            freudenstein_roth_jacobian,
        ),
        ProblemDescriptor::new(
            3,
            "powell_badly_scaled",
            2,
            2,
            dvector![0.0, 1.0],
            FeasibleSet::Unbounded { radius: 1.0 },
            powell_badly_scaled_residual,
            powell_badly_scaled_jacobian,
        ),
        ProblemDescriptor::new(
            4,
            "powell_singular",
            4,
            4,
            dvector![3.0, -1.0, 0.0, 1.0],
            FeasibleSet::Unbounded { radius: 2.0 },
            powell_singular_residual,
            powell_singular_jacobian,
        ),
        ProblemDescriptor::new(
            5,
            "helical_valley",
            3,
            3,
            dvector![-1.0, 0.0, 0.0],
            FeasibleSet::Unbounded { radius: 1.0 },
            helical_valley_residual,
            helical_valley_jacobian,
        ),
        ProblemDescriptor::new(
            6,
            "beale",
            2,
            3,
            dvector![1.0, 1.0],
            FeasibleSet::Box {
                lower: dvector![-4.5, -4.5],
                upper: dvector![4.5, 4.5],
            },
            beale_residual,
            beale_jacobian,
        ),
        ProblemDescriptor::new(
            7,
            "brown_almost_linear",
            5,
            5,
            DVector::from_element(5, 0.5),
            FeasibleSet::Unbounded { radius: 1.0 },
            brown_almost_linear_residual,
            brown_almost_linear_jacobian,
        ),
        ProblemDescriptor::new(
            8,
            "broyden_tridiagonal",
            10,
            10,
            DVector::from_element(10, -1.0),
            FeasibleSet::Unbounded { radius: 1.0 },
            broyden_tridiagonal_residual,
            broyden_tridiagonal_jacobian,
        ),
    ]
}

/// Look up one problem by id.
pub fn by_id(id: u32) -> Result<ProblemDescriptor, CoreError> {
    registry()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or(CoreError::UnknownProblem { id })
}

/// Ids of all registered problems, in id order.
pub fn all_ids() -> Vec<u32> {
    registry().iter().map(|p| p.id).collect()
}

/// Rosenbrock: r = [10(x₂ - x₁²), 1 - x₁], root at (1, 1).
fn rosenbrock_residual(x: &DVector<f64>) -> DVector<f64> {
    dvector![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]]
}

fn rosenbrock_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_row_slice(2, 2, &[-20.0 * x[0], 10.0, -1.0, 0.0])
}

/// Freudenstein-Roth, root at (5, 4).
fn freudenstein_roth_residual(x: &DVector<f64>) -> DVector<f64> {
    dvector![
        -13.0 + x[0] + ((5.0 - x[1]) * x[1] - 2.0) * x[1],
        -29.0 + x[0] + ((x[1] + 1.0) * x[1] - 14.0) * x[1]
    ]
}

fn freudenstein_roth_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        2,
        2,
        &[
            1.0,
            10.0 * x[1] - 3.0 * x[1] * x[1] - 2.0,
            1.0,
            3.0 * x[1] * x[1] + 2.0 * x[1] - 14.0,
        ],
    )
}

/// Powell badly scaled: r = [10⁴x₁x₂ - 1, e^{-x₁} + e^{-x₂} - 1.0001].
fn powell_badly_scaled_residual(x: &DVector<f64>) -> DVector<f64> {
    dvector![
        1.0e4 * x[0] * x[1] - 1.0,
        (-x[0]).exp() + (-x[1]).exp() - 1.0001
    ]
}

fn powell_badly_scaled_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        2,
        2,
        &[1.0e4 * x[1], 1.0e4 * x[0], -(-x[0]).exp(), -(-x[1]).exp()],
    )
}

/// Powell singular; the Jacobian is singular at the root (the origin).
fn powell_singular_residual(x: &DVector<f64>) -> DVector<f64> {
    dvector![
        x[0] + 10.0 * x[1],
        5.0_f64.sqrt() * (x[2] - x[3]),
        (x[1] - 2.0 * x[2]) * (x[1] - 2.0 * x[2]),
        10.0_f64.sqrt() * (x[0] - x[3]) * (x[0] - x[3])
    ]
}

fn powell_singular_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    let s5 = 5.0_f64.sqrt();
    let s10 = 10.0_f64.sqrt();
    let a = x[1] - 2.0 * x[2];
    let b = x[0] - x[3];
    DMatrix::from_row_slice(
        4,
        4,
        &[
            1.0,
            10.0,
            0.0,
            0.0,
            0.0,
            0.0,
            s5,
            -s5,
            0.0,
            2.0 * a,
            -4.0 * a,
            0.0,
            2.0 * s10 * b,
            0.0,
            0.0,
            -2.0 * s10 * b,
        ],
    )
}

/// Helical valley, root at (1, 0, 0). θ is the scaled polar angle of (x₁, x₂).
fn helical_valley_residual(x: &DVector<f64>) -> DVector<f64> {
    let theta = x[1].atan2(x[0]) / (2.0 * PI);
    let rho = (x[0] * x[0] + x[1] * x[1]).sqrt();
    dvector![10.0 * (x[2] - 10.0 * theta), 10.0 * (rho - 1.0), x[2]]
}

fn helical_valley_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    let rho_sq = x[0] * x[0] + x[1] * x[1];
    let rho = rho_sq.sqrt();
    DMatrix::from_row_slice(
        3,
        3,
        &[
            50.0 * x[1] / (PI * rho_sq),
            -50.0 * x[0] / (PI * rho_sq),
            10.0,
            10.0 * x[0] / rho,
            10.0 * x[1] / rho,
            0.0,
            0.0,
            0.0,
            1.0,
        ],
    )
}

const BEALE_Y: [f64; 3] = [1.5, 2.25, 2.625];

/// Beale: rᵢ = yᵢ - x₁(1 - x₂ⁱ), root at (3, 0.5).
fn beale_residual(x: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        3,
        BEALE_Y
            .iter()
            .enumerate()
            .map(|(i, &y)| y - x[0] * (1.0 - x[1].powi(i as i32 + 1))),
    )
}

fn beale_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(3, 2);
    for i in 0..3 {
        let p = i as i32 + 1;
        jac[(i, 0)] = -(1.0 - x[1].powi(p));
        jac[(i, 1)] = x[0] * p as f64 * x[1].powi(p - 1);
    }
    jac
}

/// Brown almost-linear, root at (1, ..., 1).
fn brown_almost_linear_residual(x: &DVector<f64>) -> DVector<f64> {
    let n = x.len();
    let sum: f64 = x.iter().sum();
    let prod: f64 = x.iter().product();
    DVector::from_fn(n, |i, _| {
        if i + 1 < n {
            x[i] + sum - (n as f64 + 1.0)
        } else {
            prod - 1.0
        }
    })
}

fn brown_almost_linear_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        if i + 1 < n {
            if i == j { 2.0 } else { 1.0 }
        } else {
            x.iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .map(|(_, &v)| v)
                .product()
        }
    })
}

/// Broyden tridiagonal with zero boundary values.
fn broyden_tridiagonal_residual(x: &DVector<f64>) -> DVector<f64> {
    let n = x.len();
    DVector::from_fn(n, |i, _| {
        let left = if i > 0 { x[i - 1] } else { 0.0 };
        let right = if i + 1 < n { x[i + 1] } else { 0.0 };
        (3.0 - 2.0 * x[i]) * x[i] - left - 2.0 * right + 1.0
    })
}

fn broyden_tridiagonal_jacobian(x: &DVector<f64>) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            3.0 - 4.0 * x[i]
        } else if j + 1 == i {
            -1.0
        } else if j == i + 1 {
            -2.0
        } else {
            0.0
        }
    })
}
