//! Solver port for the cycle-selection problem.
//!
//! The opportunity graph model formulates one mixed-integer problem per
//! detection iteration: binary edge-selection variables, sparse linear
//! constraints, and a maximized linear objective. This module defines the
//! solver-agnostic formulation types and the [`MipSolver`] trait; concrete
//! backends (HiGHS via good_lp) live in submodules.
//!
//! Infeasible and unbounded outcomes are reported as solution statuses,
//! not errors: an iteration without a solution simply has no opportunity.

pub mod highs;

pub use highs::HighsSolver;

use crate::error::Result;

/// A mixed-integer solver for binary edge-selection problems.
///
/// Implementations wrap a specific backend and must be thread-safe
/// (`Send + Sync`): the model hands the solve off to a blocking worker.
pub trait MipSolver: Send + Sync {
    /// Solver name for logging/config.
    fn name(&self) -> &'static str;

    /// Maximize `c * x` over binary `x` subject to the problem constraints.
    ///
    /// # Errors
    ///
    /// Returns an error only for backend failures; infeasible or unbounded
    /// problems resolve to a [`Solution`] with the corresponding status.
    fn solve(&self, problem: &CycleProblem) -> Result<Solution>;
}

/// A cycle-selection problem: all variables binary, objective maximized.
#[derive(Debug, Clone, Default)]
pub struct CycleProblem {
    /// Number of binary decision variables.
    pub num_vars: usize,
    /// Objective coefficients, one per variable (maximize `c * x`).
    pub objective: Vec<f64>,
    /// Sparse linear constraints.
    pub constraints: Vec<LinearConstraint>,
}

impl CycleProblem {
    #[must_use]
    pub fn new(num_vars: usize) -> Self {
        Self {
            num_vars,
            objective: vec![0.0; num_vars],
            constraints: Vec::new(),
        }
    }
}

/// A sparse linear constraint: `sum(coeff * x[var]) {>=, <=, =} rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// `(variable index, coefficient)` pairs; variables not listed have
    /// coefficient zero.
    pub terms: Vec<(usize, f64)>,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Create a >= constraint.
    #[must_use]
    pub fn geq(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            terms,
            sense: ConstraintSense::GreaterEqual,
            rhs,
        }
    }

    /// Create a <= constraint.
    #[must_use]
    pub fn leq(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            terms,
            sense: ConstraintSense::LessEqual,
            rhs,
        }
    }

    /// Create an = constraint.
    #[must_use]
    pub fn eq(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            terms,
            sense: ConstraintSense::Equal,
            rhs,
        }
    }
}

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    GreaterEqual,
    LessEqual,
    Equal,
}

/// Solution to a cycle-selection problem.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Values per variable; binary variables resolve to ~0.0 or ~1.0.
    pub values: Vec<f64>,
    /// Objective value at the solution.
    pub objective: f64,
    /// Termination status.
    pub status: SolutionStatus,
}

impl Solution {
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Indices of variables selected (value rounds to 1).
    #[must_use]
    pub fn selected(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.5)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Termination status of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Found an optimal solution.
    Optimal,
    /// No feasible solution exists.
    Infeasible,
    /// Objective is unbounded.
    Unbounded,
    /// Backend error.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_problem_has_zero_objective() {
        let problem = CycleProblem::new(3);
        assert_eq!(problem.num_vars, 3);
        assert_eq!(problem.objective, vec![0.0; 3]);
        assert!(problem.constraints.is_empty());
    }

    #[test]
    fn selected_rounds_binary_values() {
        let solution = Solution {
            values: vec![0.0, 1.0, 0.9999999, 0.0000001],
            objective: 0.0,
            status: SolutionStatus::Optimal,
        };
        assert_eq!(solution.selected(), vec![1, 2]);
    }

    #[test]
    fn constraint_constructors_set_sense() {
        assert_eq!(
            LinearConstraint::geq(vec![(0, 1.0)], 1.0).sense,
            ConstraintSense::GreaterEqual
        );
        assert_eq!(
            LinearConstraint::leq(vec![(0, 1.0)], 1.0).sense,
            ConstraintSense::LessEqual
        );
        assert_eq!(
            LinearConstraint::eq(vec![(0, 1.0)], 1.0).sense,
            ConstraintSense::Equal
        );
    }
}
