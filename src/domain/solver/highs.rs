//! HiGHS solver implementation via good_lp.
//!
//! HiGHS is a high-performance open-source linear/mixed-integer programming
//! solver. This implementation wraps it using the good_lp crate.

use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution as _,
    SolverModel};

use super::{ConstraintSense, CycleProblem, MipSolver, Solution, SolutionStatus};
use crate::error::Result;

/// HiGHS-based mixed-integer solver.
#[derive(Debug, Default, Clone)]
pub struct HighsSolver;

impl HighsSolver {
    /// Create a new HiGHS solver instance.
    pub fn new() -> Self {
        Self
    }
}

impl MipSolver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, problem: &CycleProblem) -> Result<Solution> {
        let n = problem.num_vars;

        // Handle empty problem
        if n == 0 {
            return Ok(Solution {
                values: vec![],
                objective: 0.0,
                status: SolutionStatus::Optimal,
            });
        }

        let mut vars = variables!();
        let var_list: Vec<_> = (0..n)
            .map(|_| vars.add(variable().min(0.0).max(1.0).integer()))
            .collect();

        let objective: Expression = var_list
            .iter()
            .zip(problem.objective.iter())
            .map(|(v, c)| *c * *v)
            .sum();

        let mut model = vars.maximise(&objective).using(highs);

        for constr in &problem.constraints {
            let lhs: Expression = constr
                .terms
                .iter()
                .map(|(i, c)| *c * var_list[*i])
                .sum();

            match constr.sense {
                ConstraintSense::GreaterEqual => {
                    model = model.with(constraint!(lhs >= constr.rhs));
                }
                ConstraintSense::LessEqual => {
                    model = model.with(constraint!(lhs <= constr.rhs));
                }
                ConstraintSense::Equal => {
                    model = model.with(constraint!(lhs == constr.rhs));
                }
            }
        }

        match model.solve() {
            Ok(solved) => {
                let values: Vec<f64> = var_list.iter().map(|v| solved.value(*v)).collect();

                // Re-evaluate the objective from the solved values rather
                // than trusting backend-reported objective conventions.
                let objective = values
                    .iter()
                    .zip(problem.objective.iter())
                    .map(|(v, c)| v * c)
                    .sum();

                Ok(Solution {
                    values,
                    objective,
                    status: SolutionStatus::Optimal,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(Solution {
                values: vec![0.0; n],
                objective: 0.0,
                status: SolutionStatus::Infeasible,
            }),
            Err(ResolutionError::Unbounded) => Ok(Solution {
                values: vec![0.0; n],
                objective: 0.0,
                status: SolutionStatus::Unbounded,
            }),
            Err(_) => Ok(Solution {
                values: vec![0.0; n],
                objective: 0.0,
                status: SolutionStatus::Error,
            }),
        }
    }
}
