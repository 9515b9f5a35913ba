//! Termination statuses and KKT residuals.

use std::fmt;

use crate::iterate::Iterate;
use crate::linalg::sparse::SparseVector;
use crate::reformulation::NonlinearProblem;

/// Terminal outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// KKT residuals below tolerance at a feasible point
    Optimal,
    /// converged to a nonzero-infeasibility stationary point of the
    /// constraint violation
    Infeasible,
    /// the problem is unbounded below
    Unbounded,
    /// the step shrank to machine precision at a feasible point
    SmallStep,
    /// iteration limit reached
    IterationLimit,
    /// time limit reached
    TimeLimit,
    /// a numeric failure survived every recovery attempt
    NumericalError,
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationStatus::Optimal => write!(f, "Optimal"),
            TerminationStatus::Infeasible => write!(f, "Infeasible"),
            TerminationStatus::Unbounded => write!(f, "Unbounded"),
            TerminationStatus::SmallStep => write!(f, "Small step"),
            TerminationStatus::IterationLimit => write!(f, "Iteration limit"),
            TerminationStatus::TimeLimit => write!(f, "Time limit"),
            TerminationStatus::NumericalError => write!(f, "Numerical error"),
        }
    }
}

/// First-order optimality residuals in the max norm.
#[derive(Debug, Clone, Copy, Default)]
pub struct KktResiduals {
    /// ‖∇f σ − ∇cᵀλ − z_L − z_U‖∞
    pub stationarity: f64,
    /// ‖violation of constraint ranges‖∞
    pub feasibility: f64,
    /// complementarity residual with barrier parameter μ
    pub complementarity: f64,
}

impl KktResiduals {
    pub fn max(&self) -> f64 {
        self.stationarity.max(self.feasibility).max(self.complementarity)
    }

    pub fn is_optimal(&self, tolerance: f64) -> bool {
        self.stationarity <= tolerance
            && self.feasibility <= tolerance
            && self.complementarity <= tolerance
    }
}

/// Evaluate stationarity, feasibility and complementarity of `problem` at
/// the iterate (μ = 0 gives the genuine KKT conditions).
pub fn compute_kkt_residuals(
    problem: &dyn NonlinearProblem,
    iterate: &mut Iterate,
    mu: f64,
) -> KktResiduals {
    let n = problem.number_variables();
    let m = problem.number_constraints();

    let mut gradient = SparseVector::with_capacity(n);
    problem.evaluate_objective_gradient(iterate, &mut gradient);
    let mut constraints = vec![0.0; m];
    problem.evaluate_constraints(iterate, &mut constraints);
    let mut jacobian = vec![SparseVector::default(); m];
    problem.evaluate_constraint_jacobian(iterate, &mut jacobian);

    // stationarity of the Lagrangian L = σf − λᵀc − z_Lᵀ(x−l) − z_Uᵀ(x−u)
    let mut stationarity = gradient.to_dense(n);
    for j in 0..m {
        let multiplier = iterate.multipliers.constraints[j];
        if multiplier != 0.0 {
            jacobian[j].add_to_dense(-multiplier, &mut stationarity);
        }
    }
    for i in 0..n {
        stationarity[i] -= iterate.multipliers.lower_bounds[i] + iterate.multipliers.upper_bounds[i];
    }

    let mut feasibility = 0.0_f64;
    for j in 0..m {
        feasibility = feasibility.max(problem.constraint_bounds(j).violation(constraints[j]));
    }

    // complementarity for bounds and for inequality constraints
    let mut complementarity = 0.0_f64;
    let sets = problem.bound_sets();
    for &i in &sets.lower_bounded {
        let product =
            (iterate.primals[i] - problem.variable_bounds(i).lower) * iterate.multipliers.lower_bounds[i];
        complementarity = complementarity.max((product - mu).abs());
    }
    for &i in &sets.upper_bounded {
        let product =
            (iterate.primals[i] - problem.variable_bounds(i).upper) * iterate.multipliers.upper_bounds[i];
        complementarity = complementarity.max((product - mu).abs());
    }
    for &j in &sets.inequality_constraints {
        let bounds = problem.constraint_bounds(j);
        let multiplier = iterate.multipliers.constraints[j];
        if multiplier > 0.0 {
            // acts on the lower side
            let residual = if bounds.has_finite_lower() {
                ((constraints[j] - bounds.lower) * multiplier - mu).abs()
            } else {
                multiplier
            };
            complementarity = complementarity.max(residual);
        } else if multiplier < 0.0 {
            let residual = if bounds.has_finite_upper() {
                ((constraints[j] - bounds.upper) * multiplier - mu).abs()
            } else {
                -multiplier
            };
            complementarity = complementarity.max(residual);
        }
    }

    KktResiduals {
        stationarity: crate::linalg::inf_norm(&stationarity),
        feasibility,
        complementarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::SymmetricTriplets;
    use crate::model::{Interval, Model};
    use crate::reformulation::OriginalProblem;

    // min 1/2 x² over x >= 1: optimum x = 1, z_L = 1
    struct BoundQuadratic;

    impl Model for BoundQuadratic {
        fn number_variables(&self) -> usize {
            1
        }
        fn number_constraints(&self) -> usize {
            0
        }
        fn variable_bounds(&self, _: usize) -> Interval {
            Interval::lower_bounded(1.0)
        }
        fn constraint_bounds(&self, _: usize) -> Interval {
            unreachable!()
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.fill(1.5);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            0.5 * x[0] * x[0]
        }
        fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, x[0]);
        }
        fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
        fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
        fn evaluate_lagrangian_hessian(
            &self,
            _: &[f64],
            objective_multiplier: f64,
            _: &[f64],
            hessian: &mut SymmetricTriplets,
        ) {
            hessian.add_triplet(0, 0, objective_multiplier);
        }
    }

    #[test]
    fn residuals_vanish_at_the_optimum() {
        let model = BoundQuadratic;
        let problem = OriginalProblem::new(&model);
        let mut iterate = Iterate::new(1, 0);
        iterate.set_primals(&[1.0]);
        iterate.multipliers.lower_bounds[0] = 1.0;

        let residuals = compute_kkt_residuals(&problem, &mut iterate, 0.0);
        assert!(residuals.is_optimal(1e-12), "{residuals:?}");
    }

    #[test]
    fn stationarity_detects_wrong_multipliers() {
        let model = BoundQuadratic;
        let problem = OriginalProblem::new(&model);
        let mut iterate = Iterate::new(1, 0);
        iterate.set_primals(&[1.0]);
        iterate.multipliers.lower_bounds[0] = 0.0;

        let residuals = compute_kkt_residuals(&problem, &mut iterate, 0.0);
        assert!((residuals.stationarity - 1.0).abs() < 1e-12);
    }
}
