//! Problem reformulations.
//!
//! A [`NonlinearProblem`] wraps a [`Model`](crate::model::Model) as the
//! problem actually solved in a given phase: the original problem, the
//! l1-relaxed problem with elastic variables, and the barrier view that
//! moves bounds into the objective. An equality-constrained model adapter
//! turns inequality constraints into slacked equalities for the
//! interior-point subproblem.

pub mod barrier;
pub mod equality_constrained;
pub mod l1_relaxed;
pub mod original;

pub use barrier::BarrierProblem;
pub use equality_constrained::EqualityConstrainedModel;
pub use l1_relaxed::{ElasticVariables, L1RelaxedProblem};
pub use original::OriginalProblem;

use crate::iterate::Iterate;
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::{BoundSets, Interval, Model};

/// The problem view a subproblem linearizes and solves.
///
/// Evaluation routines populate the iterate's raw-model caches in place
/// (respecting the validity flags) and derive the problem-level quantities
/// from them; a cache is never recomputed when its input is unchanged.
pub trait NonlinearProblem {
    fn model(&self) -> &dyn Model;

    fn number_variables(&self) -> usize;
    fn number_constraints(&self) -> usize;

    /// σ: 0 disables the original objective (restoration), +1 keeps it
    fn objective_multiplier(&self) -> f64;

    fn variable_bounds(&self, variable_index: usize) -> Interval;
    fn constraint_bounds(&self, constraint_index: usize) -> Interval;
    fn bound_sets(&self) -> &BoundSets;

    fn number_original_variables(&self) -> usize {
        self.model().number_variables()
    }

    fn evaluate_objective(&self, iterate: &mut Iterate) -> f64;
    fn evaluate_objective_gradient(&self, iterate: &mut Iterate, gradient: &mut SparseVector);
    fn evaluate_constraints(&self, iterate: &mut Iterate, constraints: &mut [f64]);
    fn evaluate_constraint_jacobian(&self, iterate: &mut Iterate, jacobian: &mut [SparseVector]);
    fn evaluate_lagrangian_hessian(&self, iterate: &mut Iterate, hessian: &mut SymmetricTriplets);

    /// iterate.progress.infeasibility := l1 violation of this problem
    fn set_infeasibility_measure(&self, iterate: &mut Iterate);
    /// iterate.progress.optimality := objective measure of this problem
    fn set_optimality_measure(&self, iterate: &mut Iterate);

    /// h(x) − h(c(x) + α·∇c(x)ᵀ d), the linearized infeasibility decrease
    fn predicted_infeasibility_reduction(
        &self,
        iterate: &mut Iterate,
        direction_primals: &[f64],
        step_length: f64,
    ) -> f64 {
        let number_constraints = self.number_constraints();
        let mut constraints = vec![0.0; number_constraints];
        self.evaluate_constraints(iterate, &mut constraints);
        let mut jacobian = vec![SparseVector::default(); number_constraints];
        self.evaluate_constraint_jacobian(iterate, &mut jacobian);

        let mut current_violation = 0.0;
        let mut linearized_violation = 0.0;
        for j in 0..number_constraints {
            let bounds = self.constraint_bounds(j);
            current_violation += bounds.violation(constraints[j]);
            let linearized = constraints[j] + step_length * jacobian[j].dot(direction_primals);
            linearized_violation += bounds.violation(linearized);
        }
        current_violation - linearized_violation
    }
}
