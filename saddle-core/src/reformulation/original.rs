//! The original problem, solved during the optimality phase.

use crate::iterate::Iterate;
use crate::linalg::sparse::{clone_triplets, SparseVector, SymmetricTriplets};
use crate::model::{BoundSets, Interval, Model};
use crate::reformulation::NonlinearProblem;

/// Wraps a model with objective σ·f(x); σ = 0 disables the original
/// objective when restoration dominates.
pub struct OriginalProblem<'m> {
    model: &'m dyn Model,
    objective_multiplier: f64,
    bound_sets: BoundSets,
}

impl<'m> OriginalProblem<'m> {
    pub fn new(model: &'m dyn Model) -> Self {
        let objective_multiplier = model.objective_sign();
        Self {
            model,
            objective_multiplier,
            bound_sets: BoundSets::from_model(model),
        }
    }

    pub fn with_objective_multiplier(model: &'m dyn Model, objective_multiplier: f64) -> Self {
        Self {
            model,
            objective_multiplier,
            bound_sets: BoundSets::from_model(model),
        }
    }
}

impl NonlinearProblem for OriginalProblem<'_> {
    fn model(&self) -> &dyn Model {
        self.model
    }

    fn number_variables(&self) -> usize {
        self.model.number_variables()
    }

    fn number_constraints(&self) -> usize {
        self.model.number_constraints()
    }

    fn objective_multiplier(&self) -> f64 {
        self.objective_multiplier
    }

    fn variable_bounds(&self, variable_index: usize) -> Interval {
        self.model.variable_bounds(variable_index)
    }

    fn constraint_bounds(&self, constraint_index: usize) -> Interval {
        self.model.constraint_bounds(constraint_index)
    }

    fn bound_sets(&self) -> &BoundSets {
        &self.bound_sets
    }

    fn evaluate_objective(&self, iterate: &mut Iterate) -> f64 {
        self.objective_multiplier * iterate.evaluate_objective(self.model)
    }

    fn evaluate_objective_gradient(&self, iterate: &mut Iterate, gradient: &mut SparseVector) {
        iterate.evaluate_objective_gradient(self.model);
        gradient.clear();
        for (i, value) in iterate.evaluations.objective_gradient.iter() {
            gradient.insert(i, self.objective_multiplier * value);
        }
    }

    fn evaluate_constraints(&self, iterate: &mut Iterate, constraints: &mut [f64]) {
        iterate.evaluate_constraints(self.model);
        constraints.copy_from_slice(&iterate.evaluations.constraints);
    }

    fn evaluate_constraint_jacobian(&self, iterate: &mut Iterate, jacobian: &mut [SparseVector]) {
        iterate.evaluate_constraint_jacobian(self.model);
        for (row, cached) in jacobian.iter_mut().zip(&iterate.evaluations.constraint_jacobian) {
            row.clone_from(cached);
        }
    }

    fn evaluate_lagrangian_hessian(&self, iterate: &mut Iterate, hessian: &mut SymmetricTriplets) {
        iterate.evaluate_lagrangian_hessian(self.model, self.objective_multiplier);
        *hessian = clone_triplets(&iterate.evaluations.lagrangian_hessian);
    }

    fn set_infeasibility_measure(&self, iterate: &mut Iterate) {
        iterate.evaluate_constraints(self.model);
        iterate.progress.infeasibility =
            self.model.constraint_violation(&iterate.evaluations.constraints);
    }

    fn set_optimality_measure(&self, iterate: &mut Iterate) {
        iterate.progress.optimality = iterate.evaluate_objective(self.model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::SparseVector;

    struct LinearModel;

    impl Model for LinearModel {
        fn number_variables(&self) -> usize {
            2
        }
        fn number_constraints(&self) -> usize {
            0
        }
        fn variable_bounds(&self, _: usize) -> Interval {
            Interval::FREE
        }
        fn constraint_bounds(&self, _: usize) -> Interval {
            unreachable!()
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.fill(0.0);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            3.0 * x[0] - x[1]
        }
        fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, 3.0);
            gradient.insert(1, -1.0);
        }
        fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
        fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
        fn evaluate_lagrangian_hessian(
            &self,
            _: &[f64],
            _: f64,
            _: &[f64],
            _: &mut crate::linalg::sparse::SymmetricTriplets,
        ) {
        }
    }

    #[test]
    fn zero_objective_multiplier_disables_the_objective() {
        let model = LinearModel;
        let problem = OriginalProblem::with_objective_multiplier(&model, 0.0);
        let mut iterate = Iterate::new(2, 0);
        iterate.set_primals(&[1.0, 1.0]);

        assert_eq!(problem.evaluate_objective(&mut iterate), 0.0);
        let mut gradient = SparseVector::default();
        problem.evaluate_objective_gradient(&mut iterate, &mut gradient);
        assert_eq!(gradient.to_dense(2), vec![0.0, 0.0]);

        // the optimality measure is the raw objective regardless of σ
        problem.set_optimality_measure(&mut iterate);
        assert_eq!(iterate.progress.optimality, 2.0);
    }
}
