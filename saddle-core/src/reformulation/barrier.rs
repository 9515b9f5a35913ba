//! Barrier view of a problem.
//!
//! Moves the variable bounds into the objective via −μ·log terms, with a
//! linear damping term ±ξμ on variables that are bounded on exactly one
//! side to keep them from drifting to ±∞. The view owns a (possibly
//! relaxed) copy of the variable bounds; the interior-point subproblem
//! relaxes them whenever an iterate gets too close (IPOPT Section 3.5).

use crate::iterate::Iterate;
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::{BoundSets, Interval, Model};
use crate::reformulation::NonlinearProblem;

pub struct BarrierProblem<'p> {
    problem: &'p dyn NonlinearProblem,
    variable_bounds: Vec<Interval>,
    barrier_parameter: f64,
    damping_factor: f64,
}

impl<'p> BarrierProblem<'p> {
    pub fn new(
        problem: &'p dyn NonlinearProblem,
        variable_bounds: Vec<Interval>,
        barrier_parameter: f64,
        damping_factor: f64,
    ) -> Self {
        debug_assert_eq!(variable_bounds.len(), problem.number_variables());
        Self { problem, variable_bounds, barrier_parameter, damping_factor }
    }

    pub fn barrier_parameter(&self) -> f64 {
        self.barrier_parameter
    }

    pub fn inner(&self) -> &dyn NonlinearProblem {
        self.problem
    }

    /// −μ·Σ log terms plus damping, the auxiliary progress measure.
    pub fn barrier_terms(&self, primals: &[f64]) -> f64 {
        let sets = self.bound_sets();
        let mut terms = 0.0;
        for &i in &sets.lower_bounded {
            terms -= (primals[i] - self.variable_bounds[i].lower).ln();
        }
        for &i in &sets.upper_bounded {
            terms -= (self.variable_bounds[i].upper - primals[i]).ln();
        }
        for &i in &sets.single_lower_bounded {
            terms += self.damping_factor * (primals[i] - self.variable_bounds[i].lower);
        }
        for &i in &sets.single_upper_bounded {
            terms += self.damping_factor * (self.variable_bounds[i].upper - primals[i]);
        }
        self.barrier_parameter * terms
    }

    /// Directional derivative of the barrier terms along `direction`.
    pub fn barrier_directional_derivative(&self, primals: &[f64], direction: &[f64]) -> f64 {
        let sets = self.bound_sets();
        let mu = self.barrier_parameter;
        let mut derivative = 0.0;
        for &i in &sets.lower_bounded {
            derivative -= mu / (primals[i] - self.variable_bounds[i].lower) * direction[i];
        }
        for &i in &sets.upper_bounded {
            derivative -= mu / (primals[i] - self.variable_bounds[i].upper) * direction[i];
        }
        for &i in &sets.single_lower_bounded {
            derivative += self.damping_factor * mu * direction[i];
        }
        for &i in &sets.single_upper_bounded {
            derivative -= self.damping_factor * mu * direction[i];
        }
        derivative
    }
}

impl NonlinearProblem for BarrierProblem<'_> {
    fn model(&self) -> &dyn Model {
        self.problem.model()
    }

    fn number_variables(&self) -> usize {
        self.problem.number_variables()
    }

    fn number_constraints(&self) -> usize {
        self.problem.number_constraints()
    }

    fn objective_multiplier(&self) -> f64 {
        self.problem.objective_multiplier()
    }

    /// The (relaxed) bounds the barrier is built on.
    fn variable_bounds(&self, variable_index: usize) -> Interval {
        self.variable_bounds[variable_index]
    }

    fn constraint_bounds(&self, constraint_index: usize) -> Interval {
        self.problem.constraint_bounds(constraint_index)
    }

    fn bound_sets(&self) -> &BoundSets {
        // relaxation never changes which sides are finite
        self.problem.bound_sets()
    }

    fn evaluate_objective(&self, iterate: &mut Iterate) -> f64 {
        self.problem.evaluate_objective(iterate)
            + self.barrier_terms(&iterate.primals[..self.number_variables()])
    }

    fn evaluate_objective_gradient(&self, iterate: &mut Iterate, gradient: &mut SparseVector) {
        self.problem.evaluate_objective_gradient(iterate, gradient);

        let sets = self.bound_sets();
        let mu = self.barrier_parameter;
        for &i in &sets.lower_bounded {
            gradient.insert(i, -mu / (iterate.primals[i] - self.variable_bounds[i].lower));
        }
        for &i in &sets.upper_bounded {
            gradient.insert(i, -mu / (iterate.primals[i] - self.variable_bounds[i].upper));
        }
        for &i in &sets.single_lower_bounded {
            gradient.insert(i, self.damping_factor * mu);
        }
        for &i in &sets.single_upper_bounded {
            gradient.insert(i, -self.damping_factor * mu);
        }
    }

    fn evaluate_constraints(&self, iterate: &mut Iterate, constraints: &mut [f64]) {
        self.problem.evaluate_constraints(iterate, constraints);
    }

    fn evaluate_constraint_jacobian(&self, iterate: &mut Iterate, jacobian: &mut [SparseVector]) {
        self.problem.evaluate_constraint_jacobian(iterate, jacobian);
    }

    fn evaluate_lagrangian_hessian(&self, iterate: &mut Iterate, hessian: &mut SymmetricTriplets) {
        self.problem.evaluate_lagrangian_hessian(iterate, hessian);

        // diagonal barrier terms, grouped by variable
        let sets = self.bound_sets();
        for &i in &sets.lower_bounded {
            let distance = iterate.primals[i] - self.variable_bounds[i].lower;
            hessian.add_triplet(i, i, iterate.multipliers.lower_bounds[i] / distance);
        }
        for &i in &sets.upper_bounded {
            let distance = iterate.primals[i] - self.variable_bounds[i].upper;
            hessian.add_triplet(i, i, iterate.multipliers.upper_bounds[i] / distance);
        }
    }

    fn set_infeasibility_measure(&self, iterate: &mut Iterate) {
        self.problem.set_infeasibility_measure(iterate);
    }

    fn set_optimality_measure(&self, iterate: &mut Iterate) {
        self.problem.set_optimality_measure(iterate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reformulation::OriginalProblem;

    struct BoxedModel;

    impl Model for BoxedModel {
        fn number_variables(&self) -> usize {
            2
        }
        fn number_constraints(&self) -> usize {
            0
        }
        fn variable_bounds(&self, i: usize) -> Interval {
            if i == 0 {
                Interval::new(0.0, 1.0)
            } else {
                Interval::lower_bounded(0.0)
            }
        }
        fn constraint_bounds(&self, _: usize) -> Interval {
            unreachable!()
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.fill(0.5);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            x[0] + x[1]
        }
        fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, 1.0);
            gradient.insert(1, 1.0);
        }
        fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
        fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
        fn evaluate_lagrangian_hessian(
            &self,
            _: &[f64],
            _: f64,
            _: &[f64],
            _: &mut SymmetricTriplets,
        ) {
        }
    }

    #[test]
    fn barrier_terms_and_gradient() {
        let model = BoxedModel;
        let problem = OriginalProblem::new(&model);
        let bounds = vec![Interval::new(0.0, 1.0), Interval::lower_bounded(0.0)];
        let mu = 0.1;
        let xi = 1e-5;
        let barrier = BarrierProblem::new(&problem, bounds, mu, xi);

        let primals = [0.5, 2.0];
        // −μ(log 0.5 + log 0.5 + log 2) + ξμ·2
        let expected =
            -mu * (0.5_f64.ln() + 0.5_f64.ln() + 2.0_f64.ln()) + xi * mu * 2.0;
        assert!((barrier.barrier_terms(&primals) - expected).abs() < 1e-12);

        let mut iterate = Iterate::new(2, 0);
        iterate.set_primals(&primals);
        let mut gradient = SparseVector::default();
        barrier.evaluate_objective_gradient(&mut iterate, &mut gradient);
        let dense = gradient.to_dense(2);
        // x0: 1 − μ/0.5 − μ/(0.5 − 1) = 1 − 0.2 + 0.2 = 1
        assert!((dense[0] - 1.0).abs() < 1e-12);
        // x1: 1 − μ/2 + ξμ
        assert!((dense[1] - (1.0 - mu / 2.0 + xi * mu)).abs() < 1e-12);

        // the directional derivative matches the gradient overlay minus the
        // model part
        let derivative = barrier.barrier_directional_derivative(&primals, &[1.0, 1.0]);
        assert!((derivative - (dense[0] + dense[1] - 2.0)).abs() < 1e-12);
    }
}
