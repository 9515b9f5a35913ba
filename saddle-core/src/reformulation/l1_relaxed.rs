//! l1-relaxed problem with elastic variables.
//!
//! Relaxes every constraint with nonnegative elastic pairs,
//!
//! ```text
//!   c_j(x) + p_j − n_j ∈ [c_L_j, c_U_j],   p_j, n_j >= 0,
//! ```
//!
//! and adds the penalty ρ·Σ(p_j + n_j) to the objective. With σ = 0 and
//! ρ = 1 this is the feasibility-restoration problem; with σ = 1 it is the
//! Sl1QP working problem.

use std::collections::BTreeMap;

use crate::iterate::Iterate;
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::{BoundSets, Interval, Model};
use crate::reformulation::NonlinearProblem;

/// Maps from constraint index to elastic variable index.
///
/// `negative[j] = p_j` exists for constraints with a finite lower bound and
/// enters constraint j with coefficient +1; `positive[j] = n_j` exists for
/// finite upper bounds and enters with coefficient −1. Elastic variables are
/// appended after the wrapped model's variables.
#[derive(Debug, Clone, Default)]
pub struct ElasticVariables {
    pub positive: BTreeMap<usize, usize>,
    pub negative: BTreeMap<usize, usize>,
}

impl ElasticVariables {
    pub fn generate(model: &dyn Model) -> Self {
        let mut elastics = ElasticVariables::default();
        let mut elastic_index = model.number_variables();
        for j in 0..model.number_constraints() {
            let bounds = model.constraint_bounds(j);
            if bounds.has_finite_lower() {
                elastics.negative.insert(j, elastic_index);
                elastic_index += 1;
            }
            if bounds.has_finite_upper() {
                elastics.positive.insert(j, elastic_index);
                elastic_index += 1;
            }
        }
        elastics
    }

    pub fn count(&self) -> usize {
        self.positive.len() + self.negative.len()
    }
}

pub struct L1RelaxedProblem<'m> {
    model: &'m dyn Model,
    elastics: ElasticVariables,
    objective_multiplier: f64,
    /// l1 penalty ρ on the elastic sum, mutable driver-owned state
    penalty_parameter: f64,
    bound_sets: BoundSets,
}

impl<'m> L1RelaxedProblem<'m> {
    pub fn new(model: &'m dyn Model, objective_multiplier: f64, penalty_parameter: f64) -> Self {
        let elastics = ElasticVariables::generate(model);
        let number_variables = model.number_variables() + elastics.count();

        let mut variable_bounds: Vec<Interval> = (0..model.number_variables())
            .map(|i| model.variable_bounds(i))
            .collect();
        variable_bounds.resize(number_variables, Interval::lower_bounded(0.0));
        let constraint_bounds: Vec<Interval> = (0..model.number_constraints())
            .map(|j| model.constraint_bounds(j))
            .collect();
        let bound_sets = BoundSets::new(&variable_bounds, &constraint_bounds);

        Self { model, elastics, objective_multiplier, penalty_parameter, bound_sets }
    }

    pub fn elastic_variables(&self) -> &ElasticVariables {
        &self.elastics
    }

    pub fn penalty_parameter(&self) -> f64 {
        self.penalty_parameter
    }

    pub fn set_penalty_parameter(&mut self, penalty_parameter: f64) {
        self.penalty_parameter = penalty_parameter;
    }

    pub fn set_objective_multiplier(&mut self, objective_multiplier: f64) {
        self.objective_multiplier = objective_multiplier;
    }

    /// Sum of the elastic values of an iterate (its relaxed infeasibility).
    pub fn elastic_sum(&self, primals: &[f64]) -> f64 {
        self.elastics
            .positive
            .values()
            .chain(self.elastics.negative.values())
            .map(|&index| primals[index])
            .sum()
    }

    /// Initialize the elastic entries of an iterate.
    ///
    /// The setter receives `(iterate, constraint_index, elastic_index,
    /// jacobian_coefficient)` with coefficient +1 for p and −1 for n, and
    /// installs values consistent with the subproblem's algebra (closed form
    /// for the interior point, zero for active-set methods).
    pub fn set_elastic_variable_values(
        &self,
        iterate: &mut Iterate,
        mut setter: impl FnMut(&mut Iterate, usize, usize, f64),
    ) {
        let pairs: Vec<(usize, usize, f64)> = self
            .elastics
            .negative
            .iter()
            .map(|(&j, &index)| (j, index, 1.0))
            .chain(self.elastics.positive.iter().map(|(&j, &index)| (j, index, -1.0)))
            .collect();
        for (constraint_index, elastic_index, coefficient) in pairs {
            setter(iterate, constraint_index, elastic_index, coefficient);
        }
    }
}

impl NonlinearProblem for L1RelaxedProblem<'_> {
    fn model(&self) -> &dyn Model {
        self.model
    }

    fn number_variables(&self) -> usize {
        self.model.number_variables() + self.elastics.count()
    }

    fn number_constraints(&self) -> usize {
        self.model.number_constraints()
    }

    fn objective_multiplier(&self) -> f64 {
        self.objective_multiplier
    }

    fn variable_bounds(&self, variable_index: usize) -> Interval {
        if variable_index < self.model.number_variables() {
            self.model.variable_bounds(variable_index)
        } else {
            Interval::lower_bounded(0.0)
        }
    }

    fn constraint_bounds(&self, constraint_index: usize) -> Interval {
        self.model.constraint_bounds(constraint_index)
    }

    fn bound_sets(&self) -> &BoundSets {
        &self.bound_sets
    }

    fn evaluate_objective(&self, iterate: &mut Iterate) -> f64 {
        let mut objective = self.penalty_parameter * self.elastic_sum(&iterate.primals);
        if self.objective_multiplier != 0.0 {
            objective += self.objective_multiplier * iterate.evaluate_objective(self.model);
        }
        objective
    }

    fn evaluate_objective_gradient(&self, iterate: &mut Iterate, gradient: &mut SparseVector) {
        gradient.clear();
        if self.objective_multiplier != 0.0 {
            iterate.evaluate_objective_gradient(self.model);
            for (i, value) in iterate.evaluations.objective_gradient.iter() {
                gradient.insert(i, self.objective_multiplier * value);
            }
        }
        for &index in self.elastics.negative.values().chain(self.elastics.positive.values()) {
            gradient.insert(index, self.penalty_parameter);
        }
    }

    fn evaluate_constraints(&self, iterate: &mut Iterate, constraints: &mut [f64]) {
        iterate.evaluate_constraints(self.model);
        constraints.copy_from_slice(&iterate.evaluations.constraints);
        for (&j, &index) in &self.elastics.negative {
            constraints[j] += iterate.primals[index];
        }
        for (&j, &index) in &self.elastics.positive {
            constraints[j] -= iterate.primals[index];
        }
    }

    fn evaluate_constraint_jacobian(&self, iterate: &mut Iterate, jacobian: &mut [SparseVector]) {
        iterate.evaluate_constraint_jacobian(self.model);
        for (row, cached) in jacobian.iter_mut().zip(&iterate.evaluations.constraint_jacobian) {
            row.clone_from(cached);
        }
        for (&j, &index) in &self.elastics.negative {
            jacobian[j].insert(index, 1.0);
        }
        for (&j, &index) in &self.elastics.positive {
            jacobian[j].insert(index, -1.0);
        }
    }

    fn evaluate_lagrangian_hessian(&self, iterate: &mut Iterate, hessian: &mut SymmetricTriplets) {
        // elastics are linear: the curvature block is the model's, embedded
        // in the larger dimension
        iterate.evaluate_lagrangian_hessian(self.model, self.objective_multiplier);
        let number_variables = self.number_variables();
        *hessian = SymmetricTriplets::new((number_variables, number_variables));
        for (&value, (row, col)) in iterate.evaluations.lagrangian_hessian.triplet_iter() {
            hessian.add_triplet(row, col, value);
        }
    }

    fn set_infeasibility_measure(&self, iterate: &mut Iterate) {
        iterate.evaluate_constraints(self.model);
        iterate.progress.infeasibility =
            self.model.constraint_violation(&iterate.evaluations.constraints);
    }

    fn set_optimality_measure(&self, iterate: &mut Iterate) {
        iterate.progress.optimality = iterate.evaluate_objective(self.model);
    }

    /// Measured on the wrapped model's constraints, the same quantity the
    /// infeasibility measure tracks (the elastics are a solution device,
    /// not part of the violation).
    fn predicted_infeasibility_reduction(
        &self,
        iterate: &mut Iterate,
        direction_primals: &[f64],
        step_length: f64,
    ) -> f64 {
        iterate.evaluate_constraints(self.model);
        iterate.evaluate_constraint_jacobian(self.model);

        let mut current_violation = 0.0;
        let mut linearized_violation = 0.0;
        for j in 0..self.model.number_constraints() {
            let bounds = self.model.constraint_bounds(j);
            let constraint = iterate.evaluations.constraints[j];
            current_violation += bounds.violation(constraint);
            let linearized = constraint
                + step_length
                    * iterate.evaluations.constraint_jacobian[j].dot(direction_primals);
            linearized_violation += bounds.violation(linearized);
        }
        current_violation - linearized_violation
    }
}
