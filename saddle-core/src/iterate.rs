//! Primal-dual iterate with cached evaluations.
//!
//! The driver owns a current and a trial [`Iterate`], both allocated once at
//! the maximal dimension (original variables + slacks + elastics) and reused
//! for the whole solve. Every cache carries a validity flag; overwriting the
//! primals invalidates all of them, overwriting the constraint multipliers
//! invalidates the Lagrangian Hessian.

use crate::linalg::sparse::{clone_triplets, SparseVector, SymmetricTriplets};
use crate::model::Model;

/// Multipliers for general constraints and variable bounds.
///
/// `z_L >= 0` and `z_U <= 0` hold for interior-point iterates.
#[derive(Debug, Clone)]
pub struct Multipliers {
    pub constraints: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
}

impl Multipliers {
    pub fn new(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            constraints: vec![0.0; number_constraints],
            lower_bounds: vec![0.0; number_variables],
            upper_bounds: vec![0.0; number_variables],
        }
    }
}

/// The three progress scalars consumed by globalization strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressMeasures {
    /// constraint violation of the problem being solved
    pub infeasibility: f64,
    /// objective measure (unscaled by the objective multiplier)
    pub optimality: f64,
    /// subproblem-specific terms (barrier terms for the IPM, 0 otherwise)
    pub auxiliary: f64,
}

impl ProgressMeasures {
    pub fn scaled_objective(&self, objective_multiplier: f64) -> f64 {
        objective_multiplier * self.optimality
    }
}

/// Cached model evaluations at the iterate's primals.
#[derive(Debug)]
pub struct Evaluations {
    pub objective: f64,
    pub objective_gradient: SparseVector,
    pub constraints: Vec<f64>,
    pub constraint_jacobian: Vec<SparseVector>,
    pub lagrangian_hessian: SymmetricTriplets,
    /// objective multiplier the Hessian cache was evaluated with
    pub hessian_objective_multiplier: f64,

    pub is_objective_computed: bool,
    pub is_objective_gradient_computed: bool,
    pub are_constraints_computed: bool,
    pub is_constraint_jacobian_computed: bool,
    pub is_lagrangian_hessian_computed: bool,
}

impl Clone for Evaluations {
    fn clone(&self) -> Self {
        Self {
            objective: self.objective,
            objective_gradient: self.objective_gradient.clone(),
            constraints: self.constraints.clone(),
            constraint_jacobian: self.constraint_jacobian.clone(),
            lagrangian_hessian: clone_triplets(&self.lagrangian_hessian),
            hessian_objective_multiplier: self.hessian_objective_multiplier,
            is_objective_computed: self.is_objective_computed,
            is_objective_gradient_computed: self.is_objective_gradient_computed,
            are_constraints_computed: self.are_constraints_computed,
            is_constraint_jacobian_computed: self.is_constraint_jacobian_computed,
            is_lagrangian_hessian_computed: self.is_lagrangian_hessian_computed,
        }
    }
}

impl Evaluations {
    fn new(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            objective: 0.0,
            objective_gradient: SparseVector::with_capacity(number_variables),
            constraints: vec![0.0; number_constraints],
            constraint_jacobian: vec![SparseVector::default(); number_constraints],
            lagrangian_hessian: SymmetricTriplets::new((number_variables, number_variables)),
            hessian_objective_multiplier: 1.0,
            is_objective_computed: false,
            is_objective_gradient_computed: false,
            are_constraints_computed: false,
            is_constraint_jacobian_computed: false,
            is_lagrangian_hessian_computed: false,
        }
    }

    fn invalidate(&mut self) {
        self.is_objective_computed = false;
        self.is_objective_gradient_computed = false;
        self.are_constraints_computed = false;
        self.is_constraint_jacobian_computed = false;
        self.is_lagrangian_hessian_computed = false;
    }
}

/// Snapshot of (x, λ, z_L, z_U) with cached evaluations and progress.
#[derive(Debug, Clone)]
pub struct Iterate {
    pub primals: Vec<f64>,
    pub multipliers: Multipliers,
    pub evaluations: Evaluations,
    pub progress: ProgressMeasures,
}

impl Iterate {
    /// Allocate an iterate sized for `number_variables` (the maximal
    /// dimension, elastics included) and `number_constraints`.
    pub fn new(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            primals: vec![0.0; number_variables],
            multipliers: Multipliers::new(number_variables, number_constraints),
            evaluations: Evaluations::new(number_variables, number_constraints),
            progress: ProgressMeasures::default(),
        }
    }

    pub fn number_variables(&self) -> usize {
        self.primals.len()
    }

    /// Overwrite the primals, invalidating every cache.
    pub fn set_primals(&mut self, x: &[f64]) {
        self.primals.copy_from_slice(x);
        self.evaluations.invalidate();
    }

    /// Overwrite a single primal, invalidating every cache.
    pub fn set_primal(&mut self, index: usize, value: f64) {
        self.primals[index] = value;
        self.evaluations.invalidate();
    }

    /// Overwrite the constraint multipliers; only the Lagrangian Hessian
    /// depends on them.
    pub fn set_constraint_multipliers(&mut self, multipliers: &[f64]) {
        self.multipliers.constraints.copy_from_slice(multipliers);
        self.evaluations.is_lagrangian_hessian_computed = false;
    }

    /// Adopt the state of an accepted trial iterate.
    pub fn copy_from(&mut self, other: &Iterate) {
        self.primals.copy_from_slice(&other.primals);
        self.multipliers.constraints.copy_from_slice(&other.multipliers.constraints);
        self.multipliers.lower_bounds.copy_from_slice(&other.multipliers.lower_bounds);
        self.multipliers.upper_bounds.copy_from_slice(&other.multipliers.upper_bounds);
        self.evaluations = other.evaluations.clone();
        self.progress = other.progress;
    }

    pub fn evaluate_objective(&mut self, model: &dyn Model) -> f64 {
        if !self.evaluations.is_objective_computed {
            self.evaluations.objective =
                model.evaluate_objective(&self.primals[..model.number_variables()]);
            self.evaluations.is_objective_computed = true;
        }
        self.evaluations.objective
    }

    pub fn evaluate_objective_gradient(&mut self, model: &dyn Model) {
        if !self.evaluations.is_objective_gradient_computed {
            self.evaluations.objective_gradient.clear();
            model.evaluate_objective_gradient(
                &self.primals[..model.number_variables()],
                &mut self.evaluations.objective_gradient,
            );
            self.evaluations.is_objective_gradient_computed = true;
        }
    }

    pub fn evaluate_constraints(&mut self, model: &dyn Model) {
        if !self.evaluations.are_constraints_computed {
            model.evaluate_constraints(
                &self.primals[..model.number_variables()],
                &mut self.evaluations.constraints[..model.number_constraints()],
            );
            self.evaluations.are_constraints_computed = true;
        }
    }

    pub fn evaluate_constraint_jacobian(&mut self, model: &dyn Model) {
        if !self.evaluations.is_constraint_jacobian_computed {
            for row in &mut self.evaluations.constraint_jacobian {
                row.clear();
            }
            model.evaluate_constraint_jacobian(
                &self.primals[..model.number_variables()],
                &mut self.evaluations.constraint_jacobian[..model.number_constraints()],
            );
            self.evaluations.is_constraint_jacobian_computed = true;
        }
    }

    pub fn evaluate_lagrangian_hessian(&mut self, model: &dyn Model, objective_multiplier: f64) {
        if self.evaluations.hessian_objective_multiplier != objective_multiplier {
            self.evaluations.is_lagrangian_hessian_computed = false;
        }
        if !self.evaluations.is_lagrangian_hessian_computed {
            let n = model.number_variables();
            self.evaluations.lagrangian_hessian = SymmetricTriplets::new((n, n));
            model.evaluate_lagrangian_hessian(
                &self.primals[..n],
                objective_multiplier,
                &self.multipliers.constraints,
                &mut self.evaluations.lagrangian_hessian,
            );
            self.evaluations.hessian_objective_multiplier = objective_multiplier;
            self.evaluations.is_lagrangian_hessian_computed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::SparseVector;
    use crate::model::Interval;

    struct CountingModel {
        evaluations: std::cell::Cell<usize>,
    }

    impl Model for CountingModel {
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
            self.evaluations.set(self.evaluations.get() + 1);
            x[0] * x[0] + x[1]
        }
        fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, 2.0 * x[0]);
            gradient.insert(1, 1.0);
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
            hessian.add_triplet(0, 0, 2.0 * objective_multiplier);
        }
    }

    #[test]
    fn objective_cache_prevents_recomputation() {
        let model = CountingModel { evaluations: std::cell::Cell::new(0) };
        let mut iterate = Iterate::new(2, 0);
        iterate.set_primals(&[1.0, 2.0]);
        assert_eq!(iterate.evaluate_objective(&model), 3.0);
        assert_eq!(iterate.evaluate_objective(&model), 3.0);
        assert_eq!(model.evaluations.get(), 1);

        iterate.set_primals(&[2.0, 2.0]);
        assert_eq!(iterate.evaluate_objective(&model), 6.0);
        assert_eq!(model.evaluations.get(), 2);
    }

    #[test]
    fn multiplier_update_only_invalidates_hessian() {
        let model = CountingModel { evaluations: std::cell::Cell::new(0) };
        let mut iterate = Iterate::new(2, 0);
        iterate.set_primals(&[1.0, 1.0]);
        iterate.evaluate_objective(&model);
        iterate.evaluate_lagrangian_hessian(&model, 1.0);
        iterate.set_constraint_multipliers(&[]);
        assert!(iterate.evaluations.is_objective_computed);
        assert!(!iterate.evaluations.is_lagrangian_hessian_computed);
    }
}
