//! Equality-constrained model adapter.
//!
//! Generates an equality-constrained model from a general one by giving
//! every inequality constraint a slack variable and subtracting the RHS of
//! equality constraints, so that all constraints read c(x) = 0. The
//! interior-point subproblem only accepts models in this form.

use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::{Interval, Model};

pub struct EqualityConstrainedModel<'m> {
    model: &'m dyn Model,
    /// slack variable index for each inequality constraint, by constraint
    slack_of_constraint: Vec<Option<usize>>,
    /// wrapped constraint index for each slack, by slack offset
    constraint_of_slack: Vec<usize>,
}

impl<'m> EqualityConstrainedModel<'m> {
    pub fn new(model: &'m dyn Model) -> Self {
        let n = model.number_variables();
        let mut slack_of_constraint = vec![None; model.number_constraints()];
        let mut constraint_of_slack = Vec::new();
        for j in 0..model.number_constraints() {
            if !model.constraint_bounds(j).is_equality() {
                slack_of_constraint[j] = Some(n + constraint_of_slack.len());
                constraint_of_slack.push(j);
            }
        }
        Self { model, slack_of_constraint, constraint_of_slack }
    }

    pub fn number_slacks(&self) -> usize {
        self.constraint_of_slack.len()
    }

    pub fn inner(&self) -> &dyn Model {
        self.model
    }
}

impl Model for EqualityConstrainedModel<'_> {
    fn number_variables(&self) -> usize {
        self.model.number_variables() + self.constraint_of_slack.len()
    }

    fn number_constraints(&self) -> usize {
        self.model.number_constraints()
    }

    fn objective_sign(&self) -> f64 {
        self.model.objective_sign()
    }

    fn variable_bounds(&self, variable_index: usize) -> Interval {
        let n = self.model.number_variables();
        if variable_index < n {
            self.model.variable_bounds(variable_index)
        } else {
            // a slack inherits the bounds of its inequality constraint
            self.model.constraint_bounds(self.constraint_of_slack[variable_index - n])
        }
    }

    fn constraint_bounds(&self, _constraint_index: usize) -> Interval {
        Interval::equality(0.0)
    }

    fn initial_primal_point(&self, x: &mut [f64]) {
        let n = self.model.number_variables();
        self.model.initial_primal_point(&mut x[..n]);
        // slacks start at the constraint values
        let mut constraints = vec![0.0; self.model.number_constraints()];
        self.model.evaluate_constraints(&x[..n], &mut constraints);
        for (offset, &j) in self.constraint_of_slack.iter().enumerate() {
            x[n + offset] = constraints[j];
        }
    }

    fn initial_dual_point(&self, multipliers: &mut [f64]) {
        self.model.initial_dual_point(multipliers);
    }

    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        self.model.evaluate_objective(&x[..self.model.number_variables()])
    }

    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        self.model.evaluate_objective_gradient(&x[..self.model.number_variables()], gradient);
    }

    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        let n = self.model.number_variables();
        self.model.evaluate_constraints(&x[..n], constraints);
        for j in 0..self.model.number_constraints() {
            match self.slack_of_constraint[j] {
                // inequality: subtract the slack
                Some(slack_index) => constraints[j] -= x[slack_index],
                // equality: homogenize to c(x) = 0
                None => constraints[j] -= self.model.constraint_bounds(j).lower,
            }
        }
    }

    fn evaluate_constraint_jacobian(&self, x: &[f64], jacobian: &mut [SparseVector]) {
        let n = self.model.number_variables();
        self.model.evaluate_constraint_jacobian(&x[..n], jacobian);
        for j in 0..self.model.number_constraints() {
            if let Some(slack_index) = self.slack_of_constraint[j] {
                jacobian[j].insert(slack_index, -1.0);
            }
        }
    }

    fn evaluate_lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        // slacks are linear, the curvature block is the model's
        self.model.evaluate_lagrangian_hessian(
            &x[..self.model.number_variables()],
            objective_multiplier,
            multipliers,
            hessian,
        );
    }

    fn number_objective_gradient_nonzeros(&self) -> usize {
        self.model.number_objective_gradient_nonzeros()
    }

    fn number_jacobian_nonzeros(&self) -> usize {
        self.model.number_jacobian_nonzeros() + self.constraint_of_slack.len()
    }

    fn number_hessian_nonzeros(&self) -> usize {
        self.model.number_hessian_nonzeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // x0 free, one range constraint x0 ∈ [1, 2] and one equality x0 = 3
    struct MixedModel;

    impl Model for MixedModel {
        fn number_variables(&self) -> usize {
            1
        }
        fn number_constraints(&self) -> usize {
            2
        }
        fn variable_bounds(&self, _: usize) -> Interval {
            Interval::FREE
        }
        fn constraint_bounds(&self, j: usize) -> Interval {
            if j == 0 {
                Interval::new(1.0, 2.0)
            } else {
                Interval::equality(3.0)
            }
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.fill(1.5);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            x[0]
        }
        fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, 1.0);
        }
        fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
            constraints[0] = x[0];
            constraints[1] = x[0];
        }
        fn evaluate_constraint_jacobian(&self, _: &[f64], jacobian: &mut [SparseVector]) {
            jacobian[0].insert(0, 1.0);
            jacobian[1].insert(0, 1.0);
        }
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
    fn inequalities_get_slacks_and_equalities_are_homogenized() {
        let model = MixedModel;
        let equality_model = EqualityConstrainedModel::new(&model);
        assert_eq!(equality_model.number_slacks(), 1);
        assert_eq!(equality_model.number_variables(), 2);
        assert_eq!(equality_model.inner().number_variables(), 1);

        // the slack inherits the range of its constraint
        assert_eq!(equality_model.variable_bounds(1), Interval::new(1.0, 2.0));
        assert!(equality_model.constraint_bounds(0).is_equality());

        // c0 = x − s, c1 = x − 3
        let x = [1.5, 1.2];
        let mut constraints = vec![0.0; 2];
        equality_model.evaluate_constraints(&x, &mut constraints);
        assert!((constraints[0] - 0.3).abs() < 1e-14);
        assert!((constraints[1] + 1.5).abs() < 1e-14);

        // the slack column carries −1
        let mut jacobian = vec![SparseVector::default(), SparseVector::default()];
        equality_model.evaluate_constraint_jacobian(&x, &mut jacobian);
        assert_eq!(jacobian[0].to_dense(2), vec![1.0, -1.0]);
        assert_eq!(jacobian[1].to_dense(2), vec![1.0, 0.0]);

        // the initial point seeds the slack with the constraint value
        let mut start = vec![0.0; 2];
        equality_model.initial_primal_point(&mut start);
        assert_eq!(start, vec![1.5, 1.5]);
    }
}
