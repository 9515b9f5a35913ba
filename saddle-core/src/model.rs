//! User-facing problem contract.
//!
//! A [`Model`] exposes raw evaluations of a smooth nonlinear program
//!
//! ```text
//!   minimize    f(x)
//!   subject to  c_L <= c(x) <= c_U
//!               x_L <=  x   <= x_U
//! ```
//!
//! The solver reads models through this trait only; automatic
//! differentiation, file formats and modeling layers live outside.

use crate::linalg::sparse::{SparseVector, SymmetricTriplets};

/// A bound interval; either side may be infinite, an equality has
/// `lower == upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub const FREE: Interval = Interval {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn equality(value: f64) -> Self {
        Self { lower: value, upper: value }
    }

    pub fn lower_bounded(lower: f64) -> Self {
        Self { lower, upper: f64::INFINITY }
    }

    pub fn upper_bounded(upper: f64) -> Self {
        Self { lower: f64::NEG_INFINITY, upper }
    }

    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }

    pub fn has_finite_lower(&self) -> bool {
        self.lower.is_finite()
    }

    pub fn has_finite_upper(&self) -> bool {
        self.upper.is_finite()
    }

    /// Amount by which `value` violates the interval (0 if inside).
    pub fn violation(&self, value: f64) -> f64 {
        (self.lower - value).max(value - self.upper).max(0.0)
    }
}

/// Read-only nonlinear program.
///
/// Sign conventions: `objective_sign` is +1 for minimization and -1 for
/// maximization; the Lagrangian is
/// `L(x, λ, z) = σ f(x) − λᵀ c(x) − z_Lᵀ(x − x_L) − z_Uᵀ(x − x_U)`,
/// so constraint multipliers enter `evaluate_lagrangian_hessian` with a
/// minus sign and bound multipliers satisfy `z_L >= 0`, `z_U <= 0`.
pub trait Model {
    fn number_variables(&self) -> usize;
    fn number_constraints(&self) -> usize;

    fn objective_sign(&self) -> f64 {
        1.0
    }

    fn variable_bounds(&self, variable_index: usize) -> Interval;
    fn constraint_bounds(&self, constraint_index: usize) -> Interval;

    fn initial_primal_point(&self, x: &mut [f64]);

    fn initial_dual_point(&self, multipliers: &mut [f64]) {
        multipliers.fill(0.0);
    }

    fn evaluate_objective(&self, x: &[f64]) -> f64;
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector);
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]);
    fn evaluate_constraint_jacobian(&self, x: &[f64], jacobian: &mut [SparseVector]);

    /// Hessian of the Lagrangian, accumulated as lower-triangle triplets.
    fn evaluate_lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
        hessian: &mut SymmetricTriplets,
    );

    // nonzero-count estimates used to size workspaces once
    fn number_objective_gradient_nonzeros(&self) -> usize {
        self.number_variables()
    }

    fn number_jacobian_nonzeros(&self) -> usize {
        self.number_variables() * self.number_constraints()
    }

    fn number_hessian_nonzeros(&self) -> usize {
        let n = self.number_variables();
        n * (n + 1) / 2
    }

    /// l1 norm of the constraint violations.
    fn constraint_violation(&self, constraints: &[f64]) -> f64 {
        (0..self.number_constraints())
            .map(|j| self.constraint_bounds(j).violation(constraints[j]))
            .sum()
    }

    /// Infinity norm of the constraint violations.
    fn constraint_violation_inf(&self, constraints: &[f64]) -> f64 {
        (0..self.number_constraints())
            .map(|j| self.constraint_bounds(j).violation(constraints[j]))
            .fold(0.0_f64, f64::max)
    }
}

/// Index sets derived from the bounds, computed once per problem.
#[derive(Debug, Clone, Default)]
pub struct BoundSets {
    /// variables with a finite lower bound
    pub lower_bounded: Vec<usize>,
    /// variables with a finite upper bound
    pub upper_bounded: Vec<usize>,
    /// variables bounded below only
    pub single_lower_bounded: Vec<usize>,
    /// variables bounded above only
    pub single_upper_bounded: Vec<usize>,
    /// constraints with `lower == upper`
    pub equality_constraints: Vec<usize>,
    /// all other constraints
    pub inequality_constraints: Vec<usize>,
}

impl BoundSets {
    pub fn new(variable_bounds: &[Interval], constraint_bounds: &[Interval]) -> Self {
        let mut sets = BoundSets::default();
        for (i, bounds) in variable_bounds.iter().enumerate() {
            if bounds.has_finite_lower() {
                sets.lower_bounded.push(i);
                if !bounds.has_finite_upper() {
                    sets.single_lower_bounded.push(i);
                }
            }
            if bounds.has_finite_upper() {
                sets.upper_bounded.push(i);
                if !bounds.has_finite_lower() {
                    sets.single_upper_bounded.push(i);
                }
            }
        }
        for (j, bounds) in constraint_bounds.iter().enumerate() {
            if bounds.is_equality() {
                sets.equality_constraints.push(j);
            } else {
                sets.inequality_constraints.push(j);
            }
        }
        sets
    }

    pub fn from_model(model: &dyn Model) -> Self {
        let variable_bounds: Vec<Interval> = (0..model.number_variables())
            .map(|i| model.variable_bounds(i))
            .collect();
        let constraint_bounds: Vec<Interval> = (0..model.number_constraints())
            .map(|j| model.constraint_bounds(j))
            .collect();
        Self::new(&variable_bounds, &constraint_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_violation() {
        let bounds = Interval::new(1.0, 2.0);
        assert_eq!(bounds.violation(1.5), 0.0);
        assert_eq!(bounds.violation(0.5), 0.5);
        assert_eq!(bounds.violation(3.0), 1.0);
        assert!(Interval::FREE.violation(1e30) == 0.0);
    }

    #[test]
    fn bound_sets_classification() {
        let variable_bounds = [
            Interval::new(0.0, 1.0),
            Interval::lower_bounded(0.0),
            Interval::upper_bounded(5.0),
            Interval::FREE,
        ];
        let constraint_bounds = [Interval::equality(1.0), Interval::lower_bounded(0.0)];
        let sets = BoundSets::new(&variable_bounds, &constraint_bounds);
        assert_eq!(sets.lower_bounded, vec![0, 1]);
        assert_eq!(sets.upper_bounded, vec![0, 2]);
        assert_eq!(sets.single_lower_bounded, vec![1]);
        assert_eq!(sets.single_upper_bounded, vec![2]);
        assert_eq!(sets.equality_constraints, vec![0]);
        assert_eq!(sets.inequality_constraints, vec![1]);
    }
}
