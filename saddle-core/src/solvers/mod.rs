//! External solver interfaces and built-in backends.
//!
//! The subproblem layer consumes a QP/LP solver through [`QpSolver`]; the
//! built-in [`BoxQpSolver`](box_qp::BoxQpSolver) implements it with a dense
//! primal-dual barrier method and an elastic phase-1 infeasibility
//! certificate.

pub mod box_qp;

pub use box_qp::BoxQpSolver;

use crate::direction::Direction;
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::Interval;

/// Which parts of the subproblem changed since the previous call, so a
/// backend can reuse factorizations and starting bases.
#[derive(Debug, Clone, Copy)]
pub struct WarmstartInformation {
    pub objective_changed: bool,
    pub constraints_changed: bool,
    pub variable_bounds_changed: bool,
    pub constraint_bounds_changed: bool,
    pub hessian_changed: bool,
}

impl WarmstartInformation {
    pub fn whole_problem_changed() -> Self {
        Self {
            objective_changed: true,
            constraints_changed: true,
            variable_bounds_changed: true,
            constraint_bounds_changed: true,
            hessian_changed: true,
        }
    }

    pub fn only_objective_changed() -> Self {
        Self {
            objective_changed: true,
            constraints_changed: false,
            variable_bounds_changed: false,
            constraint_bounds_changed: false,
            hessian_changed: false,
        }
    }
}

/// QP/LP solver contract.
///
/// Solves, in displacement space,
///
/// ```text
///   min  g^T d (+ 1/2 d^T H d)
///   s.t. cb_j.lower <= a_j^T d <= cb_j.upper
///        vb_i.lower <=    d_i  <= vb_i.upper
/// ```
///
/// and returns primals, *absolute* duals partitioned into (constraints,
/// lower bounds, upper bounds), an active-set record, and a status. On
/// infeasibility of the local model, the direction carries a constraint
/// partition classifying the violated sides.
pub trait QpSolver {
    #[allow(clippy::too_many_arguments)]
    fn solve_qp(
        &mut self,
        variable_bounds: &[Interval],
        constraint_bounds: &[Interval],
        gradient: &SparseVector,
        hessian: &SymmetricTriplets,
        jacobian: &[SparseVector],
        initial_point: &[f64],
        warmstart: &WarmstartInformation,
    ) -> Direction;

    #[allow(clippy::too_many_arguments)]
    fn solve_lp(
        &mut self,
        variable_bounds: &[Interval],
        constraint_bounds: &[Interval],
        gradient: &SparseVector,
        jacobian: &[SparseVector],
        initial_point: &[f64],
        warmstart: &WarmstartInformation,
    ) -> Direction;
}
