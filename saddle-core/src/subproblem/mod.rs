//! Subproblem strategies.
//!
//! Two families behind one narrow trait: active-set local models (QP for
//! SQP, LP for SLP) delegated to an external [`QpSolver`]
//! (crate::solvers::QpSolver), and the primal-dual interior-point
//! subproblem that factorizes the augmented KKT system itself.

pub mod active_set;
pub mod interior_point;
pub mod lp;
pub mod qp;

pub use interior_point::InteriorPointSubproblem;
pub use lp::LpSubproblem;
pub use qp::QpSubproblem;

use crate::direction::Direction;
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem};
use crate::solvers::WarmstartInformation;

/// One subproblem strategy.
///
/// `solve` produces a primal-dual [`Direction`] around the current iterate;
/// numeric trouble is reported through `Direction::status`, never by
/// panicking, so the driver keeps control of recovery.
pub trait Subproblem {
    /// Prepare the first iterate (interior push, initial multipliers).
    fn initialize(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    ) -> Result<(), SolverError>;

    /// Solve the local model. `trust_region_radius` caps the displacement
    /// bounds for active-set methods and is ignored by the interior point.
    fn solve(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
        warmstart: &WarmstartInformation,
    ) -> Direction;

    /// Solve the feasibility-restoration subproblem. Active-set methods
    /// build the l1 objective from the constraint partition of the failed
    /// `phase2_direction`; the interior point solves the relaxed barrier
    /// problem it was switched to.
    fn solve_feasibility(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        phase2_direction: &Direction,
        trust_region_radius: Option<f64>,
    ) -> Direction;

    /// Seed the next solve's warm start.
    fn set_initial_point(&mut self, point: &[f64]);

    /// Entering restoration: adapt subproblem state (the interior point
    /// raises μ; active-set methods have nothing to do).
    fn initialize_feasibility_problem(
        &mut self,
        problem: &L1RelaxedProblem,
        iterate: &mut Iterate,
    );

    /// Install elastic values consistent with this subproblem's algebra.
    fn set_elastic_variable_values(&self, problem: &L1RelaxedProblem, iterate: &mut Iterate);

    /// Leaving restoration: restore subproblem state.
    fn exit_feasibility_problem(&mut self, problem: &dyn NonlinearProblem, iterate: &mut Iterate);

    /// iterate.progress.auxiliary := subproblem-specific measure.
    fn set_auxiliary_measure(&self, problem: &dyn NonlinearProblem, iterate: &mut Iterate);

    /// Predicted reduction of the auxiliary measure along `direction`.
    fn predicted_auxiliary_reduction(
        &self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> f64;

    /// Re-solve with a corrected right-hand side after a rejection.
    fn second_order_correction(
        &mut self,
        _problem: &dyn NonlinearProblem,
        _trial_iterate: &mut Iterate,
        _direction: &Direction,
        _step_length: f64,
    ) -> Option<Direction> {
        None
    }

    /// Post-acceptance fixups on the new iterate (multiplier reset).
    fn postprocess_accepted_iterate(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    );

    fn hessian_evaluation_count(&self) -> usize;

    /// Current barrier parameter, when the subproblem has one.
    fn barrier_parameter(&self) -> Option<f64> {
        None
    }

    /// Whether the outer mechanism should run a trust region (active-set)
    /// or a backtracking line search (interior point).
    fn uses_trust_region(&self) -> bool;
}
