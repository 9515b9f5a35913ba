//! Constraint-relaxation strategies.
//!
//! The driver-facing layer that owns the reformulated problems, the
//! subproblem and the globalization strategy, and runs the state machine
//! between the optimality and feasibility-restoration phases (or manages
//! the l1 penalty for Sl1QP).

pub mod feasibility_restoration;
pub mod l1_relaxation;

pub use feasibility_restoration::FeasibilityRestoration;
pub use l1_relaxation::L1Relaxation;

use crate::direction::{Direction, Phase};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::solvers::WarmstartInformation;
use crate::termination::KktResiduals;

pub trait ConstraintRelaxationStrategy {
    /// Prepare the initial iterate: subproblem initialization, initial
    /// progress measures, globalization seeding.
    fn initialize(&mut self, iterate: &mut Iterate) -> Result<(), SolverError>;

    /// Compute a direction for the current phase. An infeasible local model
    /// triggers the switch to restoration internally.
    fn compute_direction(
        &mut self,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
        warmstart: &WarmstartInformation,
    ) -> Direction;

    /// Force the restoration phase (trust region exhausted). Returns false
    /// when the strategy has no restoration phase to switch to.
    fn switch_to_restoration(&mut self, iterate: &mut Iterate, direction: &Direction) -> bool;

    fn phase(&self) -> Phase;

    /// Fill the progress measures of an iterate for the current phase.
    fn set_progress_measures(&mut self, iterate: &mut Iterate);

    /// Globalization decision on a trial iterate; on an accepted
    /// restoration iterate this may switch back to the optimality phase.
    fn is_iterate_acceptable(
        &mut self,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> bool;

    fn second_order_correction(
        &mut self,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Option<Direction>;

    /// Post-acceptance fixups (interior-point multiplier reset).
    fn postprocess_accepted_iterate(&mut self, iterate: &mut Iterate);

    /// KKT residuals of the original (optimality) problem with μ = 0.
    fn kkt_residuals(&mut self, iterate: &mut Iterate) -> KktResiduals;

    /// Current barrier parameter, for statistics.
    fn barrier_parameter(&self) -> Option<f64>;

    /// Dimension of the current phase's problem.
    fn number_variables(&self) -> usize;

    fn uses_trust_region(&self) -> bool;

    fn hessian_evaluation_count(&self) -> usize;
}
