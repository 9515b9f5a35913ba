//! Globalization strategies: accept or reject trial iterates.
//!
//! All strategies compare (infeasibility, optimality, auxiliary) progress
//! triples and gate progress with an Armijo-style sufficient-decrease test.

pub mod filter;
pub mod funnel;
pub mod merit;

pub use filter::FilterStrategy;
pub use funnel::FunnelStrategy;
pub use merit::MeritFunction;

use crate::iterate::ProgressMeasures;
use crate::options::Options;

/// Accepts or rejects a trial iterate given current and trial progress and
/// the subproblem's predicted reductions.
pub trait GlobalizationStrategy {
    /// Seed the strategy with the initial iterate's progress.
    fn initialize(&mut self, initial_progress: &ProgressMeasures);

    fn is_iterate_acceptable(
        &mut self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
        objective_multiplier: f64,
    ) -> bool;

    /// Acceptance during feasibility restoration: infeasibility only.
    fn is_feasibility_iterate_acceptable(
        &self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
    ) -> bool;

    /// Empty the memory (filter/funnel contents) on a phase change.
    fn reset(&mut self);

    /// Publish the measures of the last accepted iterate.
    fn register_current_progress(&mut self, current_progress: &ProgressMeasures);
}

/// Armijo sufficient-decrease test shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct ArmijoCriterion {
    pub decrease_fraction: f64,
    pub tolerance: f64,
    pub protect_against_roundoff: bool,
}

impl ArmijoCriterion {
    pub fn from_options(options: &Options) -> Self {
        Self {
            decrease_fraction: options.armijo_decrease_fraction,
            tolerance: options.armijo_tolerance,
            protect_against_roundoff: options.protect_actual_reduction_against_roundoff,
        }
    }

    /// actual_reduction >= c_A·predicted_reduction, requiring a positive
    /// prediction.
    pub fn sufficient_decrease(&self, predicted_reduction: f64, actual_reduction: f64) -> bool {
        predicted_reduction > 0.0
            && actual_reduction >= self.decrease_fraction * predicted_reduction - self.tolerance
    }

    /// Correct an actual reduction for cancellation noise.
    pub fn protected_reduction(&self, actual_reduction: f64, reference_value: f64) -> f64 {
        if self.protect_against_roundoff {
            actual_reduction + 10.0 * f64::EPSILON * reference_value.abs().max(1.0)
        } else {
            actual_reduction
        }
    }
}

/// The scalar the filter/funnel strategies trade off against infeasibility.
pub fn unconstrained_merit(progress: &ProgressMeasures) -> f64 {
    progress.scaled_objective(1.0) + progress.auxiliary
}

/// Armijo test on the infeasibility measure alone (h-type acceptance used
/// during restoration).
pub fn feasibility_armijo(
    armijo: &ArmijoCriterion,
    current_progress: &ProgressMeasures,
    trial_progress: &ProgressMeasures,
    predicted_reduction: &ProgressMeasures,
) -> bool {
    let actual_reduction = armijo.protected_reduction(
        current_progress.infeasibility - trial_progress.infeasibility,
        current_progress.infeasibility,
    );
    armijo.sufficient_decrease(predicted_reduction.infeasibility, actual_reduction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armijo_requires_a_positive_prediction() {
        let armijo = ArmijoCriterion {
            decrease_fraction: 1e-4,
            tolerance: 1e-9,
            protect_against_roundoff: false,
        };
        assert!(!armijo.sufficient_decrease(-1.0, 1.0));
        assert!(armijo.sufficient_decrease(1.0, 1.0));
        assert!(armijo.sufficient_decrease(1.0, 1e-4));
        assert!(!armijo.sufficient_decrease(1.0, 1e-6));
    }
}
