//! l1 merit function globalization.

use crate::globalization::{feasibility_armijo, ArmijoCriterion, GlobalizationStrategy};
use crate::iterate::ProgressMeasures;
use crate::options::Options;

/// Accepts a trial iterate when the exact penalty function
/// φ = σ·f + auxiliary + infeasibility decreases by an Armijo fraction of
/// the predicted reduction.
pub struct MeritFunction {
    armijo: ArmijoCriterion,
    smallest_known_infeasibility: f64,
}

impl MeritFunction {
    pub fn new(options: &Options) -> Self {
        Self {
            armijo: ArmijoCriterion::from_options(options),
            smallest_known_infeasibility: f64::INFINITY,
        }
    }

    fn merit(progress: &ProgressMeasures, objective_multiplier: f64) -> f64 {
        progress.scaled_objective(objective_multiplier) + progress.auxiliary + progress.infeasibility
    }
}

impl GlobalizationStrategy for MeritFunction {
    fn initialize(&mut self, initial_progress: &ProgressMeasures) {
        self.smallest_known_infeasibility = initial_progress.infeasibility;
    }

    fn is_iterate_acceptable(
        &mut self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
        objective_multiplier: f64,
    ) -> bool {
        // all contributions of the predicted reduction; nonpositive means
        // the direction is not a descent direction for the merit function
        let constrained_predicted_reduction =
            predicted_reduction.scaled_objective(objective_multiplier)
                + predicted_reduction.auxiliary
                + predicted_reduction.infeasibility;

        let current_merit = Self::merit(current_progress, objective_multiplier);
        let trial_merit = Self::merit(trial_progress, objective_multiplier);
        let actual_reduction =
            self.armijo.protected_reduction(current_merit - trial_merit, current_merit);

        let accept = self
            .armijo
            .sufficient_decrease(constrained_predicted_reduction, actual_reduction);
        if accept {
            self.smallest_known_infeasibility =
                self.smallest_known_infeasibility.min(trial_progress.infeasibility);
        }
        accept
    }

    fn is_feasibility_iterate_acceptable(
        &self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
    ) -> bool {
        feasibility_armijo(&self.armijo, current_progress, trial_progress, predicted_reduction)
    }

    fn reset(&mut self) {}

    fn register_current_progress(&mut self, current_progress: &ProgressMeasures) {
        self.smallest_known_infeasibility =
            self.smallest_known_infeasibility.min(current_progress.infeasibility);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(infeasibility: f64, optimality: f64) -> ProgressMeasures {
        ProgressMeasures { infeasibility, optimality, auxiliary: 0.0 }
    }

    #[test]
    fn accepted_steps_satisfy_the_armijo_bound() {
        let options = Options::default();
        let mut merit = MeritFunction::new(&options);
        merit.initialize(&progress(1.0, 10.0));

        let current = progress(1.0, 10.0);
        let predicted = progress(0.5, 1.0); // predicted merit reduction 1.5

        // actual reduction 1.4 >= 1e-4 * 1.5
        let good_trial = progress(0.5, 9.1);
        assert!(merit.is_iterate_acceptable(&current, &good_trial, &predicted, 1.0));

        // actual reduction negative
        let bad_trial = progress(1.2, 10.0);
        assert!(!merit.is_iterate_acceptable(&current, &bad_trial, &predicted, 1.0));
    }

    #[test]
    fn feasibility_acceptance_only_looks_at_infeasibility() {
        let options = Options::default();
        let merit = MeritFunction::new(&options);
        let current = progress(1.0, 0.0);
        let trial = progress(0.4, 1e9); // objective may blow up in restoration
        let predicted = progress(0.5, 0.0);
        assert!(merit.is_feasibility_iterate_acceptable(&current, &trial, &predicted));
    }
}
