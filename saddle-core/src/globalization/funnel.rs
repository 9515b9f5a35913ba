//! Funnel globalization.
//!
//! Instead of a multi-point filter, a single monotonically shrinking upper
//! bound ("funnel width") on the infeasibility is maintained. f-type steps
//! must pass an Armijo test on the objective; h-type steps shrink the
//! funnel towards the trial infeasibility.

use crate::globalization::{
    feasibility_armijo, unconstrained_merit, ArmijoCriterion, GlobalizationStrategy,
};
use crate::iterate::ProgressMeasures;
use crate::options::Options;

pub struct FunnelStrategy {
    width: f64,
    initial_factor: f64,
    kappa: f64,
    beta: f64,
    gamma: f64,
    switching_fraction: f64,
    armijo: ArmijoCriterion,
}

impl FunnelStrategy {
    pub fn new(options: &Options) -> Self {
        Self {
            width: f64::INFINITY,
            initial_factor: options.funnel_initial_factor,
            kappa: options.funnel_kappa,
            beta: options.filter_beta,
            gamma: options.filter_gamma,
            switching_fraction: options.filter_switching_fraction,
            armijo: ArmijoCriterion::from_options(options),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    fn shrink(&mut self, trial_infeasibility: f64) {
        let contracted = (1.0 - self.kappa) * self.width + self.kappa * trial_infeasibility;
        self.width = self.width.min(contracted);
    }
}

impl GlobalizationStrategy for FunnelStrategy {
    fn initialize(&mut self, initial_progress: &ProgressMeasures) {
        self.width = self.initial_factor * 1.0_f64.max(initial_progress.infeasibility);
    }

    fn is_iterate_acceptable(
        &mut self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
        objective_multiplier: f64,
    ) -> bool {
        if objective_multiplier == 0.0 {
            return self.is_feasibility_iterate_acceptable(
                current_progress,
                trial_progress,
                predicted_reduction,
            );
        }

        // the funnel is a hard cap on infeasibility
        if trial_progress.infeasibility > self.beta * self.width {
            return false;
        }

        let current_merit = unconstrained_merit(current_progress);
        let trial_merit = unconstrained_merit(trial_progress);
        let predicted_merit_reduction =
            predicted_reduction.scaled_objective(1.0) + predicted_reduction.auxiliary;

        let switching = predicted_merit_reduction
            > self.switching_fraction * current_progress.infeasibility.powi(2);
        if switching {
            let actual_reduction =
                self.armijo.protected_reduction(current_merit - trial_merit, current_merit);
            return self.armijo.sufficient_decrease(predicted_merit_reduction, actual_reduction);
        }

        // h-type: demand progress on infeasibility or on the objective, and
        // tighten the funnel
        let acceptable = trial_progress.infeasibility
            <= self.beta * current_progress.infeasibility
            || trial_merit <= current_merit - self.gamma * trial_progress.infeasibility;
        if acceptable {
            self.shrink(trial_progress.infeasibility);
        }
        acceptable
    }

    fn is_feasibility_iterate_acceptable(
        &self,
        current_progress: &ProgressMeasures,
        trial_progress: &ProgressMeasures,
        predicted_reduction: &ProgressMeasures,
    ) -> bool {
        feasibility_armijo(&self.armijo, current_progress, trial_progress, predicted_reduction)
    }

    fn reset(&mut self) {
        self.width = f64::INFINITY;
    }

    fn register_current_progress(&mut self, current_progress: &ProgressMeasures) {
        if self.width.is_infinite() {
            self.initialize(current_progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(infeasibility: f64, optimality: f64) -> ProgressMeasures {
        ProgressMeasures { infeasibility, optimality, auxiliary: 0.0 }
    }

    #[test]
    fn funnel_caps_infeasibility_and_shrinks() {
        let options = Options {
            funnel_initial_factor: 2.0,
            funnel_kappa: 0.5,
            ..Options::default()
        };
        let mut funnel = FunnelStrategy::new(&options);
        funnel.initialize(&progress(1.0, 0.0));
        assert_eq!(funnel.width(), 2.0);

        // outside the funnel
        assert!(!funnel.is_iterate_acceptable(
            &progress(1.0, 0.0),
            &progress(5.0, -100.0),
            &progress(0.0, 0.0),
            1.0,
        ));

        // h-type improvement shrinks the width towards the trial
        assert!(funnel.is_iterate_acceptable(
            &progress(1.0, 0.0),
            &progress(0.5, 0.0),
            &progress(0.4, 0.0),
            1.0,
        ));
        assert!((funnel.width() - 1.25).abs() < 1e-12);
        assert!(funnel.width() < 2.0);
    }
}
