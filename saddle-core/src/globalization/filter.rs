//! Filter globalization.
//!
//! A filter keeps a set of (infeasibility, objective) pairs no trial
//! iterate may be dominated by. Steps with a large enough predicted
//! objective reduction (f-type) must additionally pass an Armijo test;
//! h-type steps augment the filter with the current pair.

use crate::globalization::{
    feasibility_armijo, unconstrained_merit, ArmijoCriterion, GlobalizationStrategy,
};
use crate::iterate::ProgressMeasures;
use crate::options::Options;

/// The (h, f) memory with margin-based acceptability.
pub struct Filter {
    entries: Vec<(f64, f64)>,
    capacity: usize,
    infeasibility_upper_bound: f64,
    /// envelope margins
    beta: f64,
    gamma: f64,
}

impl Filter {
    pub fn new(capacity: usize, beta: f64, gamma: f64) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            infeasibility_upper_bound: f64::INFINITY,
            beta,
            gamma,
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn set_infeasibility_upper_bound(&mut self, upper_bound: f64) {
        self.infeasibility_upper_bound = upper_bound;
    }

    /// Margin-acceptability of a pair with respect to one envelope corner.
    fn acceptable_to_pair(&self, corner: (f64, f64), infeasibility: f64, objective: f64) -> bool {
        infeasibility <= self.beta * corner.0 || objective <= corner.1 - self.gamma * infeasibility
    }

    /// Not dominated by any filter entry and below the upper bound.
    pub fn acceptable(&self, infeasibility: f64, objective: f64) -> bool {
        if infeasibility >= self.infeasibility_upper_bound {
            return false;
        }
        self.entries
            .iter()
            .all(|&corner| self.acceptable_to_pair(corner, infeasibility, objective))
    }

    /// Insert a pair, dropping entries it dominates.
    pub fn add(&mut self, infeasibility: f64, objective: f64) {
        self.entries
            .retain(|&(h, f)| h < infeasibility || f < objective);
        if self.entries.len() == self.capacity {
            // drop the most infeasible corner to make room
            if let Some(index) = self
                .entries
                .iter()
                .enumerate()
                .max_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
                .map(|(index, _)| index)
            {
                self.entries.swap_remove(index);
            }
        }
        self.entries.push((infeasibility, objective));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct FilterStrategy {
    filter: Filter,
    armijo: ArmijoCriterion,
    switching_fraction: f64,
    beta: f64,
    gamma: f64,
}

impl FilterStrategy {
    pub fn new(options: &Options) -> Self {
        Self {
            filter: Filter::new(options.filter_capacity, options.filter_beta, options.filter_gamma),
            armijo: ArmijoCriterion::from_options(options),
            switching_fraction: options.filter_switching_fraction,
            beta: options.filter_beta,
            gamma: options.filter_gamma,
        }
    }

    /// f-type steps need the predicted objective decrease to dominate the
    /// current infeasibility.
    fn switching_condition(&self, predicted_reduction: f64, current_infeasibility: f64) -> bool {
        predicted_reduction > self.switching_fraction * current_infeasibility.powi(2)
    }
}

impl GlobalizationStrategy for FilterStrategy {
    fn initialize(&mut self, initial_progress: &ProgressMeasures) {
        self.filter.reset();
        self.filter.set_infeasibility_upper_bound(
            1e4 * 1.0_f64.max(1.25 * initial_progress.infeasibility),
        );
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

        let current_merit = unconstrained_merit(current_progress);
        let trial_merit = unconstrained_merit(trial_progress);

        // acceptable to the filter and to the current pair
        if !self.filter.acceptable(trial_progress.infeasibility, trial_merit) {
            return false;
        }
        let acceptable_to_current = trial_progress.infeasibility
            <= self.beta * current_progress.infeasibility
            || trial_merit <= current_merit - self.gamma * trial_progress.infeasibility;
        if !acceptable_to_current {
            return false;
        }

        let predicted_merit_reduction =
            predicted_reduction.scaled_objective(1.0) + predicted_reduction.auxiliary;
        if self.switching_condition(predicted_merit_reduction, current_progress.infeasibility) {
            // f-type: an unconstrained sufficient decrease is required and
            // the filter is not augmented
            let actual_reduction =
                self.armijo.protected_reduction(current_merit - trial_merit, current_merit);
            return self.armijo.sufficient_decrease(predicted_merit_reduction, actual_reduction);
        }

        // h-type: augment the filter with the current pair
        self.filter.add(current_progress.infeasibility, current_merit);
        true
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
        self.filter.reset();
    }

    fn register_current_progress(&mut self, current_progress: &ProgressMeasures) {
        self.filter
            .add(current_progress.infeasibility, unconstrained_merit(current_progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_domination() {
        let mut filter = Filter::new(50, 0.999, 0.001);
        filter.add(1.0, 5.0);
        // dominated on both measures
        assert!(!filter.acceptable(1.0, 5.0));
        assert!(!filter.acceptable(2.0, 6.0));
        // better infeasibility by the β margin
        assert!(filter.acceptable(0.5, 100.0));
        // better objective
        assert!(filter.acceptable(1.0, 4.0));
    }

    #[test]
    fn adding_a_dominating_pair_prunes_the_filter() {
        let mut filter = Filter::new(50, 0.999, 0.001);
        filter.add(1.0, 5.0);
        filter.add(2.0, 3.0);
        assert_eq!(filter.len(), 2);
        // dominates both existing corners
        filter.add(0.5, 1.0);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn upper_bound_rejects_large_infeasibility() {
        let mut filter = Filter::new(50, 0.999, 0.001);
        filter.set_infeasibility_upper_bound(10.0);
        assert!(filter.acceptable(9.0, 0.0));
        assert!(!filter.acceptable(11.0, -1e9));
    }

    #[test]
    fn h_type_steps_augment_the_filter() {
        let options = Options::default();
        let mut strategy = FilterStrategy::new(&options);
        let current = ProgressMeasures { infeasibility: 1.0, optimality: 5.0, auxiliary: 0.0 };
        strategy.initialize(&current);

        // no predicted objective reduction: h-type step that improves
        // infeasibility
        let trial = ProgressMeasures { infeasibility: 0.2, optimality: 5.1, auxiliary: 0.0 };
        let predicted = ProgressMeasures { infeasibility: 0.8, optimality: 0.0, auxiliary: 0.0 };
        assert!(strategy.is_iterate_acceptable(&current, &trial, &predicted, 1.0));
        assert_eq!(strategy.filter.len(), 1);

        // the old pair is now in the filter: a trial matching it is rejected
        let revisit = ProgressMeasures { infeasibility: 1.0, optimality: 5.0, auxiliary: 0.0 };
        assert!(!strategy.is_iterate_acceptable(&trial, &revisit, &predicted, 1.0));
    }
}
