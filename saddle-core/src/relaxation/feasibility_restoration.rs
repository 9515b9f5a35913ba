//! Two-phase feasibility-restoration driver.
//!
//! Solves the original problem until the local model turns infeasible (or
//! the trust region collapses), then minimizes the constraint violation —
//! the l1-relaxed problem with σ = 0 — until an iterate passes the
//! feasibility-only acceptance test and the original KKT residual is no
//! worse than at the switch, at which point the optimality phase resumes.

use crate::direction::{Direction, Phase, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::{Iterate, ProgressMeasures};
use crate::globalization::GlobalizationStrategy;
use crate::model::Model;
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem, OriginalProblem};
use crate::relaxation::ConstraintRelaxationStrategy;
use crate::solvers::WarmstartInformation;
use crate::subproblem::Subproblem;
use crate::termination::{compute_kkt_residuals, KktResiduals};

pub struct FeasibilityRestoration<'m> {
    optimality_problem: OriginalProblem<'m>,
    feasibility_problem: L1RelaxedProblem<'m>,
    subproblem: Box<dyn Subproblem>,
    globalization: Box<dyn GlobalizationStrategy>,
    phase: Phase,
    /// original-problem residual at the moment of the switch
    reference_residual: f64,
    /// the infeasible direction that triggered the switch (its partition
    /// drives the active-set restoration objective)
    infeasible_direction: Option<Direction>,
}

impl<'m> FeasibilityRestoration<'m> {
    pub fn new(
        model: &'m dyn Model,
        subproblem: Box<dyn Subproblem>,
        globalization: Box<dyn GlobalizationStrategy>,
    ) -> Self {
        Self {
            optimality_problem: OriginalProblem::new(model),
            // restoration minimizes the violation only: σ = 0, ρ = 1
            feasibility_problem: L1RelaxedProblem::new(model, 0.0, 1.0),
            subproblem,
            globalization,
            phase: Phase::Optimality,
            reference_residual: f64::INFINITY,
            infeasible_direction: None,
        }
    }

    /// The problem the restoration subproblem works on: active-set methods
    /// build the partition objective on the original problem, the interior
    /// point solves the elastic barrier problem.
    fn restoration_is_elastic(&self) -> bool {
        !self.subproblem.uses_trust_region()
    }

    fn current_problem(&self) -> &dyn NonlinearProblem {
        match self.phase {
            Phase::Optimality => &self.optimality_problem,
            Phase::Restoration => {
                if self.restoration_is_elastic() {
                    &self.feasibility_problem
                } else {
                    &self.optimality_problem
                }
            }
        }
    }

    fn fill_progress(&self, iterate: &mut Iterate) {
        let problem = self.current_problem();
        problem.set_infeasibility_measure(iterate);
        problem.set_optimality_measure(iterate);
        self.subproblem.set_auxiliary_measure(problem, iterate);
    }

    fn predicted_reduction(
        &self,
        current: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> ProgressMeasures {
        let problem = self.current_problem();
        ProgressMeasures {
            infeasibility: problem.predicted_infeasibility_reduction(
                current,
                &direction.primals,
                step_length,
            ),
            optimality: direction.predicted_reduction.evaluate(step_length),
            auxiliary: self.subproblem.predicted_auxiliary_reduction(
                problem,
                current,
                direction,
                step_length,
            ),
        }
    }

    fn enter_restoration(&mut self, iterate: &mut Iterate, direction: &Direction) {
        self.phase = Phase::Restoration;
        self.reference_residual =
            compute_kkt_residuals(&self.optimality_problem, iterate, 0.0).max();
        self.infeasible_direction = Some(direction.clone());

        self.subproblem
            .initialize_feasibility_problem(&self.feasibility_problem, iterate);
        if self.restoration_is_elastic() {
            self.subproblem
                .set_elastic_variable_values(&self.feasibility_problem, iterate);
        }

        self.globalization.reset();
        self.fill_progress(iterate);
        self.globalization.register_current_progress(&iterate.progress);
    }

    fn exit_restoration(&mut self, iterate: &mut Iterate) {
        self.phase = Phase::Optimality;
        self.infeasible_direction = None;
        self.subproblem
            .exit_feasibility_problem(&self.optimality_problem, iterate);
        self.globalization.reset();
        self.fill_progress(iterate);
        self.globalization.register_current_progress(&iterate.progress);
    }
}

impl ConstraintRelaxationStrategy for FeasibilityRestoration<'_> {
    fn initialize(&mut self, iterate: &mut Iterate) -> Result<(), SolverError> {
        self.subproblem.initialize(&self.optimality_problem, iterate)?;
        self.fill_progress(iterate);
        self.globalization.initialize(&iterate.progress);
        Ok(())
    }

    fn compute_direction(
        &mut self,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
        warmstart: &WarmstartInformation,
    ) -> Direction {
        match self.phase {
            Phase::Optimality => {
                let direction = self.subproblem.solve(
                    &self.optimality_problem,
                    iterate,
                    trust_region_radius,
                    warmstart,
                );
                if direction.status == SubproblemStatus::Infeasible {
                    // the local model has no feasible point: restore
                    self.enter_restoration(iterate, &direction);
                    return self.compute_direction(iterate, trust_region_radius, warmstart);
                }
                direction
            }
            Phase::Restoration => {
                let seed = self
                    .infeasible_direction
                    .clone()
                    .unwrap_or_else(|| Direction::new(0, 0));
                if self.restoration_is_elastic() {
                    self.subproblem.solve_feasibility(
                        &self.feasibility_problem,
                        iterate,
                        &seed,
                        trust_region_radius,
                    )
                } else {
                    self.subproblem.solve_feasibility(
                        &self.optimality_problem,
                        iterate,
                        &seed,
                        trust_region_radius,
                    )
                }
            }
        }
    }

    fn switch_to_restoration(&mut self, iterate: &mut Iterate, direction: &Direction) -> bool {
        if self.phase == Phase::Restoration {
            return false;
        }
        self.enter_restoration(iterate, direction);
        true
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn set_progress_measures(&mut self, iterate: &mut Iterate) {
        self.fill_progress(iterate);
    }

    fn is_iterate_acceptable(
        &mut self,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> bool {
        // both sides measured with the same barrier parameter
        self.fill_progress(current);
        self.fill_progress(trial);
        let predicted = self.predicted_reduction(current, direction, step_length);

        match self.phase {
            Phase::Optimality => self.globalization.is_iterate_acceptable(
                &current.progress,
                &trial.progress,
                &predicted,
                direction.objective_multiplier,
            ),
            Phase::Restoration => {
                let accepted = self.globalization.is_feasibility_iterate_acceptable(
                    &current.progress,
                    &trial.progress,
                    &predicted,
                );
                if accepted {
                    // return to optimality when the original residual has
                    // not deteriorated since the switch
                    let residual =
                        compute_kkt_residuals(&self.optimality_problem, trial, 0.0).max();
                    if residual <= self.reference_residual {
                        self.exit_restoration(trial);
                    }
                }
                accepted
            }
        }
    }

    fn second_order_correction(
        &mut self,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Option<Direction> {
        let problem: &dyn NonlinearProblem = match self.phase {
            Phase::Optimality => &self.optimality_problem,
            Phase::Restoration => {
                if self.restoration_is_elastic() {
                    &self.feasibility_problem
                } else {
                    return None;
                }
            }
        };
        self.subproblem
            .second_order_correction(problem, trial, direction, step_length)
    }

    fn postprocess_accepted_iterate(&mut self, iterate: &mut Iterate) {
        if self.phase == Phase::Restoration && self.restoration_is_elastic() {
            self.subproblem
                .postprocess_accepted_iterate(&self.feasibility_problem, iterate);
        } else {
            self.subproblem
                .postprocess_accepted_iterate(&self.optimality_problem, iterate);
        }
    }

    fn kkt_residuals(&mut self, iterate: &mut Iterate) -> KktResiduals {
        compute_kkt_residuals(&self.optimality_problem, iterate, 0.0)
    }

    fn barrier_parameter(&self) -> Option<f64> {
        self.subproblem.barrier_parameter()
    }

    fn number_variables(&self) -> usize {
        self.current_problem().number_variables()
    }

    fn uses_trust_region(&self) -> bool {
        self.subproblem.uses_trust_region()
    }

    fn hessian_evaluation_count(&self) -> usize {
        self.subproblem.hessian_evaluation_count()
    }
}
