//! l1-relaxation driver (Sl1QP).
//!
//! Solves the l1-relaxed problem with penalty ρ throughout. When the
//! optimality step leaves residual linearized infeasibility that a pure
//! feasibility step (σ = 0) could remove, ρ is escalated until the
//! linearization is feasibilized (the Byrd–Nocedal sufficient-feasibility
//! test); after a streak of feasible accepted iterates ρ backs off
//! cautiously, never below its initial value.

use crate::direction::{Direction, Phase, SubproblemStatus};
use crate::error::SolverError;
use crate::globalization::GlobalizationStrategy;
use crate::iterate::{Iterate, ProgressMeasures};
use crate::model::Model;
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem, OriginalProblem};
use crate::relaxation::ConstraintRelaxationStrategy;
use crate::solvers::WarmstartInformation;
use crate::subproblem::active_set::recover_l1qp_active_set;
use crate::subproblem::Subproblem;
use crate::termination::{compute_kkt_residuals, KktResiduals};

pub struct L1Relaxation<'m> {
    relaxed_problem: L1RelaxedProblem<'m>,
    optimality_problem: OriginalProblem<'m>,
    subproblem: Box<dyn Subproblem>,
    globalization: Box<dyn GlobalizationStrategy>,
    objective_sign: f64,
    initial_penalty: f64,
    penalty_update_factor: f64,
    feasible_streak_target: usize,
    feasible_streak: usize,
    tolerance: f64,
}

impl<'m> L1Relaxation<'m> {
    pub fn new(
        model: &'m dyn Model,
        subproblem: Box<dyn Subproblem>,
        globalization: Box<dyn GlobalizationStrategy>,
        initial_penalty: f64,
        penalty_update_factor: f64,
        feasible_streak_target: usize,
        tolerance: f64,
    ) -> Self {
        let objective_sign = model.objective_sign();
        Self {
            relaxed_problem: L1RelaxedProblem::new(model, objective_sign, initial_penalty),
            optimality_problem: OriginalProblem::new(model),
            subproblem,
            globalization,
            objective_sign,
            initial_penalty,
            penalty_update_factor,
            feasible_streak_target,
            feasible_streak: 0,
            tolerance,
        }
    }

    pub fn penalty_parameter(&self) -> f64 {
        self.relaxed_problem.penalty_parameter()
    }

    /// Linearized constraint violation left by a step: the elastic values
    /// at the full displacement.
    fn linearized_residual(&self, iterate: &Iterate, direction: &Direction) -> f64 {
        let elastics = self.relaxed_problem.elastic_variables();
        elastics
            .positive
            .values()
            .chain(elastics.negative.values())
            .map(|&index| iterate.primals[index] + direction.primals[index])
            .sum()
    }

    fn fill_progress(&self, iterate: &mut Iterate) {
        self.relaxed_problem.set_infeasibility_measure(iterate);
        self.relaxed_problem.set_optimality_measure(iterate);
        self.subproblem
            .set_auxiliary_measure(&self.relaxed_problem, iterate);
    }

    fn reset_elastic_values(&self, iterate: &mut Iterate) {
        let elastics = self.relaxed_problem.elastic_variables();
        let indices: Vec<usize> = elastics
            .positive
            .values()
            .chain(elastics.negative.values())
            .copied()
            .collect();
        for index in indices {
            iterate.set_primal(index, 0.0);
        }
    }
}

impl ConstraintRelaxationStrategy for L1Relaxation<'_> {
    fn initialize(&mut self, iterate: &mut Iterate) -> Result<(), SolverError> {
        self.subproblem.initialize(&self.relaxed_problem, iterate)?;
        self.subproblem
            .set_elastic_variable_values(&self.relaxed_problem, iterate);
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
        let mut direction =
            self.subproblem
                .solve(&self.relaxed_problem, iterate, trust_region_radius, warmstart);
        if direction.status != SubproblemStatus::Optimal {
            return direction;
        }

        let residual = self.linearized_residual(iterate, &direction);
        if residual > self.tolerance {
            // probe: can feasibility alone remove the violation?
            self.relaxed_problem.set_objective_multiplier(0.0);
            let feasibility_direction = self.subproblem.solve(
                &self.relaxed_problem,
                iterate,
                trust_region_radius,
                &WarmstartInformation::whole_problem_changed(),
            );
            self.relaxed_problem.set_objective_multiplier(self.objective_sign);

            if feasibility_direction.status == SubproblemStatus::Optimal {
                let feasibility_residual =
                    self.linearized_residual(iterate, &feasibility_direction);
                if feasibility_residual < 0.1 * residual {
                    // a higher penalty would feasibilize the linearization
                    for _ in 0..3 {
                        let penalty =
                            self.relaxed_problem.penalty_parameter() * self.penalty_update_factor;
                        self.relaxed_problem.set_penalty_parameter(penalty);
                        direction = self.subproblem.solve(
                            &self.relaxed_problem,
                            iterate,
                            trust_region_radius,
                            &WarmstartInformation::whole_problem_changed(),
                        );
                        if direction.status != SubproblemStatus::Optimal {
                            return direction;
                        }
                        if self.linearized_residual(iterate, &direction)
                            <= feasibility_residual + self.tolerance
                        {
                            break;
                        }
                    }
                } else {
                    // the linearization stays infeasible even without the
                    // objective: work on feasibility (σ = 0 step)
                    direction = feasibility_direction;
                }
            }
        }

        recover_l1qp_active_set(&self.relaxed_problem, &mut direction);
        direction
    }

    fn switch_to_restoration(&mut self, _iterate: &mut Iterate, _direction: &Direction) -> bool {
        // infeasibility is handled by the elastics; there is no separate
        // restoration phase
        false
    }

    fn phase(&self) -> Phase {
        Phase::Optimality
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
        self.fill_progress(current);
        self.fill_progress(trial);
        let predicted = ProgressMeasures {
            infeasibility: self.relaxed_problem.predicted_infeasibility_reduction(
                current,
                &direction.primals,
                step_length,
            ),
            optimality: direction.predicted_reduction.evaluate(step_length),
            auxiliary: self.subproblem.predicted_auxiliary_reduction(
                &self.relaxed_problem,
                current,
                direction,
                step_length,
            ),
        };

        let accepted = if direction.objective_multiplier == 0.0 {
            self.globalization.is_feasibility_iterate_acceptable(
                &current.progress,
                &trial.progress,
                &predicted,
            )
        } else {
            self.globalization.is_iterate_acceptable(
                &current.progress,
                &trial.progress,
                &predicted,
                direction.objective_multiplier,
            )
        };

        if accepted {
            self.reset_elastic_values(trial);
            // cautious penalty decrease after a feasible streak
            if trial.progress.infeasibility <= self.tolerance {
                self.feasible_streak += 1;
                if self.feasible_streak >= self.feasible_streak_target
                    && self.relaxed_problem.penalty_parameter() > self.initial_penalty
                {
                    let penalty = (self.relaxed_problem.penalty_parameter()
                        / self.penalty_update_factor)
                        .max(self.initial_penalty);
                    self.relaxed_problem.set_penalty_parameter(penalty);
                    self.feasible_streak = 0;
                }
            } else {
                self.feasible_streak = 0;
            }
        }
        accepted
    }

    fn second_order_correction(
        &mut self,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Option<Direction> {
        self.subproblem
            .second_order_correction(&self.relaxed_problem, trial, direction, step_length)
    }

    fn postprocess_accepted_iterate(&mut self, iterate: &mut Iterate) {
        self.subproblem
            .postprocess_accepted_iterate(&self.relaxed_problem, iterate);
    }

    fn kkt_residuals(&mut self, iterate: &mut Iterate) -> KktResiduals {
        compute_kkt_residuals(&self.optimality_problem, iterate, 0.0)
    }

    fn barrier_parameter(&self) -> Option<f64> {
        None
    }

    fn number_variables(&self) -> usize {
        self.relaxed_problem.number_variables()
    }

    fn uses_trust_region(&self) -> bool {
        true
    }

    fn hessian_evaluation_count(&self) -> usize {
        self.subproblem.hessian_evaluation_count()
    }
}
