//! Outer iteration loop.
//!
//! Owns the current and trial iterates, runs the globalization mechanism
//! (trust region for active-set subproblems, backtracking line search for
//! the interior point), tests convergence and emits one statistics row per
//! outer iteration.

use std::time::Instant;

use crate::direction::{Direction, Phase, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::model::Model;
use crate::options::Options;
use crate::relaxation::ConstraintRelaxationStrategy;
use crate::solvers::WarmstartInformation;
use crate::termination::TerminationStatus;

/// Final solve report.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: TerminationStatus,
    /// primal solution, original model variables only
    pub primals: Vec<f64>,
    pub constraint_multipliers: Vec<f64>,
    pub lower_bound_multipliers: Vec<f64>,
    pub upper_bound_multipliers: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub stationarity: f64,
    pub infeasibility: f64,
    pub complementarity: f64,
    pub solve_time_seconds: f64,
    pub hessian_evaluations: usize,
}

enum IterationOutcome {
    Accepted(Direction),
    Terminal(TerminationStatus),
}

/// Run the outer loop of a configured solver.
///
/// `solved_model` is the model the relaxation strategy's problems wrap (the
/// slack reformulation for the interior point); the first
/// `number_original_variables` primals are reported back.
pub fn minimize(
    relaxation: &mut dyn ConstraintRelaxationStrategy,
    solved_model: &dyn Model,
    number_original_variables: usize,
    options: &Options,
) -> Result<SolveResult, SolverError> {
    let start = Instant::now();
    let n = solved_model.number_variables();
    let m = solved_model.number_constraints();
    // elastics may extend the iterate beyond the model's variables
    let max_number_variables = n + 2 * m;

    let mut current = Iterate::new(max_number_variables, m);
    let mut trial = Iterate::new(max_number_variables, m);
    let mut initial_point = vec![0.0; max_number_variables];
    solved_model.initial_primal_point(&mut initial_point[..n]);
    current.set_primals(&initial_point);
    solved_model.initial_dual_point(&mut current.multipliers.constraints);

    relaxation.initialize(&mut current)?;

    // a point that already satisfies the stopping test costs no iterations
    let residuals = relaxation.kkt_residuals(&mut current);
    if residuals.is_optimal(options.tolerance) {
        return Ok(finish(
            TerminationStatus::Optimal,
            &mut current,
            relaxation,
            solved_model,
            number_original_variables,
            0,
            start,
        ));
    }

    let mut trust_region_radius = options.trust_region_initial_radius;
    let mut status = TerminationStatus::IterationLimit;
    let mut iterations = 0;

    for iteration in 1..=options.max_iterations {
        iterations = iteration;
        if start.elapsed().as_secs_f64() > options.time_limit {
            status = TerminationStatus::TimeLimit;
            break;
        }

        let outcome = if relaxation.uses_trust_region() {
            trust_region_iteration(relaxation, &mut current, &mut trial, &mut trust_region_radius, options)
        } else {
            line_search_iteration(relaxation, &mut current, &mut trial, options)
        };

        match outcome {
            IterationOutcome::Terminal(terminal_status) => {
                status = terminal_status;
                break;
            }
            IterationOutcome::Accepted(direction) => {
                relaxation.postprocess_accepted_iterate(&mut current);

                let residuals = relaxation.kkt_residuals(&mut current);
                if options.verbose {
                    let scale = relaxation
                        .barrier_parameter()
                        .map(|mu| format!("mu={mu:9.2e}"))
                        .unwrap_or_else(|| format!("radius={trust_region_radius:9.2e}"));
                    eprintln!(
                        "iter {iteration:4}  f={:13.6e}  infeas={:9.2e}  stat={:9.2e}  |d|={:9.2e}  {scale}",
                        current.evaluations.objective,
                        residuals.feasibility,
                        residuals.stationarity,
                        direction.norm_inf(),
                    );
                }

                if residuals.is_optimal(options.tolerance) {
                    status = TerminationStatus::Optimal;
                    break;
                }
                if direction.small_step && residuals.feasibility <= options.tolerance {
                    status = TerminationStatus::SmallStep;
                    break;
                }
            }
        }
    }

    Ok(finish(
        status,
        &mut current,
        relaxation,
        solved_model,
        number_original_variables,
        iterations,
        start,
    ))
}

/// Handle the outcome of a direction whose displacement has collapsed.
fn small_direction_outcome(
    relaxation: &mut dyn ConstraintRelaxationStrategy,
    current: &mut Iterate,
    direction: &Direction,
    options: &Options,
) -> Option<IterationOutcome> {
    let scale = 1.0 + crate::linalg::inf_norm(&current.primals);
    let tiny = direction.small_step || direction.norm_inf() <= 1e-10 * scale;
    if !tiny {
        return None;
    }
    if current.progress.infeasibility > options.tolerance {
        // a vanishing restoration step at an infeasible point is a
        // stationary point of the constraint violation
        if relaxation.phase() == Phase::Restoration
            || !relaxation.switch_to_restoration(current, direction)
        {
            return Some(IterationOutcome::Terminal(TerminationStatus::Infeasible));
        }
        // restoration was just entered, let the caller re-solve
        return Some(IterationOutcome::Accepted(direction.clone()));
    }
    let status = if relaxation.kkt_residuals(current).is_optimal(options.tolerance) {
        TerminationStatus::Optimal
    } else {
        TerminationStatus::SmallStep
    };
    Some(IterationOutcome::Terminal(status))
}

fn trust_region_iteration(
    relaxation: &mut dyn ConstraintRelaxationStrategy,
    current: &mut Iterate,
    trial: &mut Iterate,
    radius: &mut f64,
    options: &Options,
) -> IterationOutcome {
    let mut warmstart = WarmstartInformation::whole_problem_changed();
    loop {
        let direction = relaxation.compute_direction(current, Some(*radius), &warmstart);
        match direction.status {
            SubproblemStatus::Error => {
                return IterationOutcome::Terminal(TerminationStatus::NumericalError)
            }
            SubproblemStatus::Infeasible => {
                // the relaxation strategy could not absorb the infeasible
                // local model
                return IterationOutcome::Terminal(TerminationStatus::Infeasible);
            }
            SubproblemStatus::Unbounded => {
                *radius *= 0.5;
                if *radius < options.trust_region_min_radius {
                    return IterationOutcome::Terminal(TerminationStatus::Unbounded);
                }
                warmstart = bounds_only_changed();
                continue;
            }
            SubproblemStatus::Optimal => {}
        }

        if let Some(outcome) = small_direction_outcome(relaxation, current, &direction, options) {
            match outcome {
                IterationOutcome::Accepted(_) => {
                    // restoration entered: restart with a fresh region
                    *radius = options.trust_region_initial_radius;
                    warmstart = WarmstartInformation::whole_problem_changed();
                    continue;
                }
                terminal => return terminal,
            }
        }

        build_trial(trial, current, &direction, 1.0, 1.0, relaxation.number_variables());
        if relaxation.is_iterate_acceptable(current, trial, &direction, 1.0) {
            current.copy_from(trial);
            // expand when the step pressed against the region
            if direction.norm_inf() >= 0.9 * *radius {
                *radius = (2.0 * *radius).min(options.trust_region_max_radius);
            }
            return IterationOutcome::Accepted(direction);
        }

        *radius *= 0.5;
        warmstart = bounds_only_changed();
        if *radius < options.trust_region_min_radius {
            if relaxation.switch_to_restoration(current, &direction) {
                *radius = options.trust_region_initial_radius;
                warmstart = WarmstartInformation::whole_problem_changed();
                continue;
            }
            let terminal = if current.progress.infeasibility <= options.tolerance {
                TerminationStatus::SmallStep
            } else {
                TerminationStatus::Infeasible
            };
            return IterationOutcome::Terminal(terminal);
        }
    }
}

fn line_search_iteration(
    relaxation: &mut dyn ConstraintRelaxationStrategy,
    current: &mut Iterate,
    trial: &mut Iterate,
    options: &Options,
) -> IterationOutcome {
    let warmstart = WarmstartInformation::whole_problem_changed();
    loop {
        let direction = relaxation.compute_direction(current, None, &warmstart);
        match direction.status {
            SubproblemStatus::Error => {
                return IterationOutcome::Terminal(TerminationStatus::NumericalError)
            }
            SubproblemStatus::Infeasible => {
                return IterationOutcome::Terminal(TerminationStatus::Infeasible)
            }
            SubproblemStatus::Unbounded => {
                return IterationOutcome::Terminal(TerminationStatus::Unbounded)
            }
            SubproblemStatus::Optimal => {}
        }

        if let Some(outcome) = small_direction_outcome(relaxation, current, &direction, options) {
            match outcome {
                IterationOutcome::Accepted(_) => continue,
                terminal => return terminal,
            }
        }

        let mut step_length = 1.0;
        let mut correction_attempted = false;
        loop {
            let primal_step = step_length * direction.primal_dual_step_length;
            build_trial(
                trial,
                current,
                &direction,
                primal_step,
                direction.bound_dual_step_length,
                relaxation.number_variables(),
            );
            if relaxation.is_iterate_acceptable(current, trial, &direction, primal_step) {
                current.copy_from(trial);
                return IterationOutcome::Accepted(direction);
            }

            // one second-order correction on the first rejection
            if !correction_attempted {
                correction_attempted = true;
                if let Some(correction) =
                    relaxation.second_order_correction(trial, &direction, primal_step)
                {
                    if correction.status == SubproblemStatus::Optimal {
                        let corrected_step = correction.primal_dual_step_length;
                        build_trial(
                            trial,
                            current,
                            &correction,
                            corrected_step,
                            correction.bound_dual_step_length,
                            relaxation.number_variables(),
                        );
                        if relaxation.is_iterate_acceptable(current, trial, &correction, corrected_step)
                        {
                            current.copy_from(trial);
                            return IterationOutcome::Accepted(correction);
                        }
                    }
                }
            }

            step_length *= options.line_search_backtrack_factor;
            if step_length < options.line_search_min_step {
                if relaxation.switch_to_restoration(current, &direction) {
                    break;
                }
                let terminal = if current.progress.infeasibility <= options.tolerance {
                    TerminationStatus::SmallStep
                } else {
                    TerminationStatus::Infeasible
                };
                return IterationOutcome::Terminal(terminal);
            }
        }
    }
}

/// trial := current + step · direction.
fn build_trial(
    trial: &mut Iterate,
    current: &Iterate,
    direction: &Direction,
    primal_step_length: f64,
    bound_dual_step_length: f64,
    number_variables: usize,
) {
    let mut primals = current.primals.clone();
    for i in 0..number_variables.min(direction.primals.len()) {
        primals[i] += primal_step_length * direction.primals[i];
    }
    trial.set_primals(&primals);

    trial.multipliers.constraints.copy_from_slice(&current.multipliers.constraints);
    for j in 0..direction.multipliers.constraints.len() {
        trial.multipliers.constraints[j] +=
            primal_step_length * direction.multipliers.constraints[j];
    }
    trial.multipliers.lower_bounds.copy_from_slice(&current.multipliers.lower_bounds);
    trial.multipliers.upper_bounds.copy_from_slice(&current.multipliers.upper_bounds);
    for i in 0..direction.multipliers.lower_bounds.len() {
        trial.multipliers.lower_bounds[i] +=
            bound_dual_step_length * direction.multipliers.lower_bounds[i];
        trial.multipliers.upper_bounds[i] +=
            bound_dual_step_length * direction.multipliers.upper_bounds[i];
    }
}

fn bounds_only_changed() -> WarmstartInformation {
    WarmstartInformation {
        objective_changed: false,
        constraints_changed: false,
        variable_bounds_changed: true,
        constraint_bounds_changed: false,
        hessian_changed: false,
    }
}

fn finish(
    status: TerminationStatus,
    current: &mut Iterate,
    relaxation: &mut dyn ConstraintRelaxationStrategy,
    solved_model: &dyn Model,
    number_original_variables: usize,
    iterations: usize,
    start: Instant,
) -> SolveResult {
    let residuals = relaxation.kkt_residuals(current);
    let objective = current.evaluate_objective(solved_model);
    SolveResult {
        status,
        primals: current.primals[..number_original_variables].to_vec(),
        constraint_multipliers: current.multipliers.constraints.clone(),
        lower_bound_multipliers: current.multipliers.lower_bounds
            [..number_original_variables]
            .to_vec(),
        upper_bound_multipliers: current.multipliers.upper_bounds
            [..number_original_variables]
            .to_vec(),
        objective,
        iterations,
        stationarity: residuals.stationarity,
        infeasibility: residuals.feasibility,
        complementarity: residuals.complementarity,
        solve_time_seconds: start.elapsed().as_secs_f64(),
        hessian_evaluations: relaxation.hessian_evaluation_count(),
    }
}
