//! SLP subproblem: linear local model solved by an active-set LP solver.

use crate::direction::{Direction, PredictedReduction, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem};
use crate::solvers::{QpSolver, WarmstartInformation};
use crate::subproblem::active_set::{
    compute_dual_displacements, partition_from_constraint_values, tag_feasibility_direction,
    ActiveSetWorkspace,
};
use crate::subproblem::Subproblem;

pub struct LpSubproblem {
    workspace: ActiveSetWorkspace,
}

impl LpSubproblem {
    pub fn new(max_number_variables: usize, max_number_constraints: usize) -> Self {
        Self {
            workspace: ActiveSetWorkspace::new(max_number_variables, max_number_constraints),
        }
    }

    fn finish_direction(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        mut direction: Direction,
    ) -> Direction {
        self.workspace.number_subproblems_solved += 1;
        direction.objective_multiplier = problem.objective_multiplier();
        if direction.status == SubproblemStatus::Optimal {
            compute_dual_displacements(problem, iterate, &mut direction);
            // the predicted reduction is linear in the step length
            let slope = self.workspace.objective_gradient.dot(&direction.primals);
            direction.predicted_reduction = PredictedReduction::Linear { slope };
        }
        direction
    }
}

impl Subproblem for LpSubproblem {
    fn initialize(
        &mut self,
        _problem: &dyn NonlinearProblem,
        _iterate: &mut Iterate,
    ) -> Result<(), SolverError> {
        Ok(())
    }

    fn solve(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
        warmstart: &WarmstartInformation,
    ) -> Direction {
        if warmstart.objective_changed {
            problem.evaluate_objective_gradient(iterate, &mut self.workspace.objective_gradient);
        }
        let m = problem.number_constraints();
        if warmstart.constraints_changed {
            problem.evaluate_constraints(iterate, &mut self.workspace.constraints[..m]);
            problem
                .evaluate_constraint_jacobian(iterate, &mut self.workspace.constraint_jacobian[..m]);
        }
        self.workspace
            .set_variable_displacement_bounds(problem, iterate, trust_region_radius);
        self.workspace.set_linearized_constraint_bounds(problem);

        let n = problem.number_variables();
        let direction = self.workspace.solver.solve_lp(
            &self.workspace.variable_displacement_bounds[..n],
            &self.workspace.linearized_constraint_bounds[..m],
            &self.workspace.objective_gradient,
            &self.workspace.constraint_jacobian[..m],
            &self.workspace.initial_point[..n],
            warmstart,
        );
        self.finish_direction(problem, iterate, direction)
    }

    fn solve_feasibility(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        phase2_direction: &Direction,
        trust_region_radius: Option<f64>,
    ) -> Direction {
        let m = problem.number_constraints();
        problem.evaluate_constraints(iterate, &mut self.workspace.constraints[..m]);
        problem.evaluate_constraint_jacobian(
            iterate,
            &mut self.workspace.constraint_jacobian[..m],
        );

        let partition = phase2_direction.constraint_partition.clone().unwrap_or_else(|| {
            partition_from_constraint_values(problem, &self.workspace.constraints[..m])
        });

        self.workspace.set_feasibility_objective(&partition);
        self.workspace.set_feasibility_constraint_bounds(problem, &partition);
        self.workspace
            .set_variable_displacement_bounds(problem, iterate, trust_region_radius);

        let n = problem.number_variables();
        let mut initial_point = vec![0.0; n];
        let seed = phase2_direction.primals.len().min(n);
        initial_point[..seed].copy_from_slice(&phase2_direction.primals[..seed]);

        let direction = self.workspace.solver.solve_lp(
            &self.workspace.variable_displacement_bounds[..n],
            &self.workspace.linearized_constraint_bounds[..m],
            &self.workspace.objective_gradient,
            &self.workspace.constraint_jacobian[..m],
            &initial_point,
            &WarmstartInformation::whole_problem_changed(),
        );
        let mut direction = self.finish_direction(problem, iterate, direction);
        tag_feasibility_direction(&mut direction, &partition);
        direction
    }

    fn set_initial_point(&mut self, point: &[f64]) {
        self.workspace.initial_point[..point.len()].copy_from_slice(point);
    }

    fn initialize_feasibility_problem(
        &mut self,
        _problem: &L1RelaxedProblem,
        _iterate: &mut Iterate,
    ) {
    }

    fn set_elastic_variable_values(&self, problem: &L1RelaxedProblem, iterate: &mut Iterate) {
        problem.set_elastic_variable_values(iterate, |iterate, _, elastic_index, _| {
            iterate.set_primal(elastic_index, 0.0);
            iterate.multipliers.lower_bounds[elastic_index] = 1.0;
        });
    }

    fn exit_feasibility_problem(
        &mut self,
        _problem: &dyn NonlinearProblem,
        _iterate: &mut Iterate,
    ) {
    }

    fn set_auxiliary_measure(&self, _problem: &dyn NonlinearProblem, iterate: &mut Iterate) {
        iterate.progress.auxiliary = 0.0;
    }

    fn predicted_auxiliary_reduction(
        &self,
        _problem: &dyn NonlinearProblem,
        _iterate: &Iterate,
        _direction: &Direction,
        _step_length: f64,
    ) -> f64 {
        0.0
    }

    fn postprocess_accepted_iterate(
        &mut self,
        _problem: &dyn NonlinearProblem,
        _iterate: &mut Iterate,
    ) {
    }

    fn hessian_evaluation_count(&self) -> usize {
        // no second-order evaluations in SLP
        0
    }

    fn uses_trust_region(&self) -> bool {
        true
    }
}
