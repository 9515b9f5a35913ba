//! SQP subproblem: quadratic local model solved by an active-set QP solver.

use nalgebra::DMatrix;

use crate::direction::{Direction, PredictedReduction, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::linalg::sparse::{quadratic_product, SymmetricTriplets};
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem};
use crate::solvers::{QpSolver, WarmstartInformation};
use crate::subproblem::active_set::{
    compute_dual_displacements, partition_from_constraint_values, tag_feasibility_direction,
    ActiveSetWorkspace,
};
use crate::subproblem::Subproblem;

pub struct QpSubproblem {
    workspace: ActiveSetWorkspace,
    hessian: SymmetricTriplets,
    hessian_evaluation_count: usize,
}

impl QpSubproblem {
    pub fn new(max_number_variables: usize, max_number_constraints: usize) -> Self {
        Self {
            workspace: ActiveSetWorkspace::new(max_number_variables, max_number_constraints),
            hessian: SymmetricTriplets::new((max_number_variables, max_number_variables)),
            hessian_evaluation_count: 0,
        }
    }

    fn evaluate_functions(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        warmstart: &WarmstartInformation,
    ) {
        if warmstart.objective_changed {
            problem.evaluate_objective_gradient(iterate, &mut self.workspace.objective_gradient);
        }
        if warmstart.constraints_changed {
            problem.evaluate_constraints(
                iterate,
                &mut self.workspace.constraints[..problem.number_constraints()],
            );
            problem.evaluate_constraint_jacobian(
                iterate,
                &mut self.workspace.constraint_jacobian[..problem.number_constraints()],
            );
        }
        if warmstart.hessian_changed {
            problem.evaluate_lagrangian_hessian(iterate, &mut self.hessian);
            self.hessian_evaluation_count += 1;
            convexify(&mut self.hessian, problem.number_variables());
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
            let slope = self.workspace.objective_gradient.dot(&direction.primals);
            let curvature = quadratic_product(&self.hessian, &direction.primals);
            direction.predicted_reduction = PredictedReduction::Quadratic { slope, curvature };
        }
        direction
    }
}

impl Subproblem for QpSubproblem {
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
        self.evaluate_functions(problem, iterate, warmstart);
        self.workspace
            .set_variable_displacement_bounds(problem, iterate, trust_region_radius);
        self.workspace.set_linearized_constraint_bounds(problem);

        let n = problem.number_variables();
        let m = problem.number_constraints();
        let direction = self.workspace.solver.solve_qp(
            &self.workspace.variable_displacement_bounds[..n],
            &self.workspace.linearized_constraint_bounds[..m],
            &self.workspace.objective_gradient,
            &self.hessian,
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

        // curvature with the signed restoration multipliers and σ = 0
        let mut multipliers = iterate.multipliers.constraints.clone();
        for &j in &partition.infeasible {
            multipliers[j] = match partition.feasibility[j] {
                crate::direction::ConstraintFeasibility::InfeasibleLower => 1.0,
                _ => -1.0,
            };
        }
        let n = problem.number_variables();
        self.hessian = SymmetricTriplets::new((n, n));
        problem.model().evaluate_lagrangian_hessian(
            &iterate.primals[..problem.model().number_variables()],
            0.0,
            &multipliers,
            &mut self.hessian,
        );
        self.hessian_evaluation_count += 1;
        convexify(&mut self.hessian, n);

        // the optimality direction seeds the warm start
        let mut initial_point = vec![0.0; n];
        let seed = phase2_direction.primals.len().min(n);
        initial_point[..seed].copy_from_slice(&phase2_direction.primals[..seed]);

        let direction = self.workspace.solver.solve_qp(
            &self.workspace.variable_displacement_bounds[..n],
            &self.workspace.linearized_constraint_bounds[..m],
            &self.workspace.objective_gradient,
            &self.hessian,
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
        // no auxiliary terms in active-set methods
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
        self.hessian_evaluation_count
    }

    fn uses_trust_region(&self) -> bool {
        true
    }
}

/// Regularize the Hessian until it is positive definite, so the convex QP
/// backend receives a well-posed model. The shift starts tiny and grows
/// geometrically, mirroring the augmented-system inertia correction.
fn convexify(hessian: &mut SymmetricTriplets, n: usize) {
    if n == 0 {
        return;
    }
    let mut dense = DMatrix::<f64>::zeros(n, n);
    for (&value, (row, col)) in hessian.triplet_iter() {
        dense[(row, col)] += value;
        if row != col {
            dense[(col, row)] += value;
        }
    }

    let mut shift = 0.0;
    let mut trial = 1e-8_f64;
    while nalgebra::Cholesky::new(dense.clone()).is_none() {
        let increment = trial - shift;
        for i in 0..n {
            dense[(i, i)] += increment;
        }
        shift = trial;
        trial *= 10.0;
        if shift > 1e12 {
            break;
        }
    }
    if shift > 0.0 {
        for i in 0..n {
            hessian.add_triplet(i, i, shift);
        }
    }
}
