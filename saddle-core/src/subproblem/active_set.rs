//! Shared machinery of the active-set subproblems.
//!
//! Displacement bounds, linearized constraint bounds, dual displacement
//! conversion, the l1 feasibility objective built from a constraint
//! partition, and the l1-QP active-set cleanup.

use crate::direction::{ConstraintFeasibility, ConstraintPartition, Direction, Phase};
use crate::iterate::Iterate;
use crate::linalg::sparse::SparseVector;
use crate::model::Interval;
use crate::reformulation::{L1RelaxedProblem, NonlinearProblem};
use crate::solvers::BoxQpSolver;

/// Workspace shared by the QP and LP subproblems, allocated once at the
/// maximal dimensions.
pub struct ActiveSetWorkspace {
    pub initial_point: Vec<f64>,
    pub objective_gradient: SparseVector,
    pub constraints: Vec<f64>,
    pub constraint_jacobian: Vec<SparseVector>,
    pub variable_displacement_bounds: Vec<Interval>,
    pub linearized_constraint_bounds: Vec<Interval>,
    pub solver: BoxQpSolver,
    pub number_subproblems_solved: usize,
}

impl ActiveSetWorkspace {
    pub fn new(max_number_variables: usize, max_number_constraints: usize) -> Self {
        Self {
            initial_point: vec![0.0; max_number_variables],
            objective_gradient: SparseVector::with_capacity(max_number_variables),
            constraints: vec![0.0; max_number_constraints],
            constraint_jacobian: vec![SparseVector::default(); max_number_constraints],
            variable_displacement_bounds: vec![Interval::FREE; max_number_variables],
            linearized_constraint_bounds: vec![Interval::FREE; max_number_constraints],
            solver: BoxQpSolver::new(),
            number_subproblems_solved: 0,
        }
    }

    /// Variable bounds intersected with the trust region, in displacement
    /// space. The trust region does not apply to the additional (elastic)
    /// variables beyond the original ones.
    pub fn set_variable_displacement_bounds(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        trust_region_radius: Option<f64>,
    ) {
        let radius = trust_region_radius.unwrap_or(f64::INFINITY);
        let number_originals = problem.number_original_variables();
        for i in 0..problem.number_variables() {
            let bounds = problem.variable_bounds(i);
            let lower = bounds.lower - iterate.primals[i];
            let upper = bounds.upper - iterate.primals[i];
            self.variable_displacement_bounds[i] = if i < number_originals {
                Interval::new(lower.max(-radius), upper.min(radius))
            } else {
                Interval::new(lower, upper)
            };
        }
    }

    /// Linearized constraint bounds (c_L − c(x), c_U − c(x)).
    pub fn set_linearized_constraint_bounds(&mut self, problem: &dyn NonlinearProblem) {
        for j in 0..problem.number_constraints() {
            let bounds = problem.constraint_bounds(j);
            self.linearized_constraint_bounds[j] =
                Interval::new(bounds.lower - self.constraints[j], bounds.upper - self.constraints[j]);
        }
    }

    /// One-sided bounds for the restoration subproblem: violated
    /// constraints keep only their violated side, the rest are linearized
    /// as usual.
    pub fn set_feasibility_constraint_bounds(
        &mut self,
        problem: &dyn NonlinearProblem,
        partition: &ConstraintPartition,
    ) {
        for j in 0..problem.number_constraints() {
            let bounds = problem.constraint_bounds(j);
            self.linearized_constraint_bounds[j] = match partition.feasibility[j] {
                ConstraintFeasibility::InfeasibleLower => {
                    Interval::upper_bounded(bounds.lower - self.constraints[j])
                }
                ConstraintFeasibility::InfeasibleUpper => {
                    Interval::lower_bounded(bounds.upper - self.constraints[j])
                }
                ConstraintFeasibility::Feasible => Interval::new(
                    bounds.lower - self.constraints[j],
                    bounds.upper - self.constraints[j],
                ),
            };
        }
    }

    /// Objective of the l1 feasibility problem: the sum of the gradients of
    /// the infeasible constraints, signed by their violated side.
    pub fn set_feasibility_objective(&mut self, partition: &ConstraintPartition) {
        self.objective_gradient.clear();
        for &j in &partition.infeasible {
            let sign = match partition.feasibility[j] {
                ConstraintFeasibility::InfeasibleLower => -1.0,
                _ => 1.0,
            };
            for (i, derivative) in self.constraint_jacobian[j].iter() {
                self.objective_gradient.insert(i, sign * derivative);
            }
        }
    }
}

/// Classify constraints by their violated side at the current values.
pub fn partition_from_constraint_values(
    problem: &dyn NonlinearProblem,
    constraints: &[f64],
) -> ConstraintPartition {
    let mut partition = ConstraintPartition::new(problem.number_constraints());
    for j in 0..problem.number_constraints() {
        let bounds = problem.constraint_bounds(j);
        if constraints[j] < bounds.lower {
            partition.classify(j, ConstraintFeasibility::InfeasibleLower);
        } else if constraints[j] > bounds.upper {
            partition.classify(j, ConstraintFeasibility::InfeasibleUpper);
        } else {
            partition.classify(j, ConstraintFeasibility::Feasible);
        }
    }
    partition
}

/// Convert the solver's absolute duals into displacements.
pub fn compute_dual_displacements(
    problem: &dyn NonlinearProblem,
    iterate: &Iterate,
    direction: &mut Direction,
) {
    for j in 0..problem.number_constraints() {
        direction.multipliers.constraints[j] -= iterate.multipliers.constraints[j];
    }
    for i in 0..problem.number_variables() {
        direction.multipliers.lower_bounds[i] -= iterate.multipliers.lower_bounds[i];
        direction.multipliers.upper_bounds[i] -= iterate.multipliers.upper_bounds[i];
    }
}

/// Post-process an l1-QP active set: elastic variables are implementation
/// detail and never reported, and a constraint whose elastics are positive
/// is not active (its relaxation is).
pub fn recover_l1qp_active_set(problem: &L1RelaxedProblem, direction: &mut Direction) {
    let number_originals = problem.number_original_variables();
    direction
        .active_set
        .bounds
        .at_lower_bound
        .retain(|&i| i < number_originals);
    direction
        .active_set
        .bounds
        .at_upper_bound
        .retain(|&i| i < number_originals);

    let elastics = problem.elastic_variables();
    for j in 0..problem.number_constraints() {
        let mut relaxation = 0.0;
        if let Some(&index) = elastics.negative.get(&j) {
            relaxation += direction.primals[index];
        }
        if let Some(&index) = elastics.positive.get(&j) {
            relaxation += direction.primals[index];
        }
        if relaxation > 0.0 {
            direction.active_set.constraints.at_lower_bound.remove(&j);
            direction.active_set.constraints.at_upper_bound.remove(&j);
        }
    }
}

/// Tag a restoration direction: zero objective multiplier, partition
/// attached, phase recorded for logging.
pub fn tag_feasibility_direction(direction: &mut Direction, partition: &ConstraintPartition) {
    direction.phase = Phase::Restoration;
    direction.objective_multiplier = 0.0;
    direction.constraint_partition = Some(partition.clone());
}
