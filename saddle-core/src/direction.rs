//! Result of a subproblem solve.

use std::collections::BTreeSet;

use crate::iterate::Multipliers;

/// Which outer phase produced a direction. Observable tag for logging; the
/// constraint-relaxation driver owns the actual phase state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Optimality,
    Restoration,
}

/// Outcome of a subproblem solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemStatus {
    Optimal,
    Unbounded,
    Infeasible,
    Error,
}

/// Indices held at their lower/upper limits by the subproblem solution.
#[derive(Debug, Clone, Default)]
pub struct ActiveConstraints {
    pub at_lower_bound: BTreeSet<usize>,
    pub at_upper_bound: BTreeSet<usize>,
}

impl ActiveConstraints {
    pub fn clear(&mut self) {
        self.at_lower_bound.clear();
        self.at_upper_bound.clear();
    }
}

/// Active-set record, split between variable bounds and general constraints.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    pub bounds: ActiveConstraints,
    pub constraints: ActiveConstraints,
}

impl ActiveSet {
    pub fn clear(&mut self) {
        self.bounds.clear();
        self.constraints.clear();
    }
}

/// Feasibility classification of one constraint in a local model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintFeasibility {
    Feasible,
    InfeasibleLower,
    InfeasibleUpper,
}

/// Assignment of every constraint to feasible/violated-side classes, used to
/// build the restoration subproblem.
#[derive(Debug, Clone)]
pub struct ConstraintPartition {
    pub feasible: Vec<usize>,
    pub infeasible: Vec<usize>,
    pub feasibility: Vec<ConstraintFeasibility>,
}

impl ConstraintPartition {
    pub fn new(number_constraints: usize) -> Self {
        Self {
            feasible: Vec::with_capacity(number_constraints),
            infeasible: Vec::new(),
            feasibility: vec![ConstraintFeasibility::Feasible; number_constraints],
        }
    }

    pub fn classify(&mut self, constraint_index: usize, feasibility: ConstraintFeasibility) {
        self.feasibility[constraint_index] = feasibility;
        match feasibility {
            ConstraintFeasibility::Feasible => self.feasible.push(constraint_index),
            _ => self.infeasible.push(constraint_index),
        }
    }
}

/// Predicted reduction as a function of the step length, stored as an
/// algebraic record so trial step lengths can be evaluated without
/// re-solving the subproblem.
#[derive(Debug, Clone, Copy)]
pub enum PredictedReduction {
    /// -α·slope (LP models)
    Linear { slope: f64 },
    /// -α·slope - α²/2·curvature (QP models)
    Quadratic { slope: f64, curvature: f64 },
}

impl PredictedReduction {
    pub fn evaluate(&self, step_length: f64) -> f64 {
        match *self {
            PredictedReduction::Linear { slope } => -step_length * slope,
            PredictedReduction::Quadratic { slope, curvature } => {
                -step_length * slope - 0.5 * step_length * step_length * curvature
            }
        }
    }
}

/// Primal-dual direction produced by a subproblem.
///
/// Multipliers are *displacements* (Δλ = λ_new − λ_current); active-set
/// solvers convert their absolute duals before returning.
#[derive(Debug, Clone)]
pub struct Direction {
    pub primals: Vec<f64>,
    pub multipliers: Multipliers,

    pub phase: Phase,
    pub status: SubproblemStatus,

    /// objective multiplier σ the direction was computed for
    pub objective_multiplier: f64,
    /// fraction-to-boundary step length for primals and constraint
    /// multipliers (1 for active-set directions)
    pub primal_dual_step_length: f64,
    /// fraction-to-boundary step length for bound multipliers
    pub bound_dual_step_length: f64,

    /// optimal value of the local model
    pub subproblem_objective: f64,
    pub predicted_reduction: PredictedReduction,

    pub active_set: ActiveSet,
    pub constraint_partition: Option<ConstraintPartition>,

    /// set when the scaled direction norm is at machine precision
    pub small_step: bool,
}

impl Direction {
    pub fn new(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            primals: vec![0.0; number_variables],
            multipliers: Multipliers::new(number_variables, number_constraints),
            phase: Phase::Optimality,
            status: SubproblemStatus::Optimal,
            objective_multiplier: 1.0,
            primal_dual_step_length: 1.0,
            bound_dual_step_length: 1.0,
            subproblem_objective: 0.0,
            predicted_reduction: PredictedReduction::Linear { slope: 0.0 },
            active_set: ActiveSet::default(),
            constraint_partition: None,
            small_step: false,
        }
    }

    /// Infinity norm of the primal displacement.
    pub fn norm_inf(&self) -> f64 {
        crate::linalg::inf_norm(&self.primals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicted_reduction_evaluation() {
        let linear = PredictedReduction::Linear { slope: -2.0 };
        assert_eq!(linear.evaluate(0.5), 1.0);

        // slope -2, curvature 4: r(α) = 2α - 2α²
        let quadratic = PredictedReduction::Quadratic { slope: -2.0, curvature: 4.0 };
        assert_eq!(quadratic.evaluate(1.0), 0.0);
        assert_eq!(quadratic.evaluate(0.5), 0.5);
    }

    #[test]
    fn partition_classification() {
        let mut partition = ConstraintPartition::new(3);
        partition.classify(0, ConstraintFeasibility::Feasible);
        partition.classify(1, ConstraintFeasibility::InfeasibleLower);
        partition.classify(2, ConstraintFeasibility::InfeasibleUpper);
        assert_eq!(partition.feasible, vec![0]);
        assert_eq!(partition.infeasible, vec![1, 2]);
    }
}
