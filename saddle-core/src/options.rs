//! Solver options.
//!
//! One plain struct covering every recognized key; strategy selections are
//! strings resolved (and validated) once at driver construction.

use crate::error::SolverError;

/// Subproblem family, resolved from `Options::subproblem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemKind {
    /// SQP: quadratic local model, active-set QP solver
    Qp,
    /// SLP: linear local model, active-set LP solver
    Lp,
    /// barrier subproblem with an augmented-system solve
    PrimalDualInteriorPoint,
}

/// Globalization strategy, resolved from `Options::globalization_strategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalizationKind {
    Merit,
    Filter,
    Funnel,
}

/// Constraint-relaxation driver, resolved from
/// `Options::constraint_relaxation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationKind {
    FeasibilityRestoration,
    L1Relaxation,
}

/// Validated strategy combination.
#[derive(Debug, Clone, Copy)]
pub struct StrategyCombination {
    pub subproblem: SubproblemKind,
    pub globalization: GlobalizationKind,
    pub relaxation: RelaxationKind,
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// "QP", "LP" or "primal_dual_interior_point"
    pub subproblem: String,
    /// "merit", "filter" or "funnel"
    pub globalization_strategy: String,
    /// "feasibility_restoration" or "l1_relaxation"
    pub constraint_relaxation: String,

    /// LP solver backend ("box_qp" is the built-in)
    pub lp_solver: String,
    /// QP solver backend ("box_qp" is the built-in)
    pub qp_solver: String,
    /// symmetric indefinite linear solver ("ldl" is the built-in)
    pub linear_solver: String,

    /// stopping tolerance ε for stationarity/feasibility/complementarity
    pub tolerance: f64,
    /// maximum number of outer iterations
    pub max_iterations: usize,
    /// wall-clock limit in seconds (infinity for none)
    pub time_limit: f64,
    /// print a statistics row per outer iteration
    pub verbose: bool,

    // barrier (interior-point) parameters
    pub barrier_initial_parameter: f64,
    pub barrier_tau_min: f64,
    pub barrier_k_sigma: f64,
    pub barrier_regularization_exponent: f64,
    pub barrier_small_direction_factor: f64,
    pub barrier_push_variable_to_interior_k1: f64,
    pub barrier_push_variable_to_interior_k2: f64,
    pub barrier_damping_factor: f64,
    pub barrier_default_multiplier: f64,
    /// linear decrease factor κ_μ of the monotone update
    pub barrier_kappa_mu: f64,
    /// superlinear decrease exponent θ_μ of the monotone update
    pub barrier_theta_mu: f64,
    /// barrier subproblem is converged when its error drops below κ_ε·μ
    pub barrier_kappa_epsilon: f64,

    // globalization parameters
    pub armijo_decrease_fraction: f64,
    pub armijo_tolerance: f64,
    pub protect_actual_reduction_against_roundoff: bool,
    pub filter_capacity: usize,
    /// infeasibility must shrink by this fraction for filter acceptability
    pub filter_beta: f64,
    /// objective slope fraction in the filter envelope
    pub filter_gamma: f64,
    pub filter_switching_fraction: f64,
    pub funnel_initial_factor: f64,
    pub funnel_kappa: f64,

    // l1 relaxation parameters
    pub sl1qp_initial_parameter: f64,
    pub l1_penalty_update_factor: f64,
    pub l1_feasible_streak: usize,

    // mechanism parameters
    pub trust_region_initial_radius: f64,
    pub trust_region_min_radius: f64,
    pub trust_region_max_radius: f64,
    pub line_search_backtrack_factor: f64,
    pub line_search_min_step: f64,

    pub least_square_multiplier_max_norm: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            subproblem: "QP".to_string(),
            globalization_strategy: "filter".to_string(),
            constraint_relaxation: "feasibility_restoration".to_string(),
            lp_solver: "box_qp".to_string(),
            qp_solver: "box_qp".to_string(),
            linear_solver: "ldl".to_string(),

            tolerance: 1e-6,
            max_iterations: 500,
            time_limit: f64::INFINITY,
            verbose: false,

            barrier_initial_parameter: 0.1,
            barrier_tau_min: 0.99,
            barrier_k_sigma: 1e10,
            barrier_regularization_exponent: 0.25,
            barrier_small_direction_factor: 100.0,
            barrier_push_variable_to_interior_k1: 1e-2,
            barrier_push_variable_to_interior_k2: 1e-2,
            barrier_damping_factor: 1e-5,
            barrier_default_multiplier: 1.0,
            barrier_kappa_mu: 0.2,
            barrier_theta_mu: 1.5,
            barrier_kappa_epsilon: 10.0,

            armijo_decrease_fraction: 1e-4,
            armijo_tolerance: 1e-9,
            protect_actual_reduction_against_roundoff: true,
            filter_capacity: 50,
            filter_beta: 0.999,
            filter_gamma: 0.001,
            filter_switching_fraction: 1e-4,
            funnel_initial_factor: 1e3,
            funnel_kappa: 0.5,

            sl1qp_initial_parameter: 1.0,
            l1_penalty_update_factor: 10.0,
            l1_feasible_streak: 5,

            trust_region_initial_radius: 10.0,
            trust_region_min_radius: 1e-16,
            trust_region_max_radius: 1e12,
            line_search_backtrack_factor: 0.5,
            line_search_min_step: 1e-12,

            least_square_multiplier_max_norm: 1e3,
        }
    }
}

impl Options {
    /// Resolve and validate the strategy strings.
    ///
    /// Unknown names and incompatible combinations are configuration errors
    /// surfaced before any evaluation happens.
    pub fn resolve_strategies(&self) -> Result<StrategyCombination, SolverError> {
        let subproblem = match self.subproblem.as_str() {
            "QP" => SubproblemKind::Qp,
            "LP" => SubproblemKind::Lp,
            "primal_dual_interior_point" => SubproblemKind::PrimalDualInteriorPoint,
            other => {
                return Err(SolverError::Configuration(format!(
                    "unknown subproblem strategy \"{other}\""
                )))
            }
        };
        let globalization = match self.globalization_strategy.as_str() {
            "merit" => GlobalizationKind::Merit,
            "filter" => GlobalizationKind::Filter,
            "funnel" => GlobalizationKind::Funnel,
            other => {
                return Err(SolverError::Configuration(format!(
                    "unknown globalization strategy \"{other}\""
                )))
            }
        };
        let relaxation = match self.constraint_relaxation.as_str() {
            "feasibility_restoration" => RelaxationKind::FeasibilityRestoration,
            "l1_relaxation" => RelaxationKind::L1Relaxation,
            other => {
                return Err(SolverError::Configuration(format!(
                    "unknown constraint relaxation strategy \"{other}\""
                )))
            }
        };

        // the l1 driver manages the penalty of an active-set local model;
        // the interior-point subproblem carries its own elastic machinery
        if subproblem == SubproblemKind::PrimalDualInteriorPoint
            && relaxation == RelaxationKind::L1Relaxation
        {
            return Err(SolverError::Configuration(
                "l1_relaxation requires an active-set subproblem (QP or LP)".to_string(),
            ));
        }

        for (name, key) in [
            (&self.qp_solver, "QP_solver"),
            (&self.lp_solver, "LP_solver"),
        ] {
            if name != "box_qp" {
                return Err(SolverError::Configuration(format!(
                    "unknown {key} backend \"{name}\""
                )));
            }
        }
        if self.linear_solver != "ldl" {
            return Err(SolverError::Configuration(format!(
                "unknown linear_solver backend \"{}\"",
                self.linear_solver
            )));
        }

        Ok(StrategyCombination { subproblem, globalization, relaxation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_combination_resolves() {
        let options = Options::default();
        let combination = options.resolve_strategies().unwrap();
        assert_eq!(combination.subproblem, SubproblemKind::Qp);
        assert_eq!(combination.globalization, GlobalizationKind::Filter);
        assert_eq!(combination.relaxation, RelaxationKind::FeasibilityRestoration);
    }

    #[test]
    fn unknown_strategy_is_a_configuration_error() {
        let options = Options { subproblem: "SLPEQP".to_string(), ..Options::default() };
        assert!(options.resolve_strategies().is_err());
    }

    #[test]
    fn interior_point_rejects_l1_relaxation() {
        let options = Options {
            subproblem: "primal_dual_interior_point".to_string(),
            constraint_relaxation: "l1_relaxation".to_string(),
            ..Options::default()
        };
        assert!(options.resolve_strategies().is_err());
    }
}
