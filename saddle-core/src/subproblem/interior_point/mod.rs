//! Primal-dual interior-point subproblem.
//!
//! Operates on a barrier view of an equality-constrained problem
//! (inequalities must have been reformulated with slacks). Per solve: the
//! barrier parameter strategy runs, bounds too close to the iterate are
//! relaxed, barrier-overlaid functions are evaluated, the augmented system
//! is factorized with inertia correction, and the primal-dual direction is
//! truncated by the fraction-to-boundary rule.

pub mod augmented_system;
pub mod barrier_update;

pub use augmented_system::AugmentedSystem;
pub use barrier_update::MonotoneBarrierUpdate;

use crate::direction::{Direction, Phase, PredictedReduction, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};
use crate::model::Interval;
use crate::options::Options;
use crate::reformulation::{BarrierProblem, L1RelaxedProblem, NonlinearProblem};
use crate::solvers::WarmstartInformation;
use crate::subproblem::Subproblem;

struct BarrierParameters {
    tau_min: f64,
    k_sigma: f64,
    regularization_exponent: f64,
    small_direction_factor: f64,
    push_to_interior_k1: f64,
    push_to_interior_k2: f64,
    damping_factor: f64,
}

pub struct InteriorPointSubproblem {
    augmented_system: AugmentedSystem,
    barrier_update: MonotoneBarrierUpdate,
    parameters: BarrierParameters,
    default_multiplier: f64,
    least_square_multiplier_max_norm: f64,

    /// bounds the barrier is built on; relaxed outward when an iterate gets
    /// too close, extended/truncated on restoration entry/exit
    relaxed_bounds: Vec<Interval>,
    previous_barrier_parameter: f64,
    solving_feasibility_problem: bool,

    // per-solve evaluation buffers
    objective_gradient: SparseVector,
    barrier_gradient: SparseVector,
    constraints: Vec<f64>,
    constraint_jacobian: Vec<SparseVector>,
    hessian: SymmetricTriplets,
    lower_delta_z: Vec<f64>,
    upper_delta_z: Vec<f64>,

    hessian_evaluation_count: usize,
    number_subproblems_solved: usize,
}

impl InteriorPointSubproblem {
    pub fn new(
        max_number_variables: usize,
        max_number_constraints: usize,
        options: &Options,
    ) -> Self {
        Self {
            augmented_system: AugmentedSystem::new(max_number_variables + max_number_constraints),
            barrier_update: MonotoneBarrierUpdate::new(
                options.barrier_initial_parameter,
                options.barrier_kappa_mu,
                options.barrier_theta_mu,
                options.barrier_kappa_epsilon,
                options.tolerance,
            ),
            parameters: BarrierParameters {
                tau_min: options.barrier_tau_min,
                k_sigma: options.barrier_k_sigma,
                regularization_exponent: options.barrier_regularization_exponent,
                small_direction_factor: options.barrier_small_direction_factor,
                push_to_interior_k1: options.barrier_push_variable_to_interior_k1,
                push_to_interior_k2: options.barrier_push_variable_to_interior_k2,
                damping_factor: options.barrier_damping_factor,
            },
            default_multiplier: options.barrier_default_multiplier,
            least_square_multiplier_max_norm: options.least_square_multiplier_max_norm,
            relaxed_bounds: Vec::new(),
            previous_barrier_parameter: options.barrier_initial_parameter,
            solving_feasibility_problem: false,
            objective_gradient: SparseVector::with_capacity(max_number_variables),
            barrier_gradient: SparseVector::with_capacity(max_number_variables),
            constraints: vec![0.0; max_number_constraints],
            constraint_jacobian: vec![SparseVector::default(); max_number_constraints],
            hessian: SymmetricTriplets::new((max_number_variables, max_number_variables)),
            lower_delta_z: vec![0.0; max_number_variables],
            upper_delta_z: vec![0.0; max_number_variables],
            hessian_evaluation_count: 0,
            number_subproblems_solved: 0,
        }
    }

    pub fn barrier_parameter(&self) -> f64 {
        self.barrier_update.barrier_parameter()
    }

    /// Project a value into the interior of its bounds (IPOPT Section 3.6).
    fn push_to_interior(&self, value: f64, bounds: Interval) -> f64 {
        let k1 = self.parameters.push_to_interior_k1;
        let k2 = self.parameters.push_to_interior_k2;
        let range = bounds.upper - bounds.lower;
        let mut value = value;
        if bounds.has_finite_lower() {
            let perturbation = if bounds.has_finite_upper() {
                (k1 * 1.0_f64.max(bounds.lower.abs())).min(k2 * range)
            } else {
                k1 * 1.0_f64.max(bounds.lower.abs())
            };
            value = value.max(bounds.lower + perturbation);
        }
        if bounds.has_finite_upper() {
            let perturbation = if bounds.has_finite_lower() {
                (k1 * 1.0_f64.max(bounds.upper.abs())).min(k2 * range)
            } else {
                k1 * 1.0_f64.max(bounds.upper.abs())
            };
            value = value.min(bounds.upper - perturbation);
        }
        value
    }

    /// Relax a bound that the iterate is hugging (IPOPT Section 3.5).
    fn relax_variable_bounds(&mut self, problem: &dyn NonlinearProblem, iterate: &Iterate) {
        let machine_epsilon = f64::EPSILON;
        let relaxation_factor = machine_epsilon.powf(0.75);
        let mu = self.barrier_parameter();
        let sets = problem.bound_sets();
        for &i in &sets.lower_bounded {
            let bound = &mut self.relaxed_bounds[i];
            if iterate.primals[i] - bound.lower < machine_epsilon * mu {
                bound.lower -= relaxation_factor * 1.0_f64.max(bound.lower.abs());
            }
        }
        for &i in &sets.upper_bounded {
            let bound = &mut self.relaxed_bounds[i];
            if bound.upper - iterate.primals[i] < machine_epsilon * mu {
                bound.upper += relaxation_factor * 1.0_f64.max(bound.upper.abs());
            }
        }
    }

    /// Primal-dual error of the barrier problem at the current iterate, as
    /// a function of a candidate μ (only complementarity depends on it).
    fn barrier_kkt_error(
        &self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        mu: f64,
    ) -> f64 {
        let n = problem.number_variables();
        let mut stationarity = self.objective_gradient.to_dense(n);
        for j in 0..problem.number_constraints() {
            let multiplier = iterate.multipliers.constraints[j];
            if multiplier != 0.0 {
                self.constraint_jacobian[j].add_to_dense(-multiplier, &mut stationarity);
            }
        }
        for i in 0..n {
            stationarity[i] -=
                iterate.multipliers.lower_bounds[i] + iterate.multipliers.upper_bounds[i];
        }

        let mut error = crate::linalg::inf_norm(&stationarity);
        error = error.max(crate::linalg::inf_norm(
            &self.constraints[..problem.number_constraints()],
        ));

        let sets = problem.bound_sets();
        for &i in &sets.lower_bounded {
            let product = (iterate.primals[i] - self.relaxed_bounds[i].lower)
                * iterate.multipliers.lower_bounds[i];
            error = error.max((product - mu).abs());
        }
        for &i in &sets.upper_bounded {
            let product = (iterate.primals[i] - self.relaxed_bounds[i].upper)
                * iterate.multipliers.upper_bounds[i];
            error = error.max((product - mu).abs());
        }
        error
    }

    fn evaluate_problem_functions(&mut self, problem: &dyn NonlinearProblem, iterate: &mut Iterate) {
        let m = problem.number_constraints();
        problem.evaluate_objective_gradient(iterate, &mut self.objective_gradient);
        problem.evaluate_constraints(iterate, &mut self.constraints[..m]);
        problem.evaluate_constraint_jacobian(iterate, &mut self.constraint_jacobian[..m]);
    }

    fn primal_fraction_to_boundary(
        &self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        tau: f64,
    ) -> f64 {
        let sets = problem.bound_sets();
        let mut primal_length = 1.0_f64;
        for &i in &sets.lower_bounded {
            let step = self.augmented_system.solution[i];
            if step < 0.0 {
                let trial = -tau * (iterate.primals[i] - self.relaxed_bounds[i].lower) / step;
                if trial > 0.0 {
                    primal_length = primal_length.min(trial);
                }
            }
        }
        for &i in &sets.upper_bounded {
            let step = self.augmented_system.solution[i];
            if step > 0.0 {
                let trial = -tau * (iterate.primals[i] - self.relaxed_bounds[i].upper) / step;
                if trial > 0.0 {
                    primal_length = primal_length.min(trial);
                }
            }
        }
        primal_length
    }

    fn dual_fraction_to_boundary(
        &self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        tau: f64,
    ) -> f64 {
        let sets = problem.bound_sets();
        let mut dual_length = 1.0_f64;
        for &i in &sets.lower_bounded {
            if self.lower_delta_z[i] < 0.0 {
                let trial = -tau * iterate.multipliers.lower_bounds[i] / self.lower_delta_z[i];
                if trial > 0.0 {
                    dual_length = dual_length.min(trial);
                }
            }
        }
        for &i in &sets.upper_bounded {
            if self.upper_delta_z[i] > 0.0 {
                let trial = -tau * iterate.multipliers.upper_bounds[i] / self.upper_delta_z[i];
                if trial > 0.0 {
                    dual_length = dual_length.min(trial);
                }
            }
        }
        dual_length
    }

    /// Δz in closed form from the primal displacement.
    fn compute_bound_dual_direction(&mut self, problem: &dyn NonlinearProblem, iterate: &Iterate) {
        let mu = self.barrier_parameter();
        let sets = problem.bound_sets();
        self.lower_delta_z[..problem.number_variables()].fill(0.0);
        self.upper_delta_z[..problem.number_variables()].fill(0.0);
        for &i in &sets.lower_bounded {
            let distance = iterate.primals[i] - self.relaxed_bounds[i].lower;
            let multiplier = iterate.multipliers.lower_bounds[i];
            self.lower_delta_z[i] =
                (mu - self.augmented_system.solution[i] * multiplier) / distance - multiplier;
        }
        for &i in &sets.upper_bounded {
            let distance = iterate.primals[i] - self.relaxed_bounds[i].upper;
            let multiplier = iterate.multipliers.upper_bounds[i];
            self.upper_delta_z[i] =
                (mu - self.augmented_system.solution[i] * multiplier) / distance - multiplier;
        }
    }

    fn generate_primal_dual_direction(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
    ) -> Direction {
        let n = problem.number_variables();
        let m = problem.number_constraints();
        let mut direction = Direction::new(n, m);

        // the solver returns (Δx, −Δλ): flip the constraint block
        for j in 0..m {
            self.augmented_system.solution[n + j] = -self.augmented_system.solution[n + j];
        }

        let mu = self.barrier_parameter();
        let tau = self.parameters.tau_min.max(1.0 - mu);
        let primal_dual_step_length = self.primal_fraction_to_boundary(problem, iterate, tau);

        direction.primals.copy_from_slice(&self.augmented_system.solution[..n]);
        direction.multipliers.constraints
            .copy_from_slice(&self.augmented_system.solution[n..n + m]);

        self.compute_bound_dual_direction(problem, iterate);
        let bound_dual_step_length = self.dual_fraction_to_boundary(problem, iterate, tau);
        direction.multipliers.lower_bounds[..n].copy_from_slice(&self.lower_delta_z[..n]);
        direction.multipliers.upper_bounds[..n].copy_from_slice(&self.upper_delta_z[..n]);

        direction.primal_dual_step_length = primal_dual_step_length;
        direction.bound_dual_step_length = bound_dual_step_length;
        direction.objective_multiplier = problem.objective_multiplier();
        direction.phase = if self.solving_feasibility_problem {
            Phase::Restoration
        } else {
            Phase::Optimality
        };

        // optimal value of the quadratic local model of the barrier problem
        let linear_term = self.barrier_gradient.dot(&direction.primals);
        let quadratic_term =
            crate::linalg::sparse::quadratic_product(&self.hessian, &direction.primals);
        direction.subproblem_objective = linear_term + 0.5 * quadratic_term;

        // the globalization works on the problem objective; barrier terms go
        // through the auxiliary measure
        let slope = self.objective_gradient.dot(&direction.primals);
        direction.predicted_reduction = PredictedReduction::Linear { slope };

        // small-direction detection (IPOPT Section 3.9)
        let mut scaled_norm = 0.0_f64;
        for i in 0..n {
            scaled_norm =
                scaled_norm.max(direction.primals[i].abs() / (1.0 + iterate.primals[i].abs()));
        }
        direction.small_step =
            scaled_norm < self.parameters.small_direction_factor * f64::EPSILON;

        direction
    }

    /// Least-squares estimate of the constraint multipliers from the
    /// stationarity system [I ∇cᵀ; ∇c 0].
    fn compute_least_square_multipliers(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    ) {
        let n = problem.number_variables();
        let m = problem.number_constraints();
        if m == 0 {
            return;
        }
        self.evaluate_problem_functions(problem, iterate);

        let mut identity = SymmetricTriplets::new((n, n));
        for i in 0..n {
            identity.add_triplet(i, i, 1.0);
        }
        let mut system = AugmentedSystem::new(n + m);
        if system
            .assemble_and_factorize(&identity, &self.constraint_jacobian[..m], n, m, 1e-12)
            .is_err()
        {
            return;
        }

        system.rhs[..n + m].fill(0.0);
        for (i, derivative) in self.objective_gradient.iter() {
            system.rhs[i] += derivative;
        }
        for i in 0..n {
            system.rhs[i] -=
                iterate.multipliers.lower_bounds[i] + iterate.multipliers.upper_bounds[i];
        }
        system.solve();

        let multipliers = &system.solution[n..n + m];
        let norm = crate::linalg::inf_norm(multipliers);
        if norm.is_finite() && norm <= self.least_square_multiplier_max_norm {
            iterate.multipliers.constraints[..m].copy_from_slice(multipliers);
        } else {
            iterate.multipliers.constraints[..m].fill(0.0);
        }
    }

    fn barrier_view<'p>(&self, problem: &'p dyn NonlinearProblem) -> BarrierProblem<'p> {
        BarrierProblem::new(
            problem,
            self.relaxed_bounds[..problem.number_variables()].to_vec(),
            self.barrier_parameter(),
            self.parameters.damping_factor,
        )
    }
}

impl Subproblem for InteriorPointSubproblem {
    fn initialize(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    ) -> Result<(), SolverError> {
        assert!(
            problem.bound_sets().inequality_constraints.is_empty(),
            "the barrier subproblem requires an equality-constrained reformulation"
        );

        let n = problem.number_variables();
        self.relaxed_bounds = (0..n).map(|i| problem.variable_bounds(i)).collect();

        // strictly interior start
        for i in 0..n {
            let pushed = self.push_to_interior(iterate.primals[i], self.relaxed_bounds[i]);
            if pushed != iterate.primals[i] {
                iterate.set_primal(i, pushed);
            }
        }

        // default bound multipliers
        for &i in &problem.bound_sets().lower_bounded {
            iterate.multipliers.lower_bounds[i] = self.default_multiplier;
        }
        for &i in &problem.bound_sets().upper_bounded {
            iterate.multipliers.upper_bounds[i] = -self.default_multiplier;
        }

        if problem.number_constraints() > 0 {
            self.compute_least_square_multipliers(problem, iterate);
        }
        Ok(())
    }

    fn solve(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        _trust_region_radius: Option<f64>,
        _warmstart: &WarmstartInformation,
    ) -> Direction {
        let n = problem.number_variables();
        let m = problem.number_constraints();

        // decide whether μ decreases this iteration
        self.evaluate_problem_functions(problem, iterate);
        let mut update = self.barrier_update.clone();
        update.update(&|mu: f64| self.barrier_kkt_error(problem, iterate, mu));
        self.barrier_update = update;

        self.relax_variable_bounds(problem, iterate);

        // barrier-overlaid evaluations
        let barrier = self.barrier_view(problem);
        barrier.evaluate_objective_gradient(iterate, &mut self.barrier_gradient);
        barrier.evaluate_constraints(iterate, &mut self.constraints[..m]);
        barrier.evaluate_constraint_jacobian(iterate, &mut self.constraint_jacobian[..m]);
        barrier.evaluate_lagrangian_hessian(iterate, &mut self.hessian);
        self.hessian_evaluation_count += 1;

        let dual_regularization =
            1e-8 * self.barrier_parameter().powf(self.parameters.regularization_exponent);
        if self
            .augmented_system
            .assemble_and_factorize(
                &self.hessian,
                &self.constraint_jacobian[..m],
                n,
                m,
                dual_regularization,
            )
            .is_err()
        {
            let mut direction = Direction::new(n, m);
            direction.status = SubproblemStatus::Error;
            return direction;
        }

        self.augmented_system.generate_rhs(
            &self.barrier_gradient,
            &self.constraint_jacobian[..m],
            &self.constraints[..m],
            &iterate.multipliers.constraints,
            n,
            m,
        );
        self.augmented_system.solve();
        self.number_subproblems_solved += 1;

        self.generate_primal_dual_direction(problem, iterate)
    }

    fn solve_feasibility(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
        _phase2_direction: &Direction,
        trust_region_radius: Option<f64>,
    ) -> Direction {
        // the feasibility problem is just another barrier problem
        self.solve(problem, iterate, trust_region_radius, &WarmstartInformation::whole_problem_changed())
    }

    fn set_initial_point(&mut self, _point: &[f64]) {
        // the interior point starts from the current iterate
    }

    fn initialize_feasibility_problem(
        &mut self,
        problem: &L1RelaxedProblem,
        _iterate: &mut Iterate,
    ) {
        self.solving_feasibility_problem = true;
        self.previous_barrier_parameter = self.barrier_parameter();
        let infeasibility_norm = crate::linalg::inf_norm(
            &self.constraints[..problem.number_constraints()],
        );
        self.barrier_update
            .set_barrier_parameter(self.barrier_parameter().max(infeasibility_norm));

        // cover the elastic variables with bounds
        let n = problem.number_variables();
        while self.relaxed_bounds.len() < n {
            self.relaxed_bounds.push(Interval::lower_bounded(0.0));
        }
    }

    fn set_elastic_variable_values(&self, problem: &L1RelaxedProblem, iterate: &mut Iterate) {
        // closed form: p, n = (μ/ρ − κ·c_j + sqrt(c_j² + (μ/ρ)²)) / 2 with
        // the elastic's Jacobian coefficient κ, and dual z = μ/value
        let mu = self.barrier_parameter();
        let mu_over_rho = mu / problem.penalty_parameter();
        let constraints: Vec<f64> = self.constraints[..problem.number_constraints()].to_vec();
        problem.set_elastic_variable_values(
            iterate,
            |iterate, constraint_index, elastic_index, coefficient| {
                let constraint = constraints[constraint_index];
                let radical = (constraint * constraint + mu_over_rho * mu_over_rho).sqrt();
                let value = 0.5 * (mu_over_rho - coefficient * constraint + radical);
                iterate.set_primal(elastic_index, value);
                iterate.multipliers.lower_bounds[elastic_index] = mu / value;
                iterate.multipliers.upper_bounds[elastic_index] = 0.0;
            },
        );
    }

    fn exit_feasibility_problem(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    ) {
        assert!(
            self.solving_feasibility_problem,
            "the barrier subproblem was not solving the feasibility problem"
        );
        self.barrier_update.set_barrier_parameter(self.previous_barrier_parameter);
        self.solving_feasibility_problem = false;
        self.relaxed_bounds.truncate(problem.number_variables());
        self.compute_least_square_multipliers(problem, iterate);
    }

    fn set_auxiliary_measure(&self, problem: &dyn NonlinearProblem, iterate: &mut Iterate) {
        let barrier = self.barrier_view(problem);
        let terms = barrier.barrier_terms(&iterate.primals[..problem.number_variables()]);
        iterate.progress.auxiliary = terms;
    }

    fn predicted_auxiliary_reduction(
        &self,
        problem: &dyn NonlinearProblem,
        iterate: &Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> f64 {
        let barrier = self.barrier_view(problem);
        let derivative = barrier.barrier_directional_derivative(
            &iterate.primals[..problem.number_variables()],
            &direction.primals,
        );
        step_length * (-derivative)
    }

    fn second_order_correction(
        &mut self,
        problem: &dyn NonlinearProblem,
        trial_iterate: &mut Iterate,
        _direction: &Direction,
        step_length: f64,
    ) -> Option<Direction> {
        let n = problem.number_variables();
        let m = problem.number_constraints();
        if m == 0 {
            return None;
        }

        // scale the retained constraint block and shift it by the trial
        // constraint values
        for j in 0..m {
            self.augmented_system.rhs[n + j] *= step_length;
        }
        let barrier = self.barrier_view(problem);
        barrier.evaluate_constraints(trial_iterate, &mut self.constraints[..m]);
        for j in 0..m {
            self.augmented_system.rhs[n + j] -= self.constraints[j];
        }
        self.augmented_system.solve();
        self.number_subproblems_solved += 1;
        Some(self.generate_primal_dual_direction(problem, trial_iterate))
    }

    fn postprocess_accepted_iterate(
        &mut self,
        problem: &dyn NonlinearProblem,
        iterate: &mut Iterate,
    ) {
        // rescale the bound multipliers (Eq. 16 in the IPOPT paper)
        let mu = self.barrier_parameter();
        let k_sigma = self.parameters.k_sigma;
        let sets = problem.bound_sets();
        for &i in &sets.lower_bounded {
            let coefficient = mu / (iterate.primals[i] - self.relaxed_bounds[i].lower);
            let lower = coefficient / k_sigma;
            let upper = coefficient * k_sigma;
            if lower <= upper {
                iterate.multipliers.lower_bounds[i] =
                    iterate.multipliers.lower_bounds[i].clamp(lower, upper);
            }
        }
        for &i in &sets.upper_bounded {
            let coefficient = mu / (iterate.primals[i] - self.relaxed_bounds[i].upper);
            let lower = coefficient * k_sigma;
            let upper = coefficient / k_sigma;
            if lower <= upper {
                iterate.multipliers.upper_bounds[i] =
                    iterate.multipliers.upper_bounds[i].clamp(lower, upper);
            }
        }
    }

    fn hessian_evaluation_count(&self) -> usize {
        self.hessian_evaluation_count
    }

    fn barrier_parameter(&self) -> Option<f64> {
        Some(self.barrier_update.barrier_parameter())
    }

    fn uses_trust_region(&self) -> bool {
        false
    }
}
