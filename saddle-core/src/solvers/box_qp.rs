//! Built-in dense QP/LP backend.
//!
//! Solves the boxed subproblems of the active-set family with a primal-dual
//! barrier method on the slacked-equality form: every range row
//! `cl <= a^T d <= cu` gets a slack with box `[cl, cu]`, equality rows stay
//! equalities, and the bound structure carries the whole inequality
//! handling. Infeasibility of the local model is certified by an elastic
//! phase-1 solve (minimize the l1 violation); its optimal elastics also
//! yield the constraint partition the restoration subproblem needs.
//!
//! Dense factorizations keep this backend simple and dependable for the
//! subproblem sizes the outer solver produces; large-scale deployments plug
//! in an external solver behind the same trait.

use nalgebra::{DMatrix, DVector};

use crate::direction::{
    ConstraintFeasibility, ConstraintPartition, Direction, SubproblemStatus,
};
use crate::linalg::sparse::{quadratic_product, SparseVector, SymmetricTriplets};
use crate::model::Interval;
use crate::solvers::{QpSolver, WarmstartInformation};

pub struct BoxQpSolver {
    max_iterations: usize,
    tolerance: f64,
    feasibility_tolerance: f64,
    active_tolerance: f64,
    /// primal solution of the previous solve, reused as a starting point
    warm_start_point: Vec<f64>,
}

impl Default for BoxQpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxQpSolver {
    pub fn new() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            active_tolerance: 1e-6,
            warm_start_point: Vec::new(),
        }
    }

    fn solve_boxed(
        &mut self,
        variable_bounds: &[Interval],
        constraint_bounds: &[Interval],
        gradient: &SparseVector,
        hessian: Option<&SymmetricTriplets>,
        jacobian: &[SparseVector],
        initial_point: &[f64],
        warmstart: &WarmstartInformation,
    ) -> Direction {
        let n = variable_bounds.len();
        let m = constraint_bounds.len();
        let mut direction = Direction::new(n, m);

        let gradient_dense = gradient.to_dense(n);
        let start = if warmstart.variable_bounds_changed || self.warm_start_point.len() != n {
            initial_point.to_vec()
        } else {
            self.warm_start_point.clone()
        };

        // phase 1: certify feasibility of the linearized constraints
        let mut phase2_start = start.clone();
        if m > 0 {
            let phase1 = build_phase1(variable_bounds, constraint_bounds, jacobian);
            let solution = solve_interior(&phase1, &phase1.spread_start(&start), self.max_iterations, self.tolerance);
            if solution.diverged || !solution.converged {
                direction.status = SubproblemStatus::Error;
                return direction;
            }
            let violation: f64 = solution.primals[phase1.elastic_offset..].iter().sum();
            let bound_scale = constraint_bounds
                .iter()
                .flat_map(|b| [b.lower, b.upper])
                .filter(|v| v.is_finite())
                .fold(1.0_f64, |acc, v| acc.max(v.abs()));
            if violation > self.feasibility_tolerance * bound_scale {
                direction.status = SubproblemStatus::Infeasible;
                direction.primals.copy_from_slice(&solution.primals[..n]);
                direction.constraint_partition = Some(classify_violations(
                    &phase1,
                    &solution.primals,
                    self.feasibility_tolerance * bound_scale,
                ));
                return direction;
            }
            phase2_start.copy_from_slice(&solution.primals[..n]);
        }

        // phase 2: the actual subproblem
        let phase2 = build_phase2(variable_bounds, constraint_bounds, hessian, &gradient_dense, jacobian);
        let solution = solve_interior(&phase2, &phase2.spread_start(&phase2_start), self.max_iterations, self.tolerance);
        if solution.diverged {
            direction.status = SubproblemStatus::Unbounded;
            return direction;
        }
        if !solution.converged {
            direction.status = SubproblemStatus::Error;
            return direction;
        }

        direction.status = SubproblemStatus::Optimal;
        direction.primals.copy_from_slice(&solution.primals[..n]);
        self.warm_start_point = direction.primals.clone();

        // duals: row multipliers are the equality duals; for a slacked row
        // the stationarity in the slack gives λ_j = z_l(s_j) + z_u(s_j) = y_j
        for j in 0..m {
            direction.multipliers.constraints[j] = solution.duals[phase2.row_of_constraint[j]];
        }
        direction.multipliers.lower_bounds[..n].copy_from_slice(&solution.lower_duals[..n]);
        direction.multipliers.upper_bounds[..n].copy_from_slice(&solution.upper_duals[..n]);

        // active-set records
        for i in 0..n {
            let bounds = variable_bounds[i];
            let value = solution.primals[i];
            let scale = 1.0_f64.max(value.abs());
            if bounds.has_finite_lower() && value - bounds.lower <= self.active_tolerance * scale {
                direction.active_set.bounds.at_lower_bound.insert(i);
            } else if bounds.has_finite_upper()
                && bounds.upper - value <= self.active_tolerance * scale
            {
                direction.active_set.bounds.at_upper_bound.insert(i);
            }
        }
        for j in 0..m {
            let bounds = constraint_bounds[j];
            if bounds.is_equality() {
                direction.active_set.constraints.at_lower_bound.insert(j);
                continue;
            }
            let slack = solution.primals[phase2.slack_of_constraint[j].unwrap()];
            let scale = 1.0_f64.max(slack.abs());
            if bounds.has_finite_lower() && slack - bounds.lower <= self.active_tolerance * scale {
                direction.active_set.constraints.at_lower_bound.insert(j);
            } else if bounds.has_finite_upper()
                && bounds.upper - slack <= self.active_tolerance * scale
            {
                direction.active_set.constraints.at_upper_bound.insert(j);
            }
        }

        // optimal value of the local model (slacks and elastics carry no cost)
        let mut objective = crate::linalg::dot(&gradient_dense, &direction.primals);
        if let Some(hessian) = hessian {
            objective += 0.5 * quadratic_product(hessian, &direction.primals);
        }
        direction.subproblem_objective = objective;

        direction
    }
}

impl QpSolver for BoxQpSolver {
    fn solve_qp(
        &mut self,
        variable_bounds: &[Interval],
        constraint_bounds: &[Interval],
        gradient: &SparseVector,
        hessian: &SymmetricTriplets,
        jacobian: &[SparseVector],
        initial_point: &[f64],
        warmstart: &WarmstartInformation,
    ) -> Direction {
        self.solve_boxed(
            variable_bounds,
            constraint_bounds,
            gradient,
            Some(hessian),
            jacobian,
            initial_point,
            warmstart,
        )
    }

    fn solve_lp(
        &mut self,
        variable_bounds: &[Interval],
        constraint_bounds: &[Interval],
        gradient: &SparseVector,
        jacobian: &[SparseVector],
        initial_point: &[f64],
        warmstart: &WarmstartInformation,
    ) -> Direction {
        self.solve_boxed(
            variable_bounds,
            constraint_bounds,
            gradient,
            None,
            jacobian,
            initial_point,
            warmstart,
        )
    }
}

/// Dense standard form: box-constrained variables and equality rows only.
struct InteriorProblem {
    dimension: usize,
    bounds: Vec<Interval>,
    quadratic: Option<DMatrix<f64>>,
    gradient: DVector<f64>,
    equalities: DMatrix<f64>,
    rhs: DVector<f64>,
    /// row index of each original constraint
    row_of_constraint: Vec<usize>,
    /// slack variable of each non-equality constraint
    slack_of_constraint: Vec<Option<usize>>,
    /// first elastic variable (phase 1), == dimension for phase 2
    elastic_offset: usize,
    /// per original constraint: (p index, n index) in phase 1
    elastic_of_constraint: Vec<(usize, usize)>,
}

impl InteriorProblem {
    /// Extend a start for the leading variables to the full dimension,
    /// placing slacks at their row values and elastics at zero (both get
    /// pushed strictly inside their boxes by the interior loop).
    fn spread_start(&self, leading: &[f64]) -> Vec<f64> {
        let mut start = vec![0.0; self.dimension];
        start[..leading.len()].copy_from_slice(leading);
        for (j, &slack) in self.slack_of_constraint.iter().enumerate() {
            if let Some(slack) = slack {
                let row = self.row_of_constraint[j];
                let mut value = 0.0;
                for i in 0..leading.len() {
                    value += self.equalities[(row, i)] * leading[i];
                }
                start[slack] = value;
            }
        }
        start
    }
}

fn build_phase2(
    variable_bounds: &[Interval],
    constraint_bounds: &[Interval],
    hessian: Option<&SymmetricTriplets>,
    gradient: &[f64],
    jacobian: &[SparseVector],
) -> InteriorProblem {
    let n = variable_bounds.len();
    let m = constraint_bounds.len();

    let mut slack_of_constraint = vec![None; m];
    let mut bounds = variable_bounds.to_vec();
    for (j, constraint) in constraint_bounds.iter().enumerate() {
        if !constraint.is_equality() {
            slack_of_constraint[j] = Some(bounds.len());
            bounds.push(*constraint);
        }
    }
    let dimension = bounds.len();

    let mut equalities = DMatrix::zeros(m, dimension);
    let mut rhs = DVector::zeros(m);
    let row_of_constraint: Vec<usize> = (0..m).collect();
    for j in 0..m {
        for (i, value) in jacobian[j].iter() {
            equalities[(j, i)] += value;
        }
        match slack_of_constraint[j] {
            Some(slack) => equalities[(j, slack)] = -1.0,
            None => rhs[j] = constraint_bounds[j].lower,
        }
    }

    let quadratic = hessian.map(|hessian| {
        let mut q = DMatrix::zeros(dimension, dimension);
        for (&value, (row, col)) in hessian.triplet_iter() {
            q[(row, col)] += value;
            if row != col {
                q[(col, row)] += value;
            }
        }
        q
    });

    let mut gradient_full = DVector::zeros(dimension);
    gradient_full.as_mut_slice()[..n].copy_from_slice(gradient);

    InteriorProblem {
        dimension,
        bounds,
        quadratic,
        gradient: gradient_full,
        equalities,
        rhs,
        row_of_constraint,
        slack_of_constraint,
        elastic_offset: dimension,
        elastic_of_constraint: Vec::new(),
    }
}

fn build_phase1(
    variable_bounds: &[Interval],
    constraint_bounds: &[Interval],
    jacobian: &[SparseVector],
) -> InteriorProblem {
    let mut problem = build_phase2(variable_bounds, constraint_bounds, None, &vec![0.0; variable_bounds.len()], jacobian);
    let m = constraint_bounds.len();

    // append an elastic pair to every row: a^T d (- s) + p - n = rhs
    problem.elastic_offset = problem.dimension;
    problem.elastic_of_constraint = Vec::with_capacity(m);
    let elastic_count = 2 * m;
    let dimension = problem.dimension + elastic_count;
    problem.equalities = problem.equalities.clone().resize_horizontally(dimension, 0.0);
    let mut gradient = DVector::zeros(dimension);
    for j in 0..m {
        let p = problem.bounds.len();
        problem.bounds.push(Interval::lower_bounded(0.0));
        let q = problem.bounds.len();
        problem.bounds.push(Interval::lower_bounded(0.0));
        problem.equalities[(j, p)] = 1.0;
        problem.equalities[(j, q)] = -1.0;
        gradient[p] = 1.0;
        gradient[q] = 1.0;
        problem.elastic_of_constraint.push((p, q));
    }
    problem.dimension = dimension;
    problem.gradient = gradient;
    problem
}

/// Classify each constraint by the violated side of its phase-1 elastics.
fn classify_violations(
    phase1: &InteriorProblem,
    primals: &[f64],
    tolerance: f64,
) -> ConstraintPartition {
    let m = phase1.elastic_of_constraint.len();
    let mut partition = ConstraintPartition::new(m);
    for j in 0..m {
        let (p, n) = phase1.elastic_of_constraint[j];
        if primals[p] > tolerance {
            // p lifts the row: it sat below its lower bound
            partition.classify(j, ConstraintFeasibility::InfeasibleLower);
        } else if primals[n] > tolerance {
            partition.classify(j, ConstraintFeasibility::InfeasibleUpper);
        } else {
            partition.classify(j, ConstraintFeasibility::Feasible);
        }
    }
    partition
}

struct InteriorSolution {
    primals: Vec<f64>,
    duals: Vec<f64>,
    lower_duals: Vec<f64>,
    upper_duals: Vec<f64>,
    converged: bool,
    diverged: bool,
}

/// Primal-dual barrier loop on an [`InteriorProblem`].
///
/// One Newton step on the perturbed KKT system per iteration, a monotone μ
/// decrease gated on the barrier KKT error, and a fraction-to-boundary rule
/// keeping (v, z) strictly interior.
fn solve_interior(
    problem: &InteriorProblem,
    start: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> InteriorSolution {
    let n = problem.dimension;
    let m = problem.equalities.nrows();

    // strictly interior start
    let mut v = vec![0.0; n];
    for i in 0..n {
        v[i] = push_inside(start[i], problem.bounds[i]);
    }

    let mut mu = 0.1;
    let mut y = vec![0.0; m];
    let mut zl = vec![0.0; n];
    let mut zu = vec![0.0; n];
    for i in 0..n {
        if problem.bounds[i].has_finite_lower() {
            zl[i] = (mu / (v[i] - problem.bounds[i].lower)).clamp(1e-8, 1e8);
        }
        if problem.bounds[i].has_finite_upper() {
            zu[i] = (mu / (v[i] - problem.bounds[i].upper)).clamp(-1e8, -1e-8);
        }
    }

    let gradient_scale = 1.0 + problem.gradient.amax();
    let rhs_scale = 1.0 + if m > 0 { problem.rhs.amax() } else { 0.0 };

    let mut r_dual = vec![0.0; n];
    let mut r_primal = vec![0.0; m];
    let mut converged = false;
    let mut diverged = false;
    let mut regularization = 1e-11;

    for _ in 0..max_iterations {
        if crate::linalg::inf_norm(&v) > 1e13 {
            diverged = true;
            break;
        }

        // residuals of the unperturbed KKT system
        compute_gradient(problem, &v, &mut r_dual);
        for i in 0..n {
            for j in 0..m {
                r_dual[i] -= problem.equalities[(j, i)] * y[j];
            }
            r_dual[i] -= zl[i] + zu[i];
        }
        for j in 0..m {
            let mut row = -problem.rhs[j];
            for i in 0..n {
                row += problem.equalities[(j, i)] * v[i];
            }
            r_primal[j] = row;
        }
        let mut complementarity0 = 0.0_f64;
        let mut complementarity_mu = 0.0_f64;
        for i in 0..n {
            if problem.bounds[i].has_finite_lower() {
                let product = (v[i] - problem.bounds[i].lower) * zl[i];
                complementarity0 = complementarity0.max(product.abs());
                complementarity_mu = complementarity_mu.max((product - mu).abs());
            }
            if problem.bounds[i].has_finite_upper() {
                let product = (v[i] - problem.bounds[i].upper) * zu[i];
                complementarity0 = complementarity0.max(product.abs());
                complementarity_mu = complementarity_mu.max((product - mu).abs());
            }
        }

        let dual_error = crate::linalg::inf_norm(&r_dual) / gradient_scale;
        let primal_error = crate::linalg::inf_norm(&r_primal) / rhs_scale;
        if dual_error <= tolerance
            && primal_error <= tolerance
            && complementarity0 / gradient_scale <= 10.0 * tolerance
        {
            converged = true;
            break;
        }

        // monotone barrier decrease once the μ-system is solved well enough
        if dual_error.max(primal_error).max(complementarity_mu / gradient_scale) <= 10.0 * mu {
            mu = (0.2 * mu).min(mu.powf(1.5)).max(tolerance / 10.0).max(1e-13);
        }

        // Newton system on the μ-perturbed KKT conditions, bound duals
        // eliminated
        let dimension = n + m;
        let mut kkt = DMatrix::zeros(dimension, dimension);
        if let Some(quadratic) = &problem.quadratic {
            kkt.view_mut((0, 0), (n, n)).copy_from(quadratic);
        }
        for i in 0..n {
            let mut diagonal = kkt[(i, i)] + regularization;
            if problem.bounds[i].has_finite_lower() {
                diagonal += zl[i] / (v[i] - problem.bounds[i].lower);
            }
            if problem.bounds[i].has_finite_upper() {
                diagonal += zu[i] / (v[i] - problem.bounds[i].upper);
            }
            kkt[(i, i)] = diagonal;
        }
        for j in 0..m {
            for i in 0..n {
                kkt[(n + j, i)] = problem.equalities[(j, i)];
                kkt[(i, n + j)] = problem.equalities[(j, i)];
            }
            kkt[(n + j, n + j)] = -regularization;
        }

        let mut rhs = DVector::zeros(dimension);
        compute_gradient(problem, &v, &mut r_dual);
        for i in 0..n {
            let mut entry = -r_dual[i];
            for j in 0..m {
                entry += problem.equalities[(j, i)] * y[j];
            }
            if problem.bounds[i].has_finite_lower() {
                entry += mu / (v[i] - problem.bounds[i].lower);
            }
            if problem.bounds[i].has_finite_upper() {
                entry += mu / (v[i] - problem.bounds[i].upper);
            }
            rhs[i] = entry;
        }
        for j in 0..m {
            rhs[n + j] = -r_primal[j];
        }

        let solution = match kkt.lu().solve(&rhs) {
            Some(solution) => solution,
            None => {
                regularization *= 100.0;
                if regularization > 1e-2 {
                    break;
                }
                continue;
            }
        };

        let delta_v = &solution.as_slice()[..n];
        // the (2,2) block solves for −Δy
        let delta_y: Vec<f64> = solution.as_slice()[n..].iter().map(|w| -w).collect();

        let mut delta_zl = vec![0.0; n];
        let mut delta_zu = vec![0.0; n];
        for i in 0..n {
            if problem.bounds[i].has_finite_lower() {
                let distance = v[i] - problem.bounds[i].lower;
                delta_zl[i] = (mu - delta_v[i] * zl[i]) / distance - zl[i];
            }
            if problem.bounds[i].has_finite_upper() {
                let distance = v[i] - problem.bounds[i].upper;
                delta_zu[i] = (mu - delta_v[i] * zu[i]) / distance - zu[i];
            }
        }

        // fraction to boundary
        let tau = 0.995_f64.max(1.0 - mu);
        let mut alpha_primal = 1.0_f64;
        let mut alpha_dual = 1.0_f64;
        for i in 0..n {
            if problem.bounds[i].has_finite_lower() {
                if delta_v[i] < 0.0 {
                    alpha_primal = alpha_primal
                        .min(-tau * (v[i] - problem.bounds[i].lower) / delta_v[i]);
                }
                if delta_zl[i] < 0.0 {
                    alpha_dual = alpha_dual.min(-tau * zl[i] / delta_zl[i]);
                }
            }
            if problem.bounds[i].has_finite_upper() {
                if delta_v[i] > 0.0 {
                    alpha_primal = alpha_primal
                        .min(-tau * (v[i] - problem.bounds[i].upper) / delta_v[i]);
                }
                if delta_zu[i] > 0.0 {
                    alpha_dual = alpha_dual.min(-tau * zu[i] / delta_zu[i]);
                }
            }
        }

        for i in 0..n {
            v[i] += alpha_primal * delta_v[i];
            zl[i] += alpha_dual * delta_zl[i];
            zu[i] += alpha_dual * delta_zu[i];
        }
        for j in 0..m {
            y[j] += alpha_primal * delta_y[j];
        }
    }

    InteriorSolution {
        primals: v,
        duals: y,
        lower_duals: zl,
        upper_duals: zu,
        converged,
        diverged,
    }
}

/// ∇q(v) = Q v + c.
fn compute_gradient(problem: &InteriorProblem, v: &[f64], gradient: &mut [f64]) {
    let n = problem.dimension;
    for i in 0..n {
        gradient[i] = problem.gradient[i];
    }
    if let Some(quadratic) = &problem.quadratic {
        for i in 0..n {
            let mut accumulator = gradient[i];
            for k in 0..n {
                accumulator += quadratic[(i, k)] * v[k];
            }
            gradient[i] = accumulator;
        }
    }
}

/// Project a start strictly inside its box.
fn push_inside(value: f64, bounds: Interval) -> f64 {
    let mut value = value;
    if bounds.has_finite_lower() && bounds.has_finite_upper() {
        let width = bounds.upper - bounds.lower;
        let perturbation_lower =
            (1e-2 * 1.0_f64.max(bounds.lower.abs())).min(0.25 * width);
        let perturbation_upper =
            (1e-2 * 1.0_f64.max(bounds.upper.abs())).min(0.25 * width);
        value = value.max(bounds.lower + perturbation_lower);
        value = value.min(bounds.upper - perturbation_upper);
    } else if bounds.has_finite_lower() {
        value = value.max(bounds.lower + 1e-2 * 1.0_f64.max(bounds.lower.abs()));
    } else if bounds.has_finite_upper() {
        value = value.min(bounds.upper - 1e-2 * 1.0_f64.max(bounds.upper.abs()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::symmetric_triplets;

    fn free_start(n: usize) -> Vec<f64> {
        vec![0.0; n]
    }

    #[test]
    fn bound_constrained_qp() {
        // min 1/2 d^2 + d over d in [-0.5, 2]: unconstrained minimum -1 is
        // clipped to the lower bound
        let variable_bounds = [Interval::new(-0.5, 2.0)];
        let mut gradient = SparseVector::default();
        gradient.insert(0, 1.0);
        let mut hessian = symmetric_triplets(1);
        hessian.add_triplet(0, 0, 1.0);

        let mut solver = BoxQpSolver::new();
        let direction = solver.solve_qp(
            &variable_bounds,
            &[],
            &gradient,
            &hessian,
            &[],
            &free_start(1),
            &WarmstartInformation::whole_problem_changed(),
        );
        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert!((direction.primals[0] + 0.5).abs() < 1e-6, "{}", direction.primals[0]);
        assert!(direction.active_set.bounds.at_lower_bound.contains(&0));
        // z_L = dL/dd at the bound: d + 1 = 0.5
        assert!((direction.multipliers.lower_bounds[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn equality_constrained_qp() {
        // min 1/2 (d0^2 + d1^2) s.t. d0 + d1 = 1: solution (0.5, 0.5), λ = -0.5
        let variable_bounds = [Interval::new(-10.0, 10.0), Interval::new(-10.0, 10.0)];
        let constraint_bounds = [Interval::equality(1.0)];
        let gradient = SparseVector::default();
        let mut hessian = symmetric_triplets(2);
        hessian.add_triplet(0, 0, 1.0);
        hessian.add_triplet(1, 1, 1.0);
        let mut jacobian = vec![SparseVector::default()];
        jacobian[0].insert(0, 1.0);
        jacobian[0].insert(1, 1.0);

        let mut solver = BoxQpSolver::new();
        let direction = solver.solve_qp(
            &variable_bounds,
            &constraint_bounds,
            &gradient,
            &hessian,
            &jacobian,
            &free_start(2),
            &WarmstartInformation::whole_problem_changed(),
        );
        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert!((direction.primals[0] - 0.5).abs() < 1e-6);
        assert!((direction.primals[1] - 0.5).abs() < 1e-6);
        // stationarity: H d = λ ∇c, so λ = 0.5 with L = q − λ c
        assert!((direction.multipliers.constraints[0] - 0.5).abs() < 1e-5);
        assert!((direction.subproblem_objective - 0.25).abs() < 1e-5);
    }

    #[test]
    fn range_constrained_lp_hits_a_vertex() {
        // min -d0 - d1 s.t. d0 + d1 <= 1, box [0, 5]^2
        let variable_bounds = [Interval::new(0.0, 5.0), Interval::new(0.0, 5.0)];
        let constraint_bounds = [Interval::upper_bounded(1.0)];
        let mut gradient = SparseVector::default();
        gradient.insert(0, -1.0);
        gradient.insert(1, -1.0);
        let mut jacobian = vec![SparseVector::default()];
        jacobian[0].insert(0, 1.0);
        jacobian[0].insert(1, 1.0);

        let mut solver = BoxQpSolver::new();
        let direction = solver.solve_lp(
            &variable_bounds,
            &constraint_bounds,
            &gradient,
            &jacobian,
            &free_start(2),
            &WarmstartInformation::whole_problem_changed(),
        );
        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert!((direction.primals[0] + direction.primals[1] - 1.0).abs() < 1e-6);
        assert!(direction.active_set.constraints.at_upper_bound.contains(&0));
        // the constraint multiplier is negative at an active upper bound
        assert!(direction.multipliers.constraints[0] < -0.5);
        assert!((direction.subproblem_objective + 1.0).abs() < 1e-5);
    }

    #[test]
    fn infeasible_rows_are_certified_with_a_partition() {
        // d >= 1 and d <= 0 cannot hold together
        let variable_bounds = [Interval::new(-10.0, 10.0)];
        let constraint_bounds = [Interval::lower_bounded(1.0), Interval::upper_bounded(0.0)];
        let gradient = {
            let mut g = SparseVector::default();
            g.insert(0, 1.0);
            g
        };
        let mut jacobian = vec![SparseVector::default(), SparseVector::default()];
        jacobian[0].insert(0, 1.0);
        jacobian[1].insert(0, 1.0);

        let mut solver = BoxQpSolver::new();
        let direction = solver.solve_lp(
            &variable_bounds,
            &constraint_bounds,
            &gradient,
            &jacobian,
            &free_start(1),
            &WarmstartInformation::whole_problem_changed(),
        );
        assert_eq!(direction.status, SubproblemStatus::Infeasible);
        let partition = direction.constraint_partition.expect("partition expected");
        // the minimal l1 violation is 1, split across the rows; each
        // infeasible row must be classified on its violated side
        assert!(!partition.infeasible.is_empty());
        for &j in &partition.infeasible {
            match partition.feasibility[j] {
                ConstraintFeasibility::InfeasibleLower => assert_eq!(j, 0),
                ConstraintFeasibility::InfeasibleUpper => assert_eq!(j, 1),
                ConstraintFeasibility::Feasible => unreachable!(),
            }
        }
    }

    #[test]
    fn degenerate_vertex_reports_consistent_active_set() {
        // min d0 + d1 s.t. d0 + d1 >= 1, box [0, 5]^2: every point on the
        // segment is optimal, the backend must report one with matching
        // active set information
        let variable_bounds = [Interval::new(0.0, 5.0), Interval::new(0.0, 5.0)];
        let constraint_bounds = [Interval::lower_bounded(1.0)];
        let mut gradient = SparseVector::default();
        gradient.insert(0, 1.0);
        gradient.insert(1, 1.0);
        let mut jacobian = vec![SparseVector::default()];
        jacobian[0].insert(0, 1.0);
        jacobian[0].insert(1, 1.0);

        let mut solver = BoxQpSolver::new();
        let direction = solver.solve_lp(
            &variable_bounds,
            &constraint_bounds,
            &gradient,
            &jacobian,
            &free_start(2),
            &WarmstartInformation::whole_problem_changed(),
        );
        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert!((direction.primals[0] + direction.primals[1] - 1.0).abs() < 1e-6);
        assert!(direction.active_set.constraints.at_lower_bound.contains(&0));
        assert!((direction.subproblem_objective - 1.0).abs() < 1e-5);
    }
}
