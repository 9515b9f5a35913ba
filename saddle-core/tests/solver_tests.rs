//! End-to-end solver tests on classic small problems.

use saddle_core::direction::Phase;
use saddle_core::linalg::sparse::{SparseVector, SymmetricTriplets};
use saddle_core::{solve, Interval, Model, Options, TerminationStatus};

fn ipm_options() -> Options {
    Options {
        subproblem: "primal_dual_interior_point".to_string(),
        globalization_strategy: "filter".to_string(),
        ..Options::default()
    }
}

fn sqp_options() -> Options {
    Options {
        subproblem: "QP".to_string(),
        globalization_strategy: "filter".to_string(),
        ..Options::default()
    }
}

/// Hock–Schittkowski problem 71.
///
///   min  x0·x3·(x0+x1+x2) + x2
///   s.t. x0·x1·x2·x3 >= 25
///        x0² + x1² + x2² + x3² = 40
///        1 <= x <= 5,   start (1, 5, 5, 1)
struct Hs071;

impl Model for Hs071 {
    fn number_variables(&self) -> usize {
        4
    }
    fn number_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::new(1.0, 5.0)
    }
    fn constraint_bounds(&self, j: usize) -> Interval {
        if j == 0 {
            Interval::lower_bounded(25.0)
        } else {
            Interval::equality(40.0)
        }
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.copy_from_slice(&[1.0, 5.0, 5.0, 1.0]);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2]
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, x[3] * (2.0 * x[0] + x[1] + x[2]));
        gradient.insert(1, x[0] * x[3]);
        gradient.insert(2, x[0] * x[3] + 1.0);
        gradient.insert(3, x[0] * (x[0] + x[1] + x[2]));
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0] * x[1] * x[2] * x[3];
        constraints[1] = x.iter().map(|xi| xi * xi).sum();
    }
    fn evaluate_constraint_jacobian(&self, x: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, x[1] * x[2] * x[3]);
        jacobian[0].insert(1, x[0] * x[2] * x[3]);
        jacobian[0].insert(2, x[0] * x[1] * x[3]);
        jacobian[0].insert(3, x[0] * x[1] * x[2]);
        for i in 0..4 {
            jacobian[1].insert(i, 2.0 * x[i]);
        }
    }
    fn evaluate_lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        let sigma = objective_multiplier;
        // objective block
        hessian.add_triplet(0, 0, sigma * 2.0 * x[3]);
        hessian.add_triplet(1, 0, sigma * x[3]);
        hessian.add_triplet(2, 0, sigma * x[3]);
        hessian.add_triplet(3, 0, sigma * (2.0 * x[0] + x[1] + x[2]));
        hessian.add_triplet(3, 1, sigma * x[0]);
        hessian.add_triplet(3, 2, sigma * x[0]);
        // product constraint, L = σf − λᵀc
        let l0 = -multipliers[0];
        hessian.add_triplet(1, 0, l0 * x[2] * x[3]);
        hessian.add_triplet(2, 0, l0 * x[1] * x[3]);
        hessian.add_triplet(3, 0, l0 * x[1] * x[2]);
        hessian.add_triplet(2, 1, l0 * x[0] * x[3]);
        hessian.add_triplet(3, 1, l0 * x[0] * x[2]);
        hessian.add_triplet(3, 2, l0 * x[0] * x[1]);
        // sphere constraint
        let l1 = -multipliers[1];
        for i in 0..4 {
            hessian.add_triplet(i, i, l1 * 2.0);
        }
    }
}

#[test]
fn hs071_interior_point() {
    let result = solve(&Hs071, &ipm_options()).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal, "{result:?}");

    let expected = [1.0, 4.742_999_4, 3.821_150_3, 1.379_408_2];
    for (i, &xi) in expected.iter().enumerate() {
        assert!(
            (result.primals[i] - xi).abs() < 1e-3,
            "x[{i}] = {} expected {xi}",
            result.primals[i]
        );
    }
    assert!((result.objective - 17.014_017_3).abs() < 1e-3, "f = {}", result.objective);
    assert!(result.infeasibility <= 1e-6);
}

/// Unconstrained Rosenbrock function from (−1.2, 1).
struct Rosenbrock;

impl Model for Rosenbrock {
    fn number_variables(&self) -> usize {
        2
    }
    fn number_constraints(&self) -> usize {
        0
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::FREE
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        unreachable!()
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.copy_from_slice(&[-1.2, 1.0]);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]));
        gradient.insert(1, 200.0 * (x[1] - x[0] * x[0]));
    }
    fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
    fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
    fn evaluate_lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        _: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        let sigma = objective_multiplier;
        hessian.add_triplet(0, 0, sigma * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0]));
        hessian.add_triplet(1, 0, sigma * (-400.0 * x[0]));
        hessian.add_triplet(1, 1, sigma * 200.0);
    }
}

#[test]
fn rosenbrock_sqp() {
    let result = solve(&Rosenbrock, &sqp_options()).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal, "{result:?}");
    assert!((result.primals[0] - 1.0).abs() < 1e-5, "x = {:?}", result.primals);
    assert!((result.primals[1] - 1.0).abs() < 1e-5);
    assert!(result.objective < 1e-9);
    assert!(result.iterations <= 60, "took {} iterations", result.iterations);
}

#[test]
fn rosenbrock_restarted_from_its_optimum_costs_no_iterations() {
    struct AtOptimum;
    impl Model for AtOptimum {
        fn number_variables(&self) -> usize {
            2
        }
        fn number_constraints(&self) -> usize {
            0
        }
        fn variable_bounds(&self, _: usize) -> Interval {
            Interval::FREE
        }
        fn constraint_bounds(&self, _: usize) -> Interval {
            unreachable!()
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.copy_from_slice(&[1.0, 1.0]);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            Rosenbrock.evaluate_objective(x)
        }
        fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
            Rosenbrock.evaluate_objective_gradient(x, gradient);
        }
        fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
        fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
        fn evaluate_lagrangian_hessian(
            &self,
            x: &[f64],
            objective_multiplier: f64,
            multipliers: &[f64],
            hessian: &mut SymmetricTriplets,
        ) {
            Rosenbrock.evaluate_lagrangian_hessian(x, objective_multiplier, multipliers, hessian);
        }
    }

    let result = solve(&AtOptimum, &sqp_options()).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal);
    assert_eq!(result.iterations, 0);
}

/// Inconsistent constraints: x >= 1 and x <= 0.
struct InfeasibleLp;

impl Model for InfeasibleLp {
    fn number_variables(&self) -> usize {
        1
    }
    fn number_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::new(-10.0, 10.0)
    }
    fn constraint_bounds(&self, j: usize) -> Interval {
        if j == 0 {
            Interval::lower_bounded(1.0)
        } else {
            Interval::upper_bounded(0.0)
        }
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.fill(0.5);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        x[0]
    }
    fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, 1.0);
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0];
        constraints[1] = x[0];
    }
    fn evaluate_constraint_jacobian(&self, _: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, 1.0);
        jacobian[1].insert(0, 1.0);
    }
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        _: f64,
        _: &[f64],
        _: &mut SymmetricTriplets,
    ) {
    }
}

#[test]
fn infeasible_lp_is_detected_by_restoration() {
    let options = Options {
        subproblem: "LP".to_string(),
        globalization_strategy: "merit".to_string(),
        ..Options::default()
    };
    let result = solve(&InfeasibleLp, &options).unwrap();
    assert_eq!(result.status, TerminationStatus::Infeasible, "{result:?}");
    // the violation cannot drop below 1 anywhere (max-norm residual 1/2)
    assert!(result.infeasibility >= 0.49, "infeasibility = {}", result.infeasibility);
}

/// min ½x² over 1 <= x <= 2, from x = 1.5.
struct PureBound;

impl Model for PureBound {
    fn number_variables(&self) -> usize {
        1
    }
    fn number_constraints(&self) -> usize {
        0
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::new(1.0, 2.0)
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        unreachable!()
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.fill(1.5);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        0.5 * x[0] * x[0]
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, x[0]);
    }
    fn evaluate_constraints(&self, _: &[f64], _: &mut [f64]) {}
    fn evaluate_constraint_jacobian(&self, _: &[f64], _: &mut [SparseVector]) {}
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        objective_multiplier: f64,
        _: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        hessian.add_triplet(0, 0, objective_multiplier);
    }
}

#[test]
fn pure_bound_problem_interior_point() {
    let result = solve(&PureBound, &ipm_options()).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal, "{result:?}");
    assert!((result.primals[0] - 1.0).abs() < 1e-4, "x = {}", result.primals[0]);
    // stationarity x − z_L = 0 at the lower bound gives z_L = 1
    assert!((result.lower_bound_multipliers[0] - 1.0).abs() < 1e-3);
    // strict interiority and dual signs are preserved
    assert!(result.primals[0] > 1.0 - 1e-10);
    assert!(result.lower_bound_multipliers[0] >= 0.0);
    assert!(result.upper_bound_multipliers[0] <= 0.0);
}

/// min x + y with x + y >= 1 and x, y >= 0: a whole face is optimal.
struct DegenerateLp;

impl Model for DegenerateLp {
    fn number_variables(&self) -> usize {
        2
    }
    fn number_constraints(&self) -> usize {
        1
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::lower_bounded(0.0)
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        Interval::lower_bounded(1.0)
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.copy_from_slice(&[1.0, 1.0]);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        x[0] + x[1]
    }
    fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, 1.0);
        gradient.insert(1, 1.0);
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0] + x[1];
    }
    fn evaluate_constraint_jacobian(&self, _: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, 1.0);
        jacobian[0].insert(1, 1.0);
    }
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        _: f64,
        _: &[f64],
        _: &mut SymmetricTriplets,
    ) {
    }
}

#[test]
fn degenerate_lp_finds_the_optimal_face() {
    let options = Options {
        subproblem: "LP".to_string(),
        globalization_strategy: "filter".to_string(),
        ..Options::default()
    };
    let result = solve(&DegenerateLp, &options).unwrap();
    assert!(
        matches!(result.status, TerminationStatus::Optimal | TerminationStatus::SmallStep),
        "{result:?}"
    );
    let sum = result.primals[0] + result.primals[1];
    assert!((sum - 1.0).abs() < 1e-5, "x + y = {sum}");
    assert!(result.primals.iter().all(|&xi| xi >= -1e-8));
    assert!((result.objective - 1.0).abs() < 1e-5);
}

/// min (x−2)² s.t. x² = 4 from x = 0.1: the first linearization is
/// infeasible inside the trust region, forcing a restoration phase before
/// the optimality phase resumes and converges to x = 2.
struct CircleEquality;

impl Model for CircleEquality {
    fn number_variables(&self) -> usize {
        1
    }
    fn number_constraints(&self) -> usize {
        1
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::new(-10.0, 10.0)
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        Interval::equality(4.0)
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.fill(0.1);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        (x[0] - 2.0).powi(2)
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, 2.0 * (x[0] - 2.0));
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0] * x[0];
    }
    fn evaluate_constraint_jacobian(&self, x: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, 2.0 * x[0]);
    }
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        hessian.add_triplet(0, 0, objective_multiplier * 2.0 - multipliers[0] * 2.0);
    }
}

#[test]
fn infeasible_linearization_triggers_restoration_and_recovers() {
    let options = Options {
        subproblem: "QP".to_string(),
        globalization_strategy: "filter".to_string(),
        trust_region_initial_radius: 1.0,
        ..Options::default()
    };
    let result = solve(&CircleEquality, &options).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal, "{result:?}");
    assert!((result.primals[0] - 2.0).abs() < 1e-5, "x = {}", result.primals[0]);
    assert!(result.infeasibility <= 1e-6);
}

/// Driving the two-phase state machine directly: a forced switch into
/// restoration produces a feasibility-improving iterate that is accepted by
/// the feasibility-only test, after which the optimality phase resumes.
#[test]
fn restoration_phase_switching_round_trip() {
    use saddle_core::globalization::FilterStrategy;
    use saddle_core::iterate::Iterate;
    use saddle_core::relaxation::{ConstraintRelaxationStrategy, FeasibilityRestoration};
    use saddle_core::solvers::WarmstartInformation;
    use saddle_core::subproblem::QpSubproblem;

    struct Parabola;
    impl Model for Parabola {
        fn number_variables(&self) -> usize {
            1
        }
        fn number_constraints(&self) -> usize {
            1
        }
        fn variable_bounds(&self, _: usize) -> Interval {
            Interval::new(-10.0, 10.0)
        }
        fn constraint_bounds(&self, _: usize) -> Interval {
            Interval::equality(4.0)
        }
        fn initial_primal_point(&self, x: &mut [f64]) {
            x.fill(1.0);
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            x[0]
        }
        fn evaluate_objective_gradient(&self, _: &[f64], gradient: &mut SparseVector) {
            gradient.insert(0, 1.0);
        }
        fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
            constraints[0] = x[0] * x[0];
        }
        fn evaluate_constraint_jacobian(&self, x: &[f64], jacobian: &mut [SparseVector]) {
            jacobian[0].insert(0, 2.0 * x[0]);
        }
        fn evaluate_lagrangian_hessian(
            &self,
            _: &[f64],
            _: f64,
            multipliers: &[f64],
            hessian: &mut SymmetricTriplets,
        ) {
            hessian.add_triplet(0, 0, -multipliers[0] * 2.0);
        }
    }

    let options = Options::default();
    let model = Parabola;
    let subproblem = Box::new(QpSubproblem::new(3, 1));
    let globalization = Box::new(FilterStrategy::new(&options));
    let mut relaxation = FeasibilityRestoration::new(&model, subproblem, globalization);

    let mut current = Iterate::new(3, 1);
    current.set_primals(&[1.0, 0.0, 0.0]);
    relaxation.initialize(&mut current).unwrap();
    assert_eq!(relaxation.phase(), Phase::Optimality);

    // force the switch, as if the trust region had collapsed
    let placeholder = saddle_core::Direction::new(1, 1);
    assert!(relaxation.switch_to_restoration(&mut current, &placeholder));
    assert_eq!(relaxation.phase(), Phase::Restoration);

    // the restoration direction reduces the violation of x² = 4
    let direction = relaxation.compute_direction(
        &mut current,
        Some(10.0),
        &WarmstartInformation::whole_problem_changed(),
    );
    assert_eq!(direction.status, saddle_core::SubproblemStatus::Optimal);
    assert!(direction.primals[0] > 0.0, "direction {:?}", direction.primals);

    let mut trial = Iterate::new(3, 1);
    let mut primals = current.primals.clone();
    primals[0] += direction.primals[0];
    trial.set_primals(&primals);
    trial.multipliers.constraints[0] =
        current.multipliers.constraints[0] + direction.multipliers.constraints[0];

    let accepted = relaxation.is_iterate_acceptable(&mut current, &mut trial, &direction, 1.0);
    assert!(accepted);
    // the accepted iterate improves feasibility and re-enters optimality
    assert!(trial.progress.infeasibility < 3.0);
    assert_eq!(relaxation.phase(), Phase::Optimality);
}

/// min (x−2)² s.t. x <= 1 via the Sl1QP driver.
struct BoundedQuadratic;

impl Model for BoundedQuadratic {
    fn number_variables(&self) -> usize {
        1
    }
    fn number_constraints(&self) -> usize {
        1
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::new(-10.0, 10.0)
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        Interval::upper_bounded(1.0)
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.fill(0.0);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        (x[0] - 2.0).powi(2)
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, 2.0 * (x[0] - 2.0));
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0];
    }
    fn evaluate_constraint_jacobian(&self, _: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, 1.0);
    }
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        objective_multiplier: f64,
        _: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        hessian.add_triplet(0, 0, objective_multiplier * 2.0);
    }
}

#[test]
fn sl1qp_converges_on_an_inequality_constrained_quadratic() {
    let options = Options {
        subproblem: "QP".to_string(),
        globalization_strategy: "merit".to_string(),
        constraint_relaxation: "l1_relaxation".to_string(),
        ..Options::default()
    };
    let result = solve(&BoundedQuadratic, &options).unwrap();
    assert!(
        matches!(result.status, TerminationStatus::Optimal | TerminationStatus::SmallStep),
        "{result:?}"
    );
    assert!((result.primals[0] - 1.0).abs() < 1e-5, "x = {}", result.primals[0]);
    // active upper bound: λ = −2
    assert!((result.constraint_multipliers[0] + 2.0).abs() < 1e-4);
}

/// Linear equality, no bounds: the interior point takes unit steps and
/// converges immediately.
struct EqualityQuadratic;

impl Model for EqualityQuadratic {
    fn number_variables(&self) -> usize {
        2
    }
    fn number_constraints(&self) -> usize {
        1
    }
    fn variable_bounds(&self, _: usize) -> Interval {
        Interval::FREE
    }
    fn constraint_bounds(&self, _: usize) -> Interval {
        Interval::equality(1.0)
    }
    fn initial_primal_point(&self, x: &mut [f64]) {
        x.copy_from_slice(&[5.0, -3.0]);
    }
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        0.5 * (x[0] * x[0] + x[1] * x[1])
    }
    fn evaluate_objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) {
        gradient.insert(0, x[0]);
        gradient.insert(1, x[1]);
    }
    fn evaluate_constraints(&self, x: &[f64], constraints: &mut [f64]) {
        constraints[0] = x[0] + x[1];
    }
    fn evaluate_constraint_jacobian(&self, _: &[f64], jacobian: &mut [SparseVector]) {
        jacobian[0].insert(0, 1.0);
        jacobian[0].insert(1, 1.0);
    }
    fn evaluate_lagrangian_hessian(
        &self,
        _: &[f64],
        objective_multiplier: f64,
        _: &[f64],
        hessian: &mut SymmetricTriplets,
    ) {
        hessian.add_triplet(0, 0, objective_multiplier);
        hessian.add_triplet(1, 1, objective_multiplier);
    }
}

#[test]
fn linear_equality_problem_converges_in_a_few_unit_steps() {
    let result = solve(&EqualityQuadratic, &ipm_options()).unwrap();
    assert_eq!(result.status, TerminationStatus::Optimal, "{result:?}");
    assert!((result.primals[0] - 0.5).abs() < 1e-6);
    assert!((result.primals[1] - 0.5).abs() < 1e-6);
    assert!(result.iterations <= 5, "took {} iterations", result.iterations);
}
