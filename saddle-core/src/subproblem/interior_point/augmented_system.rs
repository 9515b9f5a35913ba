//! Augmented KKT system with inertia correction.
//!
//! Assembles the (n+m)×(n+m) symmetric indefinite matrix
//!
//! ```text
//!   K = [ H + δ_x I   ∇c^T    ]
//!       [ ∇c          −δ_c I  ]
//! ```
//!
//! factorizes it and regularizes until the inertia is (n, m, 0): primal
//! regularization δ_x grows geometrically from the last successful value,
//! dual regularization δ_c engages when the matrix is rank deficient.

use sprs::TriMat;

use crate::error::SolverError;
use crate::linalg::ldl::{Inertia, LdlSolver};
use crate::linalg::sparse::{SparseVector, SymmetricTriplets};

pub struct AugmentedSystem {
    pub rhs: Vec<f64>,
    pub solution: Vec<f64>,
    dimension: usize,
    solver: Option<LdlSolver>,
    previous_primal_regularization: f64,
    /// δ_x of the last successful factorization, for statistics
    pub last_primal_regularization: f64,
}

impl AugmentedSystem {
    pub fn new(max_dimension: usize) -> Self {
        Self {
            rhs: vec![0.0; max_dimension],
            solution: vec![0.0; max_dimension],
            dimension: 0,
            solver: None,
            previous_primal_regularization: 0.0,
            last_primal_regularization: 0.0,
        }
    }

    /// Assemble, factorize and regularize until the inertia is correct.
    pub fn assemble_and_factorize(
        &mut self,
        hessian: &SymmetricTriplets,
        jacobian: &[SparseVector],
        number_variables: usize,
        number_constraints: usize,
        dual_regularization: f64,
    ) -> Result<(), SolverError> {
        let n = number_variables;
        let m = number_constraints;
        self.dimension = n + m;
        let target = Inertia { positive: n, negative: m, zero: 0 };

        let mut delta_x = 0.0;
        let mut delta_c = 0.0;
        loop {
            let matrix = assemble_upper(hessian, jacobian, n, m, delta_x, delta_c);
            let mut solver = LdlSolver::new(n + m);
            let factorized = solver.analyze(&matrix).is_ok() && solver.factorize(&matrix).is_ok();
            let rank_deficient = !factorized || solver.inertia().zero > 0;
            if factorized && solver.inertia() == target {
                self.solver = Some(solver);
                self.last_primal_regularization = delta_x;
                if delta_x > 0.0 {
                    self.previous_primal_regularization = delta_x;
                }
                return Ok(());
            }

            if rank_deficient {
                delta_c = dual_regularization;
            }
            delta_x = if delta_x == 0.0 {
                if self.previous_primal_regularization == 0.0 {
                    1e-4
                } else {
                    (self.previous_primal_regularization / 3.0).max(1e-20)
                }
            } else {
                8.0 * delta_x
            };
            if delta_x > 1e40 {
                return Err(SolverError::Numeric(
                    "augmented system could not be regularized to the correct inertia".to_string(),
                ));
            }
        }
    }

    /// rhs = [−∇φ + ∇cᵀλ ; −c(x)].
    pub fn generate_rhs(
        &mut self,
        objective_gradient: &SparseVector,
        jacobian: &[SparseVector],
        constraints: &[f64],
        constraint_multipliers: &[f64],
        number_variables: usize,
        number_constraints: usize,
    ) {
        self.rhs[..self.dimension].fill(0.0);
        for (i, derivative) in objective_gradient.iter() {
            self.rhs[i] -= derivative;
        }
        for j in 0..number_constraints {
            if constraint_multipliers[j] != 0.0 {
                for (i, derivative) in jacobian[j].iter() {
                    self.rhs[i] += constraint_multipliers[j] * derivative;
                }
            }
            self.rhs[number_variables + j] = -constraints[j];
        }
    }

    /// Solve K·sol = rhs with the current factorization.
    pub fn solve(&mut self) {
        let solver = self.solver.as_ref().expect("augmented system not factorized");
        solver.solve(&self.rhs[..self.dimension], &mut self.solution[..self.dimension]);
    }
}

/// Upper-triangle CSC assembly with explicit (structural) diagonals.
fn assemble_upper(
    hessian: &SymmetricTriplets,
    jacobian: &[SparseVector],
    n: usize,
    m: usize,
    delta_x: f64,
    delta_c: f64,
) -> crate::linalg::sparse::SparseCsc {
    let mut triplets = TriMat::new((n + m, n + m));
    for i in 0..n {
        triplets.add_triplet(i, i, delta_x);
    }
    // Hessian is accumulated as the lower triangle
    for (&value, (row, col)) in hessian.triplet_iter() {
        triplets.add_triplet(col, row, value);
    }
    for (j, row) in jacobian.iter().enumerate().take(m) {
        for (i, value) in row.iter() {
            triplets.add_triplet(i, n + j, value);
        }
    }
    for j in 0..m {
        triplets.add_triplet(n + j, n + j, -delta_c);
    }
    triplets.to_csc()
}
