//! Sparse linear algebra kernels.
//!
//! Sparse vector/matrix helpers and the LDL^T factorization used by the
//! interior-point augmented system.

pub mod ldl;
pub mod sparse;

pub use ldl::{Inertia, LdlError, LdlSolver};
pub use sparse::SparseVector;

/// Infinity norm of a dense slice.
#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).fold(0.0_f64, f64::max)
}

/// Dense dot product.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(ai, bi)| ai * bi).sum()
}
