//! Sparse LDL^T factorization with inertia reporting.
//!
//! Up-looking factorization of a symmetric (possibly indefinite) matrix
//! given by its upper triangle in CSC format, following the QDLDL scheme:
//! the elimination tree is computed once per sparsity pattern and reused
//! across numeric factorizations.
//!
//! Unlike solver backends that bump small pivots internally, a zero or
//! non-finite pivot here is a hard error: the interior-point caller owns
//! regularization and decides how to react, driven by the inertia triple
//! read off the signs of D.

use super::sparse::SparseCsc;
use thiserror::Error;

/// LDL^T factorization errors.
#[derive(Error, Debug)]
pub enum LdlError {
    /// Input matrix is not upper triangular
    #[error("matrix entry ({0}, {1}) is below the diagonal")]
    NotUpperTriangular(usize, usize),

    /// A structurally missing diagonal entry
    #[error("column {0} has no diagonal entry")]
    MissingDiagonal(usize),

    /// Zero or non-finite pivot encountered
    #[error("zero or non-finite pivot in column {0}")]
    BadPivot(usize),

    /// Dimension mismatch
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Numeric factorization requested before symbolic analysis
    #[error("numeric factorization requested before symbolic analysis")]
    NotAnalyzed,
}

/// Inertia of a factorized symmetric matrix: eigenvalue sign counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inertia {
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
}

/// Sparse LDL^T solver.
///
/// `analyze` computes the elimination tree for a sparsity pattern;
/// `factorize` runs the numeric factorization (reusing the tree);
/// `solve` applies forward/backward substitution in place.
pub struct LdlSolver {
    n: usize,

    // symbolic data
    etree: Vec<Option<usize>>,
    column_counts: Vec<usize>,
    analyzed: bool,

    // factor: L (unit lower triangular, by columns) and D
    l_colptr: Vec<usize>,
    l_rowidx: Vec<usize>,
    l_values: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,
    factorized: bool,

    // reusable workspaces
    work_flags: Vec<usize>,
    y_values: Vec<f64>,
    y_marked: Vec<bool>,
    y_pattern: Vec<usize>,
    elimination_path: Vec<usize>,
    next_in_column: Vec<usize>,
}

impl LdlSolver {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            etree: vec![None; n],
            column_counts: vec![0; n],
            analyzed: false,
            l_colptr: vec![0; n + 1],
            l_rowidx: Vec::new(),
            l_values: Vec::new(),
            d: vec![0.0; n],
            d_inv: vec![0.0; n],
            factorized: false,
            work_flags: vec![0; n],
            y_values: vec![0.0; n],
            y_marked: vec![false; n],
            y_pattern: vec![0; n],
            elimination_path: vec![0; n],
            next_in_column: vec![0; n],
        }
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    fn check_dimensions(&self, matrix: &SparseCsc) -> Result<(), LdlError> {
        if matrix.rows() != self.n || matrix.cols() != self.n {
            return Err(LdlError::DimensionMismatch {
                expected: self.n,
                actual: matrix.rows(),
            });
        }
        Ok(())
    }

    /// Symbolic analysis: elimination tree and L column counts.
    ///
    /// Must be re-run whenever the sparsity pattern changes.
    pub fn analyze(&mut self, matrix: &SparseCsc) -> Result<(), LdlError> {
        self.check_dimensions(matrix)?;
        let indptr = matrix.indptr();
        let colptr = indptr.raw_storage();
        let rowidx = matrix.indices();

        self.etree.iter_mut().for_each(|e| *e = None);
        self.column_counts.fill(0);
        // sentinel: work_flags[i] == j + 1 means column i was touched while
        // processing column j
        self.work_flags.fill(0);

        for j in 0..self.n {
            self.work_flags[j] = j + 1;
            let mut has_diagonal = false;
            for p in colptr[j]..colptr[j + 1] {
                let mut i = rowidx[p];
                if i > j {
                    return Err(LdlError::NotUpperTriangular(i, j));
                }
                if i == j {
                    has_diagonal = true;
                    continue;
                }
                while self.work_flags[i] != j + 1 {
                    if self.etree[i].is_none() {
                        self.etree[i] = Some(j);
                    }
                    self.column_counts[i] += 1;
                    self.work_flags[i] = j + 1;
                    i = self.etree[i].unwrap();
                }
            }
            if !has_diagonal {
                return Err(LdlError::MissingDiagonal(j));
            }
        }

        self.l_colptr[0] = 0;
        for i in 0..self.n {
            self.l_colptr[i + 1] = self.l_colptr[i] + self.column_counts[i];
        }
        let nnz_l = self.l_colptr[self.n];
        self.l_rowidx.resize(nnz_l, 0);
        self.l_values.resize(nnz_l, 0.0);

        self.analyzed = true;
        self.factorized = false;
        Ok(())
    }

    /// Numeric factorization. The pattern must match the analyzed one.
    pub fn factorize(&mut self, matrix: &SparseCsc) -> Result<(), LdlError> {
        if !self.analyzed {
            return Err(LdlError::NotAnalyzed);
        }
        self.check_dimensions(matrix)?;
        let indptr = matrix.indptr();
        let colptr = indptr.raw_storage();
        let rowidx = matrix.indices();
        let values = matrix.data();

        self.factorized = false;
        self.y_values.fill(0.0);
        self.y_marked.fill(false);
        self.next_in_column.copy_from_slice(&self.l_colptr[..self.n]);

        for k in 0..self.n {
            self.d[k] = 0.0;
            let mut pattern_len = 0usize;

            // scatter column k of A and collect the elimination pattern
            for p in colptr[k]..colptr[k + 1] {
                let row = rowidx[p];
                if row == k {
                    self.d[k] = values[p];
                    continue;
                }
                self.y_values[row] = values[p];
                if !self.y_marked[row] {
                    self.y_marked[row] = true;
                    self.elimination_path[0] = row;
                    let mut path_len = 1usize;
                    let mut next = self.etree[row];
                    while let Some(ancestor) = next {
                        if ancestor >= k || self.y_marked[ancestor] {
                            break;
                        }
                        self.y_marked[ancestor] = true;
                        self.elimination_path[path_len] = ancestor;
                        path_len += 1;
                        next = self.etree[ancestor];
                    }
                    // reversed so that popping yields descendants first
                    while path_len > 0 {
                        path_len -= 1;
                        self.y_pattern[pattern_len] = self.elimination_path[path_len];
                        pattern_len += 1;
                    }
                }
            }

            // eliminate
            while pattern_len > 0 {
                pattern_len -= 1;
                let c = self.y_pattern[pattern_len];
                let y_c = self.y_values[c];
                let column_end = self.next_in_column[c];
                for p in self.l_colptr[c]..column_end {
                    self.y_values[self.l_rowidx[p]] -= self.l_values[p] * y_c;
                }
                let l_kc = y_c * self.d_inv[c];
                self.l_rowidx[column_end] = k;
                self.l_values[column_end] = l_kc;
                self.d[k] -= y_c * l_kc;
                self.next_in_column[c] += 1;
                self.y_values[c] = 0.0;
                self.y_marked[c] = false;
            }

            if self.d[k] == 0.0 || !self.d[k].is_finite() {
                return Err(LdlError::BadPivot(k));
            }
            self.d_inv[k] = 1.0 / self.d[k];
        }

        self.factorized = true;
        Ok(())
    }

    /// Solve K x = rhs in place.
    pub fn solve_in_place(&self, x: &mut [f64]) {
        assert!(self.factorized, "solve called before factorization");
        assert_eq!(x.len(), self.n);

        // L y = b
        for i in 0..self.n {
            let xi = x[i];
            for p in self.l_colptr[i]..self.l_colptr[i + 1] {
                x[self.l_rowidx[p]] -= self.l_values[p] * xi;
            }
        }
        // D z = y
        for i in 0..self.n {
            x[i] *= self.d_inv[i];
        }
        // L^T x = z
        for i in (0..self.n).rev() {
            let mut xi = x[i];
            for p in self.l_colptr[i]..self.l_colptr[i + 1] {
                xi -= self.l_values[p] * x[self.l_rowidx[p]];
            }
            x[i] = xi;
        }
    }

    /// Solve K x = rhs.
    pub fn solve(&self, rhs: &[f64], solution: &mut [f64]) {
        solution.copy_from_slice(rhs);
        self.solve_in_place(solution);
    }

    /// Eigenvalue sign counts of the factorized matrix, read off D.
    pub fn inertia(&self) -> Inertia {
        assert!(self.factorized, "inertia requested before factorization");
        let mut positive = 0;
        let mut negative = 0;
        for &di in &self.d[..self.n] {
            if di > 0.0 {
                positive += 1;
            } else {
                negative += 1;
            }
        }
        Inertia {
            positive,
            negative,
            zero: self.n - positive - negative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn upper_csc(n: usize, triplets: &[(usize, usize, f64)]) -> SparseCsc {
        let mut tri = TriMat::new((n, n));
        for &(i, j, v) in triplets {
            tri.add_triplet(i, j, v);
        }
        tri.to_csc()
    }

    #[test]
    fn positive_definite_solve() {
        // [[2, 1], [1, 2]] x = [3, 3] has solution [1, 1]
        let k = upper_csc(2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 2.0)]);
        let mut solver = LdlSolver::new(2);
        solver.analyze(&k).unwrap();
        solver.factorize(&k).unwrap();

        let mut x = vec![0.0; 2];
        solver.solve(&[3.0, 3.0], &mut x);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
        assert_eq!(
            solver.inertia(),
            Inertia { positive: 2, negative: 0, zero: 0 }
        );
    }

    #[test]
    fn saddle_point_inertia() {
        // [[1, 0, 1], [0, 1, 1], [1, 1, 0]] is a KKT matrix with inertia (2, 1, 0)
        let k = upper_csc(
            3,
            &[(0, 0, 1.0), (1, 1, 1.0), (0, 2, 1.0), (1, 2, 1.0), (2, 2, 0.0)],
        );
        let mut solver = LdlSolver::new(3);
        solver.analyze(&k).unwrap();
        solver.factorize(&k).unwrap();
        assert_eq!(
            solver.inertia(),
            Inertia { positive: 2, negative: 1, zero: 0 }
        );

        // residual check on a random-ish rhs
        let rhs = vec![1.0, 2.0, -1.0];
        let mut x = vec![0.0; 3];
        solver.solve(&rhs, &mut x);
        let kx = [
            x[0] + x[2],
            x[1] + x[2],
            x[0] + x[1],
        ];
        for i in 0..3 {
            assert!((kx[i] - rhs[i]).abs() < 1e-12, "residual at {i}");
        }
    }

    #[test]
    fn zero_pivot_is_reported() {
        let k = upper_csc(2, &[(0, 0, 0.0), (0, 1, 0.0), (1, 1, 1.0)]);
        let mut solver = LdlSolver::new(2);
        solver.analyze(&k).unwrap();
        assert!(matches!(solver.factorize(&k), Err(LdlError::BadPivot(0))));
    }

    #[test]
    fn pattern_reuse_across_numeric_factorizations() {
        let k1 = upper_csc(2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 1, 3.0)]);
        let k2 = upper_csc(2, &[(0, 0, 2.0), (0, 1, -1.0), (1, 1, -5.0)]);
        let mut solver = LdlSolver::new(2);
        solver.analyze(&k1).unwrap();
        solver.factorize(&k1).unwrap();
        assert_eq!(solver.inertia().positive, 2);
        solver.factorize(&k2).unwrap();
        assert_eq!(solver.inertia().positive, 1);
        assert_eq!(solver.inertia().negative, 1);
    }
}
