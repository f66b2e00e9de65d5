//! The implicit state equation $K(h) u = f$ and its factorized linear operator.
use crate::assembly::GlobalAssembly;
use crate::error::BeamError;
use crate::Real;
use faer::prelude::SpSolver;
use faer::sparse::linalg::solvers::Lu;
use faer::sparse::linalg::LuError;
use faer::sparse::SparseColMat;
use faer::Mat;
use log::trace;
use nalgebra::{DMatrix, DVector, DVectorView, Matrix4};
use nalgebra_sparse::CscMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// Direction in which derivatives are propagated through the state equation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivativeMode {
    /// Direct method: one solve with $K$ per design variable.
    Forward,
    /// Adjoint method: one solve with $K^T$ per output.
    #[default]
    Reverse,
}

/// Sparse LU factorization of the assembled system matrix, computed by `faer`.
///
/// The saddle-point system is indefinite, so the factorization uses partial pivoting together
/// with a fill-reducing column ordering. The factors are kept so that both $A x = b$ and
/// $A^T x = b$ can be solved without factorizing again.
#[derive(Clone)]
pub struct LuFactorization<T: Real> {
    dim: usize,
    lu: Arc<Lu<usize, T>>,
}

impl<T: Real> Debug for LuFactorization<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuFactorization")
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

impl<T: Real> LuFactorization<T> {
    pub fn factor(matrix: &CscMatrix<T>) -> Result<Self, BeamError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(BeamError::DimensionMismatch {
                what: "square system matrix columns",
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }

        let triplets: Vec<_> = matrix
            .triplet_iter()
            .map(|(i, j, v)| (i, j, *v))
            .collect();
        let sparse = SparseColMat::<usize, T>::try_new_from_triplets(matrix.nrows(), matrix.ncols(), &triplets)
            .map_err(|err| BeamError::Factorization(format!("{:?}", err)))?;
        let lu = sparse.as_ref().sp_lu().map_err(|err| match err {
            LuError::SymbolicSingular(_) => BeamError::SingularMatrix,
            other => BeamError::Factorization(format!("{:?}", other)),
        })?;
        trace!("Factorized system matrix of dimension {} ({} non-zeros)", matrix.nrows(), matrix.nnz());
        Ok(Self {
            dim: matrix.nrows(),
            lu: Arc::new(lu),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solves $A x = b$.
    ///
    /// A zero pivot shows up as a non-finite solution and is reported as a singular matrix.
    pub fn solve(&self, rhs: DVectorView<T>) -> Result<DVector<T>, BeamError> {
        BeamError::check_len("right-hand side", self.dim, rhs.len())?;
        let mut x = Mat::from_fn(rhs.len(), 1, |i, _| rhs[i]);
        self.lu.solve_in_place(x.as_mut());
        finite_solution(&x).map(|x| x.column(0).into_owned())
    }

    /// Solves $A^T x = b$ with the same factors.
    pub fn solve_transposed(&self, rhs: DVectorView<T>) -> Result<DVector<T>, BeamError> {
        BeamError::check_len("right-hand side", self.dim, rhs.len())?;
        let mut x = Mat::from_fn(rhs.len(), 1, |i, _| rhs[i]);
        self.lu.solve_transpose_in_place(x.as_mut());
        finite_solution(&x).map(|x| x.column(0).into_owned())
    }

    /// Solves $A X = B$ for all columns of $B$ at once.
    pub fn solve_columns(&self, rhs: &DMatrix<T>) -> Result<DMatrix<T>, BeamError> {
        BeamError::check_len("right-hand side rows", self.dim, rhs.nrows())?;
        let mut x = Mat::from_fn(rhs.nrows(), rhs.ncols(), |i, j| rhs[(i, j)]);
        self.lu.solve_in_place(x.as_mut());
        finite_solution(&x)
    }
}

fn finite_solution<T: Real>(x: &Mat<T>) -> Result<DMatrix<T>, BeamError> {
    let x = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x.read(i, j));
    if x.iter().all(|x_i| x_i.is_finite()) {
        Ok(x)
    } else {
        Err(BeamError::SingularMatrix)
    }
}

/// Assembles and solves the state equation for a fixed load vector.
#[derive(Debug, Clone)]
pub struct LinearStateSolve<T: Real> {
    assembly: GlobalAssembly,
    load: DVector<T>,
}

impl<T: Real> LinearStateSolve<T> {
    /// Creates the solver for the given assembly and *augmented* load vector.
    ///
    /// # Panics
    ///
    /// Panics if the load vector does not match the dimension of the augmented system.
    pub fn new(assembly: GlobalAssembly, load: DVector<T>) -> Self {
        assert_eq!(
            load.len(),
            assembly.system_dim(),
            "Load vector must include the constraint equations"
        );
        Self { assembly, load }
    }

    pub fn assembly(&self) -> &GlobalAssembly {
        &self.assembly
    }

    pub fn load(&self) -> &DVector<T> {
        &self.load
    }

    /// Assembles $K$, factorizes it and solves $K u = f$.
    pub fn solve(&self, local_matrices: &[Matrix4<T>]) -> Result<StateSolution<T>, BeamError> {
        let stiffness = self.assembly.assemble(local_matrices);
        let factorization = LuFactorization::factor(&stiffness)?;
        let state = factorization.solve(DVectorView::from(&self.load))?;
        Ok(StateSolution {
            stiffness,
            factorization,
            state,
        })
    }

    /// Evaluates the residual $K u - f$ for a candidate state `u`.
    pub fn apply(&self, local_matrices: &[Matrix4<T>], u: DVectorView<T>) -> Result<DVector<T>, BeamError> {
        BeamError::check_len("state vector", self.assembly.system_dim(), u.len())?;
        let stiffness = self.assembly.assemble(local_matrices);
        Ok(self
            .assembly
            .residual(&stiffness, u, DVectorView::from(&self.load)))
    }
}

/// The converged state of one evaluation, together with the operator that produced it.
///
/// The factorization is private to a single design point and is dropped with it.
#[derive(Debug, Clone)]
pub struct StateSolution<T: Real> {
    stiffness: CscMatrix<T>,
    factorization: LuFactorization<T>,
    state: DVector<T>,
}

impl<T: Real> StateSolution<T> {
    /// The assembled system matrix, which is also the Jacobian $\partial R / \partial u$.
    pub fn stiffness(&self) -> &CscMatrix<T> {
        &self.stiffness
    }

    pub fn factorization(&self) -> &LuFactorization<T> {
        &self.factorization
    }

    pub fn state(&self) -> &DVector<T> {
        &self.state
    }

    pub fn into_state(self) -> DVector<T> {
        self.state
    }

    /// Applies the inverse of $\partial R / \partial u$ (forward) or of its transpose (reverse).
    pub fn solve_linear(&self, rhs: DVectorView<T>, mode: DerivativeMode) -> Result<DVector<T>, BeamError> {
        match mode {
            DerivativeMode::Forward => self.factorization.solve(rhs),
            DerivativeMode::Reverse => self.factorization.solve_transposed(rhs),
        }
    }
}
