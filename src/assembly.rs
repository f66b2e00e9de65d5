//! Global assembly of the clamped beam system and the residual $R(K_{\text{local}}, u) = K u - f$.
//!
//! Degrees of freedom are numbered two per node, $(w_j, \theta_j) \mapsto (2j, 2j + 1)$, so
//! element $e$ couples the global dofs $2e, \dots, 2e + 3$. Consecutive elements share one node,
//! and their contributions to that node's $2 \times 2$ block are *summed*. This is realized by
//! collecting all element entries as COO triplets and letting the conversion to CSC combine
//! duplicate entries.
//!
//! The clamped support at node 0 is not eliminated. Instead the system is augmented with two
//! Lagrange multipliers $\mu_0, \mu_1$, giving the saddle-point system
//! $$
//! \begin{pmatrix} K_{\text{phys}} & B^T \\\\ B & 0 \end{pmatrix}
//! \begin{pmatrix} u \\\\ \mu \end{pmatrix}
//! =
//! \begin{pmatrix} f \\\\ 0 \end{pmatrix},
//! \qquad B = \begin{pmatrix} 1 & 0 & 0 & \cdots \\\\ 0 & 1 & 0 & \cdots \end{pmatrix}.
//! $$
use crate::config::{BeamConfig, NUM_CONSTRAINTS};
use crate::element::local_index;
use crate::Real;
use nalgebra::{DVector, DVectorView, Matrix4, Vector4};
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Global dofs touched by the given element, in local order.
#[inline(always)]
pub fn element_dofs(element: usize) -> [usize; 4] {
    let offset = 2 * element;
    [offset, offset + 1, offset + 2, offset + 3]
}

/// Gathers the four global entries of `global` belonging to `element`.
pub fn gather_element<T: Real>(global: DVectorView<T>, element: usize) -> Vector4<T> {
    let [d0, d1, d2, d3] = element_dofs(element);
    Vector4::new(global[d0], global[d1], global[d2], global[d3])
}

/// Assembles element stiffness matrices into the augmented global system.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalAssembly {
    num_elements: usize,
}

impl GlobalAssembly {
    pub fn new(num_elements: usize) -> Self {
        Self { num_elements }
    }

    pub fn from_config<T: Real>(config: &BeamConfig<T>) -> Self {
        Self::new(config.num_elements)
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_physical_dofs(&self) -> usize {
        2 * (self.num_elements + 1)
    }

    pub fn system_dim(&self) -> usize {
        self.num_physical_dofs() + NUM_CONSTRAINTS
    }

    /// Collects all entries of the augmented system as (possibly duplicated) triplets.
    ///
    /// # Panics
    ///
    /// Panics if the number of local matrices differs from the number of elements.
    pub fn assemble_coo<T: Real>(&self, local_matrices: &[Matrix4<T>]) -> CooMatrix<T> {
        assert_eq!(
            local_matrices.len(),
            self.num_elements,
            "Need exactly one local stiffness matrix per element"
        );
        let n = self.system_dim();
        let mut coo = CooMatrix::new(n, n);

        for (e, k_e) in local_matrices.iter().enumerate() {
            let dofs = element_dofs(e);
            for (a, &row) in dofs.iter().enumerate() {
                for (b, &col) in dofs.iter().enumerate() {
                    coo.push(row, col, k_e[(a, b)]);
                }
            }
        }

        // Clamp displacement and rotation of node 0 through the constraint rows and columns
        let first_constraint = self.num_physical_dofs();
        for c in 0..NUM_CONSTRAINTS {
            coo.push(first_constraint + c, c, T::one());
            coo.push(c, first_constraint + c, T::one());
        }

        coo
    }

    /// Assembles the augmented global stiffness matrix.
    pub fn assemble<T: Real>(&self, local_matrices: &[Matrix4<T>]) -> CscMatrix<T> {
        CscMatrix::from(&self.assemble_coo(local_matrices))
    }

    /// Evaluates the residual $R = K u - f$.
    ///
    /// # Panics
    ///
    /// Panics if `u` or `f` does not match the dimension of the augmented system.
    pub fn residual<T: Real>(&self, stiffness: &CscMatrix<T>, u: DVectorView<T>, f: DVectorView<T>) -> DVector<T> {
        assert_eq!(u.len(), self.system_dim());
        assert_eq!(f.len(), self.system_dim());
        let mut r: DVector<T> = stiffness * u;
        r -= f;
        r
    }

    /// The Jacobian $\partial R / \partial K_{\text{local}}$ of size $(2N + 4) \times 16 N$.
    ///
    /// Assembly is linear in the local matrices, so the sensitivity of residual row $i$ to
    /// local entry $(a, b)$ of element $e$ is $u_{d_b}$ whenever $i = d_a$, where
    /// $d = $ [`element_dofs`]$(e)$.
    ///
    /// # Panics
    ///
    /// Panics if `u` does not match the dimension of the augmented system.
    pub fn residual_jacobian_wrt_local<T: Real>(&self, u: DVectorView<T>) -> CscMatrix<T> {
        assert_eq!(u.len(), self.system_dim());
        let mut coo = CooMatrix::new(self.system_dim(), 16 * self.num_elements);
        for e in 0..self.num_elements {
            let dofs = element_dofs(e);
            for (a, &row) in dofs.iter().enumerate() {
                for (b, &col) in dofs.iter().enumerate() {
                    coo.push(row, local_index(e, a, b), u[col]);
                }
            }
        }
        CscMatrix::from(&coo)
    }
}
