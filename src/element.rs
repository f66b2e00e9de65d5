//! Element-level quantities: second moment of area and the Euler-Bernoulli stiffness matrix.
//!
//! Element-local stiffness matrices are flattened into a single vector of length $16 N$
//! whenever they take part in a Jacobian product. Entry $(a, b)$ of element $e$ is stored
//! at position $16 e + 4 a + b$ (see [`local_index`]).
use crate::config::{max_num_elements, BeamConfig};
use crate::Real;
use nalgebra::{DVector, DVectorView, Matrix4};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use numeric_literals::replace_float_literals;

/// Position of entry `(a, b)` of element `element` in the flattened local stiffness vector.
#[inline(always)]
pub fn local_index(element: usize, a: usize, b: usize) -> usize {
    16 * element + 4 * a + b
}

/// Flattens element stiffness matrices into a vector of length $16 N$.
pub fn flatten_local_matrices<T: Real>(matrices: &[Matrix4<T>]) -> DVector<T> {
    let mut flat = DVector::zeros(16 * matrices.len());
    for (e, k) in matrices.iter().enumerate() {
        for a in 0..4 {
            for b in 0..4 {
                flat[local_index(e, a, b)] = k[(a, b)];
            }
        }
    }
    flat
}

/// Second moment of area of a rectangular cross-section of fixed width $b$,
/// $$ I_i = \frac{b h_i^3}{12}. $$
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MomentOfInertia<T> {
    width: T,
}

impl<T: Real> MomentOfInertia<T> {
    pub fn new(width: T) -> Self {
        Self { width }
    }

    pub fn from_config(config: &BeamConfig<T>) -> Self {
        Self::new(config.width)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn compute(&self, heights: DVectorView<T>) -> DVector<T> {
        heights.map(|h| self.width * h * h * h / 12.0)
    }

    /// Diagonal of the Jacobian $\partial I / \partial h$, with entries $b h_i^2 / 4$.
    ///
    /// Each element's moment of inertia depends only on its own height, so all off-diagonal
    /// entries vanish.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn partials(&self, heights: DVectorView<T>) -> DVector<T> {
        heights.map(|h| self.width * h * h / 4.0)
    }
}

/// Local stiffness matrices of uniform Euler-Bernoulli beam elements.
///
/// With element length $L_0$, the stiffness of element $i$ is $I_i C$, where
/// $$
/// C = \frac{E}{L_0^3}
/// \begin{pmatrix}
///     12 & 6 L_0 & -12 & 6 L_0 \\\\
///     6 L_0 & 4 L_0^2 & -6 L_0 & 2 L_0^2 \\\\
///     -12 & -6 L_0 & 12 & -6 L_0 \\\\
///     6 L_0 & 2 L_0^2 & -6 L_0 & 4 L_0^2
/// \end{pmatrix}
/// $$
/// acts on the (displacement, rotation) pairs of the element's two nodes. Since the map is
/// linear in $I$, its Jacobian is constant and computed once on construction.
#[derive(Clone, Debug)]
pub struct LocalStiffness<T: Real> {
    num_elements: usize,
    coefficients: Matrix4<T>,
    jacobian: CscMatrix<T>,
}

impl<T: Real> LocalStiffness<T> {
    /// Builds the coefficient matrix and the constant Jacobian for `num_elements` elements.
    ///
    /// # Panics
    ///
    /// Panics if `num_elements` exceeds [`max_num_elements`], the bound enforced by
    /// [`BeamConfig::validate`].
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn new(num_elements: usize, youngs_modulus: T, element_length: T) -> Self {
        let l0 = element_length;
        let l0_sq = l0 * l0;
        #[rustfmt::skip]
        let template = Matrix4::new(
            12.0,       6.0 * l0,    -12.0,      6.0 * l0,
            6.0 * l0,   4.0 * l0_sq, -6.0 * l0,  2.0 * l0_sq,
            -12.0,      -6.0 * l0,   12.0,       -6.0 * l0,
            6.0 * l0,   2.0 * l0_sq, -6.0 * l0,  4.0 * l0_sq,
        );
        let coefficients = template * (youngs_modulus / (l0_sq * l0));

        assert!(
            num_elements <= max_num_elements::<T>(),
            "Number of elements exceeds the addressable maximum"
        );
        let mut coo = CooMatrix::new(16 * num_elements, num_elements);
        for e in 0..num_elements {
            for a in 0..4 {
                for b in 0..4 {
                    coo.push(local_index(e, a, b), e, coefficients[(a, b)]);
                }
            }
        }

        Self {
            num_elements,
            coefficients,
            jacobian: CscMatrix::from(&coo),
        }
    }

    pub fn from_config(config: &BeamConfig<T>) -> Self {
        Self::new(config.num_elements, config.youngs_modulus, config.element_length())
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// The coefficient matrix $C$ shared by all elements.
    pub fn coefficients(&self) -> &Matrix4<T> {
        &self.coefficients
    }

    /// Scales the coefficient matrix by each element's moment of inertia.
    ///
    /// # Panics
    ///
    /// Panics if `moments_of_inertia` does not have one entry per element.
    pub fn compute(&self, moments_of_inertia: DVectorView<T>) -> Vec<Matrix4<T>> {
        assert_eq!(
            moments_of_inertia.len(),
            self.num_elements,
            "Need exactly one moment of inertia per element"
        );
        moments_of_inertia
            .iter()
            .map(|i| self.coefficients * *i)
            .collect()
    }

    /// The constant $16 N \times N$ Jacobian $\partial K_{\text{local}} / \partial I$.
    ///
    /// Column $i$ holds the flattened coefficient matrix in the rows belonging to element $i$.
    pub fn jacobian(&self) -> &CscMatrix<T> {
        &self.jacobian
    }
}
