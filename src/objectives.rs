//! Scalar outputs of the beam model: compliance (objective) and volume (constraint).
use crate::config::{BeamConfig, NUM_CONSTRAINTS};
use crate::Real;
use nalgebra::{DVector, DVectorView};

/// Compliance $c = f \cdot u$ over the physical degrees of freedom.
///
/// The Lagrange multipliers at the tail of the augmented state never enter the compliance.
#[derive(Debug, Clone, PartialEq)]
pub struct Compliance<T: Real> {
    load: DVector<T>,
}

impl<T: Real> Compliance<T> {
    /// Creates the compliance functional for the given *physical* load vector.
    pub fn new(load: DVector<T>) -> Self {
        Self { load }
    }

    pub fn from_config(config: &BeamConfig<T>) -> Self {
        Self::new(config.physical_load_vector())
    }

    pub fn num_physical_dofs(&self) -> usize {
        self.load.len()
    }

    /// Computes the compliance from the physical displacements (the first $2(N + 1)$ entries
    /// of the state).
    ///
    /// # Panics
    ///
    /// Panics if `displacements` does not have one entry per physical degree of freedom.
    pub fn compute(&self, displacements: DVectorView<T>) -> T {
        assert_eq!(displacements.len(), self.load.len());
        self.load.dot(&displacements)
    }

    /// The constant partial $\partial c / \partial u_{\text{phys}} = f$.
    pub fn partials(&self) -> &DVector<T> {
        &self.load
    }

    /// The partial with respect to the full augmented state, zero on the multipliers.
    pub fn augmented_partials(&self) -> DVector<T> {
        self.load
            .clone()
            .resize_vertically(self.load.len() + NUM_CONSTRAINTS, T::zero())
    }
}

/// Volume $V = \sum_i h_i b L_0$.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T: Real> {
    // Linear in h, so the gradient never changes
    partials: DVector<T>,
}

impl<T: Real> Volume<T> {
    pub fn new(num_elements: usize, width: T, element_length: T) -> Self {
        Self {
            partials: DVector::repeat(num_elements, width * element_length),
        }
    }

    pub fn from_config(config: &BeamConfig<T>) -> Self {
        Self::new(config.num_elements, config.width, config.element_length())
    }

    /// # Panics
    ///
    /// Panics if `heights` does not have one entry per element.
    pub fn compute(&self, heights: DVectorView<T>) -> T {
        assert_eq!(heights.len(), self.partials.len());
        self.partials.dot(&heights)
    }

    /// The constant gradient $\partial V / \partial h_i = b L_0$.
    pub fn partials(&self) -> &DVector<T> {
        &self.partials
    }
}
