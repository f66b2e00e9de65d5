//! Problem configuration, fixed for the lifetime of a [`BeamModel`](crate::BeamModel).
use crate::error::BeamError;
use crate::Real;
use nalgebra::DVector;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::mem;

/// Number of constraint equations used to clamp the first node.
pub const NUM_CONSTRAINTS: usize = 2;

/// The fixed external load acting on the beam.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Load<T> {
    /// A transverse point load at the free end of the beam.
    Tip { magnitude: T },
    /// An arbitrary nodal load vector, ordered as (displacement, rotation) per node.
    Nodal(Vec<T>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamConfig<T> {
    pub num_elements: usize,
    /// Young's modulus $E$.
    pub youngs_modulus: T,
    /// Total beam length $L$.
    pub length: T,
    /// Cross-section width $b$.
    pub width: T,
    pub load: Load<T>,
}

impl<T: Real> BeamConfig<T> {
    /// The cantilever case study: a downward unit load at the free end.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn cantilever(num_elements: usize, youngs_modulus: T, length: T, width: T) -> Self {
        Self {
            num_elements,
            youngs_modulus,
            length,
            width,
            load: Load::Tip { magnitude: -1.0 },
        }
    }

    pub fn with_load(self, load: Load<T>) -> Self {
        Self { load, ..self }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_elements + 1
    }

    /// Number of physical degrees of freedom (displacement and rotation per node).
    pub fn num_physical_dofs(&self) -> usize {
        2 * self.num_nodes()
    }

    /// Dimension of the augmented system, including the two clamping constraints.
    pub fn system_dim(&self) -> usize {
        self.num_physical_dofs() + NUM_CONSTRAINTS
    }

    /// Length $L_0 = L / N$ of a single element.
    pub fn element_length(&self) -> T {
        self.length / T::from_usize(self.num_elements).expect("usize must fit in T")
    }

    pub fn validate(&self) -> Result<(), BeamError> {
        if self.num_elements == 0 {
            return Err(BeamError::InvalidConfiguration(
                "number of elements must be positive".to_string(),
            ));
        }
        if self.num_elements > max_num_elements::<T>() {
            return Err(BeamError::InvalidConfiguration(format!(
                "number of elements must not exceed {}, got {}",
                max_num_elements::<T>(),
                self.num_elements
            )));
        }

        let positive = |name: &str, value: T| {
            if value.is_finite() && value > T::zero() {
                Ok(())
            } else {
                Err(BeamError::InvalidConfiguration(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        };
        positive("Young's modulus", self.youngs_modulus)?;
        positive("length", self.length)?;
        positive("width", self.width)?;

        match &self.load {
            Load::Tip { magnitude } if !magnitude.is_finite() => Err(BeamError::InvalidConfiguration(format!(
                "tip load must be finite, got {}",
                magnitude
            ))),
            Load::Nodal(values) if values.len() != self.num_physical_dofs() => {
                Err(BeamError::InvalidConfiguration(format!(
                    "load vector must have length {} (2 per node), got {}",
                    self.num_physical_dofs(),
                    values.len()
                )))
            }
            Load::Nodal(values) => match values.iter().position(|value| !value.is_finite()) {
                Some(index) => Err(BeamError::InvalidConfiguration(format!(
                    "load vector entry {} must be finite, got {}",
                    index, values[index]
                ))),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// The load vector over the physical degrees of freedom.
    pub fn physical_load_vector(&self) -> DVector<T> {
        match &self.load {
            Load::Tip { magnitude } => {
                let mut f = DVector::zeros(self.num_physical_dofs());
                // Transverse displacement of the last node
                f[2 * self.num_elements] = *magnitude;
                f
            }
            Load::Nodal(values) => DVector::from_column_slice(values),
        }
    }

    /// The load vector padded with zeros for the constraint equations.
    pub fn augmented_load_vector(&self) -> DVector<T> {
        let f = self.physical_load_vector();
        let n = f.len();
        f.resize_vertically(n + NUM_CONSTRAINTS, T::zero())
    }
}

/// Largest element count whose local stiffness Jacobian, with $16 N$ entries of a value and
/// two indices each, stays within the addressable allocation size.
pub fn max_num_elements<T>() -> usize {
    let bytes_per_entry = 2 * mem::size_of::<usize>() + mem::size_of::<T>();
    isize::MAX as usize / (16 * bytes_per_entry)
}

/// Box constraints on the element heights.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignBounds<T> {
    pub lower: T,
    pub upper: T,
}

impl<T: Real> Default for DesignBounds<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self { lower: 0.01, upper: 10.0 }
    }
}

/// The resource constraint a sizing driver should satisfy.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTarget<T> {
    pub volume: T,
    pub bounds: DesignBounds<T>,
}
