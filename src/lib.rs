//! Sizing of a clamped cantilever beam discretized with Euler-Bernoulli finite elements.
//!
//! The element heights $h$ are the design variables. Each evaluation runs the chain
//!
//! $$ h \rightarrow I \rightarrow K_{\text{local}} \rightarrow K \rightarrow u \rightarrow (c, V), $$
//!
//! where $u$ solves the augmented (saddle-point) system $K u = f$ and $c = f \cdot u$ is the
//! compliance. Exact total derivatives $dc/dh$ and $dV/dh$ are obtained by chaining the
//! analytic partials of every component through the implicit state equation, reusing the
//! LU factorization of $K$ in both the forward and the transposed direction.
pub mod assembly;
pub mod config;
pub mod element;
pub mod error;
pub mod model;
pub mod objectives;
pub mod solve;
pub mod transport;

pub mod optimize {
    pub use beamopt_optimize::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// Scalar types supported by the beam model.
///
/// In addition to the arithmetic used throughout the crate, the scalar must be supported by
/// `faer`, which factorizes the assembled sparse system.
pub trait Real: beamopt_optimize::Real + faer::RealField {}

impl<T: beamopt_optimize::Real + faer::RealField> Real for T {}

pub use config::{BeamConfig, Load};
pub use error::BeamError;
pub use model::{BeamEvaluation, BeamModel, DerivativeMode};
