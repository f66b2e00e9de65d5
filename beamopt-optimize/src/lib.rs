use nalgebra::RealField;

pub use nalgebra;

/// Finite difference approximations of gradients and Jacobians
pub mod calculus;
/// A reference optimality criteria driver for volume-constrained sizing problems
pub mod oc;

pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
