use crate::config::{BeamConfig, Load};
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::DVector;

/// Element heights drawn from a range well inside the default design bounds.
pub fn heights(num_elements: usize) -> impl Strategy<Value = DVector<f64>> {
    vec(0.1..2.0, num_elements).prop_map(DVector::from_vec)
}

/// Cantilever configurations with a tip load and moderate material and geometry parameters.
///
/// Parameters are kept within a few orders of magnitude of each other, otherwise the
/// stiffness matrix becomes too badly conditioned for tight tolerances.
pub fn cantilever_config(max_elements: usize) -> impl Strategy<Value = BeamConfig<f64>> {
    let youngs_modulus = 0.5..10.0;
    let length = 0.5..5.0;
    let width = 0.05..1.0;
    let magnitude = prop_oneof![-5.0..-0.1, 0.1..5.0];
    (1..=max_elements, youngs_modulus, length, width, magnitude).prop_map(|(n, e, l, b, magnitude)| {
        BeamConfig::cantilever(n, e, l, b).with_load(Load::Tip { magnitude })
    })
}

/// A configuration together with a matching height vector.
pub fn beam_design(max_elements: usize) -> impl Strategy<Value = (BeamConfig<f64>, DVector<f64>)> {
    cantilever_config(max_elements).prop_flat_map(|config| {
        let n = config.num_elements;
        (Just(config), heights(n))
    })
}

impl Arbitrary for BeamConfig<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        cantilever_config(16).boxed()
    }
}
