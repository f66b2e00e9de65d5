use beamopt::BeamConfig;

mod optimization;
mod transport;

/// The cantilever case study with unit stiffness and length and a square-ish cross-section.
fn unit_cantilever(num_elements: usize) -> BeamConfig<f64> {
    BeamConfig::cantilever(num_elements, 1.0, 1.0, 0.1)
}
