//! The evaluation contract consumed by optimization drivers.
use crate::assembly::GlobalAssembly;
use crate::config::BeamConfig;
use crate::element::{LocalStiffness, MomentOfInertia};
use crate::error::BeamError;
use crate::objectives::{Compliance, Volume};
use crate::solve::{LinearStateSolve, StateSolution};
use crate::Real;
use beamopt_optimize::calculus::try_approximate_gradient_fd;
use beamopt_optimize::oc::DesignProblem;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, DVectorView, Matrix4};
use rayon::prelude::*;
use std::error::Error;

pub use crate::solve::DerivativeMode;

/// Cantilever beam model mapping element heights to compliance and volume.
///
/// The model holds only read-only data fixed at construction (parameters, load vector and the
/// constant Jacobians), so it can be shared between threads. All state belonging to a single
/// design point lives in a [`BeamEvaluation`].
#[derive(Debug, Clone)]
pub struct BeamModel<T: Real> {
    config: BeamConfig<T>,
    moment_of_inertia: MomentOfInertia<T>,
    local_stiffness: LocalStiffness<T>,
    state_solve: LinearStateSolve<T>,
    compliance: Compliance<T>,
    volume: Volume<T>,
}

impl<T: Real> BeamModel<T> {
    pub fn new(config: BeamConfig<T>) -> Result<Self, BeamError> {
        config.validate()?;
        let assembly = GlobalAssembly::from_config(&config);
        Ok(Self {
            moment_of_inertia: MomentOfInertia::from_config(&config),
            local_stiffness: LocalStiffness::from_config(&config),
            state_solve: LinearStateSolve::new(assembly, config.augmented_load_vector()),
            compliance: Compliance::from_config(&config),
            volume: Volume::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &BeamConfig<T> {
        &self.config
    }

    pub fn num_elements(&self) -> usize {
        self.config.num_elements
    }

    pub fn moment_of_inertia(&self) -> &MomentOfInertia<T> {
        &self.moment_of_inertia
    }

    pub fn local_stiffness(&self) -> &LocalStiffness<T> {
        &self.local_stiffness
    }

    pub fn state_solve(&self) -> &LinearStateSolve<T> {
        &self.state_solve
    }

    pub fn compliance(&self) -> &Compliance<T> {
        &self.compliance
    }

    pub fn volume(&self) -> &Volume<T> {
        &self.volume
    }

    fn check_heights(&self, heights: &DVectorView<T>) -> Result<(), BeamError> {
        BeamError::check_len("height vector", self.num_elements(), heights.len())
    }

    fn local_matrices(&self, heights: DVectorView<T>) -> (DVector<T>, Vec<Matrix4<T>>) {
        let moments_of_inertia = self.moment_of_inertia.compute(heights);
        let local_matrices = self
            .local_stiffness
            .compute(DVectorView::from(&moments_of_inertia));
        (moments_of_inertia, local_matrices)
    }

    /// Runs the full forward chain at the given heights.
    pub fn evaluate_at<'b>(&self, heights: impl Into<DVectorView<'b, T>>) -> Result<BeamEvaluation<'_, T>, BeamError> {
        let heights = heights.into();
        self.check_heights(&heights)?;
        let (moments_of_inertia, local_matrices) = self.local_matrices(heights);
        let solution = self.state_solve.solve(&local_matrices)?;
        let evaluation = BeamEvaluation {
            model: self,
            heights: heights.clone_owned(),
            moments_of_inertia,
            local_matrices,
            solution,
        };
        debug!(
            "Evaluated beam with {} elements: compliance = {}, volume = {}",
            self.num_elements(),
            evaluation.compliance(),
            evaluation.volume()
        );
        Ok(evaluation)
    }

    /// Returns `(compliance, volume)` at the given heights.
    pub fn evaluate<'b>(&self, heights: impl Into<DVectorView<'b, T>>) -> Result<(T, T), BeamError> {
        let evaluation = self.evaluate_at(heights)?;
        Ok((evaluation.compliance(), evaluation.volume()))
    }

    /// Returns `(dc/dh, dV/dh)` at the given heights, using the adjoint method.
    pub fn evaluate_gradients<'b>(
        &self,
        heights: impl Into<DVectorView<'b, T>>,
    ) -> Result<(DVector<T>, DVector<T>), BeamError> {
        self.evaluate_gradients_with_mode(heights, DerivativeMode::Reverse)
    }

    pub fn evaluate_gradients_with_mode<'b>(
        &self,
        heights: impl Into<DVectorView<'b, T>>,
        mode: DerivativeMode,
    ) -> Result<(DVector<T>, DVector<T>), BeamError> {
        self.evaluate_at(heights)?.gradients(mode)
    }

    /// Solves the state equation and returns the augmented state vector.
    pub fn solve<'b>(&self, heights: impl Into<DVectorView<'b, T>>) -> Result<DVector<T>, BeamError> {
        let heights = heights.into();
        self.check_heights(&heights)?;
        let (_, local_matrices) = self.local_matrices(heights);
        Ok(self.state_solve.solve(&local_matrices)?.into_state())
    }

    /// Evaluates the state residual $K(h) u - f$ for a candidate state.
    pub fn apply_residual<'b, 'c>(
        &self,
        heights: impl Into<DVectorView<'b, T>>,
        u: impl Into<DVectorView<'c, T>>,
    ) -> Result<DVector<T>, BeamError> {
        let heights = heights.into();
        self.check_heights(&heights)?;
        let (_, local_matrices) = self.local_matrices(heights);
        self.state_solve.apply(&local_matrices, u.into())
    }

    /// Evaluates many design points in parallel.
    ///
    /// Every design point gets its own assembly and factorization.
    pub fn evaluate_batch(&self, designs: &[DVector<T>]) -> Vec<Result<(T, T), BeamError>> {
        designs
            .par_iter()
            .map(|heights| self.evaluate(heights))
            .collect()
    }

    /// Compares the analytic total derivatives with central finite differences of step `step`.
    pub fn check_totals<'b>(
        &self,
        heights: impl Into<DVectorView<'b, T>>,
        step: T,
    ) -> Result<TotalsCheck<T>, BeamError> {
        let heights = heights.into();
        let (dc_dh, dv_dh) = self.evaluate_gradients(heights)?;

        let mut x = heights.clone_owned();
        let dc_dh_fd = try_approximate_gradient_fd(|h| self.evaluate(h).map(|(c, _)| c), &mut x, step)?;
        let dv_dh_fd = try_approximate_gradient_fd(|h| self.evaluate(h).map(|(_, v)| v), &mut x, step)?;

        let check = TotalsCheck {
            compliance: GradientComparison::new(dc_dh, dc_dh_fd),
            volume: GradientComparison::new(dv_dh, dv_dh_fd),
        };
        debug!(
            "Total derivative check: compliance rel. error {}, volume rel. error {}",
            check.compliance.relative_error, check.volume.relative_error
        );
        Ok(check)
    }
}

/// All quantities computed for a single design point.
///
/// The LU factorization of the stiffness matrix is owned by this value and reused by every
/// derivative computation at this design point.
#[derive(Debug, Clone)]
pub struct BeamEvaluation<'a, T: Real> {
    model: &'a BeamModel<T>,
    heights: DVector<T>,
    moments_of_inertia: DVector<T>,
    local_matrices: Vec<Matrix4<T>>,
    solution: StateSolution<T>,
}

impl<'a, T: Real> BeamEvaluation<'a, T> {
    pub fn heights(&self) -> &DVector<T> {
        &self.heights
    }

    pub fn moments_of_inertia(&self) -> &DVector<T> {
        &self.moments_of_inertia
    }

    pub fn local_matrices(&self) -> &[Matrix4<T>] {
        &self.local_matrices
    }

    pub fn solution(&self) -> &StateSolution<T> {
        &self.solution
    }

    /// The augmented state: nodal displacements and rotations followed by the two multipliers.
    pub fn state(&self) -> &DVector<T> {
        self.solution.state()
    }

    /// Nodal displacements and rotations, without the constraint multipliers.
    pub fn displacements(&self) -> DVectorView<T> {
        let n = self.model.compliance.num_physical_dofs();
        self.state().rows(0, n)
    }

    pub fn compliance(&self) -> T {
        self.model.compliance.compute(self.displacements())
    }

    pub fn volume(&self) -> T {
        self.model.volume.compute(DVectorView::from(&self.heights))
    }

    /// The residual $K u - f$ at the converged state.
    pub fn residual(&self) -> DVector<T> {
        self.model.state_solve.assembly().residual(
            self.solution.stiffness(),
            DVectorView::from(self.state()),
            DVectorView::from(self.model.state_solve.load()),
        )
    }

    /// The partial $\partial R / \partial h$, chained as
    /// $\partial R / \partial K_{\text{local}} \cdot \partial K_{\text{local}} / \partial I \cdot \partial I / \partial h$.
    pub fn residual_partials_wrt_heights(&self) -> DMatrix<T> {
        let model = self.model;
        let dr_dk = model
            .state_solve
            .assembly()
            .residual_jacobian_wrt_local(DVectorView::from(self.state()));
        let dr_di = &dr_dk * model.local_stiffness.jacobian();
        let di_dh = model
            .moment_of_inertia
            .partials(DVectorView::from(&self.heights));

        let mut dr_dh = DMatrix::from(&dr_di);
        for (mut column, scale) in dr_dh.column_iter_mut().zip(di_dh.iter()) {
            column *= *scale;
        }
        dr_dh
    }

    /// Total derivative $dc / dh$ of the compliance.
    pub fn compliance_gradient(&self, mode: DerivativeMode) -> Result<DVector<T>, BeamError> {
        let model = self.model;
        let dc_du = model.compliance.augmented_partials();

        match mode {
            DerivativeMode::Forward => {
                // du/dh = -K^{-1} dR/dh
                let du_dh = -self
                    .solution
                    .factorization()
                    .solve_columns(&self.residual_partials_wrt_heights())?;
                Ok(du_dh.tr_mul(&dc_du))
            }
            DerivativeMode::Reverse => {
                // dc/dh = -lambda^T dR/dh with K^T lambda = dc/du
                let lambda = self
                    .solution
                    .solve_linear(DVectorView::from(&dc_du), DerivativeMode::Reverse)?;
                let dr_dk = model
                    .state_solve
                    .assembly()
                    .residual_jacobian_wrt_local(DVectorView::from(self.state()));
                let lambda_dr_dk: DVector<T> = &dr_dk.transpose() * &lambda;
                let lambda_dr_di: DVector<T> = &model.local_stiffness.jacobian().transpose() * &lambda_dr_dk;
                let di_dh = model
                    .moment_of_inertia
                    .partials(DVectorView::from(&self.heights));
                Ok(-lambda_dr_di.component_mul(&di_dh))
            }
        }
    }

    /// Total derivative $dV / dh$ of the volume, which only depends on $h$ directly.
    pub fn volume_gradient(&self) -> DVector<T> {
        self.model.volume.partials().clone()
    }

    pub fn gradients(&self, mode: DerivativeMode) -> Result<(DVector<T>, DVector<T>), BeamError> {
        Ok((self.compliance_gradient(mode)?, self.volume_gradient()))
    }

    /// The $2 \times N$ Jacobian of `(compliance, volume)` with respect to the heights.
    pub fn total_jacobian(&self, mode: DerivativeMode) -> Result<DMatrix<T>, BeamError> {
        let (dc_dh, dv_dh) = self.gradients(mode)?;
        Ok(DMatrix::from_rows(&[dc_dh.transpose(), dv_dh.transpose()]))
    }
}

/// Analytic versus finite difference gradient of a single output.
#[derive(Debug, Clone)]
pub struct GradientComparison<T: Real> {
    pub analytic: DVector<T>,
    pub finite_difference: DVector<T>,
    /// $\| g - g_{fd} \|_\infty$
    pub absolute_error: T,
    /// $\| g - g_{fd} \|_\infty / \| g_{fd} \|_\infty$, or the absolute error if $g_{fd} = 0$.
    pub relative_error: T,
}

impl<T: Real> GradientComparison<T> {
    fn new(analytic: DVector<T>, finite_difference: DVector<T>) -> Self {
        let absolute_error = (&analytic - &finite_difference).amax();
        let scale = finite_difference.amax();
        let relative_error = if scale > T::zero() {
            absolute_error / scale
        } else {
            absolute_error
        };
        Self {
            analytic,
            finite_difference,
            absolute_error,
            relative_error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TotalsCheck<T: Real> {
    pub compliance: GradientComparison<T>,
    pub volume: GradientComparison<T>,
}

impl<T: Real> TotalsCheck<T> {
    /// Whether both relative errors are within `tolerance`. Logs a warning otherwise.
    pub fn passes(&self, tolerance: T) -> bool {
        let pass = self.compliance.relative_error <= tolerance && self.volume.relative_error <= tolerance;
        if !pass {
            warn!(
                "Total derivatives disagree with finite differences: compliance {}, volume {} (tolerance {})",
                self.compliance.relative_error, self.volume.relative_error, tolerance
            );
        }
        pass
    }
}

impl<T: Real> DesignProblem<T> for BeamModel<T> {
    fn num_variables(&self) -> usize {
        self.num_elements()
    }

    fn evaluate(&self, x: DVectorView<T>) -> Result<(T, T), Box<dyn Error + Send + Sync>> {
        Ok(BeamModel::evaluate(self, x)?)
    }

    fn evaluate_gradients(&self, x: DVectorView<T>) -> Result<(DVector<T>, DVector<T>), Box<dyn Error + Send + Sync>> {
        Ok(BeamModel::evaluate_gradients(self, x)?)
    }
}
