use beamopt::element::{flatten_local_matrices, local_index, LocalStiffness, MomentOfInertia};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, DVectorView, Matrix4};

#[test]
fn moment_of_inertia_of_rectangular_section() {
    let moment = MomentOfInertia::new(0.1);
    let heights = DVector::from_vec(vec![1.0, 2.0, 0.5]);

    let i = moment.compute(DVectorView::from(&heights));
    assert_scalar_eq!(i[0], 1.0 / 120.0, comp = float);
    assert_scalar_eq!(i[1], 0.8 / 12.0, comp = float);
    assert_scalar_eq!(i[2], 0.0125 / 12.0, comp = float);

    let di_dh = moment.partials(DVectorView::from(&heights));
    assert_scalar_eq!(di_dh[0], 0.025, comp = float);
    assert_scalar_eq!(di_dh[1], 0.1, comp = float);
    assert_scalar_eq!(di_dh[2], 0.00625, comp = float);
}

#[test]
fn moment_of_inertia_partials_match_finite_differences() {
    let moment = MomentOfInertia::new(0.3);
    let heights = DVector::from_vec(vec![0.2, 0.7, 1.3, 4.0]);
    let step = 1e-6;

    let di_dh = moment.partials(DVectorView::from(&heights));
    for i in 0..heights.len() {
        let mut plus = heights.clone();
        let mut minus = heights.clone();
        plus[i] += step;
        minus[i] -= step;
        let i_plus = moment.compute(DVectorView::from(&plus));
        let i_minus = moment.compute(DVectorView::from(&minus));
        let fd = (i_plus[i] - i_minus[i]) / (2.0 * step);
        assert_scalar_eq!(di_dh[i], fd, comp = abs, tol = 1e-8);
    }
}

#[test]
fn coefficient_matrix_is_scaled_template() {
    // E / L0^3 = 2 / 0.125 = 16
    let stiffness = LocalStiffness::new(1, 2.0, 0.5);

    #[rustfmt::skip]
    let expected = Matrix4::new(
        192.0,  48.0, -192.0,  48.0,
        48.0,   16.0, -48.0,   8.0,
        -192.0, -48.0, 192.0, -48.0,
        48.0,   8.0,  -48.0,   16.0,
    );
    assert_matrix_eq!(*stiffness.coefficients(), expected, comp = float);
    assert_matrix_eq!(*stiffness.coefficients(), stiffness.coefficients().transpose());
}

#[test]
fn local_matrices_scale_with_moment_of_inertia() {
    let stiffness = LocalStiffness::new(3, 1.0, 0.25);
    let moments = DVector::from_vec(vec![1.0, 0.5, 2.0]);

    let matrices = stiffness.compute(DVectorView::from(&moments));
    assert_eq!(matrices.len(), 3);
    for (k, i) in matrices.iter().zip(moments.iter()) {
        assert_matrix_eq!(*k, stiffness.coefficients() * *i, comp = float);
    }
}

#[test]
fn local_stiffness_jacobian_is_block_structured() {
    let n = 4;
    let stiffness = LocalStiffness::new(n, 3.0, 0.5);
    let jacobian = stiffness.jacobian();
    assert_eq!(jacobian.nrows(), 16 * n);
    assert_eq!(jacobian.ncols(), n);
    assert_eq!(jacobian.nnz(), 16 * n);

    // Linear map, so applying the Jacobian to I must reproduce the flattened local matrices
    let moments = DVector::from_vec(vec![0.3, 1.0, 2.5, 0.01]);
    let flat: DVector<f64> = jacobian * &moments;
    let expected = flatten_local_matrices(&stiffness.compute(DVectorView::from(&moments)));
    assert_matrix_eq!(flat, expected, comp = float);
}

#[test]
fn local_index_layout() {
    assert_eq!(local_index(0, 0, 0), 0);
    assert_eq!(local_index(0, 0, 3), 3);
    assert_eq!(local_index(0, 1, 0), 4);
    assert_eq!(local_index(2, 3, 1), 32 + 12 + 1);

    let k = Matrix4::from_fn(|a, b| (4 * a + b) as f64);
    let flat = flatten_local_matrices(&[Matrix4::zeros(), k]);
    assert_eq!(flat.len(), 32);
    assert_eq!(flat[local_index(1, 2, 3)], 11.0);
    assert_eq!(flat[local_index(0, 2, 3)], 0.0);
}

#[test]
#[should_panic]
fn local_stiffness_of_wrong_number_of_moments_panics() {
    let stiffness = LocalStiffness::new(4, 1.0, 0.25);
    stiffness.compute(DVectorView::from(&DVector::repeat(3, 1.0)));
}
