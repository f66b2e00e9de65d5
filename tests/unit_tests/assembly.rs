use beamopt::assembly::{element_dofs, gather_element, GlobalAssembly};
use beamopt::element::{flatten_local_matrices, LocalStiffness, MomentOfInertia};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView, Matrix4};
use proptest::prelude::*;

fn arbitrary_local_matrices(num_elements: usize) -> Vec<Matrix4<f64>> {
    (0..num_elements)
        .map(|e| Matrix4::from_fn(|a, b| (1 + e) as f64 * 10.0 + (4 * a + b) as f64))
        .collect()
}

#[test]
fn element_dofs_share_one_node() {
    assert_eq!(element_dofs(0), [0, 1, 2, 3]);
    assert_eq!(element_dofs(1), [2, 3, 4, 5]);
    assert_eq!(element_dofs(4), [8, 9, 10, 11]);

    let global = DVector::from_fn(8, |i, _| i as f64);
    let local = gather_element(DVectorView::from(&global), 2);
    assert_eq!(local.as_slice(), &[4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn assembly_dimensions() {
    let assembly = GlobalAssembly::new(5);
    assert_eq!(assembly.num_elements(), 5);
    assert_eq!(assembly.num_physical_dofs(), 12);
    assert_eq!(assembly.system_dim(), 14);
}

#[test]
fn shared_node_contributions_are_summed() {
    let assembly = GlobalAssembly::new(2);
    let local = arbitrary_local_matrices(2);
    let k = DMatrix::from(&assembly.assemble(&local));
    assert_eq!(k.shape(), (8, 8));

    let mut expected = DMatrix::zeros(8, 8);
    for (e, k_e) in local.iter().enumerate() {
        let dofs = element_dofs(e);
        for a in 0..4 {
            for b in 0..4 {
                expected[(dofs[a], dofs[b])] += k_e[(a, b)];
            }
        }
    }
    expected[(6, 0)] = 1.0;
    expected[(0, 6)] = 1.0;
    expected[(7, 1)] = 1.0;
    expected[(1, 7)] = 1.0;

    assert_matrix_eq!(k, expected);
    // The node shared by both elements receives entries from both
    assert_eq!(k[(2, 2)], local[0][(2, 2)] + local[1][(0, 0)]);
    assert_eq!(k[(3, 2)], local[0][(3, 2)] + local[1][(1, 0)]);
}

#[test]
fn constraint_block_is_zero() {
    let assembly = GlobalAssembly::new(3);
    let k = DMatrix::from(&assembly.assemble(&arbitrary_local_matrices(3)));
    let n_phys = assembly.num_physical_dofs();
    assert_matrix_eq!(k.view((n_phys, n_phys), (2, 2)), DMatrix::<f64>::zeros(2, 2));
    // Only the first node is coupled to the constraints
    assert_matrix_eq!(k.view((n_phys, 2), (2, n_phys - 2)), DMatrix::<f64>::zeros(2, n_phys - 2));
}

#[test]
fn assembled_beam_stiffness_is_symmetric() {
    let n = 6;
    let stiffness = LocalStiffness::new(n, 210.0, 0.1);
    let moments = DVector::from_fn(n, |i, _| 0.5 + i as f64);
    let local = stiffness.compute(DVectorView::from(&moments));
    let k = DMatrix::from(&GlobalAssembly::new(n).assemble(&local));
    assert_matrix_eq!(k, k.transpose());
}

#[test]
fn residual_of_assembled_system() {
    let assembly = GlobalAssembly::new(2);
    let local = arbitrary_local_matrices(2);
    let k = assembly.assemble(&local);
    let u = DVector::from_fn(8, |i, _| 1.0 / (1.0 + i as f64));
    let f = DVector::from_fn(8, |i, _| i as f64);

    let r = assembly.residual(&k, DVectorView::from(&u), DVectorView::from(&f));
    let expected = DMatrix::from(&k) * &u - &f;
    assert_matrix_eq!(r, expected, comp = float);
}

#[test]
fn residual_jacobian_wrt_local_matches_linear_part_of_residual() {
    let n = 3;
    let assembly = GlobalAssembly::new(n);
    let local = arbitrary_local_matrices(n);
    let u = DVector::from_fn(assembly.system_dim(), |i, _| (i as f64 - 3.5) * 0.25);

    let jacobian = assembly.residual_jacobian_wrt_local(DVectorView::from(&u));
    assert_eq!(jacobian.nrows(), assembly.system_dim());
    assert_eq!(jacobian.ncols(), 16 * n);

    // R is linear in the local matrices, up to the constant constraint entries
    let k = DMatrix::from(&assembly.assemble(&local));
    let k_constraints = DMatrix::from(&assembly.assemble(&vec![Matrix4::<f64>::zeros(); n]));
    let expected = (k - k_constraints) * &u;
    let actual: DVector<f64> = &jacobian * &flatten_local_matrices(&local);
    assert_matrix_eq!(actual, expected, comp = abs, tol = 1e-10);
}

proptest! {
    #[test]
    fn assembled_stiffness_is_symmetric_for_any_design(
        (config, h) in beamopt::proptest::beam_design(12)
    ) {
        let moments = MomentOfInertia::from_config(&config).compute(DVectorView::from(&h));
        let local = LocalStiffness::from_config(&config).compute(DVectorView::from(&moments));
        let assembly = GlobalAssembly::from_config(&config);
        let k = DMatrix::from(&assembly.assemble(&local));

        let n_phys = assembly.num_physical_dofs();
        let k_phys = k.view((0, 0), (n_phys, n_phys)).clone_owned();
        assert_matrix_eq!(k_phys, k_phys.transpose(), comp = float);
        assert_matrix_eq!(k, k.transpose(), comp = float);
    }
}
