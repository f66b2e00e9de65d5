use crate::integration_tests::unit_cantilever;
use beamopt::config::OptimizationTarget;
use beamopt::optimize::oc::{optimize, OptimalityCriteriaSettings, OptimizationError};
use beamopt::BeamModel;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;

fn settings_for(target: &OptimizationTarget<f64>) -> OptimalityCriteriaSettings<f64> {
    OptimalityCriteriaSettings {
        lower_bound: target.bounds.lower,
        upper_bound: target.bounds.upper,
        ..Default::default()
    }
}

#[test]
fn optimal_cantilever_heights() {
    let model = BeamModel::new(unit_cantilever(5)).unwrap();
    let target = OptimizationTarget {
        volume: 0.01,
        bounds: Default::default(),
    };
    let x0 = DVector::repeat(5, 0.1);
    let (uniform_compliance, _) = model.evaluate(&x0).unwrap();

    let result = optimize(&model, x0, target.volume, &settings_for(&target)).unwrap();

    // At the optimum h_i^4 is proportional to int_i M^2 dx
    let expected = DVector::from_vec(vec![
        0.14007896183542923,
        0.12362061125426134,
        0.10464749958348703,
        0.08152953505771465,
        0.05012339226910774,
    ]);
    assert_matrix_eq!(result.solution, expected, comp = abs, tol = 1e-6);
    assert_scalar_eq!(result.constraint, 0.01, comp = abs, tol = 1e-10);
    assert_scalar_eq!(result.objective, 25348.844077474012, comp = abs, tol = 1e-3);
    assert!(result.objective < uniform_compliance);
    assert!(result.iterations < 20);
}

#[test]
fn cantilever_scenario_from_unit_heights() {
    let model = BeamModel::new(unit_cantilever(5)).unwrap();
    let x0 = DVector::repeat(5, 1.0);
    let result = optimize(&model, x0, 0.01, &OptimalityCriteriaSettings::default()).unwrap();

    // Move limits make the first iterations infeasible, the final design is not
    assert_scalar_eq!(result.constraint, 0.01, comp = abs, tol = 1e-10);
    for i in 1..5 {
        assert!(result.solution[i] < result.solution[i - 1]);
    }
    assert_scalar_eq!(result.solution[0], 0.14007896183542923, comp = abs, tol = 1e-6);
}

#[test]
fn optimal_heights_respect_bounds() {
    let model = BeamModel::new(unit_cantilever(8)).unwrap();
    let settings = OptimalityCriteriaSettings {
        lower_bound: 0.09,
        upper_bound: 0.12,
        ..Default::default()
    };
    let result = optimize(&model, DVector::repeat(8, 0.1), 0.01, &settings).unwrap();

    assert!(result
        .solution
        .iter()
        .all(|h| *h >= 0.09 - 1e-12 && *h <= 0.12 + 1e-12));
    assert_scalar_eq!(result.constraint, 0.01, comp = abs, tol = 1e-10);
    // Heights decrease towards the free end
    for i in 1..8 {
        assert!(result.solution[i] <= result.solution[i - 1] + 1e-12);
    }
}

#[test]
fn optimize_reports_dimension_mismatch_and_iteration_limit() {
    let model = BeamModel::new(unit_cantilever(5)).unwrap();
    let settings = OptimalityCriteriaSettings::default();
    assert!(matches!(
        optimize(&model, DVector::repeat(3, 0.1), 0.01, &settings),
        Err(OptimizationError::DimensionMismatch { expected: 5, actual: 3 })
    ));

    let settings = OptimalityCriteriaSettings {
        max_iterations: Some(0),
        ..settings
    };
    assert!(matches!(
        optimize(&model, DVector::repeat(5, 0.1), 0.01, &settings),
        Err(OptimizationError::MaximumIterationsReached(0))
    ));
}
