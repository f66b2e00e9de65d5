use crate::integration_tests::unit_cantilever;
use beamopt::transport::{handle, handle_assignments, handle_json, Assignments, Request, Response};
use matrixcompare::assert_scalar_eq;

#[test]
fn solve_then_apply_over_text_protocol() {
    let input = "
        command = solve
        num_elements = 5
        E = 1
        L = 1
        b = 0.1
        h = [1, 1, 1, 1, 1]
    ";
    let output = handle_assignments(input).unwrap();
    let solved = Assignments::parse(&output).unwrap();
    let u = solved.array("u").unwrap();
    assert_eq!(u.len(), 14);
    assert_scalar_eq!(u[10], -40.0, comp = abs, tol = 1e-9);
    assert_scalar_eq!(solved.number("compliance").unwrap(), 40.0, comp = abs, tol = 1e-9);
    assert_scalar_eq!(solved.number("volume").unwrap(), 0.1, comp = abs, tol = 1e-15);

    // Feed the solved state back and check that all residuals vanish
    let mut apply = Assignments::parse(input).unwrap();
    apply.insert("command", beamopt::transport::Value::Word("apply".to_string()));
    apply.insert("u", solved.get("u").unwrap().clone());
    apply.insert("compliance", solved.get("compliance").unwrap().clone());
    apply.insert("volume", solved.get("volume").unwrap().clone());

    let output = handle_assignments(&apply.to_string()).unwrap();
    let response = Response::from_assignments(&Assignments::parse(&output).unwrap()).unwrap();
    match response {
        Response::Applied {
            u_residuals,
            compliance_residual,
            volume_residual,
        } => {
            assert_eq!(u_residuals.len(), 14);
            assert!(u_residuals.iter().all(|r| r.abs() < 1e-9));
            assert!(compliance_residual.abs() < 1e-12);
            assert!(volume_residual.abs() < 1e-15);
        }
        other => panic!("Expected apply response, got {:?}", other),
    }
}

#[test]
fn apply_measures_output_discrepancies() {
    let config = unit_cantilever(5);
    let h = vec![1.0; 5];
    let solved = handle(&Request::Solve {
        config: config.clone(),
        h: h.clone(),
    })
    .unwrap();
    let u = match solved {
        Response::Solved { u, .. } => u,
        other => panic!("Expected solve response, got {:?}", other),
    };

    let applied = handle(&Request::Apply {
        config,
        h,
        u,
        compliance: 41.0,
        volume: 0.0,
    })
    .unwrap();
    match applied {
        Response::Applied {
            compliance_residual,
            volume_residual,
            ..
        } => {
            assert_scalar_eq!(compliance_residual, 1.0, comp = abs, tol = 1e-9);
            assert_scalar_eq!(volume_residual, -0.1, comp = abs, tol = 1e-15);
        }
        other => panic!("Expected apply response, got {:?}", other),
    }
}

#[test]
fn solve_over_json_protocol() {
    let input = r#"{
        "command": "solve",
        "config": {
            "num_elements": 2,
            "youngs_modulus": 1.0,
            "length": 1.0,
            "width": 0.1,
            "load": { "tip": { "magnitude": -1.0 } }
        },
        "h": [1.0, 1.0]
    }"#;
    let output = handle_json(input).unwrap();
    let response: Response = serde_json::from_str(&output).unwrap();
    match response {
        Response::Solved { u, compliance, volume } => {
            assert_eq!(u.len(), 8);
            assert_scalar_eq!(compliance, 40.0, comp = abs, tol = 1e-9);
            assert_scalar_eq!(volume, 0.1, comp = abs, tol = 1e-15);
        }
        other => panic!("Expected solve response, got {:?}", other),
    }

    assert!(handle_json("{ \"command\": \"solve\" }").is_err());
    assert!(handle_json("not json").is_err());
}
