use dtm_core::{Mesh, TinConfig, TinError, Tolerances};

#[test]
fn config_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tin.json");
    let cfg = TinConfig {
        tolerances: Tolerances::new(1e-3, 1e-4, 1e-10).unwrap(),
        max_vertices: Some(1000),
        validate_after_edit: true,
    };
    cfg.save(&path).unwrap();
    assert_eq!(TinConfig::load(&path).unwrap(), cfg);
}

#[test]
fn missing_fields_take_defaults() {
    let cfg = TinConfig::from_json_str(r#"{ "max_vertices": 10 }"#).unwrap();
    assert_eq!(cfg.max_vertices, Some(10));
    assert_eq!(cfg.tolerances, Tolerances::default());
    assert!(!cfg.validate_after_edit);
}

#[test]
fn bad_tolerances_are_rejected() {
    let json = r#"{ "tolerances": { "point_point_tol": 1e-9, "point_line_tol": 1e-3 } }"#;
    assert!(matches!(
        TinConfig::from_json_str(json),
        Err(TinError::InvalidTolerances(_))
    ));
    let cfg = TinConfig {
        tolerances: Tolerances {
            point_point_tol: 1e-6,
            point_line_tol: 1e-6,
            machine_tol: -1.0,
        },
        ..TinConfig::default()
    };
    assert!(Mesh::new(cfg).is_err());
}

#[test]
fn vertex_cap_is_enforced() {
    let mut mesh = Mesh::new(TinConfig {
        max_vertices: Some(3),
        ..TinConfig::default()
    })
    .unwrap();
    mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
    mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
    mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
    let err = mesh.insert_point(1.0, 1.0, 0.0, false).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(mesh.vertex_count(), 3);
    mesh.validate().unwrap();
}
