use dtm_core::{DrapeMode, Mesh, Point3, Tin, TinConfig, VertexId};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A U-shaped surface opening to the north, two units deep.
fn u_shape() -> Mesh {
    let tin = Tin {
        vertices: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(2.0, 3.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
        ],
        triangles: vec![[0, 1, 4], [0, 4, 5], [0, 5, 7], [5, 6, 7], [1, 2, 4], [2, 3, 4]],
    };
    Mesh::from_tin(&tin, TinConfig::default()).unwrap()
}

#[test]
fn u_shape_loads() {
    init_logger();
    let mesh = u_shape();
    assert_eq!(mesh.triangle_count(), 6);
    assert_eq!(mesh.hull_size(), 8);
    mesh.validate().unwrap();
}

#[test]
fn segment_across_the_notch_fills_it() {
    init_logger();
    let mut mesh = u_shape();
    let from = VertexId::new(6);
    let to = VertexId::new(3);
    let chain = mesh.insert_segment(from, to, DrapeMode::Drape, false).unwrap();
    assert_eq!(chain, vec![from, to]);
    assert!(mesh.ring_has_edge(from, to));
    assert_eq!(mesh.triangle_count(), 8);
    assert_eq!(mesh.hull_size(), 6);
    assert!(!mesh.is_hull_vertex(VertexId::new(4)));
    assert!(!mesh.is_hull_vertex(VertexId::new(5)));
    mesh.validate().unwrap();
}

#[test]
fn segment_reentering_through_a_hull_edge_adds_a_vertex() {
    init_logger();
    let mut mesh = u_shape();
    let q = mesh.insert_point(2.5, 2.5, 0.0, false).unwrap();
    let before = mesh.vertex_count();
    let chain = mesh
        .insert_segment(VertexId::new(6), q, DrapeMode::Drape, false)
        .unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(mesh.vertex_count(), before + 1);
    let r = mesh.vertex(chain[1]).unwrap();
    assert!((r.x - 2.0).abs() < 1e-9);
    assert!((r.y - 8.0 / 3.0).abs() < 1e-9);
    for pair in chain.windows(2) {
        assert!(mesh.ring_has_edge(pair[0], pair[1]));
    }
    assert_eq!(mesh.hull_size(), 7);
    mesh.validate().unwrap();
}

#[test]
fn walk_from_inside_the_notch_is_external() {
    init_logger();
    let mut mesh = u_shape();
    let crossing = mesh
        .get_next_crossing(VertexId::new(6), VertexId::new(3), None, Default::default())
        .unwrap();
    assert!(matches!(crossing, dtm_core::Crossing::External { .. }));
    mesh.validate().unwrap();
}
