use std::f64::consts::PI;

use dtm_core::precision::{
    check_hull_triangle_precision, check_quad_precision, fix_hull_triangle_precision,
    fix_quad_precision, FixKind,
};
use dtm_core::{DrapeMode, Mesh, Point, Tolerances, VertexId};
use proptest::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build(points: &[(f64, f64)]) -> Mesh {
    let mut mesh = Mesh::default();
    for &(x, y) in points {
        mesh.insert_point(x, y, x + y, false).unwrap();
    }
    mesh
}

/// Clockwise polygon with one corner in each of `n` equal angular sectors
/// around the origin, so it is simple and has positive area.
fn star(n: usize, spread: &[f64], radius: &[f64]) -> Vec<Point> {
    let sector = 2.0 * PI / n as f64;
    (0..n)
        .map(|k| {
            let angle = -(k as f64 * sector) - 0.1 - spread[k] * (sector - 0.2);
            Point::new(radius[k] * angle.cos(), radius[k] * angle.sin())
        })
        .collect()
}

fn tolerances() -> impl Strategy<Value = Tolerances> {
    prop_oneof![Just(1e-12), Just(1e-6), Just(1e-3)]
        .prop_map(|mt| Tolerances::new(mt * 1e3, mt * 1e3, mt).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_points_keep_a_valid_mesh(
        points in prop::collection::vec((0.0f64..100.0, 0.0f64..100.0), 3..40)
    ) {
        init_logger();
        let mesh = build(&points);
        prop_assert!(mesh.validate().is_ok());
        if mesh.is_triangulated() {
            prop_assert_eq!(
                2 * mesh.edge_count(),
                3 * mesh.triangle_count() + mesh.hull_size()
            );
        }
    }

    #[test]
    fn random_segments_leave_chains_of_edges(
        points in prop::collection::vec((0.0f64..100.0, 0.0f64..100.0), 6..30),
        pairs in prop::collection::vec((0usize..30, 0usize..30), 1..6)
    ) {
        init_logger();
        let mut mesh = build(&points);
        prop_assume!(mesh.is_triangulated());
        let n = mesh.vertex_count();
        for (i, j) in pairs {
            let (a, b) = (VertexId::new((i % n) as u32), VertexId::new((j % n) as u32));
            if a == b {
                continue;
            }
            match mesh.insert_segment(a, b, DrapeMode::Drape, false) {
                Ok(chain) => {
                    prop_assert_eq!(chain.first(), Some(&a));
                    prop_assert_eq!(chain.last(), Some(&b));
                    for pair in chain.windows(2) {
                        prop_assert!(mesh.ring_has_edge(pair[0], pair[1]));
                    }
                }
                Err(e) => prop_assert!(!e.is_fatal(), "fatal walk error: {}", e),
            }
            prop_assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn quad_repair_always_lands_somewhere_valid(
        spread in prop::array::uniform4(0.0f64..1.0),
        radius in prop::array::uniform4(0.5f64..2.0),
        x in -3.0f64..3.0,
        y in -3.0f64..3.0,
        tol in tolerances()
    ) {
        let corners = star(4, &spread, &radius);
        let quad = [corners[0], corners[1], corners[2], corners[3]];
        let p = Point::new(x, y);
        let (q, kind) = fix_quad_precision(&quad, p, &tol);
        match kind {
            FixKind::Recomputed => {
                prop_assert!(!check_quad_precision(&quad, q, tol.machine_tol));
            }
            FixKind::SnapToP2 => prop_assert_eq!(q, quad[1]),
            FixKind::SnapToP4 => prop_assert_eq!(q, quad[3]),
            FixKind::Unfixable => prop_assert!(false, "quad {:?} reported unfixable", quad),
        }
    }

    #[test]
    fn hull_triangle_repair_always_lands_somewhere_valid(
        spread in prop::array::uniform3(0.0f64..1.0),
        radius in prop::array::uniform3(0.5f64..2.0),
        t in -0.5f64..1.5,
        offset in -0.5f64..0.5,
        tol in tolerances()
    ) {
        let corners = star(3, &spread, &radius);
        let (a, b, c) = (corners[0], corners[1], corners[2]);
        // A point near the hull edge a -> b, on either side of it.
        let along = a.lerp(b, t);
        let p = Point::new(along.x + offset * (b.y - a.y), along.y - offset * (b.x - a.x));
        let (q, kind) = fix_hull_triangle_precision(a, b, c, p, &tol);
        match kind {
            FixKind::Recomputed => {
                prop_assert!(!check_hull_triangle_precision(a, b, c, q, tol.machine_tol));
            }
            FixKind::SnapToP2 => prop_assert_eq!(q, a),
            FixKind::SnapToP4 => prop_assert_eq!(q, b),
            FixKind::Unfixable => prop_assert!(false, "triangle {:?} reported unfixable", corners),
        }
    }
}
