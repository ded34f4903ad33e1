//! Point location against the current triangulation.

use crate::geometry::{distance, distance_from_line, point_in_triangle, Point};
use crate::mesh::{Mesh, VertexId};

/// Where a query point falls in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Within `point_point_tol` of an existing vertex.
    AtVertex(VertexId),
    /// Within `point_line_tol` of an interior edge.
    OnEdge(VertexId, VertexId),
    /// Within `point_line_tol` of a hull edge, oriented so that
    /// `hull_next(a) == b`.
    OnHullEdge(VertexId, VertexId),
    /// Inside the clockwise triangle.
    InTriangle(VertexId, VertexId, VertexId),
    Outside,
}

impl Mesh {
    /// Classifies `p` against the mesh. Vertices are tested first, then
    /// edges, then triangles. Exact ties go to the lower vertex id.
    pub fn locate(&self, p: Point) -> Location {
        let tol = self.tolerances();
        if let Some(v) = self.nearest_vertex(p, tol.point_point_tol, true) {
            return Location::AtVertex(v);
        }
        if let Some((a, b)) = self.nearest_edge(p, tol.point_line_tol) {
            if self.hull_next(a) == Some(b) {
                return Location::OnHullEdge(a, b);
            }
            if self.hull_next(b) == Some(a) {
                return Location::OnHullEdge(b, a);
            }
            return Location::OnEdge(a, b);
        }
        for [a, b, c] in self.triangles() {
            if point_in_triangle(self.xy(a), self.xy(b), self.xy(c), p) {
                return Location::InTriangle(a, b, c);
            }
        }
        Location::Outside
    }

    /// Closest vertex within `tol` of `p`. With `connected_only` isolated
    /// vertices are skipped.
    pub fn nearest_vertex(&self, p: Point, tol: f64, connected_only: bool) -> Option<VertexId> {
        let mut best: Option<(f64, VertexId)> = None;
        for v in self.vertex_ids() {
            if connected_only && self.nodes[v.index()].ring_head.is_none() {
                continue;
            }
            let d = distance(self.xy(v), p);
            if d > tol {
                continue;
            }
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, v));
            }
        }
        best.map(|(_, v)| v)
    }

    /// Closest edge within `tol` of `p` whose foot point falls strictly
    /// between its endpoints.
    fn nearest_edge(&self, p: Point, tol: f64) -> Option<(VertexId, VertexId)> {
        let mut best: Option<(f64, VertexId, VertexId)> = None;
        for (a, b) in self.edges() {
            let d = distance_from_line(self.xy(a), self.xy(b), p);
            if d.distance > tol || d.t <= 0.0 || d.t >= 1.0 {
                continue;
            }
            if best.map_or(true, |(bd, _, _)| d.distance < bd) {
                best = Some((d.distance, a, b));
            }
        }
        best.map(|(_, a, b)| (a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Mesh, [VertexId; 4]) {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        let b = mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        let c = mesh.insert_point(1.0, 1.0, 0.0, false).unwrap();
        let d = mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        (mesh, [a, b, c, d])
    }

    #[test]
    fn classifies_vertex_edge_triangle_and_outside() {
        let (mesh, [a, b, _, _]) = square();
        assert_eq!(mesh.locate(Point::new(1e-9, 0.0)), Location::AtVertex(a));
        match mesh.locate(Point::new(0.5, 0.0)) {
            Location::OnHullEdge(x, y) => {
                assert_eq!(mesh.hull_next(x), Some(y));
                assert!([x, y].contains(&a) && [x, y].contains(&b));
            }
            other => panic!("expected hull edge, got {other:?}"),
        }
        assert!(matches!(
            mesh.locate(Point::new(0.5, 0.5)),
            Location::OnEdge(..)
        ));
        assert!(matches!(
            mesh.locate(Point::new(0.7, 0.2)),
            Location::InTriangle(..)
        ));
        assert_eq!(mesh.locate(Point::new(2.0, 2.0)), Location::Outside);
    }

    #[test]
    fn equidistant_vertices_prefer_lower_id() {
        let mut mesh = Mesh::with_tolerances(crate::config::Tolerances {
            point_point_tol: 1.0,
            point_line_tol: 1e-6,
            machine_tol: 1e-12,
        })
        .unwrap();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(2.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(1.0, 5.0, 0.0, false).unwrap();
        assert_eq!(mesh.locate(Point::new(1.0, 0.0)), Location::AtVertex(a));
    }
}
