//! Hull traversal and boundary edits.
//!
//! `hull_next` walks the boundary clockwise so the interior is always on the
//! right of a hull edge.

use super::{Mesh, VertexId};
use crate::error::{Result, TinError};
use crate::geometry::Point;

impl Mesh {
    pub fn hull_next(&self, v: VertexId) -> Option<VertexId> {
        self.nodes.get(v.index())?.hull_next
    }

    /// Hull predecessor of `v`, found as the ring neighbour before the gap.
    pub fn hull_prev(&self, v: VertexId) -> Option<VertexId> {
        let next = self.hull_next(v)?;
        self.ring_next_ccw(v, next)
    }

    pub fn is_hull_vertex(&self, v: VertexId) -> bool {
        self.hull_next(v).is_some()
    }

    /// `true` when `a - b` lies on the hull in either direction.
    pub fn is_hull_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.hull_next(a) == Some(b) || self.hull_next(b) == Some(a)
    }

    /// `true` when the consecutive ring pair `(u, w)` at `v` is the hull gap
    /// rather than a triangle.
    pub fn is_gap(&self, v: VertexId, u: VertexId, w: VertexId) -> bool {
        self.hull_next(v) == Some(w) && self.hull_next(u) == Some(v)
    }

    pub fn hull_entry(&self) -> Option<VertexId> {
        self.hull_entry
    }

    /// Hull vertices in clockwise order starting at the hull entry.
    pub fn hull_vertices(&self) -> Vec<VertexId> {
        let mut out = Vec::new();
        let Some(start) = self.hull_entry else {
            return out;
        };
        let mut cur = start;
        loop {
            out.push(cur);
            match self.hull_next(cur) {
                Some(next) if next != start => cur = next,
                _ => break,
            }
            if out.len() > self.points.len() {
                break;
            }
        }
        out
    }

    pub fn hull_size(&self) -> usize {
        self.hull_vertices().len()
    }

    pub fn hull_points(&self) -> Vec<Point> {
        self.hull_vertices().into_iter().map(|v| self.xy(v)).collect()
    }

    /// Takes `v` off the hull and moves the hull entry if it pointed at `v`.
    pub(crate) fn leave_hull(&mut self, v: VertexId, replacement: VertexId) {
        self.node_mut(v).hull_next = None;
        if self.hull_entry == Some(v) {
            self.hull_entry = Some(replacement);
        }
    }

    /// Closes the reflex hull corner at `b` with the triangle `(a, c, b)`,
    /// where `a -> b -> c` are consecutive hull vertices turning left at `b`.
    /// Afterwards `a -> c` is a hull edge and `b` is interior.
    pub fn add_external_triangle(&mut self, a: VertexId, b: VertexId, c: VertexId) -> Result<()> {
        if self.hull_next(a) != Some(b) || self.hull_next(b) != Some(c) {
            return Err(TinError::inconsistent(format!(
                "{a}-{b}-{c} are not consecutive hull vertices"
            )));
        }
        if self.ring_has_edge(a, c) {
            return Err(TinError::inconsistent(format!(
                "external triangle edge {a}-{c} already exists"
            )));
        }
        self.ring_insert_before(a, c, b)?;
        self.ring_insert_after(c, a, b)?;
        self.node_mut(a).hull_next = Some(c);
        self.leave_hull(b, c);
        log::trace!("external triangle {a} {c} {b}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TinConfig;
    use crate::geometry::{side_of, Point3, Side};
    use crate::mesh::{Mesh, VertexId};
    use crate::tin::Tin;

    #[test]
    fn empty_mesh_has_no_hull() {
        let mesh = Mesh::default();
        assert!(mesh.hull_vertices().is_empty());
        assert_eq!(mesh.hull_size(), 0);
    }

    #[test]
    fn triangle_hull_is_clockwise() {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        let b = mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        let c = mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        assert_eq!(mesh.hull_size(), 3);
        // Clockwise from (0,0) goes up to (0,1) first.
        assert_eq!(mesh.hull_next(a), Some(c));
        assert_eq!(mesh.hull_next(c), Some(b));
        assert_eq!(mesh.hull_prev(a), Some(b));
        assert!(mesh.is_gap(a, b, c));
        assert!(!mesh.is_gap(a, c, b));
    }

    #[test]
    fn external_triangle_fills_reflex_corner() {
        // Dart with a reflex corner at (1, 1).
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 3], [1, 2, 3]],
        };
        let mut mesh = Mesh::from_tin(&tin, TinConfig::default()).unwrap();
        let dent = VertexId::new(3);
        assert_eq!(mesh.hull_size(), 4);
        let prev = mesh.hull_prev(dent).unwrap();
        let next = mesh.hull_next(dent).unwrap();
        assert_eq!(
            side_of(mesh.xy(prev), mesh.xy(dent), mesh.xy(next), 1e-12),
            Side::Left
        );
        mesh.add_external_triangle(prev, dent, next).unwrap();
        assert_eq!(mesh.hull_size(), 3);
        assert!(!mesh.is_hull_vertex(dent));
        assert_eq!(mesh.triangle_count(), 3);
        mesh.validate().unwrap();
    }

    #[test]
    fn external_triangle_needs_consecutive_hull_vertices() {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        let b = mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        let c = mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        assert!(mesh.add_external_triangle(a, b, c).is_err());
    }
}
