//! Full invariant check of a mesh.
//!
//! Used by the tests after every scenario and, when
//! [`TinConfig::validate_after_edit`](crate::config::TinConfig) is set,
//! after every public edit.

use crate::error::{Result, TinError};
use crate::geometry::{cross, polygon_area, segments_cross};
use crate::mesh::Mesh;

fn fail<T>(msg: String) -> Result<T> {
    Err(TinError::InternalInconsistency(msg))
}

impl Mesh {
    /// Checks ring symmetry, triangle orientation, hull closure, Euler
    /// counts, planarity, scratch links and feature chains.
    pub fn validate(&self) -> Result<()> {
        self.validate_rings()?;
        self.validate_scratch()?;
        if self.is_triangulated() {
            self.validate_triangles()?;
            self.validate_hull()?;
            self.validate_counts()?;
            self.validate_planarity()?;
        } else if self.vertex_ids().any(|v| self.ring_degree(v) > 0 || self.is_hull_vertex(v)) {
            return fail("untriangulated mesh has edges".into());
        }
        self.validate_features()
    }

    /// Runs [`Mesh::validate`] when the configuration asks for it.
    pub(crate) fn after_edit(&self) -> Result<()> {
        if self.config.validate_after_edit {
            self.validate()?;
        }
        Ok(())
    }

    fn validate_rings(&self) -> Result<()> {
        for v in self.vertex_ids() {
            let ring = self.ring_neighbors(v);
            for (i, &n) in ring.iter().enumerate() {
                if n == v || !self.contains_vertex(n) {
                    return fail(format!("{v} lists invalid neighbour {n}"));
                }
                if ring[i + 1..].contains(&n) {
                    return fail(format!("{v} lists {n} twice"));
                }
                if !self.ring_has_edge(n, v) {
                    return fail(format!("edge {v}-{n} is one-sided"));
                }
            }
        }
        Ok(())
    }

    fn validate_scratch(&self) -> Result<()> {
        match self.vertex_ids().find(|&v| self.walk_ptr(v).is_some()) {
            Some(v) => fail(format!("walk link left at {v}")),
            None => Ok(()),
        }
    }

    fn validate_triangles(&self) -> Result<()> {
        for v in self.vertex_ids() {
            let ring = self.ring_neighbors(v);
            if ring.is_empty() {
                continue;
            }
            if ring.len() < 2 {
                return fail(format!("{v} has a single neighbour"));
            }
            let mut gaps = 0;
            for (i, &u) in ring.iter().enumerate() {
                let w = ring[(i + 1) % ring.len()];
                if self.is_gap(v, u, w) {
                    gaps += 1;
                    continue;
                }
                if cross(self.xy(v), self.xy(u), self.xy(w)) >= 0.0 {
                    return fail(format!("triangle {v} {u} {w} is not clockwise"));
                }
                if !self.ring_has_edge(u, w) {
                    return fail(format!("triangle {v} {u} {w} misses edge {u}-{w}"));
                }
                if self.ring_next_cw(u, w) != Some(v) || self.ring_next_cw(w, v) != Some(u) {
                    return fail(format!("triangle {v} {u} {w} is not seen from its corners"));
                }
            }
            let expected = usize::from(self.is_hull_vertex(v));
            if gaps != expected {
                return fail(format!("{v} has {gaps} hull gaps, expected {expected}"));
            }
        }
        Ok(())
    }

    fn validate_hull(&self) -> Result<()> {
        let Some(entry) = self.hull_entry() else {
            return fail("triangulated mesh has no hull".into());
        };
        if !self.is_hull_vertex(entry) {
            return fail(format!("hull entry {entry} is not on the hull"));
        }
        let hull = self.hull_vertices();
        let last = hull[hull.len() - 1];
        if self.hull_next(last) != Some(entry) {
            return fail("hull does not close".into());
        }
        let on_hull = self.vertex_ids().filter(|&v| self.is_hull_vertex(v)).count();
        if on_hull != hull.len() {
            return fail(format!("{on_hull} hull vertices but the loop visits {}", hull.len()));
        }
        for &v in &hull {
            let Some(next) = self.hull_next(v) else {
                return fail(format!("{v} left the hull loop"));
            };
            if !self.ring_has_edge(v, next) {
                return fail(format!("hull edge {v}-{next} is not an edge"));
            }
            if self.triangle_right_of(v, next).is_none() || self.triangle_left_of(v, next).is_some() {
                return fail(format!("hull edge {v}-{next} does not border one triangle"));
            }
            match self.hull_prev(v) {
                Some(p) if self.hull_next(p) == Some(v) => {}
                _ => return fail(format!("hull gap at {v} does not match its predecessor")),
            }
        }
        Ok(())
    }

    fn validate_counts(&self) -> Result<()> {
        let v = self.vertex_ids().filter(|&v| self.ring_degree(v) > 0).count() as i64;
        let e = self.edge_count() as i64;
        let t = self.triangle_count() as i64;
        let h = self.hull_size() as i64;
        if v - e + t != 1 {
            return fail(format!("euler check failed: V={v} E={e} T={t}"));
        }
        if 3 * t + h != 2 * e {
            return fail(format!("edge count mismatch: E={e} T={t} H={h}"));
        }
        Ok(())
    }

    fn validate_planarity(&self) -> Result<()> {
        let triangles: f64 = self
            .triangles()
            .iter()
            .map(|&[a, b, c]| polygon_area(&[self.xy(a), self.xy(b), self.xy(c)]))
            .sum();
        let hull = polygon_area(&self.hull_points());
        if (triangles - hull).abs() > 1e-9 * hull.max(1.0) {
            return fail(format!("triangle area {triangles} differs from hull area {hull}"));
        }
        let mt = self.tolerances().machine_tol;
        let edges = self.edges();
        for (i, &(a, b)) in edges.iter().enumerate() {
            for &(c, d) in &edges[i + 1..] {
                if segments_cross(self.xy(a), self.xy(b), self.xy(c), self.xy(d), mt) {
                    return fail(format!("edges {a}-{b} and {c}-{d} cross"));
                }
            }
        }
        Ok(())
    }

    fn validate_features(&self) -> Result<()> {
        let mut entries_seen = 0;
        for id in self.live_features() {
            let verts = self.feature_vertices(id)?;
            if !self.check_feature_connectivity(id)? {
                return fail(format!("feature {id} has a link that is not an edge"));
            }
            entries_seen += verts.len();
        }
        let listed: usize = self
            .vertex_ids()
            .map(|v| self.features_at_vertex(v).len())
            .sum();
        if listed != entries_seen {
            return fail(format!(
                "{listed} feature entries listed, {entries_seen} reachable from live features"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TinConfig;

    #[test]
    fn fresh_meshes_validate() {
        let mut mesh = Mesh::default();
        mesh.validate().unwrap();
        mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        mesh.validate().unwrap();
        mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn broken_hull_is_reported() {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        mesh.insert_point(1.0, 1.0, 0.0, false).unwrap();
        mesh.node_mut(a).hull_next = None;
        let err = mesh.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn stale_walk_link_is_reported() {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        let b = mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(0.0, 1.0, 0.0, false).unwrap();
        mesh.set_walk_ptr(a, Some(b));
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn validate_after_edit_runs_on_insert() {
        let mut mesh = Mesh::new(TinConfig {
            validate_after_edit: true,
            ..TinConfig::default()
        })
        .unwrap();
        for (x, y) in [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (1.0, 1.0), (3.0, 1.0)] {
            mesh.insert_point(x, y, 0.0, false).unwrap();
        }
        // Four around the centre plus one joining (3, 1) to the right side.
        assert_eq!(mesh.triangle_count(), 5);
    }
}
