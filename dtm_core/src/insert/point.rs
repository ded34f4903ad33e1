//! Point insertion and the ring splices shared with the segment walk.

use crate::error::{Result, TinError};
use crate::geometry::{
    distance, distance_from_line, interpolate_segment_z, interpolate_triangle_z, side_of, Point,
    Point3, Side,
};
use crate::locate::Location;
use crate::mesh::{Mesh, PointStatus, VertexId};
use crate::precision::{
    check_hull_triangle_precision, check_quad_precision, fix_hull_triangle_precision,
    fix_quad_precision, FixKind,
};

/// Options for [`Mesh::insert_point_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointOptions {
    /// Replace z with the surface elevation at the insertion point.
    pub drape_to_surface: bool,
    /// Reject points outside the hull instead of extending it.
    pub internal_only: bool,
}

/// Position chosen for a located point after precision checks.
enum Settled {
    /// An existing vertex is used instead of a new one.
    Snap(VertexId),
    /// A new vertex goes at this position.
    At(Point),
}

impl Mesh {
    /// Inserts `(x, y, z)` and returns its vertex. Points within
    /// `point_point_tol` of an existing vertex return that vertex.
    pub fn insert_point(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        drape_to_surface: bool,
    ) -> Result<VertexId> {
        self.insert_point_with(
            Point3::new(x, y, z),
            PointOptions {
                drape_to_surface,
                internal_only: false,
            },
        )
    }

    pub fn insert_point_with(&mut self, p: Point3, opts: PointOptions) -> Result<VertexId> {
        let v = self.place_point(p, opts, false)?;
        self.after_edit()?;
        Ok(v)
    }

    /// Inserts a point whose coordinates are authoritative. A coincident
    /// vertex is moved onto `(x, y, z)` when that keeps the mesh valid.
    pub fn insert_rigid_point(&mut self, x: f64, y: f64, z: f64) -> Result<VertexId> {
        let v = self.place_point(Point3::new(x, y, z), PointOptions::default(), true)?;
        self.after_edit()?;
        Ok(v)
    }

    /// Fails with `ExternalPoint` if `p` is outside the hull. Nothing is
    /// changed either way.
    pub(crate) fn check_internal(&self, p: Point) -> Result<()> {
        if !self.is_triangulated() || self.locate(p) == Location::Outside {
            return Err(TinError::ExternalPoint { x: p.x, y: p.y });
        }
        Ok(())
    }

    pub(crate) fn place_point(
        &mut self,
        p: Point3,
        opts: PointOptions,
        rigid: bool,
    ) -> Result<VertexId> {
        if !p.is_finite() {
            return Err(TinError::InvalidCoordinate { x: p.x, y: p.y });
        }
        if !self.is_triangulated() {
            if opts.internal_only {
                return Err(TinError::ExternalPoint { x: p.x, y: p.y });
            }
            return self.insert_isolated(p);
        }
        let q = p.xy();
        let loc = self.locate(q);
        match loc {
            Location::AtVertex(v) => {
                if rigid {
                    self.try_rigid_move(v, p);
                }
                log::trace!("({}, {}) coincides with {v}", p.x, p.y);
                Ok(v)
            }
            Location::Outside => {
                if opts.internal_only {
                    return Err(TinError::ExternalPoint { x: p.x, y: p.y });
                }
                let run = self.plan_hull_extension(q)?;
                self.reserve_ring_entries(2 * run.len())?;
                let v = self.push_vertex(p, PointStatus::INSERTED)?;
                self.join_hull_run(v, &run)?;
                Ok(v)
            }
            _ => match self.settle(loc, q, rigid)? {
                Settled::Snap(v) => Ok(v),
                Settled::At(pos) => {
                    let z = if opts.drape_to_surface {
                        self.surface_z(loc, pos).unwrap_or(p.z)
                    } else {
                        p.z
                    };
                    let v = self.push_vertex(Point3::new(pos.x, pos.y, z), PointStatus::INSERTED)?;
                    self.splice(v, loc)?;
                    Ok(v)
                }
            },
        }
    }

    /// Applies edge projection and precision repair to a point located on
    /// an edge or inside a triangle.
    fn settle(&self, loc: Location, q: Point, exact: bool) -> Result<Settled> {
        let tol = *self.tolerances();
        match loc {
            Location::OnEdge(a, b) => {
                let (c1, d) = self.edge_apexes(a, b)?;
                let pos = if exact {
                    q
                } else {
                    distance_from_line(self.xy(a), self.xy(b), q).foot
                };
                let quad = [self.xy(d), self.xy(b), self.xy(c1), self.xy(a)];
                if !check_quad_precision(&quad, pos, tol.machine_tol) {
                    return Ok(Settled::At(pos));
                }
                match fix_quad_precision(&quad, pos, &tol) {
                    (fixed, FixKind::Recomputed) => Ok(Settled::At(fixed)),
                    (_, FixKind::SnapToP2) => Ok(Settled::Snap(b)),
                    (_, FixKind::SnapToP4) => Ok(Settled::Snap(a)),
                    (_, FixKind::Unfixable) => Err(TinError::PrecisionUnfixable),
                }
            }
            Location::OnHullEdge(a, b) => {
                let c = self.triangle_right_of(a, b).ok_or_else(|| {
                    TinError::inconsistent(format!("hull edge {a}-{b} has no triangle"))
                })?;
                let pos = if exact {
                    q
                } else {
                    distance_from_line(self.xy(a), self.xy(b), q).foot
                };
                self.settle_on_hull_edge(a, b, c, pos)
            }
            Location::InTriangle(..) => Ok(Settled::At(q)),
            Location::AtVertex(v) => Ok(Settled::Snap(v)),
            Location::Outside => Err(TinError::LocateFailed(format!(
                "({}, {}) is outside the hull",
                q.x, q.y
            ))),
        }
    }

    fn settle_on_hull_edge(
        &self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
        pos: Point,
    ) -> Result<Settled> {
        let tol = *self.tolerances();
        let (pa, pb, pc) = (self.xy(a), self.xy(b), self.xy(c));
        if !check_hull_triangle_precision(pa, pb, pc, pos, tol.machine_tol) {
            return Ok(Settled::At(pos));
        }
        match fix_hull_triangle_precision(pa, pb, pc, pos, &tol) {
            (fixed, FixKind::Recomputed) => Ok(Settled::At(fixed)),
            (_, FixKind::SnapToP2) => Ok(Settled::Snap(a)),
            (_, FixKind::SnapToP4) => Ok(Settled::Snap(b)),
            (_, FixKind::Unfixable) => Err(TinError::PrecisionUnfixable),
        }
    }

    /// Inserts a vertex at `pos` on hull edge `a -> b` after hull precision
    /// repair, or returns the endpoint it snapped to.
    pub(crate) fn insert_on_hull_edge(
        &mut self,
        a: VertexId,
        b: VertexId,
        pos: Point,
        z: f64,
        status: PointStatus,
    ) -> Result<VertexId> {
        let c = self.triangle_right_of(a, b).ok_or_else(|| {
            TinError::inconsistent(format!("hull edge {a}-{b} has no triangle"))
        })?;
        match self.settle_on_hull_edge(a, b, c, pos)? {
            Settled::Snap(v) => Ok(v),
            Settled::At(pos) => {
                let x = self.push_vertex(Point3::new(pos.x, pos.y, z), status)?;
                self.split_hull_edge(a, b, x)?;
                Ok(x)
            }
        }
    }

    /// Apexes `(c1, d)` of the triangles right and left of interior edge `a -> b`.
    pub(crate) fn edge_apexes(&self, a: VertexId, b: VertexId) -> Result<(VertexId, VertexId)> {
        match (self.triangle_right_of(a, b), self.triangle_left_of(a, b)) {
            (Some(c1), Some(d)) => Ok((c1, d)),
            _ => Err(TinError::inconsistent(format!(
                "edge {a}-{b} is not an interior edge"
            ))),
        }
    }

    fn surface_z(&self, loc: Location, p: Point) -> Option<f64> {
        match loc {
            Location::AtVertex(v) => Some(self.p3(v).z),
            Location::OnEdge(a, b) | Location::OnHullEdge(a, b) => {
                Some(interpolate_segment_z(self.p3(a), self.p3(b), p))
            }
            Location::InTriangle(a, b, c) => {
                interpolate_triangle_z(p, self.p3(a), self.p3(b), self.p3(c))
            }
            Location::Outside => None,
        }
    }

    fn splice(&mut self, x: VertexId, loc: Location) -> Result<()> {
        match loc {
            Location::InTriangle(a, b, c) => self.split_triangle(a, b, c, x),
            Location::OnEdge(a, b) => self.split_interior_edge(a, b, x),
            Location::OnHullEdge(a, b) => self.split_hull_edge(a, b, x),
            Location::AtVertex(_) | Location::Outside => Err(TinError::inconsistent(format!(
                "cannot splice {x} at {loc:?}"
            ))),
        }
    }

    /// Points arriving before the first triangle are kept unconnected.
    fn insert_isolated(&mut self, p: Point3) -> Result<VertexId> {
        let tol = self.tolerances().point_point_tol;
        if let Some(v) = self.nearest_vertex(p.xy(), tol, false) {
            return Ok(v);
        }
        let v = self.push_vertex(p, PointStatus::INSERTED)?;
        self.try_bootstrap()?;
        Ok(v)
    }

    /// Builds the first triangle from the earliest non-collinear triple and
    /// splices the remaining unconnected vertices into it.
    pub(crate) fn try_bootstrap(&mut self) -> Result<()> {
        if self.points.len() < 3 {
            return Ok(());
        }
        let plt = self.tolerances().point_line_tol;
        let a = VertexId::new(0);
        let b = VertexId::new(1);
        let Some(c) = self
            .vertex_ids()
            .skip(2)
            .find(|&c| side_of(self.xy(a), self.xy(b), self.xy(c), plt) != Side::On)
        else {
            return Ok(());
        };
        let (b, c) = if side_of(self.xy(a), self.xy(b), self.xy(c), plt) == Side::Left {
            (c, b)
        } else {
            (b, c)
        };
        self.ring_push(a, b)?;
        self.ring_push(a, c)?;
        self.ring_push(b, c)?;
        self.ring_push(b, a)?;
        self.ring_push(c, a)?;
        self.ring_push(c, b)?;
        self.node_mut(a).hull_next = Some(b);
        self.node_mut(b).hull_next = Some(c);
        self.node_mut(c).hull_next = Some(a);
        self.hull_entry = Some(a);
        log::debug!("first triangle {a} {b} {c}");
        let pending: Vec<VertexId> = self
            .vertex_ids()
            .filter(|&v| v != a && v != b && v != c)
            .collect();
        for v in pending {
            self.attach_isolated(v)?;
        }
        self.refresh_bbox_flags();
        Ok(())
    }

    /// Splices an existing unconnected vertex into the triangulation.
    pub(crate) fn attach_isolated(&mut self, v: VertexId) -> Result<()> {
        let q = self.xy(v);
        let loc = self.locate(q);
        match loc {
            Location::Outside => self.extend_hull(v),
            Location::AtVertex(u) => {
                log::warn!("{v} coincides with {u} and stays unconnected");
                Ok(())
            }
            _ => match self.settle(loc, q, false)? {
                Settled::Snap(u) => {
                    log::warn!("{v} snapped to {u} and stays unconnected");
                    Ok(())
                }
                Settled::At(pos) => {
                    let z = self.p3(v).z;
                    self.set_position(v, Point3::new(pos.x, pos.y, z));
                    self.splice(v, loc)
                }
            },
        }
    }

    /// Splits the clockwise triangle `(a, b, c)` at `x`.
    pub(crate) fn split_triangle(
        &mut self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
        x: VertexId,
    ) -> Result<()> {
        self.reserve_ring_entries(6)?;
        self.ring_insert_after(a, x, b)?;
        self.ring_insert_after(b, x, c)?;
        self.ring_insert_after(c, x, a)?;
        self.ring_push(x, a)?;
        self.ring_push(x, b)?;
        self.ring_push(x, c)?;
        log::trace!("{x} splits triangle {a} {b} {c}");
        Ok(())
    }

    /// Replaces interior edge `a - b` by the two halves through `x` plus the
    /// links from `x` to both apexes.
    pub(crate) fn split_interior_edge(&mut self, a: VertexId, b: VertexId, x: VertexId) -> Result<()> {
        let (c1, d) = self.edge_apexes(a, b)?;
        self.reserve_ring_entries(8)?;
        self.reserve_chain_entries(2 * self.features_on_line(a, b).len())?;
        self.ring_insert_after(a, x, b)?;
        self.ring_insert_after(b, x, a)?;
        self.ring_delete(a, b)?;
        self.ring_insert_after(d, x, b)?;
        self.ring_insert_after(c1, x, a)?;
        for n in [a, d, b, c1] {
            self.ring_push(x, n)?;
        }
        self.split_feature_across_edge(a, b, x)?;
        log::trace!("{x} splits edge {a}-{b}");
        Ok(())
    }

    /// Splits hull edge `a -> b` at `x`, which becomes a hull vertex.
    pub(crate) fn split_hull_edge(&mut self, a: VertexId, b: VertexId, x: VertexId) -> Result<()> {
        if self.hull_next(a) != Some(b) {
            return Err(TinError::inconsistent(format!("{a}-{b} is not a hull edge")));
        }
        let c = self.triangle_right_of(a, b).ok_or_else(|| {
            TinError::inconsistent(format!("hull edge {a}-{b} has no triangle"))
        })?;
        self.reserve_ring_entries(6)?;
        self.reserve_chain_entries(2 * self.features_on_line(a, b).len())?;
        self.ring_insert_after(a, x, b)?;
        self.ring_insert_after(b, x, a)?;
        self.ring_delete(a, b)?;
        self.ring_insert_after(c, x, a)?;
        for n in [b, c, a] {
            self.ring_push(x, n)?;
        }
        self.node_mut(a).hull_next = Some(x);
        self.node_mut(x).hull_next = Some(b);
        self.split_feature_across_edge(a, b, x)?;
        self.refresh_bbox_flags();
        log::trace!("{x} splits hull edge {a}-{b}");
        Ok(())
    }

    /// Joins the outside vertex `x` to the contiguous run of hull edges it
    /// can see, starting from the nearest one.
    pub(crate) fn extend_hull(&mut self, x: VertexId) -> Result<()> {
        let run = self.plan_hull_extension(self.xy(x))?;
        self.join_hull_run(x, &run)
    }

    /// Hull vertices, in hull order, that a new vertex at `p` outside the
    /// hull would be joined to. Nothing is changed.
    pub(crate) fn plan_hull_extension(&self, p: Point) -> Result<Vec<VertexId>> {
        let tol = *self.tolerances();
        let hull = self.hull_vertices();
        let n = hull.len();
        if n < 3 {
            return Err(TinError::inconsistent("hull has fewer than three vertices"));
        }
        let visible_at = |t: f64| -> Vec<bool> {
            (0..n)
                .map(|i| side_of(self.xy(hull[i]), self.xy(hull[(i + 1) % n]), p, t) == Side::Left)
                .collect()
        };
        let mut visible = visible_at(tol.point_line_tol);
        if !visible.contains(&true) {
            visible = visible_at(tol.machine_tol);
        }
        let edge_distance = |i: usize| {
            let (a, b) = (self.xy(hull[i]), self.xy(hull[(i + 1) % n]));
            let d = distance_from_line(a, b, p);
            if d.on_segment {
                d.distance
            } else {
                distance(a, p).min(distance(b, p))
            }
        };
        let seed = (0..n)
            .filter(|&i| visible[i])
            .min_by(|&i, &j| edge_distance(i).total_cmp(&edge_distance(j)))
            .ok_or_else(|| {
                TinError::LocateFailed(format!("no hull edge visible from ({}, {})", p.x, p.y))
            })?;
        let clear = |v: VertexId| self.sight_line_clear(p, v, &hull);
        if !clear(hull[seed]) || !clear(hull[(seed + 1) % n]) {
            return Err(TinError::LocateFailed(format!(
                "hull edge nearest ({}, {}) is obstructed",
                p.x, p.y
            )));
        }
        let mut start = seed;
        let mut end = (seed + 1) % n;
        let mut count = 1;
        while count < n - 1 {
            let prev = (start + n - 1) % n;
            if visible[prev] && clear(hull[prev]) {
                start = prev;
                count += 1;
            } else {
                break;
            }
        }
        while count < n - 1 {
            let next = (end + 1) % n;
            if visible[end] && clear(hull[next]) {
                end = next;
                count += 1;
            } else {
                break;
            }
        }
        Ok((0..=count).map(|k| hull[(start + k) % n]).collect())
    }

    fn join_hull_run(&mut self, x: VertexId, run: &[VertexId]) -> Result<()> {
        if run.len() < 2 {
            return Err(TinError::inconsistent(format!("{x} sees no hull edge")));
        }
        self.reserve_ring_entries(2 * run.len())?;
        let k = run.len() - 1;
        for &h in run.iter().rev() {
            self.ring_push(x, h)?;
        }
        self.ring_insert_before(run[0], x, run[1])?;
        for i in 1..=k {
            self.ring_insert_after(run[i], x, run[i - 1])?;
        }
        self.node_mut(run[0]).hull_next = Some(x);
        self.node_mut(x).hull_next = Some(run[k]);
        for &h in &run[1..k] {
            self.leave_hull(h, x);
        }
        self.refresh_bbox_flags();
        log::debug!("hull extended to {x} over {} edges", k);
        Ok(())
    }

    /// `true` when the segment from `p` to hull vertex `v` touches no other
    /// hull vertex and crosses no hull edge.
    fn sight_line_clear(&self, p: Point, v: VertexId, hull: &[VertexId]) -> bool {
        let mt = self.tolerances().machine_tol;
        let pv = self.xy(v);
        let n = hull.len();
        for i in 0..n {
            let (h, g) = (hull[i], hull[(i + 1) % n]);
            if h != v {
                let d = distance_from_line(p, pv, self.xy(h));
                if d.distance <= mt && d.t > 0.0 && d.t < 1.0 {
                    return false;
                }
            }
            if h == v || g == v {
                continue;
            }
            if crate::geometry::segments_cross(p, pv, self.xy(h), self.xy(g), mt) {
                return false;
            }
        }
        true
    }

    /// `true` when `v` can sit at `to` with every triangle of its star still
    /// clockwise. The triangle on `skip` is ignored.
    pub fn can_move_vertex(&self, v: VertexId, to: Point, skip: Option<(VertexId, VertexId)>) -> bool {
        let mt = self.tolerances().machine_tol;
        let ring = self.ring_neighbors(v);
        if ring.len() < 2 {
            return false;
        }
        for (i, &u) in ring.iter().enumerate() {
            let w = ring[(i + 1) % ring.len()];
            if self.is_gap(v, u, w) {
                continue;
            }
            if let Some((s, t)) = skip {
                if (u == s && w == t) || (u == t && w == s) {
                    continue;
                }
            }
            if side_of(self.xy(u), self.xy(w), to, mt) != Side::Right {
                return false;
            }
        }
        true
    }

    pub(crate) fn move_vertex(&mut self, v: VertexId, to: Point3) {
        log::debug!("{v} moved to ({}, {})", to.x, to.y);
        self.set_position(v, to);
        self.mark(v, PointStatus::MOVED);
    }

    fn try_rigid_move(&mut self, v: VertexId, p: Point3) {
        let q = p.xy();
        if self.xy(v) == q {
            self.set_z(v, p.z);
            return;
        }
        if self.is_hull_vertex(v) || !self.can_move_vertex(v, q, None) {
            log::debug!("{v} kept in place for rigid point ({}, {})", p.x, p.y);
            return;
        }
        if self.move_would_create_knot(v, q, None) {
            log::debug!("{v} kept in place, a feature link would collapse");
            return;
        }
        self.move_vertex(v, p);
    }
}
