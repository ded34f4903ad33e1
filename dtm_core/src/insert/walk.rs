//! Constrained segment insertion.
//!
//! A segment is inserted by walking from its first vertex towards its last
//! one. Each step either passes through an existing vertex, splits the edge
//! the segment crosses, or, when the segment leaves the hull, closes the
//! exterior pocket with external triangles. The vertices visited form the
//! walk chain, linked through each vertex's `walk_ptr` until the session
//! ends.

use crate::error::{Result, TinError};
use crate::geometry::{
    distance, distance_from_line, interpolate_segment_z, line_intersection, point_in_triangle,
    polygon_area, segment_intersect, side_of, Point, Point3, Side,
};
use crate::insert::point::PointOptions;
use crate::mesh::{Mesh, PointStatus, VertexId};
use crate::precision::{check_quad_precision, fix_quad_precision, FixKind};

/// Elevation given to vertices created or passed by a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrapeMode {
    /// New crossing vertices take the z of the crossed edge.
    #[default]
    Drape,
    /// New and passed vertices take the z of the inserted segment.
    Break,
}

/// How a walk treats vertices lying almost on the segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkMode {
    /// Near vertices are used where they are.
    #[default]
    Normal,
    /// Near vertices are moved exactly onto the segment first.
    Rigid,
}

/// Where a segment leaving the hull comes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reentry {
    Vertex(VertexId),
    /// Crossing of hull edge `a -> b` at `point`.
    Edge { a: VertexId, b: VertexId, point: Point },
}

/// Next step of a walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    ThroughVertex(VertexId),
    /// The segment crosses interior edge `a - b`; `opposite` is the apex of
    /// the triangle beyond it.
    ThroughInteriorEdge {
        a: VertexId,
        b: VertexId,
        opposite: VertexId,
    },
    /// The segment leaves the mesh across hull edge `a -> b`.
    ThroughHullEdge { a: VertexId, b: VertexId },
    /// The segment leaves the hull at the current vertex. `forward` names
    /// the hull direction enclosing the exterior pocket.
    External { forward: bool, reentry: Reentry },
    /// The segment would cross a link of the current walk.
    KnotWillForm,
}

enum RingScan {
    Vertex(VertexId),
    Bracket(VertexId, VertexId),
    Nothing,
}

impl Mesh {
    /// Decides how a walk at `first` proceeds towards `last`. `hint` names
    /// the ring neighbour to start scanning from.
    ///
    /// A vertex lying within `point_point_tol` of the crossed edge may be
    /// moved onto it and the edge flipped before the decision is made.
    pub fn get_next_crossing(
        &mut self,
        first: VertexId,
        last: VertexId,
        hint: Option<VertexId>,
        mode: WalkMode,
    ) -> Result<Crossing> {
        if self.ring_has_edge(first, last) {
            return Ok(Crossing::ThroughVertex(last));
        }
        let mut may_move = true;
        loop {
            match self.scan_ring(first, last, hint)? {
                RingScan::Vertex(v) => return Ok(Crossing::ThroughVertex(v)),
                RingScan::Bracket(u, w) => {
                    if let Some(c) = self.bracket_crossing(first, last, u, w, mode, may_move)? {
                        return Ok(c);
                    }
                    may_move = false;
                }
                RingScan::Nothing if self.is_hull_vertex(first) => {
                    return self.external_crossing(first, last);
                }
                RingScan::Nothing => {
                    return Err(TinError::inconsistent(format!(
                        "no ring sector of {first} contains the direction to {last}"
                    )));
                }
            }
        }
    }

    /// Finds a neighbour on the segment or the consecutive pair `(u, w)`
    /// with `u` left and `w` right of it.
    fn scan_ring(&self, first: VertexId, last: VertexId, hint: Option<VertexId>) -> Result<RingScan> {
        let ring = self.ring_neighbors(first);
        if ring.len() < 2 {
            return Err(TinError::inconsistent(format!("{first} is not connected")));
        }
        let mt = self.tolerances().machine_tol;
        let (pf, pl) = (self.xy(first), self.xy(last));
        let start = hint
            .and_then(|h| ring.iter().position(|&n| n == h))
            .unwrap_or(0);
        let order: Vec<VertexId> = (0..ring.len())
            .map(|k| ring[(start + k) % ring.len()])
            .collect();

        let mut ahead: Option<(f64, VertexId)> = None;
        let mut sides = Vec::with_capacity(order.len());
        for &n in &order {
            let side = side_of(pf, pl, self.xy(n), mt);
            if side == Side::On {
                let d = distance_from_line(pf, pl, self.xy(n));
                if d.t > 0.0 && d.t <= 1.0 && ahead.map_or(true, |(t, _)| d.t < t) {
                    ahead = Some((d.t, n));
                }
            }
            sides.push(side);
        }
        if let Some((_, v)) = ahead {
            return Ok(RingScan::Vertex(v));
        }
        for k in 0..order.len() {
            let j = (k + 1) % order.len();
            if sides[k] == Side::Left
                && sides[j] == Side::Right
                && !self.is_gap(first, order[k], order[j])
            {
                return Ok(RingScan::Bracket(order[k], order[j]));
            }
        }
        Ok(RingScan::Nothing)
    }

    /// Resolves the bracketing pair into a crossing. Returns `None` after
    /// `first` was moved onto `u - w` and the edge flipped.
    fn bracket_crossing(
        &mut self,
        first: VertexId,
        last: VertexId,
        u: VertexId,
        w: VertexId,
        mode: WalkMode,
        may_move: bool,
    ) -> Result<Option<Crossing>> {
        if self.walk_ptr(u) == Some(w) || self.walk_ptr(w) == Some(u) {
            return Ok(Some(Crossing::KnotWillForm));
        }
        let tol = *self.tolerances();
        let (pf, pl) = (self.xy(first), self.xy(last));

        let mut snap: Option<(f64, VertexId, Point)> = None;
        let mut pair = [u, w];
        pair.sort();
        for n in pair {
            let d = distance_from_line(pf, pl, self.xy(n));
            if d.distance > tol.point_line_tol || d.t <= 0.0 || d.t > 1.0 {
                continue;
            }
            if self.walk_ptr(n).is_some() {
                continue;
            }
            if snap.map_or(true, |(best, _, _)| d.distance < best) {
                snap = Some((d.distance, n, d.foot));
            }
        }
        if let Some((_, n, foot)) = snap {
            if mode == WalkMode::Rigid {
                self.pull_onto_line(first, last, n, foot);
            }
            log::trace!("walk {first}->{last} snaps to {n}");
            return Ok(Some(Crossing::ThroughVertex(n)));
        }

        let (pu, pw) = (self.xy(u), self.xy(w));
        let x = line_intersection(pf, pl, pu, pw).ok_or_else(|| {
            TinError::inconsistent(format!("segment {first}-{last} parallel to bracket {u}-{w}"))
        })?;
        let opposite = self.triangle_right_of(w, u);
        if let Some(c) = opposite.filter(|_| may_move && distance(x, pf) <= tol.point_point_tol) {
            if self.try_move_onto_line(first, u, w, c, x)? {
                return Ok(None);
            }
        }
        Ok(Some(match opposite {
            Some(opposite) => Crossing::ThroughInteriorEdge { a: u, b: w, opposite },
            None => Crossing::ThroughHullEdge { a: u, b: w },
        }))
    }

    /// Moves `n` exactly onto the segment `first - last` at `foot` for
    /// rigid walks.
    fn pull_onto_line(&mut self, first: VertexId, last: VertexId, n: VertexId, foot: Point) {
        if self.xy(n) == foot || self.is_hull_vertex(n) {
            return;
        }
        if !self.can_move_vertex(n, foot, None) || self.check_would_create_knot(first, last, n) {
            return;
        }
        let z = self.p3(n).z;
        self.move_vertex(n, Point3::new(foot.x, foot.y, z));
    }

    /// Moves `first` onto the edge `u - w` at `x` and flips that edge to
    /// `first - c`.
    fn try_move_onto_line(
        &mut self,
        first: VertexId,
        u: VertexId,
        w: VertexId,
        c: VertexId,
        x: Point,
    ) -> Result<bool> {
        if self.is_hull_vertex(first)
            || self.is_constraint_line(u, w)
            || self.move_would_create_knot(first, x, Some((u, w)))
            || !self.can_move_vertex(first, x, Some((u, w)))
        {
            return Ok(false);
        }
        let mt = self.tolerances().machine_tol;
        let (pu, pw, pc) = (self.xy(u), self.xy(w), self.xy(c));
        if side_of(pu, pc, x, mt) != Side::Right || side_of(pc, pw, x, mt) != Side::Right {
            return Ok(false);
        }
        let z = self.p3(first).z;
        self.move_vertex(first, Point3::new(x.x, x.y, z));
        self.flip_edge_unchecked(u, w)?;
        log::debug!("{first} moved onto {u}-{w}, edge flipped to {first}-{c}");
        Ok(true)
    }

    /// Picks the nearest point where a segment leaving the hull at `first`
    /// comes back and the hull direction enclosing the pocket.
    fn external_crossing(&self, first: VertexId, last: VertexId) -> Result<Crossing> {
        let tol = *self.tolerances();
        let hull = self.hull_vertices();
        let n = hull.len();
        let fi = hull
            .iter()
            .position(|&h| h == first)
            .ok_or_else(|| TinError::inconsistent(format!("{first} is not on the hull")))?;
        let (pf, pl) = (self.xy(first), self.xy(last));
        let seg_len = distance(pf, pl);

        let mut best: Option<(f64, Reentry)> = None;
        let mut consider = |t: f64, r: Reentry| {
            if best.map_or(true, |(bt, _)| t < bt) {
                best = Some((t, r));
            }
        };
        for &h in &hull {
            if h == first {
                continue;
            }
            let d = distance_from_line(pf, pl, self.xy(h));
            if d.distance <= tol.point_line_tol && d.t > 0.0 && d.t <= 1.0 {
                consider(d.t, Reentry::Vertex(h));
            }
        }
        for i in 0..n {
            let (a, b) = (hull[i], hull[(i + 1) % n]);
            if a == first || b == first {
                continue;
            }
            let (pa, pb) = (self.xy(a), self.xy(b));
            let Some(x) = segment_intersect(pf, pl, pa, pb) else {
                continue;
            };
            if distance(x, pa) <= tol.point_line_tol || distance(x, pb) <= tol.point_line_tol {
                continue;
            }
            let t = distance(pf, x) / seg_len;
            if t * seg_len <= tol.point_point_tol {
                continue;
            }
            consider(t, Reentry::Edge { a, b, point: x });
        }
        let (_, reentry) = best.ok_or_else(|| {
            TinError::inconsistent(format!("segment {first}-{last} never re-enters the hull"))
        })?;

        // Hull positions bounding the pocket in each direction.
        let (fwd_end, bwd_end, extra) = match reentry {
            Reentry::Vertex(h) => {
                let i = hull.iter().position(|&x| x == h).unwrap_or(fi);
                (i, i, None)
            }
            Reentry::Edge { a, b, point } => {
                let ia = hull.iter().position(|&x| x == a).unwrap_or(fi);
                let ib = hull.iter().position(|&x| x == b).unwrap_or(fi);
                (ia, ib, Some(point))
            }
        };
        let mut fwd = vec![pf];
        let mut i = fi;
        while i != fwd_end {
            i = (i + 1) % n;
            fwd.push(self.xy(hull[i]));
        }
        let mut bwd = vec![pf];
        let mut i = fi;
        while i != bwd_end {
            i = (i + n - 1) % n;
            bwd.push(self.xy(hull[i]));
        }
        if let Some(x) = extra {
            fwd.push(x);
            bwd.push(x);
        }
        let forward = polygon_area(&fwd) <= polygon_area(&bwd);
        log::trace!("walk {first}->{last} leaves the hull, reentry {reentry:?}, forward {forward}");
        Ok(Crossing::External { forward, reentry })
    }

    /// Closes the pocket between hull vertices `from` and `to` with external
    /// triangles until they share a hull edge. Returns `false` when no ear
    /// can be cut.
    pub(crate) fn fill_pocket(&mut self, from: VertexId, to: VertexId, forward: bool) -> Result<bool> {
        let limit = self.hull_size();
        let (head, tail) = if forward { (from, to) } else { (to, from) };
        let mut chain = vec![head];
        let mut cur = head;
        while cur != tail {
            cur = self
                .hull_next(cur)
                .ok_or_else(|| TinError::inconsistent(format!("{cur} left the hull")))?;
            chain.push(cur);
            if chain.len() > limit {
                return Err(TinError::inconsistent("pocket chain does not close"));
            }
        }
        let mt = self.tolerances().machine_tol;
        while chain.len() > 2 {
            let ear = (1..chain.len() - 1).find(|&i| {
                let (a, b, c) = (chain[i - 1], chain[i], chain[i + 1]);
                let (pa, pb, pc) = (self.xy(a), self.xy(b), self.xy(c));
                side_of(pa, pb, pc, mt) == Side::Left
                    && !self.ring_has_edge(a, c)
                    && chain
                        .iter()
                        .filter(|&&v| v != a && v != b && v != c)
                        .all(|&v| !point_in_triangle(pa, pb, pc, self.xy(v)))
            });
            let Some(i) = ear else {
                log::debug!("pocket {from}-{to} has no ear left");
                return Ok(false);
            };
            self.add_external_triangle(chain[i - 1], chain[i], chain[i + 1])?;
            chain.remove(i);
        }
        self.refresh_bbox_flags();
        Ok(true)
    }

    /// Inserts the segment `first -> last` as a walk and returns the walk
    /// chain. Crossed edges are split; constraints on them are carried over.
    pub fn insert_segment(
        &mut self,
        first: VertexId,
        last: VertexId,
        drape: DrapeMode,
        swap_first: bool,
    ) -> Result<Vec<VertexId>> {
        self.walk_segment(first, last, drape, swap_first, WalkMode::Normal)
    }

    /// As [`Mesh::insert_segment`], moving near vertices onto the segment.
    pub fn insert_rigid_segment(
        &mut self,
        first: VertexId,
        last: VertexId,
        drape: DrapeMode,
        swap_first: bool,
    ) -> Result<Vec<VertexId>> {
        self.walk_segment(first, last, drape, swap_first, WalkMode::Rigid)
    }

    fn walk_segment(
        &mut self,
        first: VertexId,
        last: VertexId,
        drape: DrapeMode,
        swap_first: bool,
        mode: WalkMode,
    ) -> Result<Vec<VertexId>> {
        self.check_connected(first)?;
        self.check_connected(last)?;
        let mut session = WalkSession::new(self, drape, mode);
        session.insert_segment(first, last, swap_first)?;
        let chain = session.finish();
        self.after_edit()?;
        Ok(chain)
    }

    /// Inserts the points of a polyline and walks every segment between
    /// them. Returns the walk chain, which includes vertices created where
    /// the string crossed existing edges.
    ///
    /// Points are inserted before any segment is walked. If they do not yet
    /// span a triangle the points stay in the mesh and `Unconnected` is
    /// returned.
    pub fn insert_string(&mut self, points: &[Point3], opts: StringOptions) -> Result<Vec<VertexId>> {
        let ids = self.insert_string_points(points, opts)?;
        let mode = if opts.rigid {
            WalkMode::Rigid
        } else {
            WalkMode::Normal
        };
        let mut session = WalkSession::new(self, opts.drape, mode);
        for pair in ids.windows(2) {
            session.insert_segment(pair[0], pair[1], opts.swap_first)?;
        }
        let chain = session.finish();
        self.after_edit()?;
        Ok(chain)
    }

    /// Inserts string points and returns their vertices without consecutive
    /// repeats, closed when requested.
    pub(crate) fn insert_string_points(
        &mut self,
        points: &[Point3],
        opts: StringOptions,
    ) -> Result<Vec<VertexId>> {
        for p in points {
            if !p.is_finite() {
                return Err(TinError::InvalidCoordinate { x: p.x, y: p.y });
            }
            if opts.internal_only {
                self.check_internal(p.xy())?;
            }
        }
        let point_opts = PointOptions {
            drape_to_surface: false,
            internal_only: opts.internal_only,
        };
        let mut ids: Vec<VertexId> = Vec::with_capacity(points.len() + 1);
        for &p in points {
            let v = self.place_point(p, point_opts, opts.rigid)?;
            if ids.last() != Some(&v) {
                ids.push(v);
            }
        }
        if opts.closed && ids.len() > 2 && ids.first() != ids.last() {
            ids.push(ids[0]);
        }
        Ok(ids)
    }
}

/// Options for [`Mesh::insert_string`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringOptions {
    pub drape: DrapeMode,
    /// Run the pre-swap pass before each segment.
    pub swap_first: bool,
    /// Reject the whole string if any point lies outside the hull.
    pub internal_only: bool,
    /// Insert points and segments rigidly.
    pub rigid: bool,
    /// Join the last point back to the first.
    pub closed: bool,
}

/// An in-progress walk over one mesh.
///
/// The session owns the walk chain. Scratch links are cleared when the
/// session is finished or dropped, so they never outlive one public call.
pub struct WalkSession<'m> {
    mesh: &'m mut Mesh,
    chain: Vec<VertexId>,
    drape: DrapeMode,
    mode: WalkMode,
}

impl<'m> WalkSession<'m> {
    pub fn new(mesh: &'m mut Mesh, drape: DrapeMode, mode: WalkMode) -> Self {
        Self {
            mesh,
            chain: Vec::new(),
            drape,
            mode,
        }
    }

    /// Vertices walked so far.
    pub fn chain(&self) -> &[VertexId] {
        &self.chain
    }

    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    /// Clears the scratch links and returns the walk chain.
    pub fn finish(mut self) -> Vec<VertexId> {
        let chain = std::mem::take(&mut self.chain);
        for &v in &chain {
            self.mesh.set_walk_ptr(v, None);
        }
        chain
    }

    /// Drops the chain back to its first `len` vertices. Vertices already
    /// spliced into the mesh stay there.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.chain.len() {
            return;
        }
        for &v in &self.chain[len.saturating_sub(1)..] {
            self.mesh.set_walk_ptr(v, None);
        }
        self.chain.truncate(len);
    }

    /// Walks `first -> last`, extending the chain. `first` must be the chain
    /// tail unless the chain is empty. Both ends must already be connected;
    /// the mesh is left untouched when they are not.
    pub fn insert_segment(&mut self, first: VertexId, last: VertexId, swap_first: bool) -> Result<()> {
        if first != last {
            self.mesh.check_connected(first)?;
            self.mesh.check_connected(last)?;
        }
        match self.chain.last() {
            None => self.chain.push(first),
            Some(&tail) if tail == first => {}
            Some(&tail) => {
                return Err(TinError::inconsistent(format!(
                    "segment starts at {first} but the walk ends at {tail}"
                )));
            }
        }
        if first == last {
            return Ok(());
        }
        if swap_first {
            match self.mesh.swap_crossing_edges(first, last) {
                Ok(flips) => log::trace!("pre-swap {first}->{last}: {flips} flips"),
                Err(TinError::SwapFailed { remaining }) => {
                    log::warn!("pre-swap {first}->{last} left {remaining} crossings");
                }
                Err(e) => return Err(e),
            }
        }
        let max_steps = 4 * (self.mesh.vertex_count() + self.mesh.edge_count()) + 64;
        let mut current = first;
        let mut hint = None;
        let mut steps = 0;
        while current != last {
            steps += 1;
            if steps > max_steps {
                return Err(TinError::inconsistent(format!(
                    "walk {first}->{last} did not terminate"
                )));
            }
            if self.mesh.walk_ptr(current).is_some() {
                return Err(TinError::KnotDetected { vertex: current });
            }
            let crossing = self.mesh.get_next_crossing(current, last, hint, self.mode)?;
            log::trace!("walk at {current}: {crossing:?}");
            let next = match crossing {
                Crossing::ThroughVertex(v) => v,
                Crossing::ThroughInteriorEdge { a, b, opposite } => {
                    self.split_crossed_edge(current, last, first, a, b, opposite)?
                }
                Crossing::ThroughHullEdge { a, b } => {
                    if self.mesh.walk_ptr(a) == Some(b) || self.mesh.walk_ptr(b) == Some(a) {
                        return Err(TinError::KnotDetected { vertex: a });
                    }
                    let x = self.crossing_point(current, last, a, b)?;
                    let z = self.crossing_z(a, b, x, first, last);
                    let status = PointStatus::INSERTED | PointStatus::CROSSING;
                    self.mesh.insert_on_hull_edge(a, b, x, z, status)?
                }
                Crossing::External { forward, reentry } => {
                    self.cross_exterior(current, last, first, forward, reentry)?
                }
                Crossing::KnotWillForm => {
                    return Err(TinError::KnotDetected { vertex: current });
                }
            };
            self.step(current, next, first, last)?;
            hint = Some(current);
            current = next;
        }
        Ok(())
    }

    fn step(&mut self, current: VertexId, next: VertexId, seg_start: VertexId, last: VertexId) -> Result<()> {
        if next == current || !self.mesh.ring_has_edge(current, next) {
            return Err(TinError::inconsistent(format!(
                "walk step {current}->{next} is not an edge"
            )));
        }
        if self.mesh.walk_ptr(next).is_some() {
            let closes = self.chain.first() == Some(&next) && next == last;
            if !closes {
                return Err(TinError::KnotDetected { vertex: next });
            }
        }
        if next != last && self.drape == DrapeMode::Break {
            let z = interpolate_segment_z(self.mesh.p3(seg_start), self.mesh.p3(last), self.mesh.xy(next));
            self.mesh.set_z(next, z);
        }
        self.mesh.set_walk_ptr(current, Some(next));
        self.chain.push(next);
        Ok(())
    }

    fn crossing_point(&self, current: VertexId, last: VertexId, a: VertexId, b: VertexId) -> Result<Point> {
        let m = &*self.mesh;
        line_intersection(m.xy(current), m.xy(last), m.xy(a), m.xy(b)).ok_or_else(|| {
            TinError::inconsistent(format!("segment {current}-{last} parallel to edge {a}-{b}"))
        })
    }

    fn crossing_z(&self, a: VertexId, b: VertexId, x: Point, seg_start: VertexId, last: VertexId) -> f64 {
        let m = &*self.mesh;
        match self.drape {
            DrapeMode::Drape => interpolate_segment_z(m.p3(a), m.p3(b), x),
            DrapeMode::Break => interpolate_segment_z(m.p3(seg_start), m.p3(last), x),
        }
    }

    /// Splits interior edge `a - b` where the segment crosses it, after
    /// quad precision repair. Returns the vertex the walk moves to.
    fn split_crossed_edge(
        &mut self,
        current: VertexId,
        last: VertexId,
        seg_start: VertexId,
        a: VertexId,
        b: VertexId,
        opposite: VertexId,
    ) -> Result<VertexId> {
        if self.mesh.walk_ptr(a) == Some(b) || self.mesh.walk_ptr(b) == Some(a) {
            return Err(TinError::KnotDetected { vertex: a });
        }
        let x = self.crossing_point(current, last, a, b)?;
        let tol = *self.mesh.tolerances();
        let m = &*self.mesh;
        let quad = [m.xy(current), m.xy(a), m.xy(opposite), m.xy(b)];
        let pos = if check_quad_precision(&quad, x, tol.machine_tol) {
            match fix_quad_precision(&quad, x, &tol) {
                (fixed, FixKind::Recomputed) => fixed,
                (_, FixKind::SnapToP2) => return Ok(a),
                (_, FixKind::SnapToP4) => return Ok(b),
                (_, FixKind::Unfixable) => return Err(TinError::PrecisionUnfixable),
            }
        } else {
            x
        };
        let z = self.crossing_z(a, b, pos, seg_start, last);
        let status = PointStatus::INSERTED | PointStatus::CROSSING;
        let v = self.mesh.push_vertex(Point3::new(pos.x, pos.y, z), status)?;
        self.mesh.split_interior_edge(a, b, v)?;
        Ok(v)
    }

    /// Handles a segment leaving the hull at `current`.
    fn cross_exterior(
        &mut self,
        current: VertexId,
        last: VertexId,
        seg_start: VertexId,
        forward: bool,
        reentry: Reentry,
    ) -> Result<VertexId> {
        let target = match reentry {
            Reentry::Vertex(h) => h,
            Reentry::Edge { a, b, point } => {
                let z = self.crossing_z(a, b, point, seg_start, last);
                let status = PointStatus::INSERTED | PointStatus::CROSSING;
                self.mesh.insert_on_hull_edge(a, b, point, z, status)?
            }
        };
        if target == current {
            return Err(TinError::inconsistent(format!(
                "reentry of {current}->{last} collapsed onto {current}"
            )));
        }
        if self.mesh.fill_pocket(current, target, forward)? {
            return Ok(target);
        }
        let hop = if forward {
            self.mesh.hull_next(current)
        } else {
            self.mesh.hull_prev(current)
        };
        hop.ok_or_else(|| TinError::inconsistent(format!("{current} left the hull")))
    }
}

impl Drop for WalkSession<'_> {
    fn drop(&mut self) {
        for &v in &self.chain {
            self.mesh.set_walk_ptr(v, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TinConfig, Tolerances};
    use crate::tin::Tin;

    fn square() -> (Mesh, [VertexId; 4]) {
        let mut mesh = Mesh::default();
        let ids = [
            mesh.insert_point(0.0, 0.0, 0.0, false).unwrap(),
            mesh.insert_point(1.0, 0.0, 0.0, false).unwrap(),
            mesh.insert_point(1.0, 1.0, 2.0, false).unwrap(),
            mesh.insert_point(0.0, 1.0, 4.0, false).unwrap(),
        ];
        (mesh, ids)
    }

    #[test]
    fn adjacent_vertices_need_no_crossing() {
        let (mut mesh, [a, b, _, _]) = square();
        let c = mesh.get_next_crossing(a, b, None, WalkMode::Normal).unwrap();
        assert_eq!(c, Crossing::ThroughVertex(b));
    }

    #[test]
    fn diagonal_is_reported_as_interior_crossing() {
        let (mut mesh, [a, b, c, d]) = square();
        match mesh.get_next_crossing(b, d, None, WalkMode::Normal).unwrap() {
            Crossing::ThroughInteriorEdge { a: u, b: w, opposite } => {
                assert_eq!((u, w), (a, c));
                assert_eq!(opposite, d);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn crossing_splits_the_diagonal_once() {
        let (mut mesh, [a, b, c, d]) = square();
        let chain = mesh.insert_segment(b, d, DrapeMode::Drape, false).unwrap();
        assert_eq!(chain.len(), 3);
        let x = chain[1];
        let p = mesh.vertex(x).unwrap();
        assert!((p.x - 0.5).abs() < 1e-12 && (p.y - 0.5).abs() < 1e-12);
        // Drape takes the z of the crossed diagonal.
        assert!((p.z - 1.0).abs() < 1e-12);
        assert!(mesh.status(x).contains(PointStatus::CROSSING));
        assert!(!mesh.ring_has_edge(a, c));
        assert_eq!(mesh.edge_count(), 8);
        assert!(mesh.vertex_ids().all(|v| mesh.walk_ptr(v).is_none()));
        mesh.validate().unwrap();
    }

    #[test]
    fn break_mode_interpolates_along_the_segment() {
        let (mut mesh, [_, b, _, d]) = square();
        let chain = mesh.insert_segment(b, d, DrapeMode::Break, false).unwrap();
        let z = mesh.vertex(chain[1]).unwrap().z;
        assert!((z - 2.0).abs() < 1e-12);
    }

    #[test]
    fn session_clears_scratch_on_drop() {
        let (mut mesh, [_, b, _, d]) = square();
        {
            let mut session = WalkSession::new(&mut mesh, DrapeMode::Drape, WalkMode::Normal);
            session.insert_segment(b, d, false).unwrap();
            assert_eq!(session.chain().len(), 3);
            assert!(session.mesh().walk_ptr(b).is_some());
        }
        assert!(mesh.vertex_ids().all(|v| mesh.walk_ptr(v).is_none()));
    }

    #[test]
    fn revisiting_a_walked_vertex_is_a_knot() {
        let (mut mesh, [a, b, c, _]) = square();
        let mut session = WalkSession::new(&mut mesh, DrapeMode::Drape, WalkMode::Normal);
        session.insert_segment(a, b, false).unwrap();
        session.insert_segment(b, c, false).unwrap();
        let err = session.insert_segment(c, b, false).unwrap_err();
        assert!(matches!(err, TinError::KnotDetected { vertex } if vertex == b));
    }

    #[test]
    fn closing_onto_the_start_is_allowed() {
        let (mut mesh, [a, b, c, _]) = square();
        let mut session = WalkSession::new(&mut mesh, DrapeMode::Drape, WalkMode::Normal);
        session.insert_segment(a, b, false).unwrap();
        session.insert_segment(b, c, false).unwrap();
        session.insert_segment(c, a, false).unwrap();
        assert_eq!(session.finish(), vec![a, b, c, a]);
    }

    #[test]
    fn segment_between_unconnected_vertices_is_refused() {
        let mut mesh = Mesh::default();
        let a = mesh.insert_point(0.0, 0.0, 0.0, false).unwrap();
        mesh.insert_point(1.0, 0.0, 0.0, false).unwrap();
        let c = mesh.insert_point(2.0, 0.0, 0.0, false).unwrap();
        assert!(!mesh.is_triangulated());
        let err = mesh.insert_segment(a, c, DrapeMode::Drape, false).unwrap_err();
        assert!(matches!(err, TinError::Unconnected { vertex } if vertex == a));
        assert!(!err.is_fatal());
        assert_eq!(mesh.vertex_count(), 3);
        mesh.validate().unwrap();
    }

    #[test]
    fn crossing_next_to_a_sliver_is_moved_into_the_quad() {
        // The apex `o` sits half a tolerance right of the crossed edge, so
        // the exact crossing at (5, 0) would flatten triangle (a, o, x).
        let tolerances = Tolerances::new(1e-3, 1e-3, 1e-3).unwrap();
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
                Point3::new(5.0, -1.0, 0.0),
                Point3::new(5.0005, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
            ],
            triangles: vec![[0, 1, 2], [1, 3, 2], [1, 4, 3], [3, 4, 2]],
        };
        let config = TinConfig {
            tolerances,
            ..TinConfig::default()
        };
        let mut mesh = Mesh::from_tin(&tin, config).unwrap();
        let [c, a, b, o, l] = [0, 1, 2, 3, 4].map(VertexId::new);

        let chain = mesh.insert_segment(c, l, DrapeMode::Drape, false).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!((chain[0], chain[2], chain[3]), (c, o, l));
        let v = chain[1];
        assert!(mesh.status(v).contains(PointStatus::CROSSING));
        let pos = mesh.xy(v);
        let exact = Point::new(5.0, 0.0);
        assert!(pos != exact);
        assert!(distance(pos, exact) <= 1.1e-3);
        let quad = [mesh.xy(c), mesh.xy(a), mesh.xy(o), mesh.xy(b)];
        assert!(!check_quad_precision(&quad, pos, tolerances.machine_tol));
        for pair in chain.windows(2) {
            assert!(mesh.ring_has_edge(pair[0], pair[1]));
        }
        mesh.validate().unwrap();
    }
}
