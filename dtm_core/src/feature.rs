//! Features: constrained polylines stored as per-vertex chain entries.
//!
//! Every vertex on a feature holds one [`FeatureChainEntry`] for it, linking
//! to the next vertex of the feature. Entries of all features touching a
//! vertex form a list rooted at the vertex's `feature_head`. Released
//! entries go to a free list and are reused.

use std::collections::BTreeSet;

use crate::error::{Result, TinError};
use crate::geometry::{distance, distance_from_line, point_in_polygon, Point, Point3};
use crate::insert::walk::{DrapeMode, StringOptions, WalkMode, WalkSession};
use crate::mesh::{FeatureEntryId, Mesh, PointStatus, VertexId};

pub use crate::mesh::FeatureId;

/// Classification of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FeatureKind {
    /// Hard breakline enforced as triangle edges.
    Breakline,
    /// Breakline used only for smoothing; still enforced as edges.
    SoftBreakline,
    ContourLine,
    Void,
    Island,
    Hole,
    Hull,
    /// Unlinked spot heights. Never constrains the triangulation.
    GroupSpots,
}

impl FeatureKind {
    /// Polygonal kinds are closed back onto their first point.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            FeatureKind::Void | FeatureKind::Island | FeatureKind::Hole | FeatureKind::Hull
        )
    }

    pub fn is_point_cloud(self) -> bool {
        matches!(self, FeatureKind::GroupSpots)
    }

    /// Kinds whose interior vertices are flagged [`PointStatus::VOID`].
    pub fn is_void(self) -> bool {
        matches!(self, FeatureKind::Void | FeatureKind::Hole)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Live,
    Deleted,
}

/// Whether a feature point was supplied by the caller or created where the
/// feature crossed an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Original,
    Inserted,
}

/// Row of the feature table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub kind: FeatureKind,
    pub user_tag: Option<u64>,
    pub first_point: Option<VertexId>,
    pub state: FeatureState,
}

impl Feature {
    pub fn is_live(&self) -> bool {
        self.state == FeatureState::Live
    }

    /// Live and linked, so its links are constraint edges.
    fn constrains(&self) -> bool {
        self.is_live() && !self.kind.is_point_cloud()
    }
}

/// Link `point -> next_point` of one feature, stored at `point`.
#[derive(Debug, Clone, Copy)]
pub struct FeatureChainEntry {
    pub feature: FeatureId,
    pub next_point: Option<VertexId>,
    pub next_entry: Option<FeatureEntryId>,
    pub point_kind: PointKind,
}

impl Mesh {
    /// Grows the chain arena so `additional` more entries fit without
    /// touching the free list. Fails before anything is changed.
    pub(crate) fn reserve_chain_entries(&mut self, additional: usize) -> Result<()> {
        if self.chain.len().saturating_add(additional) > u32::MAX as usize {
            return Err(TinError::MemoryExhausted);
        }
        self.chain
            .try_reserve(additional)
            .map_err(|_| TinError::MemoryExhausted)
    }

    fn alloc_chain_entry(&mut self, entry: FeatureChainEntry) -> Result<FeatureEntryId> {
        match self.chain_free {
            Some(id) => {
                self.chain_free = self.chain[id.index()].next_entry;
                self.chain[id.index()] = entry;
                Ok(id)
            }
            None => {
                self.reserve_chain_entries(1)?;
                let id = FeatureEntryId::from_index(self.chain.len());
                self.chain.push(entry);
                Ok(id)
            }
        }
    }

    fn free_chain_entry(&mut self, id: FeatureEntryId) {
        let slot = &mut self.chain[id.index()];
        slot.next_point = None;
        slot.next_entry = self.chain_free;
        self.chain_free = Some(id);
    }

    /// Appends an entry for `feature` at the tail of `v`'s list.
    fn attach_entry(
        &mut self,
        v: VertexId,
        feature: FeatureId,
        next_point: Option<VertexId>,
        point_kind: PointKind,
    ) -> Result<FeatureEntryId> {
        let id = self.alloc_chain_entry(FeatureChainEntry {
            feature,
            next_point,
            next_entry: None,
            point_kind,
        })?;
        match self.entries_at(v).last() {
            Some(&tail) => self.chain[tail.index()].next_entry = Some(id),
            None => self.node_mut(v).feature_head = Some(id),
        }
        Ok(id)
    }

    fn detach_entry(&mut self, v: VertexId, id: FeatureEntryId) -> Result<()> {
        let entries = self.entries_at(v);
        let pos = entries
            .iter()
            .position(|&e| e == id)
            .ok_or_else(|| TinError::inconsistent(format!("entry {id} not listed at {v}")))?;
        let next = self.chain[id.index()].next_entry;
        match pos.checked_sub(1) {
            Some(p) => self.chain[entries[p].index()].next_entry = next,
            None => self.node_mut(v).feature_head = next,
        }
        self.free_chain_entry(id);
        Ok(())
    }

    fn entries_at(&self, v: VertexId) -> Vec<FeatureEntryId> {
        let mut out = Vec::new();
        let mut cur = self.nodes.get(v.index()).and_then(|n| n.feature_head);
        while let Some(id) = cur {
            out.push(id);
            cur = self.chain[id.index()].next_entry;
        }
        out
    }

    fn entry_of(&self, v: VertexId, feature: FeatureId) -> Option<FeatureEntryId> {
        self.entries_at(v)
            .into_iter()
            .find(|e| self.chain[e.index()].feature == feature)
    }

    fn feature_row(&self, id: FeatureId) -> Result<&Feature> {
        self.features
            .get(id.index())
            .ok_or(TinError::UnknownFeature(id))
    }

    /// Appends a feature over `verts`, linking the last vertex back to the
    /// first when `closed`.
    pub(crate) fn create_feature(
        &mut self,
        kind: FeatureKind,
        user_tag: Option<u64>,
        verts: &[VertexId],
        closed: bool,
        point_kind: &dyn Fn(VertexId) -> PointKind,
    ) -> Result<FeatureId> {
        if self.features.len() >= u32::MAX as usize {
            return Err(TinError::MemoryExhausted);
        }
        self.features
            .try_reserve(1)
            .map_err(|_| TinError::MemoryExhausted)?;
        self.reserve_chain_entries(verts.len())?;
        let id = FeatureId::from_index(self.features.len());
        self.features.push(Feature {
            kind,
            user_tag,
            first_point: verts.first().copied(),
            state: if verts.is_empty() {
                FeatureState::Deleted
            } else {
                FeatureState::Live
            },
        });
        for (i, &v) in verts.iter().enumerate() {
            let next = match verts.get(i + 1) {
                Some(&n) => Some(n),
                None if closed && verts.len() > 2 => Some(verts[0]),
                None => None,
            };
            self.attach_entry(v, id, next, point_kind(v))?;
        }
        log::debug!("feature {id} ({kind:?}) over {} vertices", verts.len());
        Ok(id)
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.index())
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn live_features(&self) -> Vec<FeatureId> {
        self.features
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_live())
            .map(|(i, _)| FeatureId::from_index(i))
            .collect()
    }

    /// Features with an entry at `v`, in list order.
    pub fn features_at_vertex(&self, v: VertexId) -> Vec<FeatureId> {
        self.entries_at(v)
            .into_iter()
            .map(|e| self.chain[e.index()].feature)
            .collect()
    }

    /// Vertices of the feature from its first point. A closed feature does
    /// not repeat its first point.
    pub fn feature_vertices(&self, id: FeatureId) -> Result<Vec<VertexId>> {
        let row = self.feature_row(id)?;
        let mut out = Vec::new();
        let Some(first) = row.first_point else {
            return Ok(out);
        };
        let mut cur = Some(first);
        while let Some(v) = cur {
            out.push(v);
            if out.len() > self.vertex_count() {
                return Err(TinError::inconsistent(format!("feature {id} does not terminate")));
            }
            let entry = self
                .entry_of(v, id)
                .ok_or_else(|| TinError::inconsistent(format!("feature {id} lost its entry at {v}")))?;
            cur = self.chain[entry.index()].next_point.filter(|&n| n != first);
        }
        Ok(out)
    }

    pub fn feature_points(&self, id: FeatureId) -> Result<Vec<Point3>> {
        Ok(self
            .feature_vertices(id)?
            .into_iter()
            .map(|v| self.p3(v))
            .collect())
    }

    /// `true` when the last point links back to the first.
    pub fn is_feature_closed(&self, id: FeatureId) -> bool {
        let Some(first) = self.feature(id).and_then(|f| f.first_point) else {
            return false;
        };
        self.prior_feature_point(id, first).is_some()
    }

    pub fn next_feature_point(&self, id: FeatureId, v: VertexId) -> Option<VertexId> {
        let entry = self.entry_of(v, id)?;
        self.chain[entry.index()].next_point
    }

    pub fn prior_feature_point(&self, id: FeatureId, v: VertexId) -> Option<VertexId> {
        let first = self.feature(id)?.first_point?;
        let mut cur = first;
        for _ in 0..=self.vertex_count() {
            let next = self.next_feature_point(id, cur)?;
            if next == v {
                return Some(cur);
            }
            if next == first {
                return None;
            }
            cur = next;
        }
        None
    }

    pub fn point_kind(&self, id: FeatureId, v: VertexId) -> Option<PointKind> {
        let entry = self.entry_of(v, id)?;
        Some(self.chain[entry.index()].point_kind)
    }

    /// Live linked features with a direct link between `a` and `b`.
    pub fn features_on_line(&self, a: VertexId, b: VertexId) -> Vec<FeatureId> {
        let mut out = Vec::new();
        for (from, to) in [(a, b), (b, a)] {
            for e in self.entries_at(from) {
                let entry = self.chain[e.index()];
                let live = self
                    .feature(entry.feature)
                    .map_or(false, Feature::constrains);
                if live && entry.next_point == Some(to) && !out.contains(&entry.feature) {
                    out.push(entry.feature);
                }
            }
        }
        out
    }

    /// `true` when `a - b` is a link of a breakline, contour or polygon.
    pub fn is_constraint_line(&self, a: VertexId, b: VertexId) -> bool {
        !self.features_on_line(a, b).is_empty()
    }

    /// Vertices linked to `v` by any constraining feature.
    pub fn feature_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out = Vec::new();
        for id in self.features_at_vertex(v) {
            if !self.feature(id).map_or(false, Feature::constrains) {
                continue;
            }
            for n in [self.next_feature_point(id, v), self.prior_feature_point(id, v)]
                .into_iter()
                .flatten()
            {
                if !out.contains(&n) {
                    out.push(n);
                }
            }
        }
        out
    }

    /// Routes every feature link `a - b` through `x` after the edge was
    /// split at `x`.
    pub(crate) fn split_feature_across_edge(&mut self, a: VertexId, b: VertexId, x: VertexId) -> Result<()> {
        for (from, to) in [(a, b), (b, a)] {
            for e in self.entries_at(from) {
                let entry = self.chain[e.index()];
                if entry.next_point != Some(to) {
                    continue;
                }
                if !self.feature(entry.feature).map_or(false, Feature::constrains) {
                    continue;
                }
                self.chain[e.index()].next_point = Some(x);
                self.attach_entry(x, entry.feature, Some(to), PointKind::Inserted)?;
                log::debug!("feature {} split at {x} between {from} and {to}", entry.feature);
            }
        }
        Ok(())
    }

    /// `true` when moving `cand` onto the line `a - b` would fold a feature.
    /// That happens when some feature already links `a` and `b` directly, or
    /// when a feature link of `cand` would shrink below `point_point_tol`
    /// once `cand` sits at its foot on the line.
    pub fn check_would_create_knot(&self, a: VertexId, b: VertexId, cand: VertexId) -> bool {
        let foot = distance_from_line(self.xy(a), self.xy(b), self.xy(cand)).foot;
        self.move_would_create_knot(cand, foot, Some((a, b)))
    }

    /// Knot test for moving `cand` to `to`, optionally onto the line `a - b`.
    pub(crate) fn move_would_create_knot(
        &self,
        cand: VertexId,
        to: Point,
        line: Option<(VertexId, VertexId)>,
    ) -> bool {
        if let Some((a, b)) = line {
            if let Some(f) = self.features_on_line(a, b).first() {
                log::debug!("moving {cand} onto {a}-{b} would fold feature {f}");
                return true;
            }
        }
        let ppt = self.tolerances().point_point_tol;
        match self
            .feature_neighbors(cand)
            .into_iter()
            .find(|&n| distance(self.xy(n), to) <= ppt)
        {
            Some(n) => {
                log::debug!("moving {cand} would collapse its feature link to {n}");
                true
            }
            None => false,
        }
    }

    /// Drops `v` from feature `id`, linking its prior point to its next one.
    /// Returns `false` when `v` is not on the feature.
    ///
    /// When the new link is not a mesh edge it is walked into the mesh and
    /// the feature is threaded through every vertex the walk passes, which
    /// may include `v` itself when it lies on the link. A link that cannot
    /// be walked removes the whole feature.
    pub fn remove_vertex_from_feature(&mut self, v: VertexId, id: FeatureId) -> Result<bool> {
        self.check_vertex(v)?;
        self.feature_row(id)?;
        let Some(entry) = self.entry_of(v, id) else {
            return Ok(false);
        };
        let next = self.chain[entry.index()].next_point;
        let prior = self.prior_feature_point(id, v);
        self.detach_entry(v, entry)?;
        if let Some(p) = prior {
            if let Some(pe) = self.entry_of(p, id) {
                self.chain[pe.index()].next_point = next.filter(|&n| n != p);
            }
        }
        if self.features[id.index()].first_point == Some(v) {
            self.features[id.index()].first_point = next.filter(|&n| n != v);
        }
        if self.features[id.index()].first_point.is_none() {
            self.features[id.index()].state = FeatureState::Deleted;
            log::debug!("feature {id} deleted with its last point {v}");
            self.after_edit()?;
            return Ok(true);
        }
        // Two points cannot form a ring.
        let verts = self.feature_vertices(id)?;
        if verts.len() == 2 && self.next_feature_point(id, verts[1]) == Some(verts[0]) {
            if let Some(e) = self.entry_of(verts[1], id) {
                self.chain[e.index()].next_point = None;
            }
        }
        if let (Some(p), Some(n)) = (prior, next) {
            let linked = p != n && self.next_feature_point(id, p) == Some(n);
            if linked && self.features[id.index()].constrains() && !self.ring_has_edge(p, n) {
                self.reroute_feature_link(id, p, n)?;
            }
        }
        self.after_edit()?;
        Ok(true)
    }

    /// Walks the link `p -> n` of feature `id` into the mesh and threads the
    /// feature through the walk chain.
    fn reroute_feature_link(&mut self, id: FeatureId, p: VertexId, n: VertexId) -> Result<()> {
        let walked = {
            let mut session = WalkSession::new(self, DrapeMode::Drape, WalkMode::Normal);
            session.insert_segment(p, n, true).map(|()| session.finish())
        };
        let chain = match walked {
            Ok(chain) => chain,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::debug!("feature {id} link {p}-{n} cannot be walked ({e}), removing it");
                return self.release_feature(id);
            }
        };
        let inner = chain.get(1..chain.len().saturating_sub(1)).unwrap_or(&[]);
        if inner.iter().any(|&x| self.entry_of(x, id).is_some()) {
            log::debug!("feature {id} link {p}-{n} runs into the feature itself, removing it");
            return self.release_feature(id);
        }
        self.reserve_chain_entries(inner.len())?;
        let mut tail = self
            .entry_of(p, id)
            .ok_or_else(|| TinError::inconsistent(format!("feature {id} lost its entry at {p}")))?;
        for &x in inner {
            self.chain[tail.index()].next_point = Some(x);
            tail = self.attach_entry(x, id, Some(n), PointKind::Inserted)?;
        }
        log::debug!("feature {id} link {p}-{n} rerouted through {} vertices", inner.len());
        Ok(())
    }

    /// Drops `v` from every feature. Returns the number of features touched.
    pub fn remove_vertex_from_all_features(&mut self, v: VertexId) -> Result<usize> {
        let ids = self.features_at_vertex(v);
        for &id in &ids {
            self.remove_vertex_from_feature(v, id)?;
        }
        Ok(ids.len())
    }

    /// Releases every chain entry of the feature and marks it deleted. Other
    /// feature ids are unchanged.
    pub fn remove_feature(&mut self, id: FeatureId) -> Result<()> {
        self.release_feature(id)?;
        self.after_edit()
    }

    fn release_feature(&mut self, id: FeatureId) -> Result<()> {
        let verts = self.feature_vertices(id)?;
        for v in verts {
            if let Some(e) = self.entry_of(v, id) {
                self.detach_entry(v, e)?;
            }
        }
        let row = &mut self.features[id.index()];
        row.first_point = None;
        row.state = FeatureState::Deleted;
        log::debug!("feature {id} removed");
        Ok(())
    }

    /// `true` when every link of the feature is a mesh edge.
    pub fn check_feature_connectivity(&self, id: FeatureId) -> Result<bool> {
        let verts = self.feature_vertices(id)?;
        if self.feature_row(id)?.kind.is_point_cloud() {
            return Ok(true);
        }
        let mut links: Vec<(VertexId, VertexId)> = verts.windows(2).map(|w| (w[0], w[1])).collect();
        if let (Some(&last), Some(&first)) = (verts.last(), verts.first()) {
            if verts.len() > 2 && self.next_feature_point(id, last) == Some(first) {
                links.push((last, first));
            }
        }
        Ok(links.into_iter().all(|(a, b)| self.ring_has_edge(a, b)))
    }

    /// Inserts the points of a feature and walks it into the mesh as
    /// constrained edges. Closed kinds are joined back to their first point.
    ///
    /// An open feature that would cross its own walk is split at that
    /// segment: the walked part is kept as one feature and the rest starts a
    /// new feature of the same kind and tag. Closed kinds fail with
    /// `KnotDetected` instead.
    pub fn add_feature(
        &mut self,
        kind: FeatureKind,
        points: &[Point3],
        user_tag: Option<u64>,
    ) -> Result<Vec<FeatureId>> {
        let opts = StringOptions {
            drape: DrapeMode::Break,
            swap_first: true,
            closed: kind.is_closed(),
            ..StringOptions::default()
        };
        let verts = self.insert_string_points(points, opts)?;
        if verts.is_empty() {
            return Ok(Vec::new());
        }
        let originals: BTreeSet<VertexId> = verts.iter().copied().collect();
        let point_kind = |v: VertexId| {
            if originals.contains(&v) {
                PointKind::Original
            } else {
                PointKind::Inserted
            }
        };

        if kind.is_point_cloud() || verts.len() == 1 {
            let mut seen = BTreeSet::new();
            let spots: Vec<VertexId> = verts.into_iter().filter(|v| seen.insert(*v)).collect();
            let id = self.create_feature(kind, user_tag, &spots, false, &point_kind)?;
            self.after_edit()?;
            return Ok(vec![id]);
        }

        let mut out = Vec::new();
        let mut start = 0;
        while start + 1 < verts.len() {
            let mut session = WalkSession::new(self, DrapeMode::Break, WalkMode::Normal);
            let mut restart = None;
            for i in start + 1..verts.len() {
                let kept = session.chain().len();
                match session.insert_segment(verts[i - 1], verts[i], true) {
                    Ok(()) => {}
                    Err(TinError::KnotDetected { vertex }) if !kind.is_closed() && i > start + 1 => {
                        log::debug!("feature knot at {vertex}, splitting before point {i}");
                        session.truncate(kept);
                        restart = Some(i - 1);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            let chain = session.finish();
            if let Some(id) = self.commit_chain(kind, user_tag, chain, &point_kind)? {
                out.push(id);
            }
            match restart {
                Some(i) => start = i,
                None => break,
            }
        }
        self.after_edit()?;
        Ok(out)
    }

    fn commit_chain(
        &mut self,
        kind: FeatureKind,
        user_tag: Option<u64>,
        mut chain: Vec<VertexId>,
        point_kind: &dyn Fn(VertexId) -> PointKind,
    ) -> Result<Option<FeatureId>> {
        let mut closed = false;
        if chain.len() > 1 && chain.first() == chain.last() {
            chain.pop();
            closed = chain.len() > 2;
        }
        if chain.len() < 2 {
            return Ok(None);
        }
        let id = self.create_feature(kind, user_tag, &chain, closed, point_kind)?;
        if closed && kind.is_void() {
            self.mark_void_interior(&chain);
        }
        Ok(Some(id))
    }

    fn mark_void_interior(&mut self, ring: &[VertexId]) {
        let poly: Vec<Point> = ring.iter().map(|&v| self.xy(v)).collect();
        let on_ring: BTreeSet<VertexId> = ring.iter().copied().collect();
        let inside: Vec<VertexId> = self
            .vertex_ids()
            .filter(|v| !on_ring.contains(v) && point_in_polygon(self.xy(*v), &poly))
            .collect();
        for v in inside {
            self.mark(v, PointStatus::VOID);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> (Mesh, [VertexId; 4]) {
        let mut mesh = Mesh::default();
        let ids = [
            mesh.insert_point(0.0, 0.0, 0.0, false).unwrap(),
            mesh.insert_point(size, 0.0, 0.0, false).unwrap(),
            mesh.insert_point(size, size, 0.0, false).unwrap(),
            mesh.insert_point(0.0, size, 0.0, false).unwrap(),
        ];
        (mesh, ids)
    }

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn kinds_classify() {
        assert!(FeatureKind::Void.is_closed());
        assert!(FeatureKind::Hull.is_closed());
        assert!(!FeatureKind::Breakline.is_closed());
        assert!(FeatureKind::GroupSpots.is_point_cloud());
        assert!(FeatureKind::Hole.is_void());
        assert!(!FeatureKind::Island.is_void());
    }

    #[test]
    fn breakline_records_crossing_vertex() {
        let (mut mesh, [a, b, c, d]) = square(1.0);
        let ids = mesh
            .add_feature(FeatureKind::Breakline, &[p(1.0, 0.0), p(0.0, 1.0)], Some(7))
            .unwrap();
        assert_eq!(ids.len(), 1);
        let f = ids[0];
        assert_eq!(mesh.feature(f).unwrap().user_tag, Some(7));
        let verts = mesh.feature_vertices(f).unwrap();
        // The pre-swap pass turns the diagonal, so no vertex is needed.
        assert_eq!(verts, vec![b, d]);
        assert!(mesh.is_constraint_line(b, d));
        assert!(!mesh.ring_has_edge(a, c));
        assert_eq!(mesh.point_kind(f, b), Some(PointKind::Original));
        assert!(mesh.check_feature_connectivity(f).unwrap());
    }

    #[test]
    fn splitting_an_edge_extends_the_feature() {
        let (mut mesh, [a, _, c, _]) = square(1.0);
        let f = mesh
            .add_feature(FeatureKind::Breakline, &[p(0.0, 0.0), p(1.0, 1.0)], None)
            .unwrap()[0];
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, c]);
        let x = mesh.insert_point(0.5, 0.5, 0.0, false).unwrap();
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, x, c]);
        assert_eq!(mesh.point_kind(f, x), Some(PointKind::Inserted));
        assert_eq!(mesh.prior_feature_point(f, x), Some(a));
        assert_eq!(mesh.next_feature_point(f, x), Some(c));
        assert_eq!(mesh.feature_neighbors(x), vec![c, a]);
        assert!(mesh.check_would_create_knot(a, x, c));
        assert!(mesh.check_feature_connectivity(f).unwrap());
    }

    #[test]
    fn removing_a_point_on_the_link_keeps_it_as_inserted() {
        let (mut mesh, [a, _, c, _]) = square(1.0);
        let f = mesh
            .add_feature(
                FeatureKind::Breakline,
                &[p(0.0, 0.0), p(0.5, 0.5), p(1.0, 1.0)],
                None,
            )
            .unwrap()[0];
        let x = mesh.feature_vertices(f).unwrap()[1];
        assert_eq!(mesh.point_kind(f, x), Some(PointKind::Original));
        assert!(!mesh.ring_has_edge(a, c));

        // The only way from a to c runs through x.
        assert!(mesh.remove_vertex_from_feature(x, f).unwrap());
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, x, c]);
        assert_eq!(mesh.point_kind(f, x), Some(PointKind::Inserted));
        assert!(mesh.check_feature_connectivity(f).unwrap());
        mesh.validate().unwrap();
    }

    #[test]
    fn removing_points_relinks_and_deletes() {
        let (mut mesh, [a, _, c, _]) = square(1.0);
        let f = mesh
            .add_feature(FeatureKind::Breakline, &[p(0.0, 0.0), p(1.0, 1.0)], None)
            .unwrap()[0];
        let x = mesh.insert_point(0.5, 0.5, 0.0, false).unwrap();
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, x, c]);
        assert_eq!(mesh.remove_vertex_from_all_features(a).unwrap(), 1);
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![x, c]);
        assert!(!mesh.remove_vertex_from_feature(a, f).unwrap());
        mesh.remove_vertex_from_feature(c, f).unwrap();
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![x]);
        mesh.remove_vertex_from_feature(x, f).unwrap();
        assert_eq!(mesh.feature(f).unwrap().state, FeatureState::Deleted);
        assert!(mesh.live_features().is_empty());
        mesh.validate().unwrap();
    }

    #[test]
    fn removed_point_off_the_line_is_walked_around() {
        let (mut mesh, [a, _, c, _]) = square(4.0);
        let f = mesh
            .add_feature(
                FeatureKind::Breakline,
                &[p(0.0, 0.0), p(3.0, 1.0), p(4.0, 4.0)],
                None,
            )
            .unwrap()[0];
        let m = mesh.feature_vertices(f).unwrap()[1];
        // Splitting the diagonal leaves no edge between a and c.
        let x = mesh.insert_point(2.0, 2.0, 0.0, false).unwrap();
        assert!(!mesh.ring_has_edge(a, c));

        assert!(mesh.remove_vertex_from_feature(m, f).unwrap());
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, x, c]);
        assert_eq!(mesh.point_kind(f, x), Some(PointKind::Inserted));
        assert!(mesh.features_at_vertex(m).is_empty());
        assert!(mesh.check_feature_connectivity(f).unwrap());
        mesh.validate().unwrap();
    }

    #[test]
    fn knot_check_looks_at_the_candidate_links() {
        let config = crate::config::TinConfig {
            tolerances: crate::config::Tolerances::new(1.5, 0.5, 1e-9).unwrap(),
            ..Default::default()
        };
        let mut mesh = Mesh::new(config).unwrap();
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            mesh.insert_point(x, y, 0.0, false).unwrap();
        }
        let [a, b, _, _] = [0, 1, 2, 3].map(VertexId::new);
        let f = mesh
            .add_feature(FeatureKind::Breakline, &[p(5.0, 1.0), p(5.0, 5.0)], None)
            .unwrap()[0];
        let verts = mesh.feature_vertices(f).unwrap();
        assert_eq!(verts.len(), 2);
        let (m, n) = (verts[0], verts[1]);
        assert!(mesh.check_would_create_knot(m, n, a));
        // n dropped onto a - b would land one unit from m.
        assert!(mesh.check_would_create_knot(a, b, n));
        assert!(!mesh.check_would_create_knot(a, b, m));
        assert!(!mesh.check_would_create_knot(a, b, VertexId::new(3)));
    }

    #[test]
    fn chain_arena_refuses_to_outgrow_its_ids() {
        let (mut mesh, _) = square(1.0);
        assert!(matches!(
            mesh.reserve_chain_entries(usize::MAX),
            Err(TinError::MemoryExhausted)
        ));
        let slots = mesh.chain.len();
        mesh.add_feature(FeatureKind::ContourLine, &[p(0.0, 0.0), p(1.0, 1.0)], None)
            .unwrap();
        assert_eq!(mesh.chain.len(), slots + 2);
    }

    #[test]
    fn removed_feature_frees_entries_for_reuse() {
        let (mut mesh, _) = square(1.0);
        let f = mesh
            .add_feature(FeatureKind::ContourLine, &[p(0.0, 0.0), p(1.0, 1.0)], None)
            .unwrap()[0];
        let slots = mesh.chain.len();
        mesh.remove_feature(f).unwrap();
        assert!(mesh.features_at_vertex(VertexId::new(0)).is_empty());
        assert!(!mesh.is_constraint_line(VertexId::new(0), VertexId::new(2)));
        let g = mesh
            .add_feature(FeatureKind::ContourLine, &[p(0.0, 0.0), p(1.0, 1.0)], None)
            .unwrap()[0];
        assert_ne!(f, g);
        assert_eq!(mesh.chain.len(), slots);
        assert!(matches!(
            mesh.remove_feature(FeatureId::new(99)),
            Err(TinError::UnknownFeature(_))
        ));
    }

    #[test]
    fn spot_groups_do_not_constrain() {
        let (mut mesh, [a, b, _, _]) = square(1.0);
        let f = mesh
            .add_feature(
                FeatureKind::GroupSpots,
                &[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)],
                None,
            )
            .unwrap()[0];
        assert_eq!(mesh.feature_vertices(f).unwrap(), vec![a, b]);
        assert!(!mesh.is_constraint_line(a, b));
        assert!(mesh.feature_neighbors(a).is_empty());
    }

    #[test]
    fn void_flags_interior_vertices() {
        let (mut mesh, corners) = square(4.0);
        let centre = mesh.insert_point(2.0, 2.0, 0.0, false).unwrap();
        let f = mesh
            .add_feature(
                FeatureKind::Void,
                &[p(1.0, 1.0), p(3.0, 1.0), p(3.0, 3.0), p(1.0, 3.0)],
                None,
            )
            .unwrap()[0];
        assert!(mesh.is_feature_closed(f));
        assert!(mesh.status(centre).contains(PointStatus::VOID));
        for v in corners {
            assert!(!mesh.status(v).contains(PointStatus::VOID));
        }
        assert!(mesh.check_feature_connectivity(f).unwrap());
        mesh.validate().unwrap();
    }

    #[test]
    fn self_crossing_breakline_is_split() {
        let (mut mesh, [c0, c1, c2, c3]) = square(4.0);
        let centre = mesh.insert_point(2.0, 2.0, 0.0, false).unwrap();
        let ids = mesh
            .add_feature(
                FeatureKind::Breakline,
                &[p(0.0, 0.0), p(4.0, 4.0), p(4.0, 0.0), p(0.0, 4.0)],
                Some(3),
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(mesh.feature_vertices(ids[0]).unwrap(), vec![c0, centre, c2, c1]);
        assert_eq!(mesh.feature_vertices(ids[1]).unwrap(), vec![c1, centre, c3]);
        assert_eq!(mesh.feature(ids[1]).unwrap().user_tag, Some(3));
        assert!(mesh.vertex_ids().all(|v| mesh.walk_ptr(v).is_none()));
        mesh.validate().unwrap();
    }

    #[test]
    fn self_crossing_polygon_is_rejected() {
        let (mut mesh, _) = square(4.0);
        mesh.insert_point(2.0, 2.0, 0.0, false).unwrap();
        let err = mesh
            .add_feature(
                FeatureKind::Island,
                &[p(0.0, 0.0), p(4.0, 4.0), p(4.0, 0.0), p(0.0, 4.0)],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, TinError::KnotDetected { .. }));
        assert!(mesh.vertex_ids().all(|v| mesh.walk_ptr(v).is_none()));
    }
}
