//! Index-based storage for the triangulated surface.
//!
//! Every vertex owns a [`TopologyNode`] holding the head of its neighbour
//! ring, its hull successor and the head of its feature chain entries. Rings
//! list neighbours in clockwise order: for consecutive neighbours `u`, `w` of
//! `v` the triple `(v, u, w)` is a clockwise triangle, except for the single
//! gap `(hull_prev(v), hull_next(v))` at a hull vertex.

pub mod hull;
pub mod ring;

use crate::config::{TinConfig, Tolerances};
use crate::error::{Result, TinError};
use crate::feature::{Feature, FeatureChainEntry};
use crate::geometry::{Point, Point3};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            /// Position of the slot in its arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a vertex.
    VertexId,
    "v"
);
arena_id!(
    /// Handle of a slot in the neighbour ring arena.
    RingEntryId,
    "r"
);
arena_id!(
    /// Handle of a slot in the feature chain arena.
    FeatureEntryId,
    "e"
);
arena_id!(
    /// Handle of a feature in the feature table.
    FeatureId,
    "f"
);

/// Status bits attached to each vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointStatus(u8);

impl PointStatus {
    /// Added by an insertion, as opposed to loaded with a snapshot.
    pub const INSERTED: Self = Self(0b0001);
    /// Hull vertex lying on the bounding box.
    pub const ON_HULL_BBOX: Self = Self(0b0010);
    /// Lies inside a void feature.
    pub const VOID: Self = Self(0b0100);
    /// Relocated by a move-onto-line or rigid insertion.
    pub const MOVED: Self = Self(0b1000);
    /// Created by the engine where a constraint crossed an edge.
    pub const CROSSING: Self = Self(0b1_0000);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for PointStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Per-vertex topology record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyNode {
    pub hull_next: Option<VertexId>,
    pub ring_head: Option<RingEntryId>,
    /// Scratch link used by an active segment walk.
    pub walk_ptr: Option<VertexId>,
    pub feature_head: Option<FeatureEntryId>,
    pub status: PointStatus,
}

/// One neighbour in a vertex ring.
#[derive(Debug, Clone, Copy)]
pub struct RingEntry {
    pub vertex: VertexId,
    pub next: Option<RingEntryId>,
}

/// Axis aligned extent of all vertices.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    fn from_point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    fn extend(&mut self, p: Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Returns `true` when `p` lies on one of the four planar sides.
    pub fn touches(&self, p: Point) -> bool {
        p.x == self.min.x || p.x == self.max.x || p.y == self.min.y || p.y == self.max.y
    }
}

/// The triangulated surface with its hull and feature chains.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub(crate) points: Vec<Point3>,
    pub(crate) nodes: Vec<TopologyNode>,
    pub(crate) ring: Vec<RingEntry>,
    pub(crate) ring_free: Option<RingEntryId>,
    pub(crate) features: Vec<Feature>,
    pub(crate) chain: Vec<FeatureChainEntry>,
    pub(crate) chain_free: Option<FeatureEntryId>,
    pub(crate) hull_entry: Option<VertexId>,
    pub(crate) bbox: Option<BoundingBox>,
    pub(crate) config: TinConfig,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::empty(TinConfig::default())
    }
}

impl Mesh {
    /// Creates an empty mesh after validating `config`.
    pub fn new(config: TinConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::empty(config))
    }

    /// Creates an empty mesh with default settings and the given tolerances.
    pub fn with_tolerances(tolerances: Tolerances) -> Result<Self> {
        Self::new(TinConfig {
            tolerances,
            ..TinConfig::default()
        })
    }

    fn empty(config: TinConfig) -> Self {
        Self {
            points: Vec::new(),
            nodes: Vec::new(),
            ring: Vec::new(),
            ring_free: None,
            features: Vec::new(),
            chain: Vec::new(),
            chain_free: None,
            hull_entry: None,
            bbox: None,
            config,
        }
    }

    pub fn config(&self) -> &TinConfig {
        &self.config
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.config.tolerances
    }

    /// Number of vertices including isolated ones.
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        v.index() < self.points.len()
    }

    /// Coordinates of `v`, if it exists.
    pub fn vertex(&self, v: VertexId) -> Option<Point3> {
        self.points.get(v.index()).copied()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.points.len()).map(VertexId::from_index)
    }

    pub fn node(&self, v: VertexId) -> Option<&TopologyNode> {
        self.nodes.get(v.index())
    }

    pub fn status(&self, v: VertexId) -> PointStatus {
        self.nodes
            .get(v.index())
            .map(|n| n.status)
            .unwrap_or_default()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
    }

    pub(crate) fn check_vertex(&self, v: VertexId) -> Result<()> {
        if self.contains_vertex(v) {
            Ok(())
        } else {
            Err(TinError::UnknownVertex(v))
        }
    }

    /// Fails with `Unconnected` unless `v` has triangles around it.
    pub(crate) fn check_connected(&self, v: VertexId) -> Result<()> {
        self.check_vertex(v)?;
        if self.is_triangulated() && self.ring_degree(v) >= 2 {
            Ok(())
        } else {
            Err(TinError::Unconnected { vertex: v })
        }
    }

    /// Planar position of `v`. Callers pass handles produced by this mesh.
    pub(crate) fn xy(&self, v: VertexId) -> Point {
        self.points[v.index()].xy()
    }

    pub(crate) fn p3(&self, v: VertexId) -> Point3 {
        self.points[v.index()]
    }

    pub(crate) fn node_mut(&mut self, v: VertexId) -> &mut TopologyNode {
        &mut self.nodes[v.index()]
    }

    pub(crate) fn walk_ptr(&self, v: VertexId) -> Option<VertexId> {
        self.nodes[v.index()].walk_ptr
    }

    pub(crate) fn set_walk_ptr(&mut self, v: VertexId, to: Option<VertexId>) {
        self.nodes[v.index()].walk_ptr = to;
    }

    /// Fails with `MemoryExhausted` unless `additional` more vertices fit.
    pub fn reserve_vertices(&mut self, additional: usize) -> Result<()> {
        let wanted = self.points.len().saturating_add(additional);
        if let Some(max) = self.config.max_vertices {
            if wanted > max {
                return Err(TinError::MemoryExhausted);
            }
        }
        if wanted > u32::MAX as usize {
            return Err(TinError::MemoryExhausted);
        }
        self.points
            .try_reserve(additional)
            .map_err(|_| TinError::MemoryExhausted)?;
        self.nodes
            .try_reserve(additional)
            .map_err(|_| TinError::MemoryExhausted)?;
        Ok(())
    }

    /// Appends an unconnected vertex.
    pub(crate) fn push_vertex(&mut self, p: Point3, status: PointStatus) -> Result<VertexId> {
        self.reserve_vertices(1)?;
        let id = VertexId::from_index(self.points.len());
        self.points.push(p);
        self.nodes.push(TopologyNode {
            status,
            ..TopologyNode::default()
        });
        self.extend_bbox(p);
        Ok(id)
    }

    pub(crate) fn set_position(&mut self, v: VertexId, p: Point3) {
        self.points[v.index()] = p;
        self.extend_bbox(p);
    }

    pub(crate) fn set_z(&mut self, v: VertexId, z: f64) {
        self.points[v.index()].z = z;
        let p = self.points[v.index()];
        self.extend_bbox(p);
    }

    fn extend_bbox(&mut self, p: Point3) {
        match self.bbox.as_mut() {
            Some(b) => b.extend(p),
            None => self.bbox = Some(BoundingBox::from_point(p)),
        }
    }

    pub(crate) fn mark(&mut self, v: VertexId, flag: PointStatus) {
        self.nodes[v.index()].status.insert(flag);
    }

    pub(crate) fn unmark(&mut self, v: VertexId, flag: PointStatus) {
        self.nodes[v.index()].status.remove(flag);
    }

    /// Recomputes `ON_HULL_BBOX` after the hull changed.
    pub(crate) fn refresh_bbox_flags(&mut self) {
        let Some(bbox) = self.bbox else {
            return;
        };
        for i in 0..self.nodes.len() {
            let v = VertexId::from_index(i);
            let on = self.nodes[i].hull_next.is_some() && bbox.touches(self.xy(v));
            if on {
                self.mark(v, PointStatus::ON_HULL_BBOX);
            } else {
                self.unmark(v, PointStatus::ON_HULL_BBOX);
            }
        }
    }

    /// `true` once the first triangle exists.
    pub fn is_triangulated(&self) -> bool {
        self.hull_entry.is_some()
    }

    /// Every undirected edge once, with the lower id first.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut out = Vec::new();
        for v in self.vertex_ids() {
            for n in self.ring_neighbors(v) {
                if v < n {
                    out.push((v, n));
                }
            }
        }
        out
    }

    pub fn edge_count(&self) -> usize {
        self.vertex_ids()
            .map(|v| self.ring_neighbors(v).len())
            .sum::<usize>()
            / 2
    }

    /// All triangles in clockwise order, each listed once starting at its
    /// lowest vertex id.
    pub fn triangles(&self) -> Vec<[VertexId; 3]> {
        let mut out = Vec::new();
        for v in self.vertex_ids() {
            let ring = self.ring_neighbors(v);
            for (i, &u) in ring.iter().enumerate() {
                let w = ring[(i + 1) % ring.len()];
                if ring.len() < 2 || self.is_gap(v, u, w) {
                    continue;
                }
                if v < u && v < w {
                    out.push([v, u, w]);
                }
            }
        }
        out
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().len()
    }

    /// Apex `c` of the clockwise triangle `(a, b, c)` on the right of `a -> b`.
    pub fn triangle_right_of(&self, a: VertexId, b: VertexId) -> Option<VertexId> {
        let c = self.ring_next_cw(a, b)?;
        if c == b || self.is_gap(a, b, c) {
            None
        } else {
            Some(c)
        }
    }

    /// Apex `d` of the clockwise triangle `(a, d, b)` on the left of `a -> b`.
    pub fn triangle_left_of(&self, a: VertexId, b: VertexId) -> Option<VertexId> {
        let d = self.ring_next_ccw(a, b)?;
        if d == b || self.is_gap(a, d, b) {
            None
        } else {
            Some(d)
        }
    }

    /// Linear z on the triangle, edge or vertex containing `p`.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        use crate::locate::Location;
        let p = Point::new(x, y);
        match self.locate(p) {
            Location::AtVertex(v) => Some(self.p3(v).z),
            Location::OnEdge(a, b) | Location::OnHullEdge(a, b) => Some(
                crate::geometry::interpolate_segment_z(self.p3(a), self.p3(b), p),
            ),
            Location::InTriangle(a, b, c) => {
                crate::geometry::interpolate_triangle_z(p, self.p3(a), self.p3(b), self.p3(c))
            }
            Location::Outside => None,
        }
    }
}
