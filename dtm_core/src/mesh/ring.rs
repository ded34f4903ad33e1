//! Neighbour ring operations.
//!
//! A ring is a singly linked list of [`RingEntry`] slots rooted at the
//! vertex's `ring_head`, read cyclically in clockwise order. Released slots
//! go onto a free list and are reused by later inserts.

use super::{Mesh, RingEntry, RingEntryId, VertexId};
use crate::error::{Result, TinError};

impl Mesh {
    /// Neighbours of `v` in clockwise order starting at the ring head.
    pub fn ring_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(v.index()) else {
            return out;
        };
        let mut cur = node.ring_head;
        while let Some(id) = cur {
            let entry = self.ring[id.index()];
            out.push(entry.vertex);
            cur = entry.next;
            if out.len() > self.ring.len() {
                break;
            }
        }
        out
    }

    pub fn ring_degree(&self, v: VertexId) -> usize {
        self.ring_neighbors(v).len()
    }

    pub fn ring_has_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.find_entry(a, b).is_some()
    }

    /// Neighbour following `from` clockwise around `v`.
    pub fn ring_next_cw(&self, v: VertexId, from: VertexId) -> Option<VertexId> {
        let (_, id) = self.find_entry(v, from)?;
        match self.ring[id.index()].next {
            Some(next) => Some(self.ring[next.index()].vertex),
            None => {
                let head = self.nodes[v.index()].ring_head?;
                Some(self.ring[head.index()].vertex)
            }
        }
    }

    /// Neighbour preceding `from` clockwise around `v`.
    pub fn ring_next_ccw(&self, v: VertexId, from: VertexId) -> Option<VertexId> {
        let (prev, id) = self.find_entry(v, from)?;
        match prev {
            Some(p) => Some(self.ring[p.index()].vertex),
            None => {
                // `from` is the head; its predecessor is the tail.
                let mut cur = id;
                while let Some(next) = self.ring[cur.index()].next {
                    cur = next;
                }
                Some(self.ring[cur.index()].vertex)
            }
        }
    }

    /// Locates `target` in the ring of `v`, returning the preceding slot and
    /// the slot itself.
    fn find_entry(
        &self,
        v: VertexId,
        target: VertexId,
    ) -> Option<(Option<RingEntryId>, RingEntryId)> {
        let node = self.nodes.get(v.index())?;
        let mut prev = None;
        let mut cur = node.ring_head;
        let mut steps = 0usize;
        while let Some(id) = cur {
            let entry = self.ring[id.index()];
            if entry.vertex == target {
                return Some((prev, id));
            }
            prev = Some(id);
            cur = entry.next;
            steps += 1;
            if steps > self.ring.len() {
                break;
            }
        }
        None
    }

    /// Grows the ring arena so `additional` more slots fit without
    /// touching the free list. Fails before anything is changed.
    pub(crate) fn reserve_ring_entries(&mut self, additional: usize) -> Result<()> {
        if self.ring.len().saturating_add(additional) > u32::MAX as usize {
            return Err(TinError::MemoryExhausted);
        }
        self.ring
            .try_reserve(additional)
            .map_err(|_| TinError::MemoryExhausted)
    }

    fn alloc_ring_entry(&mut self, vertex: VertexId, next: Option<RingEntryId>) -> Result<RingEntryId> {
        match self.ring_free {
            Some(id) => {
                self.ring_free = self.ring[id.index()].next;
                self.ring[id.index()] = RingEntry { vertex, next };
                Ok(id)
            }
            None => {
                self.reserve_ring_entries(1)?;
                let id = RingEntryId::from_index(self.ring.len());
                self.ring.push(RingEntry { vertex, next });
                Ok(id)
            }
        }
    }

    fn free_ring_entry(&mut self, id: RingEntryId) {
        self.ring[id.index()].next = self.ring_free;
        self.ring_free = Some(id);
    }

    /// Appends `neighbor` at the tail of the ring of `v`. Used while a ring is
    /// built from scratch.
    pub(crate) fn ring_push(&mut self, v: VertexId, neighbor: VertexId) -> Result<()> {
        if self.ring_has_edge(v, neighbor) {
            return Err(TinError::inconsistent(format!(
                "edge {v}-{neighbor} already in ring"
            )));
        }
        let id = self.alloc_ring_entry(neighbor, None)?;
        match self.nodes[v.index()].ring_head {
            None => self.nodes[v.index()].ring_head = Some(id),
            Some(head) => {
                let mut cur = head;
                while let Some(next) = self.ring[cur.index()].next {
                    cur = next;
                }
                self.ring[cur.index()].next = Some(id);
            }
        }
        Ok(())
    }

    /// Inserts `neighbor` into the ring of `v` directly clockwise after
    /// `after`. Only the ring of `v` changes.
    pub fn ring_insert_after(
        &mut self,
        v: VertexId,
        neighbor: VertexId,
        after: VertexId,
    ) -> Result<()> {
        if self.ring_has_edge(v, neighbor) {
            return Err(TinError::inconsistent(format!(
                "edge {v}-{neighbor} already in ring"
            )));
        }
        let (_, at) = self.find_entry(v, after).ok_or_else(|| {
            TinError::inconsistent(format!("{after} is not a neighbour of {v}"))
        })?;
        let next = self.ring[at.index()].next;
        let id = self.alloc_ring_entry(neighbor, next)?;
        self.ring[at.index()].next = Some(id);
        Ok(())
    }

    /// Inserts `neighbor` into the ring of `v` directly before `before`.
    pub fn ring_insert_before(
        &mut self,
        v: VertexId,
        neighbor: VertexId,
        before: VertexId,
    ) -> Result<()> {
        let prev = self.ring_next_ccw(v, before).ok_or_else(|| {
            TinError::inconsistent(format!("{before} is not a neighbour of {v}"))
        })?;
        self.ring_insert_after(v, neighbor, prev)
    }

    fn ring_remove_one(&mut self, v: VertexId, neighbor: VertexId) -> Result<()> {
        let (prev, id) = self.find_entry(v, neighbor).ok_or_else(|| {
            TinError::inconsistent(format!("{neighbor} is not a neighbour of {v}"))
        })?;
        let next = self.ring[id.index()].next;
        match prev {
            Some(p) => self.ring[p.index()].next = next,
            None => self.nodes[v.index()].ring_head = next,
        }
        self.free_ring_entry(id);
        Ok(())
    }

    /// Removes the undirected edge `a - b` from both rings.
    pub fn ring_delete(&mut self, a: VertexId, b: VertexId) -> Result<()> {
        self.ring_remove_one(a, b)?;
        self.ring_remove_one(b, a)
    }

    /// Number of ring slots currently in use.
    pub fn ring_slots_in_use(&self) -> usize {
        let mut free = 0;
        let mut cur = self.ring_free;
        while let Some(id) = cur {
            free += 1;
            cur = self.ring[id.index()].next;
        }
        self.ring.len() - free
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TinError;
    use crate::geometry::Point3;
    use crate::mesh::{Mesh, PointStatus, VertexId};

    fn mesh_with(n: usize) -> (Mesh, Vec<VertexId>) {
        let mut mesh = Mesh::default();
        let ids = (0..n)
            .map(|i| {
                mesh.push_vertex(Point3::new(i as f64, 0.0, 0.0), PointStatus::empty())
                    .unwrap()
            })
            .collect();
        (mesh, ids)
    }

    #[test]
    fn next_cw_and_ccw_wrap() {
        let (mut mesh, v) = mesh_with(4);
        for &n in &v[1..] {
            mesh.ring_push(v[0], n).unwrap();
        }
        assert_eq!(mesh.ring_next_cw(v[0], v[1]), Some(v[2]));
        assert_eq!(mesh.ring_next_cw(v[0], v[3]), Some(v[1]));
        assert_eq!(mesh.ring_next_ccw(v[0], v[1]), Some(v[3]));
        assert_eq!(mesh.ring_next_ccw(v[0], v[3]), Some(v[2]));
        assert_eq!(mesh.ring_next_cw(v[0], v[0]), None);
    }

    #[test]
    fn insert_before_head_and_after_tail() {
        let (mut mesh, v) = mesh_with(5);
        mesh.ring_push(v[0], v[1]).unwrap();
        mesh.ring_push(v[0], v[2]).unwrap();
        mesh.ring_insert_before(v[0], v[3], v[1]).unwrap();
        mesh.ring_insert_after(v[0], v[4], v[1]).unwrap();
        assert_eq!(mesh.ring_neighbors(v[0]), vec![v[1], v[4], v[2], v[3]]);
        assert!(mesh.ring_insert_after(v[0], v[4], v[2]).is_err());
    }

    #[test]
    fn delete_is_two_sided_and_recycles_slots() {
        let (mut mesh, v) = mesh_with(3);
        mesh.ring_push(v[0], v[1]).unwrap();
        mesh.ring_push(v[1], v[0]).unwrap();
        mesh.ring_push(v[0], v[2]).unwrap();
        mesh.ring_push(v[2], v[0]).unwrap();
        assert_eq!(mesh.ring_slots_in_use(), 4);
        mesh.ring_delete(v[0], v[1]).unwrap();
        assert!(!mesh.ring_has_edge(v[0], v[1]));
        assert!(!mesh.ring_has_edge(v[1], v[0]));
        assert_eq!(mesh.ring_slots_in_use(), 2);
        let before = mesh.ring.len();
        mesh.ring_push(v[1], v[2]).unwrap();
        assert_eq!(mesh.ring.len(), before);
        assert!(mesh.ring_delete(v[0], v[1]).is_err());
    }

    #[test]
    fn ring_arena_refuses_to_outgrow_its_ids() {
        let (mut mesh, v) = mesh_with(2);
        assert!(matches!(
            mesh.reserve_ring_entries(usize::MAX),
            Err(TinError::MemoryExhausted)
        ));
        assert!(matches!(
            mesh.reserve_ring_entries(u32::MAX as usize + 1),
            Err(TinError::MemoryExhausted)
        ));
        assert!(mesh.ring.is_empty());
        mesh.reserve_ring_entries(4).unwrap();
        mesh.ring_push(v[0], v[1]).unwrap();
        assert_eq!(mesh.ring_slots_in_use(), 1);
    }
}
