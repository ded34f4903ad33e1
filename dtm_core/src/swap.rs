//! Edge flips and the pre-swap pass.
//!
//! Before a segment is walked, edges crossing it are flipped away where the
//! surrounding quadrilateral allows. Fewer crossings mean fewer inserted
//! vertices on the constraint.

use std::collections::BTreeSet;

use crate::error::{Result, TinError};
use crate::geometry::{segments_cross, side_of, Side};
use crate::mesh::{Mesh, VertexId};

/// Which flips the pass is currently allowed to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwapMode {
    /// Only flips whose new diagonal no longer crosses the segment.
    RemoveCrossing,
    /// Any flip that keeps the crossing count, on edges not flipped before.
    NonWorsening,
    /// Flips of edges produced by earlier non-worsening flips.
    PendingOnly,
}

fn key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Mesh {
    /// Replaces interior edge `a - b` by the other diagonal of its
    /// quadrilateral without checking convexity. Returns the new diagonal.
    pub(crate) fn flip_edge_unchecked(&mut self, a: VertexId, b: VertexId) -> Result<(VertexId, VertexId)> {
        let (c1, d) = self.edge_apexes(a, b)?;
        if self.ring_has_edge(c1, d) {
            return Err(TinError::inconsistent(format!(
                "flip of {a}-{b} would duplicate {c1}-{d}"
            )));
        }
        self.ring_delete(a, b)?;
        self.ring_insert_after(d, c1, b)?;
        self.ring_insert_after(c1, d, a)?;
        log::trace!("flipped {a}-{b} to {c1}-{d}");
        Ok((c1, d))
    }

    /// `true` when `a - b` may be flipped: interior, unconstrained, not part
    /// of an active walk, and its quadrilateral strictly convex.
    pub fn is_flippable(&self, a: VertexId, b: VertexId) -> bool {
        if !self.ring_has_edge(a, b) || self.is_hull_edge(a, b) {
            return false;
        }
        if self.walk_ptr(a) == Some(b) || self.walk_ptr(b) == Some(a) {
            return false;
        }
        if self.is_constraint_line(a, b) {
            return false;
        }
        let Ok((c1, d)) = self.edge_apexes(a, b) else {
            return false;
        };
        if self.ring_has_edge(c1, d) {
            return false;
        }
        let mt = self.tolerances().machine_tol;
        let (pa, pb, pc, pd) = (self.xy(a), self.xy(b), self.xy(c1), self.xy(d));
        side_of(pd, pb, pc, mt) == Side::Right && side_of(pd, pc, pa, mt) == Side::Right
    }

    /// Flips `a - b` when [`Mesh::is_flippable`] allows it.
    pub fn try_flip_edge(&mut self, a: VertexId, b: VertexId) -> Result<bool> {
        self.check_vertex(a)?;
        self.check_vertex(b)?;
        if !self.is_flippable(a, b) {
            return Ok(false);
        }
        self.flip_edge_unchecked(a, b)?;
        self.after_edit()?;
        Ok(true)
    }

    /// Edges crossing the open segment `first - last` at a single interior
    /// point.
    pub fn crossing_edges(&self, first: VertexId, last: VertexId) -> Vec<(VertexId, VertexId)> {
        let plt = self.tolerances().point_line_tol;
        let (pf, pl) = (self.xy(first), self.xy(last));
        self.edges()
            .into_iter()
            .filter(|&(a, b)| segments_cross(pf, pl, self.xy(a), self.xy(b), plt))
            .collect()
    }

    /// Flips edges crossing `first - last` until none are left or no more
    /// flips are possible. Returns the number of flips made, or `SwapFailed`
    /// with the number of crossings left.
    pub fn swap_crossing_edges(&mut self, first: VertexId, last: VertexId) -> Result<usize> {
        self.check_vertex(first)?;
        self.check_vertex(last)?;
        let mut crossing = self.crossing_edges(first, last);
        if crossing.is_empty() {
            return Ok(0);
        }
        let cap = 4 * crossing.len() + 8;
        let plt = self.tolerances().point_line_tol;
        let (pf, pl) = (self.xy(first), self.xy(last));
        let mut pending: BTreeSet<(VertexId, VertexId)> = BTreeSet::new();
        let mut mode = SwapMode::RemoveCrossing;
        let mut flips = 0;

        while !crossing.is_empty() && flips < cap {
            let mut flipped = false;
            for &(a, b) in &crossing {
                if flips >= cap {
                    break;
                }
                if !self.is_flippable(a, b) {
                    continue;
                }
                let (c1, d) = self.edge_apexes(a, b)?;
                let still_crosses = segments_cross(pf, pl, self.xy(c1), self.xy(d), plt);
                let allowed = match mode {
                    SwapMode::RemoveCrossing => !still_crosses,
                    SwapMode::NonWorsening => !pending.contains(&key(a, b)),
                    SwapMode::PendingOnly => pending.contains(&key(a, b)),
                };
                if !allowed {
                    continue;
                }
                self.flip_edge_unchecked(a, b)?;
                flips += 1;
                flipped = true;
                pending.remove(&key(a, b));
                if still_crosses {
                    pending.insert(key(c1, d));
                }
                if mode != SwapMode::RemoveCrossing {
                    // One sideways flip, then look for removals again.
                    break;
                }
            }
            mode = match (flipped, mode) {
                (true, _) => SwapMode::RemoveCrossing,
                (false, SwapMode::RemoveCrossing) => SwapMode::NonWorsening,
                (false, SwapMode::NonWorsening) => SwapMode::PendingOnly,
                (false, SwapMode::PendingOnly) => break,
            };
            crossing = self.crossing_edges(first, last);
        }

        if crossing.is_empty() {
            log::debug!("pre-swap {first}-{last}: {flips} flips");
            Ok(flips)
        } else {
            Err(TinError::SwapFailed {
                remaining: crossing.len(),
            })
        }
    }
}
