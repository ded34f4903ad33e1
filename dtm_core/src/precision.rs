//! Detection and repair of insertion points that would create flat or
//! inverted triangles.
//!
//! A quadrilateral `p1 p2 p3 p4` is given clockwise with `p2 - p4` being the
//! edge that is about to be split. A point is acceptable when it lies
//! strictly on the right of all four sides by more than `machine_tol`, so
//! that each of the four new triangles is clockwise.

use std::f64::consts::FRAC_PI_4;

use crate::config::Tolerances;
use crate::geometry::{distance, polygon_area, side_of, Point, Side};

/// Outcome of a repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixKind {
    /// The input geometry is degenerate; no point can be produced.
    Unfixable,
    /// No valid position exists nearby; use the existing vertex `p2`.
    SnapToP2,
    /// No valid position exists nearby; use the existing vertex `p4`.
    SnapToP4,
    /// The returned coordinates pass the check.
    Recomputed,
}

const OFFSET_DOUBLINGS: u32 = 20;
const OFFSET_DIRECTIONS: u32 = 8;
const WALK_STEPS: u32 = 64;
const WALK_DIVISIONS: f64 = 128.0;

/// Returns `true` when `p` would NOT be a valid shared vertex of `quad`.
pub fn check_quad_precision(quad: &[Point; 4], p: Point, machine_tol: f64) -> bool {
    violated_sides(quad, p, machine_tol).any(|_| true)
}

fn violated_sides(quad: &[Point; 4], p: Point, tol: f64) -> impl Iterator<Item = usize> + '_ {
    (0..4).filter(move |&i| side_of(quad[i], quad[(i + 1) % 4], p, tol) != Side::Right)
}

/// Returns `true` when `p` placed on hull edge `a -> b` would flatten one of
/// the two triangles formed with the apex `c` of the clockwise `(a, b, c)`.
pub fn check_hull_triangle_precision(a: Point, b: Point, c: Point, p: Point, machine_tol: f64) -> bool {
    side_of(b, c, p, machine_tol) != Side::Right || side_of(c, a, p, machine_tol) != Side::Right
}

/// Searches for a valid position near `p` in `quad`.
pub fn fix_quad_precision(quad: &[Point; 4], p: Point, tol: &Tolerances) -> (Point, FixKind) {
    let [p1, p2, p3, p4] = *quad;
    if !p.is_finite() || quad.iter().any(|q| !q.is_finite()) {
        return (p, FixKind::Unfixable);
    }
    if polygon_area(quad) <= 0.0 || distance(p2, p4) <= 0.0 {
        return (p, FixKind::Unfixable);
    }
    let mt = tol.machine_tol;
    let valid = |q: Point| !check_quad_precision(quad, q, mt);
    let base = proportional_point(p2, p4, p);
    // Sides 0 and 3 meet at p1; when one of them is violated move towards p3.
    let toward = if violated_sides(quad, base, mt).any(|i| i == 0 || i == 3) {
        p3
    } else {
        p1
    };
    let fixed = search(base, toward, tol, valid);
    finish(fixed, p, p2, p4, "quad")
}

/// Three point variant of [`fix_quad_precision`] for a point on the hull
/// edge `a -> b` with apex `c`. Snapping reports `a` as `SnapToP2` and `b`
/// as `SnapToP4`.
pub fn fix_hull_triangle_precision(
    a: Point,
    b: Point,
    c: Point,
    p: Point,
    tol: &Tolerances,
) -> (Point, FixKind) {
    if !p.is_finite() || !a.is_finite() || !b.is_finite() || !c.is_finite() {
        return (p, FixKind::Unfixable);
    }
    if polygon_area(&[a, b, c]) <= 0.0 {
        return (p, FixKind::Unfixable);
    }
    let mt = tol.machine_tol;
    let valid = |q: Point| !check_hull_triangle_precision(a, b, c, q, mt);
    let base = proportional_point(a, b, p);
    let fixed = search(base, c, tol, valid);
    finish(fixed, p, a, b, "hull triangle")
}

/// Point on `from - to` split in the ratio of the distances of `p` to the
/// two ends.
fn proportional_point(from: Point, to: Point, p: Point) -> Point {
    let d_from = distance(p, from);
    let d_to = distance(p, to);
    if d_from + d_to <= 0.0 {
        return p;
    }
    from.lerp(to, d_from / (d_from + d_to))
}

fn search(base: Point, toward: Point, tol: &Tolerances, valid: impl Fn(Point) -> bool) -> Option<Point> {
    if valid(base) {
        return Some(base);
    }
    let mut radius = tol.machine_tol;
    for _ in 0..=OFFSET_DOUBLINGS {
        if radius > tol.point_line_tol {
            break;
        }
        for k in 0..OFFSET_DIRECTIONS {
            let angle = f64::from(k) * FRAC_PI_4;
            let candidate = Point::new(base.x + radius * angle.cos(), base.y + radius * angle.sin());
            if valid(candidate) {
                return Some(candidate);
            }
        }
        radius *= 2.0;
    }
    for step in 1..=WALK_STEPS {
        let candidate = base.lerp(toward, f64::from(step) / WALK_DIVISIONS);
        if valid(candidate) {
            return Some(candidate);
        }
    }
    None
}

fn finish(fixed: Option<Point>, original: Point, p2: Point, p4: Point, what: &str) -> (Point, FixKind) {
    match fixed {
        Some(q) => {
            log::debug!(
                "{what} precision repaired ({}, {}) -> ({}, {})",
                original.x,
                original.y,
                q.x,
                q.y
            );
            (q, FixKind::Recomputed)
        }
        None if distance(original, p2) <= distance(original, p4) => {
            log::debug!("{what} precision snapped to p2");
            (p2, FixKind::SnapToP2)
        }
        None => {
            log::debug!("{what} precision snapped to p4");
            (p4, FixKind::SnapToP4)
        }
    }
}
