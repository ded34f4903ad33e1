//! Planar predicates used by the triangulation engine.
//!
//! Orientation follows the usual mathematical convention: a positive cross
//! product means counter-clockwise. The mesh itself stores triangles in
//! clockwise order, so most callers look for [`Side::Right`].

pub mod point;

pub use point::{Point, Point3};

/// Position of a point relative to a directed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    On,
    Right,
}

/// Winding direction of a closed polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
    Degenerate,
}

/// Result of [`distance_from_line`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDistance {
    /// Perpendicular distance to the infinite line.
    pub distance: f64,
    /// Parameter of the foot point, `0` at `a` and `1` at `b`.
    pub t: f64,
    /// `true` when the foot point lies within the closed segment.
    pub on_segment: bool,
    /// Foot of the perpendicular.
    pub foot: Point,
}

/// Cross product of `a - o` and `b - o`.
pub fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Calculates the Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Classifies `p` against the directed line `a -> b`. Points whose
/// perpendicular distance is within `tol` are reported as [`Side::On`].
pub fn side_of(a: Point, b: Point, p: Point, tol: f64) -> Side {
    let len = distance(a, b);
    if len <= 0.0 {
        return Side::On;
    }
    let d = cross(a, b, p) / len;
    if d > tol {
        Side::Left
    } else if d < -tol {
        Side::Right
    } else {
        Side::On
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
pub fn distance_from_line(a: Point, b: Point, p: Point) -> LineDistance {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= 0.0 {
        return LineDistance {
            distance: distance(a, p),
            t: 0.0,
            on_segment: true,
            foot: a,
        };
    }
    let t = ((p.x - a.x) * dx + (p.y - a.y) * dy) / len2;
    let foot = Point::new(a.x + t * dx, a.y + t * dy);
    LineDistance {
        distance: distance(foot, p),
        t,
        on_segment: (0.0..=1.0).contains(&t),
        foot,
    }
}

/// Intersection of the infinite lines `p1 p2` and `p3 p4`, or `None` when
/// they are parallel.
pub fn line_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let d1x = p2.x - p1.x;
    let d1y = p2.y - p1.y;
    let d2x = p4.x - p3.x;
    let d2y = p4.y - p3.y;
    let denom = d1x * d2y - d1y * d2x;
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let t = ((p3.x - p1.x) * d2y - (p3.y - p1.y) * d2x) / denom;
    Some(Point::new(p1.x + t * d1x, p1.y + t * d1y))
}

/// Intersection of the closed segments `p1 p2` and `p3 p4`. Collinear
/// overlaps report no single point and return `None`.
pub fn segment_intersect(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let d1x = p2.x - p1.x;
    let d1y = p2.y - p1.y;
    let d2x = p4.x - p3.x;
    let d2y = p4.y - p3.y;
    let denom = d1x * d2y - d1y * d2x;
    if denom == 0.0 {
        return None;
    }
    let t = ((p3.x - p1.x) * d2y - (p3.y - p1.y) * d2x) / denom;
    let u = ((p3.x - p1.x) * d1y - (p3.y - p1.y) * d1x) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(p1.x + t * d1x, p1.y + t * d1y))
    } else {
        None
    }
}

/// `true` when the segments cross at a single interior point of both, with
/// every endpoint farther than `tol` from the other segment's line.
pub fn segments_cross(p1: Point, p2: Point, p3: Point, p4: Point, tol: f64) -> bool {
    let s1 = side_of(p1, p2, p3, tol);
    let s2 = side_of(p1, p2, p4, tol);
    let s3 = side_of(p3, p4, p1, tol);
    let s4 = side_of(p3, p4, p2, tol);
    s1 != Side::On
        && s2 != Side::On
        && s3 != Side::On
        && s4 != Side::On
        && s1 != s2
        && s3 != s4
}

/// Calculates the area of a simple polygon using the shoelace formula.
pub fn polygon_area(vertices: &[Point]) -> f64 {
    polygon_area_and_winding(vertices).0
}

/// Absolute area and winding of a closed polygon. The closing edge from the
/// last vertex back to the first is implied.
pub fn polygon_area_and_winding(vertices: &[Point]) -> (f64, Winding) {
    if vertices.len() < 3 {
        return (0.0, Winding::Degenerate);
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        sum += vertices[i].x * vertices[j].y - vertices[j].x * vertices[i].y;
    }
    let winding = if sum > 0.0 {
        Winding::CounterClockwise
    } else if sum < 0.0 {
        Winding::Clockwise
    } else {
        Winding::Degenerate
    };
    (sum.abs() / 2.0, winding)
}

/// Returns `true` if `p` lies inside or on the boundary of triangle `abc`
/// regardless of the triangle's winding.
pub fn point_in_triangle(a: Point, b: Point, c: Point, p: Point) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Returns `true` if point `p` is inside the polygon defined by `poly` using
/// the ray casting algorithm.
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let mut inside = false;
    if poly.is_empty() {
        return inside;
    }
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let pi = poly[i];
        let pj = poly[j];
        if ((pi.y > p.y) != (pj.y > p.y))
            && (p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn barycentric(p: Point, a: Point3, b: Point3, c: Point3) -> Option<(f64, f64, f64)> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let u = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let v = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    let w = 1.0 - u - v;
    Some((u, v, w))
}

/// Elevation of the plane through `a`, `b`, `c` at `p`.
pub fn interpolate_triangle_z(p: Point, a: Point3, b: Point3, c: Point3) -> Option<f64> {
    let (u, v, w) = barycentric(p, a, b, c)?;
    Some(u * a.z + v * b.z + w * c.z)
}

/// Elevation along the segment `a b` at the planar position closest to `p`.
pub fn interpolate_segment_z(a: Point3, b: Point3, p: Point) -> f64 {
    let len = distance(a.xy(), b.xy());
    if len <= 0.0 {
        return a.z;
    }
    let t = (distance(a.xy(), p) / len).clamp(0.0, 1.0);
    a.z + (b.z - a.z) * t
}
