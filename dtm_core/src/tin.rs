//! Plain vertex and triangle snapshot of a mesh, with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::TinConfig;
use crate::error::{Result, TinError};
use crate::geometry::{cross, interpolate_triangle_z, point_in_triangle, Point, Point3};
use crate::mesh::{Mesh, PointStatus, VertexId};

/// Triangulated Irregular Network as index triples into `vertices`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tin {
    /// Vertices of the TIN.
    pub vertices: Vec<Point3>,
    /// Indices into `vertices` forming clockwise triangles.
    pub triangles: Vec<[usize; 3]>,
}

impl Tin {
    /// Returns the interpolated elevation at (x, y) if inside the TIN.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let p = Point::new(x, y);
        self.triangles.iter().find_map(|t| {
            let (a, b, c) = (
                *self.vertices.get(t[0])?,
                *self.vertices.get(t[1])?,
                *self.vertices.get(t[2])?,
            );
            if point_in_triangle(a.xy(), b.xy(), c.xy(), p) {
                interpolate_triangle_z(p, a, b, c)
            } else {
                None
            }
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Saves the TIN to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a TIN from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

impl Mesh {
    /// Snapshot of every vertex and triangle. Vertex indices equal vertex ids.
    pub fn to_tin(&self) -> Tin {
        Tin {
            vertices: self.points.clone(),
            triangles: self
                .triangles()
                .into_iter()
                .map(|[a, b, c]| [a.index(), b.index(), c.index()])
                .collect(),
        }
    }

    /// Rebuilds a mesh from a snapshot. Triangles may be given in either
    /// winding; the result must form a single valid triangulation. Vertices
    /// used by no triangle are inserted as points afterwards.
    pub fn from_tin(tin: &Tin, config: TinConfig) -> Result<Self> {
        let mut mesh = Mesh::new(config)?;
        mesh.reserve_vertices(tin.vertices.len())?;
        for p in &tin.vertices {
            if !p.is_finite() {
                return Err(TinError::InvalidCoordinate { x: p.x, y: p.y });
            }
            mesh.push_vertex(*p, PointStatus::empty())?;
        }

        // successors[v][u] = w for each clockwise triangle (v, u, w).
        let mut successors: Vec<BTreeMap<VertexId, VertexId>> =
            vec![BTreeMap::new(); tin.vertices.len()];
        for t in &tin.triangles {
            if t.iter().any(|&i| i >= tin.vertices.len()) || t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
                return Err(TinError::inconsistent(format!("bad triangle {t:?}")));
            }
            let [a, b, c] = t.map(VertexId::from_index);
            let turn = cross(mesh.xy(a), mesh.xy(b), mesh.xy(c));
            let (b, c) = if turn < 0.0 {
                (b, c)
            } else if turn > 0.0 {
                (c, b)
            } else {
                return Err(TinError::inconsistent(format!("flat triangle {t:?}")));
            };
            for (v, u, w) in [(a, b, c), (b, c, a), (c, a, b)] {
                if successors[v.index()].insert(u, w).is_some() {
                    return Err(TinError::inconsistent(format!(
                        "edge {v}-{u} borders more than one triangle on one side"
                    )));
                }
            }
        }

        let mut hull = Vec::new();
        for (i, succ) in successors.iter().enumerate() {
            if succ.is_empty() {
                continue;
            }
            let v = VertexId::from_index(i);
            let targets: Vec<VertexId> = succ.values().copied().collect();
            let starts: Vec<VertexId> = succ.keys().copied().filter(|u| !targets.contains(u)).collect();
            let (start, open) = match starts.as_slice() {
                [] => (*succ.keys().next().unwrap_or(&v), false),
                [s] => (*s, true),
                _ => {
                    return Err(TinError::inconsistent(format!("{v} joins separate fans")));
                }
            };
            let mut ring = vec![start];
            let mut cur = start;
            while let Some(&next) = succ.get(&cur) {
                if next == start {
                    break;
                }
                ring.push(next);
                cur = next;
                if ring.len() > succ.len() + 1 {
                    return Err(TinError::inconsistent(format!("ring of {v} does not close")));
                }
            }
            let expected = succ.len() + usize::from(open);
            if ring.len() != expected {
                return Err(TinError::inconsistent(format!("{v} joins separate fans")));
            }
            for n in ring {
                mesh.ring_push(v, n)?;
            }
            if open {
                mesh.node_mut(v).hull_next = Some(start);
                hull.push(v);
            }
        }
        if !tin.triangles.is_empty() {
            let entry = hull
                .first()
                .copied()
                .ok_or_else(|| TinError::inconsistent("triangles enclose no hull"))?;
            mesh.hull_entry = Some(entry);
            mesh.refresh_bbox_flags();
            mesh.validate()?;
            let isolated: Vec<VertexId> = mesh
                .vertex_ids()
                .filter(|&v| mesh.ring_degree(v) == 0)
                .collect();
            for v in isolated {
                mesh.attach_isolated(v)?;
            }
        } else {
            mesh.try_bootstrap()?;
        }
        log::debug!(
            "mesh loaded with {} vertices and {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }
}
