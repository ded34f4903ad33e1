//! Tolerances and engine settings with JSON persistence.

use std::path::Path;

use crate::error::{Result, TinError};

/// Distances used to decide whether two entities coincide.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Two points closer than this are the same vertex.
    pub point_point_tol: f64,
    /// A point closer than this to a line lies on it.
    pub point_line_tol: f64,
    /// Smallest distance treated as non-zero by precision repair.
    pub machine_tol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            point_point_tol: 1e-6,
            point_line_tol: 1e-6,
            machine_tol: 1e-12,
        }
    }
}

impl Tolerances {
    pub fn new(point_point_tol: f64, point_line_tol: f64, machine_tol: f64) -> Result<Self> {
        let tol = Self {
            point_point_tol,
            point_line_tol,
            machine_tol,
        };
        tol.validate()?;
        Ok(tol)
    }

    /// Checks `point_point_tol >= point_line_tol >= machine_tol > 0`.
    pub fn validate(&self) -> Result<()> {
        let all = [self.point_point_tol, self.point_line_tol, self.machine_tol];
        if all.iter().any(|t| !t.is_finite()) {
            return Err(TinError::InvalidTolerances(
                "tolerances must be finite".into(),
            ));
        }
        if self.machine_tol <= 0.0 {
            return Err(TinError::InvalidTolerances(format!(
                "machine_tol must be positive, got {}",
                self.machine_tol
            )));
        }
        if self.point_line_tol < self.machine_tol {
            return Err(TinError::InvalidTolerances(format!(
                "point_line_tol {} is below machine_tol {}",
                self.point_line_tol, self.machine_tol
            )));
        }
        if self.point_point_tol < self.point_line_tol {
            return Err(TinError::InvalidTolerances(format!(
                "point_point_tol {} is below point_line_tol {}",
                self.point_point_tol, self.point_line_tol
            )));
        }
        Ok(())
    }
}

/// Settings for a [`Mesh`](crate::mesh::Mesh).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TinConfig {
    pub tolerances: Tolerances,
    /// Upper bound on the number of vertices. `None` means unbounded.
    pub max_vertices: Option<usize>,
    /// Run the full invariant check after every public edit.
    pub validate_after_edit: bool,
}

impl TinConfig {
    pub fn validate(&self) -> Result<()> {
        self.tolerances.validate()?;
        if self.max_vertices == Some(0) {
            return Err(TinError::Config("max_vertices must be at least 1".into()));
        }
        Ok(())
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: TinConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Saves this configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}
