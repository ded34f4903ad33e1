//! Error type shared by every fallible mesh operation.

use crate::feature::FeatureId;
use crate::mesh::VertexId;

/// Errors reported by the insertion engine.
#[derive(Debug, thiserror::Error)]
pub enum TinError {
    /// A point outside the hull was inserted with `internal_only` set.
    #[error("point ({x}, {y}) lies outside the hull")]
    ExternalPoint {
        /// X coordinate of the rejected point.
        x: f64,
        /// Y coordinate of the rejected point.
        y: f64,
    },
    /// A coordinate is NaN or infinite.
    #[error("invalid coordinate ({x}, {y})")]
    InvalidCoordinate { x: f64, y: f64 },
    /// The walk would pass through a vertex or link it already used.
    #[error("constraint would fold back on itself at vertex {vertex}")]
    KnotDetected {
        /// Vertex at which the knot was detected.
        vertex: VertexId,
    },
    /// A segment endpoint has no triangles around it yet, either because
    /// the mesh has no non-collinear triple or the vertex was left apart.
    #[error("vertex {vertex} is not part of the triangulation")]
    Unconnected { vertex: VertexId },
    /// Precision repair could not produce a valid position.
    #[error("insertion point could not be repaired to a valid position")]
    PrecisionUnfixable,
    /// The pre-swap pass stopped with crossings left.
    #[error("edge swapping stalled with {remaining} crossing edges remaining")]
    SwapFailed {
        /// Number of crossing edges left unresolved.
        remaining: usize,
    },
    /// The vertex arena reached its configured capacity.
    #[error("vertex capacity exhausted")]
    MemoryExhausted,
    #[error("locator failed: {0}")]
    LocateFailed(String),
    #[error("mesh is inconsistent: {0}")]
    InternalInconsistency(String),
    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),
    #[error("unknown feature {0}")]
    UnknownFeature(FeatureId),
    #[error("invalid tolerances: {0}")]
    InvalidTolerances(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TinError {
    /// Returns `true` when the mesh can no longer be trusted after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TinError::InternalInconsistency(_) | TinError::LocateFailed(_)
        )
    }

    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        TinError::InternalInconsistency(msg.into())
    }
}

impl From<serde_json::Error> for TinError {
    fn from(err: serde_json::Error) -> Self {
        TinError::Config(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TinError>;
