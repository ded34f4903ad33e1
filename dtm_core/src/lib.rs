//! Incremental insertion engine for triangulated terrain surfaces.
//!
//! A [`Mesh`] keeps a planar triangulation with its hull and a set of
//! constrained polylines ([`FeatureKind`]). Points, segments, strings and
//! features are inserted without retriangulating from scratch.

pub mod config;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod insert;
pub mod locate;
pub mod mesh;
pub mod precision;
pub mod swap;
pub mod tin;
pub mod validate;

pub use config::{TinConfig, Tolerances};
pub use error::{Result, TinError};
pub use feature::{Feature, FeatureId, FeatureKind, FeatureState, PointKind};
pub use geometry::{Point, Point3};
pub use insert::{Crossing, DrapeMode, PointOptions, StringOptions, WalkMode, WalkSession};
pub use locate::Location;
pub use mesh::{Mesh, PointStatus, VertexId};
pub use tin::Tin;
