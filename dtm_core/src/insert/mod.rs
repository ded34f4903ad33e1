//! Insertion of points and constrained segments.

pub mod point;
pub mod walk;

pub use point::PointOptions;
pub use walk::{Crossing, DrapeMode, Reentry, StringOptions, WalkMode, WalkSession};
