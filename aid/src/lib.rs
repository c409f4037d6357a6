//! Domain types and lifecycle rules for the foodaid platform.
//!
//! Everything in this crate is I/O-free: the server layers persistence and
//! HTTP on top, and the seed/tester binaries reuse the same types so the wire
//! format is defined in exactly one place.

pub mod lifecycle;
pub mod model;
pub mod tracking;

pub use lifecycle::{Actor, TransitionError, transition};
pub use model::{Role, Status};
