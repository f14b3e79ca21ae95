//! # Orbital Mechanics
//!
//! Two-body Keplerian position solving for the Orrery simulation engine.
//!
//! A [`BodyCatalog`] is built once at startup from catalog records. Loading validates every
//! body's elements, rejects bad records individually, and fixes a parent-before-child evaluation
//! order so moons can be offset by their parent's position without runtime recursion. The
//! [`KeplerSolver`] itself is a pure function of `(elements, simulated time)`.

pub mod catalog;
pub mod elements;
pub mod error;
pub mod solver;

pub use catalog::{BodyCatalog, CatalogFile, SolveOutcome};
pub use elements::{Body, BodyId, BodyRecord, OrbitalElements};
pub use error::{CatalogError, LoadError, SolverError};
pub use solver::{BodyPosition, KeplerSolver};

/// Default Newton-Raphson iteration cap
pub const DEFAULT_MAX_ITERATIONS: u32 = 30;

/// Default convergence tolerance for the eccentric anomaly, in radians
pub const DEFAULT_TOLERANCE_RAD: f64 = 1e-8;

/// Catalog size at which local orbit solving is fanned out across the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Unix timestamp of the J2000 epoch (2000-01-01T12:00:00Z)
pub const J2000_UNIX_SECONDS: i64 = 946_728_000;
