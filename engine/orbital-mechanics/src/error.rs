//! Error types for catalog loading and position solving

use crate::elements::BodyId;
use thiserror::Error;

/// A body rejected while building the catalog. Each error excludes only the body it names.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Body {body_id}: eccentricity {value} is outside [0, 1)")]
    EccentricityOutOfRange { body_id: BodyId, value: f64 },

    #[error("Body {body_id}: orbital period {value} days must be positive")]
    NonPositivePeriod { body_id: BodyId, value: f64 },

    #[error("Body {body_id}: semi-major axis {value} km must be positive")]
    NonPositiveSemiMajorAxis { body_id: BodyId, value: f64 },

    #[error("Body {body_id}: {field} is not a finite number")]
    NonFinite { body_id: BodyId, field: &'static str },

    #[error("Body {body_id}: orbital elements are incomplete, missing {field}")]
    IncompleteElements { body_id: BodyId, field: &'static str },

    #[error("Body {body_id}: sidereal rotation period must be non-zero")]
    ZeroRotationPeriod { body_id: BodyId },

    #[error("Body {body_id} is declared more than once")]
    DuplicateBody { body_id: BodyId },

    #[error("Body {body_id} has no orbital elements but declares parent {parent_id}")]
    StaticBodyWithParent { body_id: BodyId, parent_id: BodyId },

    #[error("Body {body_id} references unknown or rejected parent {parent_id}")]
    UnknownParent { body_id: BodyId, parent_id: BodyId },

    #[error("Body {body_id} is part of, or descends from, a cyclic parent chain")]
    CyclicParent { body_id: BodyId },
}

impl CatalogError {
    /// The body this error excludes
    pub fn body_id(&self) -> BodyId {
        match self {
            CatalogError::EccentricityOutOfRange { body_id, .. }
            | CatalogError::NonPositivePeriod { body_id, .. }
            | CatalogError::NonPositiveSemiMajorAxis { body_id, .. }
            | CatalogError::NonFinite { body_id, .. }
            | CatalogError::IncompleteElements { body_id, .. }
            | CatalogError::ZeroRotationPeriod { body_id }
            | CatalogError::DuplicateBody { body_id }
            | CatalogError::StaticBodyWithParent { body_id, .. }
            | CatalogError::UnknownParent { body_id, .. }
            | CatalogError::CyclicParent { body_id } => *body_id,
        }
    }
}

/// Whole-file failures while reading a catalog
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-tick, per-body failures. The body is omitted for that tick only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error(
        "Kepler iteration did not converge after {iterations} iterations \
         (mean anomaly {mean_anomaly} rad, eccentricity {eccentricity})"
    )]
    NonConvergence { iterations: u32, mean_anomaly: f64, eccentricity: f64 },

    #[error("Parent body {parent_id} has no position this tick")]
    ParentUnavailable { parent_id: BodyId },
}
