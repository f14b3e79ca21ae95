//! Validated body catalog with a fixed parent-before-child evaluation order

use crate::elements::{Body, BodyId, BodyRecord};
use crate::error::{CatalogError, LoadError, SolverError};
use crate::solver::{self, BodyPosition, KeplerSolver};
use crate::{DEFAULT_PARALLEL_THRESHOLD, J2000_UNIX_SECONDS};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// On-disk catalog document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Reference instant for every body's mean anomaly
    #[serde(default = "j2000_epoch")]
    pub epoch: DateTime<Utc>,

    pub bodies: Vec<BodyRecord>,
}

/// 2000-01-01T12:00:00Z
pub fn j2000_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(J2000_UNIX_SECONDS, 0).unwrap_or_default()
}

/// Positions for one simulated instant plus the bodies that could not be placed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOutcome {
    pub positions: BTreeMap<BodyId, BodyPosition>,
    pub failures: Vec<(BodyId, SolverError)>,
}

/// Immutable set of accepted bodies, ordered so every parent precedes its children
#[derive(Debug, Clone)]
pub struct BodyCatalog {
    epoch: DateTime<Utc>,
    bodies: Vec<Body>,
    index: HashMap<BodyId, usize>,
    rejected: Vec<CatalogError>,
    solver: KeplerSolver,
    parallel_threshold: usize,
}

impl BodyCatalog {
    /// Build a catalog from raw records.
    ///
    /// Invalid records are excluded individually and reported through [`BodyCatalog::rejected`].
    /// Among records sharing an id the first valid one is kept; later valid ones are duplicates.
    /// Rejection propagates down the hierarchy: a body whose parent was rejected or never
    /// declared is rejected too, and every body on or below a parent cycle is rejected.
    pub fn from_records(epoch: DateTime<Utc>, records: Vec<BodyRecord>) -> Self {
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(records.len());

        for record in records {
            match record.validate() {
                Ok(body) if !seen.insert(body.id) => {
                    rejected.push(CatalogError::DuplicateBody { body_id: body.id })
                }
                Ok(body) => accepted.push(body),
                Err(e) => rejected.push(e),
            }
        }

        // Drop orphans until the set is closed under the parent relation
        loop {
            let ids: HashSet<BodyId> = accepted.iter().map(|body: &Body| body.id).collect();
            let (kept, orphans): (Vec<Body>, Vec<Body>) = accepted
                .into_iter()
                .partition(|body| body.parent_id.map_or(true, |parent| ids.contains(&parent)));
            accepted = kept;

            if orphans.is_empty() {
                break;
            }
            for orphan in orphans {
                if let Some(parent_id) = orphan.parent_id {
                    rejected.push(CatalogError::UnknownParent { body_id: orphan.id, parent_id });
                }
            }
        }

        let (bodies, cyclic) = order_parents_first(accepted);
        rejected.extend(cyclic.into_iter().map(|body| CatalogError::CyclicParent { body_id: body.id }));

        for error in &rejected {
            warn!(body_id = error.body_id(), error = %error, "Rejected catalog body");
        }

        let index = bodies.iter().enumerate().map(|(i, body)| (body.id, i)).collect();

        info!(
            epoch = %epoch,
            bodies = bodies.len(),
            rejected = rejected.len(),
            "Body catalog built"
        );

        Self {
            epoch,
            bodies,
            index,
            rejected,
            solver: KeplerSolver::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn from_catalog_file(file: CatalogFile) -> Self {
        Self::from_records(file.epoch, file.bodies)
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_catalog_file(file))
    }

    /// Read and build a catalog from a JSON file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        info!(path = %path.display(), "Loading body catalog");
        Self::from_json_str(&content)
    }

    pub fn with_solver(mut self, solver: KeplerSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Catalog size at which local orbits are solved on the rayon pool
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Accepted bodies in evaluation order
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn rejected(&self) -> &[CatalogError] {
        &self.rejected
    }

    pub fn solver(&self) -> &KeplerSolver {
        &self.solver
    }

    /// Place every accepted body at `time`.
    ///
    /// A body that fails to solve is left out of `positions` and listed in `failures`, as is
    /// every body below it in the hierarchy. Nothing else is affected.
    pub fn solve(&self, time: DateTime<Utc>) -> SolveOutcome {
        let days = solver::elapsed_days(self.epoch, time);
        let hours = solver::elapsed_hours(days);

        let local: Vec<Option<Result<Vector3<f64>, SolverError>>> =
            if self.bodies.len() >= self.parallel_threshold {
                self.bodies.par_iter().map(|body| self.local_position(body, days)).collect()
            } else {
                self.bodies.iter().map(|body| self.local_position(body, days)).collect()
            };

        let mut outcome = SolveOutcome::default();

        for (body, local) in self.bodies.iter().zip(local) {
            let placed = match local {
                None => Ok(Vector3::zeros()),
                Some(result) => result.and_then(|offset| match body.parent_id {
                    None => Ok(offset),
                    Some(parent_id) => outcome
                        .positions
                        .get(&parent_id)
                        .map(|parent| parent.vector() + offset)
                        .ok_or(SolverError::ParentUnavailable { parent_id }),
                }),
            };

            match placed {
                Ok(position) => {
                    let rotation = body
                        .sidereal_rotation_hours
                        .map(|period| solver::rotation_angle(period, hours));
                    outcome.positions.insert(body.id, BodyPosition::new(position, rotation));
                }
                Err(e) => outcome.failures.push((body.id, e)),
            }
        }

        outcome
    }

    fn local_position(
        &self,
        body: &Body,
        elapsed_days: f64,
    ) -> Option<Result<Vector3<f64>, SolverError>> {
        body.elements
            .as_ref()
            .map(|elements| self.solver.local_position(elements, elapsed_days))
    }
}

/// Split bodies into a parent-before-child sequence and the bodies that can never be placed
/// because they sit on or below a parent cycle. Record order is kept within each generation.
fn order_parents_first(mut pending: Vec<Body>) -> (Vec<Body>, Vec<Body>) {
    let mut ordered = Vec::with_capacity(pending.len());
    let mut placed = HashSet::new();

    loop {
        let (ready, waiting): (Vec<Body>, Vec<Body>) = pending
            .into_iter()
            .partition(|body| body.parent_id.map_or(true, |parent| placed.contains(&parent)));
        pending = waiting;

        if ready.is_empty() {
            break;
        }
        placed.extend(ready.iter().map(|body| body.id));
        ordered.extend(ready);
    }

    (ordered, pending)
}
