//! Per-tick position snapshots

use chrono::{DateTime, Utc};
use orbital_mechanics::{BodyId, BodyPosition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every placed body at one simulated instant. Built once per tick and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    /// Sequence number of the tick that produced this snapshot, 0 before the first tick
    pub tick: u64,
    pub time: DateTime<Utc>,
    pub positions: BTreeMap<BodyId, BodyPosition>,
}

impl PositionSnapshot {
    pub fn new(tick: u64, time: DateTime<Utc>, positions: BTreeMap<BodyId, BodyPosition>) -> Self {
        Self { tick, time, positions }
    }

    pub fn position(&self, body_id: BodyId) -> Option<&BodyPosition> {
        self.positions.get(&body_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
