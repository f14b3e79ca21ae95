//! Server-to-viewer events
//!
//! Events serialize as `{"stream": "<name>", "data": {...}}`, the same push envelope viewers
//! already parse for every other stream.

use crate::snapshot::PositionSnapshot;
use chrono::{DateTime, Utc};
use orbital_mechanics::{BodyId, BodyPosition};
use serde::{Deserialize, Serialize};
use simulation_clock::ClockSnapshot;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Full state sent to one viewer on connect or on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSync {
    pub time: DateTime<Utc>,
    pub multiplier: f64,
    pub paused: bool,
    /// Tick of the snapshot the positions come from
    pub tick: u64,
    pub positions: BTreeMap<BodyId, BodyPosition>,
}

impl StateSync {
    pub fn new(clock: ClockSnapshot, snapshot: &PositionSnapshot) -> Self {
        Self {
            time: clock.time,
            multiplier: clock.multiplier,
            paused: clock.paused,
            tick: snapshot.tick,
            positions: snapshot.positions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    StateSync(StateSync),

    PositionsUpdated(Arc<PositionSnapshot>),

    MultiplierChanged { value: f64 },

    PausedChanged { paused: bool },

    TimeChanged { time: DateTime<Utc> },

    #[serde(rename_all = "camelCase")]
    Focused { body_id: BodyId, body_name: String },

    CommandRejected { reason: String },
}

impl ServerEvent {
    /// Stream name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::StateSync(_) => "stateSync",
            ServerEvent::PositionsUpdated(_) => "positionsUpdated",
            ServerEvent::MultiplierChanged { .. } => "multiplierChanged",
            ServerEvent::PausedChanged { .. } => "pausedChanged",
            ServerEvent::TimeChanged { .. } => "timeChanged",
            ServerEvent::Focused { .. } => "focused",
            ServerEvent::CommandRejected { .. } => "commandRejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_envelope() {
        let event = ServerEvent::Focused { body_id: 399, body_name: "Earth".to_string() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stream"], "focused");
        assert_eq!(json["data"]["bodyId"], 399);
        assert_eq!(json["data"]["bodyName"], "Earth");
        assert_eq!(json["stream"], event.name());
    }

    #[test]
    fn test_positions_envelope() {
        let time = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let mut positions = BTreeMap::new();
        positions.insert(10, BodyPosition { x: 0.0, y: 0.0, z: 0.0, rotation: Some(12.5) });
        positions.insert(399, BodyPosition { x: 1.0, y: 2.0, z: 3.0, rotation: None });
        let event = ServerEvent::PositionsUpdated(Arc::new(PositionSnapshot::new(7, time, positions)));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stream"], "positionsUpdated");
        assert_eq!(json["data"]["tick"], 7);
        assert_eq!(json["data"]["time"], "2000-01-01T12:00:00Z");
        assert_eq!(json["data"]["positions"]["10"]["rotation"], 12.5);
        assert_eq!(json["data"]["positions"]["399"]["y"], 2.0);
        assert!(json["data"]["positions"]["399"].get("rotation").is_none());

        let parsed: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_scalar_events() {
        let json = serde_json::to_value(ServerEvent::MultiplierChanged { value: 50.0 }).unwrap();
        assert_eq!(json, serde_json::json!({"stream": "multiplierChanged", "data": {"value": 50.0}}));

        let json = serde_json::to_value(ServerEvent::PausedChanged { paused: false }).unwrap();
        assert_eq!(json, serde_json::json!({"stream": "pausedChanged", "data": {"paused": false}}));

        let json =
            serde_json::to_value(ServerEvent::CommandRejected { reason: "nope".into() }).unwrap();
        assert_eq!(json["stream"], "commandRejected");
        assert_eq!(json["data"]["reason"], "nope");
    }
}
