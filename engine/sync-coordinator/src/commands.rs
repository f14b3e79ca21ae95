//! Viewer control commands

use chrono::{DateTime, Utc};
use orbital_mechanics::BodyId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Requested rate; validated on submit, clamped when applied
    SetMultiplier(f64),

    SetPaused(bool),

    /// Absolute jump in simulated time
    SetTime(DateTime<Utc>),

    /// Camera focus. Relayed to every viewer, no clock effect.
    Focus { body_id: BodyId, body_name: String },

    /// Resend full state to the requesting viewer only
    RequestSync,
}

/// The clock-mutating subset of [`ControlCommand`], queued until the next tick starts
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClockCommand {
    SetMultiplier(f64),
    SetPaused(bool),
    SetTime(DateTime<Utc>),
}
