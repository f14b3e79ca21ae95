//! Kepler's equation and the orbital-plane to ecliptic transform
//!
//! Everything here is a pure function of its arguments. The solver holds only its iteration
//! limits, so one instance can be shared by any number of threads.

use crate::elements::OrbitalElements;
use crate::error::SolverError;
use crate::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE_RAD};
use chrono::{DateTime, Utc};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Position of one body at a simulated instant, in km in the heliocentric ecliptic frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Spin angle in degrees, absent for bodies without a rotation period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl BodyPosition {
    pub fn new(position: Vector3<f64>, rotation: Option<f64>) -> Self {
        Self { x: position.x, y: position.y, z: position.z, rotation }
    }

    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Distance from the origin (km)
    pub fn radius(&self) -> f64 {
        self.vector().norm()
    }
}

/// Days elapsed from `epoch` to `time`, negative before the epoch
pub fn elapsed_days(epoch: DateTime<Utc>, time: DateTime<Utc>) -> f64 {
    let delta = time.signed_duration_since(epoch);
    let seconds = match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1e6,
        // Beyond ~292k years of microseconds; millisecond precision is plenty there
        None => delta.num_milliseconds() as f64 / 1e3,
    };
    seconds / SECONDS_PER_DAY
}

/// Newton-Raphson solver for Kepler's equation `M = E - e sin E`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerSolver {
    max_iterations: u32,
    tolerance: f64,
}

impl Default for KeplerSolver {
    fn default() -> Self {
        Self { max_iterations: DEFAULT_MAX_ITERATIONS, tolerance: DEFAULT_TOLERANCE_RAD }
    }
}

impl KeplerSolver {
    pub fn new(max_iterations: u32, tolerance: f64) -> Self {
        Self { max_iterations, tolerance }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Mean anomaly in degrees after `elapsed_days`, normalized to [0, 360)
    pub fn mean_anomaly_deg(elements: &OrbitalElements, elapsed_days: f64) -> f64 {
        normalize_degrees(
            elements.mean_anomaly_deg + 360.0 * (elapsed_days / elements.period_days),
        )
    }

    /// Eccentric anomaly (radians) for a mean anomaly (radians).
    ///
    /// Seeds with `E0 = M` and stops once a step is below the tolerance. Running out of
    /// iterations is reported rather than returning the last estimate.
    pub fn eccentric_anomaly(
        &self,
        mean_anomaly: f64,
        eccentricity: f64,
    ) -> Result<f64, SolverError> {
        let mut ea = mean_anomaly;

        for _ in 0..self.max_iterations {
            let delta = (ea - eccentricity * ea.sin() - mean_anomaly)
                / (1.0 - eccentricity * ea.cos());
            ea -= delta;

            if delta.abs() < self.tolerance {
                return Ok(ea);
            }
        }

        Err(SolverError::NonConvergence {
            iterations: self.max_iterations,
            mean_anomaly,
            eccentricity,
        })
    }

    /// True anomaly (radians) from the eccentric anomaly via the half-angle relation
    pub fn true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
        let half = eccentric_anomaly / 2.0;
        2.0 * ((1.0 + eccentricity).sqrt() * half.sin())
            .atan2((1.0 - eccentricity).sqrt() * half.cos())
    }

    /// Position relative to the orbit's focus (the parent body), km
    pub fn local_position(
        &self,
        elements: &OrbitalElements,
        elapsed_days: f64,
    ) -> Result<Vector3<f64>, SolverError> {
        let e = elements.eccentricity;
        let mean_anomaly = Self::mean_anomaly_deg(elements, elapsed_days).to_radians();
        let ea = self.eccentric_anomaly(mean_anomaly, e)?;
        let nu = Self::true_anomaly(ea, e);
        let r = elements.semi_major_axis_km * (1.0 - e * ea.cos());

        let in_plane = Vector3::new(r * nu.cos(), r * nu.sin(), 0.0);
        Ok(orbital_to_ecliptic(elements) * in_plane)
    }

    /// Position at `time` for elements referenced to `epoch`
    pub fn position(
        &self,
        elements: &OrbitalElements,
        epoch: DateTime<Utc>,
        time: DateTime<Utc>,
    ) -> Result<Vector3<f64>, SolverError> {
        self.local_position(elements, elapsed_days(epoch, time))
    }
}

/// `Rz(Ω) · Rx(i) · Rz(ω)`: orbital plane (x towards periapsis) to the ecliptic frame
pub fn orbital_to_ecliptic(elements: &OrbitalElements) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), elements.long_asc_node_deg.to_radians())
        * Rotation3::from_axis_angle(&Vector3::x_axis(), elements.inclination_deg.to_radians())
        * Rotation3::from_axis_angle(&Vector3::z_axis(), elements.arg_of_periapsis_deg.to_radians())
}

/// Spin angle in degrees after `elapsed_hours`. A negative period spins retrograde.
pub fn rotation_angle(period_hours: f64, elapsed_hours: f64) -> f64 {
    normalize_degrees((elapsed_hours / period_hours).rem_euclid(1.0) * 360.0)
}

/// Spin angle at `time`, `None` without a rotation period
pub fn rotation_angle_at(
    period_hours: Option<f64>,
    epoch: DateTime<Utc>,
    time: DateTime<Utc>,
) -> Option<f64> {
    period_hours.map(|period| rotation_angle(period, elapsed_days(epoch, time) * HOURS_PER_DAY))
}

pub(crate) fn elapsed_hours(elapsed_days: f64) -> f64 {
    elapsed_days * HOURS_PER_DAY
}

fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}
