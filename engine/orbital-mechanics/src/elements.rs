//! Orbital elements and catalog body records

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};

/// Catalog-wide body identifier
pub type BodyId = u32;

/// Classical Keplerian elements. Distances in km, angles in degrees, period in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrbitalElements {
    /// Semi-major axis (km)
    pub semi_major_axis_km: f64,

    /// Eccentricity, 0 <= e < 1
    pub eccentricity: f64,

    /// Inclination (degrees)
    pub inclination_deg: f64,

    /// Longitude of the ascending node, Ω (degrees)
    pub long_asc_node_deg: f64,

    /// Argument of periapsis, ω (degrees)
    pub arg_of_periapsis_deg: f64,

    /// Mean anomaly at the catalog epoch, M0 (degrees)
    pub mean_anomaly_deg: f64,

    /// Orbital period (days)
    pub period_days: f64,
}

impl OrbitalElements {
    /// Check the closed-orbit invariants for the body `body_id`
    pub fn validate(&self, body_id: BodyId) -> Result<(), CatalogError> {
        let fields = [
            ("semiMajorAxisKm", self.semi_major_axis_km),
            ("eccentricity", self.eccentricity),
            ("inclinationDeg", self.inclination_deg),
            ("longAscNodeDeg", self.long_asc_node_deg),
            ("argOfPeriapsisDeg", self.arg_of_periapsis_deg),
            ("meanAnomalyDeg", self.mean_anomaly_deg),
            ("periodDays", self.period_days),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(CatalogError::NonFinite { body_id, field });
        }

        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(CatalogError::EccentricityOutOfRange {
                body_id,
                value: self.eccentricity,
            });
        }

        if self.semi_major_axis_km <= 0.0 {
            return Err(CatalogError::NonPositiveSemiMajorAxis {
                body_id,
                value: self.semi_major_axis_km,
            });
        }

        if self.period_days <= 0.0 {
            return Err(CatalogError::NonPositivePeriod { body_id, value: self.period_days });
        }

        Ok(())
    }

    /// Closest distance to the focus (km)
    pub fn periapsis_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity)
    }

    /// Farthest distance from the focus (km)
    pub fn apoapsis_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 + self.eccentricity)
    }
}

/// One body as it appears in a catalog file.
///
/// Orbital fields are all-or-nothing: a record with none of them describes a static body pinned
/// at the origin (the primary star), a record with only some of them is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyRecord {
    pub id: BodyId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BodyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semi_major_axis_km: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eccentricity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclination_deg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_of_periapsis_deg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_asc_node_deg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_anomaly_deg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_days: Option<f64>,

    /// Sidereal rotation period in hours. Negative for retrograde rotators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidereal_rotation_hours: Option<f64>,
}

impl BodyRecord {
    /// Build a record for an orbiting body
    pub fn orbiting(id: BodyId, elements: OrbitalElements) -> Self {
        Self {
            id,
            semi_major_axis_km: Some(elements.semi_major_axis_km),
            eccentricity: Some(elements.eccentricity),
            inclination_deg: Some(elements.inclination_deg),
            arg_of_periapsis_deg: Some(elements.arg_of_periapsis_deg),
            long_asc_node_deg: Some(elements.long_asc_node_deg),
            mean_anomaly_deg: Some(elements.mean_anomaly_deg),
            period_days: Some(elements.period_days),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent_id: BodyId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_rotation_hours(mut self, hours: f64) -> Self {
        self.sidereal_rotation_hours = Some(hours);
        self
    }

    /// Extract the orbital elements, `None` for a static body
    pub fn elements(&self) -> Result<Option<OrbitalElements>, CatalogError> {
        let fields = [
            ("semiMajorAxisKm", self.semi_major_axis_km),
            ("eccentricity", self.eccentricity),
            ("inclinationDeg", self.inclination_deg),
            ("argOfPeriapsisDeg", self.arg_of_periapsis_deg),
            ("longAscNodeDeg", self.long_asc_node_deg),
            ("meanAnomalyDeg", self.mean_anomaly_deg),
            ("periodDays", self.period_days),
        ];

        if fields.iter().all(|(_, value)| value.is_none()) {
            return Ok(None);
        }

        let require = |index: usize| {
            let (field, value) = fields[index];
            value.ok_or(CatalogError::IncompleteElements { body_id: self.id, field })
        };

        Ok(Some(OrbitalElements {
            semi_major_axis_km: require(0)?,
            eccentricity: require(1)?,
            inclination_deg: require(2)?,
            arg_of_periapsis_deg: require(3)?,
            long_asc_node_deg: require(4)?,
            mean_anomaly_deg: require(5)?,
            period_days: require(6)?,
        }))
    }

    /// Validate the record in isolation. Parent references are resolved by the catalog.
    pub fn validate(&self) -> Result<Body, CatalogError> {
        let elements = self.elements()?;

        match (&elements, self.parent_id) {
            (Some(elements), _) => elements.validate(self.id)?,
            (None, Some(parent_id)) => {
                return Err(CatalogError::StaticBodyWithParent { body_id: self.id, parent_id });
            }
            (None, None) => {}
        }

        if let Some(hours) = self.sidereal_rotation_hours {
            if !hours.is_finite() {
                return Err(CatalogError::NonFinite {
                    body_id: self.id,
                    field: "siderealRotationHours",
                });
            }
            if hours == 0.0 {
                return Err(CatalogError::ZeroRotationPeriod { body_id: self.id });
            }
        }

        Ok(Body {
            id: self.id,
            name: self.name.clone().unwrap_or_else(|| format!("body-{}", self.id)),
            parent_id: self.parent_id,
            elements,
            sidereal_rotation_hours: self.sidereal_rotation_hours,
        })
    }
}

/// A validated catalog body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: BodyId,
    pub name: String,
    pub parent_id: Option<BodyId>,
    pub elements: Option<OrbitalElements>,
    pub sidereal_rotation_hours: Option<f64>,
}

impl Body {
    /// Bodies without elements sit at the origin and are never solved
    pub fn is_static(&self) -> bool {
        self.elements.is_none()
    }
}
