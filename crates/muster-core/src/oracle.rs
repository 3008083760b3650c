//! Sensor / language interpretation oracle.
//!
//! The oracle converts raw observations (free-text reports from humans,
//! sensor readings from scouts) into structured incident drafts. It is an
//! external collaborator: the engine consumes only this contract, and a
//! deployment may back it with a language model. The bundled
//! [`HeuristicOracle`] is a deterministic keyword and sensor-flag
//! classifier so the engine runs self-contained.

use contracts::{
    IncidentKind, IncidentStatus, Location, ResourceRequirement, Severity, UnitKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the interpretation backend. Callers treat an error as "no
/// new information" for the affected reasoning cycle rather than crashing.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("interpretation backend unavailable: {0}")]
    Unavailable(String),
    #[error("malformed observation: {0}")]
    Malformed(String),
}

/// A raw sensor sweep from a scout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SensorReading {
    pub x: f64,
    pub y: f64,
    pub heat_detected: bool,
    pub smoke_detected: bool,
    pub structural_anomaly: bool,
    /// Heat signature strength on a 0..=255 scale.
    pub heat_value: f64,
    pub description: String,
    /// Localized source of the anomaly, when the sensor could resolve one.
    pub incident_x: Option<f64>,
    pub incident_y: Option<f64>,
    pub severity_hint: Option<u8>,
}

/// An interpreted incident before the runtime assigns it an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDraft {
    pub kind: IncidentKind,
    pub severity: Severity,
    pub location: Location,
    pub status: IncidentStatus,
    pub requirements: Vec<ResourceRequirement>,
    pub estimated_impact: u32,
    pub description: Option<String>,
}

/// Contract consumed by detection-capable actors and the reporting surface.
///
/// `None` means the observation did not clear the acceptance threshold;
/// `Err` means the backend itself failed.
pub trait InterpretationOracle {
    fn interpret_report(
        &self,
        text: &str,
        location: Location,
    ) -> Result<Option<IncidentDraft>, OracleError>;

    fn interpret_sensor(
        &self,
        reading: &SensorReading,
    ) -> Result<Option<IncidentDraft>, OracleError>;
}

// ---------------------------------------------------------------------------
// Heuristic oracle
// ---------------------------------------------------------------------------

/// Minimum interpretation confidence accepted from sensor readings.
const SENSOR_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Deterministic keyword and sensor-flag classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }

    fn classify_kind(text: &str) -> IncidentKind {
        let text = text.to_lowercase();
        if text.contains("fire") || text.contains("smoke") || text.contains("burning") {
            IncidentKind::Fire
        } else if text.contains("collapse") || text.contains("rubble") {
            IncidentKind::StructuralCollapse
        } else if text.contains("hazmat") || text.contains("chemical") || text.contains("spill") {
            IncidentKind::Hazmat
        } else if text.contains("flood") || text.contains("water rising") {
            IncidentKind::Flood
        } else if text.contains("medical")
            || text.contains("injured")
            || text.contains("hurt")
            || text.contains("heart")
            || text.contains("unconscious")
        {
            IncidentKind::Medical
        } else {
            IncidentKind::Unknown
        }
    }

    fn classify_severity(text: &str) -> Severity {
        let text = text.to_lowercase();
        if text.contains("critical")
            || text.contains("explosion")
            || text.contains("spreading")
            || text.contains("casualties")
        {
            Severity::Critical
        } else if text.contains("urgent") || text.contains("severe") || text.contains("trapped") {
            Severity::High
        } else if text.contains("minor") || text.contains("small") {
            Severity::Low
        } else {
            Severity::Medium
        }
    }
}

/// Resource demand heuristic shared by both interpretation paths: fires get
/// trucks (plus an ambulance when severe), medical incidents get ambulances,
/// collapses get both in force. Other kinds carry no pre-computed demand.
pub fn determine_requirements(kind: IncidentKind, severity: Severity) -> Vec<ResourceRequirement> {
    let mut requirements = Vec::new();
    match kind {
        IncidentKind::Fire => {
            let quantity = if severity.rank() <= 3 { 1 } else { 2 };
            requirements.push(ResourceRequirement {
                kind: UnitKind::FireTruck,
                quantity,
                priority: severity,
            });
            if severity.rank() >= 4 {
                requirements.push(ResourceRequirement {
                    kind: UnitKind::Ambulance,
                    quantity: 1,
                    priority: severity,
                });
            }
        }
        IncidentKind::Medical => {
            let quantity = if severity.rank() <= 3 { 1 } else { 2 };
            requirements.push(ResourceRequirement {
                kind: UnitKind::Ambulance,
                quantity,
                priority: severity,
            });
        }
        IncidentKind::StructuralCollapse => {
            requirements.push(ResourceRequirement {
                kind: UnitKind::FireTruck,
                quantity: 2,
                priority: severity,
            });
            requirements.push(ResourceRequirement {
                kind: UnitKind::Ambulance,
                quantity: 2,
                priority: severity,
            });
        }
        IncidentKind::Hazmat | IncidentKind::Flood | IncidentKind::Unknown => {}
    }
    requirements
}

impl InterpretationOracle for HeuristicOracle {
    /// Human reports always yield an incident: an unclassifiable report
    /// still becomes an Unknown-kind record so demand is never lost, which
    /// mirrors the dispatch fallback of treating every call as real.
    fn interpret_report(
        &self,
        text: &str,
        location: Location,
    ) -> Result<Option<IncidentDraft>, OracleError> {
        if text.trim().is_empty() {
            return Err(OracleError::Malformed("empty report text".to_string()));
        }

        let kind = Self::classify_kind(text);
        let severity = if kind == IncidentKind::Unknown {
            Severity::Unknown
        } else {
            Self::classify_severity(text)
        };

        Ok(Some(IncidentDraft {
            kind,
            severity,
            location,
            status: IncidentStatus::Reported,
            requirements: determine_requirements(kind, severity),
            estimated_impact: if severity >= Severity::High { 1 } else { 0 },
            description: Some(text.to_string()),
        }))
    }

    /// Sensor readings are confirmed detections, but only above the
    /// confidence threshold; a clean sweep interprets to `None`.
    fn interpret_sensor(
        &self,
        reading: &SensorReading,
    ) -> Result<Option<IncidentDraft>, OracleError> {
        let (kind, confidence) = if reading.heat_detected || reading.smoke_detected {
            (IncidentKind::Fire, (reading.heat_value / 255.0).clamp(0.0, 1.0))
        } else if reading.structural_anomaly {
            (IncidentKind::StructuralCollapse, 0.8)
        } else {
            return Ok(None);
        };

        if confidence < SENSOR_CONFIDENCE_THRESHOLD {
            return Ok(None);
        }

        let severity = reading
            .severity_hint
            .map(Severity::from_rank)
            .unwrap_or(Severity::Medium);

        let location = match (reading.incident_x, reading.incident_y) {
            (Some(x), Some(y)) => Location::new(x, y),
            _ => Location::new(reading.x, reading.y),
        };

        Ok(Some(IncidentDraft {
            kind,
            severity,
            location,
            status: IncidentStatus::Confirmed,
            requirements: determine_requirements(kind, severity),
            estimated_impact: 0,
            description: Some(format!("detected by scout: {}", reading.description)),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
