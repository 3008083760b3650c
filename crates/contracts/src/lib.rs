//! Cross-boundary contract types for the muster coordination kernel.
//!
//! This crate holds the shared ontology for incidents, response units,
//! negotiation messages, and engine configuration. It contains no logic
//! beyond small accessors; everything here is serde-serializable so the
//! same types cross the engine, API, and CLI boundaries unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod messages;

pub use config::{EngineConfig, PolicyConfig, UnitSpawn};
pub use messages::{Envelope, Payload, Performative};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Receiver id used for broadcast delivery on the message bus.
pub const BROADCAST: &str = "broadcast";

// ---------------------------------------------------------------------------
// Spatial model
// ---------------------------------------------------------------------------

/// A point in the shared 2D operating area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another location.
    pub fn distance_to(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounds of the operating area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MapBounds {
    pub fn clamp(&self, location: Location) -> Location {
        Location {
            x: location.x.clamp(self.min_x, self.max_x),
            y: location.y.clamp(self.min_y, self.max_y),
        }
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Incident taxonomy
// ---------------------------------------------------------------------------

/// Formal taxonomy of incidents a response unit can be dispatched to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Fire,
    Medical,
    StructuralCollapse,
    Hazmat,
    Flood,
    Unknown,
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fire => "fire",
            Self::Medical => "medical",
            Self::StructuralCollapse => "structural_collapse",
            Self::Hazmat => "hazmat",
            Self::Flood => "flood",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Severity classification, totally ordered from Unknown up to Critical.
///
/// The numeric rank feeds both bid cost weighting and the abandonment
/// heuristic, so the discriminants are part of the contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Unknown = 0,
    Minimal = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl Severity {
    /// Numeric rank: Critical=5, High=4, Medium=3, Low=2, Minimal=1, Unknown=0.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn from_rank(rank: u8) -> Self {
        match rank {
            5.. => Self::Critical,
            4 => Self::High,
            3 => Self::Medium,
            2 => Self::Low,
            1 => Self::Minimal,
            0 => Self::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Lifecycle states of an incident. Only the owning auctioneer advances them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    Confirmed,
    InProgress,
    Resolved,
    Cancelled,
}

/// Quantity of a given unit kind an incident needs, with its own priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequirement {
    pub kind: UnitKind,
    pub quantity: u32,
    pub priority: Severity,
}

/// Complete record of one incident, owned by its auctioneer actor.
///
/// Bidders never mutate this directly; they only see copies carried in
/// CFP broadcasts and snapshot projections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentRecord {
    pub incident_id: String,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub location: Location,
    pub status: IncidentStatus,
    pub reported_at_ms: u64,
    pub requirements: Vec<ResourceRequirement>,
    /// Estimated people affected, from the interpretation oracle.
    pub estimated_impact: u32,
    pub description: Option<String>,
    pub assigned_units: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response units
// ---------------------------------------------------------------------------

/// The kinds of autonomous response units in the fleet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    FireTruck,
    Ambulance,
    Scout,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FireTruck => "fire_truck",
            Self::Ambulance => "ambulance",
            Self::Scout => "scout",
        };
        f.write_str(label)
    }
}

/// Operational states of a response unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Idle,
    EnRoute,
    Engaged,
    Refueling,
    Offline,
}

/// A response unit's own view of itself, exclusively owned and mutated by
/// that unit's actor. `current_incident` is Some only while the unit is
/// EnRoute or Engaged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitState {
    pub unit_id: String,
    pub kind: UnitKind,
    pub status: UnitStatus,
    pub location: Location,
    /// 0.0 = empty, 1.0 = full.
    pub fuel_level: f64,
    pub capacity: BTreeMap<String, i64>,
    pub current_incident: Option<String>,
}

impl UnitState {
    pub fn new(unit_id: impl Into<String>, kind: UnitKind, location: Location) -> Self {
        Self {
            unit_id: unit_id.into(),
            kind,
            status: UnitStatus::Idle,
            location,
            fuel_level: 1.0,
            capacity: default_capacity(kind),
            current_incident: None,
        }
    }
}

fn default_capacity(kind: UnitKind) -> BTreeMap<String, i64> {
    let mut capacity = BTreeMap::new();
    match kind {
        UnitKind::FireTruck => {
            capacity.insert("water".to_string(), 1000);
            capacity.insert("foam".to_string(), 500);
        }
        UnitKind::Ambulance => {
            capacity.insert("medical_supplies".to_string(), 100);
            capacity.insert("stretchers".to_string(), 2);
        }
        UnitKind::Scout => {
            capacity.insert("battery".to_string(), 100);
            capacity.insert("sensors".to_string(), 1);
        }
    }
    capacity
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

/// A proposal from a response unit for one incident. Immutable once sent;
/// it only exists within the auctioneer's collection window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub bidder_id: String,
    pub incident_id: String,
    /// Non-negative; lower cost means more willing.
    pub cost: f64,
    /// Estimated time to arrival, in seconds.
    pub estimated_arrival: f64,
    pub submitted_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Snapshot projection
// ---------------------------------------------------------------------------

/// Read-only projection of the whole system, assembled from per-actor
/// published copies. This is the only cross-actor visibility surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemSnapshot {
    pub incidents: BTreeMap<String, IncidentRecord>,
    pub units: BTreeMap<String, UnitState>,
}

// ---------------------------------------------------------------------------
// API error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    IncidentNotFound,
    InvalidRequest,
    OracleUnavailable,
    InternalError,
}

/// Error body returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub schema_version: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            code,
            message: message.into(),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
