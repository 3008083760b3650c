//! Engine and policy configuration.
//!
//! Negotiation thresholds (abandonment gap, coalition cutoffs, fuel
//! penalties) are policy, not law: they ship with defaults matching the
//! reference deployment but are plain serde fields so operators can tune
//! them per run.

use serde::{Deserialize, Serialize};

use crate::{Location, MapBounds, UnitKind};

/// Tunable negotiation and movement policy shared by all actors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    /// A committed unit abandons only for a Critical incident at least this
    /// many severity ranks above its current one.
    pub abandon_rank_gap: u8,
    /// Minimum severity rank at which an idle unit agrees to a coalition
    /// request (Medium = 3).
    pub coalition_min_rank: u8,
    /// Severity rank at which an engaged unit solicits coalition support
    /// (High = 4).
    pub coalition_trigger_rank: u8,
    /// Below this fuel level, bid cost is multiplied by `low_fuel_penalty`.
    pub low_fuel_threshold: f64,
    pub low_fuel_penalty: f64,
    /// Below this fuel level an idle unit starts wanting to refuel.
    pub refuel_desire_threshold: f64,
    /// Fuel level below which the refuel desire becomes urgent.
    pub refuel_urgent_threshold: f64,
    /// Distance at which a moving unit counts as arrived.
    pub arrival_radius: f64,
    /// Fuel burned per unit of distance traveled.
    pub fuel_burn_per_distance: f64,
    /// Cycles an engaged unit spends working an incident before reporting
    /// resolution.
    pub response_duration_cycles: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            abandon_rank_gap: 2,
            coalition_min_rank: 3,
            coalition_trigger_rank: 4,
            low_fuel_threshold: 0.3,
            low_fuel_penalty: 2.0,
            refuel_desire_threshold: 0.5,
            refuel_urgent_threshold: 0.2,
            arrival_radius: 1.0,
            fuel_burn_per_distance: 0.002,
            response_duration_cycles: 3,
        }
    }
}

impl PolicyConfig {
    /// Movement speed in distance units per reasoning cycle.
    pub fn move_speed(&self, kind: UnitKind) -> f64 {
        match kind {
            UnitKind::FireTruck | UnitKind::Ambulance => 2.0,
            UnitKind::Scout => 3.0,
        }
    }
}

/// A spawn entry for one response unit in the initial fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitSpawn {
    pub unit_id: String,
    pub kind: UnitKind,
    pub base: Location,
}

/// Top-level engine configuration: timing, map, and initial fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub schema_version: String,
    /// How long an auctioneer collects bids before selecting a winner.
    pub bid_window_ms: u64,
    /// Cadence of each responder's BDI reasoning cycle.
    pub cycle_period_ms: u64,
    /// Cadence of each scout's patrol/scan step.
    pub scout_period_ms: u64,
    /// After this long without a resolution report from the assigned unit,
    /// the auctioneer surfaces a liveness warning to the operator.
    pub liveness_timeout_ms: u64,
    pub map_bounds: MapBounds,
    pub fleet: Vec<UnitSpawn>,
    pub policy: PolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::SCHEMA_VERSION_V1.to_string(),
            bid_window_ms: 5_000,
            cycle_period_ms: 1_000,
            scout_period_ms: 3_000,
            liveness_timeout_ms: 300_000,
            map_bounds: MapBounds::default(),
            fleet: default_fleet(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Reference fleet: three fire trucks, two ambulances, two scouts.
fn default_fleet() -> Vec<UnitSpawn> {
    vec![
        UnitSpawn {
            unit_id: "fire_truck_1".to_string(),
            kind: UnitKind::FireTruck,
            base: Location::new(20.0, 20.0),
        },
        UnitSpawn {
            unit_id: "fire_truck_2".to_string(),
            kind: UnitKind::FireTruck,
            base: Location::new(80.0, 20.0),
        },
        UnitSpawn {
            unit_id: "fire_truck_3".to_string(),
            kind: UnitKind::FireTruck,
            base: Location::new(50.0, 80.0),
        },
        UnitSpawn {
            unit_id: "ambulance_1".to_string(),
            kind: UnitKind::Ambulance,
            base: Location::new(30.0, 50.0),
        },
        UnitSpawn {
            unit_id: "ambulance_2".to_string(),
            kind: UnitKind::Ambulance,
            base: Location::new(70.0, 50.0),
        },
        UnitSpawn {
            unit_id: "scout_1".to_string(),
            kind: UnitKind::Scout,
            base: Location::new(25.0, 25.0),
        },
        UnitSpawn {
            unit_id: "scout_2".to_string(),
            kind: UnitKind::Scout,
            base: Location::new(75.0, 75.0),
        },
    ]
}
