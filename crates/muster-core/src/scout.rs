//! Scout units: autonomous patrol and incident detection.
//!
//! A scout sweeps the map on randomized waypoints, scans its surroundings
//! each cycle, and hands anything its sensors pick up to the interpretation
//! oracle. Confirmed detections surface as incident drafts for the runtime
//! to submit. Patrol routes come from a seeded generator so a whole run is
//! reproducible from its seed.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{
    Location, MapBounds, PolicyConfig, Severity, UnitKind, UnitState, UnitStatus,
};
use tracing::{debug, warn};

use crate::bdi::{BdiEngine, CycleReport, Desire, Reasoner, StepOutcome};
use crate::oracle::{IncidentDraft, InterpretationOracle, SensorReading};

pub const ACTION_SCAN_AREA: &str = "scan_area";
pub const ACTION_MOVE_TO_WAYPOINT: &str = "move_to_waypoint";
pub const ACTION_RETURN_TO_BASE: &str = "return_to_base";
pub const ACTION_REFUEL: &str = "refuel";

/// How far a scout's sensors reach, in map units.
pub const DETECTION_RADIUS: f64 = 12.0;

// ---------------------------------------------------------------------------
// Deterministic randomness
// ---------------------------------------------------------------------------

/// SplitMix64 generator. Small state, good dispersion, and fully
/// reproducible from the seed, which is all patrol routing needs.
#[derive(Debug, Clone)]
pub struct ScoutRng {
    state: u64,
}

impl ScoutRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }
}

// ---------------------------------------------------------------------------
// Simulated sensor field
// ---------------------------------------------------------------------------

/// One latent anomaly on the map, waiting to be flown over.
#[derive(Debug, Clone)]
pub struct Hotspot {
    pub location: Location,
    pub heat: bool,
    pub structural: bool,
    /// Signature strength on a 0..=255 scale; weak signatures fall below
    /// the oracle's confidence cutoff.
    pub intensity: f64,
    pub severity_rank: u8,
    detected: bool,
}

impl Hotspot {
    pub fn fire(location: Location, intensity: f64, severity: Severity) -> Self {
        Self {
            location,
            heat: true,
            structural: false,
            intensity,
            severity_rank: severity.rank(),
            detected: false,
        }
    }

    pub fn collapse(location: Location, severity: Severity) -> Self {
        Self {
            location,
            heat: false,
            structural: true,
            intensity: 0.0,
            severity_rank: severity.rank(),
            detected: false,
        }
    }
}

/// Ground truth for the simulation: anomalies scattered over the map that
/// scouts discover by proximity. Each hotspot is reported at most once.
#[derive(Debug, Clone, Default)]
pub struct SensorField {
    hotspots: Vec<Hotspot>,
}

impl SensorField {
    pub fn new(hotspots: Vec<Hotspot>) -> Self {
        Self { hotspots }
    }

    /// Scatter `count` anomalies over the bounds, reproducibly from `seed`.
    pub fn generate(seed: u64, bounds: MapBounds, count: usize) -> Self {
        let mut rng = ScoutRng::new(seed);
        let mut hotspots = Vec::with_capacity(count);
        for _ in 0..count {
            let location = Location::new(
                rng.range_f64(bounds.min_x, bounds.max_x),
                rng.range_f64(bounds.min_y, bounds.max_y),
            );
            let severity = Severity::from_rank(2 + (rng.next_u64() % 4) as u8);
            if rng.next_f64() < 0.7 {
                hotspots.push(Hotspot::fire(location, rng.range_f64(120.0, 255.0), severity));
            } else {
                hotspots.push(Hotspot::collapse(location, severity));
            }
        }
        Self { hotspots }
    }

    pub fn remaining(&self) -> usize {
        self.hotspots.iter().filter(|h| !h.detected).count()
    }

    /// Sweep the area around `position`. The nearest undetected hotspot in
    /// range is consumed and returned as a reading; otherwise the reading
    /// is a clean sweep.
    pub fn scan(&mut self, position: Location, radius: f64) -> SensorReading {
        let mut nearest: Option<(usize, f64)> = None;
        for (i, hotspot) in self.hotspots.iter().enumerate() {
            if hotspot.detected {
                continue;
            }
            let distance = position.distance_to(&hotspot.location);
            if distance > radius {
                continue;
            }
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((i, distance));
            }
        }

        let mut reading = SensorReading {
            x: position.x,
            y: position.y,
            description: "clean sweep".to_string(),
            ..SensorReading::default()
        };

        if let Some((i, _)) = nearest {
            let hotspot = &mut self.hotspots[i];
            hotspot.detected = true;
            reading.heat_detected = hotspot.heat;
            reading.structural_anomaly = hotspot.structural;
            reading.heat_value = hotspot.intensity;
            reading.incident_x = Some(hotspot.location.x);
            reading.incident_y = Some(hotspot.location.y);
            reading.severity_hint = Some(hotspot.severity_rank);
            reading.description = if hotspot.heat {
                "heat signature and smoke plume".to_string()
            } else {
                "structural anomaly in debris field".to_string()
            };
        }

        reading
    }
}

// ---------------------------------------------------------------------------
// Scout body
// ---------------------------------------------------------------------------

/// Mutable scout state plus its collaborators. Detections accumulate in an
/// outbox the actor loop drains after each cycle.
pub struct ScoutBody {
    state: UnitState,
    base: Location,
    bounds: MapBounds,
    policy: PolicyConfig,
    rng: ScoutRng,
    field: SensorField,
    oracle: Arc<dyn InterpretationOracle + Send + Sync>,
    waypoint: Option<Location>,
    detections: Vec<IncidentDraft>,
}

impl ScoutBody {
    pub fn new(
        unit_id: impl Into<String>,
        base: Location,
        bounds: MapBounds,
        policy: PolicyConfig,
        seed: u64,
        field: SensorField,
        oracle: Arc<dyn InterpretationOracle + Send + Sync>,
    ) -> Self {
        Self {
            state: UnitState::new(unit_id, UnitKind::Scout, base),
            base,
            bounds,
            policy,
            rng: ScoutRng::new(seed),
            field,
            oracle,
            waypoint: None,
            detections: Vec::new(),
        }
    }

    fn pick_waypoint(&mut self) -> Location {
        Location::new(
            self.rng.range_f64(self.bounds.min_x, self.bounds.max_x),
            self.rng.range_f64(self.bounds.min_y, self.bounds.max_y),
        )
    }

    /// Move one cycle's worth toward `target`; returns true on arrival.
    fn step_toward(&mut self, target: Location) -> bool {
        let distance = self.state.location.distance_to(&target);
        if distance <= self.policy.arrival_radius {
            return true;
        }
        let speed = self.policy.move_speed(self.state.kind);
        let step = speed.min(distance);
        let dx = (target.x - self.state.location.x) / distance;
        let dy = (target.y - self.state.location.y) / distance;
        self.state.location.x += dx * step;
        self.state.location.y += dy * step;
        self.state.fuel_level =
            (self.state.fuel_level - step * self.policy.fuel_burn_per_distance).max(0.0);
        self.state.location.distance_to(&target) <= self.policy.arrival_radius
    }
}

impl Reasoner for ScoutBody {
    fn deliberate(&self, _beliefs: &crate::belief::BeliefStore) -> Vec<Desire> {
        if self.state.fuel_level < self.policy.refuel_desire_threshold {
            vec![Desire {
                goal_id: "refuel".to_string(),
                description: "return to base and refuel".to_string(),
                priority: 0.9,
                conditions: BTreeMap::new(),
                deadline_ms: None,
            }]
        } else {
            vec![Desire {
                goal_id: "patrol".to_string(),
                description: "sweep the map for anomalies".to_string(),
                priority: 0.6,
                conditions: BTreeMap::new(),
                deadline_ms: None,
            }]
        }
    }

    fn generate_plan(&self, desire: &Desire) -> Option<Vec<String>> {
        match desire.goal_id.as_str() {
            "patrol" => Some(vec![
                ACTION_SCAN_AREA.to_string(),
                ACTION_MOVE_TO_WAYPOINT.to_string(),
            ]),
            "refuel" => Some(vec![
                ACTION_RETURN_TO_BASE.to_string(),
                ACTION_REFUEL.to_string(),
            ]),
            _ => None,
        }
    }

    fn execute_step(
        &mut self,
        _beliefs: &mut crate::belief::BeliefStore,
        action: &str,
    ) -> StepOutcome {
        match action {
            ACTION_SCAN_AREA => {
                let reading = self.field.scan(self.state.location, DETECTION_RADIUS);
                match self.oracle.interpret_sensor(&reading) {
                    Ok(Some(draft)) => {
                        debug!(
                            unit_id = %self.state.unit_id,
                            kind = ?draft.kind,
                            severity = ?draft.severity,
                            "scout confirmed an anomaly"
                        );
                        self.detections.push(draft);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(unit_id = %self.state.unit_id, error = %err, "sensor interpretation failed");
                    }
                }
                StepOutcome::Completed
            }
            ACTION_MOVE_TO_WAYPOINT => {
                let target = match self.waypoint {
                    Some(target) => target,
                    None => {
                        let target = self.pick_waypoint();
                        self.waypoint = Some(target);
                        target
                    }
                };
                if self.step_toward(target) {
                    self.waypoint = None;
                    StepOutcome::Completed
                } else {
                    StepOutcome::InProgress
                }
            }
            ACTION_RETURN_TO_BASE => {
                self.state.status = UnitStatus::Refueling;
                let base = self.base;
                if self.step_toward(base) {
                    StepOutcome::Completed
                } else {
                    StepOutcome::InProgress
                }
            }
            ACTION_REFUEL => {
                self.state.fuel_level = 1.0;
                self.state.status = UnitStatus::Idle;
                self.waypoint = None;
                StepOutcome::Completed
            }
            other => {
                warn!(unit_id = %self.state.unit_id, action = other, "unknown scout action");
                StepOutcome::Failed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scout actor core
// ---------------------------------------------------------------------------

/// A scout's reasoning engine and body, bundled for the actor loop.
pub struct Scout {
    engine: BdiEngine,
    body: ScoutBody,
}

impl Scout {
    pub fn new(body: ScoutBody) -> Self {
        Self {
            engine: BdiEngine::new(),
            body,
        }
    }

    pub fn state(&self) -> &UnitState {
        &self.body.state
    }

    /// Run one reasoning cycle, returning the cycle report and any incident
    /// drafts detected during it.
    pub fn cycle(&mut self, now_ms: u64) -> (CycleReport, Vec<IncidentDraft>) {
        let report = self.engine.cycle(&mut self.body, now_ms);
        (report, std::mem::take(&mut self.body.detections))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
