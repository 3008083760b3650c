//! Responder units: the bidder side of the contract net.
//!
//! A responder evaluates call-for-proposals against its capability table and
//! current commitment, computes bid costs, and executes committed plans
//! (drive to the incident, work it, report completion, refuel between
//! missions). The BDI bookkeeping lives in [`crate::bdi`]; this module
//! supplies the unit-specific deliberation, planning, and step execution.

use contracts::messages::{AssignmentBody, CfpBody, CoalitionReplyBody, InformBody, Payload};
use contracts::{
    Bid, Envelope, IncidentKind, IncidentStatus, Location, PolicyConfig, Severity, UnitKind,
    UnitState, UnitStatus,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bdi::{BdiEngine, CycleReport, Desire, Reasoner, StepOutcome};
use crate::belief::BeliefStore;
use crate::bus::Outbound;
use crate::coalition::{self, CoalitionDecision};

// Plan action names.
const ACT_MOVE_TO_INCIDENT: &str = "move_to_incident";
const ACT_EXECUTE_RESPONSE: &str = "execute_response";
const ACT_REPORT_COMPLETION: &str = "report_completion";
const ACT_MOVE_TO_BASE: &str = "move_to_base";
const ACT_REFUEL: &str = "refuel";

// Goal ids.
const GOAL_COMPLETE_MISSION: &str = "complete_mission";
const GOAL_REFUEL: &str = "refuel";

/// Raised when an ACCEPT arrives while the unit is already committed to a
/// mission the abandonment rule does not release. Double-commits are a logic
/// invariant violation: the cycle rejects the new commitment and carries on.
#[derive(Debug, Clone, Error, PartialEq)]
#[error(
    "unit {unit_id} already committed to {current_incident} (severity {current_severity}); \
     refusing assignment to {offered_incident}"
)]
pub struct CommitmentConflict {
    pub unit_id: String,
    pub current_incident: String,
    pub current_severity: Severity,
    pub offered_incident: String,
}

/// Capability table: which incident kinds a unit kind can work.
pub fn can_handle(unit: UnitKind, incident: IncidentKind) -> bool {
    match unit {
        UnitKind::FireTruck => matches!(
            incident,
            IncidentKind::Fire | IncidentKind::StructuralCollapse | IncidentKind::Hazmat
        ),
        UnitKind::Ambulance => {
            matches!(incident, IncidentKind::Medical | IncidentKind::StructuralCollapse)
        }
        UnitKind::Scout => false,
    }
}

/// Abandonment heuristic: only a Critical incident at least `gap` severity
/// ranks above the current one releases an existing commitment.
pub fn should_abandon(current: Severity, new: Severity, policy: &PolicyConfig) -> bool {
    new == Severity::Critical && new.rank() >= current.rank().saturating_add(policy.abandon_rank_gap)
}

// ---------------------------------------------------------------------------
// Responder body
// ---------------------------------------------------------------------------

/// Everything a responder knows about itself: owned state, policy, current
/// assignment, and the outbox of messages its act phase produced.
#[derive(Debug, Clone)]
pub struct ResponderBody {
    pub state: UnitState,
    pub base: Location,
    policy: PolicyConfig,
    mission: Option<AssignmentBody>,
    response_cycles_left: u32,
    outbox: Vec<Outbound>,
}

impl ResponderBody {
    pub fn new(
        unit_id: impl Into<String>,
        kind: UnitKind,
        base: Location,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            state: UnitState::new(unit_id, kind, base),
            base,
            policy,
            mission: None,
            response_cycles_left: 0,
            outbox: Vec::new(),
        }
    }

    pub fn mission(&self) -> Option<&AssignmentBody> {
        self.mission.as_ref()
    }

    /// Evaluate a call-for-proposals. Returns a bid, or `None` when the unit
    /// lacks the capability or is committed and the new incident does not
    /// qualify for abandonment. Silence is the protocol's "no"; there is no
    /// explicit decline message.
    pub fn evaluate_cfp(&self, cfp: &CfpBody, now_ms: u64) -> Option<Bid> {
        if !can_handle(self.state.kind, cfp.kind) {
            return None;
        }

        if let Some(current) = &self.mission {
            if !should_abandon(current.severity, cfp.severity, &self.policy) {
                debug!(
                    unit = %self.state.unit_id,
                    current = %current.incident_id,
                    offered = %cfp.incident_id,
                    "committed and not abandoning; withholding bid"
                );
                return None;
            }
        }

        let distance = self.state.location.distance_to(&cfp.location);
        let mut cost = distance / f64::from(cfp.severity.rank() + 1);
        if self.state.fuel_level < self.policy.low_fuel_threshold {
            cost *= self.policy.low_fuel_penalty;
        }
        let eta = distance / self.policy.move_speed(self.state.kind);

        Some(Bid {
            bidder_id: self.state.unit_id.clone(),
            incident_id: cfp.incident_id.clone(),
            cost,
            estimated_arrival: eta,
            submitted_at_ms: now_ms,
        })
    }

    /// Commit to a won auction. The commitment is irrevocable until
    /// completion or a qualifying abandonment.
    pub fn on_accepted(
        &mut self,
        assignment: AssignmentBody,
        beliefs: &mut BeliefStore,
        now_ms: u64,
    ) -> Result<(), CommitmentConflict> {
        if let Some(current) = &self.mission {
            // At-least-once delivery: a replayed accept for the mission the
            // unit already holds changes nothing.
            if current.incident_id == assignment.incident_id {
                return Ok(());
            }
            if !should_abandon(current.severity, assignment.severity, &self.policy) {
                return Err(CommitmentConflict {
                    unit_id: self.state.unit_id.clone(),
                    current_incident: current.incident_id.clone(),
                    current_severity: current.severity,
                    offered_incident: assignment.incident_id,
                });
            }
            info!(
                unit = %self.state.unit_id,
                abandoned = %current.incident_id,
                for_incident = %assignment.incident_id,
                "abandoning commitment for critical incident"
            );
        }

        beliefs.perceive(
            "current_mission",
            json!(assignment.incident_id),
            now_ms,
            "dispatch",
        );
        beliefs.perceive(
            "mission_location",
            json!({"x": assignment.location.x, "y": assignment.location.y}),
            now_ms,
            "dispatch",
        );
        beliefs.perceive("mission_kind", json!(assignment.kind.to_string()), now_ms, "dispatch");

        self.state.status = UnitStatus::EnRoute;
        self.state.current_incident = Some(assignment.incident_id.clone());
        self.response_cycles_left = self.policy.response_duration_cycles;
        self.mission = Some(assignment);
        Ok(())
    }

    /// A lost auction leaves no trace beyond a transient belief.
    pub fn on_rejected(&mut self, incident_id: &str, beliefs: &mut BeliefStore, now_ms: u64) {
        beliefs.perceive("last_rejected_bid", json!(incident_id), now_ms, "dispatch");
    }

    fn clear_mission(&mut self, beliefs: &mut BeliefStore) {
        beliefs.remove("current_mission");
        beliefs.remove("mission_location");
        beliefs.remove("mission_kind");
        self.mission = None;
        self.state.current_incident = None;
        self.state.status = UnitStatus::Idle;
    }

    /// Move one cycle's worth of distance toward a target, burning fuel in
    /// proportion. Returns true once within the arrival radius.
    fn step_toward(&mut self, target: Location) -> bool {
        let distance = self.state.location.distance_to(&target);
        if distance <= self.policy.arrival_radius {
            self.state.location = target;
            return true;
        }

        let speed = self.policy.move_speed(self.state.kind);
        let moved = speed.min(distance);
        let dx = (target.x - self.state.location.x) / distance;
        let dy = (target.y - self.state.location.y) / distance;
        self.state.location.x += dx * moved;
        self.state.location.y += dy * moved;
        self.state.fuel_level =
            (self.state.fuel_level - moved * self.policy.fuel_burn_per_distance).max(0.0);

        self.state.location.distance_to(&target) <= self.policy.arrival_radius
    }
}

impl Reasoner for ResponderBody {
    fn deliberate(&self, _beliefs: &BeliefStore) -> Vec<Desire> {
        let mut desires = Vec::new();

        if let Some(mission) = &self.mission {
            desires.push(Desire {
                goal_id: GOAL_COMPLETE_MISSION.to_string(),
                description: format!("respond to {}", mission.incident_id),
                priority: 0.8,
                conditions: [("at_incident".to_string(), json!(true))].into(),
                deadline_ms: None,
            });
        } else if self.state.fuel_level < self.policy.refuel_desire_threshold {
            let urgent = self.state.fuel_level < self.policy.refuel_urgent_threshold;
            desires.push(Desire {
                goal_id: GOAL_REFUEL.to_string(),
                description: "return to base and refuel".to_string(),
                priority: if urgent { 0.9 } else { 0.3 },
                conditions: [("fuel_level".to_string(), json!(1.0))].into(),
                deadline_ms: None,
            });
        }

        desires
    }

    fn generate_plan(&self, desire: &Desire) -> Option<Vec<String>> {
        match desire.goal_id.as_str() {
            GOAL_COMPLETE_MISSION => Some(vec![
                ACT_MOVE_TO_INCIDENT.to_string(),
                ACT_EXECUTE_RESPONSE.to_string(),
                ACT_REPORT_COMPLETION.to_string(),
            ]),
            GOAL_REFUEL => Some(vec![ACT_MOVE_TO_BASE.to_string(), ACT_REFUEL.to_string()]),
            _ => None,
        }
    }

    fn execute_step(&mut self, beliefs: &mut BeliefStore, action: &str) -> StepOutcome {
        match action {
            ACT_MOVE_TO_INCIDENT => {
                let Some(target) = self.mission.as_ref().map(|m| m.location) else {
                    return StepOutcome::Failed;
                };
                if self.step_toward(target) {
                    self.state.status = UnitStatus::Engaged;
                    info!(
                        unit = %self.state.unit_id,
                        incident = %self.state.current_incident.as_deref().unwrap_or(""),
                        "arrived on scene"
                    );
                    StepOutcome::Completed
                } else {
                    StepOutcome::InProgress
                }
            }
            ACT_EXECUTE_RESPONSE => {
                if self.response_cycles_left > 0 {
                    self.response_cycles_left -= 1;
                }
                if self.response_cycles_left == 0 {
                    StepOutcome::Completed
                } else {
                    StepOutcome::InProgress
                }
            }
            ACT_REPORT_COMPLETION => {
                let Some(mission) = self.mission.clone() else {
                    return StepOutcome::Failed;
                };
                self.outbox.push(Outbound::new(
                    mission.incident_id.clone(),
                    Envelope::new(
                        self.state.unit_id.clone(),
                        mission.incident_id.clone(),
                        Payload::Inform(InformBody {
                            incident_id: mission.incident_id.clone(),
                            status: IncidentStatus::Resolved,
                        }),
                    ),
                ));
                info!(unit = %self.state.unit_id, incident = %mission.incident_id, "mission complete");
                self.clear_mission(beliefs);
                StepOutcome::Completed
            }
            ACT_MOVE_TO_BASE => {
                self.state.status = UnitStatus::Refueling;
                if self.step_toward(self.base) {
                    StepOutcome::Completed
                } else {
                    StepOutcome::InProgress
                }
            }
            ACT_REFUEL => {
                self.state.fuel_level = 1.0;
                self.state.status = UnitStatus::Idle;
                StepOutcome::Completed
            }
            _ => StepOutcome::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Responder: BDI engine + body
// ---------------------------------------------------------------------------

/// One autonomous response unit: the generic BDI engine composed with the
/// unit-specific body. The owning actor task is the only writer.
#[derive(Debug)]
pub struct Responder {
    pub engine: BdiEngine,
    pub body: ResponderBody,
}

impl Responder {
    pub fn new(
        unit_id: impl Into<String>,
        kind: UnitKind,
        base: Location,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            engine: BdiEngine::new(),
            body: ResponderBody::new(unit_id, kind, base, policy),
        }
    }

    pub fn state(&self) -> &UnitState {
        &self.body.state
    }

    /// Run one reasoning cycle and collect any messages the act phase queued.
    pub fn cycle(&mut self, now_ms: u64) -> (CycleReport, Vec<Outbound>) {
        let report = self.engine.cycle(&mut self.body, now_ms);
        (report, std::mem::take(&mut self.body.outbox))
    }

    /// Handle one negotiation message, returning replies to send. A
    /// commitment conflict is surfaced to the caller; the unit's existing
    /// commitment stands and the offending assignment is ignored.
    pub fn handle_message(
        &mut self,
        envelope: &Envelope,
        now_ms: u64,
    ) -> Result<Vec<Outbound>, CommitmentConflict> {
        let mut replies = Vec::new();

        match &envelope.payload {
            Payload::Cfp(cfp) => {
                if let Some(bid) = self.body.evaluate_cfp(cfp, now_ms) {
                    info!(
                        unit = %self.body.state.unit_id,
                        incident = %cfp.incident_id,
                        cost = bid.cost,
                        "bidding"
                    );
                    replies.push(Outbound::new(
                        envelope.sender.clone(),
                        Envelope::new(
                            self.body.state.unit_id.clone(),
                            cfp.incident_id.clone(),
                            Payload::Propose(bid),
                        ),
                    ));
                }
            }
            Payload::Accept(assignment) => {
                let replaces_mission = self
                    .body
                    .mission()
                    .map_or(false, |m| m.incident_id != assignment.incident_id);
                self.body
                    .on_accepted(assignment.clone(), &mut self.engine.beliefs, now_ms)?;
                if replaces_mission {
                    // The old plan cursor may sit mid-response at the wrong
                    // scene; the new commitment starts with fresh travel.
                    self.engine.drop_goal(GOAL_COMPLETE_MISSION);
                }
                info!(
                    unit = %self.body.state.unit_id,
                    incident = %assignment.incident_id,
                    "bid accepted; en route"
                );
            }
            Payload::Reject(body) => {
                self.body
                    .on_rejected(&body.incident_id, &mut self.engine.beliefs, now_ms);
            }
            Payload::Request(request) => {
                let decision = coalition::evaluate_request(
                    self.body.state.status,
                    request.severity,
                    &self.body.policy,
                );
                let reply = CoalitionReplyBody {
                    coalition_id: request.coalition_id.clone(),
                };
                let payload = match decision {
                    CoalitionDecision::Agree => Payload::Agree(reply),
                    CoalitionDecision::Refuse => Payload::Refuse(reply),
                };
                replies.push(Outbound::new(
                    envelope.sender.clone(),
                    Envelope::new(
                        self.body.state.unit_id.clone(),
                        request.coalition_id.clone(),
                        payload,
                    ),
                ));
            }
            Payload::Agree(reply) => {
                self.engine.beliefs.perceive(
                    format!("coalition_{}_member", reply.coalition_id),
                    json!(envelope.sender),
                    now_ms,
                    envelope.sender.clone(),
                );
            }
            Payload::Refuse(_) => {}
            Payload::Cancel(body) => {
                // No preemptive cancellation of intentions in this core; the
                // unit finishes its committed plan regardless.
                warn!(
                    unit = %self.body.state.unit_id,
                    incident = %body.incident_id,
                    "incident cancelled externally; commitment unaffected"
                );
            }
            Payload::Propose(_) | Payload::Inform(_) => {
                // Auctioneer-side traffic; nothing for a responder to do.
            }
        }

        Ok(replies)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ResourceRequirement;

    fn cfp(incident_id: &str, kind: IncidentKind, severity: Severity, x: f64, y: f64) -> CfpBody {
        CfpBody {
            incident_id: incident_id.to_string(),
            kind,
            severity,
            location: Location::new(x, y),
            requirements: vec![ResourceRequirement {
                kind: UnitKind::FireTruck,
                quantity: 1,
                priority: severity,
            }],
            estimated_impact: 0,
        }
    }

    fn assignment(incident_id: &str, severity: Severity, x: f64, y: f64) -> AssignmentBody {
        AssignmentBody {
            incident_id: incident_id.to_string(),
            kind: IncidentKind::Fire,
            severity,
            location: Location::new(x, y),
        }
    }

    fn truck_at(x: f64, y: f64) -> ResponderBody {
        ResponderBody::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(x, y),
            PolicyConfig::default(),
        )
    }

    #[test]
    fn capability_table_matches_unit_kinds() {
        assert!(can_handle(UnitKind::FireTruck, IncidentKind::Fire));
        assert!(can_handle(UnitKind::FireTruck, IncidentKind::StructuralCollapse));
        assert!(can_handle(UnitKind::FireTruck, IncidentKind::Hazmat));
        assert!(!can_handle(UnitKind::FireTruck, IncidentKind::Medical));

        assert!(can_handle(UnitKind::Ambulance, IncidentKind::Medical));
        assert!(can_handle(UnitKind::Ambulance, IncidentKind::StructuralCollapse));
        assert!(!can_handle(UnitKind::Ambulance, IncidentKind::Fire));

        assert!(!can_handle(UnitKind::Scout, IncidentKind::Fire));
    }

    #[test]
    fn cost_divides_distance_by_severity_rank_plus_one() {
        // Critical incident at (25,22); unit A at distance 5 with full fuel.
        let body = truck_at(25.0, 17.0);
        let bid = body
            .evaluate_cfp(&cfp("inc_1", IncidentKind::Fire, Severity::Critical, 25.0, 22.0), 0)
            .expect("bid");
        assert!((bid.cost - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn low_fuel_doubles_the_cost() {
        // Unit B at distance 3 with fuel 0.1: cost = (3/6) * 2.0 = 1.0, so
        // the closer-but-thirsty unit loses to A's 0.83.
        let mut body = truck_at(25.0, 19.0);
        body.state.fuel_level = 0.1;
        let bid = body
            .evaluate_cfp(&cfp("inc_1", IncidentKind::Fire, Severity::Critical, 25.0, 22.0), 0)
            .expect("bid");
        assert!((bid.cost - 1.0).abs() < 1e-9);
        assert!(bid.cost > 5.0 / 6.0);
    }

    #[test]
    fn no_capability_means_no_bid() {
        let body = truck_at(10.0, 10.0);
        assert!(body
            .evaluate_cfp(&cfp("inc_1", IncidentKind::Medical, Severity::Critical, 0.0, 0.0), 0)
            .is_none());
    }

    #[test]
    fn eta_is_distance_over_speed() {
        let body = truck_at(0.0, 0.0);
        let bid = body
            .evaluate_cfp(&cfp("inc_1", IncidentKind::Fire, Severity::High, 6.0, 8.0), 0)
            .expect("bid");
        assert!((bid.estimated_arrival - 10.0 / 2.0).abs() < 1e-9);
    }

    #[test]
    fn committed_unit_abandons_only_for_critical_two_ranks_up() {
        let policy = PolicyConfig::default();
        // Medium -> Critical: two ranks up, abandon.
        assert!(should_abandon(Severity::Medium, Severity::Critical, &policy));
        // High -> Critical: only one rank up, keep the commitment.
        assert!(!should_abandon(Severity::High, Severity::Critical, &policy));
        // Medium -> High: two ranks but not Critical? High is one rank up; either
        // way a non-critical incident never releases a commitment.
        assert!(!should_abandon(Severity::Low, Severity::High, &policy));
    }

    #[test]
    fn engaged_on_medium_bids_on_critical_but_not_high() {
        let mut body = truck_at(10.0, 10.0);
        let mut beliefs = BeliefStore::new();
        body.on_accepted(assignment("inc_current", Severity::Medium, 11.0, 10.0), &mut beliefs, 0)
            .expect("commit");

        let critical = cfp("inc_new", IncidentKind::Fire, Severity::Critical, 20.0, 20.0);
        assert!(body.evaluate_cfp(&critical, 0).is_some());

        let high = cfp("inc_other", IncidentKind::Fire, Severity::High, 20.0, 20.0);
        assert!(body.evaluate_cfp(&high, 0).is_none());
    }

    #[test]
    fn accept_binds_commitment_and_beliefs() {
        let mut body = truck_at(10.0, 10.0);
        let mut beliefs = BeliefStore::new();
        body.on_accepted(assignment("inc_1", Severity::High, 30.0, 40.0), &mut beliefs, 5)
            .expect("commit");

        assert_eq!(body.state.status, UnitStatus::EnRoute);
        assert_eq!(body.state.current_incident.as_deref(), Some("inc_1"));
        assert!(beliefs.get("current_mission").is_some());
        assert!(beliefs.get("mission_location").is_some());
    }

    #[test]
    fn conflicting_accept_is_rejected_not_double_committed() {
        let mut body = truck_at(10.0, 10.0);
        let mut beliefs = BeliefStore::new();
        body.on_accepted(assignment("inc_1", Severity::High, 30.0, 40.0), &mut beliefs, 0)
            .expect("commit");

        let err = body
            .on_accepted(assignment("inc_2", Severity::Critical, 0.0, 0.0), &mut beliefs, 1)
            .unwrap_err();
        assert_eq!(err.current_incident, "inc_1");
        assert_eq!(body.state.current_incident.as_deref(), Some("inc_1"));
    }

    #[test]
    fn duplicate_accept_for_the_held_mission_is_a_noop() {
        let mut body = truck_at(30.0, 40.0);
        let mut beliefs = BeliefStore::new();
        body.on_accepted(assignment("inc_1", Severity::High, 30.0, 40.0), &mut beliefs, 0)
            .expect("commit");

        // The unit is already on scene, one work cycle from done.
        body.state.status = UnitStatus::Engaged;
        body.response_cycles_left = 1;

        body.on_accepted(assignment("inc_1", Severity::High, 30.0, 40.0), &mut beliefs, 5)
            .expect("replayed accept is fine");

        assert_eq!(body.state.status, UnitStatus::Engaged);
        assert_eq!(body.response_cycles_left, 1);
    }

    #[test]
    fn qualifying_accept_replaces_the_commitment() {
        let mut body = truck_at(10.0, 10.0);
        let mut beliefs = BeliefStore::new();
        body.on_accepted(assignment("inc_1", Severity::Medium, 30.0, 40.0), &mut beliefs, 0)
            .expect("commit");
        body.on_accepted(assignment("inc_2", Severity::Critical, 0.0, 0.0), &mut beliefs, 1)
            .expect("abandon and recommit");

        assert_eq!(body.state.current_incident.as_deref(), Some("inc_2"));
    }

    #[test]
    fn full_mission_lifecycle_reports_resolution_and_returns_to_idle() {
        let mut responder = Responder::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(0.0, 0.0),
            PolicyConfig::default(),
        );
        responder
            .body
            .on_accepted(assignment("inc_1", Severity::High, 5.0, 0.0), &mut responder.engine.beliefs, 0)
            .expect("commit");

        let mut informs = Vec::new();
        for tick in 0..20 {
            let (_, outbound) = responder.cycle(tick);
            informs.extend(outbound);
            // Invariant: current_incident is bound iff en-route or engaged.
            let state = responder.state();
            match state.status {
                UnitStatus::EnRoute | UnitStatus::Engaged => {
                    assert!(state.current_incident.is_some())
                }
                _ => assert!(state.current_incident.is_none()),
            }
        }

        assert_eq!(informs.len(), 1);
        assert_eq!(informs[0].to, "inc_1");
        assert!(matches!(
            informs[0].envelope.payload,
            Payload::Inform(InformBody {
                status: IncidentStatus::Resolved,
                ..
            })
        ));
        assert_eq!(responder.state().status, UnitStatus::Idle);
        assert!(responder.state().current_incident.is_none());
    }

    #[test]
    fn abandonment_restarts_the_mission_plan_with_travel() {
        let mut responder = Responder::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(0.0, 0.0),
            PolicyConfig::default(),
        );
        let first = Envelope::new(
            "inc_old",
            "inc_old",
            Payload::Accept(assignment("inc_old", Severity::Medium, 0.5, 0.0)),
        );
        responder.handle_message(&first, 0).expect("commit");
        responder.cycle(1);
        assert_eq!(responder.state().status, UnitStatus::Engaged);

        // A qualifying critical assignment far away abandons the mission.
        let second = Envelope::new(
            "inc_new",
            "inc_new",
            Payload::Accept(assignment("inc_new", Severity::Critical, 90.0, 0.0)),
        );
        responder.handle_message(&second, 2).expect("abandon and recommit");
        assert_eq!(responder.state().status, UnitStatus::EnRoute);

        let new_scene = Location::new(90.0, 0.0);
        let mut informs = Vec::new();
        for tick in 3..120 {
            let (_, outbound) = responder.cycle(tick);
            for message in &outbound {
                if matches!(message.envelope.payload, Payload::Inform(_)) {
                    // Resolution is only reported from the new scene.
                    assert!(responder.state().location.distance_to(&new_scene) < 1e-9);
                }
            }
            informs.extend(outbound);
        }

        assert_eq!(informs.len(), 1);
        assert_eq!(informs[0].to, "inc_new");
    }

    #[test]
    fn movement_burns_fuel_proportionally() {
        let mut body = truck_at(0.0, 0.0);
        let before = body.state.fuel_level;
        body.step_toward(Location::new(100.0, 0.0));
        let burned = before - body.state.fuel_level;
        assert!((burned - 2.0 * body.policy.fuel_burn_per_distance).abs() < 1e-9);
    }

    #[test]
    fn idle_unit_with_low_fuel_refuels_at_base() {
        let mut responder = Responder::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(0.0, 0.0),
            PolicyConfig::default(),
        );
        responder.body.state.fuel_level = 0.1;
        responder.body.state.location = Location::new(4.0, 0.0);

        for tick in 0..10 {
            responder.cycle(tick);
        }

        assert_eq!(responder.state().status, UnitStatus::Idle);
        assert!((responder.state().fuel_level - 1.0).abs() < 1e-9);
        assert!((responder.state().location.x - 0.0).abs() < 1e-9);
    }

    #[test]
    fn cfp_message_produces_a_proposal_reply() {
        let mut responder = Responder::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(20.0, 20.0),
            PolicyConfig::default(),
        );
        let envelope = Envelope::new(
            "inc_1",
            "inc_1",
            Payload::Cfp(cfp("inc_1", IncidentKind::Fire, Severity::High, 25.0, 22.0)),
        );

        let replies = responder.handle_message(&envelope, 7).expect("handled");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].to, "inc_1");
        match &replies[0].envelope.payload {
            Payload::Propose(bid) => {
                assert_eq!(bid.bidder_id, "truck_1");
                assert_eq!(bid.submitted_at_ms, 7);
            }
            other => panic!("expected proposal, got {other:?}"),
        }
    }

    #[test]
    fn coalition_request_gets_threshold_based_reply() {
        let mut responder = Responder::new(
            "truck_1",
            UnitKind::FireTruck,
            Location::new(0.0, 0.0),
            PolicyConfig::default(),
        );
        let request = Envelope::new(
            "ambulance_1",
            "coal_1",
            Payload::Request(contracts::messages::CoalitionRequestBody {
                coalition_id: "coal_1".to_string(),
                incident_id: "inc_1".to_string(),
                severity: Severity::High,
            }),
        );

        let replies = responder.handle_message(&request, 0).expect("handled");
        assert!(matches!(replies[0].envelope.payload, Payload::Agree(_)));

        let weak_request = Envelope::new(
            "ambulance_1",
            "coal_2",
            Payload::Request(contracts::messages::CoalitionRequestBody {
                coalition_id: "coal_2".to_string(),
                incident_id: "inc_2".to_string(),
                severity: Severity::Low,
            }),
        );
        let replies = responder.handle_message(&weak_request, 0).expect("handled");
        assert!(matches!(replies[0].envelope.payload, Payload::Refuse(_)));
    }
}
