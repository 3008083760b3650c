//! Actor runtime: tokio tasks, mailboxes, and lifecycle.
//!
//! Every autonomous party is one tokio task owning its state outright and
//! coordinating only through bus messages. Responders and scouts are
//! long-lived and tick on their own cadence; an auctioneer task is spawned
//! per incident, runs the negotiation for it, and exits when the incident
//! reaches a terminal status. A watch channel fans shutdown out to all
//! tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::messages::{CancelBody, CfpBody, Payload};
use contracts::{
    EngineConfig, Envelope, IncidentRecord, IncidentStatus, Location, UnitKind, UnitSpawn,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auction::{Auction, RoundOutcome};
use crate::bus::{MessageBus, TransportError};
use crate::oracle::{HeuristicOracle, IncidentDraft, InterpretationOracle, OracleError};
use crate::responder::Responder;
use crate::scout::{Scout, ScoutBody, SensorField};
use crate::snapshot::SnapshotBoard;

/// Sender id used for operator-originated messages (cancellations).
pub const OPERATOR_ID: &str = "operator";

/// Hotspots seeded into each scout's patrol sector in demo runs.
const HOTSPOTS_PER_SCOUT: usize = 4;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared handle to a running engine. Cloning is cheap; every clone talks
/// to the same bus, board, and incident counter.
#[derive(Clone)]
pub struct Runtime {
    config: Arc<EngineConfig>,
    bus: MessageBus,
    board: SnapshotBoard,
    oracle: Arc<dyn InterpretationOracle + Send + Sync>,
    incident_seq: Arc<AtomicU64>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Runtime {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_oracle(config, Arc::new(HeuristicOracle::new()))
    }

    pub fn with_oracle(
        config: EngineConfig,
        oracle: Arc<dyn InterpretationOracle + Send + Sync>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            bus: MessageBus::new(),
            board: SnapshotBoard::new(),
            oracle,
            incident_seq: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn board(&self) -> &SnapshotBoard {
        &self.board
    }

    /// Signal every task to wind down.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn next_incident_id(&self) -> String {
        let seq = self.incident_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("inc_{seq:04}")
    }

    // -----------------------------------------------------------------------
    // Incident intake
    // -----------------------------------------------------------------------

    /// Register an interpreted incident and start its negotiation. The
    /// returned record carries the freshly minted incident id.
    pub fn submit(&self, draft: IncidentDraft) -> IncidentRecord {
        let record = IncidentRecord {
            incident_id: self.next_incident_id(),
            kind: draft.kind,
            severity: draft.severity,
            location: self.config.map_bounds.clamp(draft.location),
            status: draft.status,
            reported_at_ms: now_ms(),
            requirements: draft.requirements,
            estimated_impact: draft.estimated_impact,
            description: draft.description,
            assigned_units: Vec::new(),
        };
        info!(
            incident = %record.incident_id,
            kind = ?record.kind,
            severity = ?record.severity,
            "incident submitted"
        );
        self.board.publish_incident(record.clone());
        self.spawn_auctioneer(record.clone());
        record
    }

    /// Interpret a free-text report and submit the resulting incident.
    /// `Ok(None)` means the report did not clear the oracle's threshold.
    pub fn submit_report(
        &self,
        text: &str,
        location: Location,
    ) -> Result<Option<IncidentRecord>, OracleError> {
        let draft = self.oracle.interpret_report(text, location)?;
        Ok(draft.map(|draft| self.submit(draft)))
    }

    /// Ask the auctioneer for `incident_id` to cancel its incident.
    pub fn cancel_incident(&self, incident_id: &str) -> Result<(), TransportError> {
        self.bus.send(
            incident_id,
            Envelope::new(
                OPERATOR_ID,
                incident_id,
                Payload::Cancel(CancelBody {
                    incident_id: incident_id.to_string(),
                }),
            ),
        )
    }

    /// Ask the auctioneer for a parked (no-bid) incident to run a fresh
    /// call-for-proposals round.
    pub fn rebroadcast_incident(&self, incident_id: &str) -> Result<(), TransportError> {
        let record = self
            .board
            .incident(incident_id)
            .ok_or_else(|| TransportError::UnknownReceiver(incident_id.to_string()))?;
        self.bus.send(
            incident_id,
            Envelope::new(
                OPERATOR_ID,
                incident_id,
                Payload::Cfp(CfpBody {
                    incident_id: record.incident_id.clone(),
                    kind: record.kind,
                    severity: record.severity,
                    location: record.location,
                    requirements: record.requirements.clone(),
                    estimated_impact: record.estimated_impact,
                }),
            ),
        )
    }

    // -----------------------------------------------------------------------
    // Actor spawning
    // -----------------------------------------------------------------------

    /// Spawn the configured fleet. Scouts get sensor fields derived from
    /// `seed` so a demo run is reproducible end to end.
    pub fn spawn_fleet(&self, seed: u64) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let mut scout_index = 0u64;
        for spawn in self.config.fleet.clone() {
            match spawn.kind {
                UnitKind::FireTruck | UnitKind::Ambulance => {
                    handles.push(self.spawn_responder(&spawn));
                }
                UnitKind::Scout => {
                    let scout_seed = seed.wrapping_add(scout_index.wrapping_mul(0x9e37));
                    let field = SensorField::generate(
                        scout_seed,
                        self.config.map_bounds,
                        HOTSPOTS_PER_SCOUT,
                    );
                    handles.push(self.spawn_scout(&spawn, scout_seed, field));
                    scout_index += 1;
                }
            }
        }
        handles
    }

    pub fn spawn_responder(&self, spawn: &UnitSpawn) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let board = self.board.clone();
        let mut shutdown = self.shutdown.subscribe();
        let cycle_period = Duration::from_millis(self.config.cycle_period_ms);
        let mut mailbox = bus.register(spawn.unit_id.clone());
        let mut responder = Responder::new(
            spawn.unit_id.clone(),
            spawn.kind,
            spawn.base,
            self.config.policy.clone(),
        );
        let unit_id = spawn.unit_id.clone();

        tokio::spawn(async move {
            board.publish_unit(responder.state().clone());
            let mut ticker = time::interval(cycle_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let (_report, outbound) = responder.cycle(now_ms());
                        for message in outbound {
                            if let Err(err) = bus.dispatch(message) {
                                warn!(unit = %unit_id, error = %err, "outbound message undeliverable");
                            }
                        }
                        board.publish_unit(responder.state().clone());
                    }
                    maybe = mailbox.recv() => match maybe {
                        Some(envelope) => {
                            match responder.handle_message(&envelope, now_ms()) {
                                Ok(replies) => {
                                    for message in replies {
                                        if let Err(err) = bus.dispatch(message) {
                                            warn!(unit = %unit_id, error = %err, "reply undeliverable");
                                        }
                                    }
                                }
                                Err(conflict) => {
                                    warn!(unit = %unit_id, error = %conflict, "refused conflicting assignment");
                                }
                            }
                            board.publish_unit(responder.state().clone());
                        }
                        None => break,
                    }
                }
            }
            bus.unregister(&unit_id);
            debug!(unit = %unit_id, "responder stopped");
        })
    }

    pub fn spawn_scout(&self, spawn: &UnitSpawn, seed: u64, field: SensorField) -> JoinHandle<()> {
        let runtime = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        let scout_period = Duration::from_millis(self.config.scout_period_ms);
        let mut mailbox = self.bus.register(spawn.unit_id.clone());
        let mut scout = Scout::new(ScoutBody::new(
            spawn.unit_id.clone(),
            spawn.base,
            self.config.map_bounds,
            self.config.policy.clone(),
            seed,
            field,
            Arc::clone(&self.oracle),
        ));
        let unit_id = spawn.unit_id.clone();

        tokio::spawn(async move {
            runtime.board.publish_unit(scout.state().clone());
            let mut ticker = time::interval(scout_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let (_report, detections) = scout.cycle(now_ms());
                        for draft in detections {
                            let record = runtime.submit(draft);
                            info!(unit = %unit_id, incident = %record.incident_id, "scout-confirmed incident submitted");
                        }
                        runtime.board.publish_unit(scout.state().clone());
                    }
                    // Scouts receive broadcasts but take no part in auctions.
                    maybe = mailbox.recv() => match maybe {
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            runtime.bus.unregister(&unit_id);
            debug!(unit = %unit_id, "scout stopped");
        })
    }

    fn spawn_auctioneer(&self, record: IncidentRecord) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let board = self.board.clone();
        let mut shutdown = self.shutdown.subscribe();
        let bid_window = Duration::from_millis(self.config.bid_window_ms);
        let liveness_timeout = Duration::from_millis(self.config.liveness_timeout_ms);
        let mut mailbox = bus.register(record.incident_id.clone());
        let mut auction = Auction::new(record);

        tokio::spawn(async move {
            let incident_id = auction.incident_id().to_string();

            // Negotiation rounds: broadcast, collect, close. A no-bid round
            // parks the incident but keeps the auctioneer reachable, so the
            // operator can still cancel or request a fresh round.
            'rounds: loop {
                if let Some(cfp) = auction.broadcast_cfp() {
                    if let Err(err) = bus.dispatch(cfp) {
                        warn!(incident = %incident_id, error = %err, "call-for-proposals undeliverable");
                    }
                }
                board.publish_incident(auction.incident().clone());

                // Collect proposals until the window closes.
                let deadline = Instant::now() + bid_window;
                loop {
                    tokio::select! {
                        _ = time::sleep_until(deadline) => break,
                        _ = shutdown.changed() => {
                            bus.unregister(&incident_id);
                            return;
                        }
                        maybe = mailbox.recv() => match maybe {
                            Some(envelope) => match envelope.payload {
                                Payload::Propose(bid) => {
                                    auction.receive_bid(bid);
                                }
                                Payload::Cancel(_) => {
                                    if auction.cancel() {
                                        board.publish_incident(auction.incident().clone());
                                    }
                                    bus.unregister(&incident_id);
                                    return;
                                }
                                other => {
                                    debug!(incident = %incident_id, performative = ?other.performative(), "ignored during bid collection");
                                }
                            },
                            None => return,
                        }
                    }
                }

                match auction.close_window() {
                    RoundOutcome::Winner {
                        winner_id,
                        accept,
                        rejects,
                    } => {
                        info!(incident = %incident_id, winner = %winner_id, "assignment awarded");
                        if let Err(err) = bus.dispatch(accept) {
                            warn!(incident = %incident_id, winner = %winner_id, error = %err, "accept undeliverable");
                        }
                        for reject in rejects {
                            let _ = bus.dispatch(reject);
                        }
                        board.publish_incident(auction.incident().clone());
                        break 'rounds;
                    }
                    RoundOutcome::NoBids => {
                        warn!(incident = %incident_id, "no proposals received; incident parked awaiting re-broadcast or cancel");
                        board.publish_incident(auction.incident().clone());

                        // Parked: wait for an operator decision.
                        loop {
                            tokio::select! {
                                _ = shutdown.changed() => {
                                    bus.unregister(&incident_id);
                                    return;
                                }
                                maybe = mailbox.recv() => match maybe {
                                    Some(envelope) => match envelope.payload {
                                        Payload::Cfp(_) => continue 'rounds,
                                        Payload::Cancel(_) => {
                                            if auction.cancel() {
                                                board.publish_incident(auction.incident().clone());
                                            }
                                            bus.unregister(&incident_id);
                                            return;
                                        }
                                        other => {
                                            debug!(incident = %incident_id, performative = ?other.performative(), "ignored while parked");
                                        }
                                    },
                                    None => {
                                        bus.unregister(&incident_id);
                                        return;
                                    }
                                }
                            }
                        }
                    }
                    RoundOutcome::NotCollecting => break 'rounds,
                }
            }

            // Await resolution, with a liveness backstop.
            while !auction.is_terminal() && auction.incident().status == IncidentStatus::InProgress
            {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = time::sleep(liveness_timeout) => {
                        warn!(incident = %incident_id, "no progress from assigned unit within liveness window");
                        break;
                    }
                    maybe = mailbox.recv() => match maybe {
                        Some(envelope) => match envelope.payload {
                            Payload::Inform(body) if body.status == IncidentStatus::Resolved => {
                                if auction.record_resolution(&envelope.sender) {
                                    info!(incident = %incident_id, by = %envelope.sender, "incident resolved");
                                    board.publish_incident(auction.incident().clone());
                                }
                            }
                            Payload::Cancel(_) => {
                                if auction.cancel() {
                                    for notice in auction.cancellation_notices() {
                                        let _ = bus.dispatch(notice);
                                    }
                                    board.publish_incident(auction.incident().clone());
                                }
                            }
                            // Proposals after the window closes are dropped.
                            Payload::Propose(bid) => {
                                debug!(incident = %incident_id, bidder = %bid.bidder_id, "late proposal dropped");
                            }
                            _ => {}
                        },
                        None => break,
                    }
                }
            }

            bus.unregister(&incident_id);
            debug!(incident = %incident_id, "auctioneer finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SensorReading;
    use crate::scout::Hotspot;
    use contracts::{IncidentKind, Location, Severity};

    fn draft(kind: IncidentKind, severity: Severity) -> IncidentDraft {
        IncidentDraft {
            kind,
            severity,
            location: Location::new(40.0, 40.0),
            status: IncidentStatus::Reported,
            requirements: Vec::new(),
            estimated_impact: 0,
            description: None,
        }
    }

    #[tokio::test]
    async fn submitted_incidents_get_sequential_ids() {
        let runtime = Runtime::new(EngineConfig::default());
        let first = runtime.submit(draft(IncidentKind::Fire, Severity::High));
        let second = runtime.submit(draft(IncidentKind::Medical, Severity::Medium));

        assert_eq!(first.incident_id, "inc_0001");
        assert_eq!(second.incident_id, "inc_0002");
        runtime.shutdown();
    }

    #[tokio::test]
    async fn submission_publishes_to_the_board() {
        let runtime = Runtime::new(EngineConfig::default());
        let record = runtime.submit(draft(IncidentKind::Fire, Severity::Critical));

        let stored = runtime
            .board()
            .incident(&record.incident_id)
            .expect("incident on board");
        assert_eq!(stored.severity, Severity::Critical);
        runtime.shutdown();
    }

    #[tokio::test]
    async fn submitted_locations_are_clamped_to_the_map() {
        let runtime = Runtime::new(EngineConfig::default());
        let mut out_of_bounds = draft(IncidentKind::Flood, Severity::Low);
        out_of_bounds.location = Location::new(-10.0, 500.0);

        let record = runtime.submit(out_of_bounds);
        assert!((record.location.x - 0.0).abs() < 1e-12);
        assert!((record.location.y - 100.0).abs() < 1e-12);
        runtime.shutdown();
    }

    #[tokio::test]
    async fn free_text_report_becomes_an_incident() {
        let runtime = Runtime::new(EngineConfig::default());
        let record = runtime
            .submit_report("fire with smoke near the depot", Location::new(10.0, 10.0))
            .expect("oracle ok")
            .expect("incident created");

        assert_eq!(record.kind, IncidentKind::Fire);
        assert!(runtime.board().incident(&record.incident_id).is_some());
        runtime.shutdown();
    }

    /// Classifies every detection as hazmat, which the bundled heuristic
    /// oracle never does for a heat signature.
    struct HazmatSensorOracle;

    impl InterpretationOracle for HazmatSensorOracle {
        fn interpret_report(
            &self,
            _text: &str,
            location: Location,
        ) -> Result<Option<IncidentDraft>, OracleError> {
            Ok(Some(IncidentDraft {
                kind: IncidentKind::Hazmat,
                severity: Severity::High,
                location,
                status: IncidentStatus::Reported,
                requirements: Vec::new(),
                estimated_impact: 0,
                description: None,
            }))
        }

        fn interpret_sensor(
            &self,
            reading: &SensorReading,
        ) -> Result<Option<IncidentDraft>, OracleError> {
            if !reading.heat_detected && !reading.structural_anomaly {
                return Ok(None);
            }
            Ok(Some(IncidentDraft {
                kind: IncidentKind::Hazmat,
                severity: Severity::High,
                location: Location::new(reading.x, reading.y),
                status: IncidentStatus::Confirmed,
                requirements: Vec::new(),
                estimated_impact: 0,
                description: None,
            }))
        }
    }

    #[tokio::test]
    async fn injected_oracle_drives_scout_interpretation() {
        let mut config = EngineConfig::default();
        config.scout_period_ms = 20;
        let runtime = Runtime::with_oracle(config, Arc::new(HazmatSensorOracle));

        let spawn = UnitSpawn {
            unit_id: "scout_1".to_string(),
            kind: UnitKind::Scout,
            base: Location::new(50.0, 50.0),
        };
        let field = SensorField::new(vec![Hotspot::fire(
            Location::new(52.0, 50.0),
            230.0,
            Severity::High,
        )]);
        runtime.spawn_scout(&spawn, 7, field);

        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            let snapshot = runtime.board().snapshot();
            if snapshot
                .incidents
                .values()
                .any(|r| r.kind == IncidentKind::Hazmat)
            {
                break;
            }
            if Instant::now() >= deadline {
                panic!("scout never surfaced an incident through the injected oracle");
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        runtime.shutdown();
    }

    #[tokio::test]
    async fn cancelling_an_unknown_incident_is_an_error() {
        let runtime = Runtime::new(EngineConfig::default());
        let err = runtime.cancel_incident("inc_9999").unwrap_err();
        assert!(matches!(err, TransportError::UnknownReceiver(_)));
        runtime.shutdown();
    }
}
