//! Auctioneer: the incident side of the contract net.
//!
//! Each incident is owned by exactly one auctioneer, which broadcasts a
//! call-for-proposals, collects bids inside a bounded window, selects the
//! cheapest bid (ties broken by earliest submission), issues exactly one
//! ACCEPT plus explicit REJECTs, and tracks the incident to resolution.
//! The state machine here is pure and synchronous; the actor task in
//! [`crate::runtime`] supplies the timers and the transport.

use contracts::messages::{AssignmentBody, CancelBody, CfpBody, Payload, RejectBody};
use contracts::{Bid, Envelope, IncidentRecord, IncidentStatus, BROADCAST};
use tracing::{debug, info, warn};

use crate::bus::Outbound;

/// Result of closing one bid-collection window.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// A winner was selected: one ACCEPT, explicit REJECTs for the rest.
    Winner {
        winner_id: String,
        accept: Outbound,
        rejects: Vec<Outbound>,
    },
    /// Zero proposals arrived; the incident stays Reported as unmet demand.
    /// Re-broadcasting is an external policy decision, not scheduled here.
    NoBids,
    /// The window was not open (duplicate close, or terminal incident).
    NotCollecting,
}

/// Negotiation state machine for one incident.
#[derive(Debug, Clone)]
pub struct Auction {
    incident: IncidentRecord,
    bids: Vec<Bid>,
    collecting: bool,
}

impl Auction {
    pub fn new(incident: IncidentRecord) -> Self {
        Self {
            incident,
            bids: Vec::new(),
            collecting: false,
        }
    }

    pub fn incident(&self) -> &IncidentRecord {
        &self.incident
    }

    pub fn incident_id(&self) -> &str {
        &self.incident.incident_id
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.incident.status,
            IncidentStatus::Resolved | IncidentStatus::Cancelled
        )
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Open (or re-open) the collection window and produce the CFP
    /// broadcast. Idempotent: a duplicate CFP for an incident that is
    /// already in progress or terminal is a no-op and returns `None`.
    pub fn broadcast_cfp(&mut self) -> Option<Outbound> {
        match self.incident.status {
            IncidentStatus::Reported | IncidentStatus::Confirmed => {}
            _ => {
                debug!(
                    incident = %self.incident.incident_id,
                    status = ?self.incident.status,
                    "duplicate CFP ignored"
                );
                return None;
            }
        }

        self.collecting = true;
        info!(
            incident = %self.incident.incident_id,
            kind = %self.incident.kind,
            severity = %self.incident.severity,
            "broadcasting call for proposals"
        );

        Some(Outbound::new(
            BROADCAST,
            Envelope::new(
                self.incident.incident_id.clone(),
                self.incident.incident_id.clone(),
                Payload::Cfp(CfpBody {
                    incident_id: self.incident.incident_id.clone(),
                    kind: self.incident.kind,
                    severity: self.incident.severity,
                    location: self.incident.location,
                    requirements: self.incident.requirements.clone(),
                    estimated_impact: self.incident.estimated_impact,
                }),
            ),
        ))
    }

    /// Append a bid while the window is open. Late or mismatched bids are
    /// silently dropped (not an error); duplicate bids from the same bidder
    /// keep the first arrival, which at-least-once delivery can produce.
    pub fn receive_bid(&mut self, bid: Bid) -> bool {
        if !self.collecting || bid.incident_id != self.incident.incident_id {
            debug!(
                incident = %self.incident.incident_id,
                bidder = %bid.bidder_id,
                "late or mismatched bid dropped"
            );
            return false;
        }
        if self.bids.iter().any(|b| b.bidder_id == bid.bidder_id) {
            return false;
        }
        debug!(
            incident = %self.incident.incident_id,
            bidder = %bid.bidder_id,
            cost = bid.cost,
            "bid received"
        );
        self.bids.push(bid);
        true
    }

    /// Close the window and select a winner: argmin over cost, ties broken
    /// by earliest submission timestamp, then bidder id for determinism.
    /// Exactly one ACCEPT is issued per auction round.
    pub fn close_window(&mut self) -> RoundOutcome {
        if !self.collecting {
            return RoundOutcome::NotCollecting;
        }
        self.collecting = false;

        let bids = std::mem::take(&mut self.bids);
        if bids.is_empty() {
            warn!(
                incident = %self.incident.incident_id,
                "no bids at window close; demand unmet, incident stays reported"
            );
            return RoundOutcome::NoBids;
        }

        let winner = bids
            .iter()
            .min_by(|a, b| {
                a.cost
                    .total_cmp(&b.cost)
                    .then(a.submitted_at_ms.cmp(&b.submitted_at_ms))
                    .then_with(|| a.bidder_id.cmp(&b.bidder_id))
            })
            .cloned()
            .expect("non-empty bid list has a minimum");

        self.incident.status = IncidentStatus::InProgress;
        self.incident.assigned_units.push(winner.bidder_id.clone());
        info!(
            incident = %self.incident.incident_id,
            winner = %winner.bidder_id,
            cost = winner.cost,
            "bid accepted"
        );

        let accept = Outbound::new(
            winner.bidder_id.clone(),
            Envelope::new(
                self.incident.incident_id.clone(),
                self.incident.incident_id.clone(),
                Payload::Accept(AssignmentBody {
                    incident_id: self.incident.incident_id.clone(),
                    kind: self.incident.kind,
                    severity: self.incident.severity,
                    location: self.incident.location,
                }),
            ),
        );

        let rejects = bids
            .iter()
            .filter(|b| b.bidder_id != winner.bidder_id)
            .map(|b| {
                Outbound::new(
                    b.bidder_id.clone(),
                    Envelope::new(
                        self.incident.incident_id.clone(),
                        self.incident.incident_id.clone(),
                        Payload::Reject(RejectBody {
                            incident_id: self.incident.incident_id.clone(),
                        }),
                    ),
                )
            })
            .collect();

        RoundOutcome::Winner {
            winner_id: winner.bidder_id,
            accept,
            rejects,
        }
    }

    /// Record an inform-completion report from an assigned unit. Reports
    /// from unassigned senders or on non-running incidents are dropped.
    pub fn record_resolution(&mut self, sender: &str) -> bool {
        if self.incident.status != IncidentStatus::InProgress {
            return false;
        }
        if !self.incident.assigned_units.iter().any(|u| u == sender) {
            warn!(
                incident = %self.incident.incident_id,
                sender,
                "resolution report from unassigned unit dropped"
            );
            return false;
        }
        self.incident.status = IncidentStatus::Resolved;
        info!(incident = %self.incident.incident_id, by = sender, "incident resolved");
        true
    }

    /// External cancellation. Resolved incidents stay resolved.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.collecting = false;
        self.incident.status = IncidentStatus::Cancelled;
        info!(incident = %self.incident.incident_id, "incident cancelled");
        true
    }

    /// Cancellation notice for assigned units, if any.
    pub fn cancellation_notices(&self) -> Vec<Outbound> {
        self.incident
            .assigned_units
            .iter()
            .map(|unit| {
                Outbound::new(
                    unit.clone(),
                    Envelope::new(
                        self.incident.incident_id.clone(),
                        self.incident.incident_id.clone(),
                        Payload::Cancel(CancelBody {
                            incident_id: self.incident.incident_id.clone(),
                        }),
                    ),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
