//! Negotiation message taxonomy.
//!
//! Messages between actors follow a FIPA-ACL-inspired performative set.
//! Every envelope carries a conversation id (the incident id for auction
//! traffic, the coalition id for support requests) so receivers can
//! correlate at-least-once deliveries without a central broker.

use serde::{Deserialize, Serialize};

use crate::{Bid, IncidentKind, IncidentStatus, Location, ResourceRequirement, Severity};

/// FIPA-ACL inspired performatives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Performative {
    /// Auctioneer broadcasts a call-for-proposals.
    Cfp,
    /// Bidder proposes a bid.
    Propose,
    /// Auctioneer accepts the winning bid.
    Accept,
    /// Auctioneer rejects a losing bid.
    Reject,
    /// Bidder informs the auctioneer of a status change.
    Inform,
    /// Actor solicits coalition support from another actor.
    Request,
    /// Coalition request accepted.
    Agree,
    /// Coalition request refused.
    Refuse,
    /// External cancellation of an incident.
    Cancel,
}

/// Call-for-proposals body: the full demand of one incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CfpBody {
    pub incident_id: String,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub location: Location,
    pub requirements: Vec<ResourceRequirement>,
    pub estimated_impact: u32,
}

/// Accept body: everything a winner needs to commit and navigate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentBody {
    pub incident_id: String,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectBody {
    pub incident_id: String,
}

/// Status report from an assigned unit back to the auctioneer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InformBody {
    pub incident_id: String,
    pub status: IncidentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoalitionRequestBody {
    pub coalition_id: String,
    pub incident_id: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoalitionReplyBody {
    pub coalition_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelBody {
    pub incident_id: String,
}

/// Typed payload; the performative is derivable from the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "performative", rename_all = "snake_case")]
pub enum Payload {
    Cfp(CfpBody),
    Propose(Bid),
    Accept(AssignmentBody),
    Reject(RejectBody),
    Inform(InformBody),
    Request(CoalitionRequestBody),
    Agree(CoalitionReplyBody),
    Refuse(CoalitionReplyBody),
    Cancel(CancelBody),
}

impl Payload {
    pub fn performative(&self) -> Performative {
        match self {
            Self::Cfp(_) => Performative::Cfp,
            Self::Propose(_) => Performative::Propose,
            Self::Accept(_) => Performative::Accept,
            Self::Reject(_) => Performative::Reject,
            Self::Inform(_) => Performative::Inform,
            Self::Request(_) => Performative::Request,
            Self::Agree(_) => Performative::Agree,
            Self::Refuse(_) => Performative::Refuse,
            Self::Cancel(_) => Performative::Cancel,
        }
    }
}

/// One message on the wire: sender, correlation id, typed payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub sender: String,
    /// Incident id for auction traffic, coalition id for support requests.
    pub conversation_id: String,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(
        sender: impl Into<String>,
        conversation_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            sender: sender.into(),
            conversation_id: conversation_id.into(),
            payload,
        }
    }

    pub fn performative(&self) -> Performative {
        self.payload.performative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnitKind;

    #[test]
    fn payload_reports_its_performative() {
        let cfp = Payload::Cfp(CfpBody {
            incident_id: "inc_0001".to_string(),
            kind: IncidentKind::Fire,
            severity: Severity::High,
            location: Location::new(10.0, 10.0),
            requirements: vec![ResourceRequirement {
                kind: UnitKind::FireTruck,
                quantity: 1,
                priority: Severity::High,
            }],
            estimated_impact: 0,
        });
        assert_eq!(cfp.performative(), Performative::Cfp);

        let reject = Payload::Reject(RejectBody {
            incident_id: "inc_0001".to_string(),
        });
        assert_eq!(reject.performative(), Performative::Reject);
    }

    #[test]
    fn envelope_serde_round_trip_keeps_performative_tag() {
        let envelope = Envelope::new(
            "truck_1",
            "inc_0001",
            Payload::Propose(Bid {
                bidder_id: "truck_1".to_string(),
                incident_id: "inc_0001".to_string(),
                cost: 0.83,
                estimated_arrival: 2.5,
                submitted_at_ms: 42,
            }),
        );

        let serialized = serde_json::to_string(&envelope).expect("serialize");
        assert!(serialized.contains("\"performative\":\"propose\""));
        let decoded: Envelope = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(envelope, decoded);
    }
}
