//! Decentralized task-allocation engine for emergency response fleets.
//!
//! Autonomous units reason over a belief/desire/intention cycle and
//! coordinate assignments through contract-net auctions: an incident's
//! auctioneer broadcasts a call-for-proposals, capable units bid their
//! marginal cost, and the cheapest bid wins the single assignment. There
//! is no central allocator; every allocation decision emerges from the
//! message exchange.

pub mod auction;
pub mod bdi;
pub mod belief;
pub mod bus;
pub mod coalition;
pub mod oracle;
pub mod responder;
pub mod runtime;
pub mod scout;
pub mod snapshot;

pub use auction::{Auction, RoundOutcome};
pub use bdi::{BdiEngine, CycleReport, Desire, Intention, IntentionStatus, Percept, Reasoner, StepOutcome};
pub use belief::{Belief, BeliefStore};
pub use bus::{MessageBus, Outbound, TransportError};
pub use coalition::CoalitionDecision;
pub use oracle::{
    HeuristicOracle, IncidentDraft, InterpretationOracle, OracleError, SensorReading,
};
pub use responder::{CommitmentConflict, Responder, ResponderBody};
pub use runtime::{now_ms, Runtime, OPERATOR_ID};
pub use scout::{Scout, ScoutBody, ScoutRng, SensorField};
pub use snapshot::SnapshotBoard;
