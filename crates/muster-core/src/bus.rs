//! In-memory message transport.
//!
//! Actors are addressed by stable string ids and coordinate only through
//! explicit messages: point-to-point sends and broadcast fan-out. Delivery
//! is at-least-once with per-conversation correlation carried in the
//! envelope; there is no exactly-once machinery and no sender
//! authentication. A real deployment would put a network transport behind
//! the same surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::Envelope;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no actor registered under id {0}")]
    UnknownReceiver(String),
    #[error("mailbox for actor {0} is closed")]
    MailboxClosed(String),
}

/// A message addressed to one actor (or to `contracts::BROADCAST`).
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: String,
    pub envelope: Envelope,
}

impl Outbound {
    pub fn new(to: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            to: to.into(),
            envelope,
        }
    }
}

/// Shared registry of actor mailboxes.
///
/// Cloning is cheap; all clones deliver into the same set of mailboxes.
#[derive(Debug, Clone, Default)]
pub struct MessageBus {
    inner: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor and hand back its mailbox receiver. Registering an
    /// id twice replaces the previous mailbox.
    pub fn register(&self, actor_id: impl Into<String>) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("bus registry lock poisoned");
        inner.insert(actor_id.into(), tx);
        rx
    }

    pub fn unregister(&self, actor_id: &str) {
        let mut inner = self.inner.lock().expect("bus registry lock poisoned");
        inner.remove(actor_id);
    }

    /// Point-to-point delivery.
    pub fn send(&self, to: &str, envelope: Envelope) -> Result<(), TransportError> {
        let inner = self.inner.lock().expect("bus registry lock poisoned");
        let tx = inner
            .get(to)
            .ok_or_else(|| TransportError::UnknownReceiver(to.to_string()))?;
        tx.send(envelope)
            .map_err(|_| TransportError::MailboxClosed(to.to_string()))
    }

    /// Deliver to every registered actor except the sender. Closed
    /// mailboxes are skipped; broadcast is best-effort by design.
    pub fn broadcast(&self, envelope: Envelope) {
        let inner = self.inner.lock().expect("bus registry lock poisoned");
        for (actor_id, tx) in inner.iter() {
            if *actor_id == envelope.sender {
                continue;
            }
            let _ = tx.send(envelope.clone());
        }
    }

    /// Route one outbound message, broadcasting when addressed to
    /// `contracts::BROADCAST`.
    pub fn dispatch(&self, outbound: Outbound) -> Result<(), TransportError> {
        if outbound.to == contracts::BROADCAST {
            self.broadcast(outbound.envelope);
            Ok(())
        } else {
            self.send(&outbound.to, outbound.envelope)
        }
    }

    pub fn registered_count(&self) -> usize {
        self.inner.lock().expect("bus registry lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::messages::{Payload, RejectBody};

    fn reject_envelope(sender: &str, incident_id: &str) -> Envelope {
        Envelope::new(
            sender,
            incident_id,
            Payload::Reject(RejectBody {
                incident_id: incident_id.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn point_to_point_delivery_reaches_only_the_receiver() {
        let bus = MessageBus::new();
        let mut rx_a = bus.register("a");
        let mut rx_b = bus.register("b");

        bus.send("a", reject_envelope("inc_0001", "inc_0001"))
            .expect("send ok");

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let bus = MessageBus::new();
        let mut rx_auctioneer = bus.register("inc_0001");
        let mut rx_truck = bus.register("truck_1");
        let mut rx_ambulance = bus.register("ambulance_1");

        bus.broadcast(reject_envelope("inc_0001", "inc_0001"));

        assert!(rx_truck.recv().await.is_some());
        assert!(rx_ambulance.recv().await.is_some());
        assert!(rx_auctioneer.try_recv().is_err());
    }

    #[test]
    fn unknown_receiver_is_an_error() {
        let bus = MessageBus::new();
        let err = bus
            .send("ghost", reject_envelope("inc_0001", "inc_0001"))
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownReceiver(_)));
    }

    #[tokio::test]
    async fn dispatch_routes_broadcast_address() {
        let bus = MessageBus::new();
        let mut rx = bus.register("truck_1");

        bus.dispatch(Outbound::new(
            contracts::BROADCAST,
            reject_envelope("inc_0001", "inc_0001"),
        ))
        .expect("dispatch ok");

        assert!(rx.recv().await.is_some());
    }
}
