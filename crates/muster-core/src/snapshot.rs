//! Shared read-only projection of system state.
//!
//! Actors own their state; observers never reach into an actor. Instead
//! each actor publishes its latest public state here after every cycle, and
//! the HTTP surface and CLI reports read the board. The board is eventually
//! consistent: a snapshot reflects each actor's most recent publication,
//! not a globally coordinated instant.

use std::sync::{Arc, Mutex};

use contracts::{IncidentRecord, SystemSnapshot, UnitState};

/// Cheaply cloneable handle; all clones view the same board.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBoard {
    inner: Arc<Mutex<SystemSnapshot>>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_unit(&self, state: UnitState) {
        let mut inner = self.inner.lock().expect("snapshot board lock poisoned");
        inner.units.insert(state.unit_id.clone(), state);
    }

    pub fn publish_incident(&self, record: IncidentRecord) {
        let mut inner = self.inner.lock().expect("snapshot board lock poisoned");
        inner.incidents.insert(record.incident_id.clone(), record);
    }

    pub fn remove_unit(&self, unit_id: &str) {
        let mut inner = self.inner.lock().expect("snapshot board lock poisoned");
        inner.units.remove(unit_id);
    }

    pub fn incident(&self, incident_id: &str) -> Option<IncidentRecord> {
        let inner = self.inner.lock().expect("snapshot board lock poisoned");
        inner.incidents.get(incident_id).cloned()
    }

    pub fn unit(&self, unit_id: &str) -> Option<UnitState> {
        let inner = self.inner.lock().expect("snapshot board lock poisoned");
        inner.units.get(unit_id).cloned()
    }

    /// Full point-in-time copy of the board.
    pub fn snapshot(&self) -> SystemSnapshot {
        self.inner
            .lock()
            .expect("snapshot board lock poisoned")
            .clone()
    }
}
