//! Per-actor belief store.
//!
//! Each actor keeps its own key-value knowledge with confidence, timestamp,
//! and provenance metadata. Stores are never shared across actors: percepts
//! arriving from other actors are copied in, not referenced. Last write per
//! key wins; there is no cross-actor merge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One piece of knowledge an actor holds about the world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Belief {
    pub key: String,
    pub value: Value,
    /// 0.0 = pure guess, 1.0 = certain.
    pub confidence: f64,
    pub timestamp_ms: u64,
    /// Which actor or sensor provided this.
    pub source: String,
}

/// An actor's private knowledge repository, keyed by belief key.
#[derive(Debug, Clone, Default)]
pub struct BeliefStore {
    beliefs: BTreeMap<String, Belief>,
}

impl BeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the belief with the same key.
    pub fn upsert(&mut self, belief: Belief) {
        self.beliefs.insert(belief.key.clone(), belief);
    }

    /// Retrieve a belief; absence is a valid result, not an error.
    pub fn get(&self, key: &str) -> Option<&Belief> {
        self.beliefs.get(key)
    }

    /// Remove an outdated belief, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Belief> {
        self.beliefs.remove(key)
    }

    /// All beliefs matching a predicate, in no guaranteed order.
    pub fn query<P>(&self, predicate: P) -> Vec<&Belief>
    where
        P: Fn(&Belief) -> bool,
    {
        self.beliefs.values().filter(|b| predicate(b)).collect()
    }

    /// Ingest one percept, stamping default confidence 1.0.
    pub fn perceive(
        &mut self,
        key: impl Into<String>,
        value: Value,
        timestamp_ms: u64,
        source: impl Into<String>,
    ) {
        self.perceive_with_confidence(key, value, 1.0, timestamp_ms, source);
    }

    pub fn perceive_with_confidence(
        &mut self,
        key: impl Into<String>,
        value: Value,
        confidence: f64,
        timestamp_ms: u64,
        source: impl Into<String>,
    ) {
        self.upsert(Belief {
            key: key.into(),
            value,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp_ms,
            source: source.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn belief(key: &str, value: Value, confidence: f64) -> Belief {
        Belief {
            key: key.to_string(),
            value,
            confidence,
            timestamp_ms: 100,
            source: "test".to_string(),
        }
    }

    #[test]
    fn upsert_replaces_by_key() {
        let mut store = BeliefStore::new();
        store.upsert(belief("fuel", json!(1.0), 1.0));
        store.upsert(belief("fuel", json!(0.5), 0.8));

        assert_eq!(store.len(), 1);
        let current = store.get("fuel").expect("belief present");
        assert_eq!(current.value, json!(0.5));
        assert!((current.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn absence_is_a_valid_result() {
        let store = BeliefStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn remove_returns_the_old_belief() {
        let mut store = BeliefStore::new();
        store.upsert(belief("mission", json!("inc_0001"), 1.0));

        let removed = store.remove("mission").expect("belief removed");
        assert_eq!(removed.value, json!("inc_0001"));
        assert!(store.is_empty());
    }

    #[test]
    fn query_filters_on_predicate() {
        let mut store = BeliefStore::new();
        store.upsert(belief("incident_a", json!("fire"), 0.9));
        store.upsert(belief("incident_b", json!("flood"), 0.4));
        store.upsert(belief("fuel", json!(0.7), 1.0));

        let incidents = store.query(|b| b.key.starts_with("incident_"));
        assert_eq!(incidents.len(), 2);

        let confident = store.query(|b| b.confidence > 0.5);
        assert_eq!(confident.len(), 2);
    }

    #[test]
    fn perceive_defaults_confidence_to_one() {
        let mut store = BeliefStore::new();
        store.perceive("mission_target", json!({"x": 25.0, "y": 22.0}), 7, "dispatch");

        let b = store.get("mission_target").expect("belief present");
        assert!((b.confidence - 1.0).abs() < 1e-9);
        assert_eq!(b.timestamp_ms, 7);
        assert_eq!(b.source, "dispatch");
    }

    #[test]
    fn perceive_clamps_confidence_into_unit_interval() {
        let mut store = BeliefStore::new();
        store.perceive_with_confidence("a", json!(1), 2.0, 0, "s");
        store.perceive_with_confidence("b", json!(2), -1.0, 0, "s");

        assert!((store.get("a").unwrap().confidence - 1.0).abs() < 1e-9);
        assert!((store.get("b").unwrap().confidence - 0.0).abs() < 1e-9);
    }
}
