//! Belief-desire-intention reasoning loop.
//!
//! The cycle is: perceive → deliberate → means-end reasoning → filter → act.
//! Deliberation and planning are actor-specific and plugged in through the
//! [`Reasoner`] trait; the engine owns the generic bookkeeping. A cycle is
//! atomic with respect to the actor's own state: there is no suspension
//! point inside it and no cross-actor locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::belief::BeliefStore;

// ---------------------------------------------------------------------------
// Desires and intentions
// ---------------------------------------------------------------------------

/// A goal the actor currently wants to achieve. Ephemeral: the desire set is
/// regenerated from beliefs on every cycle and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Desire {
    pub goal_id: String,
    pub description: String,
    /// 0.0 = negligible, 1.0 = urgent.
    pub priority: f64,
    /// What needs to become true for the desire to be satisfied.
    pub conditions: BTreeMap<String, Value>,
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentionStatus {
    Active,
    Completed,
    Failed,
    Suspended,
}

/// A committed plan for one desire: an ordered action-name sequence plus a
/// cursor. Dropped from the active set as soon as it leaves `Active`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intention {
    pub intention_id: String,
    pub desire: Desire,
    pub plan: Vec<String>,
    pub current_step: usize,
    pub status: IntentionStatus,
}

impl Intention {
    pub fn current_action(&self) -> Option<&str> {
        self.plan.get(self.current_step).map(String::as_str)
    }
}

/// Result of executing one plan step. Steps that span multiple cycles
/// (movement, working an incident) return `InProgress` and the cursor does
/// not advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    InProgress,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Percepts
// ---------------------------------------------------------------------------

/// An external observation queued for the next perceive phase. Confidence
/// defaults to 1.0 when the source does not supply one.
#[derive(Debug, Clone, PartialEq)]
pub struct Percept {
    pub key: String,
    pub value: Value,
    pub confidence: Option<f64>,
    pub source: String,
}

impl Percept {
    pub fn new(key: impl Into<String>, value: Value, source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            confidence: None,
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reasoner seam
// ---------------------------------------------------------------------------

/// Actor-specific deliberation, planning, and step execution.
///
/// Concrete unit variants (fire truck, ambulance, scout) implement this;
/// dispatch is by value, not inheritance. `deliberate` must be deterministic
/// given the same belief snapshot so reasoning is testable.
pub trait Reasoner {
    fn deliberate(&self, beliefs: &BeliefStore) -> Vec<Desire>;

    /// Generate an ordered action-name sequence for a desire; `None` means
    /// planning failed and the desire is dropped for this cycle.
    fn generate_plan(&self, desire: &Desire) -> Option<Vec<String>>;

    fn execute_step(&mut self, beliefs: &mut BeliefStore, action: &str) -> StepOutcome;
}

// ---------------------------------------------------------------------------
// Cycle engine
// ---------------------------------------------------------------------------

/// What one reasoning cycle did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    pub executed_action: Option<String>,
    pub step_outcome: Option<StepOutcome>,
    /// Desires whose planning failed this cycle.
    pub dropped_desires: Vec<String>,
}

/// Generic BDI cycle state for one actor.
#[derive(Debug, Default)]
pub struct BdiEngine {
    pub beliefs: BeliefStore,
    desires: Vec<Desire>,
    intentions: Vec<Intention>,
    pending_percepts: Vec<Percept>,
    intention_seq: u64,
}

impl BdiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a percept for the next cycle's perceive phase.
    pub fn queue_percept(&mut self, percept: Percept) {
        self.pending_percepts.push(percept);
    }

    /// The single retained intention, if any.
    pub fn committed_intention(&self) -> Option<&Intention> {
        self.intentions
            .iter()
            .find(|i| i.status == IntentionStatus::Active)
    }

    pub fn active_intention_count(&self) -> usize {
        self.intentions
            .iter()
            .filter(|i| i.status == IntentionStatus::Active)
            .count()
    }

    /// Drop any intention for `goal_id`. The next cycle re-plans the goal
    /// from its first step; callers use this when the commitment behind a
    /// goal is replaced and the old plan cursor no longer applies.
    pub fn drop_goal(&mut self, goal_id: &str) {
        self.intentions.retain(|i| i.desire.goal_id != goal_id);
    }

    /// Run one atomic reasoning cycle.
    pub fn cycle<R: Reasoner>(&mut self, reasoner: &mut R, now_ms: u64) -> CycleReport {
        let mut report = CycleReport::default();

        // 1. Perceive: ingest queued percepts into the belief store.
        for percept in self.pending_percepts.drain(..) {
            self.beliefs.perceive_with_confidence(
                percept.key,
                percept.value,
                percept.confidence.unwrap_or(1.0),
                now_ms,
                percept.source,
            );
        }

        // 2. Deliberate: the desire set is replaced, not accumulated.
        self.desires = reasoner.deliberate(&self.beliefs);

        // 3. Means-end reasoning: plan every desire not already backed by an
        //    active intention with the same goal id.
        for desire in &self.desires {
            let already_intended = self.intentions.iter().any(|i| {
                i.status == IntentionStatus::Active && i.desire.goal_id == desire.goal_id
            });
            if already_intended {
                continue;
            }

            match reasoner.generate_plan(desire) {
                Some(plan) if !plan.is_empty() => {
                    self.intention_seq += 1;
                    self.intentions.push(Intention {
                        intention_id: format!("int_{}_{}", desire.goal_id, self.intention_seq),
                        desire: desire.clone(),
                        plan,
                        current_step: 0,
                        status: IntentionStatus::Active,
                    });
                }
                _ => report.dropped_desires.push(desire.goal_id.clone()),
            }
        }

        // 4. Filter: single commitment. Keep only active intentions, stable
        //    sort by priority descending (ties: first generated wins), then
        //    retain exactly one.
        self.intentions.retain(|i| i.status == IntentionStatus::Active);
        self.intentions
            .sort_by(|a, b| b.desire.priority.total_cmp(&a.desire.priority));
        self.intentions.truncate(1);

        // 5. Act: execute the next step of the sole retained intention.
        if let Some(intention) = self.intentions.first_mut() {
            if let Some(action) = intention.plan.get(intention.current_step).cloned() {
                let outcome = reasoner.execute_step(&mut self.beliefs, &action);
                report.executed_action = Some(action);
                report.step_outcome = Some(outcome);

                match outcome {
                    StepOutcome::Completed => {
                        intention.current_step += 1;
                        if intention.current_step >= intention.plan.len() {
                            intention.status = IntentionStatus::Completed;
                        }
                    }
                    StepOutcome::Failed => intention.status = IntentionStatus::Failed,
                    StepOutcome::InProgress => {}
                }
            } else {
                intention.status = IntentionStatus::Completed;
            }
        }

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
