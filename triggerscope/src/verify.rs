//! Invocation classification and the final verdict.
//!
//! The verifier owns all per-trigger state: the parsed condition, the seen
//! set used for deduplication, and the event pool. Every consumed
//! invocation is classified into the outcome taxonomy (success, hard
//! failure, tolerated duplicate, tolerated missing); classification never
//! stops the run, only setup and decode failures do.

use std::collections::{BTreeMap, BTreeSet};

use crate::condition::{Condition, Params};
use crate::error::SetupError;
use crate::pool::{EventPool, ProducedEvent};
use crate::sensor::Sensor;

/// An observed firing of a trigger by the system under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Name of the trigger that fired.
    pub trigger: String,
    /// Dependency name → literal value pairs the firing was built from.
    pub values: BTreeMap<String, String>,
}

/// Running outcome counts, mutated only by the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Invocations that were justified and correctly shaped.
    pub successes: usize,
    /// Hard failures counting toward the verdict.
    pub failures: usize,
    /// Duplicate invocations tolerated under at-least-once semantics.
    pub tolerated_duplicates: usize,
    /// Missing invocations tolerated under at-most-once semantics.
    pub tolerated_missing: usize,
}

impl Tally {
    fn success(&mut self, note: String) {
        self.successes += 1;
        tracing::info!(outcome = "success", "{note}");
    }

    fn failure(&mut self, note: String) {
        self.failures += 1;
        tracing::error!(outcome = "failure", "{note}");
    }

    fn tolerated_duplicate(&mut self, note: String) {
        self.tolerated_duplicates += 1;
        tracing::warn!(outcome = "tolerated", "{note}");
    }

    fn tolerated_missing(&mut self, note: String) {
        self.tolerated_missing += 1;
        tracing::warn!(outcome = "tolerated", "{note}");
    }
}

/// Result of finalizing a run: the verdict and its supporting tally.
#[derive(Debug, Clone, Copy)]
pub struct Verdict {
    /// Final outcome counts.
    pub tally: Tally,
}

impl Verdict {
    /// The run passes iff no hard failure was recorded.
    pub fn passed(&self) -> bool {
        self.tally.failures == 0
    }
}

struct TriggerState {
    condition: Condition,
    at_least_once: bool,
    seen: Vec<BTreeMap<String, String>>,
    pool: EventPool,
}

/// Classifies invocations against trigger state and renders the verdict.
///
/// Single-writer by construction: the coordinator owns the verifier and is
/// the only entity that ever mutates it.
pub struct Verifier {
    triggers: BTreeMap<String, TriggerState>,
    triggers_for_dep: BTreeMap<String, Vec<String>>,
    tally: Tally,
}

impl Verifier {
    /// Build verification state from the sensor snapshot.
    ///
    /// Parses every condition, wires the dependency → triggers index, and
    /// rejects conditions that fail to parse or reference undeclared
    /// dependencies. Conditions containing `||` are accepted but flagged:
    /// the term-count heuristic (AND count + 1) is approximate for them.
    pub fn new(sensor: &Sensor) -> Result<Self, SetupError> {
        let declared: BTreeSet<&str> = sensor
            .spec
            .dependencies
            .iter()
            .map(|d| d.name.as_str())
            .collect();

        let mut triggers = BTreeMap::new();
        let mut triggers_for_dep: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for trigger in &sensor.spec.triggers {
            let name = trigger.template.name.clone();
            let condition = Condition::parse(&trigger.template.conditions).map_err(|source| {
                SetupError::InvalidCondition {
                    trigger: name.clone(),
                    source,
                }
            })?;

            if condition.has_or() {
                tracing::warn!(
                    trigger = %name,
                    condition = %condition,
                    "condition contains '||'; term count (AND count + 1) is approximate"
                );
            }

            for variable in condition.variables() {
                if !declared.contains(variable) {
                    return Err(SetupError::UnknownDependency {
                        trigger: name,
                        dependency: variable.to_string(),
                    });
                }
                triggers_for_dep
                    .entry(variable.to_string())
                    .or_default()
                    .push(name.clone());
            }

            triggers.insert(
                name,
                TriggerState {
                    condition,
                    at_least_once: trigger.at_least_once,
                    seen: Vec::new(),
                    pool: EventPool::new(),
                },
            );
        }

        Ok(Self {
            triggers,
            triggers_for_dep,
            tally: Tally::default(),
        })
    }

    /// Current outcome counts.
    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// Make a produced event visible to every trigger whose condition
    /// references its dependency.
    pub fn observe_produced(&mut self, event: ProducedEvent) {
        let Some(names) = self.triggers_for_dep.get(&event.dependency) else {
            return;
        };
        for name in names {
            if let Some(trigger) = self.triggers.get_mut(name) {
                trigger.pool.admit(event.clone());
            }
        }
    }

    /// Classify one consumed invocation.
    pub fn observe_invocation(&mut self, invocation: Invocation) {
        let Some(trigger) = self.triggers.get_mut(&invocation.trigger) else {
            self.tally.failure(format!(
                "trigger '{}' invoked but is not declared by the sensor",
                invocation.trigger
            ));
            return;
        };

        // Duplicate invocation: structural equality against the seen set.
        if trigger.seen.iter().any(|seen| *seen == invocation.values) {
            if trigger.at_least_once {
                self.tally.tolerated_duplicate(format!(
                    "trigger '{}' invoked twice (semantics 'at-least-once')",
                    invocation.trigger
                ));
            } else {
                self.tally.failure(format!(
                    "trigger '{}' invoked twice (semantics 'at-most-once')",
                    invocation.trigger
                ));
            }
            return;
        }
        trigger.seen.push(invocation.values.clone());

        // Claim every pair against the pool; any miss means the invocation
        // used a dependency value that was never produced.
        let mut params = Params::new();
        for (dependency, value) in &invocation.values {
            if trigger.pool.claim(dependency, value) {
                params.insert(dependency.clone(), value.clone());
            } else {
                self.tally.failure(format!(
                    "trigger '{}' invoked with a dependency value that was never produced \
                     (condition='{}' {}={})",
                    invocation.trigger, trigger.condition, dependency, value
                ));
                return;
            }
        }

        if trigger.condition.evaluate(&params) {
            self.tally.success(format!(
                "trigger '{}' invoked when condition was satisfied (condition='{}' values={})",
                invocation.trigger, trigger.condition, params
            ));
        } else {
            self.tally.failure(format!(
                "trigger '{}' invoked when condition was not satisfied (condition='{}' values={})",
                invocation.trigger, trigger.condition, params
            ));
        }

        // Shape check, independent of the condition outcome.
        if invocation.values.len() != trigger.condition.terms() {
            self.tally.failure(format!(
                "trigger '{}' invoked with {} values, expected {} (condition='{}')",
                invocation.trigger,
                invocation.values.len(),
                trigger.condition.terms(),
                trigger.condition
            ));
        }
    }

    /// Completion predicate: true once no trigger's condition is
    /// satisfiable from its current remaining pool.
    pub fn is_done(&self) -> bool {
        self.triggers
            .values()
            .all(|t| t.pool.satisfied(&t.condition).is_none())
    }

    /// Classify triggers whose condition stayed satisfiable without ever
    /// being invoked, then render the verdict.
    pub fn finalize(mut self) -> Verdict {
        for (name, trigger) in &self.triggers {
            if let Some(params) = trigger.pool.satisfied(&trigger.condition) {
                if trigger.at_least_once {
                    self.tally.failure(format!(
                        "trigger '{name}' not invoked when condition was satisfied \
                         (condition='{}' values={params}, semantics 'at-least-once')",
                        trigger.condition
                    ));
                } else {
                    self.tally.tolerated_missing(format!(
                        "trigger '{name}' not invoked when condition was satisfied \
                         (condition='{}' values={params}, semantics 'at-most-once')",
                        trigger.condition
                    ));
                }
            }
        }

        let tally = self.tally;
        if tally.successes > 0 {
            tracing::info!(count = tally.successes, "successful trigger invocations");
        }
        if tally.tolerated_missing > 0 {
            tracing::warn!(
                count = tally.tolerated_missing,
                "missing invocations tolerated under 'at-most-once' semantics"
            );
        }
        if tally.tolerated_duplicates > 0 {
            tracing::warn!(
                count = tally.tolerated_duplicates,
                "duplicate invocations tolerated under 'at-least-once' semantics"
            );
        }
        if tally.failures > 0 {
            tracing::error!(count = tally.failures, "hard failures");
        }

        Verdict { tally }
    }
}
