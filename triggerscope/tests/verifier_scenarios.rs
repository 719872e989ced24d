//! End-to-end verifier scenarios.
//!
//! Each scenario drives the verifier the way the coordinator does
//! (produced events first, then invocations, then finalize) and checks
//! the outcome tally against the declared consistency semantics.

use std::collections::BTreeMap;

use triggerscope::error::SetupError;
use triggerscope::pool::ProducedEvent;
use triggerscope::sensor::{Dependency, Sensor, Spec, Template, TriggerSpec};
use triggerscope::verify::{Invocation, Verifier};

fn sensor(triggers: &[(&str, &str, bool)], dependencies: &[&str]) -> Sensor {
    Sensor {
        spec: Spec {
            dependencies: dependencies
                .iter()
                .map(|name| Dependency {
                    name: name.to_string(),
                    event_name: format!("{name}-event"),
                    event_source_name: "test".to_string(),
                })
                .collect(),
            triggers: triggers
                .iter()
                .map(|(name, conditions, at_least_once)| TriggerSpec {
                    template: Template {
                        name: name.to_string(),
                        conditions: conditions.to_string(),
                    },
                    at_least_once: *at_least_once,
                })
                .collect(),
        },
        ..Sensor::default()
    }
}

fn invocation(trigger: &str, values: &[(&str, &str)]) -> Invocation {
    Invocation {
        trigger: trigger.to_string(),
        values: values
            .iter()
            .map(|(dep, value)| (dep.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn scenario_a_justified_invocation_succeeds() {
    let sensor = sensor(&[("t", "dep1", false)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "5"));
    verifier.observe_invocation(invocation("t", &[("dep1", "5")]));

    let verdict = verifier.finalize();
    assert!(verdict.passed());
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.failures, 0);
}

#[test]
fn scenario_b_missing_invocation_tolerated_at_most_once() {
    let sensor = sensor(&[("t", "dep1", false)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "5"));

    let verdict = verifier.finalize();
    assert!(verdict.passed());
    assert_eq!(verdict.tally.failures, 0);
    assert_eq!(verdict.tally.tolerated_missing, 1);
}

#[test]
fn scenario_c_missing_invocation_fails_at_least_once() {
    let sensor = sensor(&[("t", "dep1", true)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "5"));

    let verdict = verifier.finalize();
    assert!(!verdict.passed());
    assert_eq!(verdict.tally.failures, 1);
    assert_eq!(verdict.tally.tolerated_missing, 0);
}

#[test]
fn scenario_d_duplicate_fails_at_most_once() {
    let sensor = sensor(&[("t", "dep1 && dep2", false)], &["dep1", "dep2"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "a"));
    verifier.observe_produced(ProducedEvent::new("dep2", "b"));
    let fired = invocation("t", &[("dep1", "a"), ("dep2", "b")]);
    verifier.observe_invocation(fired.clone());
    verifier.observe_invocation(fired);

    let verdict = verifier.finalize();
    assert!(!verdict.passed());
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.failures, 1);
    assert_eq!(verdict.tally.tolerated_duplicates, 0);
}

#[test]
fn scenario_d_duplicate_tolerated_at_least_once() {
    let sensor = sensor(&[("t", "dep1 && dep2", true)], &["dep1", "dep2"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "a"));
    verifier.observe_produced(ProducedEvent::new("dep2", "b"));
    let fired = invocation("t", &[("dep1", "a"), ("dep2", "b")]);
    verifier.observe_invocation(fired.clone());
    verifier.observe_invocation(fired);

    let verdict = verifier.finalize();
    assert!(verdict.passed());
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.failures, 0);
    assert_eq!(verdict.tally.tolerated_duplicates, 1);
}

#[test]
fn scenario_e_unproduced_value_is_hard_failure() {
    let sensor = sensor(&[("t", "dep1", false)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "5"));
    verifier.observe_invocation(invocation("t", &[("dep1", "zzz")]));

    let verdict = verifier.finalize();
    assert!(!verdict.passed());
    assert_eq!(verdict.tally.successes, 0);
    // One failure for the unclaimed value; the still-satisfiable pool is
    // tolerated under at-most-once, not a second failure.
    assert_eq!(verdict.tally.failures, 1);
    assert_eq!(verdict.tally.tolerated_missing, 1);
}

#[test]
fn dedup_is_idempotent_per_mapping() {
    // Same invocation three times under at-most-once: one success from
    // the first submission, one duplicate failure per resubmission.
    let sensor = sensor(&[("t", "dep1", false)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "5"));
    let fired = invocation("t", &[("dep1", "5")]);
    verifier.observe_invocation(fired.clone());
    verifier.observe_invocation(fired.clone());
    verifier.observe_invocation(fired);

    let verdict = verifier.finalize();
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.failures, 2);
}

#[test]
fn invocation_with_unsatisfied_condition_fails() {
    let sensor = sensor(&[("t", "dep1 && dep2", false)], &["dep1", "dep2"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "a"));
    // The engine fired with only one of the two required dependencies:
    // claim succeeds, the condition does not, and the term count is off.
    verifier.observe_invocation(invocation("t", &[("dep1", "a")]));

    let verdict = verifier.finalize();
    assert!(!verdict.passed());
    assert_eq!(verdict.tally.failures, 2);
}

#[test]
fn term_count_mismatch_fails_even_when_condition_holds() {
    let sensor = sensor(&[("t", "dep1 || dep2", false)], &["dep1", "dep2"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "a"));
    // `dep1 || dep2` is satisfied by one value, but the heuristic term
    // count for the expression is 2.
    verifier.observe_invocation(invocation("t", &[("dep1", "a")]));

    let verdict = verifier.finalize();
    assert!(!verdict.passed());
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.failures, 1);
}

#[test]
fn stale_duplicate_values_stay_claimable() {
    // Two events for the same dependency; the engine fires for the newer
    // one first, then for the superseded one. Both claims must succeed
    // (the first from remaining, the second from extra), but the second
    // invocation's mapping differs so dedup does not collapse them.
    let sensor = sensor(&[("t", "dep1", true)], &["dep1"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "1"));
    verifier.observe_produced(ProducedEvent::new("dep1", "2"));
    verifier.observe_invocation(invocation("t", &[("dep1", "2")]));
    verifier.observe_invocation(invocation("t", &[("dep1", "1")]));

    let verdict = verifier.finalize();
    assert!(verdict.passed());
    assert_eq!(verdict.tally.successes, 2);
}

#[test]
fn events_fan_out_to_all_referencing_triggers() {
    let sensor = sensor(
        &[("t1", "dep1", true), ("t2", "dep1 && dep2", false)],
        &["dep1", "dep2"],
    );
    let mut verifier = Verifier::new(&sensor).unwrap();

    verifier.observe_produced(ProducedEvent::new("dep1", "0"));
    verifier.observe_invocation(invocation("t1", &[("dep1", "0")]));

    // t1's pool is drained; t2 still holds dep1 but stays unsatisfiable
    // without dep2, which at-most-once tolerates silently.
    let verdict = verifier.finalize();
    assert!(verdict.passed());
    assert_eq!(verdict.tally.successes, 1);
    assert_eq!(verdict.tally.tolerated_missing, 0);
}

#[test]
fn completion_predicate_tracks_satisfiability() {
    let sensor = sensor(&[("t", "dep1 && dep2", true)], &["dep1", "dep2"]);
    let mut verifier = Verifier::new(&sensor).unwrap();

    assert!(verifier.is_done(), "nothing produced, nothing satisfiable");

    verifier.observe_produced(ProducedEvent::new("dep1", "0"));
    assert!(verifier.is_done(), "one of two conjuncts is not enough");

    verifier.observe_produced(ProducedEvent::new("dep2", "1"));
    assert!(!verifier.is_done(), "both conjuncts available");

    verifier.observe_invocation(invocation("t", &[("dep1", "0"), ("dep2", "1")]));
    assert!(verifier.is_done(), "events claimed, nothing satisfiable");
}

#[test]
fn setup_rejects_bad_conditions() {
    let bad = sensor(&[("t", "dep1 &&", false)], &["dep1"]);
    assert!(matches!(
        Verifier::new(&bad),
        Err(SetupError::InvalidCondition { .. })
    ));

    let undeclared = sensor(&[("t", "ghost", false)], &["dep1"]);
    assert!(matches!(
        Verifier::new(&undeclared),
        Err(SetupError::UnknownDependency { .. })
    ));
}
