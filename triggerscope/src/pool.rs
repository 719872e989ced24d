//! Per-trigger event pools and the combinatorial satisfiability matcher.
//!
//! Each trigger keeps two disjoint ordered sequences of produced events:
//!
//! - `remaining`: candidates for future satisfiability checks
//! - `extra`: events superseded by a newer event of the same dependency,
//!   retained only for literal value lookup
//!
//! A produced event instance is in at most one of remaining / extra /
//! neither; once claimed by an invocation it is removed entirely.

use crate::condition::{Condition, Params};

/// A dependency occurrence injected by the emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedEvent {
    /// Name of the dependency the event occurred for.
    pub dependency: String,
    /// Unique value assigned by the emitter.
    pub value: String,
}

impl ProducedEvent {
    /// Create a produced-event record.
    pub fn new(dependency: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            value: value.into(),
        }
    }
}

/// Lexicographic iterator over index combinations of size `k` from `0..n`.
///
/// Combinations are emitted in a fixed deterministic order so that the
/// first satisfying combination is reproducible given identical pool
/// ordering.
struct Combinations {
    n: usize,
    k: usize,
    indices: Vec<usize>,
    exhausted: bool,
}

fn combinations(n: usize, k: usize) -> Combinations {
    Combinations {
        n,
        k,
        indices: (0..k).collect(),
        exhausted: k > n,
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.exhausted {
            return None;
        }
        let current = self.indices.clone();

        // Advance to the next combination: bump the rightmost index that
        // has room, then reset everything to its right.
        let mut i = self.k;
        loop {
            if i == 0 {
                self.exhausted = true;
                break;
            }
            i -= 1;
            if self.indices[i] != i + self.n - self.k {
                self.indices[i] += 1;
                for j in i + 1..self.k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }

        Some(current)
    }
}

/// Unclaimed produced events for one trigger, partitioned to bound the
/// combinatorial search.
#[derive(Debug, Default)]
pub struct EventPool {
    remaining: Vec<ProducedEvent>,
    extra: Vec<ProducedEvent>,
}

impl EventPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a newly produced event as a matching candidate.
    pub fn admit(&mut self, event: ProducedEvent) {
        self.remaining.push(event);
    }

    /// Number of events still eligible for combinatorial matching.
    pub fn remaining_len(&self) -> usize {
        self.remaining.len()
    }

    /// Number of superseded events retained for literal lookup.
    pub fn extra_len(&self) -> usize {
        self.extra.len()
    }

    /// Search for a subset of `remaining` that satisfies `condition`.
    ///
    /// Enumerates combinations of size `condition.terms()` in lexicographic
    /// index order and returns the parameter view of the first satisfying
    /// combination. When two chosen events share a dependency name, the
    /// later index wins in the view. Combinatorial in
    /// `remaining.len() choose terms`; acceptable because the term count is
    /// small and claims prune `remaining`.
    pub fn satisfied(&self, condition: &Condition) -> Option<Params> {
        let terms = condition.terms();
        if self.remaining.len() < terms {
            return None;
        }

        for combination in combinations(self.remaining.len(), terms) {
            let mut params = Params::new();
            for index in combination {
                let event = &self.remaining[index];
                params.insert(event.dependency.clone(), event.value.clone());
            }
            if condition.evaluate(&params) {
                return Some(params);
            }
        }

        None
    }

    /// Claim the event `(dependency, value)` for an observed invocation.
    ///
    /// A hit in `remaining` removes the event and migrates every *earlier*
    /// `remaining` entry for the same dependency into `extra`: a newer
    /// value for that dependency has been confirmed relevant, so stale
    /// duplicates are no longer matching candidates but stay claimable by
    /// literal value. A miss falls back to an exact match in `extra`.
    /// Returns false when the pair was never produced.
    pub fn claim(&mut self, dependency: &str, value: &str) -> bool {
        let hit = self
            .remaining
            .iter()
            .position(|e| e.dependency == dependency && e.value == value);

        if let Some(hit) = hit {
            let drained = std::mem::take(&mut self.remaining);
            for (i, event) in drained.into_iter().enumerate() {
                if i == hit {
                    continue;
                }
                if i < hit && event.dependency == dependency {
                    self.extra.push(event);
                } else {
                    self.remaining.push(event);
                }
            }
            return true;
        }

        if let Some(hit) = self
            .extra
            .iter()
            .position(|e| e.dependency == dependency && e.value == value)
        {
            self.extra.remove(hit);
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(events: &[(&str, &str)]) -> EventPool {
        let mut pool = EventPool::new();
        for (dep, value) in events {
            pool.admit(ProducedEvent::new(*dep, *value));
        }
        pool
    }

    #[test]
    fn combinations_lexicographic_order() {
        let all: Vec<Vec<usize>> = combinations(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn combinations_degenerate_sizes() {
        assert_eq!(combinations(3, 3).count(), 1);
        assert_eq!(combinations(2, 3).count(), 0);
        assert_eq!(combinations(5, 1).count(), 5);
    }

    #[test]
    fn satisfied_returns_satisfying_params() {
        let cond = Condition::parse("a && b").unwrap();
        let pool = pool(&[("a", "1"), ("c", "2"), ("b", "3")]);

        let params = pool.satisfied(&cond).expect("satisfiable");
        // Matcher soundness: the returned mapping satisfies the condition.
        assert!(cond.evaluate(&params));
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("3"));
    }

    #[test]
    fn satisfied_requires_enough_events() {
        let cond = Condition::parse("a && b").unwrap();
        let pool = pool(&[("a", "1")]);
        assert!(pool.satisfied(&cond).is_none());
    }

    #[test]
    fn satisfied_respects_condition() {
        let cond = Condition::parse("a && b").unwrap();
        // Two events, but only one of the required dependencies.
        let pool = pool(&[("a", "1"), ("a", "2")]);
        assert!(pool.satisfied(&cond).is_none());
    }

    #[test]
    fn satisfied_first_combination_is_deterministic() {
        let cond = Condition::parse("a").unwrap();
        let pool = pool(&[("a", "1"), ("a", "2")]);
        // [0] precedes [1] lexicographically, so the earliest event wins.
        let params = pool.satisfied(&cond).unwrap();
        assert_eq!(params.get("a"), Some("1"));
    }

    #[test]
    fn claim_removes_from_remaining() {
        let mut pool = pool(&[("a", "1"), ("b", "2")]);
        assert!(pool.claim("a", "1"));
        assert_eq!(pool.remaining_len(), 1);
        assert_eq!(pool.extra_len(), 0);
    }

    #[test]
    fn claim_migrates_earlier_duplicates_to_extra() {
        let mut pool = pool(&[("a", "1"), ("b", "2"), ("a", "3")]);
        // Claiming the newer value for "a" supersedes the older one.
        assert!(pool.claim("a", "3"));
        assert_eq!(pool.remaining_len(), 1);
        assert_eq!(pool.extra_len(), 1);

        // The superseded value is no longer a matching candidate...
        let cond = Condition::parse("a").unwrap();
        assert!(pool.satisfied(&cond).is_none());

        // ...but it is still claimable by literal value.
        assert!(pool.claim("a", "1"));
        assert_eq!(pool.extra_len(), 0);
    }

    #[test]
    fn claim_preserves_order_of_survivors() {
        let mut pool = pool(&[("a", "1"), ("b", "2"), ("a", "3"), ("c", "4")]);
        assert!(pool.claim("a", "3"));
        assert_eq!(
            pool.remaining,
            vec![ProducedEvent::new("b", "2"), ProducedEvent::new("c", "4")]
        );
        assert_eq!(pool.extra, vec![ProducedEvent::new("a", "1")]);
    }

    #[test]
    fn claim_exclusivity() {
        // Once claimed, an event cannot be claimed again.
        let mut pool = pool(&[("a", "1")]);
        assert!(pool.claim("a", "1"));
        assert!(!pool.claim("a", "1"));
    }

    #[test]
    fn claim_unproduced_value_fails() {
        let mut pool = pool(&[("a", "1")]);
        assert!(!pool.claim("a", "zzz"));
        assert!(!pool.claim("zzz", "1"));
        // A failed claim leaves the pool untouched.
        assert_eq!(pool.remaining_len(), 1);
    }
}
