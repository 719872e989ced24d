//! # Triggerscope
//!
//! Correctness verifier for event-driven trigger logic in a
//! dependency-graph automation engine.
//!
//! Triggerscope synthetically produces dependency events, observes the
//! trigger invocations the engine under test emits in response, and
//! decides whether every invocation was justified by a satisfied boolean
//! condition over received dependencies, and whether every satisfied
//! condition in fact produced an invocation, under each trigger's
//! declared consistency semantic (fire-at-least-once vs
//! fire-at-most-once).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ produced events  ┌─────────────────────────────┐
//! │ Emitter  ├─────────────────▶│ Coordinator                 │
//! └────┬─────┘                  │  • single owner of all      │
//!      │ wire send              │    trigger/pool/tally state │
//!      ▼                        │  • event-pool matcher       │
//! ┌──────────┐                  │  • consistency verifier     │
//! │ engine   │                  │  • completion predicate     │
//! │ under    │ invocations      │  • finalize → verdict       │
//! │ test     ├───▶ Listener ───▶│                             │
//! └──────────┘                  └─────────────────────────────┘
//!
//!        Disruptor ──▶ kills marked workers on a timer
//! ```
//!
//! The coordinator is the only entity that ever mutates verification
//! state; everything reaches it through channels, so there are no locks.
//! The emitter pushes each produced-event record before the corresponding
//! wire send, which guarantees the coordinator observes every produced
//! event no later than any invocation it could have caused.
//!
//! ## Outcome taxonomy
//!
//! - **success**: invocation justified by claimed events and a satisfied
//!   condition, with the expected number of terms
//! - **hard failure**: unproduced dependency value, unsatisfied
//!   condition, term-count mismatch, duplicate under at-most-once,
//!   missing under at-least-once
//! - **tolerated**: duplicate under at-least-once, missing under
//!   at-most-once
//!
//! The run passes iff the hard-failure count is zero; the CLI exit code
//! reflects the verdict.

#![deny(missing_docs)]

pub mod chaos;
pub mod condition;
pub mod coordinator;
pub mod emitter;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod listener;
pub mod pool;
pub mod sensor;
pub mod verify;

pub use chaos::{Disruptor, KubectlReaper, Reaper};
pub use condition::{BoolExpr, Condition, Params, ParseError};
pub use coordinator::{Coordinator, CoordinatorHandle, Status};
pub use emitter::{Emitter, EventSink};
pub use error::{ChaosError, DecodeError, EmitError, SetupError};
pub use listener::decode_invocation;
pub use pool::{EventPool, ProducedEvent};
pub use sensor::{Dependency, Metadata, Sensor, Spec, Template, TriggerSpec};
pub use verify::{Invocation, Tally, Verdict, Verifier};
