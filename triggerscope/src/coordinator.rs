//! Single-owner aggregation loop over the produced and consumed channels.
//!
//! All trigger, pool, and tally state is exclusively owned by the
//! coordinator task; no locks are needed because nothing else ever
//! touches it. The emitter and listener feed it through two unidirectional
//! channels, and the driver queries progress through a small mailbox so it
//! controls how often the (combinatorial) completion sweep runs.
//!
//! Ordering: messages within each channel preserve emission order, and the
//! emitter pushes its produced-event record before the corresponding wire
//! send, so the coordinator observes every produced event no later than
//! any invocation that could have resulted from it.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::pool::ProducedEvent;
use crate::verify::{Invocation, Verifier};

/// Snapshot of coordinator progress, answered to status queries.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    /// True once no trigger's condition is satisfiable from its current
    /// pool; lets the driver stop early.
    pub done: bool,
    /// Time the most recent consumed invocation was observed (loop start
    /// until the first one arrives).
    pub last_activity: Instant,
}

/// Cheap cloneable handle for querying the coordinator from the driver.
#[derive(Clone)]
pub struct CoordinatorHandle {
    status_tx: mpsc::Sender<oneshot::Sender<Status>>,
}

impl CoordinatorHandle {
    /// Ask the coordinator for a progress snapshot.
    ///
    /// Returns `None` once the coordinator has exited.
    pub async fn status(&self) -> Option<Status> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.status_tx.send(reply_tx).await.ok()?;
        reply_rx.await.ok()
    }
}

/// Owns the verifier and consumes both notification channels.
pub struct Coordinator {
    verifier: Verifier,
    produced_rx: mpsc::Receiver<ProducedEvent>,
    consumed_rx: mpsc::Receiver<Invocation>,
    status_rx: mpsc::Receiver<oneshot::Sender<Status>>,
    cancel: CancellationToken,
    last_activity: Instant,
}

impl Coordinator {
    /// Wire a coordinator to its inbound channels and cancellation signal.
    pub fn new(
        verifier: Verifier,
        produced_rx: mpsc::Receiver<ProducedEvent>,
        consumed_rx: mpsc::Receiver<Invocation>,
        cancel: CancellationToken,
    ) -> (Self, CoordinatorHandle) {
        let (status_tx, status_rx) = mpsc::channel(1);
        (
            Self {
                verifier,
                produced_rx,
                consumed_rx,
                status_rx,
                cancel,
                last_activity: Instant::now(),
            },
            CoordinatorHandle { status_tx },
        )
    }

    /// Consume notifications until cancelled, then hand the verifier back
    /// for finalize. Accumulated tallies survive cancellation; anything
    /// still queued in the channels is abandoned.
    pub async fn run(mut self) -> Verifier {
        loop {
            tokio::select! {
                // Data channels are drained before status queries are
                // answered, so a snapshot never misses an event that was
                // already queued when the query arrived.
                biased;

                _ = self.cancel.cancelled() => break,
                Some(event) = self.produced_rx.recv() => {
                    tracing::debug!(
                        dependency = %event.dependency,
                        value = %event.value,
                        "observed produced event"
                    );
                    self.verifier.observe_produced(event);
                }
                Some(invocation) = self.consumed_rx.recv() => {
                    tracing::debug!(
                        trigger = %invocation.trigger,
                        values = invocation.values.len(),
                        "observed invocation"
                    );
                    self.last_activity = Instant::now();
                    self.verifier.observe_invocation(invocation);
                }
                Some(reply) = self.status_rx.recv() => {
                    let _ = reply.send(Status {
                        done: self.verifier.is_done(),
                        last_activity: self.last_activity,
                    });
                }
            }
        }

        self.verifier
    }
}
