//! Synthetic dependency-event production.
//!
//! For a configured count, the emitter picks a dependency uniformly at
//! random, assigns it a unique value, and emits the produced-event record
//! on the verifier's channel before transmitting the message on the wire.

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;

use crate::error::EmitError;
use crate::pool::ProducedEvent;
use crate::sensor::Dependency;

/// Producer-side transport seam: deliver one dependency event to the wire.
///
/// The literal wire encoding (partitioning, acknowledgement mode, security
/// handshake) is the implementation's concern; the emitter only needs the
/// send to complete or fail.
#[async_trait]
pub trait EventSink {
    /// Transmit `value` as an occurrence of `dependency`.
    async fn send(&self, dependency: &Dependency, value: &str) -> Result<(), EmitError>;
}

/// Produces synthetic dependency events through an [`EventSink`].
pub struct Emitter<S> {
    sink: S,
    produced_tx: mpsc::Sender<ProducedEvent>,
}

impl<S: EventSink> Emitter<S> {
    /// Wire an emitter to its sink and the verifier's produced channel.
    pub fn new(sink: S, produced_tx: mpsc::Sender<ProducedEvent>) -> Self {
        Self { sink, produced_tx }
    }

    /// Produce `count` events over randomly chosen dependencies.
    ///
    /// The loop index doubles as the unique value, so every produced pair
    /// is distinct for the whole run.
    pub async fn produce(&self, count: usize, dependencies: &[Dependency]) -> Result<(), EmitError> {
        if dependencies.is_empty() {
            return Err(EmitError::NoDependencies);
        }

        for i in 0..count {
            let dependency = &dependencies[rand::rng().random_range(0..dependencies.len())];
            let value = i.to_string();

            tracing::debug!(index = i, dependency = %dependency.name, "producing event");

            // The record goes on the channel strictly before the wire send:
            // the verifier must never lag behind real delivery.
            self.produced_tx
                .send(ProducedEvent::new(dependency.name.clone(), value.clone()))
                .await
                .map_err(|_| EmitError::ChannelClosed)?;

            self.sink.send(dependency, &value).await?;
        }

        Ok(())
    }
}
