//! Kafka transport adapters.
//!
//! Producer side: an [`EventSink`] that writes one dependency event per
//! message, keyed by the dependency's event name, with idempotence on and
//! full acknowledgement so the stream is durable, ordered, and
//! at-least-once. Consumer side: a pump that decodes each inbound message
//! and forwards it to the verifier's consumed channel.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::emitter::EventSink;
use crate::error::{EmitError, SetupError};
use crate::listener::decode_invocation;
use crate::sensor::Dependency;
use crate::verify::Invocation;

/// Broker and security options shared by producer and consumer.
#[derive(Debug, Clone, Default)]
pub struct KafkaOptions {
    /// Broker addresses.
    pub brokers: Vec<String>,
    /// Encrypt connections with TLS.
    pub tls: bool,
    /// Authenticate with SASL/SCRAM-SHA-512; credentials come from the
    /// `SASL_USERNAME` and `SASL_PASSWORD` environment variables.
    pub sasl: bool,
}

impl KafkaOptions {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.brokers.join(","));

        match (self.tls, self.sasl) {
            (true, true) => config.set("security.protocol", "sasl_ssl"),
            (true, false) => config.set("security.protocol", "ssl"),
            (false, true) => config.set("security.protocol", "sasl_plaintext"),
            (false, false) => &mut config,
        };

        if self.sasl {
            config.set("sasl.mechanism", "SCRAM-SHA-512");
            if let Ok(username) = std::env::var("SASL_USERNAME") {
                config.set("sasl.username", username);
            }
            if let Ok(password) = std::env::var("SASL_PASSWORD") {
                config.set("sasl.password", password);
            }
        }

        config
    }
}

/// Producer-side sink writing dependency events to the input topic.
pub struct KafkaEventSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventSink {
    /// Build an idempotent, fully acknowledged producer.
    pub fn connect(options: &KafkaOptions, topic: impl Into<String>) -> Result<Self, SetupError> {
        let mut config = options.client_config();
        config
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "1");

        let producer: FutureProducer = config
            .create()
            .map_err(|e| SetupError::Transport(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl EventSink for KafkaEventSink {
    async fn send(&self, dependency: &Dependency, value: &str) -> Result<(), EmitError> {
        let record = FutureRecord::to(&self.topic)
            .key(&dependency.event_name)
            .payload(value);

        self.producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(error, _message)| EmitError::Send {
                dependency: dependency.name.clone(),
                detail: error.to_string(),
            })?;

        Ok(())
    }
}

/// Consumer-side pump: reads the output topic, decodes, and forwards to
/// the verifier's consumed channel.
pub struct KafkaInvocationSource {
    consumer: StreamConsumer,
    consumed_tx: mpsc::Sender<Invocation>,
}

impl KafkaInvocationSource {
    /// Subscribe to the output topic under a fresh consumer group.
    pub fn connect(
        options: &KafkaOptions,
        topic: &str,
        consumed_tx: mpsc::Sender<Invocation>,
    ) -> Result<Self, SetupError> {
        let mut config = options.client_config();
        // Fresh group, newest offsets: invocations from earlier runs must
        // never reach the verifier.
        config
            .set("group.id", format!("triggerscope-{}", Uuid::new_v4()))
            .set("auto.offset.reset", "latest");

        let consumer: StreamConsumer = config
            .create()
            .map_err(|e| SetupError::Transport(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| SetupError::Transport(e.to_string()))?;

        Ok(Self {
            consumer,
            consumed_tx,
        })
    }

    /// Pump messages until cancelled. One wire message yields exactly one
    /// record; undecodable messages are logged and dropped without
    /// aborting the run.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = self.consumer.recv() => match received {
                    Ok(message) => {
                        let trigger = message
                            .key()
                            .map(|key| String::from_utf8_lossy(key).into_owned())
                            .unwrap_or_default();
                        let payload = message.payload().unwrap_or_default();

                        match decode_invocation(&trigger, payload) {
                            Ok(invocation) => {
                                if self.consumed_tx.send(invocation).await.is_err() {
                                    return;
                                }
                            }
                            Err(error) => {
                                tracing::error!(%error, trigger = %trigger, "dropping undecodable invocation");
                            }
                        }
                    }
                    Err(error) => {
                        tracing::error!(%error, "kafka consume error");
                    }
                },
            }
        }
    }
}
