//! Error types for the triggerscope harness.
//!
//! The taxonomy mirrors how failures propagate: setup-fatal errors abort
//! before any event flows, per-message decode errors drop one invocation,
//! and everything else is a classification outcome tallied by the
//! verifier rather than an `Err`.

use thiserror::Error;

use crate::condition::ParseError;

/// Errors that abort the run before any event is produced.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A trigger's condition text failed to parse.
    #[error("invalid condition for trigger '{trigger}': {source}")]
    InvalidCondition {
        /// Name of the trigger carrying the condition.
        trigger: String,
        /// The underlying parse failure.
        #[source]
        source: ParseError,
    },

    /// A condition references a dependency the sensor does not declare.
    #[error("trigger '{trigger}' references unknown dependency '{dependency}'")]
    UnknownDependency {
        /// Name of the trigger carrying the condition.
        trigger: String,
        /// The undeclared dependency name.
        dependency: String,
    },

    /// The sensor declares no dependencies to produce events for.
    #[error("sensor '{sensor}' declares no dependencies")]
    NoDependencies {
        /// Name of the sensor resource.
        sensor: String,
    },

    /// The sensor manifest file could not be read.
    #[error("failed to read sensor manifest '{path}': {source}")]
    ManifestRead {
        /// Path that was attempted.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The sensor resource could not be deserialized.
    #[error("failed to decode sensor resource: {0}")]
    ManifestDecode(#[from] serde_json::Error),

    /// Live fetch of the sensor resource failed.
    #[error("failed to fetch sensor '{name}' in namespace '{namespace}': {detail}")]
    Fetch {
        /// Sensor resource name.
        name: String,
        /// Namespace the fetch targeted.
        namespace: String,
        /// Loader-specific failure detail.
        detail: String,
    },

    /// Transport-level connection or configuration failure.
    #[error("transport setup failed: {0}")]
    Transport(String),
}

/// Per-message failures while decoding an inbound invocation.
///
/// Fatal to that message's processing, never to the run.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The wire message carried no trigger name.
    #[error("invocation is missing a trigger name")]
    MissingTrigger,

    /// The payload was not a JSON object of dependency values.
    #[error("invocation payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    /// A value failed transport-level base64 decoding.
    #[error("value for dependency '{dependency}' is not valid base64: {source}")]
    Base64 {
        /// Dependency whose value failed to decode.
        dependency: String,
        /// The underlying decode failure.
        #[source]
        source: base64::DecodeError,
    },

    /// A decoded value was not valid UTF-8.
    #[error("decoded value for dependency '{dependency}' is not UTF-8")]
    Utf8 {
        /// Dependency whose value failed to decode.
        dependency: String,
    },
}

/// Errors raised while producing synthetic dependency events.
#[derive(Debug, Error)]
pub enum EmitError {
    /// There are no dependencies to pick from.
    #[error("no dependencies to produce events for")]
    NoDependencies,

    /// The verifier's produced-event channel closed mid-production.
    #[error("produced-event channel closed before production finished")]
    ChannelClosed,

    /// The wire transport rejected a message.
    #[error("event sink rejected message for dependency '{dependency}': {detail}")]
    Send {
        /// Dependency the message was for.
        dependency: String,
        /// Transport-specific failure detail.
        detail: String,
    },
}

/// Errors raised by the disruption injector.
///
/// Logged and tolerated; a failed strike never aborts the test window.
#[derive(Debug, Error)]
pub enum ChaosError {
    /// Listing disruption targets failed.
    #[error("failed to list disruption targets: {0}")]
    List(String),

    /// No workers matched the target selector.
    #[error("no disruption targets matched the selector")]
    NoTargets,

    /// Killing the chosen target failed.
    #[error("failed to kill target '{target}': {detail}")]
    Kill {
        /// The chosen target.
        target: String,
        /// Failure detail from the reaper.
        detail: String,
    },
}
