//! Sensor resource model and loaders.
//!
//! The sensor is the cluster-managed resource under test: a set of named
//! dependencies and a set of triggers with boolean conditions over them.
//! The harness treats it as a one-time immutable snapshot taken before any
//! event flows; there is no hot reload.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// The sensor resource under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    /// Resource API version, carried through untouched.
    #[serde(default)]
    pub api_version: String,
    /// Resource kind, carried through untouched.
    #[serde(default)]
    pub kind: String,
    /// Resource name and namespace.
    #[serde(default)]
    pub metadata: Metadata,
    /// Dependencies and triggers.
    pub spec: Spec,
}

/// Resource name and namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Resource name.
    #[serde(default)]
    pub name: String,
    /// Resource namespace.
    #[serde(default)]
    pub namespace: String,
}

/// Declared dependencies and triggers of the sensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// Named input edges events can occur for.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Rules expected to fire when their condition is satisfied.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

/// One named input edge of the dependency graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Name conditions reference the dependency by.
    pub name: String,
    /// Event name used as the wire message key.
    #[serde(default)]
    pub event_name: String,
    /// Source the event nominally originates from.
    #[serde(default)]
    pub event_source_name: String,
}

/// One trigger rule with its consistency semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    /// Name and condition of the trigger.
    pub template: Template,
    /// When true, missed firings are failures and duplicates are
    /// tolerated; when false, the engine may skip firing but must never
    /// fire twice for the same satisfying set.
    #[serde(default)]
    pub at_least_once: bool,
}

/// Name and condition text of a trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Trigger name, used as the wire message key of invocations.
    pub name: String,
    /// Boolean condition text over dependency names.
    #[serde(default)]
    pub conditions: String,
}

impl Sensor {
    /// Decode a sensor resource from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, SetupError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read a sensor manifest from a JSON file.
    pub async fn from_file(path: &Path) -> Result<Self, SetupError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| SetupError::ManifestRead {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&data)
    }

    /// Fetch the live sensor resource from the cluster.
    ///
    /// Shells out to `kubectl get sensor <name> -o json`, which keeps the
    /// cluster client entirely outside the harness while still reading the
    /// exact resource the engine under test is running.
    pub async fn fetch(name: &str, namespace: &str) -> Result<Self, SetupError> {
        let fetch_err = |detail: String| SetupError::Fetch {
            name: name.to_string(),
            namespace: namespace.to_string(),
            detail,
        };

        let output = tokio::process::Command::new("kubectl")
            .args(["get", "sensor", name, "-n", namespace, "-o", "json"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !output.status.success() {
            return Err(fetch_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Self::from_json(&output.stdout)
    }
}
