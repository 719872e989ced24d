//! Decoding inbound trigger invocations from the wire.
//!
//! One wire message yields exactly one consumed-invocation record: the
//! message key is the trigger name and the payload is a JSON object of
//! dependency name → base64-encoded value. Values are decoded to raw
//! strings before they reach the verifier; a message that fails to decode
//! is dropped by the caller, it never becomes a classification failure.

use std::collections::BTreeMap;

use base64::Engine;

use crate::error::DecodeError;
use crate::verify::Invocation;

/// Decode one wire message into an invocation record.
pub fn decode_invocation(trigger: &str, payload: &[u8]) -> Result<Invocation, DecodeError> {
    if trigger.is_empty() {
        return Err(DecodeError::MissingTrigger);
    }

    let raw: BTreeMap<String, String> = serde_json::from_slice(payload)?;

    let mut values = BTreeMap::new();
    for (dependency, encoded) in raw {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .map_err(|source| DecodeError::Base64 {
                dependency: dependency.clone(),
                source,
            })?;
        let value = String::from_utf8(bytes).map_err(|_| DecodeError::Utf8 {
            dependency: dependency.clone(),
        })?;
        values.insert(dependency, value);
    }

    Ok(Invocation {
        trigger: trigger.to_string(),
        values,
    })
}
