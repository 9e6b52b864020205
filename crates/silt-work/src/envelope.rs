//! Self-describing task payload envelopes.
//!
//! Masters and workers exchange opaque payloads tagged with a `type_url`
//! so that a worker can verify it was handed the task shape it expects
//! before deserializing. A mismatched URL fails fast instead of producing
//! a confusing decode error downstream.

use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An opaque, versioned task payload.
///
/// The `value` bytes are JSON of the type named by `type_url`; on the wire
/// the bytes travel base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Identifies the serialized type, e.g. `type.silt.dev/silt.CompactionTask`.
    pub type_url: String,
    /// The serialized value.
    #[serde(with = "base64_bytes")]
    pub value: Bytes,
}

/// Serializes `value` under `type_url`.
pub fn pack<T: Serialize>(type_url: &str, value: &T) -> Result<TaskPayload> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Error::envelope(format!("packing {type_url}: {e}")))?;
    Ok(TaskPayload {
        type_url: type_url.to_string(),
        value: Bytes::from(bytes),
    })
}

/// Deserializes a payload, verifying it carries the expected `type_url`.
pub fn unpack<T: DeserializeOwned>(expected_url: &str, payload: &TaskPayload) -> Result<T> {
    if payload.type_url != expected_url {
        return Err(Error::envelope(format!(
            "expected payload type '{expected_url}', got '{}'",
            payload.type_url
        )));
    }
    serde_json::from_slice(&payload.value)
        .map_err(|e| Error::envelope(format!("unpacking {expected_url}: {e}")))
}

mod base64_bytes {
    use super::{BASE64, Bytes};
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        name: String,
        count: u32,
    }

    const PROBE_URL: &str = "type.silt.dev/silt.Probe";

    #[test]
    fn pack_unpack_roundtrips() {
        let probe = Probe {
            name: "shard-3".into(),
            count: 7,
        };
        let payload = pack(PROBE_URL, &probe).unwrap();
        assert_eq!(payload.type_url, PROBE_URL);
        let back: Probe = unpack(PROBE_URL, &payload).unwrap();
        assert_eq!(back, probe);
    }

    #[test]
    fn type_url_mismatch_fails_fast() {
        let payload = pack(PROBE_URL, &Probe {
            name: "x".into(),
            count: 0,
        })
        .unwrap();
        let err = unpack::<Probe>("type.silt.dev/silt.Other", &payload).unwrap_err();
        assert!(matches!(err, Error::Envelope { .. }));
    }

    #[test]
    fn wire_encoding_is_base64() {
        let payload = pack(PROBE_URL, &Probe {
            name: "x".into(),
            count: 1,
        })
        .unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        let encoded = json["value"].as_str().unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, payload.value);
    }
}
