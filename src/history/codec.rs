//! Persisted layout of the history log.
//!
//! Current layout is a versioned document:
//!
//! ```json
//! {"schema_version":1,"samples":[{"test":"CPU Processing","time":12.34,"timestamp":1700000000000}]}
//! ```
//!
//! The unversioned layout (a bare array, `time` possibly a two-decimal string)
//! is still accepted and gets rewritten in the current layout on the next save.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::Sample;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed history document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported history schema version {found}")]
    UnsupportedVersion { found: u32 },
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    schema_version: u32,
    samples: &'a [Sample],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Versioned {
        schema_version: u32,
        samples: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

/// Result of reading a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub samples: Vec<Sample>,
    /// Layout the samples were read from (0 for the unversioned layout).
    pub version: u32,
    /// Records that did not parse as a sample and were left out.
    pub skipped: usize,
}

/// Serialize the complete sample list in the current layout.
pub fn encode(samples: &[Sample]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DocumentRef {
        schema_version: CURRENT_SCHEMA_VERSION,
        samples,
    })
}

/// Parse either layout. Each record is decoded on its own, so one malformed
/// entry costs only that entry.
pub fn decode(raw: &str) -> Result<Decoded, CodecError> {
    let (records, version) = match serde_json::from_str::<Document>(raw)? {
        Document::Versioned {
            schema_version,
            samples,
        } => {
            if schema_version > CURRENT_SCHEMA_VERSION {
                return Err(CodecError::UnsupportedVersion {
                    found: schema_version,
                });
            }
            (samples, schema_version)
        }
        Document::Legacy(samples) => (samples, 0),
    };

    let total = records.len();
    let samples: Vec<Sample> = records
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect();
    Ok(Decoded {
        skipped: total - samples.len(),
        samples,
        version,
    })
}

/// Accepts `12.34` as well as `"12.34"`.
pub(crate) fn duration_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}
