//! Deterministic intent signature over a job's stable subset.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::Job;

/// `signature(job) = hex(SHA-256(canonical(stable(job))))`.
pub fn signature(job: &Job) -> String {
    let canonical = canonicalize(&job.stable_subset());
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// First 8 hex characters, for human-facing logs and audit details.
pub fn short_signature(full: &str) -> &str {
    &full[..8.min(full.len())]
}

/// Serializes `value` with object keys sorted lexicographically at every
/// depth, arrays preserved in input order. `serde_json::Value::Object`
/// is backed by a `BTreeMap` when the `preserve_order` feature is off,
/// so re-walking and re-inserting into a fresh `Map` guarantees sorted
/// emission regardless of how the value was built.
fn canonicalize(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("canonicalized value always serializes")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
