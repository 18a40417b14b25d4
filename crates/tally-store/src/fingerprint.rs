//! Canonical JSON + sha256 helpers. Anything hashed or required to be
//! byte-identical across runs goes through [`canonical_json`] first.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tally_domain::NormalizedImport;

/// Serialize with recursively sorted object keys, compact form. One value,
/// one stable byte string.
pub fn canonical_json<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize for canonical json failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("canonical json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable fingerprint of a normalized import - embedded in pack metadata so
/// a locked pack pins the exact input data it was produced from.
pub fn import_fingerprint(import: &NormalizedImport) -> Result<String> {
    Ok(sha256_hex(canonical_json(import)?.as_bytes()))
}
