//! Append-only audit trail. Writes JSON Lines (one event per line) with a
//! sha256 hash chain: each event carries hash_prev + hash_self, so any edit
//! or deletion inside the file breaks verification from that line onward.
//!
//! Recording is best-effort from the caller's point of view. The engine emits
//! events after a transaction commits and logs a warning if the sink fails;
//! the committed operation stands either way.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::fingerprint::{canonical_json, sha256_hex};

/// One audit fact: who did what to which entity, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub actor_id: Uuid,
    pub firm_id: Uuid,
    pub metadata: Value,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditEvent {
    event_id: Uuid,
    seq: u64,
    #[serde(flatten)]
    record: AuditRecord,
    hash_prev: Option<String>,
    hash_self: Option<String>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Sink for contexts that have nowhere to write (unit tests, dry runs).
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

struct ChainState {
    last_hash: Option<String>,
    seq: u64,
}

/// File-backed sink. Event ids are derived deterministically from chain
/// state + record content + seq, so identical logs replay to identical ids.
pub struct JsonlAuditSink {
    path: PathBuf,
    state: Mutex<ChainState>,
}

impl JsonlAuditSink {
    /// Creates the sink and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self {
            path,
            state: Mutex::new(ChainState {
                last_hash: None,
                seq: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let event_id = derive_event_id(state.last_hash.as_deref(), record, state.seq)?;
        let mut ev = AuditEvent {
            event_id,
            seq: state.seq,
            record: record.clone(),
            hash_prev: state.last_hash.clone(),
            hash_self: None,
        };

        let self_hash = compute_event_hash(&ev)?;
        ev.hash_self = Some(self_hash.clone());

        let line = canonical_json(&ev)?;
        append_line(&self.path, &line)?;

        state.last_hash = Some(self_hash);
        state.seq += 1;
        Ok(())
    }
}

/// Event id = uuid-v5 of (hash_prev, seq, canonical record). No RNG, so a
/// replayed log yields the same ids.
fn derive_event_id(hash_prev: Option<&str>, record: &AuditRecord, seq: u64) -> Result<Uuid> {
    let mut name = String::new();
    name.push_str(hash_prev.unwrap_or("genesis"));
    name.push(':');
    name.push_str(&seq.to_string());
    name.push(':');
    name.push_str(&canonical_json(record)?);
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

/// Hash is computed over canonical JSON of the event WITHOUT hash_self, to
/// avoid self-reference.
fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;
    Ok(sha256_hex(canonical_json(&clone)?.as_bytes()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerify {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given line.
    Broken { line: usize, reason: String },
}

/// Verify the hash chain integrity of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<ChainVerify> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;

    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;
        line_count += 1;

        if ev.hash_prev != prev_hash {
            return Ok(ChainVerify::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed != recomputed {
                return Ok(ChainVerify::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(ChainVerify::Valid { lines: line_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record(action: &str) -> AuditRecord {
        AuditRecord {
            action: action.to_string(),
            entity_type: "pay_run".to_string(),
            entity_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            firm_id: Uuid::new_v4(),
            metadata: json!({"run_number": 1}),
            ts_utc: Utc::now(),
        }
    }

    #[test]
    fn chain_over_multiple_events_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path).unwrap();
        for action in ["reconciliation.run", "pay_run.submit", "pack.generate"] {
            sink.record(&sample_record(action)).unwrap();
        }
        assert_eq!(
            verify_hash_chain(&path).unwrap(),
            ChainVerify::Valid { lines: 3 }
        );
    }

    #[test]
    fn tampered_line_breaks_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path).unwrap();
        sink.record(&sample_record("pay_run.submit")).unwrap();
        sink.record(&sample_record("pay_run.approve")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("pay_run.submit", "pay_run.unlock", 1);
        fs::write(&path, tampered).unwrap();

        match verify_hash_chain(&path).unwrap() {
            ChainVerify::Broken { line, .. } => assert_eq!(line, 1),
            other => panic!("expected broken chain, got {other:?}"),
        }
    }

    #[test]
    fn event_ids_are_deterministic_for_identical_content() {
        let rec = sample_record("pay_run.submit");
        let a = derive_event_id(None, &rec, 0).unwrap();
        let b = derive_event_id(None, &rec, 0).unwrap();
        assert_eq!(a, b);
        let c = derive_event_id(None, &rec, 1).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullAuditSink.record(&sample_record("noop")).unwrap();
    }
}
