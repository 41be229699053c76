//! Decision audit records and sinks.

use std::collections::VecDeque;
use std::path::Path;

use bourse_core::AccountId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistenceResult;
use crate::writer::JsonLinesWriter;

/// One agent's decision in one round.
///
/// Nested payloads are stored as JSON so the log stays readable without the
/// crates that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub round_id: String,
    pub recorded_at: DateTime<Utc>,
    pub account_id: AccountId,
    pub persona_name: String,
    /// Persona as configured at decision time.
    pub persona: Value,
    /// Cash, positions and quotes the decision was made from.
    pub snapshot: Option<Value>,
    /// Clamped policy proposal before narration.
    pub proposed: Option<Value>,
    pub decision: Value,
    pub raw_reasoning: Option<String>,
    /// Narration fallback reason, if any.
    pub fallback: Option<String>,
    /// `cooldown`, `held`, `executed` or `failed`.
    pub outcome: String,
    /// Trade receipt when executed.
    pub execution: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
}

/// Destination for decision records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: DecisionRecord) -> PersistenceResult<()>;

    /// Push buffered records to durable storage.
    fn flush(&self) -> PersistenceResult<()> {
        Ok(())
    }
}

/// Daily-rotated JSON Lines audit log.
pub struct JsonLinesAuditLog {
    writer: Mutex<JsonLinesWriter<DecisionRecord>>,
}

impl JsonLinesAuditLog {
    pub fn new(dir: impl AsRef<Path>, buffer_size: usize) -> Self {
        Self {
            writer: Mutex::new(JsonLinesWriter::new(dir, "decisions", buffer_size)),
        }
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn record(&self, record: DecisionRecord) -> PersistenceResult<()> {
        self.writer.lock().add_record(record)
    }

    fn flush(&self) -> PersistenceResult<()> {
        self.writer.lock().flush()
    }
}

/// Bounded in-memory audit log, newest last.
pub struct MemoryAuditLog {
    records: Mutex<VecDeque<DecisionRecord>>,
    capacity: usize,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Last `n` records, newest last.
    pub fn recent(&self, n: usize) -> Vec<DecisionRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn for_account(&self, account_id: &AccountId) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| &r.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: DecisionRecord) -> PersistenceResult<()> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

/// Fan out to several sinks; every sink is attempted, the first error wins.
impl AuditSink for Vec<std::sync::Arc<dyn AuditSink>> {
    fn record(&self, record: DecisionRecord) -> PersistenceResult<()> {
        let mut result = Ok(());
        for sink in self {
            if let Err(e) = sink.record(record.clone()) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn flush(&self) -> PersistenceResult<()> {
        let mut result = Ok(());
        for sink in self {
            if let Err(e) = sink.flush() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
