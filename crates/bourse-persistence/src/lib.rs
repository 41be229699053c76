//! Decision audit log persistence for bourse.
//!
//! Every scheduler decision is recorded as one JSON line in a daily file
//! (`decisions_YYYY-MM-DD.jsonl`), opened in append mode so interrupted
//! writes only ever damage a single line.
//!
//! # Key Components
//!
//! - [`JsonLinesWriter`]: buffered, date-rotated JSON Lines writer
//! - [`DecisionRecord`]: one audit entry per agent per round
//! - [`AuditSink`]: where records go; [`JsonLinesAuditLog`] and [`MemoryAuditLog`]

pub mod audit;
pub mod error;
pub mod writer;

pub use audit::{AuditSink, DecisionRecord, JsonLinesAuditLog, MemoryAuditLog};
pub use error::{PersistenceError, PersistenceResult};
pub use writer::JsonLinesWriter;
