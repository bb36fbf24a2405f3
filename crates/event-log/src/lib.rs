//! Durable, partitioned, append-only log.
//!
//! Records are appended to a topic and routed to a partition by key, so
//! all records with the same key keep their relative order. Consumer
//! groups track a committed offset per partition and read at-least-once.
//! Records a consumer cannot handle are parked in a dead-letter list.

pub mod error;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod record;

pub use error::{EventLogError, Result};
pub use log::{EventLog, EventLogExt};
pub use memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;
pub use record::{DeadLetter, Record, RecordPosition, partition_for};
