//! supercat-ingest: statement table CSV reader/writer and resume checkpoints.

pub mod checkpoint;
pub mod table;

pub use checkpoint::{Checkpoint, CheckpointEntry};
pub use table::{ColumnMap, LedgerTable};
