mod engine;
mod snapshot;

pub use engine::HistoryEngine;
pub use snapshot::{HistorySnapshot, SnapshotContent, SnapshotCopy};
