//! flowindex-storage: graph store backends for FlowIndex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Every backend implements [`GraphStore`](flowindex_core::GraphStore) and
//! ships a matching [`StoreConnector`](flowindex_core::StoreConnector) so the
//! supervisor can open a fresh handle per attempt.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{InMemoryConnector, InMemoryGraphStore, StoredGraph};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnector, SqliteGraphStore};
