//! Graph Adapter layer: the single component permitted to mutate persistent
//! vocabulary state.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryGraphAdapter;
pub use sqlite::SqliteGraphAdapter;
pub use traits::{GraphAdapter, StorageError, StorageResult};
