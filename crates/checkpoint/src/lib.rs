//! Checkpoint stores for Librarian.
//!
//! Implements the `CheckpointStore` trait from librarian-core:
//! - **In-memory** (default, process lifetime)
//! - **File** (one JSON document per thread, human-inspectable)

pub mod file_store;
pub mod in_memory;

pub use file_store::FileCheckpointStore;
pub use in_memory::InMemoryCheckpointStore;
