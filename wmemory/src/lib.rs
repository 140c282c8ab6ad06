//! Durable transcript storage for windlass chat sessions.
//!
//! ```rust
//! use wmemory::SqliteTranscriptStore;
//!
//! let store = SqliteTranscriptStore::new_in_memory().expect("open in-memory store");
//! let _ = store;
//! ```

mod error;
mod store;

pub use error::{MemoryError, MemoryErrorKind};
pub use store::SqliteTranscriptStore;
