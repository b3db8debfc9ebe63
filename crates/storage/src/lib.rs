//! Dash Storage - Document store boundary for the Dash live query layer.
//!
//! This crate provides:
//!
//! - `DocumentStore`: One-shot reads and snapshot listeners
//! - `ListenerRegistration`: Handle removing a listener
//! - `compute_changes`: Diff between two ordered result sets
//! - `MemoryStore`: In-memory store implementing the boundary
//!
//! # Example
//!
//! ```rust
//! use dash_core::{Direction, DocumentReference, Fields, Query, Value};
//! use dash_storage::{DocumentStore, MemoryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let mut fields = Fields::new();
//! fields.insert("order".into(), Value::Int64(1));
//! store.set(&DocumentReference::new("items", "a"), fields);
//!
//! let query = Query::collection("items").order_by("order", Direction::Ascending);
//! let snapshot = store.get_documents(&query).await.unwrap();
//! assert_eq!(snapshot.count(), 1);
//! # }
//! ```

pub mod diff;
pub mod memory;
pub mod store;

pub use diff::compute_changes;
pub use memory::{ListenerId, MemoryStore};
pub use store::{DocumentListener, DocumentStore, ListenerRegistration, QueryListener};
