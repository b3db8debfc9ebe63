//! Dash Reactive - Live queries, counts and pagination over a document store.
//!
//! This crate turns the raw snapshots pushed by a `DocumentStore` into typed
//! updates. Every live read comes in two flavours: a one-shot fetch and a
//! subscription that keeps delivering until it is released.
//!
//! # Core Concepts
//!
//! - `Decoder`: Maps a raw document to an application type, or skips it
//! - `QuerySubscription` / `DocumentSubscription`: Decoded documents and changes per snapshot
//! - `CountSubscription`: The number of matching documents per snapshot
//! - `PaginatedSubscription`: A query whose limit grows one page at a time
//! - `LiveQuery` / `LiveDocument`: A store, target and decoder bundled together
//!
//! # Lifecycle
//!
//! Subscriptions are created inactive and register their store listener on
//! `activate()` (the `subscribe*` functions do both). `release()` and drop
//! remove the listener; once `release()` returns the handler is not invoked
//! again.
//!
//! # Example
//!
//! ```rust
//! use dash_core::{Direction, DocumentReference, Fields, Query, Value};
//! use dash_reactive::LiveQuery;
//! use dash_storage::MemoryStore;
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     title: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let mut fields = Fields::new();
//! fields.insert("title".into(), Value::from("Kyoto"));
//! store.set(&DocumentReference::new("items", "a"), fields);
//!
//! let items: LiveQuery<Item> = LiveQuery::decodable(
//!     Arc::new(store.clone()),
//!     Query::collection("items").order_by("title", Direction::Ascending),
//! );
//! assert_eq!(items.get().await.unwrap()[0].title, "Kyoto");
//!
//! let paginated = items.subscribe_paginated(20, |update| {
//!     if let Ok(update) = update {
//!         println!("{} items", update.documents.len());
//!     }
//! });
//! paginated.release();
//! # }
//! ```

mod change;
mod config;
mod count;
mod decoder;
mod fetch;
mod lifecycle;
mod live;
mod paginated;
mod subscription;

pub use change::DocumentChange;
pub use config::{ConfigError, PaginationConfig};
pub use count::{subscribe_count, CountSubscription};
pub use decoder::{decode_changes, decode_documents, Decoder};
pub use fetch::{fetch, fetch_count, fetch_document};
pub use live::{LiveDocument, LiveQuery};
pub use paginated::{subscribe_paginated, PageStatus, PaginatedSubscription, PaginatedUpdate};
pub use subscription::{subscribe, subscribe_document, DocumentSubscription, QuerySubscription, QueryUpdate};

// Re-export commonly used types from dependencies
pub use dash_core::{ChangeKind, DocumentReference, DocumentSnapshot, Query, StoreError};
pub use dash_storage::{DocumentStore, MemoryStore};
