//! Dash Core - Document, query and snapshot types for the Dash live query layer.
//!
//! This crate provides the value types shared by the store boundary and the
//! subscription layer:
//!
//! - `Value`: Field values stored in documents
//! - `DocumentReference` / `DocumentSnapshot`: A document address and one read of it
//! - `Query`: Filters, ordering and an optional limit over a collection
//! - `QuerySnapshot` / `RawDocumentChange` / `ChangeKind`: One query result and its delta
//! - `StoreError` / `DecodeError`: Error types
//!
//! # Example
//!
//! ```rust
//! use dash_core::{Direction, DocumentReference, DocumentSnapshot, Fields, Query, Value};
//!
//! let query = Query::collection("items")
//!     .order_by("creationDate", Direction::Descending)
//!     .limit(20);
//!
//! let mut fields = Fields::new();
//! fields.insert("creationDate".into(), Value::Timestamp(1_644_710_400_000));
//! let doc = DocumentSnapshot::new(DocumentReference::new("items", "a"), fields, 1);
//!
//! assert!(query.matches(&doc));
//! assert_eq!(query.limit_value(), Some(20));
//! ```

mod document;
mod error;
mod query;
mod snapshot;
mod value;

pub use document::{DocumentReference, DocumentSnapshot, Fields};
pub use error::{DecodeError, Result, StoreError};
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};
pub use snapshot::{ChangeKind, QuerySnapshot, RawDocumentChange};
pub use value::Value;
