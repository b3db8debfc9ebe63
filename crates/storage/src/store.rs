//! The document store boundary.
//!
//! The subscription layer only talks to a store through `DocumentStore`.
//! Stores evaluate queries, push snapshots to listeners on their own
//! execution context, and hand back a `ListenerRegistration` per listener.

use async_trait::async_trait;
use dash_core::{DocumentReference, DocumentSnapshot, Query, QuerySnapshot, Result};

/// Callback receiving every snapshot (or error) for a query listener.
pub type QueryListener = Box<dyn Fn(Result<QuerySnapshot>) + Send + Sync + 'static>;

/// Callback receiving every snapshot (or error) for a document listener.
pub type DocumentListener = Box<dyn Fn(Result<DocumentSnapshot>) + Send + Sync + 'static>;

/// A live listener registration.
///
/// `remove()` stops further pushes to the listener. Calling it again has no
/// effect. Pushes already handed to the listener's execution context may
/// still run; callers that need a hard cut-off gate their own delivery.
pub trait ListenerRegistration: Send + Sync {
    /// Removes the listener.
    fn remove(&self);
}

/// A snapshot-based document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Evaluates a query once.
    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot>;

    /// Reads one document once. A missing document is returned as a snapshot
    /// whose `exists()` is false.
    async fn get_document(&self, reference: &DocumentReference) -> Result<DocumentSnapshot>;

    /// Registers a listener that receives the current result immediately and
    /// a new snapshot whenever the result changes.
    fn add_query_listener(&self, query: &Query, listener: QueryListener) -> Box<dyn ListenerRegistration>;

    /// Registers a listener on a single document.
    fn add_document_listener(
        &self,
        reference: &DocumentReference,
        listener: DocumentListener,
    ) -> Box<dyn ListenerRegistration>;
}
