//! Live query and document subscriptions.
//!
//! A subscription is created inactive, registers its store listener on
//! `activate()` and removes it on `release()` or drop. Every snapshot the
//! store pushes is decoded and handed to the update handler on the store's
//! delivery context.

use crate::change::DocumentChange;
use crate::decoder::{decode_changes, decode_documents, Decoder};
use crate::lifecycle::{Delivery, ListenerSlot};
use dash_core::{DocumentReference, Query, QuerySnapshot, Result};
use dash_storage::DocumentStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One decoded query result and its changes.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryUpdate<T> {
    /// Decoded documents in store order.
    pub documents: Vec<T>,
    /// Decoded changes; indices are the store's.
    pub changes: Vec<DocumentChange<T>>,
}

impl<T: 'static> QueryUpdate<T> {
    /// Decodes a store snapshot.
    pub fn from_snapshot(snapshot: &QuerySnapshot, decoder: &Decoder<T>) -> Self {
        Self {
            documents: decode_documents(snapshot.documents(), decoder),
            changes: decode_changes(snapshot.changes(), decoder),
        }
    }
}

/// A live subscription to a query.
pub struct QuerySubscription<T> {
    store: Arc<dyn DocumentStore>,
    query: Query,
    decoder: Decoder<T>,
    delivery: Arc<Delivery<QueryUpdate<T>>>,
    slot: ListenerSlot,
}

impl<T: Send + 'static> QuerySubscription<T> {
    /// Creates an inactive subscription.
    pub fn new<F>(store: Arc<dyn DocumentStore>, query: Query, decoder: Decoder<T>, on_update: F) -> Self
    where
        F: FnMut(Result<QueryUpdate<T>>) + Send + 'static,
    {
        Self {
            store,
            query,
            decoder,
            delivery: Arc::new(Delivery::new(Box::new(on_update))),
            slot: ListenerSlot::new(),
        }
    }

    /// Registers the store listener. Does nothing if already active or
    /// released.
    pub fn activate(&self) {
        let registered = self.slot.activate(|| {
            let delivery = Arc::clone(&self.delivery);
            let decoder = self.decoder.clone();
            let collection = self.query.collection_name().to_string();
            self.store.add_query_listener(
                &self.query,
                Box::new(move |result| {
                    if delivery.is_closed() {
                        return;
                    }
                    let update = match result {
                        Ok(snapshot) => Ok(QueryUpdate::from_snapshot(&snapshot, &decoder)),
                        Err(error) => {
                            warn!(%collection, %error, "query listener failed");
                            Err(error)
                        }
                    };
                    delivery.deliver(update);
                }),
            )
        });
        if registered {
            debug!(collection = self.query.collection_name(), limit = ?self.query.limit_value(), "query subscription active");
        }
    }
}

impl<T> QuerySubscription<T> {
    /// Stops the subscription. After this returns the handler is not invoked
    /// again. Calling it again has no effect.
    pub fn release(&self) {
        let closed = self.delivery.close();
        if self.slot.release() {
            debug!(collection = self.query.collection_name(), "query subscription released");
        } else if closed {
            debug!(collection = self.query.collection_name(), "inactive query subscription released");
        }
    }

    /// Returns true between `activate()` and `release()`.
    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    /// Returns the subscribed query.
    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for QuerySubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("query", &self.query)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A live subscription to a single document.
///
/// The handler receives `Ok(None)` while the document is missing or does
/// not decode.
pub struct DocumentSubscription<T> {
    store: Arc<dyn DocumentStore>,
    reference: DocumentReference,
    decoder: Decoder<T>,
    delivery: Arc<Delivery<Option<T>>>,
    slot: ListenerSlot,
}

impl<T: Send + 'static> DocumentSubscription<T> {
    /// Creates an inactive subscription.
    pub fn new<F>(store: Arc<dyn DocumentStore>, reference: DocumentReference, decoder: Decoder<T>, on_update: F) -> Self
    where
        F: FnMut(Result<Option<T>>) + Send + 'static,
    {
        Self {
            store,
            reference,
            decoder,
            delivery: Arc::new(Delivery::new(Box::new(on_update))),
            slot: ListenerSlot::new(),
        }
    }

    /// Registers the store listener. Does nothing if already active or
    /// released.
    pub fn activate(&self) {
        let registered = self.slot.activate(|| {
            let delivery = Arc::clone(&self.delivery);
            let decoder = self.decoder.clone();
            let path = self.reference.path();
            self.store.add_document_listener(
                &self.reference,
                Box::new(move |result| {
                    if delivery.is_closed() {
                        return;
                    }
                    let update = match result {
                        Ok(snapshot) if snapshot.exists() => Ok(decoder.decode(&snapshot)),
                        Ok(_) => Ok(None),
                        Err(error) => {
                            warn!(%path, %error, "document listener failed");
                            Err(error)
                        }
                    };
                    delivery.deliver(update);
                }),
            )
        });
        if registered {
            debug!(path = %self.reference, "document subscription active");
        }
    }
}

impl<T> DocumentSubscription<T> {
    /// Stops the subscription. After this returns the handler is not invoked
    /// again.
    pub fn release(&self) {
        self.delivery.close();
        if self.slot.release() {
            debug!(path = %self.reference, "document subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }
}

impl<T> Drop for DocumentSubscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for DocumentSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSubscription")
            .field("reference", &self.reference)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Creates and activates a query subscription.
pub fn subscribe<T, F>(store: Arc<dyn DocumentStore>, query: Query, decoder: Decoder<T>, on_update: F) -> QuerySubscription<T>
where
    T: Send + 'static,
    F: FnMut(Result<QueryUpdate<T>>) + Send + 'static,
{
    let subscription = QuerySubscription::new(store, query, decoder, on_update);
    subscription.activate();
    subscription
}

/// Creates and activates a document subscription.
pub fn subscribe_document<T, F>(
    store: Arc<dyn DocumentStore>,
    reference: DocumentReference,
    decoder: Decoder<T>,
    on_update: F,
) -> DocumentSubscription<T>
where
    T: Send + 'static,
    F: FnMut(Result<Option<T>>) + Send + 'static,
{
    let subscription = DocumentSubscription::new(store, reference, decoder, on_update);
    subscription.activate();
    subscription
}
