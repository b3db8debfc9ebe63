//! Live document counts.

use crate::lifecycle::{Delivery, ListenerSlot};
use dash_core::{Query, Result};
use dash_storage::DocumentStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A live subscription to the number of documents matching a query.
///
/// Counts every document in the store's result, including ones an
/// application decoder would reject.
pub struct CountSubscription {
    store: Arc<dyn DocumentStore>,
    query: Query,
    delivery: Arc<Delivery<usize>>,
    slot: ListenerSlot,
}

impl CountSubscription {
    /// Creates an inactive subscription.
    pub fn new<F>(store: Arc<dyn DocumentStore>, query: Query, on_update: F) -> Self
    where
        F: FnMut(Result<usize>) + Send + 'static,
    {
        Self {
            store,
            query,
            delivery: Arc::new(Delivery::new(Box::new(on_update))),
            slot: ListenerSlot::new(),
        }
    }

    /// Registers the store listener. Does nothing if already active or
    /// released.
    pub fn activate(&self) {
        let registered = self.slot.activate(|| {
            let delivery = Arc::clone(&self.delivery);
            let collection = self.query.collection_name().to_string();
            self.store.add_query_listener(
                &self.query,
                Box::new(move |result| {
                    if delivery.is_closed() {
                        return;
                    }
                    let update = result.map(|snapshot| snapshot.count()).map_err(|error| {
                        warn!(%collection, %error, "count listener failed");
                        error
                    });
                    delivery.deliver(update);
                }),
            )
        });
        if registered {
            debug!(collection = self.query.collection_name(), "count subscription active");
        }
    }

    /// Stops the subscription. After this returns the handler is not invoked
    /// again.
    pub fn release(&self) {
        self.delivery.close();
        if self.slot.release() {
            debug!(collection = self.query.collection_name(), "count subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl Drop for CountSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CountSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountSubscription")
            .field("query", &self.query)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Creates and activates a count subscription.
pub fn subscribe_count<F>(store: Arc<dyn DocumentStore>, query: Query, on_update: F) -> CountSubscription
where
    F: FnMut(Result<usize>) + Send + 'static,
{
    let subscription = CountSubscription::new(store, query, on_update);
    subscription.activate();
    subscription
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{DocumentReference, Fields, StoreError, Value};
    use dash_storage::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn status(value: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("status".into(), Value::from(value));
        fields
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Result<usize>>) -> Result<usize> {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for count")
            .expect("count channel closed")
    }

    #[tokio::test]
    async fn test_count_subscription_tracks_matches() {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        store.set(&DocumentReference::new("orders", "a"), status("open"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = subscribe_count(shared, Query::collection("orders").where_eq("status", "open"), move |count| {
            let _ = tx.send(count);
        });

        assert_eq!(next(&mut rx).await.unwrap(), 1);

        store.set(&DocumentReference::new("orders", "b"), status("open"));
        assert_eq!(next(&mut rx).await.unwrap(), 2);

        store.set(&DocumentReference::new("orders", "a"), status("closed"));
        assert_eq!(next(&mut rx).await.unwrap(), 1);

        store.inject_listener_error("orders", StoreError::unavailable("offline"));
        assert!(next(&mut rx).await.is_err());
    }

    #[tokio::test]
    async fn test_count_subscription_release() {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe_count(shared, Query::collection("orders"), move |count| {
            let _ = tx.send(count);
        });
        assert_eq!(next(&mut rx).await.unwrap(), 0);

        subscription.release();
        store.set(&DocumentReference::new("orders", "a"), status("open"));
        let received = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(received, Err(_) | Ok(None)));
        assert!(!subscription.is_active());
    }
}
