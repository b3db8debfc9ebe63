//! Paginated live subscriptions.
//!
//! A paginated subscription keeps one live query subscription whose limit is
//! `document_count_per_page * current_page`. Advancing a page replaces the
//! underlying subscription with one for the larger limit; every update the
//! application sees covers pages `1..=current_page`.
//!
//! All page state is owned by a Tokio task. Handles talk to it through a
//! command channel, so page requests and store updates are applied one at a
//! time in arrival order. Updates from a replaced subscription are tagged
//! with a generation number and discarded.

use crate::change::DocumentChange;
use crate::decoder::Decoder;
use crate::lifecycle::Delivery;
use crate::subscription::{QuerySubscription, QueryUpdate};
use dash_core::{Query, Result};
use dash_storage::DocumentStore;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// One update of a paginated subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginatedUpdate<T> {
    /// Decoded documents of every page loaded so far.
    pub documents: Vec<T>,
    /// Decoded changes against the previous update for the same page. The
    /// first update after a page request reports every document as added.
    pub changes: Vec<DocumentChange<T>>,
    /// True for the first update after a page was requested.
    pub is_caused_by_pagination: bool,
}

/// Observable pagination state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageStatus {
    /// Pages requested so far.
    pub current_page: usize,
    /// True between a page request and the first update for it.
    pub is_loading_new_page: bool,
    /// Number of decoded documents in the last successful update.
    pub last_document_count: Option<usize>,
    /// Limit of the live query, if any page was requested.
    pub current_limit: Option<usize>,
}

enum PageCommand<T> {
    IncrementPage { reply: Option<oneshot::Sender<bool>> },
    Update { generation: u64, result: Result<QueryUpdate<T>> },
    Status { reply: oneshot::Sender<PageStatus> },
    Release,
}

struct PageActor<T> {
    store: Arc<dyn DocumentStore>,
    query: Query,
    document_count_per_page: usize,
    decoder: Decoder<T>,
    delivery: Arc<Delivery<PaginatedUpdate<T>>>,
    commands: mpsc::WeakUnboundedSender<PageCommand<T>>,
    current_page: usize,
    is_loading_new_page: bool,
    last_document_count: Option<usize>,
    current: Option<QuerySubscription<T>>,
    generation: u64,
}

impl<T: Send + 'static> PageActor<T> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PageCommand<T>>) {
        while let Some(command) = commands.recv().await {
            match command {
                PageCommand::IncrementPage { reply } => {
                    let advanced = self.increment_page();
                    if let Some(reply) = reply {
                        let _ = reply.send(advanced);
                    }
                }
                PageCommand::Update { generation, result } => self.handle_update(generation, result),
                PageCommand::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                PageCommand::Release => break,
            }
        }
        if let Some(subscription) = self.current.take() {
            subscription.release();
        }
        debug!(
            collection = self.query.collection_name(),
            page = self.current_page,
            "paginated subscription stopped"
        );
    }

    fn is_next_page_available(&self) -> bool {
        match self.last_document_count {
            None => true,
            Some(count) => count >= self.limit_for(self.current_page),
        }
    }

    fn limit_for(&self, page: usize) -> usize {
        debug_assert!(
            self.document_count_per_page.checked_mul(page).is_some(),
            "page limit overflow"
        );
        self.document_count_per_page.saturating_mul(page)
    }

    fn status(&self) -> PageStatus {
        PageStatus {
            current_page: self.current_page,
            is_loading_new_page: self.is_loading_new_page,
            last_document_count: self.last_document_count,
            current_limit: (self.current_page > 0).then(|| self.limit_for(self.current_page)),
        }
    }

    fn increment_page(&mut self) -> bool {
        if self.delivery.is_closed() {
            return false;
        }
        if !self.is_next_page_available() {
            debug!(
                page = self.current_page,
                last_document_count = ?self.last_document_count,
                "no further page to load"
            );
            return false;
        }

        self.current_page += 1;
        self.is_loading_new_page = true;
        self.generation += 1;

        if let Some(previous) = self.current.take() {
            previous.release();
        }

        let limit = self.limit_for(self.current_page);
        let generation = self.generation;
        let commands = self.commands.clone();
        let subscription = QuerySubscription::new(
            Arc::clone(&self.store),
            self.query.clone().limit(limit),
            self.decoder.clone(),
            move |result| {
                if let Some(commands) = commands.upgrade() {
                    let _ = commands.send(PageCommand::Update { generation, result });
                }
            },
        );
        subscription.activate();
        self.current = Some(subscription);

        debug!(
            collection = self.query.collection_name(),
            page = self.current_page,
            limit,
            "loading page"
        );
        true
    }

    fn handle_update(&mut self, generation: u64, result: Result<QueryUpdate<T>>) {
        if generation != self.generation {
            trace!(generation, current = self.generation, "discarding update from replaced page");
            return;
        }
        match result {
            Ok(QueryUpdate { documents, changes }) => {
                let is_caused_by_pagination = self.is_loading_new_page;
                self.is_loading_new_page = false;
                self.last_document_count = Some(documents.len());
                trace!(
                    page = self.current_page,
                    documents = documents.len(),
                    changes = changes.len(),
                    is_caused_by_pagination,
                    "page update"
                );
                self.delivery.deliver(Ok(PaginatedUpdate {
                    documents,
                    changes,
                    is_caused_by_pagination,
                }));
            }
            Err(error) => {
                debug!(page = self.current_page, %error, "forwarding page error");
                self.delivery.deliver(Err(error));
            }
        }
    }
}

/// A live subscription that grows its limit one page at a time.
///
/// Created by [`subscribe_paginated`]. Dropping the handle releases it.
pub struct PaginatedSubscription<T> {
    query: Query,
    document_count_per_page: usize,
    commands: mpsc::UnboundedSender<PageCommand<T>>,
    delivery: Arc<Delivery<PaginatedUpdate<T>>>,
}

impl<T: Send + 'static> PaginatedSubscription<T> {
    /// Spawns the page task with no page requested yet.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `document_count_per_page` is zero.
    pub fn new<F>(
        store: Arc<dyn DocumentStore>,
        query: Query,
        document_count_per_page: usize,
        decoder: Decoder<T>,
        on_update: F,
    ) -> Self
    where
        F: FnMut(Result<PaginatedUpdate<T>>) + Send + 'static,
    {
        assert!(document_count_per_page > 0, "document_count_per_page must be positive");

        let (commands, inbox) = mpsc::unbounded_channel();
        let delivery: Arc<Delivery<PaginatedUpdate<T>>> = Arc::new(Delivery::new(Box::new(on_update)));
        let actor = PageActor {
            store,
            query: query.clone(),
            document_count_per_page,
            decoder,
            delivery: Arc::clone(&delivery),
            commands: commands.downgrade(),
            current_page: 0,
            is_loading_new_page: false,
            last_document_count: None,
            current: None,
            generation: 0,
        };
        tokio::spawn(actor.run(inbox));

        Self {
            query,
            document_count_per_page,
            commands,
            delivery,
        }
    }

    /// Requests the next page and waits until the request was applied.
    ///
    /// Returns false when the last update showed fewer documents than the
    /// current limit, or the subscription was released.
    pub async fn increment_page(&self) -> bool {
        let (reply, response) = oneshot::channel();
        if self
            .commands
            .send(PageCommand::IncrementPage { reply: Some(reply) })
            .is_err()
        {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Requests the next page without waiting. Safe to call from inside the
    /// update handler.
    pub fn request_next_page(&self) {
        let _ = self.commands.send(PageCommand::IncrementPage { reply: None });
    }

    /// Returns the current page state, or `None` once released.
    pub async fn status(&self) -> Option<PageStatus> {
        let (reply, response) = oneshot::channel();
        self.commands.send(PageCommand::Status { reply }).ok()?;
        response.await.ok()
    }
}

impl<T> PaginatedSubscription<T> {
    /// Stops the subscription. After this returns the handler is not invoked
    /// again; the store listener is removed by the page task shortly after.
    pub fn release(&self) {
        if self.delivery.close() {
            let _ = self.commands.send(PageCommand::Release);
            debug!(collection = self.query.collection_name(), "paginated subscription released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.delivery.is_closed()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn document_count_per_page(&self) -> usize {
        self.document_count_per_page
    }
}

impl<T> Drop for PaginatedSubscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for PaginatedSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedSubscription")
            .field("query", &self.query)
            .field("document_count_per_page", &self.document_count_per_page)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Creates a paginated subscription and requests its first page.
///
/// Any limit on `query` is replaced by the page limit.
pub fn subscribe_paginated<T, F>(
    store: Arc<dyn DocumentStore>,
    query: Query,
    document_count_per_page: usize,
    decoder: Decoder<T>,
    on_update: F,
) -> PaginatedSubscription<T>
where
    T: Send + 'static,
    F: FnMut(Result<PaginatedUpdate<T>>) + Send + 'static,
{
    let subscription = PaginatedSubscription::new(store, query, document_count_per_page, decoder, on_update);
    subscription.request_next_page();
    subscription
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{Direction, DocumentReference, Fields, Value};
    use dash_storage::MemoryStore;
    use std::time::Duration;
    use tokio::time::timeout;

    fn seed(store: &MemoryStore, count: i64) {
        for order in 0..count {
            let mut fields = Fields::new();
            fields.insert("order".into(), Value::Int64(order));
            store.set(&DocumentReference::new("items", format!("item-{order:02}")), fields);
        }
    }

    fn items() -> Query {
        Query::collection("items").order_by("order", Direction::Ascending)
    }

    fn ids() -> Decoder<String> {
        Decoder::new(|doc| Some(doc.id().to_string()))
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Result<PaginatedUpdate<String>>>) -> PaginatedUpdate<String> {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for page")
            .expect("page channel closed")
            .expect("page update failed")
    }

    #[tokio::test]
    async fn test_first_page_requested_on_subscribe() {
        let store = MemoryStore::new();
        seed(&store, 5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe_paginated(Arc::new(store.clone()), items(), 2, ids(), move |update| {
            let _ = tx.send(update);
        });

        let first = next(&mut rx).await;
        assert_eq!(first.documents, vec!["item-00", "item-01"]);
        assert!(first.is_caused_by_pagination);

        let status = subscription.status().await.unwrap();
        assert_eq!(
            status,
            PageStatus {
                current_page: 1,
                is_loading_new_page: false,
                last_document_count: Some(2),
                current_limit: Some(2),
            }
        );
    }

    #[tokio::test]
    async fn test_new_without_request_stays_idle() {
        let store = MemoryStore::new();
        seed(&store, 3);
        let subscription = PaginatedSubscription::new(Arc::new(store.clone()), items(), 2, ids(), |_| {});

        let status = subscription.status().await.unwrap();
        assert_eq!(status.current_page, 0);
        assert_eq!(status.current_limit, None);
        assert_eq!(store.active_listener_count(), 0);
    }

    #[tokio::test]
    async fn test_status_none_after_release() {
        let store = MemoryStore::new();
        let subscription = subscribe_paginated(Arc::new(store), items(), 2, ids(), |_| {});
        subscription.release();

        assert!(subscription.is_released());
        assert!(!subscription.increment_page().await);
        assert_eq!(subscription.status().await, None);
    }

    #[tokio::test]
    #[should_panic(expected = "document_count_per_page must be positive")]
    async fn test_zero_page_size_panics() {
        let _ = PaginatedSubscription::new(Arc::new(MemoryStore::new()), items(), 0, ids(), |_| {});
    }
}
