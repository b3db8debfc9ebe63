//! In-memory document store.
//!
//! `MemoryStore` implements the `DocumentStore` boundary over a map of
//! collections. Every listener owns a delivery task fed by an unbounded
//! channel, so pushes reach listeners asynchronously and in write order.
//! Snapshots are enqueued while the store lock is held and listeners are
//! never invoked under it.
//!
//! Listener registration spawns Tokio tasks and must happen inside a Tokio
//! runtime.

use crate::diff::compute_changes;
use crate::store::{DocumentListener, DocumentStore, ListenerRegistration, QueryListener};
use async_trait::async_trait;
use dash_core::{DocumentReference, DocumentSnapshot, Fields, Query, QuerySnapshot, Result, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Unique identifier for a registered listener.
pub type ListenerId = u64;

/// Listener table: HashMap (O(1) lookup) or BTreeMap (ordered by id).
#[cfg(feature = "hash-store")]
type ListenerMap = hashbrown::HashMap<ListenerId, ListenerEntry>;
#[cfg(not(feature = "hash-store"))]
type ListenerMap = BTreeMap<ListenerId, ListenerEntry>;

type Collections = BTreeMap<String, BTreeMap<String, StoredDocument>>;

#[derive(Clone, Debug)]
struct StoredDocument {
    fields: Fields,
    version: u64,
}

enum ListenerEntry {
    Query {
        query: Query,
        last: Vec<DocumentSnapshot>,
        tx: mpsc::UnboundedSender<Result<QuerySnapshot>>,
    },
    Document {
        reference: DocumentReference,
        last: DocumentSnapshot,
        tx: mpsc::UnboundedSender<Result<DocumentSnapshot>>,
    },
}

impl ListenerEntry {
    fn collection(&self) -> &str {
        match self {
            ListenerEntry::Query { query, .. } => query.collection_name(),
            ListenerEntry::Document { reference, .. } => reference.collection(),
        }
    }
}

#[derive(Default)]
struct StoreState {
    collections: Collections,
    listeners: ListenerMap,
    next_listener_id: ListenerId,
    next_document_id: u64,
    next_version: u64,
    listened_queries: Vec<Query>,
    pending_read_failure: Option<StoreError>,
}

impl StoreState {
    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Re-evaluates every listener on `collection` and enqueues a snapshot for
    /// each one whose result changed.
    fn notify(&mut self, collection: &str) {
        let collections = &self.collections;
        for (id, entry) in self.listeners.iter_mut() {
            if entry.collection() != collection {
                continue;
            }
            match entry {
                ListenerEntry::Query { query, last, tx } => {
                    let current = evaluate(collections, query);
                    let changes = compute_changes(last, &current);
                    if changes.is_empty() {
                        continue;
                    }
                    trace!(listener_id = *id, changes = changes.len(), "pushing query snapshot");
                    let snapshot = QuerySnapshot::new(query.clone(), current.clone(), changes);
                    *last = current;
                    let _ = tx.send(Ok(snapshot));
                }
                ListenerEntry::Document { reference, last, tx } => {
                    let current = read_document(collections, reference);
                    if current == *last {
                        continue;
                    }
                    trace!(listener_id = *id, path = %reference, "pushing document snapshot");
                    *last = current.clone();
                    let _ = tx.send(Ok(current));
                }
            }
        }
    }
}

fn read_document(collections: &Collections, reference: &DocumentReference) -> DocumentSnapshot {
    collections
        .get(reference.collection())
        .and_then(|docs| docs.get(reference.id()))
        .map(|stored| DocumentSnapshot::new(reference.clone(), stored.fields.clone(), stored.version))
        .unwrap_or_else(|| DocumentSnapshot::missing(reference.clone()))
}

/// Evaluates a query: filter, sort, then truncate to the limit.
fn evaluate(collections: &Collections, query: &Query) -> Vec<DocumentSnapshot> {
    let Some(docs) = collections.get(query.collection_name()) else {
        return Vec::new();
    };

    let mut matched: Vec<DocumentSnapshot> = docs
        .iter()
        .map(|(id, stored)| {
            DocumentSnapshot::new(
                DocumentReference::new(query.collection_name(), id.as_str()),
                stored.fields.clone(),
                stored.version,
            )
        })
        .filter(|doc| query.matches(doc))
        .collect();

    matched.sort_by(|a, b| query.compare(a, b));
    if let Some(limit) = query.limit_value() {
        matched.truncate(limit);
    }
    matched
}

/// Spawns the delivery task for one listener and returns its inbox.
fn spawn_delivery<E>(
    listener: Box<dyn Fn(Result<E>) + Send + Sync + 'static>,
    active: Arc<AtomicBool>,
) -> mpsc::UnboundedSender<Result<E>>
where
    E: Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<E>>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !active.load(Ordering::Acquire) {
                break;
            }
            listener(event);
        }
    });
    tx
}

struct Inner {
    state: Mutex<StoreState>,
}

/// An in-memory `DocumentStore`.
///
/// Cloning is cheap; clones share the same documents and listeners.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// Creates or replaces a document. Returns the new version.
    pub fn set(&self, reference: &DocumentReference, fields: Fields) -> u64 {
        let mut state = self.inner.state.lock();
        let version = state.bump_version();
        state
            .collections
            .entry(reference.collection().to_string())
            .or_default()
            .insert(reference.id().to_string(), StoredDocument { fields, version });
        state.notify(reference.collection());
        version
    }

    /// Merges fields into an existing document. Returns the new version.
    pub fn merge(&self, reference: &DocumentReference, fields: Fields) -> Result<u64> {
        let mut state = self.inner.state.lock();
        let version = state.bump_version();
        let stored = state
            .collections
            .get_mut(reference.collection())
            .and_then(|docs| docs.get_mut(reference.id()))
            .ok_or_else(|| StoreError::NotFound(reference.path()))?;
        stored.fields.extend(fields);
        stored.version = version;
        state.notify(reference.collection());
        Ok(version)
    }

    /// Adds a document with a generated id.
    pub fn add(&self, collection: &str, fields: Fields) -> DocumentReference {
        let id = {
            let mut state = self.inner.state.lock();
            state.next_document_id += 1;
            format!("doc-{:06}", state.next_document_id)
        };
        let reference = DocumentReference::new(collection, id);
        self.set(&reference, fields);
        reference
    }

    /// Deletes a document. Returns true if it existed.
    pub fn delete(&self, reference: &DocumentReference) -> bool {
        let mut state = self.inner.state.lock();
        let removed = state
            .collections
            .get_mut(reference.collection())
            .and_then(|docs| docs.remove(reference.id()))
            .is_some();
        if removed {
            state.notify(reference.collection());
        }
        removed
    }

    /// Returns the number of documents in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.inner
            .state
            .lock()
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Makes the next one-shot read fail with `error`.
    pub fn fail_next_read(&self, error: StoreError) {
        self.inner.state.lock().pending_read_failure = Some(error);
    }

    /// Pushes `error` to every listener on `collection`.
    pub fn inject_listener_error(&self, collection: &str, error: StoreError) {
        let state = self.inner.state.lock();
        for entry in state.listeners.values() {
            if entry.collection() != collection {
                continue;
            }
            match entry {
                ListenerEntry::Query { tx, .. } => {
                    let _ = tx.send(Err(error.clone()));
                }
                ListenerEntry::Document { tx, .. } => {
                    let _ = tx.send(Err(error.clone()));
                }
            }
        }
    }

    /// Returns the number of registered listeners.
    pub fn active_listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Returns every query a listener was ever registered for, in order.
    pub fn listened_queries(&self) -> Vec<Query> {
        self.inner.state.lock().listened_queries.clone()
    }

    fn read_documents(&self, query: &Query) -> Result<QuerySnapshot> {
        let mut state = self.inner.state.lock();
        if let Some(error) = state.pending_read_failure.take() {
            return Err(error);
        }
        Ok(QuerySnapshot::initial(query.clone(), evaluate(&state.collections, query)))
    }

    fn read_single(&self, reference: &DocumentReference) -> Result<DocumentSnapshot> {
        let mut state = self.inner.state.lock();
        if let Some(error) = state.pending_read_failure.take() {
            return Err(error);
        }
        Ok(read_document(&state.collections, reference))
    }

    fn register(&self, entry: impl FnOnce(&StoreState) -> ListenerEntry, active: Arc<AtomicBool>) -> Box<dyn ListenerRegistration> {
        let mut state = self.inner.state.lock();
        state.next_listener_id += 1;
        let id = state.next_listener_id;
        let entry = entry(&state);
        if let ListenerEntry::Query { query, .. } = &entry {
            state.listened_queries.push(query.clone());
        }
        debug!(listener_id = id, collection = entry.collection(), "registered listener");
        state.listeners.insert(id, entry);

        Box::new(MemoryListenerRegistration {
            id,
            active,
            store: Arc::downgrade(&self.inner),
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot> {
        self.read_documents(query)
    }

    async fn get_document(&self, reference: &DocumentReference) -> Result<DocumentSnapshot> {
        self.read_single(reference)
    }

    fn add_query_listener(&self, query: &Query, listener: QueryListener) -> Box<dyn ListenerRegistration> {
        let active = Arc::new(AtomicBool::new(true));
        let tx = spawn_delivery(listener, Arc::clone(&active));
        self.register(
            |state| {
                let current = evaluate(&state.collections, query);
                let _ = tx.send(Ok(QuerySnapshot::initial(query.clone(), current.clone())));
                ListenerEntry::Query {
                    query: query.clone(),
                    last: current,
                    tx,
                }
            },
            active,
        )
    }

    fn add_document_listener(
        &self,
        reference: &DocumentReference,
        listener: DocumentListener,
    ) -> Box<dyn ListenerRegistration> {
        let active = Arc::new(AtomicBool::new(true));
        let tx = spawn_delivery(listener, Arc::clone(&active));
        self.register(
            |state| {
                let current = read_document(&state.collections, reference);
                let _ = tx.send(Ok(current.clone()));
                ListenerEntry::Document {
                    reference: reference.clone(),
                    last: current,
                    tx,
                }
            },
            active,
        )
    }
}

/// Registration handle returned by `MemoryStore`. Dropping it removes the
/// listener.
struct MemoryListenerRegistration {
    id: ListenerId,
    active: Arc<AtomicBool>,
    store: Weak<Inner>,
}

impl ListenerRegistration for MemoryListenerRegistration {
    fn remove(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            inner.state.lock().listeners.remove(&self.id);
            debug!(listener_id = self.id, "removed listener");
        }
    }
}

impl Drop for MemoryListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}
