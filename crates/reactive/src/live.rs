//! Store-bound query and document handles.
//!
//! `LiveQuery` and `LiveDocument` bundle a store, a target and a decoder so
//! one-shot reads and subscriptions share the same setup.

use crate::config::{ConfigError, PaginationConfig};
use crate::count::{subscribe_count, CountSubscription};
use crate::decoder::Decoder;
use crate::fetch::{fetch, fetch_count, fetch_document};
use crate::paginated::{subscribe_paginated, PaginatedSubscription, PaginatedUpdate};
use crate::subscription::{subscribe, subscribe_document, DocumentSubscription, QuerySubscription, QueryUpdate};
use dash_core::{DocumentReference, Query, Result};
use dash_storage::DocumentStore;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A query bound to a store and a decoder.
pub struct LiveQuery<T> {
    store: Arc<dyn DocumentStore>,
    query: Query,
    decoder: Decoder<T>,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            query: self.query.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<T: Send + 'static> LiveQuery<T> {
    pub fn new(store: Arc<dyn DocumentStore>, query: Query, decoder: Decoder<T>) -> Self {
        Self { store, query, decoder }
    }

    /// Returns a handle for a derived query using the same store and decoder.
    pub fn map_query<F>(&self, f: F) -> Self
    where
        F: FnOnce(Query) -> Query,
    {
        Self {
            store: Arc::clone(&self.store),
            query: f(self.query.clone()),
            decoder: self.decoder.clone(),
        }
    }

    /// Reads the query once.
    pub async fn get(&self) -> Result<Vec<T>> {
        fetch(self.store.as_ref(), &self.query, &self.decoder).await
    }

    /// Reads the number of matching documents once.
    pub async fn count(&self) -> Result<usize> {
        fetch_count(self.store.as_ref(), &self.query).await
    }

    pub fn subscribe<F>(&self, on_update: F) -> QuerySubscription<T>
    where
        F: FnMut(Result<QueryUpdate<T>>) + Send + 'static,
    {
        subscribe(Arc::clone(&self.store), self.query.clone(), self.decoder.clone(), on_update)
    }

    pub fn subscribe_count<F>(&self, on_update: F) -> CountSubscription
    where
        F: FnMut(Result<usize>) + Send + 'static,
    {
        subscribe_count(Arc::clone(&self.store), self.query.clone(), on_update)
    }

    /// Subscribes page by page. Panics if `document_count_per_page` is zero.
    pub fn subscribe_paginated<F>(&self, document_count_per_page: usize, on_update: F) -> PaginatedSubscription<T>
    where
        F: FnMut(Result<PaginatedUpdate<T>>) + Send + 'static,
    {
        subscribe_paginated(
            Arc::clone(&self.store),
            self.query.clone(),
            document_count_per_page,
            self.decoder.clone(),
            on_update,
        )
    }

    /// Subscribes page by page with a validated configuration.
    pub fn subscribe_paginated_with<F>(
        &self,
        config: &PaginationConfig,
        on_update: F,
    ) -> core::result::Result<PaginatedSubscription<T>, ConfigError>
    where
        F: FnMut(Result<PaginatedUpdate<T>>) + Send + 'static,
    {
        config.validate()?;
        Ok(self.subscribe_paginated(config.document_count_per_page, on_update))
    }
}

impl<T: DeserializeOwned + Send + 'static> LiveQuery<T> {
    /// Creates a handle decoding documents through serde.
    pub fn decodable(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        Self::new(store, query, Decoder::serde())
    }
}

impl<T> LiveQuery<T> {
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn decoder(&self) -> &Decoder<T> {
        &self.decoder
    }
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery").field("query", &self.query).finish_non_exhaustive()
    }
}

/// A document reference bound to a store and a decoder.
pub struct LiveDocument<T> {
    store: Arc<dyn DocumentStore>,
    reference: DocumentReference,
    decoder: Decoder<T>,
}

impl<T> Clone for LiveDocument<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reference: self.reference.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<T: Send + 'static> LiveDocument<T> {
    pub fn new(store: Arc<dyn DocumentStore>, reference: DocumentReference, decoder: Decoder<T>) -> Self {
        Self {
            store,
            reference,
            decoder,
        }
    }

    /// Reads the document once. `None` when missing or undecodable.
    pub async fn get(&self) -> Result<Option<T>> {
        fetch_document(self.store.as_ref(), &self.reference, &self.decoder).await
    }

    pub fn subscribe<F>(&self, on_update: F) -> DocumentSubscription<T>
    where
        F: FnMut(Result<Option<T>>) + Send + 'static,
    {
        subscribe_document(
            Arc::clone(&self.store),
            self.reference.clone(),
            self.decoder.clone(),
            on_update,
        )
    }
}

impl<T: DeserializeOwned + Send + 'static> LiveDocument<T> {
    pub fn decodable(store: Arc<dyn DocumentStore>, reference: DocumentReference) -> Self {
        Self::new(store, reference, Decoder::serde())
    }
}

impl<T> LiveDocument<T> {
    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }
}

impl<T> fmt::Debug for LiveDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveDocument")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}
