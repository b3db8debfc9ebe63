//! One-shot reads.

use crate::decoder::{decode_documents, Decoder};
use dash_core::{DocumentReference, Query, Result};
use dash_storage::DocumentStore;
use tracing::{trace, warn};

/// Reads the query once and decodes the result, dropping documents that
/// fail to decode.
pub async fn fetch<T: 'static>(store: &dyn DocumentStore, query: &Query, decoder: &Decoder<T>) -> Result<Vec<T>> {
    let snapshot = store.get_documents(query).await.map_err(|error| {
        warn!(collection = query.collection_name(), %error, "query read failed");
        error
    })?;
    let documents = decode_documents(snapshot.documents(), decoder);
    trace!(
        collection = query.collection_name(),
        read = snapshot.count(),
        decoded = documents.len(),
        "fetched query"
    );
    Ok(documents)
}

/// Reads one document once. Returns `None` when it is missing or does not
/// decode.
pub async fn fetch_document<T: 'static>(
    store: &dyn DocumentStore,
    reference: &DocumentReference,
    decoder: &Decoder<T>,
) -> Result<Option<T>> {
    let snapshot = store.get_document(reference).await.map_err(|error| {
        warn!(path = %reference, %error, "document read failed");
        error
    })?;
    if !snapshot.exists() {
        return Ok(None);
    }
    Ok(decoder.decode(&snapshot))
}

/// Reads the query once and returns the number of matching documents,
/// decodable or not.
pub async fn fetch_count(store: &dyn DocumentStore, query: &Query) -> Result<usize> {
    let snapshot = store.get_documents(query).await?;
    Ok(snapshot.count())
}
