//! Document decoders.
//!
//! A `Decoder<T>` turns a raw `DocumentSnapshot` into an application type.
//! Decoding is partial: a document that cannot be represented yields `None`
//! and is dropped from the typed result without affecting the rest of the
//! snapshot.

use crate::change::DocumentChange;
use dash_core::{DecodeError, DocumentSnapshot, RawDocumentChange};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

type DecodeFn<T> = dyn Fn(&DocumentSnapshot) -> Option<T> + Send + Sync;

/// Caller-supplied function mapping a document to an optional typed object.
///
/// Cloning is cheap; clones share the same function.
pub struct Decoder<T> {
    decode: Arc<DecodeFn<T>>,
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        Self {
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder").finish_non_exhaustive()
    }
}

impl<T: 'static> Decoder<T> {
    /// Creates a decoder from a function returning `None` for documents it
    /// cannot represent.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&DocumentSnapshot) -> Option<T> + Send + Sync + 'static,
    {
        Self { decode: Arc::new(f) }
    }

    /// Creates a decoder from a fallible function. Failures are logged and
    /// the document is skipped.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&DocumentSnapshot) -> Result<T, DecodeError> + Send + Sync + 'static,
    {
        Self::new(move |document| match f(document) {
            Ok(object) => Some(object),
            Err(error) => {
                warn!(path = %document.reference(), %error, "skipping undecodable document");
                None
            }
        })
    }

    /// Decodes one document.
    #[inline]
    pub fn decode(&self, document: &DocumentSnapshot) -> Option<T> {
        (self.decode)(document)
    }

    /// Returns a decoder that post-processes every decoded object.
    pub fn map<U, F>(self, f: F) -> Decoder<U>
    where
        U: 'static,
        F: Fn(T, &DocumentSnapshot) -> U + Send + Sync + 'static,
    {
        Decoder::new(move |document| self.decode(document).map(|object| f(object, document)))
    }
}

impl<T: DeserializeOwned + 'static> Decoder<T> {
    /// Creates a decoder that deserializes the document fields into `T`.
    pub fn serde() -> Self {
        Self::fallible(DocumentSnapshot::decode::<T>)
    }
}

impl Decoder<DocumentSnapshot> {
    /// Creates a decoder yielding the raw snapshot.
    pub fn identity() -> Self {
        Self::new(|document| Some(document.clone()))
    }
}

/// Decodes every document, dropping failures and preserving order.
pub fn decode_documents<T: 'static>(documents: &[DocumentSnapshot], decoder: &Decoder<T>) -> Vec<T> {
    documents.iter().filter_map(|document| decoder.decode(document)).collect()
}

/// Decodes the raw changes, dropping changes whose document fails to decode.
///
/// Indices are passed through as reported by the store.
pub fn decode_changes<T: 'static>(changes: &[RawDocumentChange], decoder: &Decoder<T>) -> Vec<DocumentChange<T>> {
    changes
        .iter()
        .filter_map(|change| {
            decoder
                .decode(&change.document)
                .map(|document| DocumentChange::new(change.kind, document))
        })
        .collect()
}
