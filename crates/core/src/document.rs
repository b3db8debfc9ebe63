//! Document references and snapshots.
//!
//! A `DocumentSnapshot` is the store's view of one document at one instant:
//! its reference, its fields (absent when the document does not exist), and
//! the version the store assigned on the last write.

use crate::error::DecodeError;
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;

/// Field map of a document.
pub type Fields = BTreeMap<String, Value>;

/// Address of a document inside a named collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentReference {
    collection: String,
    id: String,
}

impl DocumentReference {
    /// Creates a reference to document `id` in `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns the collection name.
    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the `collection/id` path.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// One document as seen by a read or a listener push.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    reference: DocumentReference,
    data: Option<Fields>,
    /// Version number for change detection. Incremented on each write.
    version: u64,
}

impl DocumentSnapshot {
    /// Creates a snapshot of an existing document.
    pub fn new(reference: DocumentReference, fields: Fields, version: u64) -> Self {
        Self {
            reference,
            data: Some(fields),
            version,
        }
    }

    /// Creates a snapshot of a document that does not exist.
    pub fn missing(reference: DocumentReference) -> Self {
        Self {
            reference,
            data: None,
            version: 0,
        }
    }

    /// Returns the document reference.
    #[inline]
    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the document exists.
    #[inline]
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the field map, or None if the document does not exist.
    #[inline]
    pub fn data(&self) -> Option<&Fields> {
        self.data.as_ref()
    }

    /// Returns the value of a top-level field.
    ///
    /// Dotted paths (`"owner.name"`) descend into nested maps.
    pub fn get(&self, field: &str) -> Option<&Value> {
        let data = self.data.as_ref()?;
        let mut segments = field.split('.');
        let mut current = data.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Decodes the fields into `T` through serde.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let data = self.data.as_ref().ok_or_else(|| DecodeError::Missing {
            path: self.reference.path(),
        })?;
        let json = serde_json::Value::Object(
            data.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        );
        serde_json::from_value(json).map_err(|source| DecodeError::Serde {
            path: self.reference.path(),
            source,
        })
    }
}
