//! Query snapshots and the raw changes between consecutive snapshots.

use crate::document::DocumentSnapshot;
use crate::query::Query;

/// How a document changed between two consecutive snapshots of the same
/// listener.
///
/// Indices are positions within the previous (`old_index`) and current
/// (`new_index`) ordered result sets, not within the whole collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The document entered the result set.
    Addition { new_index: usize },
    /// The document stayed in the result set but its content or position
    /// changed.
    Modification { old_index: usize, new_index: usize },
    /// The document left the result set.
    Removal { old_index: usize },
}

impl ChangeKind {
    /// Returns the position in the previous result set, if the document was
    /// part of it.
    pub fn old_index(&self) -> Option<usize> {
        match self {
            ChangeKind::Addition { .. } => None,
            ChangeKind::Modification { old_index, .. } | ChangeKind::Removal { old_index } => {
                Some(*old_index)
            }
        }
    }

    /// Returns the position in the current result set, if the document is
    /// part of it.
    pub fn new_index(&self) -> Option<usize> {
        match self {
            ChangeKind::Removal { .. } => None,
            ChangeKind::Addition { new_index } | ChangeKind::Modification { new_index, .. } => {
                Some(*new_index)
            }
        }
    }

    /// Returns true for a modification that moved the document.
    pub fn is_move(&self) -> bool {
        matches!(self, ChangeKind::Modification { old_index, new_index } if old_index != new_index)
    }

    #[inline]
    pub fn is_addition(&self) -> bool {
        matches!(self, ChangeKind::Addition { .. })
    }

    #[inline]
    pub fn is_modification(&self) -> bool {
        matches!(self, ChangeKind::Modification { .. })
    }

    #[inline]
    pub fn is_removal(&self) -> bool {
        matches!(self, ChangeKind::Removal { .. })
    }
}

/// A change as reported by the store, carrying the raw document.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDocumentChange {
    pub kind: ChangeKind,
    pub document: DocumentSnapshot,
}

impl RawDocumentChange {
    pub fn new(kind: ChangeKind, document: DocumentSnapshot) -> Self {
        Self { kind, document }
    }
}

/// The result of evaluating a query at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
    changes: Vec<RawDocumentChange>,
}

impl QuerySnapshot {
    /// Creates a snapshot from an ordered result set and its changes relative
    /// to the previous snapshot of the same listener.
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>, changes: Vec<RawDocumentChange>) -> Self {
        Self {
            query,
            documents,
            changes,
        }
    }

    /// Creates a snapshot for a one-shot read, where every document counts as
    /// an addition.
    pub fn initial(query: Query, documents: Vec<DocumentSnapshot>) -> Self {
        let changes = documents
            .iter()
            .enumerate()
            .map(|(new_index, doc)| RawDocumentChange::new(ChangeKind::Addition { new_index }, doc.clone()))
            .collect();
        Self::new(query, documents, changes)
    }

    /// Returns the query this snapshot answers.
    #[inline]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the ordered documents.
    #[inline]
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    /// Returns the changes relative to the previous snapshot.
    #[inline]
    pub fn changes(&self) -> &[RawDocumentChange] {
        &self.changes
    }

    /// Returns the number of documents in the result.
    #[inline]
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the result is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Splits the snapshot into documents and changes.
    pub fn into_parts(self) -> (Vec<DocumentSnapshot>, Vec<RawDocumentChange>) {
        (self.documents, self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentReference, Fields};

    fn make_doc(id: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(DocumentReference::new("items", id), Fields::new(), 1)
    }

    #[test]
    fn test_change_kind_indices() {
        let addition = ChangeKind::Addition { new_index: 2 };
        assert_eq!(addition.old_index(), None);
        assert_eq!(addition.new_index(), Some(2));

        let removal = ChangeKind::Removal { old_index: 1 };
        assert_eq!(removal.old_index(), Some(1));
        assert_eq!(removal.new_index(), None);

        let modification = ChangeKind::Modification {
            old_index: 0,
            new_index: 0,
        };
        assert!(modification.is_modification());
        assert!(!modification.is_move());

        let moved = ChangeKind::Modification {
            old_index: 0,
            new_index: 3,
        };
        assert!(moved.is_move());
    }

    #[test]
    fn test_snapshot_initial() {
        let snapshot = QuerySnapshot::initial(Query::collection("items"), vec![make_doc("a"), make_doc("b")]);

        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.changes().len(), 2);
        assert!(snapshot.changes().iter().all(|c| c.kind.is_addition()));
        assert_eq!(snapshot.changes()[1].kind.new_index(), Some(1));
    }

    #[test]
    fn test_snapshot_into_parts() {
        let snapshot = QuerySnapshot::new(Query::collection("items"), vec![make_doc("a")], Vec::new());
        assert!(!snapshot.is_empty());

        let (documents, changes) = snapshot.into_parts();
        assert_eq!(documents.len(), 1);
        assert!(changes.is_empty());
    }
}
