//! Typed document changes.

use dash_core::ChangeKind;

/// A change to a query result, carrying the decoded document.
///
/// Indices are copied from the store's raw change unchanged. When earlier
/// documents in the same snapshot failed to decode, they still count towards
/// these positions.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChange<T> {
    pub kind: ChangeKind,
    pub document: T,
}

impl<T> DocumentChange<T> {
    pub fn new(kind: ChangeKind, document: T) -> Self {
        Self { kind, document }
    }

    /// Returns the position in the previous result set, if any.
    #[inline]
    pub fn old_index(&self) -> Option<usize> {
        self.kind.old_index()
    }

    /// Returns the position in the current result set, if any.
    #[inline]
    pub fn new_index(&self) -> Option<usize> {
        self.kind.new_index()
    }

    /// Returns true for a modification that moved the document.
    #[inline]
    pub fn is_move(&self) -> bool {
        self.kind.is_move()
    }

    /// Maps the document to a new type.
    pub fn map<U, F>(self, f: F) -> DocumentChange<U>
    where
        F: FnOnce(T) -> U,
    {
        DocumentChange {
            kind: self.kind,
            document: f(self.document),
        }
    }
}
