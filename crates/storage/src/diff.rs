//! Snapshot diffing.
//!
//! Computes the raw changes between two consecutive ordered result sets of
//! the same listener.

use dash_core::{ChangeKind, DocumentSnapshot, RawDocumentChange};
use hashbrown::{HashMap, HashSet};

/// Computes the changes that turn `previous` into `current`.
///
/// Removals come first in ascending old-index order, followed by additions
/// and modifications in new-index order. A document present in both sets is
/// reported as modified only when its version or fields changed; position
/// shifts caused by other documents are not reported.
pub fn compute_changes(previous: &[DocumentSnapshot], current: &[DocumentSnapshot]) -> Vec<RawDocumentChange> {
    let old_positions: HashMap<&str, usize> = previous
        .iter()
        .enumerate()
        .map(|(index, doc)| (doc.id(), index))
        .collect();
    let current_ids: HashSet<&str> = current.iter().map(DocumentSnapshot::id).collect();

    let mut changes = Vec::new();

    for (old_index, doc) in previous.iter().enumerate() {
        if !current_ids.contains(doc.id()) {
            changes.push(RawDocumentChange::new(ChangeKind::Removal { old_index }, doc.clone()));
        }
    }

    for (new_index, doc) in current.iter().enumerate() {
        match old_positions.get(doc.id()) {
            None => {
                changes.push(RawDocumentChange::new(ChangeKind::Addition { new_index }, doc.clone()));
            }
            Some(&old_index) => {
                let old = &previous[old_index];
                if old.version() != doc.version() || old.data() != doc.data() {
                    changes.push(RawDocumentChange::new(
                        ChangeKind::Modification { old_index, new_index },
                        doc.clone(),
                    ));
                }
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{DocumentReference, Fields, Value};

    fn make_doc(id: &str, version: u64) -> DocumentSnapshot {
        let mut fields = Fields::new();
        fields.insert("rev".into(), Value::Int64(version as i64));
        DocumentSnapshot::new(DocumentReference::new("items", id), fields, version)
    }

    #[test]
    fn test_compute_changes_initial() {
        let current = vec![make_doc("a", 1), make_doc("b", 1)];
        let changes = compute_changes(&[], &current);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Addition { new_index: 0 });
        assert_eq!(changes[1].kind, ChangeKind::Addition { new_index: 1 });
    }

    #[test]
    fn test_compute_changes_no_change() {
        let docs = vec![make_doc("a", 1), make_doc("b", 1)];
        assert!(compute_changes(&docs, &docs.clone()).is_empty());
    }

    #[test]
    fn test_compute_changes_mixed() {
        let previous = vec![make_doc("a", 1), make_doc("b", 1), make_doc("c", 1)];
        let current = vec![make_doc("d", 1), make_doc("c", 2), make_doc("a", 1)];

        let changes = compute_changes(&previous, &current);
        let kinds: Vec<_> = changes.iter().map(|c| (c.kind, c.document.id().to_string())).collect();

        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Removal { old_index: 1 }, "b".to_string()),
                (ChangeKind::Addition { new_index: 0 }, "d".to_string()),
                (
                    ChangeKind::Modification {
                        old_index: 2,
                        new_index: 1
                    },
                    "c".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_compute_changes_shift_is_not_modification() {
        let previous = vec![make_doc("a", 1)];
        let current = vec![make_doc("new", 1), make_doc("a", 1)];

        let changes = compute_changes(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].kind.is_addition());
    }

    #[test]
    fn test_compute_changes_all_removed() {
        let previous = vec![make_doc("a", 1), make_doc("b", 1)];
        let changes = compute_changes(&previous, &[]);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Removal { old_index: 0 });
        assert_eq!(changes[1].kind, ChangeKind::Removal { old_index: 1 });
    }
}
