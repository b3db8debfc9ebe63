//! Property-based tests for partial decoding.

use dash_core::{ChangeKind, DocumentReference, DocumentSnapshot, Fields, RawDocumentChange, Value};
use dash_reactive::{decode_changes, decode_documents, Decoder};
use proptest::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Payment {
    amount: i64,
}

fn make_doc(index: usize, amount: Option<i64>) -> DocumentSnapshot {
    let mut fields = Fields::new();
    match amount {
        Some(amount) => fields.insert("amount".into(), Value::Int64(amount)),
        None => fields.insert("amount".into(), Value::from("n/a")),
    };
    DocumentSnapshot::new(DocumentReference::new("payments", format!("p-{index:03}")), fields, 1)
}

fn docs_strategy() -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::weighted(0.8, -1000i64..1000), 0..30)
}

proptest! {
    #[test]
    fn prop_decoding_keeps_order_of_successes(amounts in docs_strategy()) {
        let docs: Vec<_> = amounts.iter().enumerate().map(|(i, a)| make_doc(i, *a)).collect();
        let decoded = decode_documents(&docs, &Decoder::<Payment>::serde());

        let expected: Vec<_> = amounts.iter().flatten().map(|&amount| Payment { amount }).collect();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_single_failure_is_isolated(
        amounts in prop::collection::vec(-1000i64..1000, 1..30),
        broken in any::<prop::sample::Index>(),
    ) {
        let broken = broken.index(amounts.len());
        let docs: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| make_doc(i, (i != broken).then_some(a)))
            .collect();

        let decoded = decode_documents(&docs, &Decoder::<Payment>::serde());
        prop_assert_eq!(decoded.len(), amounts.len() - 1);

        let mut expected = amounts.clone();
        expected.remove(broken);
        let decoded: Vec<_> = decoded.into_iter().map(|p| p.amount).collect();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_change_indices_pass_through(amounts in docs_strategy()) {
        let changes: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| RawDocumentChange::new(ChangeKind::Addition { new_index: i }, make_doc(i, *a)))
            .collect();

        let decoded = decode_changes(&changes, &Decoder::<Payment>::serde());
        let expected: Vec<_> = amounts
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|_| Some(i)))
            .collect();
        let indices: Vec<_> = decoded.iter().map(|c| c.new_index()).collect();
        prop_assert_eq!(indices, expected);
    }
}
