//! Duplicate identifier detection.
//!
//! Read-only: flags every authority identifier shared by two or more
//! molecules of the same reference database, including the bucket of
//! molecules with no identifier at all. Run before and after the
//! reconciliation loop to tell pre-existing duplication apart from
//! anything a run introduced.

use std::collections::BTreeMap;

use refmol_store::models::Molecule;

use crate::events::ChangeEvent;

/// Find identifiers held by more than one molecule.
///
/// Buckets are keyed by identifier with the null bucket first; within
/// a bucket, molecule ids keep their input order.
#[must_use]
pub fn detect_duplicates(molecules: &[Molecule]) -> Vec<ChangeEvent> {
    let mut buckets: BTreeMap<Option<String>, Vec<&Molecule>> = BTreeMap::new();
    for molecule in molecules {
        buckets
            .entry(molecule.identifier.clone())
            .or_default()
            .push(molecule);
    }

    buckets
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(identifier, members)| ChangeEvent::Duplicate {
            identifier,
            molecule_ids: members.iter().map(|m| m.id).collect(),
            labels: members.iter().map(|m| m.label()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molecule(id: i64, identifier: Option<&str>) -> Molecule {
        Molecule {
            id,
            identifier: identifier.map(str::to_string),
            names: vec![format!("molecule-{id}")],
            formula: None,
            display_name: None,
            reference_database_id: 1,
        }
    }

    #[test]
    fn test_shared_identifier_is_reported_once() {
        let molecules = vec![
            molecule(1, Some("16236")),
            molecule(2, Some("15377")),
            molecule(3, Some("16236")),
        ];
        let events = detect_duplicates(&molecules);
        assert_eq!(events.len(), 1);
        let ChangeEvent::Duplicate {
            identifier,
            molecule_ids,
            ..
        } = &events[0]
        else {
            panic!("expected a duplicate event");
        };
        assert_eq!(identifier.as_deref(), Some("16236"));
        assert_eq!(molecule_ids, &vec![1, 3]);
    }

    #[test]
    fn test_unique_identifiers_are_not_reported() {
        let molecules = vec![molecule(1, Some("15377")), molecule(2, Some("16236"))];
        assert!(detect_duplicates(&molecules).is_empty());
    }

    #[test]
    fn test_null_identifier_bucket_is_included() {
        let molecules = vec![molecule(1, None), molecule(2, None), molecule(3, Some("15377"))];
        let events = detect_duplicates(&molecules);
        assert_eq!(events.len(), 1);
        let ChangeEvent::Duplicate { identifier, molecule_ids, .. } = &events[0] else {
            panic!("expected a duplicate event");
        };
        assert!(identifier.is_none());
        assert_eq!(molecule_ids, &vec![1, 2]);
    }

    #[test]
    fn test_single_null_identifier_is_not_reported() {
        let molecules = vec![molecule(1, None), molecule(2, Some("15377"))];
        assert!(detect_duplicates(&molecules).is_empty());
    }
}
