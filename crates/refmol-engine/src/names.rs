//! Name-list merge policy for referrer entities.
//!
//! Referrer name lists are curator-owned: the first three positions
//! are never touched. The authority name is only ever added, never
//! moved to the front, and never duplicated.

/// How many leading positions are reserved for curator-authored names.
const CURATOR_SLOTS: usize = 3;

/// Merge an authority name into a referrer's ordered name list.
///
/// Returns the updated list, or `None` when the list already carries
/// the name (anywhere) and no write is needed. Lists longer than the
/// curator-reserved prefix get the name inserted right after that
/// prefix; shorter lists get it appended.
///
/// Callers must handle the empty list before calling; an empty name
/// list is a data fault, not a merge case.
#[must_use]
pub fn merge_authority_name(names: &[String], authority_name: &str) -> Option<Vec<String>> {
    if names.iter().any(|n| n == authority_name) {
        return None;
    }
    let mut merged = names.to_vec();
    if merged.len() > CURATOR_SLOTS {
        merged.insert(CURATOR_SLOTS, authority_name.to_string());
    } else {
        merged.push(authority_name.to_string());
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_short_list_appends() {
        let merged = merge_authority_name(&list(&["curator-name", "old-chebi", "foo"]), "new-chebi");
        assert_eq!(
            merged,
            Some(list(&["curator-name", "old-chebi", "foo", "new-chebi"]))
        );
    }

    #[test]
    fn test_long_list_inserts_after_curator_slots() {
        let merged = merge_authority_name(&list(&["a", "b", "c", "d", "e"]), "new-chebi");
        assert_eq!(merged, Some(list(&["a", "b", "c", "new-chebi", "d", "e"])));
    }

    #[test]
    fn test_primary_match_is_noop() {
        assert!(merge_authority_name(&list(&["water", "oxidane"]), "water").is_none());
    }

    #[test]
    fn test_name_anywhere_is_noop() {
        assert!(merge_authority_name(&list(&["a", "b", "water"]), "water").is_none());
    }

    #[test]
    fn test_curator_prefix_never_altered() {
        let original = list(&["a", "b", "c", "d"]);
        let merged = merge_authority_name(&original, "x").unwrap();
        assert_eq!(&merged[..3], &original[..3]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_authority_name(&list(&["a", "b", "c", "d"]), "x").unwrap();
        assert!(merge_authority_name(&once, "x").is_none());
        assert_eq!(once.iter().filter(|n| *n == "x").count(), 1);
    }
}
