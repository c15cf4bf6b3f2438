//! Authority record model.

/// The namespace prefix the authority uses on its identifiers.
pub const NAMESPACE_PREFIX: &str = "CHEBI:";

/// The authority's current knowledge about one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRecord {
    /// Canonical identifier, usually namespace-qualified
    /// (e.g. `CHEBI:15377`). May differ from the queried identifier
    /// when the authority has merged or renumbered entities.
    pub id: String,
    /// ASCII name of the entity.
    pub ascii_name: String,
    /// Ordered formula list; only the first entry is authoritative.
    pub formulae: Vec<String>,
}

impl AuthorityRecord {
    /// Canonical identifier with the namespace prefix stripped, for
    /// comparison against stored identifiers.
    #[must_use]
    pub fn canonical_id(&self) -> &str {
        self.id.strip_prefix(NAMESPACE_PREFIX).unwrap_or(&self.id)
    }

    /// The authoritative formula: the first entry, if any.
    #[must_use]
    pub fn primary_formula(&self) -> Option<&str> {
        self.formulae.first().map(String::as_str)
    }
}

/// Namespace-qualify a bare identifier for querying and cache keys.
#[must_use]
pub fn qualify(identifier: &str) -> String {
    if identifier.starts_with(NAMESPACE_PREFIX) {
        identifier.to_string()
    } else {
        format!("{NAMESPACE_PREFIX}{identifier}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_id_strips_prefix() {
        let record = AuthorityRecord {
            id: "CHEBI:15377".to_string(),
            ascii_name: "water".to_string(),
            formulae: vec!["H2O".to_string()],
        };
        assert_eq!(record.canonical_id(), "15377");
    }

    #[test]
    fn test_canonical_id_without_prefix() {
        let record = AuthorityRecord {
            id: "15377".to_string(),
            ascii_name: "water".to_string(),
            formulae: vec![],
        };
        assert_eq!(record.canonical_id(), "15377");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("15377"), "CHEBI:15377");
        assert_eq!(qualify("CHEBI:15377"), "CHEBI:15377");
    }
}
