//! Reference molecule model.
//!
//! A molecule is the curated store's representation of one chemical
//! entity sourced from the external authority.

use serde::{Deserialize, Serialize};

/// A reference molecule row together with its ordered name list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    /// Store-assigned id, immutable.
    pub id: i64,
    /// Authority identifier, without the namespace prefix. May be null
    /// for records that were never linked to the authority.
    pub identifier: Option<String>,
    /// Ordered name list; position 0 is the primary display name.
    pub names: Vec<String>,
    /// Chemical formula, if known.
    pub formula: Option<String>,
    /// Derived display label.
    pub display_name: Option<String>,
    /// The reference database this molecule is sourced from.
    pub reference_database_id: i64,
}

impl Molecule {
    /// The primary name, if the name list is non-empty.
    #[must_use]
    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Human-readable label for reports and log lines.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.display_name, self.primary_name()) {
            (Some(d), _) => d.clone(),
            (None, Some(n)) => n.to_string(),
            (None, None) => format!("Molecule#{}", self.id),
        }
    }

    /// Recompute the derived display label from the current primary
    /// name and identifier, e.g. `water [ChEBI:15377]`.
    #[must_use]
    pub fn derived_display_name(&self) -> String {
        match (self.primary_name(), &self.identifier) {
            (Some(name), Some(id)) => format!("{name} [ChEBI:{id}]"),
            (Some(name), None) => name.to_string(),
            (None, Some(id)) => format!("[ChEBI:{id}]"),
            (None, None) => format!("Molecule#{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molecule(names: &[&str], identifier: Option<&str>) -> Molecule {
        Molecule {
            id: 42,
            identifier: identifier.map(str::to_string),
            names: names.iter().map(|s| (*s).to_string()).collect(),
            formula: None,
            display_name: None,
            reference_database_id: 1,
        }
    }

    #[test]
    fn test_derived_display_name() {
        let m = molecule(&["water"], Some("15377"));
        assert_eq!(m.derived_display_name(), "water [ChEBI:15377]");
    }

    #[test]
    fn test_derived_display_name_without_identifier() {
        let m = molecule(&["water"], None);
        assert_eq!(m.derived_display_name(), "water");
    }

    #[test]
    fn test_label_falls_back_to_id() {
        let m = molecule(&[], None);
        assert_eq!(m.label(), "Molecule#42");
    }
}
