//! Referrer entity model.

use serde::{Deserialize, Serialize};

/// An entity that links to a reference molecule and owns its own
/// ordered name list.
///
/// Position 0 of `names` is reserved for curator intent; the
/// reconciliation engine never overwrites it when propagating an
/// authority name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referrer {
    /// Store-assigned id.
    pub id: i64,
    /// The molecule this entity references.
    pub molecule_id: i64,
    /// Ordered name list.
    pub names: Vec<String>,
    /// Derived display label.
    pub display_name: Option<String>,
}

impl Referrer {
    /// Human-readable label for reports and log lines.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.display_name, self.names.first()) {
            (Some(d), _) => d.clone(),
            (None, Some(n)) => n.clone(),
            (None, None) => format!("Referrer#{}", self.id),
        }
    }
}
