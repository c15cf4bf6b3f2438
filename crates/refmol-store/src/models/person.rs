//! Person model, the provenance of curated entities.

use serde::{Deserialize, Serialize};

/// A curator recorded in the store's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Store-assigned id.
    pub id: i64,
    /// Surname; may be missing in older records.
    pub surname: Option<String>,
    /// First name; may be missing in older records.
    pub first_name: Option<String>,
}

impl Person {
    /// Display form `Surname, Firstname`, degrading gracefully when
    /// either attribute is missing.
    #[must_use]
    pub fn display(&self) -> String {
        match (&self.surname, &self.first_name) {
            (Some(s), Some(f)) => format!("{s}, {f}"),
            (Some(s), None) => s.clone(),
            (None, Some(f)) => f.clone(),
            (None, None) => format!("Person#{}", self.id),
        }
    }
}
