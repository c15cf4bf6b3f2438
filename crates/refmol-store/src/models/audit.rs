//! Audit-trail model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit-trail instance.
///
/// One record is created per reconciliation run and attached to the
/// `modified` history of every entity the run actually mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned id.
    pub id: i64,
    /// The person the run is attributed to.
    pub person_id: i64,
    /// Free-form note identifying the tool that made the change.
    pub note: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
