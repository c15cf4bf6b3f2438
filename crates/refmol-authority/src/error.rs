//! Authority error types.
//!
//! Error definitions with per-record/systemic classification. The two
//! benign web-service faults (malformed identifier, obsolete entity)
//! exclude a single record from reconciliation; everything else aborts
//! the retrieval pass, since one infrastructure failure on this service
//! tends to predict cascading failures.

use thiserror::Error;

/// Result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Error that can occur while talking to the authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    // Per-record faults
    /// The identifier is not formatted the way the authority expects.
    #[error("identifier \"{identifier}\" is not formatted correctly")]
    InvalidIdentifier { identifier: String },

    /// The identifier refers to a deleted, obsolete or unreleased entity.
    #[error("identifier \"{identifier}\" is deleted, obsolete, or not yet released")]
    ObsoleteEntity { identifier: String },

    // Systemic faults
    /// The web service reported a fault outside the benign classes.
    #[error("web service fault: {message}")]
    Service { message: String },

    /// Network error during communication.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The response could not be parsed.
    #[error("malformed web service response: {message}")]
    Decode { message: String },

    /// Client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The response cache could not be read or written.
    #[error("cache I/O error: {0}")]
    Cache(#[source] std::io::Error),
}

impl AuthorityError {
    /// Check if this error excludes only the record that caused it.
    ///
    /// Per-record faults are reported and skipped; the batch continues.
    #[must_use]
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            AuthorityError::InvalidIdentifier { .. } | AuthorityError::ObsoleteEntity { .. }
        )
    }

    /// Check if this error must abort the whole retrieval pass.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        !self.is_per_record()
    }

    /// Classify a SOAP fault string into an error kind.
    ///
    /// The fault string is matched once, here at the client boundary;
    /// the rest of the system only sees the enum.
    #[must_use]
    pub fn classify_fault(identifier: &str, fault: &str) -> Self {
        if fault.contains("invalid ChEBI identifier") {
            AuthorityError::InvalidIdentifier {
                identifier: identifier.to_string(),
            }
        } else if fault.contains("the entity in question is deleted, obsolete, or not yet released")
        {
            AuthorityError::ObsoleteEntity {
                identifier: identifier.to_string(),
            }
        } else {
            AuthorityError::Service {
                message: fault.to_string(),
            }
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuthorityError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
