//! Data model for the curated store.

pub mod audit;
pub mod molecule;
pub mod person;
pub mod referrer;

pub use audit::AuditRecord;
pub use molecule::Molecule;
pub use person::Person;
pub use referrer::Referrer;
