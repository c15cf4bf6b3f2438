//! Change report accumulation and rendering.
//!
//! Events collect into per-category buckets during the run and are
//! rendered at the end as line-oriented TSV, one stream per category,
//! each starting with a `#`-prefixed column header. The referrer-name
//! bucket is additionally grouped by creator.

use std::cmp::Ordering;
use std::fmt;

use refmol_store::models::Person;
use tracing::warn;

use crate::events::ChangeEvent;

/// Report categories, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    IdentifierDrift,
    NameChange,
    FormulaFill,
    FormulaChange,
    ReferrerNameChange,
    Duplicate,
    FetchFailure,
    DataError,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::IdentifierDrift,
        Category::NameChange,
        Category::FormulaFill,
        Category::FormulaChange,
        Category::ReferrerNameChange,
        Category::Duplicate,
        Category::FetchFailure,
        Category::DataError,
    ];

    /// File-name stem for this category's report stream.
    #[must_use]
    pub fn stem(self) -> &'static str {
        match self {
            Category::IdentifierDrift => "identifier-drift",
            Category::NameChange => "name-changes",
            Category::FormulaFill => "formula-fills",
            Category::FormulaChange => "formula-changes",
            Category::ReferrerNameChange => "referrer-name-changes",
            Category::Duplicate => "duplicate-identifiers",
            Category::FetchFailure => "fetch-failures",
            Category::DataError => "data-errors",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Category::IdentifierDrift => {
                "# Molecule ID\tStored Identifier\tAuthority Identifier\tReferrer IDs\tColliding Molecule\tColliding Referrer IDs"
            }
            Category::NameChange => "# Molecule ID\tOld Name\tNew Name",
            Category::FormulaFill => "# Molecule ID\tMolecule\tFormula",
            Category::FormulaChange => "# Molecule ID\tMolecule\tOld Formula\tNew Formula",
            Category::ReferrerNameChange => {
                "# Creator\tReferrer ID\tReferrer\tAuthority Name\tUpdated Names"
            }
            Category::Duplicate => "# Identifier\tMolecule IDs\tMolecules",
            Category::FetchFailure => "# Molecule ID\tMolecule\tReason",
            Category::DataError => "# Subject ID\tSubject\tProblem",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

fn category_of(event: &ChangeEvent) -> Category {
    match event {
        ChangeEvent::IdentifierDrift { .. } => Category::IdentifierDrift,
        ChangeEvent::NameChange { .. } => Category::NameChange,
        ChangeEvent::FormulaFill { .. } => Category::FormulaFill,
        ChangeEvent::FormulaChange { .. } => Category::FormulaChange,
        ChangeEvent::ReferrerNameChange { .. } => Category::ReferrerNameChange,
        ChangeEvent::Duplicate { .. } => Category::Duplicate,
        ChangeEvent::FetchFailure { .. } => Category::FetchFailure,
        ChangeEvent::DataError { .. } => Category::DataError,
    }
}

/// Total order over optional creators.
///
/// Unresolved creators sort before all named ones; two unresolved (or
/// reference-identical) creators compare equal. Missing name
/// attributes never raise: the pair is treated as equal and logged.
#[must_use]
pub fn compare_creators(a: Option<&Person>, b: Option<&Person>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if a.id == b.id {
                return Ordering::Equal;
            }
            let (Some(a_surname), Some(b_surname)) = (&a.surname, &b.surname) else {
                warn!(a = a.id, b = b.id, "creator missing surname, treating as equal");
                return Ordering::Equal;
            };
            match a_surname.cmp(b_surname) {
                Ordering::Equal => {
                    let (Some(a_first), Some(b_first)) = (&a.first_name, &b.first_name) else {
                        warn!(a = a.id, b = b.id, "creator missing first name, treating as equal");
                        return Ordering::Equal;
                    };
                    a_first.cmp(b_first)
                }
                other => other,
            }
        }
    }
}

fn creator_label(creator: Option<&Person>) -> String {
    creator.map_or_else(|| "UNKNOWN".to_string(), Person::display)
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Accumulates change events for one run.
#[derive(Debug, Default)]
pub struct ChangeReport {
    events: Vec<ChangeEvent>,
}

impl ChangeReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event.
    pub fn record(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    /// All recorded events, in emission order.
    #[must_use]
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Number of events in a category.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.events
            .iter()
            .filter(|e| category_of(e) == category)
            .count()
    }

    /// Render one category as a line-oriented report.
    ///
    /// Returns `None` when the bucket is empty; callers skip writing
    /// empty streams.
    #[must_use]
    pub fn render(&self, category: Category) -> Option<String> {
        let mut bucket: Vec<&ChangeEvent> = self
            .events
            .iter()
            .filter(|e| category_of(e) == category)
            .collect();
        if bucket.is_empty() {
            return None;
        }

        if category == Category::ReferrerNameChange {
            bucket.sort_by(|a, b| {
                let (
                    ChangeEvent::ReferrerNameChange { creator: ca, .. },
                    ChangeEvent::ReferrerNameChange { creator: cb, .. },
                ) = (a, b)
                else {
                    return Ordering::Equal;
                };
                compare_creators(ca.as_ref(), cb.as_ref())
            });
        }

        let mut out = String::from(category.header());
        out.push('\n');
        for event in bucket {
            out.push_str(&render_line(event));
            out.push('\n');
        }
        Some(out)
    }
}

fn render_line(event: &ChangeEvent) -> String {
    match event {
        ChangeEvent::IdentifierDrift {
            molecule_id,
            stored_identifier,
            authority_identifier,
            referrer_ids,
            collision,
            ..
        } => {
            let (colliding, colliding_referrers) = match collision {
                Some(c) => (c.molecule_id.to_string(), join_ids(&c.referrer_ids)),
                None => (String::new(), String::new()),
            };
            format!(
                "{molecule_id}\t{stored_identifier}\t{authority_identifier}\t{}\t{colliding}\t{colliding_referrers}",
                join_ids(referrer_ids)
            )
        }
        ChangeEvent::NameChange {
            molecule_id,
            old_name,
            new_name,
            ..
        } => format!("{molecule_id}\t{old_name}\t{new_name}"),
        ChangeEvent::FormulaFill {
            molecule_id,
            label,
            formula,
        } => format!("{molecule_id}\t{label}\t{formula}"),
        ChangeEvent::FormulaChange {
            molecule_id,
            label,
            old_formula,
            new_formula,
        } => format!("{molecule_id}\t{label}\t{old_formula}\t{new_formula}"),
        ChangeEvent::ReferrerNameChange {
            referrer_id,
            label,
            authority_name,
            names,
            creator,
            ..
        } => format!(
            "{}\t{referrer_id}\t{label}\t{authority_name}\t{}",
            creator_label(creator.as_ref()),
            names.join(",")
        ),
        ChangeEvent::Duplicate {
            identifier,
            molecule_ids,
            labels,
        } => format!(
            "{}\t{}\t{}",
            identifier.as_deref().unwrap_or("NULL"),
            join_ids(molecule_ids),
            labels.join(",")
        ),
        ChangeEvent::FetchFailure {
            molecule_id,
            label,
            reason,
        } => format!("{molecule_id}\t{label}\t{reason}"),
        ChangeEvent::DataError {
            subject_id,
            label,
            message,
        } => format!("{subject_id}\t{label}\t{message}"),
    }
}
