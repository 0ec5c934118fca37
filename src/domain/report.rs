//! Structured validation errors for one aggregate

use std::collections::BTreeMap;
use std::fmt;

/// Recoverable validation error kinds. None of these ever leave the
/// bind-and-validate cascade as a Rust error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Value fails a local type, format or range check.
    Field,
    /// Value missing where the schema or a field policy requires it.
    Required,
    /// Collection below its min or above its max row count.
    Cardinality,
    /// Collection-level uniqueness violation.
    Duplicate,
    /// A whole-aggregate business rule violation.
    CrossEntity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Field => "field",
            ErrorKind::Required => "required",
            ErrorKind::Cardinality => "cardinality",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::CrossEntity => "cross-entity",
        };
        f.write_str(s)
    }
}

/// One validation error with a stable machine code and a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn field(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Field, code, message)
    }

    /// The standard "This field is required." entry.
    pub fn required() -> Self {
        Self::new(ErrorKind::Required, "required", "This field is required.")
    }

    pub fn cross_entity(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CrossEntity, code, message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)
    }
}

/// Where an error attaches inside the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldPath {
    /// A root scalar field, or a composite field named as a whole.
    Root(String),
    /// A field of a sub-entity form.
    Sub { composite: String, field: String },
    /// A field of one collection row, by submitted row index.
    Row {
        composite: String,
        index: usize,
        field: String,
    },
    /// Collection-level non-field errors.
    Collection(String),
}

impl FieldPath {
    pub fn root(field: impl Into<String>) -> Self {
        FieldPath::Root(field.into())
    }

    pub fn sub(composite: impl Into<String>, field: impl Into<String>) -> Self {
        FieldPath::Sub {
            composite: composite.into(),
            field: field.into(),
        }
    }

    pub fn row(composite: impl Into<String>, index: usize, field: impl Into<String>) -> Self {
        FieldPath::Row {
            composite: composite.into(),
            index,
            field: field.into(),
        }
    }

    /// Name of the composite field this path lives under, if any.
    pub fn composite(&self) -> Option<&str> {
        match self {
            FieldPath::Root(_) => None,
            FieldPath::Sub { composite, .. }
            | FieldPath::Row { composite, .. }
            | FieldPath::Collection(composite) => Some(composite),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Root(field) => write!(f, "{field}"),
            FieldPath::Sub { composite, field } => write!(f, "{composite}.{field}"),
            FieldPath::Row {
                composite,
                index,
                field,
            } => write!(f, "{composite}[{index}].{field}"),
            FieldPath::Collection(composite) => write!(f, "{composite}[*]"),
        }
    }
}

/// Field path to error entries, plus the aggregate-level summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    entries: BTreeMap<FieldPath, Vec<ErrorEntry>>,
    summary: Option<ErrorEntry>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: FieldPath, entry: ErrorEntry) {
        self.entries.entry(path).or_default().push(entry);
    }

    /// Errors attached at exactly this path.
    pub fn errors_at(&self, path: &FieldPath) -> &[ErrorEntry] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_errors_at(&self, path: &FieldPath) -> bool {
        !self.errors_at(path).is_empty()
    }

    /// Total error entries, excluding the summary.
    pub fn error_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.iter().filter(|(_, e)| e.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.error_count() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &ErrorEntry)> {
        self.entries
            .iter()
            .flat_map(|(path, errors)| errors.iter().map(move |e| (path, e)))
    }

    /// Paths carrying at least one error, in path order.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.keys()
    }

    pub fn summary(&self) -> Option<&ErrorEntry> {
        self.summary.as_ref()
    }

    /// Attach the single top-level "N errors below" entry when any error exists.
    ///
    /// Recomputed from scratch, so calling it again never double counts.
    pub fn summarize(&mut self) {
        let count = self.error_count();
        self.summary = (count > 0).then(|| {
            ErrorEntry::field(
                "invalid_aggregate",
                format!("Please correct the error(s) below ({count} total)."),
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_errors_when_summarizing_then_counts_every_entry() {
        let mut report = ErrorReport::new();
        report.add(FieldPath::root("question_text"), ErrorEntry::required());
        report.add(
            FieldPath::row("choices", 1, "choice_text"),
            ErrorEntry::required(),
        );
        report.add(
            FieldPath::row("choices", 1, "choice_text"),
            ErrorEntry::field("max_length", "too long"),
        );

        report.summarize();

        assert_eq!(report.error_count(), 3);
        let summary = report.summary().expect("summary attached");
        assert!(summary.message.contains("(3 total)"));
    }

    #[test]
    fn given_empty_report_when_summarizing_then_no_summary() {
        let mut report = ErrorReport::new();
        report.summarize();
        assert!(report.summary().is_none());
        assert!(report.is_empty());
    }

    #[test]
    fn given_paths_when_displaying_then_uses_dotted_notation() {
        assert_eq!(FieldPath::row("choices", 2, "vote_count").to_string(), "choices[2].vote_count");
        assert_eq!(FieldPath::sub("account", "email").to_string(), "account.email");
        assert_eq!(FieldPath::Collection("q_followers".into()).to_string(), "q_followers[*]");
    }
}
