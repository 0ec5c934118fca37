//! Submitted form input: flat field paths to raw strings
//!
//! Key layout:
//! - root fields: `question_text`
//! - sub-entity fields: `<composite>-<field>`
//! - collection rows: `<composite>-<index>-<field>`, with the reserved row
//!   fields `id` (existing child identity) and `DELETE` (deletion marker)

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reserved row field carrying an existing child's identity.
pub const ROW_ID_FIELD: &str = "id";
/// Reserved row field marking a row for deletion.
pub const ROW_DELETE_FIELD: &str = "DELETE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Row indices marked for deletion, per collection.
    #[serde(default)]
    pub deleted: BTreeMap<String, BTreeSet<usize>>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, path: &str, raw: impl Into<String>) -> Self {
        self.values.insert(path.to_string(), raw.into());
        self
    }

    pub fn with_sub_value(self, composite: &str, field: &str, raw: impl Into<String>) -> Self {
        self.with_value(&sub_key(composite, field), raw)
    }

    pub fn with_row_value(
        self,
        composite: &str,
        index: usize,
        field: &str,
        raw: impl Into<String>,
    ) -> Self {
        self.with_value(&row_key(composite, index, field), raw)
    }

    pub fn with_deleted_row(mut self, composite: &str, index: usize) -> Self {
        self.deleted
            .entry(composite.to_string())
            .or_default()
            .insert(index);
        self
    }

    pub fn root(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn sub(&self, composite: &str, field: &str) -> Option<&str> {
        self.values.get(&sub_key(composite, field)).map(String::as_str)
    }

    pub fn row(&self, composite: &str, index: usize, field: &str) -> Option<&str> {
        self.values
            .get(&row_key(composite, index, field))
            .map(String::as_str)
    }

    /// Every row index mentioned for a collection, ascending.
    pub fn row_indices(&self, composite: &str) -> BTreeSet<usize> {
        let prefix = format!("{composite}-");
        let mut indices: BTreeSet<usize> = self
            .values
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| row_index(rest))
            .collect();
        if let Some(deleted) = self.deleted.get(composite) {
            indices.extend(deleted.iter().copied());
        }
        indices
    }

    pub fn is_deleted(&self, composite: &str, index: usize) -> bool {
        let explicit = self
            .deleted
            .get(composite)
            .is_some_and(|set| set.contains(&index));
        let marker = self
            .row(composite, index, ROW_DELETE_FIELD)
            .is_some_and(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1"));
        explicit || marker
    }

    pub fn row_id(&self, composite: &str, index: usize) -> Option<&str> {
        self.row(composite, index, ROW_ID_FIELD)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn row_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)-[A-Za-z_]").expect("static pattern"))
}

/// Row index at the head of `<index>-<field>`.
fn row_index(rest: &str) -> Option<usize> {
    row_index_pattern()
        .captures(rest)
        .and_then(|caps| caps[1].parse().ok())
}

pub fn sub_key(composite: &str, field: &str) -> String {
    format!("{composite}-{field}")
}

pub fn row_key(composite: &str, index: usize, field: &str) -> String {
    format!("{composite}-{index}-{field}")
}
