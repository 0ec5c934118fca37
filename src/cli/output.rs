//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use std::collections::BTreeMap;

use colored::Colorize;
use termtree::Tree;

use crate::domain::{ErrorReport, FieldPath};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print label/value pair, label padded to `width`
pub fn detail(label: &str, value: &(impl std::fmt::Display + ?Sized), width: usize) {
    println!("  {:<width$}  {}", label.bold(), value, width = width);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Error report as a tree: summary at the root, then root fields, then one
/// branch per composite.
pub fn report_tree(report: &ErrorReport) -> Tree<String> {
    let title = report
        .summary()
        .map(|s| s.message.clone())
        .unwrap_or_else(|| "No errors.".to_string());
    let mut tree = Tree::new(title);

    let mut composites: BTreeMap<&str, Tree<String>> = BTreeMap::new();
    for path in report.paths() {
        let mut node = Tree::new(path_label(path));
        for entry in report.errors_at(path) {
            node.leaves.push(Tree::new(entry.to_string()));
        }
        match path.composite() {
            None => tree.leaves.push(node),
            Some(name) => composites
                .entry(name)
                .or_insert_with(|| Tree::new(name.to_string()))
                .leaves
                .push(node),
        }
    }
    tree.leaves.extend(composites.into_values());
    tree
}

fn path_label(path: &FieldPath) -> String {
    match path {
        FieldPath::Root(field) => field.clone(),
        FieldPath::Sub { field, .. } => field.clone(),
        FieldPath::Row { index, field, .. } => format!("[{index}] {field}"),
        FieldPath::Collection(_) => "(all rows)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorEntry;

    #[test]
    fn given_errors_under_composites_when_rendering_tree_then_grouped_by_composite() {
        // Arrange
        let mut report = ErrorReport::new();
        report.add(FieldPath::root("question_text"), ErrorEntry::required());
        report.add(FieldPath::row("choices", 1, "choice_text"), ErrorEntry::required());
        report.add(
            FieldPath::Collection("q_followers".into()),
            ErrorEntry::field("unique", "Please correct the duplicate values below."),
        );
        report.summarize();

        // Act
        let tree = report_tree(&report);

        // Assert
        assert_eq!(tree.root, "Please correct the error(s) below (3 total).");
        let branches: Vec<_> = tree.leaves.iter().map(|t| t.root.clone()).collect();
        assert_eq!(branches, ["question_text", "choices", "q_followers"]);
        assert_eq!(tree.leaves[1].leaves[0].root, "[1] choice_text");
    }

    #[test]
    fn given_empty_report_when_rendering_tree_then_no_errors_root() {
        let tree = report_tree(&ErrorReport::new());
        assert_eq!(tree.root, "No errors.");
        assert!(tree.leaves.is_empty());
    }
}
