//! Diagnostics produced by a check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Postgres truncates identifiers longer than `NAMEDATALEN - 1`; counted here in characters.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    TableNameTooLong,
    IndexNameTooLong,
    MixedCaseIndexName,
    MixedCaseIdentifier,
    IdentifierTooLong,
    ConstraintOutOfOrder,
    MissingPrimaryKey,
    PartitionKeyNotInPrimaryKey,
    ExecutionFailed,
}

/// A single human-readable finding.
///
/// The message is the whole user-facing contract; `kind` exists so callers can
/// tell findings apart without matching on text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn table_name_too_long(table: &str) -> Self {
        Self::new(
            DiagnosticKind::TableNameTooLong,
            format!("table names are limited to {MAX_IDENTIFIER_LEN} characters ({table})"),
        )
    }

    pub fn index_name_too_long(index: &str) -> Self {
        Self::new(
            DiagnosticKind::IndexNameTooLong,
            format!("index names are limited to {MAX_IDENTIFIER_LEN} characters ({index})"),
        )
    }

    pub fn mixed_case_index_name(index: &str) -> Self {
        Self::new(
            DiagnosticKind::MixedCaseIndexName,
            format!("index names mixing upper and lower case must be wrapped in \"\" ({index})"),
        )
    }

    pub fn mixed_case_identifier(identifier: &str) -> Self {
        Self::new(
            DiagnosticKind::MixedCaseIdentifier,
            format!(
                "identifiers mixing upper and lower case must be wrapped in \"\" ({identifier})"
            ),
        )
    }

    pub fn identifier_too_long(identifier: &str, len: usize) -> Self {
        Self::new(
            DiagnosticKind::IdentifierTooLong,
            format!(
                "identifiers are limited to {MAX_IDENTIFIER_LEN} characters excluding \"\" ({identifier}: {len} characters)"
            ),
        )
    }

    pub fn constraint_out_of_order(table: &str) -> Self {
        Self::new(
            DiagnosticKind::ConstraintOutOfOrder,
            format!(
                "ALTER TABLE {table} ... ADD CONSTRAINT ... PRIMARY KEY must be placed right after CREATE TABLE {table} ...; \
                 also check that CREATE TABLE {table} is preceded by no more than one blank line"
            ),
        )
    }

    pub fn missing_primary_key(table: &str) -> Self {
        Self::new(
            DiagnosticKind::MissingPrimaryKey,
            format!("no primary key is defined for table {table}"),
        )
    }

    pub fn partition_key_not_in_primary_key(table: &str, column: &str) -> Self {
        Self::new(
            DiagnosticKind::PartitionKeyNotInPrimaryKey,
            format!(
                "a table's primary key does not include the column used as its partition key ({table}.{column})"
            ),
        )
    }

    /// Engine failure text passed through verbatim.
    pub fn execution_failed(raw: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::ExecutionFailed, raw)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Length of an identifier in characters, excluding double quotes.
pub fn identifier_len(name: &str) -> usize {
    name.chars().filter(|c| *c != '"').count()
}

/// Returns true if `name` mixes ASCII upper and lower case without being wrapped in quotes.
pub fn is_unquoted_mixed_case(name: &str) -> bool {
    let has_lower = name.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = name.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return false;
    }
    !(name.len() >= 2 && name.starts_with('"') && name.ends_with('"'))
}
