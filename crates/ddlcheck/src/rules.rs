//! Naming and primary-key rules over a DDL document.
//!
//! The engine makes a single forward pass. Tables created without an inline
//! `PRIMARY KEY` are tracked in [`PendingPrimaryKeys`] until a later
//! `ALTER TABLE ... ADD CONSTRAINT ... PRIMARY KEY` for the same name resolves
//! them; whatever is still pending at the end is reported.

use std::collections::BTreeSet;

use crate::diagnostic::{Diagnostic, MAX_IDENTIFIER_LEN, identifier_len, is_unquoted_mixed_case};
use crate::statement::{ConstraintKind, Statement, StatementShape};

/// Tables declared without a primary key that no later statement has fixed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPrimaryKeys {
    tables: BTreeSet<String>,
}

impl PendingPrimaryKeys {
    pub fn insert(&mut self, table: &str) {
        self.tables.insert(table.to_string());
    }

    /// Returns true if `table` was pending.
    pub fn resolve(&mut self, table: &str) -> bool {
        self.tables.remove(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Pending tables in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

/// Output of a full rule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    /// Per-statement findings in document order.
    pub diagnostics: Vec<Diagnostic>,
    /// One finding per table that never received a primary key, sorted by table name.
    pub missing_primary_keys: Vec<Diagnostic>,
}

impl RuleReport {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty() && self.missing_primary_keys.is_empty()
    }

    /// All findings: per-statement ones first, then missing primary keys.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut out = self.diagnostics;
        out.extend(self.missing_primary_keys);
        out
    }
}

/// Stateful single-pass rule engine. Use one instance per check.
#[derive(Debug, Default)]
pub struct RuleEngine {
    pending: PendingPrimaryKeys,
    diagnostics: Vec<Diagnostic>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables currently waiting for a primary key.
    pub fn pending(&self) -> &PendingPrimaryKeys {
        &self.pending
    }

    /// Apply the rules for one statement.
    pub fn apply(&mut self, stmt: &Statement) {
        match &stmt.shape {
            StatementShape::CreateTable {
                table,
                has_primary_key,
            } => self.check_create_table(table, *has_primary_key),
            StatementShape::CreateIndex { index, .. } => {
                if let Some(index) = index {
                    self.check_index_name(index);
                }
            }
            StatementShape::AlterTableAddConstraint {
                table,
                identifier,
                kind,
            } => self.check_add_constraint(table, identifier, kind.as_ref()),
            StatementShape::Unrecognized => {}
        }
    }

    /// Apply every statement in order and finish the pass.
    pub fn run<'a>(mut self, statements: impl IntoIterator<Item = &'a Statement>) -> RuleReport {
        for stmt in statements {
            self.apply(stmt);
        }
        self.finish()
    }

    /// Turn every still-pending table into a missing primary key finding.
    pub fn finish(self) -> RuleReport {
        let missing_primary_keys = self
            .pending
            .iter()
            .map(Diagnostic::missing_primary_key)
            .collect();
        RuleReport {
            diagnostics: self.diagnostics,
            missing_primary_keys,
        }
    }

    fn check_create_table(&mut self, table: &str, has_primary_key: bool) {
        if !has_primary_key {
            self.pending.insert(table);
        }
        if identifier_len(table) > MAX_IDENTIFIER_LEN {
            self.diagnostics.push(Diagnostic::table_name_too_long(table));
        }
    }

    fn check_index_name(&mut self, index: &str) {
        if is_unquoted_mixed_case(index) {
            self.diagnostics.push(Diagnostic::mixed_case_index_name(index));
        }
        if identifier_len(index) > MAX_IDENTIFIER_LEN {
            self.diagnostics.push(Diagnostic::index_name_too_long(index));
        }
    }

    fn check_add_constraint(
        &mut self,
        table: &str,
        identifier: &str,
        kind: Option<&ConstraintKind>,
    ) {
        if is_unquoted_mixed_case(identifier) {
            self.diagnostics
                .push(Diagnostic::mixed_case_identifier(identifier));
        }
        let len = identifier_len(identifier);
        if len > MAX_IDENTIFIER_LEN {
            self.diagnostics
                .push(Diagnostic::identifier_too_long(identifier, len));
        }

        match kind {
            Some(ConstraintKind::PrimaryKey) => {
                if !self.pending.resolve(table) {
                    self.diagnostics
                        .push(Diagnostic::constraint_out_of_order(table));
                }
            }
            // No extra rules for these yet.
            Some(ConstraintKind::ForeignKey) | Some(ConstraintKind::Unique) => {}
            Some(ConstraintKind::Other(_)) | None => {}
        }
    }
}

/// Run the rules over already split statements.
pub fn check_statements(statements: &[Statement]) -> RuleReport {
    RuleEngine::new().run(statements)
}
