//! One full check of a DDL document.

use crate::classify::classify_failure;
use crate::client::EngineConnector;
use crate::diagnostic::Diagnostic;
use crate::ephemeral::{EphemeralPostgres, ExecutionOutcome};
use crate::error::CheckResult;
use crate::rules::{RuleEngine, RuleReport};
use crate::runtime::ContainerRuntime;
use crate::statement::{Statement, split_statements};

/// Checks one DDL document: rules first, then a run on a disposable engine.
///
/// The checker is consumed by [`check`](Self::check); create one per document.
#[derive(Debug, Clone)]
pub struct DdlChecker {
    ddl: String,
}

impl DdlChecker {
    pub fn new(ddl: impl Into<String>) -> Self {
        Self { ddl: ddl.into() }
    }

    pub fn ddl(&self) -> &str {
        &self.ddl
    }

    pub fn statements(&self) -> Vec<Statement> {
        split_statements(&self.ddl)
    }

    /// Run only the rule engine.
    pub fn check_static(&self) -> RuleReport {
        RuleEngine::new().run(&self.statements())
    }

    /// Run the rules, then execute the document on `engine`.
    ///
    /// The execution phase runs even if the rules already found problems.
    /// Findings are ordered: per-statement rule findings in document order,
    /// missing primary keys, then the execution finding if any. An empty list
    /// means the document passed.
    pub async fn check<R, C>(self, engine: &EphemeralPostgres<R, C>) -> CheckResult<Vec<Diagnostic>>
    where
        R: ContainerRuntime,
        C: EngineConnector,
    {
        let report = self.check_static();
        tracing::debug!(
            target: "ddlcheck",
            findings = report.diagnostics.len(),
            missing_primary_keys = report.missing_primary_keys.len(),
            "static checks done"
        );

        let mut diagnostics = report.into_diagnostics();
        if let ExecutionOutcome::Rejected(failure) = engine.execute(&self.ddl).await? {
            tracing::debug!(target: "ddlcheck", code = ?failure.code, "ddl rejected by postgres");
            diagnostics.push(classify_failure(&failure));
        }
        Ok(diagnostics)
    }
}
