//! Translate engine failures into diagnostics.
//!
//! Failures are matched by SQLSTATE plus the structured detail first. Text
//! matching on the lower-cased rendering is only a fallback for failures that
//! arrive without structured fields. Unknown failures pass through verbatim so
//! nothing is dropped.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::client::EngineFailure;
use crate::diagnostic::Diagnostic;

/// SQLSTATE `feature_not_supported`.
pub const FEATURE_NOT_SUPPORTED: &str = "0A000";

/// A recognized failure shape.
pub struct ErrorPattern {
    /// Short label used in logs.
    pub name: &'static str,
    /// SQLSTATE the engine reports for this failure.
    pub code: &'static str,
    regex: fn() -> &'static Regex,
    build: fn(&Captures<'_>) -> Diagnostic,
}

impl ErrorPattern {
    fn matches_structured(&self, failure: &EngineFailure) -> Option<Diagnostic> {
        if failure.code.as_deref() != Some(self.code) {
            return None;
        }
        [failure.detail.as_deref(), Some(failure.message.as_str())]
            .into_iter()
            .flatten()
            .find_map(|text| (self.regex)().captures(text).map(|c| (self.build)(&c)))
    }

    fn matches_text(&self, failure: &EngineFailure) -> Option<Diagnostic> {
        let lowered = failure.text.to_lowercase();
        (self.regex)().captures(&lowered).map(|c| (self.build)(&c))
    }
}

fn partition_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)primary key constraint on table "(?P<table>[^"]+)" lacks column "(?P<column>[^"]+)" which is part of the partition key"#,
        )
        .expect("invalid built-in partition key regex")
    })
}

fn partition_key_diagnostic(caps: &Captures<'_>) -> Diagnostic {
    Diagnostic::partition_key_not_in_primary_key(&caps["table"], &caps["column"])
}

/// Every failure shape the classifier knows.
pub static PATTERNS: &[ErrorPattern] = &[ErrorPattern {
    name: "partition_key_not_in_primary_key",
    code: FEATURE_NOT_SUPPORTED,
    regex: partition_key_re,
    build: partition_key_diagnostic,
}];

/// Map a rejected batch to exactly one diagnostic.
pub fn classify_failure(failure: &EngineFailure) -> Diagnostic {
    if let Some(d) = first_match(|p| p.matches_structured(failure)) {
        return d;
    }
    if failure.code.is_none() {
        if let Some(d) = first_match(|p| p.matches_text(failure)) {
            return d;
        }
    }
    tracing::debug!(target: "ddlcheck.classify", code = ?failure.code, "unrecognized failure, passing through");
    Diagnostic::execution_failed(failure.text.clone())
}

fn first_match(matches: impl Fn(&ErrorPattern) -> Option<Diagnostic>) -> Option<Diagnostic> {
    PATTERNS.iter().find_map(|p| {
        let d = matches(p)?;
        tracing::debug!(target: "ddlcheck.classify", pattern = p.name, "classified failure");
        Some(d)
    })
}
