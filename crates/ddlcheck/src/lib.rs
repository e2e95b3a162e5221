//! ddlcheck
//!
//! Pre-merge checks for Postgres DDL.
//!
//! A check has two phases:
//!
//! - **Rules**: the document is split into statements and four statement shapes
//!   (`CREATE TABLE`, `CREATE INDEX`, `CREATE UNIQUE INDEX`,
//!   `ALTER TABLE ... ADD CONSTRAINT`) are checked for identifier length, mixed-case
//!   names without quotes, and tables that never get a primary key.
//! - **Execution**: the whole document runs once on a throwaway Postgres container,
//!   and a rejection is turned into a diagnostic.
//!
//! # Example
//!
//! ```ignore
//! use ddlcheck::{DdlChecker, EngineConfig, EphemeralPostgres};
//!
//! let engine = EphemeralPostgres::docker(EngineConfig::default());
//! let diagnostics = DdlChecker::new(ddl).check(&engine).await?;
//! for d in &diagnostics {
//!     println!("{d}");
//! }
//! ```

pub mod checker;
pub mod classify;
pub mod client;
pub mod diagnostic;
pub mod ephemeral;
pub mod error;
pub mod rules;
pub mod runtime;
pub mod statement;

pub use checker::DdlChecker;
pub use classify::{ErrorPattern, PATTERNS, classify_failure};
pub use client::{ConnectFailure, DdlSession, Endpoint, EngineConnector, EngineFailure, PgConnector};
pub use diagnostic::{Diagnostic, DiagnosticKind, MAX_IDENTIFIER_LEN};
pub use ephemeral::{EngineConfig, EphemeralInstance, EphemeralPostgres, ExecutionOutcome, InstanceState};
pub use error::{CheckError, CheckResult};
pub use rules::{PendingPrimaryKeys, RuleEngine, RuleReport, check_statements};
pub use runtime::{ContainerId, ContainerRuntime, ContainerSpec, DockerCli, parse_port_bindings};
pub use statement::{ConstraintKind, Statement, StatementKind, StatementShape, split_statements};
