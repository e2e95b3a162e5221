//! Static rule examples (no container needed)
//!
//! Run with:
//! `cargo run --example static_rules -p ddlcheck`

use colored::Colorize;
use ddlcheck::{DdlChecker, StatementKind, split_statements};

const DDL: &str = r#"
CREATE TABLE users (
  id bigint,
  email text NOT NULL
);

ALTER TABLE users ADD CONSTRAINT users_pk PRIMARY KEY (id);

CREATE UNIQUE INDEX UsersEmail ON users (email);

CREATE TABLE audit_log (
  at timestamptz,
  message text
);

ALTER TABLE orders ADD CONSTRAINT orders_pk PRIMARY KEY (id);

COMMENT ON TABLE users IS 'ignored by the rules';
"#;

fn main() {
    println!("{}", "=== Statements ===".bold().cyan());
    for stmt in split_statements(DDL) {
        let first_line = stmt.text.lines().next().unwrap_or_default();
        let label = format!("{:<28}", format!("{:?}", stmt.kind()));
        let kind = match stmt.kind() {
            StatementKind::Unrecognized => label.dimmed(),
            _ => label.green(),
        };
        println!("  {kind} {first_line}");
    }
    println!();

    println!("{}", "=== Findings ===".bold().cyan());
    let report = DdlChecker::new(DDL).check_static();
    if report.is_ok() {
        println!("  {}", "no findings".green());
        return;
    }
    for d in report.into_diagnostics() {
        println!("  {} {}", format!("[{:?}]", d.kind).yellow(), d.message);
    }
}
