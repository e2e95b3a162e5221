//! Statement splitting and shape detection.
//!
//! Only four statement shapes are recognized:
//! - `CREATE TABLE <table> ...`
//! - `CREATE INDEX <index> ...`
//! - `CREATE UNIQUE INDEX <index> ...`
//! - `ALTER TABLE <table> ADD CONSTRAINT <identifier> <kind> ...`
//!
//! Anything else is [`StatementKind::Unrecognized`] and skipped by the rule engine.
//! Keywords are matched case-insensitively and may be separated by any whitespace.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// An identifier: quoted parts (which may contain anything but `"`) or bare characters,
/// stopping at whitespace, `(`, `,` and `;`.
macro_rules! name_pattern {
    () => {
        r#"(?:"[^"]*"|[^\s("',;]+)+"#
    };
}

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?P<table>",
            name_pattern!(),
            ")"
        ))
        .expect("invalid built-in CREATE TABLE regex")
    })
}

fn create_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^CREATE\s+INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(?P<index>",
            name_pattern!(),
            ")"
        ))
        .expect("invalid built-in CREATE INDEX regex")
    })
}

fn create_unique_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^CREATE\s+UNIQUE\s+INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(?P<index>",
            name_pattern!(),
            ")"
        ))
        .expect("invalid built-in CREATE UNIQUE INDEX regex")
    })
}

fn alter_add_constraint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?(?P<table>",
            name_pattern!(),
            r")\s+ADD\s+CONSTRAINT\s+(?P<identifier>",
            name_pattern!(),
            r")(?:\s+(?P<kind>PRIMARY\s+KEY|FOREIGN\s+KEY|[A-Za-z_]+))?"
        ))
        .expect("invalid built-in ALTER TABLE ADD CONSTRAINT regex")
    })
}

fn primary_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bPRIMARY\s+KEY\b").expect("invalid built-in PRIMARY KEY regex")
    })
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").expect("invalid built-in blank line regex")
    })
}

/// Type of DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    CreateIndex,
    CreateUniqueIndex,
    AlterTableAddConstraint,
    Unrecognized,
}

/// Constraint kind keyword following `ADD CONSTRAINT <identifier>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    /// Any other keyword (`CHECK`, `EXCLUDE`, ...), upper-cased.
    Other(String),
}

impl ConstraintKind {
    fn parse(raw: &str) -> Self {
        let normalized = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "PRIMARY KEY" => ConstraintKind::PrimaryKey,
            "FOREIGN KEY" => ConstraintKind::ForeignKey,
            "UNIQUE" => ConstraintKind::Unique,
            _ => ConstraintKind::Other(normalized),
        }
    }
}

/// Named parts captured from a recognized statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementShape {
    CreateTable {
        table: String,
        /// Whether `PRIMARY KEY` appears anywhere in the statement.
        has_primary_key: bool,
    },
    CreateIndex {
        /// `None` for `CREATE INDEX ON <table> ...`.
        index: Option<String>,
        unique: bool,
    },
    AlterTableAddConstraint {
        table: String,
        identifier: String,
        kind: Option<ConstraintKind>,
    },
    Unrecognized,
}

/// One statement of a DDL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub shape: StatementShape,
}

impl Statement {
    /// Classify a single statement (without its trailing `;`).
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let body = skip_leading_comments(text);
        Self {
            text: text.to_string(),
            shape: classify(body),
        }
    }

    pub fn kind(&self) -> StatementKind {
        match &self.shape {
            StatementShape::CreateTable { .. } => StatementKind::CreateTable,
            StatementShape::CreateIndex { unique: false, .. } => StatementKind::CreateIndex,
            StatementShape::CreateIndex { unique: true, .. } => StatementKind::CreateUniqueIndex,
            StatementShape::AlterTableAddConstraint { .. } => StatementKind::AlterTableAddConstraint,
            StatementShape::Unrecognized => StatementKind::Unrecognized,
        }
    }
}

/// Split a DDL document into statements.
///
/// Runs of blank lines collapse to a single line break, the text is split on `;`,
/// and each piece is trimmed. Empty pieces (including the trailing one) are dropped.
///
/// # Example
/// ```
/// use ddlcheck::{split_statements, StatementKind};
///
/// let stmts = split_statements("CREATE TABLE t (id int);\n\nCREATE INDEX t_idx ON t (id);\n");
/// assert_eq!(stmts.len(), 2);
/// assert_eq!(stmts[0].kind(), StatementKind::CreateTable);
/// assert_eq!(stmts[1].kind(), StatementKind::CreateIndex);
/// ```
pub fn split_statements(ddl: &str) -> Vec<Statement> {
    let collapsed = blank_lines_re().replace_all(ddl, "\n");
    collapsed
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Statement::parse)
        .collect()
}

/// Detect the statement shape, trying the patterns in a fixed order.
fn classify(text: &str) -> StatementShape {
    if let Some(caps) = create_table_re().captures(text) {
        return StatementShape::CreateTable {
            table: group(&caps, "table"),
            has_primary_key: primary_key_re().is_match(text),
        };
    }
    if let Some(caps) = create_index_re().captures(text) {
        return StatementShape::CreateIndex {
            index: index_name(&caps),
            unique: false,
        };
    }
    if let Some(caps) = create_unique_index_re().captures(text) {
        return StatementShape::CreateIndex {
            index: index_name(&caps),
            unique: true,
        };
    }
    if let Some(caps) = alter_add_constraint_re().captures(text) {
        return StatementShape::AlterTableAddConstraint {
            table: group(&caps, "table"),
            identifier: group(&caps, "identifier"),
            kind: caps.name("kind").map(|m| ConstraintKind::parse(m.as_str())),
        };
    }
    StatementShape::Unrecognized
}

fn group(caps: &Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn index_name(caps: &Captures<'_>) -> Option<String> {
    let name = group(caps, "index");
    // `CREATE INDEX ON t (...)` declares an unnamed index.
    if name.eq_ignore_ascii_case("on") {
        None
    } else {
        Some(name)
    }
}

fn skip_leading_comments(mut text: &str) -> &str {
    while let Some(rest) = text.strip_prefix("--") {
        text = match rest.find('\n') {
            Some(pos) => rest[pos + 1..].trim_start(),
            None => "",
        };
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_empty_statements() {
        let stmts = split_statements("CREATE TABLE a (id int);;\n\n\nCREATE TABLE b (id int);\n\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "CREATE TABLE a (id int)");
        assert_eq!(stmts[1].text, "CREATE TABLE b (id int)");
    }

    #[test]
    fn split_collapses_blank_lines_inside_statements() {
        let stmts = split_statements("CREATE TABLE a (\n  id int,\n\n\n  name text\n);");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "CREATE TABLE a (\n  id int,\n  name text\n)");
    }

    #[test]
    fn split_empty_document() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("\n\n  \n").is_empty());
    }

    #[test]
    fn classify_create_table() {
        let stmt = Statement::parse("CREATE TABLE users (id int, PRIMARY KEY (id))");
        assert_eq!(
            stmt.shape,
            StatementShape::CreateTable {
                table: "users".to_string(),
                has_primary_key: true,
            }
        );

        let stmt = Statement::parse("create table if not exists public.users(id int)");
        assert_eq!(
            stmt.shape,
            StatementShape::CreateTable {
                table: "public.users".to_string(),
                has_primary_key: false,
            }
        );

        let stmt = Statement::parse("CREATE TABLE \"My Table\" (id int primary   key)");
        assert_eq!(
            stmt.shape,
            StatementShape::CreateTable {
                table: "\"My Table\"".to_string(),
                has_primary_key: true,
            }
        );
    }

    #[test]
    fn classify_create_index() {
        let stmt = Statement::parse("CREATE INDEX users_email_idx ON users (email)");
        assert_eq!(stmt.kind(), StatementKind::CreateIndex);
        assert_eq!(
            stmt.shape,
            StatementShape::CreateIndex {
                index: Some("users_email_idx".to_string()),
                unique: false,
            }
        );

        let stmt = Statement::parse("CREATE UNIQUE INDEX \"UsersEmail\" ON users (email)");
        assert_eq!(stmt.kind(), StatementKind::CreateUniqueIndex);
        assert_eq!(
            stmt.shape,
            StatementShape::CreateIndex {
                index: Some("\"UsersEmail\"".to_string()),
                unique: true,
            }
        );

        let stmt = Statement::parse("CREATE INDEX CONCURRENTLY IF NOT EXISTS idx ON t (c)");
        assert_eq!(
            stmt.shape,
            StatementShape::CreateIndex {
                index: Some("idx".to_string()),
                unique: false,
            }
        );

        let stmt = Statement::parse("CREATE INDEX ON users (email)");
        assert_eq!(
            stmt.shape,
            StatementShape::CreateIndex {
                index: None,
                unique: false,
            }
        );
    }

    #[test]
    fn classify_alter_table_add_constraint() {
        let stmt =
            Statement::parse("ALTER TABLE orders ADD CONSTRAINT orders_pk PRIMARY KEY (id)");
        assert_eq!(
            stmt.shape,
            StatementShape::AlterTableAddConstraint {
                table: "orders".to_string(),
                identifier: "orders_pk".to_string(),
                kind: Some(ConstraintKind::PrimaryKey),
            }
        );

        let stmt = Statement::parse(
            "ALTER TABLE\n  orders\nADD CONSTRAINT orders_user_fk foreign key (user_id) REFERENCES users (id)",
        );
        assert_eq!(
            stmt.shape,
            StatementShape::AlterTableAddConstraint {
                table: "orders".to_string(),
                identifier: "orders_user_fk".to_string(),
                kind: Some(ConstraintKind::ForeignKey),
            }
        );

        let stmt = Statement::parse("ALTER TABLE ONLY t ADD CONSTRAINT t_uq UNIQUE (a)");
        assert!(matches!(
            stmt.shape,
            StatementShape::AlterTableAddConstraint {
                kind: Some(ConstraintKind::Unique),
                ..
            }
        ));

        let stmt = Statement::parse("ALTER TABLE t ADD CONSTRAINT t_ck CHECK (a > 0)");
        assert!(matches!(
            stmt.shape,
            StatementShape::AlterTableAddConstraint {
                kind: Some(ConstraintKind::Other(ref k)),
                ..
            } if k == "CHECK"
        ));
    }

    #[test]
    fn unrecognized_shapes() {
        for sql in [
            "DROP TABLE users",
            "ALTER TABLE users ADD COLUMN name text",
            "COMMENT ON TABLE users IS 'x'",
            "CREATE VIEW v AS SELECT 1",
        ] {
            assert_eq!(Statement::parse(sql).kind(), StatementKind::Unrecognized, "{sql}");
        }
    }

    #[test]
    fn leading_comments_are_skipped() {
        let stmt = Statement::parse("-- users\n-- owned by billing\nCREATE TABLE users (id int)");
        assert_eq!(stmt.kind(), StatementKind::CreateTable);
        assert_eq!(Statement::parse("-- only a comment").kind(), StatementKind::Unrecognized);
    }
}
