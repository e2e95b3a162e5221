//! Database client seam for the execution phase.
//!
//! Connecting and executing are separate steps because their failures mean
//! different things: a failed connect is usually the engine still booting and
//! is retried unless the server refused the credentials, a failed batch is
//! the engine rejecting the DDL.

use std::fmt;
use std::time::Duration;

use tokio_postgres::NoTls;

/// Per-attempt connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where to reach the ephemeral engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Endpoint {
    /// tokio-postgres config for this endpoint. Values are passed through the
    /// setters, so credentials may contain spaces or quotes.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.database)
            .connect_timeout(CONNECT_TIMEOUT);
        config
    }
}

/// A connect attempt that did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFailure {
    pub message: String,
    /// Whether another attempt may succeed (engine still booting).
    pub transient: bool,
}

impl ConnectFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// A refusal that will repeat on every attempt.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl From<tokio_postgres::Error> for ConnectFailure {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            // 28xxx: invalid authorization, 3D000: unknown database.
            Some(db) if db.code().code().starts_with("28") || db.code().code() == "3D000" => {
                ConnectFailure::fatal(e.to_string())
            }
            _ => ConnectFailure::transient(e.to_string()),
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The engine's answer to a rejected batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineFailure {
    /// Five character SQLSTATE, when the failure came from the server.
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    /// Full rendered text, as a user would see it from `psql`.
    pub text: String,
}

impl EngineFailure {
    /// Build from a server error with its SQLSTATE.
    pub fn from_server(
        severity: &str,
        code: &str,
        message: &str,
        detail: Option<&str>,
    ) -> Self {
        let mut text = format!("{severity}: {message}");
        if let Some(detail) = detail {
            text.push_str("\nDETAIL:  ");
            text.push_str(detail);
        }
        Self {
            code: Some(code.to_string()),
            message: message.to_string(),
            detail: detail.map(str::to_string),
            text,
        }
    }

    /// Build from a failure without structured fields.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            code: None,
            message: text.clone(),
            detail: None,
            text,
        }
    }
}

impl From<tokio_postgres::Error> for EngineFailure {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => EngineFailure::from_server(
                db.severity(),
                db.code().code(),
                db.message(),
                db.detail(),
            ),
            None => EngineFailure::from_text(e.to_string()),
        }
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An open connection able to run a SQL batch.
#[async_trait::async_trait]
pub trait DdlSession: Send {
    /// Execute `sql` (possibly several statements) as one batch.
    async fn batch_execute(&mut self, sql: &str) -> Result<(), EngineFailure>;
}

/// Opens sessions against an [`Endpoint`].
#[async_trait::async_trait]
pub trait EngineConnector: Send + Sync {
    type Session: DdlSession;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Session, ConnectFailure>;
}

/// tokio-postgres backed connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

/// A tokio-postgres client plus the task driving its connection.
pub struct PgSession {
    client: tokio_postgres::Client,
    connection: tokio::task::JoinHandle<()>,
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[async_trait::async_trait]
impl EngineConnector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, endpoint: &Endpoint) -> Result<PgSession, ConnectFailure> {
        let (client, connection) = endpoint.pg_config().connect(NoTls).await?;
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(target: "ddlcheck.engine", error = %e, "postgres connection closed");
            }
        });
        Ok(PgSession { client, connection })
    }
}

#[async_trait::async_trait]
impl DdlSession for PgSession {
    async fn batch_execute(&mut self, sql: &str) -> Result<(), EngineFailure> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(EngineFailure::from)
    }
}
