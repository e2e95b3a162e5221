//! Disposable Postgres instance used to prove a DDL batch executes.
//!
//! Lifecycle of one instance:
//!
//! ```text
//! Created -> PortPending -> PortBound -> ConnectPending -> Ready -> Executed -> Stopped
//! ```
//!
//! Port binding and connection readiness are polled at a fixed interval and share
//! one deadline ([`EngineConfig::ready_timeout`]). The DDL batch itself is sent once.
//! Once a container has been started it is stopped before [`EphemeralPostgres::execute`]
//! returns, whatever the outcome.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::client::{DdlSession, Endpoint, EngineConnector, EngineFailure, PgConnector};
use crate::error::{CheckError, CheckResult};
use crate::runtime::{ContainerId, ContainerRuntime, ContainerSpec, DockerCli};

/// Configuration of the ephemeral engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pinned engine image.
    pub image: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Engine port inside the container.
    pub container_port: u16,
    /// Host the published port is reached on.
    pub host: String,
    /// Delay between readiness polls.
    pub poll_interval: Duration,
    /// Upper bound for port binding plus connection readiness.
    pub ready_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image: "postgres:15".to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            database: "postgres".to_string(),
            container_port: 5432,
            host: "localhost".to_string(),
            poll_interval: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Reject values that would make the orchestrator misbehave.
    pub fn validate(&self) -> CheckResult<()> {
        if self.image.trim().is_empty() {
            return Err(CheckError::Config("engine image must not be empty".into()));
        }
        if self.user.trim().is_empty() {
            return Err(CheckError::Config("engine user must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(CheckError::Config(
                "engine password must not be empty (the postgres image refuses to start without one)"
                    .into(),
            ));
        }
        if self.container_port == 0 {
            return Err(CheckError::Config("engine port must not be 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(CheckError::Config("poll interval must be positive".into()));
        }
        if self.ready_timeout < self.poll_interval {
            return Err(CheckError::Config(
                "ready timeout must be at least one poll interval".into(),
            ));
        }
        Ok(())
    }

    fn port_key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }

    fn container_spec(&self) -> ContainerSpec {
        let mut env = BTreeMap::new();
        env.insert("POSTGRES_USER".to_string(), self.user.clone());
        env.insert("POSTGRES_PASSWORD".to_string(), self.password.clone());
        env.insert("POSTGRES_DB".to_string(), self.database.clone());
        ContainerSpec {
            image: self.image.clone(),
            port: self.port_key(),
            env,
        }
    }

    fn endpoint(&self, port: u16) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

/// Lifecycle state of an [`EphemeralInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Created,
    PortPending,
    PortBound,
    ConnectPending,
    Ready,
    Executed { success: bool },
    Stopped,
}

/// One disposable engine container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralInstance {
    pub id: ContainerId,
    pub host_port: Option<u16>,
    pub state: InstanceState,
}

impl EphemeralInstance {
    fn new(id: ContainerId) -> Self {
        Self {
            id,
            host_port: None,
            state: InstanceState::Created,
        }
    }

    fn transition(&mut self, state: InstanceState) {
        tracing::debug!(
            target: "ddlcheck.engine",
            container = %self.id,
            from = ?self.state,
            to = ?state,
            "instance state"
        );
        self.state = state;
    }
}

/// Result of running the DDL once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    /// The engine rejected the batch.
    Rejected(EngineFailure),
}

/// Orchestrates one disposable engine per [`execute`](Self::execute) call.
pub struct EphemeralPostgres<R = DockerCli, C = PgConnector> {
    runtime: R,
    connector: C,
    config: EngineConfig,
}

impl EphemeralPostgres {
    /// Docker plus tokio-postgres.
    pub fn docker(config: EngineConfig) -> Self {
        Self::new(DockerCli::new(), PgConnector, config)
    }
}

impl<R, C> EphemeralPostgres<R, C>
where
    R: ContainerRuntime,
    C: EngineConnector,
{
    pub fn new(runtime: R, connector: C, config: EngineConfig) -> Self {
        Self {
            runtime,
            connector,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a fresh instance, run `ddl` on it once, and tear it down.
    ///
    /// Returns `Err` only for orchestration faults (runtime failures, readiness
    /// timeout). A rejected batch is `Ok(ExecutionOutcome::Rejected(..))`.
    pub async fn execute(&self, ddl: &str) -> CheckResult<ExecutionOutcome> {
        self.config.validate()?;
        self.ensure_image().await?;

        let spec = self.config.container_spec();
        let id = self.runtime.run(&spec).await?;
        tracing::info!(target: "ddlcheck.engine", container = %id, image = %spec.image, "started postgres");

        let mut instance = EphemeralInstance::new(id);
        let result = self.run_on(&mut instance, ddl).await;

        match self.runtime.stop(&instance.id).await {
            Ok(()) => {
                instance.transition(InstanceState::Stopped);
                tracing::info!(target: "ddlcheck.engine", container = %instance.id, "stopped postgres");
            }
            Err(e) => {
                tracing::warn!(target: "ddlcheck.engine", container = %instance.id, error = %e, "failed to stop postgres");
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        result
    }

    async fn ensure_image(&self) -> CheckResult<()> {
        let image = &self.config.image;
        if self.runtime.image_exists(image).await? {
            return Ok(());
        }
        tracing::info!(target: "ddlcheck.engine", image = %image, "pulling image");
        self.runtime.pull_image(image).await
    }

    async fn run_on(
        &self,
        instance: &mut EphemeralInstance,
        ddl: &str,
    ) -> CheckResult<ExecutionOutcome> {
        let deadline = Instant::now() + self.config.ready_timeout;

        let port = self.wait_for_port(instance, deadline).await?;
        let mut session = self.wait_for_session(instance, port, deadline).await?;

        let outcome = match session.batch_execute(ddl).await {
            Ok(()) => ExecutionOutcome::Success,
            Err(failure) => ExecutionOutcome::Rejected(failure),
        };
        instance.transition(InstanceState::Executed {
            success: outcome == ExecutionOutcome::Success,
        });
        tracing::info!(
            target: "ddlcheck.engine",
            container = %instance.id,
            success = outcome == ExecutionOutcome::Success,
            "executed ddl"
        );
        Ok(outcome)
    }

    async fn wait_for_port(
        &self,
        instance: &mut EphemeralInstance,
        deadline: Instant,
    ) -> CheckResult<u16> {
        instance.transition(InstanceState::PortPending);
        let port_key = self.config.port_key();
        loop {
            if let Some(port) = self.runtime.host_port(&instance.id, &port_key).await? {
                instance.host_port = Some(port);
                instance.transition(InstanceState::PortBound);
                tracing::info!(target: "ddlcheck.engine", container = %instance.id, port, "port bound");
                return Ok(port);
            }
            tracing::debug!(target: "ddlcheck.engine", container = %instance.id, "port not bound yet");
            self.pause_until(deadline).await?;
        }
    }

    async fn wait_for_session(
        &self,
        instance: &mut EphemeralInstance,
        port: u16,
        deadline: Instant,
    ) -> CheckResult<C::Session> {
        instance.transition(InstanceState::ConnectPending);
        let endpoint = self.config.endpoint(port);
        loop {
            match self.connector.connect(&endpoint).await {
                Ok(session) => {
                    instance.transition(InstanceState::Ready);
                    tracing::info!(target: "ddlcheck.engine", container = %instance.id, "postgres ready");
                    return Ok(session);
                }
                Err(e) if e.transient => {
                    tracing::debug!(target: "ddlcheck.engine", container = %instance.id, error = %e, "postgres not ready yet");
                }
                Err(e) => return Err(CheckError::Connect(e.message)),
            }
            self.pause_until(deadline).await?;
        }
    }

    /// Sleep one poll interval, or fail if that would pass the deadline.
    async fn pause_until(&self, deadline: Instant) -> CheckResult<()> {
        let now = Instant::now();
        if now + self.config.poll_interval > deadline {
            return Err(CheckError::NotReady {
                waited: self.config.ready_timeout,
            });
        }
        sleep(self.config.poll_interval).await;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn success_path_stops_container() {
        let (runtime, connector) = pair(
            FakeRuntime::binding_after(3, 49153),
            FakeConnector {
                refuse: 2,
                ..Default::default()
            },
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let outcome = engine.execute("CREATE TABLE t (id int PRIMARY KEY);").await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Success);

        let calls = calls.lock().unwrap();
        assert!(calls.pulled.is_empty());
        assert_eq!(calls.started.len(), 1);
        assert_eq!(calls.started[0].port, "5432/tcp");
        assert_eq!(
            calls.started[0].env.get("POSTGRES_PASSWORD").map(String::as_str),
            Some("password")
        );
        assert_eq!(calls.port_polls, 4);
        assert_eq!(calls.connects, 3);
        assert_eq!(calls.executed, vec!["CREATE TABLE t (id int PRIMARY KEY);"]);
        assert_eq!(calls.stopped, vec![ContainerId("c0ffee".to_string())]);
    }

    #[tokio::test]
    async fn missing_image_is_pulled() {
        let (runtime, connector) = pair(
            FakeRuntime {
                image_present: false,
                ..FakeRuntime::binding_after(0, 5555)
            },
            FakeConnector::default(),
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());
        engine.execute("SELECT 1").await.unwrap();
        assert_eq!(calls.lock().unwrap().pulled, vec!["postgres:15"]);
    }

    #[tokio::test]
    async fn rejected_ddl_is_not_retried_and_container_stops() {
        let failure = EngineFailure::from_server("ERROR", "42601", "syntax error", None);
        let (runtime, connector) = pair(
            FakeRuntime::binding_after(0, 5555),
            FakeConnector {
                reject_with: Some(failure.clone()),
                ..Default::default()
            },
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let outcome = engine.execute("CREATE TABEL t ();").await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Rejected(failure));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.executed.len(), 1);
        assert_eq!(calls.stopped.len(), 1);
    }

    #[tokio::test]
    async fn port_never_bound_times_out_and_stops() {
        let (runtime, connector) = pair(FakeRuntime::never_binding(), FakeConnector::default());
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::NotReady { .. }), "{err}");
        assert!(err.is_orchestration_fault());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 0);
        assert!(calls.executed.is_empty());
        assert_eq!(calls.stopped.len(), 1);
    }

    #[tokio::test]
    async fn engine_never_accepting_connections_times_out() {
        let (runtime, connector) = pair(
            FakeRuntime::binding_after(0, 5555),
            FakeConnector {
                refuse: usize::MAX,
                ..Default::default()
            },
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::NotReady { .. }));

        let calls = calls.lock().unwrap();
        assert!(calls.connects > 1);
        assert!(calls.executed.is_empty());
        assert_eq!(calls.stopped.len(), 1);
    }

    #[tokio::test]
    async fn start_failure_is_an_orchestration_fault() {
        let (runtime, connector) = pair(
            FakeRuntime {
                fail_run: true,
                ..FakeRuntime::binding_after(0, 5555)
            },
            FakeConnector::default(),
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::Runtime(_)));
        // Nothing was started, so nothing is stopped.
        assert!(calls.lock().unwrap().stopped.is_empty());
    }

    #[tokio::test]
    async fn stop_failure_after_success_is_returned() {
        let (runtime, connector) = pair(
            FakeRuntime {
                fail_stop: true,
                ..FakeRuntime::binding_after(0, 5555)
            },
            FakeConnector::default(),
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::Runtime(ref m) if m.contains("stop")), "{err}");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.executed.len(), 1);
        assert_eq!(calls.stopped.len(), 1);
    }

    #[tokio::test]
    async fn stop_failure_does_not_mask_timeout() {
        let (runtime, connector) = pair(
            FakeRuntime {
                fail_stop: true,
                ..FakeRuntime::never_binding()
            },
            FakeConnector::default(),
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::NotReady { .. }), "{err}");
        assert_eq!(calls.lock().unwrap().stopped.len(), 1);
    }

    #[tokio::test]
    async fn inspect_failure_still_stops_container() {
        let (runtime, connector) = pair(
            FakeRuntime {
                fail_inspect: true,
                ..FakeRuntime::binding_after(0, 5555)
            },
            FakeConnector::default(),
        );
        let calls = runtime.calls.clone();
        let engine = EphemeralPostgres::new(runtime, connector, fast_config());

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::Runtime(ref m) if m.contains("inspect")), "{err}");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 0);
        assert_eq!(calls.stopped, vec![ContainerId("c0ffee".to_string())]);
    }

    #[tokio::test]
    async fn denied_connection_fails_fast() {
        let (runtime, connector) = pair(
            FakeRuntime::binding_after(0, 5555),
            FakeConnector {
                deny: true,
                ..Default::default()
            },
        );
        let calls = runtime.calls.clone();
        let config = fast_config().ready_timeout(Duration::from_secs(30));
        let engine = EphemeralPostgres::new(runtime, connector, config);

        let started = Instant::now();
        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CheckError::Connect(ref m) if m.contains("authentication")), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.stopped.len(), 1);
    }

    #[test]
    fn password_with_spaces_reaches_the_connection() {
        let config = EngineConfig::default().password("my secret");
        assert!(config.validate().is_ok());
        let pg = config.endpoint(49153).pg_config();
        assert_eq!(pg.get_password(), Some(&b"my secret"[..]));
        assert_eq!(pg.get_ports(), &[49153]);
    }

    #[test]
    fn config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default().image(" ").validate().is_err());
        assert!(EngineConfig::default().password("").validate().is_err());
        assert!(
            EngineConfig::default()
                .poll_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            EngineConfig::default()
                .poll_interval(Duration::from_secs(2))
                .ready_timeout(Duration::from_secs(1))
                .validate()
                .is_err()
        );
    }
}
