//! Container runtime used to host the ephemeral engine.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fmt;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{CheckError, CheckResult};

/// Identity of a running container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, like `docker ps`.
        let short = self.0.get(..12).unwrap_or(&self.0);
        f.write_str(short)
    }
}

/// What to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// Container port to publish on an OS-assigned host port, e.g. `5432/tcp`.
    pub port: String,
    pub env: BTreeMap<String, String>,
}

/// Operations the orchestrator needs from a container platform.
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether `image` is available locally.
    async fn image_exists(&self, image: &str) -> CheckResult<bool>;

    async fn pull_image(&self, image: &str) -> CheckResult<()>;

    /// Start a detached, auto-removed container.
    async fn run(&self, spec: &ContainerSpec) -> CheckResult<ContainerId>;

    /// The host port currently bound to `port` inside the container, if any.
    async fn host_port(&self, id: &ContainerId, port: &str) -> CheckResult<Option<u16>>;

    /// Stop the container; auto-remove releases it afterwards.
    async fn stop(&self, id: &ContainerId) -> CheckResult<()>;
}

/// Drives the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different docker-compatible binary (e.g. `podman`).
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn output<I, S>(&self, args: I) -> CheckResult<std::process::Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CheckError::runtime(format!("failed to run {}: {e}", self.program)))
    }

    async fn checked<I, S>(&self, what: &str, args: I) -> CheckResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let out = self.output(args).await?;
        if !out.status.success() {
            return Err(CheckError::runtime(format!(
                "{} {what} failed ({}): {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerCli {
    async fn image_exists(&self, image: &str) -> CheckResult<bool> {
        let out = self.output(["image", "inspect", "--format", "{{.Id}}", image]).await?;
        Ok(out.status.success())
    }

    async fn pull_image(&self, image: &str) -> CheckResult<()> {
        self.checked("pull", ["pull", "--quiet", image]).await?;
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> CheckResult<ContainerId> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--rm".to_string(),
            "--publish".to_string(),
            spec.port.clone(),
        ];
        for (key, value) in &spec.env {
            args.push("--env".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image.clone());

        let stdout = self.checked("run", &args).await?;
        // `docker run` may print pull progress before the id; the id is the last line.
        let id = stdout
            .lines()
            .last()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CheckError::runtime("docker run did not report a container id"))?;
        Ok(ContainerId(id.to_string()))
    }

    async fn host_port(&self, id: &ContainerId, port: &str) -> CheckResult<Option<u16>> {
        let stdout = self
            .checked(
                "inspect",
                ["inspect", "--format", "{{json .NetworkSettings.Ports}}", id.0.as_str()],
            )
            .await?;
        parse_port_bindings(&stdout, port)
    }

    async fn stop(&self, id: &ContainerId) -> CheckResult<()> {
        self.checked("stop", ["stop", id.0.as_str()]).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

/// Extract the host port bound to `port` from `docker inspect` port JSON.
///
/// An IPv4 wildcard binding wins over others; unbound ports (`null` or empty
/// lists, as reported while the container is starting) yield `None`.
pub fn parse_port_bindings(json: &str, port: &str) -> CheckResult<Option<u16>> {
    let json = json.trim();
    if json.is_empty() || json == "null" {
        return Ok(None);
    }
    let ports: HashMap<String, Option<Vec<PortBinding>>> = serde_json::from_str(json)?;
    let Some(Some(bindings)) = ports.get(port) else {
        return Ok(None);
    };

    let parsed = |b: &PortBinding| b.host_port.parse::<u16>().ok().filter(|p| *p != 0);
    let port = bindings
        .iter()
        .filter(|b| b.host_ip == "0.0.0.0")
        .find_map(parsed)
        .or_else(|| bindings.iter().find_map(parsed));
    Ok(port)
}
