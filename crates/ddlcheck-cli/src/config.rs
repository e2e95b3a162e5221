use ddlcheck::EngineConfig;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_path: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to load config file {}: {e:#}",
                config_path.display()
            )
        })?;

        Ok(Self { config_path, file })
    }

    /// Load `path` if it exists; a missing file that was not asked for means defaults.
    pub fn load_or_default(path: &Path, explicit: bool) -> anyhow::Result<Option<Self>> {
        if !explicit && !path.exists() {
            return Ok(None);
        }
        Self::load(path.to_path_buf()).map(Some)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,

    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub image: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub ready_timeout_secs: Option<u64>,
    /// docker-compatible binary, e.g. `podman`.
    pub docker: Option<String>,
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.expand_env()?;
        file.validate()?;
        Ok(file)
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        let e = &mut self.engine;
        for v in [
            &mut e.image,
            &mut e.user,
            &mut e.password,
            &mut e.database,
            &mut e.host,
            &mut e.docker,
        ]
        .into_iter()
        .flatten()
        {
            *v = expand_env_vars(v)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if let Some(docker) = &self.engine.docker {
            if docker.trim().is_empty() {
                anyhow::bail!("engine.docker must not be empty");
            }
        }
        self.engine_config().validate()?;
        Ok(())
    }

    /// Defaults overridden by whatever the file sets.
    pub fn engine_config(&self) -> EngineConfig {
        let e = &self.engine;
        let mut cfg = EngineConfig::default();
        if let Some(v) = &e.image {
            cfg.image = v.clone();
        }
        if let Some(v) = &e.user {
            cfg.user = v.clone();
        }
        if let Some(v) = &e.password {
            cfg.password = v.clone();
        }
        if let Some(v) = &e.database {
            cfg.database = v.clone();
        }
        if let Some(v) = e.port {
            cfg.container_port = v;
        }
        if let Some(v) = &e.host {
            cfg.host = v.clone();
        }
        if let Some(v) = e.poll_interval_ms {
            cfg.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = e.ready_timeout_secs {
            cfg.ready_timeout = Duration::from_secs(v);
        }
        cfg
    }
}

/// `${NAME}` references; the closing brace is optional so an unterminated
/// reference can be reported instead of copied through.
fn env_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{(?P<name>[^}]*)(?P<close>\})?").expect("invalid built-in env reference regex")
    })
}

/// Replace every `${NAME}` in a config value with the environment value.
fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;

    for caps in env_ref_re().captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let name = &caps["name"];
        if caps.name("close").is_none() {
            anyhow::bail!("unterminated env var reference in config: ${{{name}");
        }
        if name.trim().is_empty() {
            anyhow::bail!("empty env var reference in config: ${{{name}}}");
        }
        let value = std::env::var(name)
            .map_err(|_| anyhow::anyhow!("config references unset env var {name}"))?;

        out.push_str(&input[copied..whole.start()]);
        out.push_str(&value);
        copied = whole.end();
    }
    out.push_str(&input[copied..]);

    Ok(out)
}
