use crate::cli::CheckArgs;
use crate::config::ProjectConfig;
use ddlcheck::{DdlChecker, Diagnostic, DockerCli, EngineConfig, EphemeralPostgres, PgConnector};
use std::io::ErrorKind;
use std::path::Path;

pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let ddl = read_ddl(&args.file)?;

    let project = ProjectConfig::load_or_default(&args.config, args.config_explicit)?;
    let (engine_cfg, docker) = match &project {
        Some(project) => {
            tracing::debug!(config = %project.config_path.display(), "loaded config");
            (project.file.engine_config(), project.file.engine.docker.clone())
        }
        None => (EngineConfig::default(), None),
    };

    let mut runtime = DockerCli::new();
    if let Some(program) = docker {
        runtime = runtime.program(program);
    }
    let engine = EphemeralPostgres::new(runtime, PgConnector, engine_cfg);

    let diagnostics = DdlChecker::new(ddl)
        .check(&engine)
        .await
        .map_err(|e| anyhow::anyhow!("failed to check {}: {e}", args.file.display()))?;

    if diagnostics.is_empty() {
        return Ok(());
    }

    print_report(&args.file, &diagnostics);
    anyhow::bail!(summary(&args.file, diagnostics.len()))
}

/// One-line failure summary, printed to stderr by `main`.
fn summary(path: &Path, problems: usize) -> String {
    format!("{problems} problem(s) found in {}", path.display())
}

fn read_ddl(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => anyhow::anyhow!("DDL file does not exist: {}", path.display()),
        _ => anyhow::anyhow!("failed to read {}: {e}", path.display()),
    })
}

fn print_report(path: &Path, diagnostics: &[Diagnostic]) {
    print!("{}", render_report(path, diagnostics));
}

fn render_report(path: &Path, diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("\n{}\n\n", path.display());
    for d in diagnostics {
        out.push_str(&d.message);
        out.push('\n');
    }
    out
}
