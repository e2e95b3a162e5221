mod check;
mod cli;
mod config;

use tracing_subscriber::EnvFilter;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help => {
            cli::print_help();
            Ok(())
        }
        cli::Command::Check(args) => {
            init_logging(args.verbose);
            check::run(args).await
        }
    }
}

/// Logs go to stderr so a clean pass prints nothing on stdout.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("DDLCHECK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
