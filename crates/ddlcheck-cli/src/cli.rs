use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "ddlcheck.toml";

#[derive(Debug, Clone)]
pub enum Command {
    Help,
    Check(CheckArgs),
}

#[derive(Debug, Clone)]
pub struct CheckArgs {
    pub config: PathBuf,
    /// Whether `--config` was given explicitly (then the file must exist).
    pub config_explicit: bool,
    pub verbose: bool,
    pub file: PathBuf,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(|s| s.as_str());

    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut config_explicit = false;
    let mut verbose = false;
    let mut files: Vec<PathBuf> = Vec::new();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--verbose" => verbose = true,
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
                config_explicit = true;
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
                config_explicit = true;
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown argument: {other}")
            }
            other => files.push(PathBuf::from(other)),
        }
    }

    let file = match files.len() {
        0 => anyhow::bail!("no DDL file given (usage: `ddlcheck <DDL_FILE>`)"),
        1 => files.remove(0),
        _ => anyhow::bail!("expected exactly one DDL file, got {}", files.len()),
    };

    Ok(Command::Check(CheckArgs {
        config,
        config_explicit,
        verbose,
        file,
    }))
}

pub fn print_help() {
    println!(
        "\
ddlcheck - check a Postgres DDL file before it is committed

USAGE:
  ddlcheck [OPTIONS] <DDL_FILE>

Checks naming rules and primary keys, then runs the DDL once on a
throwaway postgres container (requires docker).

OPTIONS:
  --config <FILE>       Config file path (default: ddlcheck.toml, optional)
  -v, --verbose         Log container lifecycle to stderr
  -h, --help            Print help

ENVIRONMENT:
  DDLCHECK_LOG          tracing filter (overrides --verbose)

EXIT STATUS:
  0 when no problems were found, 1 otherwise."
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("ddlcheck")
            .chain(v.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parse_single_file() {
        let cmd = parse_args(&args(&["schema.sql"])).unwrap();
        let Command::Check(check) = cmd else {
            panic!("expected check");
        };
        assert_eq!(check.file, PathBuf::from("schema.sql"));
        assert_eq!(check.config, PathBuf::from(DEFAULT_CONFIG));
        assert!(!check.config_explicit);
        assert!(!check.verbose);
    }

    #[test]
    fn parse_options() {
        let cmd = parse_args(&args(&["--config=ci/ddlcheck.toml", "-v", "db/schema.sql"])).unwrap();
        let Command::Check(check) = cmd else {
            panic!("expected check");
        };
        assert_eq!(check.config, PathBuf::from("ci/ddlcheck.toml"));
        assert!(check.config_explicit);
        assert!(check.verbose);
        assert_eq!(check.file, PathBuf::from("db/schema.sql"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = parse_args(&args(&[])).unwrap_err();
        assert!(err.to_string().contains("no DDL file given"));
    }

    #[test]
    fn extra_arguments_are_rejected() {
        assert!(parse_args(&args(&["a.sql", "b.sql"])).is_err());
        assert!(parse_args(&args(&["--deny-warnings", "a.sql"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
    }

    #[test]
    fn help_wins() {
        assert!(matches!(
            parse_args(&args(&["a.sql", "--help"])).unwrap(),
            Command::Help
        ));
    }
}
