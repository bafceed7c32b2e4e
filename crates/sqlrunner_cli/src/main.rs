//! `sqlrunner` command-line entry point.
//!
//! Runs one SQL script file transactionally and prints every statement's
//! output as JSON.

mod param;

use clap::Parser;
use log::error;
use sqlrunner_core::{
    default_log_level, init_logging, RunnerConfig, ScriptRunner, ScriptSource, Value,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "sqlrunner", version, about = "Run a SQL script in one transaction")]
struct Cli {
    /// Script file to execute.
    script: PathBuf,

    /// Database file; overrides the config file and SQLRUNNER_DB_PATH.
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// JSON runner config; replaces SQLRUNNER_* environment settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Positional parameter, repeatable, consumed in order.
    #[arg(short, long = "param", value_parser = param::parse_param)]
    params: Vec<Value>,

    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for log files; logging stays off without it.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("sqlrunner: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Some(dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &dir.to_string_lossy()).map_err(|err| err.to_string())?;
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    let runner = ScriptRunner::open(&config).map_err(|err| err.to_string())?;
    let outcome = runner
        .run_source(&ScriptSource::file(cli.script), cli.params)
        .map_err(|err| {
            error!(
                "event=cli_run module=cli status=error error_kind={:?}",
                err.kind()
            );
            format!("{:?} error: {err}", err.kind())
        })?;

    let rendered = serde_json::to_string_pretty(&outcome).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<RunnerConfig, String> {
    let Some(path) = path else {
        return RunnerConfig::from_env().map_err(|err| err.to_string());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
    let config: RunnerConfig = serde_json::from_str(&text)
        .map_err(|err| format!("invalid config `{}`: {err}", path.display()))?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use sqlrunner_core::Value;

    #[test]
    fn params_are_collected_in_order() {
        let cli = Cli::try_parse_from([
            "sqlrunner",
            "init.sql",
            "--param",
            "1",
            "-p",
            "Alice",
            "--database",
            "app.db",
        ])
        .expect("documented flags should parse");
        assert_eq!(
            cli.params,
            vec![Value::Integer(1), Value::Text("Alice".to_string())]
        );
        assert_eq!(cli.database.as_deref().and_then(|path| path.to_str()), Some("app.db"));
    }

    #[test]
    fn bad_blob_param_is_a_usage_error() {
        assert!(Cli::try_parse_from(["sqlrunner", "init.sql", "--param", "x'1'"]).is_err());
    }
}
