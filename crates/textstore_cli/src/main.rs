//! `textstore` line-protocol front end.
//!
//! # Responsibility
//! - Connect one storage backend at startup, or exit non-zero.
//! - Serve one command per stdin line and close the backend once at EOF.

mod command;

use clap::{Parser, ValueEnum};
use command::{dispatch, parse_line, Command};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use textstore_core::{
    connect_backend, default_log_level, init_logging, BackendConfig, DocumentStoreConfig,
    LogDestination, RecordService, RelationalStoreConfig,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Document,
    Relational,
}

#[derive(Debug, Parser)]
#[command(name = "textstore", version, about = "CRUD over MongoDB or a SQLite file")]
struct Cli {
    /// Backend to connect; falls back to TEXTSTORE_* environment variables.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// JSON backend config file; takes precedence over --backend and the
    /// environment. --uri, --path and --fresh still apply on top of it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// MongoDB connection string.
    #[arg(long)]
    uri: Option<String>,

    /// SQLite store file.
    #[arg(long)]
    path: Option<PathBuf>,

    /// Discard the SQLite file before opening it.
    #[arg(long)]
    fresh: bool,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for log files; logs go to stderr when absent.
    #[arg(long)]
    log_dir: Option<String>,
}

impl Cli {
    /// Base config from `--config`, `--backend`, or the environment, in that
    /// order, with `--uri`, `--path` and `--fresh` applied on top.
    fn backend_config(&self) -> Result<BackendConfig, String> {
        let config = match (&self.config, self.backend) {
            (Some(path), _) => BackendConfig::from_json_file(path).map_err(|err| err.to_string())?,
            (None, Some(BackendChoice::Document)) => {
                BackendConfig::Document(DocumentStoreConfig::default())
            }
            (None, Some(BackendChoice::Relational)) => {
                BackendConfig::Relational(RelationalStoreConfig::default())
            }
            (None, None) => BackendConfig::from_env().map_err(|err| err.to_string())?,
        };

        Ok(match config {
            BackendConfig::Document(mut settings) => {
                if let Some(uri) = &self.uri {
                    settings.uri = uri.clone();
                }
                BackendConfig::Document(settings)
            }
            BackendConfig::Relational(mut settings) => {
                if let Some(path) = &self.path {
                    settings.path = path.clone();
                }
                settings.fresh_on_open |= self.fresh;
                BackendConfig::Relational(settings)
            }
        })
    }

    fn log_destination(&self) -> Result<LogDestination, String> {
        match &self.log_dir {
            Some(dir) => LogDestination::directory(dir),
            None => Ok(LogDestination::Stderr),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = cli
        .log_destination()
        .and_then(|destination| init_logging(level, destination))
    {
        eprintln!("textstore: {err}");
        return ExitCode::FAILURE;
    }

    let config = match cli.backend_config() {
        Ok(config) => config,
        Err(err) => {
            error!("event=startup module=cli status=error error={err}");
            eprintln!("textstore: {err}");
            return ExitCode::FAILURE;
        }
    };

    let backend = match connect_backend(&config).await {
        Ok(backend) => backend,
        Err(err) => {
            error!(
                "event=startup module=cli status=error backend={} error={err}",
                config.name()
            );
            eprintln!("textstore: can not connect to {} backend: {err}", config.name());
            return ExitCode::FAILURE;
        }
    };
    info!(
        "event=startup module=cli status=ok backend={}",
        config.name()
    );

    let service = RecordService::new(backend);
    let served = serve(&service).await;

    let closed = service.shutdown().await;
    if let Err(err) = &closed {
        error!("event=shutdown module=cli status=error error={err}");
    }

    match (served, closed) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(err), _) => {
            eprintln!("textstore: {err}");
            ExitCode::FAILURE
        }
        (_, Err(_)) => ExitCode::FAILURE,
    }
}

async fn serve(service: &RecordService) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let response = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => dispatch(service, command).await,
            Err(err) => format!("error: {err}"),
        };
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use std::path::PathBuf;
    use textstore_core::{BackendConfig, RelationalStoreConfig};

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("backend.json");
        std::fs::write(
            &config_path,
            r#"{"backend":"relational","path":"/tmp/from-file.db","busy_timeout_ms":750}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "textstore",
            "--config",
            config_path.to_str().unwrap(),
            "--path",
            "/tmp/from-flag.db",
            "--fresh",
        ]);
        let BackendConfig::Relational(settings) = cli.backend_config().unwrap() else {
            panic!("expected relational config");
        };
        assert_eq!(settings.path, PathBuf::from("/tmp/from-flag.db"));
        assert!(settings.fresh_on_open);
        assert_eq!(settings.busy_timeout_ms, 750);
    }

    #[test]
    fn config_file_is_used_when_no_flags_are_given() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("backend.json");
        std::fs::write(&config_path, r#"{"backend":"relational","path":"/tmp/only.db"}"#).unwrap();

        let cli = Cli::parse_from(["textstore", "--config", config_path.to_str().unwrap()]);
        assert_eq!(
            cli.backend_config().unwrap(),
            BackendConfig::Relational(RelationalStoreConfig::at("/tmp/only.db"))
        );
    }

    #[test]
    fn uri_flag_overrides_document_defaults() {
        let cli = Cli::parse_from([
            "textstore",
            "--backend",
            "document",
            "--uri",
            "mongodb://db.internal:27017",
        ]);
        let BackendConfig::Document(settings) = cli.backend_config().unwrap() else {
            panic!("expected document config");
        };
        assert_eq!(settings.uri, "mongodb://db.internal:27017");
    }
}
