//! leadroute - command-line front end for the enquiry assignment engine

mod cli;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use leadroute_engine::EngineConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use output::Formatter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let formatter = Formatter::new(cli.format, !cli.no_color);

    match run(cli, &formatter).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", formatter.error(&format!("{:#}", e)));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, formatter: &Formatter) -> anyhow::Result<String> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    config.validate()?;
    init_logging(&config.logging.level);
    debug!("Using database {}", config.database.url);

    commands::execute(cli.command, config, &cli.actor, formatter).await
}

/// Explicit path must exist; the default location is optional
fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = explicit {
        return EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            EngineConfig::from_file(&path).with_context(|| format!("loading {}", path.display()))
        }
        _ => Ok(EngineConfig::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("leadroute").join("config.toml"))
}

/// Logs go to stderr so stdout stays machine readable
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[intake]\nduplicate_window_days = 3\n\n[database]\nurl = \"sqlite://x.db\"\nmax_connections = 2\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.intake.duplicate_window_days, 3);
        assert_eq!(config.database.max_connections, 2);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
