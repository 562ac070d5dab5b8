use clap::{Parser, Subcommand};

/// cronicorn — an adaptive HTTP endpoint scheduler.
#[derive(Debug, Parser)]
#[command(name = "cronicorn", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduler, planner, and API server (default).
    Serve,
    /// Print the resolved configuration and exit.
    Doctor,
}

/// Load configuration from the path named by `CRONICORN_CONFIG` (or
/// `config.toml` by default), falling back to built-in defaults if the
/// file doesn't exist.
pub fn load_config() -> anyhow::Result<(cronicorn_domain::Config, String)> {
    let config_path = std::env::var("CRONICORN_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        cronicorn_domain::Config::default()
    };

    Ok((config, config_path))
}
