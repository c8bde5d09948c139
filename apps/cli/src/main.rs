use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cellar_resource::RuntimeConfig;
use clap::{Args, Parser, Subcommand};

mod prefab;
mod simulate;

/// Cellar asset cache and object pool driver
#[derive(Parser)]
#[command(name = "cellar", version)]
#[command(about = "Drive the cellar asset cache and object pools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective runtime configuration as TOML
    Config(ConfigArgs),
    /// Spawn and despawn pooled sprites against an in-memory loader
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Runtime configuration file (TOML)
    #[arg(short, long, env = "CELLAR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct SimulateArgs {
    /// Runtime configuration file (TOML)
    #[arg(short, long, env = "CELLAR_CONFIG")]
    config: Option<PathBuf>,

    /// Sprites spawned per prefab in each round
    #[arg(long, default_value_t = 8)]
    spawns: usize,

    /// Prefab keys to spawn
    #[arg(long, value_delimiter = ',', default_value = "bullet,spark")]
    prefabs: Vec<String>,

    /// Simulated load latency in milliseconds
    #[arg(long, default_value_t = 5)]
    latency_ms: u64,

    /// Log output format: pretty, compact or json
    #[arg(long, env = cellar_log::ENV_FORMAT, default_value = "compact")]
    log_format: cellar_log::Format,

    /// Log filter directives
    #[arg(long, env = cellar_log::ENV_LEVEL, default_value = "info")]
    log_level: String,
}

/// File (if any), then environment overrides
fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config
        .with_env_overrides()
        .context("applying environment overrides")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => {
            let config = load_config(args.config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
        Commands::Simulate(args) => {
            let _guard = cellar_log::init(cellar_log::Config {
                level: args.log_level,
                format: args.log_format,
                ..cellar_log::Config::from_env()
            })?;

            let config = load_config(args.config.as_deref())?;
            let options = simulate::Options {
                spawns: args.spawns,
                prefabs: args.prefabs,
                latency: Duration::from_millis(args.latency_ms),
            };
            tracing::info!(
                spawns = options.spawns,
                prefabs = ?options.prefabs,
                "Starting simulation"
            );

            let report = simulate::run(&config, &options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn simulate_arguments_parse() {
        let cli = Cli::try_parse_from([
            "cellar",
            "simulate",
            "--spawns",
            "3",
            "--prefabs",
            "bullet,popup",
            "--log-format",
            "json",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.spawns, 3);
        assert_eq!(args.prefabs, vec!["bullet", "popup"]);
        assert_eq!(args.log_format, cellar_log::Format::Json);
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[pool]\ndefault_preload = 6\n").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.pool.default_preload, 6);
    }
}
