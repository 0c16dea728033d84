//! `keel`: resolve, check and watch property files.
//!
//! ```text
//! keel resolve client.properties -D HOST=grid.example.org --json
//! keel check client.properties
//! keel watch client.properties --interval 5
//! ```
//!
//! Resolved properties go to stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keel_config::{
    ConfigLoader, ConfigurationStore, Properties, PropertyGroup, PropertySchema, SystemProperties,
    ValidationMode,
};
use keel_telemetry::{init_logging, LogConfig, LogFormat};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Resolve includes and variables in property files", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter directive, e.g. "debug" or "keel_config=trace"
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format: json or pretty
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fully resolved properties
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Only print keys starting with this prefix (repeatable)
        #[arg(long = "prefix", value_name = "PREFIX")]
        prefixes: Vec<String>,

        /// Print a JSON object instead of key=value lines
        #[arg(long)]
        json: bool,
    },
    /// Resolve the file and report the first error
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Reload the file whenever it changes
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between modification checks
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Property file to load
    file: PathBuf,

    /// Define a system property, e.g. -D HOST=grid.example.org
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    defines: Vec<String>,
}

impl SourceArgs {
    fn system_properties(&self) -> Result<SystemProperties> {
        self.defines
            .iter()
            .map(|definition| {
                SystemProperties::parse_definition(definition)
                    .with_context(|| format!("invalid definition '{definition}'"))
            })
            .collect()
    }

    fn loader(&self) -> Result<ConfigLoader> {
        Ok(ConfigLoader::new(Arc::new(PropertySchema::empty()))
            .with_system_properties(self.system_properties()?)
            .with_validation(ValidationMode::Eager))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::default()
        .with_level(cli.log_level.as_str())
        .with_format(cli.log_format);
    init_logging(&log_config).context("failed to initialize logging")?;

    match cli.command {
        Commands::Resolve {
            source,
            prefixes,
            json,
        } => resolve(&source, &prefixes, json),
        Commands::Check { source } => check(&source),
        Commands::Watch { source, interval } => watch(&source, Duration::from_secs(interval.max(1))).await,
    }
}

fn load(source: &SourceArgs) -> Result<Properties> {
    let config = source
        .loader()?
        .load_file(&source.file)
        .with_context(|| format!("failed to load {}", source.file.display()))?;
    Ok(config.properties().clone())
}

fn resolve(source: &SourceArgs, prefixes: &[String], json: bool) -> Result<()> {
    let mut properties = load(source)?;
    if !prefixes.is_empty() {
        properties = PropertyGroup::with_prefixes(prefixes.iter().cloned()).filter(&properties);
    }

    let mut entries: Vec<(&str, &str)> = properties.iter().collect();
    entries.sort_unstable_by_key(|(key, _)| *key);

    if json {
        let object: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&object)?);
    } else {
        for (key, value) in entries {
            println!("{key}={value}");
        }
    }
    Ok(())
}

fn check(source: &SourceArgs) -> Result<()> {
    let properties = load(source)?;
    println!("{}: ok ({} properties)", source.file.display(), properties.len());
    Ok(())
}

async fn watch(source: &SourceArgs, interval: Duration) -> Result<()> {
    let store = open_store(&source.file, source.system_properties()?)?;
    store.on_change(|change| {
        info!(
            changed = change.changed_keys.len(),
            keys = ?change.changed_keys,
            "configuration changed"
        );
    });

    info!(
        path = %source.file.display(),
        properties = store.current().properties().len(),
        interval_secs = interval.as_secs(),
        "watching configuration"
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = store.reload_if_changed() {
                    warn!(error = %e, "keeping previous configuration");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

fn open_store(path: &Path, system: SystemProperties) -> Result<ConfigurationStore> {
    ConfigurationStore::builder(path, Arc::new(PropertySchema::empty()))
        .system_properties(system)
        .open()
        .with_context(|| format!("failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_defines() {
        let cli = Cli::parse_from([
            "keel", "resolve", "a.properties", "-D", "HOST=x", "-D", "PORT=1", "--json",
        ]);
        match cli.command {
            Commands::Resolve { source, json, .. } => {
                assert!(json);
                let system = source.system_properties().unwrap();
                assert_eq!(system.get("HOST"), Some("x"));
                assert_eq!(system.get("PORT"), Some("1"));
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_invalid_define_is_rejected() {
        let cli = Cli::parse_from(["keel", "check", "a.properties", "-D", "novalue"]);
        match cli.command {
            Commands::Check { source } => assert!(source.system_properties().is_err()),
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_log_format_option() {
        let cli = Cli::parse_from(["keel", "--log-format", "json", "check", "a.properties"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
