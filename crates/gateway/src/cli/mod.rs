//! Command-line interface: `serve` (default), `config` inspection and
//! editing over dot-separated key paths, and `version`.

pub mod pid;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;

use gc_domain::config::{self, Config};

#[derive(Parser)]
#[command(name = "gopherclaw", about = "Self-hosted personal AI assistant daemon")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "gopherclaw.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon (the default when no subcommand is given).
    Serve,
    /// Inspect or edit the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version and exit.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the whole config with secrets masked.
    Show,
    /// Print one value by dot-separated key (e.g. `llm.model`).
    Get { key: String },
    /// Set one value by dot-separated key and rewrite the file.
    Set { key: String, value: String },
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    Ok(config)
}

/// Run one of the `config` subcommands against the file at `path`.
pub fn config_command(path: &Path, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let doc = load_document(path)?;
            let masked = config::mask_secrets(&doc);
            println!("{}", serde_json::to_string_pretty(&masked)?);
        }
        ConfigCommand::Get { key } => {
            let doc = load_document(path)?;
            let flat = config::flatten(&doc);
            match flat.get(&key) {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("unknown config key \"{key}\""),
            }
        }
        ConfigCommand::Set { key, value } => {
            let doc = load_document(path)?;
            let mut flat = config::flatten(&doc);
            flat.insert(key.clone(), parse_scalar(&value));
            save_document(path, &config::unflatten(&flat))?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}

/// Read the config file as a JSON document (defaults when absent).
fn load_document(path: &Path) -> anyhow::Result<Value> {
    let config = Config::load(path)?;
    Ok(serde_json::to_value(&config)?)
}

fn save_document(path: &Path, doc: &Value) -> anyhow::Result<()> {
    // Round-trip through the typed config so bad keys or types fail here
    // instead of at the next daemon start.
    let config: Config = serde_json::from_value(doc.clone())
        .map_err(|e| anyhow::anyhow!("rejected config change: {e}"))?;
    let toml = toml::to_string_pretty(&config)?;
    std::fs::write(path, toml)?;
    Ok(())
}

/// Interpret a CLI value string: numbers, booleans, and JSON arrays pass
/// through typed; everything else stays a string.
fn parse_scalar(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        match value {
            Value::String(_) => Value::String(raw.to_owned()),
            typed => typed,
        }
    } else {
        Value::String(raw.to_owned())
    }
}
