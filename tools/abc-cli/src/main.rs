//! abc-cli - register level access to a WaterFurnace Aurora ABC
//!
//! Reads and writes registers over a serial line or a `tcp://` bridge.

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use aurora_abc::{
    diff_registers, print_registers, AbcConfig, FetchOptions, Query, QueryExecutor,
    RegisterSnapshot, Registry, Setting,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;

#[derive(Parser)]
#[command(name = "abc-cli")]
#[command(about = "Register bus client for WaterFurnace Aurora ABC controllers")]
#[command(long_about = "Register bus client for WaterFurnace Aurora ABC controllers

Queries are comma separated addresses (745), ranges (740..747 or 740-747)
and the sets known, valid and all. Queries using a set skip registers the
device refuses; plain address lists fail on the first refusal.

Examples:
  abc-cli fetch 745,746                 # Setpoints
  abc-cli fetch valid --exhaustive      # Everything the device answers
  abc-cli set heating_target_temperature 68.5
  abc-cli write 340 5                   # Raw register write")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "AURORA_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device or tcp://host:port, overrides the configuration
    #[arg(short, long, global = true)]
    uri: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Read registers
    Fetch {
        /// Query expression
        query: String,

        /// Probe failing ranges register by register
        #[arg(short, long)]
        exhaustive: bool,

        /// Skip decoding
        #[arg(short, long)]
        raw: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Poll registers and print what changed
    Watch {
        query: String,

        /// Seconds between polls
        #[arg(short, long, default_value = "10")]
        interval: u64,

        /// Stop after this many polls
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Write a raw value to one register
    Write {
        #[arg(value_parser = parse_word)]
        address: u16,

        #[arg(value_parser = parse_word)]
        value: u16,
    },

    /// Write several registers in one transaction (ADDR=VALUE ...)
    WriteMany {
        #[arg(required = true, value_parser = parse_pair)]
        writes: Vec<(u16, u16)>,
    },

    /// Set a named property, validated and converted
    Set { property: String, value: String },

    /// List settable properties
    Properties,

    /// Send the vendor diagnostic request
    Diagnostic {
        #[arg(value_parser = parse_word)]
        first: u16,

        #[arg(value_parser = parse_word)]
        second: u16,
    },
}

/// Decimal or 0x-prefixed hex
fn parse_word(text: &str) -> std::result::Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    parsed.map_err(|e| format!("'{}' is not a 16-bit value: {}", text, e))
}

fn parse_pair(text: &str) -> std::result::Result<(u16, u16), String> {
    let (address, value) = text
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not ADDR=VALUE", text))?;
    Ok((parse_word(address)?, parse_word(value)?))
}

fn print_snapshot(
    registry: &Registry,
    snapshot: &RegisterSnapshot,
    raw: bool,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshot)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(snapshot)?),
        OutputFormat::Text if raw => {
            for (address, value) in snapshot.iter() {
                let word = value.as_raw().unwrap_or_default();
                println!("{:>5}: {:>5} (0x{:04x})", address, word, word);
            }
        }
        OutputFormat::Text => {
            for line in print_registers(registry, snapshot) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn connect(cli: &Cli) -> Result<QueryExecutor> {
    let mut config =
        AbcConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(uri) = &cli.uri {
        config.uri = uri.clone();
        config.validate()?;
    }
    QueryExecutor::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.uri))
}

async fn watch(
    executor: &QueryExecutor,
    query: &Query,
    interval: u64,
    count: Option<u64>,
) -> Result<()> {
    let registry = executor.registry();
    let mut previous = executor
        .fetch_decoded(query, FetchOptions::default())
        .await?;
    for line in print_registers(registry, &previous) {
        println!("{}", line);
    }

    let mut polls = 1;
    while count.map_or(true, |n| polls < n) {
        tokio::time::sleep(Duration::from_secs(interval)).await;
        let current = executor
            .fetch_decoded(query, FetchOptions::default())
            .await?;
        let changed = diff_registers(&previous, &current);
        if !changed.is_empty() {
            println!("{}", chrono::Local::now().format("%H:%M:%S").to_string().dimmed());
            for line in print_registers(registry, &changed) {
                println!("  {}", line.yellow());
            }
        }
        previous = current;
        polls += 1;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    logging::init(cli.verbose, !cli.no_color);

    match &cli.command {
        Commands::Properties => {
            for property in aurora_abc::PropertyTable::aurora().iter() {
                println!(
                    "{:<40} {:>5}  {:?}",
                    property.name.cyan(),
                    property.address,
                    property.rule
                );
            }
        }
        Commands::Fetch {
            query,
            exhaustive,
            raw,
            format,
        } => {
            let query: Query = query.parse().context("Invalid query")?;
            let executor = connect(&cli).await?;
            let options = FetchOptions {
                exhaustive: *exhaustive,
            };
            let snapshot = if *raw {
                executor.fetch(&query, options).await?
            } else {
                executor.fetch_decoded(&query, options).await?
            };
            print_snapshot(executor.registry(), &snapshot, *raw, *format)?;
        }
        Commands::Watch {
            query,
            interval,
            count,
        } => {
            if *interval == 0 {
                bail!("interval must be at least one second");
            }
            let query: Query = query.parse().context("Invalid query")?;
            let executor = connect(&cli).await?;
            watch(&executor, &query, *interval, *count).await?;
        }
        Commands::Write { address, value } => {
            let executor = connect(&cli).await?;
            executor.write(*address, *value).await?;
            println!("{} register {} = {}", "✓".green(), address, value);
        }
        Commands::WriteMany { writes } => {
            let executor = connect(&cli).await?;
            executor.write_many(writes).await?;
            println!("{} wrote {} registers", "✓".green(), writes.len());
        }
        Commands::Set { property, value } => {
            let setting: Setting = value
                .parse()
                .with_context(|| format!("Invalid value '{}'", value))?;
            let executor = connect(&cli).await?;
            let raw = executor
                .write_property(property, &setting)
                .await
                .with_context(|| format!("Failed to set {}", property))?;
            println!("{} {} = {} (raw {})", "✓".green(), property, setting, raw);
        }
        Commands::Diagnostic { first, second } => {
            let executor = connect(&cli).await?;
            let status = executor.diagnostic(*first, *second).await?;
            println!("status 0x{:02x}", status);
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word() {
        assert_eq!(parse_word("340").unwrap(), 340);
        assert_eq!(parse_word("0x7fff").unwrap(), 0x7fff);
        assert!(parse_word("70000").is_err());
        assert!(parse_word("heat").is_err());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("340=3").unwrap(), (340, 3));
        assert!(parse_pair("340").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["abc-cli", "fetch", "valid", "--exhaustive", "-f", "json"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Fetch {
                exhaustive: true,
                format: OutputFormat::Json,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["abc-cli", "write-many", "340=3", "0x15b=9"]).unwrap();
        let Commands::WriteMany { writes } = cli.command else {
            panic!("expected write-many");
        };
        assert_eq!(writes, vec![(340, 3), (347, 9)]);
    }
}
