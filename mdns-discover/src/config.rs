use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use shared::protocol::{DEFAULT_CONCURRENCY, DEFAULT_DOMAIN, DEFAULT_TIMEOUT};
use shared::types::{FieldSelection, OutputMode};
use crate::catalog;
use crate::error::DiscoveryError;

/// Command line. Every flag with an `env` falls back to that variable.
#[derive(Debug, Parser)]
#[command(name = "mdns-discover", version, about = "mDNS service discovery utility")]
pub struct Cli {
    /// Output format
    #[arg(long, value_enum, ignore_case = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Discovery timeout per service type, e.g. 10s, 30s, 1m
    #[arg(long, env = "MDNS_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Simultaneous service-type lookups
    #[arg(long, env = "MDNS_CONCURRENCY", value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Restrict discovery to a single service type, e.g. _workstation._tcp
    #[arg(long, env = "MDNS_SERVICE_FILTER")]
    pub service: Option<String>,

    /// Comma separated output fields (overridden by show-fields)
    #[arg(long, env = "MDNS_FIELD_FILTER")]
    pub fields: Option<String>,

    /// Browse domain
    #[arg(long, env = "MDNS_DOMAIN")]
    pub domain: Option<String>,

    /// Verbose debug output
    #[arg(
        long,
        env = "MDNS_DEBUG",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub debug: bool,

    /// Print a summary with counts per service type
    #[arg(long)]
    pub summary: bool,

    /// Disable ANSI color in diagnostics and the summary
    #[arg(long)]
    pub no_color: bool,

    /// TOML configuration file
    #[arg(long, env = "MDNS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Limit output to the specified comma separated fields
    ShowFields {
        /// e.g. "hostname,address,port"
        fields: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per discovered service and address
    Text,
    /// Single JSON document with all results
    Json,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => OutputMode::Text,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

fn parse_concurrency(value: &str) -> std::result::Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{value} is not a positive integer")),
    }
}

/// Optional configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub concurrency: Option<usize>,
    pub domain: Option<String>,
    /// Replaces the built-in catalog
    pub services: Option<Vec<String>>,
    /// Appended to the catalog
    #[serde(default)]
    pub extra_services: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub summary: bool,
    pub color: Option<bool>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Effective settings for a run: flag, then environment, then config file,
/// then built-in default
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: OutputMode,
    pub timeout: Duration,
    pub concurrency: usize,
    pub domain: String,
    /// Single-service mode when set
    pub service_filter: Option<String>,
    pub fields: FieldSelection,
    pub debug: bool,
    pub summary: bool,
    /// Color allowed; still subject to the terminal check
    pub color: bool,
    pub catalog: Vec<String>,
}

impl Settings {
    pub fn resolve(cli: Cli) -> std::result::Result<Self, DiscoveryError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)
                .map_err(|e| DiscoveryError::InvalidConfig(format!("{e:#}")))?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: FileConfig) -> std::result::Result<Self, DiscoveryError> {
        let concurrency = cli
            .concurrency
            .or(file.discovery.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        let fields = match (&cli.command, &cli.fields, &file.output.fields) {
            (Some(Command::ShowFields { fields }), _, _) => FieldSelection::parse_list(fields),
            (None, Some(fields), _) => FieldSelection::parse_list(fields),
            (None, None, Some(fields)) => FieldSelection::from_names(fields),
            (None, None, None) => FieldSelection::default(),
        };

        let service_filter = cli
            .service
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            mode: cli.output.into(),
            timeout: cli
                .timeout
                .or(file.discovery.timeout)
                .unwrap_or(DEFAULT_TIMEOUT),
            concurrency,
            domain: cli
                .domain
                .or(file.discovery.domain)
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            service_filter,
            fields,
            debug: cli.debug,
            summary: cli.summary || file.output.summary,
            color: !cli.no_color && file.output.color.unwrap_or(true),
            catalog: catalog::resolve(file.discovery.services, file.discovery.extra_services),
        })
    }
}
