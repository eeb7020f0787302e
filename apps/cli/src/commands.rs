//! CLI command definitions, routing, and tracing setup.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use marginkit_core::{ItemEnricher, SilentDiagnostics};
use marginkit_shared::{
    AppConfig, Item, StoreBackend, ValueCalculation, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MarginKit — attach margins to purchase line items.
#[derive(Parser)]
#[command(
    name = "marginkit",
    version,
    about = "Enrich purchase line items with margins computed from reference documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich a JSON array of items and print the result.
    Enrich(EnrichArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `marginkit enrich`.
#[derive(Args, Debug, Default)]
pub(crate) struct EnrichArgs {
    /// Items file (JSON array). Reads stdin when omitted or `-`.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Config file (defaults to ~/.marginkit/marginkit.toml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override `enrichment.collection_id`.
    #[arg(long)]
    pub collection: Option<String>,

    /// Override `enrichment.value_calculation` (valueQuantity, returnRate, valueWithDiscount).
    #[arg(long)]
    pub formula: Option<String>,

    /// Override `enrichment.value_field`.
    #[arg(long)]
    pub value_field: Option<String>,

    /// Override `enrichment.return_rate_field`.
    #[arg(long)]
    pub return_rate_field: Option<String>,

    /// Override `enrichment.namespace`.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Serve reference documents from this JSON fixtures file instead of Firestore.
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Pretty-print the output JSON.
    #[arg(long)]
    pub pretty: bool,

    /// Print outcome counts to stderr.
    #[arg(long)]
    pub summary: bool,

    /// Do not log per-item skips and lookup failures.
    #[arg(long)]
    pub quiet: bool,
}

impl EnrichArgs {
    /// Apply flag overrides on top of the loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(collection) = &self.collection {
            config.enrichment.collection_id = collection.clone();
        }
        if let Some(formula) = &self.formula {
            config.enrichment.value_calculation = ValueCalculation::from(formula.as_str());
        }
        if let Some(field) = &self.value_field {
            config.enrichment.value_field = field.clone();
        }
        if let Some(field) = &self.return_rate_field {
            config.enrichment.return_rate_field = field.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.enrichment.namespace = Some(namespace.clone());
        }
        if let Some(fixtures) = &self.fixtures {
            config.store.backend = StoreBackend::Memory;
            config.store.fixtures_path = Some(fixtures.clone());
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Config file to show instead of the default location.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout is
/// reserved for enriched output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "marginkit=info",
        1 => "marginkit=debug",
        _ => "marginkit=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich(args) => cmd_enrich(&args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_enrich(args: &EnrichArgs) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    args.apply(&mut config);

    let items = read_items(args.input.as_deref())?;

    info!(
        items = items.len(),
        collection = %config.enrichment.collection_id,
        formula = %config.enrichment.value_calculation,
        "enriching items"
    );

    let store = marginkit_store::connect(&config.store)?;
    let mut enricher = ItemEnricher::new(store);
    if args.quiet {
        enricher = enricher.with_diagnostics(Arc::new(SilentDiagnostics));
    }

    let (items, summary) = enricher
        .enrich_with_summary(items, &config.enrichment)
        .await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&items)?
    } else {
        serde_json::to_string(&items)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").wrap_err("failed to write output")?;

    if args.summary {
        eprintln!();
        eprintln!("  Items:           {}", summary.items);
        eprintln!("  Enriched:        {}", summary.enriched);
        eprintln!("  Skipped (no id): {}", summary.skipped);
        eprintln!("  Lookup failures: {}", summary.lookup_failures);
        eprintln!("  Invalid margins: {}", summary.invalid_margins);
        eprintln!(
            "  Time:            {:.1}ms",
            summary.duration.as_secs_f64() * 1000.0
        );
        eprintln!();
    }

    Ok(())
}

/// Read a JSON array of items from a file, or stdin for `None` / `-`.
fn read_items(input: Option<&Path>) -> Result<Vec<Item>> {
    let (source, content) = match input {
        Some(path) if path != Path::new("-") => {
            let content = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("cannot read items from {}", path.display()))?;
            (path.display().to_string(), content)
        }
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .wrap_err("cannot read items from stdin")?;
            ("stdin".to_string(), content)
        }
    };

    parse_items(&content).wrap_err_with(|| format!("invalid items in {source}"))
}

fn parse_items(content: &str) -> Result<Vec<Item>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    if !value.is_array() {
        return Err(eyre!("expected a JSON array of items"));
    }
    Ok(serde_json::from_value(value)?)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enrich_flags() {
        let cli = Cli::try_parse_from([
            "marginkit",
            "enrich",
            "--input",
            "items.json",
            "--formula",
            "returnRate",
            "--fixtures",
            "ref.json",
            "--pretty",
        ])
        .unwrap();

        let Command::Enrich(args) = cli.command else {
            panic!("expected enrich");
        };
        assert_eq!(args.input.as_deref(), Some(Path::new("items.json")));
        assert!(args.pretty);
        assert!(!args.summary);
    }

    #[test]
    fn overrides_apply_to_config() {
        let args = EnrichArgs {
            collection: Some("catalog".into()),
            formula: Some("valueWithDiscount".into()),
            namespace: Some("shop-staging".into()),
            fixtures: Some(PathBuf::from("ref.json")),
            ..Default::default()
        };
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.enrichment.collection_id, "catalog");
        assert_eq!(
            config.enrichment.value_calculation,
            ValueCalculation::ValueWithDiscount
        );
        assert_eq!(config.enrichment.namespace.as_deref(), Some("shop-staging"));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.enrichment.value_field, "value");
    }

    #[test]
    fn parse_items_requires_array() {
        assert_eq!(parse_items(r#"[{"item_id":"a"},{}]"#).unwrap().len(), 2);
        assert!(parse_items(r#"{"items":[]}"#).is_err());
        assert!(parse_items("not json").is_err());
    }
}
