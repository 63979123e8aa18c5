//! Clinic store command-line tool.
//!
//! Provides subcommands for generating and validating configuration,
//! listing and printing tables, checking table files for damaged rows, and
//! re-mirroring tables into the relational database.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use clinicstore_core::config::StoreConfig;
use clinicstore_core::models::TABLES;
use clinicstore_core::store::Store;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Clinic store command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "clinicstore",
    version,
    about = "Inspect and maintain the clinic's table files and relational mirror"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when it is absent.
    #[arg(short, long, global = true, default_value = "clinic.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./clinic.toml")]
        output: PathBuf,
    },

    /// Validate the configuration and show the resolved mirror settings.
    Validate,

    /// List known tables with their row counts.
    Tables,

    /// Print the rows of one table.
    Show {
        /// Table name, e.g. `patients`.
        table: String,

        /// Maximum number of rows to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Decode every table and report short or malformed rows.
    Check,

    /// Replace mirrored tables with the current file contents.
    Resync {
        /// Table to re-mirror.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        table: Option<String>,

        /// Re-mirror every known table.
        #[arg(long)]
        all: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Tables => cmd_tables(&open_store(&cli.config)?),
        Commands::Show { table, limit } => cmd_show(&open_store(&cli.config)?, &table, limit),
        Commands::Check => cmd_check(&open_store(&cli.config)?),
        Commands::Resync { table, all } => {
            let store = open_store(&cli.config)?;
            match table {
                Some(table) if !all => cmd_resync(&store, &[table.as_str()]),
                _ => {
                    let names: Vec<&str> = TABLES.iter().map(|t| t.name).collect();
                    cmd_resync(&store, &names)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(StoreConfig::default());
    }
    StoreConfig::load_and_validate(path).context("failed to load configuration file")
}

fn open_store(config_path: &Path) -> Result<Store> {
    let config = load_config(config_path)?;
    Store::open(&config).context("failed to open store")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# Clinic store configuration.
# Environment variables (CLINIC_DB_*) override the [mirror] values below.

[store]
data_dir = "data"
extension = "csv"
# "skip" drops rows with too few fields and logs them; "reject" fails the read.
short_rows = "skip"

[mirror]
enabled = true
driver = "mysql"
host = "localhost"
port = 3306
database = "clinic"
username = "root"
# password = ""
# sqlite_path = "clinic.db"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;
    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Point [store].data_dir at the clinic's table files");
    println!("  2. Set CLINIC_DB_PASSWORD or [mirror].password for the mirror database");
    println!("  3. Validate with: clinicstore validate --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = if config_path.exists() {
        let config = StoreConfig::load_from_file(config_path).context("failed to parse configuration")?;
        println!("  [OK] TOML structure is valid");
        config
    } else {
        println!("  {}", style::warn("file not found, checking built-in defaults"));
        StoreConfig::default()
    };

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {e}");
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All fields are valid");

    let settings = match config.mirror_settings() {
        Ok(settings) => settings,
        Err(e) => {
            println!("  [FAIL] Mirror settings: {e}");
            anyhow::bail!("configuration validation failed");
        }
    };
    println!("  [OK] Mirror settings resolved");

    let driver_note = if settings.driver.is_available() {
        ""
    } else {
        " (not compiled in; mirror will stay off)"
    };

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Data directory : {}", config.store.data_dir.display());
    println!("  Short rows     : {:?}", config.store.short_rows);
    println!("  Mirror flag    : {}", settings.enabled);
    println!("  Mirror driver  : {}{driver_note}", settings.driver);
    println!("  Mirror target  : {}:{}/{}", settings.host, settings.port, settings.database);
    println!("  Mirror user    : {}", settings.username);
    println!(
        "  Mirror password: {}",
        if settings.password.is_empty() { "not set" } else { "set" }
    );
    println!();
    println!("Configuration is valid.");
    Ok(())
}

fn cmd_tables(store: &Store) -> Result<()> {
    println!("{}", style::header("Tables"));
    println!("  {}", style::dim(&store.data_dir().display().to_string()));
    println!("  Mirror: {}", style::mirror_state(store.mirror().is_enabled()));
    if let Some(target) = store.mirror().target() {
        println!("  Target: {}", style::dim(&target));
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Table", "Rows", "Columns", "File"]);

    for schema in TABLES {
        let rows = store
            .raw_rows(schema.name)
            .with_context(|| format!("failed to read table '{}'", schema.name))?;
        table.add_row(vec![
            Cell::new(schema.name),
            Cell::new(rows.len()),
            Cell::new(schema.columns.len()),
            Cell::new(store.table_path(schema.name).display()),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn cmd_show(store: &Store, name: &str, limit: usize) -> Result<()> {
    let schema = store.schema(name)?;
    let rows = store
        .raw_rows(name)
        .with_context(|| format!("failed to read table '{name}'"))?;

    if rows.is_empty() {
        println!("Table '{name}' is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(schema.columns.to_vec());

    for row in rows.iter().take(limit) {
        let cells: Vec<Cell> = (0..schema.columns.len())
            .map(|i| Cell::new(row.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        table.add_row(cells);
    }

    println!("{table}");
    println!("{}", style::dim(&format!("{} of {} row(s) shown", rows.len().min(limit), rows.len())));
    Ok(())
}

fn cmd_check(store: &Store) -> Result<()> {
    let mut problems = 0;

    for schema in TABLES {
        let report = store
            .inspect(schema.name)
            .with_context(|| format!("failed to read table '{}'", schema.name))?;

        if report.is_clean() {
            println!("{}", style::success(&format!("{:<16} {} row(s)", report.table, report.rows)));
            continue;
        }

        println!(
            "{}",
            style::error(&format!(
                "{:<16} {} row(s), {} decoded",
                report.table, report.rows, report.decoded
            ))
        );
        for (row, found) in &report.short_rows {
            println!(
                "    row {row}: {found} field(s), expected at least {}",
                schema.min_fields
            );
        }
        for (row, err) in &report.malformed {
            println!("    row {row}: {err}");
        }
        problems += report.short_rows.len() + report.malformed.len();
    }

    println!();
    if problems > 0 {
        anyhow::bail!("{problems} problem row(s) found");
    }
    println!("All tables are clean.");
    Ok(())
}

fn cmd_resync(store: &Store, names: &[&str]) -> Result<()> {
    if !store.mirror().is_enabled() {
        println!("{}", style::warn("Relational mirror is disabled; nothing to resync."));
        return Ok(());
    }

    let mut failed = 0;
    for name in names {
        match store.resync(name) {
            Ok(rows) => println!("{}", style::success(&format!("{name}: {rows} row(s) mirrored"))),
            Err(e) => {
                warn!(table = %name, error = %e, "resync failed");
                println!("{}", style::error(&format!("{name}: {e}")));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} table(s) failed to resync");
    }
    Ok(())
}
