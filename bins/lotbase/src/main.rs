//! Lotbase binary
//!
//! `serve` runs the HTTP exchange, `console` opens an interactive
//! statement prompt over the same tables, `init` writes default settings
//! and schema files and `validate` checks them.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{
    generate_default_schema, generate_default_settings, load_schema, load_settings,
    save_schema, save_settings, validate_schema, validate_settings, ExchangeSettings,
    SchemaConfig, ValidationReport,
};
use matching_engine::api::{create_router, ExchangeState};
use matching_engine::Exchange;
use observability::{init_logging, init_metrics, LogFormat};
use server::{HttpServer, ServerConfig, ServerExt};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use storage::{Console, Database, Outcome};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Serve { host, port } => {
            let loaded = Loaded::from_file(&cli.config)?;
            init_logging("lotbase", loaded.log_format())?;
            debug!(config = ?cli.config, "Settings loaded");
            serve_command(loaded, host, port).await
        }
        Commands::Console => {
            let loaded = Loaded::from_file(&cli.config)?;
            init_logging("lotbase", LogFormat::Compact)?;
            tokio::task::spawn_blocking(move || console_command(loaded))
                .await
                .context("Console task panicked")?
        }
        Commands::Init { force } => {
            init_logging("lotbase", LogFormat::Pretty)?;
            init_command(&cli.config, force)
        }
        Commands::Validate => {
            init_logging("lotbase", LogFormat::Pretty)?;
            validate_command(&cli.config)
        }
    }
}

/// Settings plus the schema they point at, with relative paths resolved
/// against the settings file's directory
struct Loaded {
    settings: ExchangeSettings,
    schema: SchemaConfig,
}

impl Loaded {
    fn from_file(config_path: &Path) -> Result<Self> {
        let mut settings = load_settings(config_path)?;
        let base = base_dir(config_path);
        settings.schema_path = resolve(&base, &settings.schema_path);
        settings.data_dir = resolve(&base, &settings.data_dir);

        let schema = load_schema(&settings.schema_path)?;
        Ok(Self { settings, schema })
    }

    fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.settings.log_format).unwrap_or_default()
    }

    fn report(&self) -> ValidationReport {
        let mut report = validate_settings(&self.settings);
        report.merge(validate_schema(&self.schema));
        report
    }
}

fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

async fn serve_command(loaded: Loaded, host: Option<String>, port: Option<u16>) -> Result<()> {
    let report = loaded.report();
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start exchange due to configuration errors");
    }

    let Loaded { settings, schema } = loaded;

    if let Some(metrics_port) = settings.metrics_port {
        init_metrics(&settings.host, metrics_port)?;
    }

    let exchange = Exchange::open(&settings, &schema)
        .with_context(|| format!("Failed to open database under {:?}", settings.data_dir))?;
    if exchange.bootstrap(&settings.lots)? {
        info!(lots = settings.lots.len(), "Created lots and pairs");
    }

    let mut server_config = ServerConfig::from_address(&settings.http_address())?;
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(port) = port {
        server_config.http_port = port;
    }

    info!(
        host = %server_config.host,
        port = server_config.http_port,
        schema = %schema.name,
        "Starting exchange"
    );

    let router = create_router(ExchangeState::new(exchange));
    HttpServer::with_name(server_config, router, "lotbase")
        .run_with_ctrl_c()
        .await?;

    Ok(())
}

fn console_command(loaded: Loaded) -> Result<()> {
    let db = Database::open(&loaded.settings.data_dir, &loaded.schema)?;
    let console = Console::new(&db);

    println!(
        "Connected to '{}' (tables: {}). Type EXIT to leave.",
        db.name(),
        db.table_names().join(", ")
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("lotbase> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let statement = line.trim();
        if statement.is_empty() {
            continue;
        }

        match console.run_line(statement) {
            Ok(Outcome::Exit) => break,
            Ok(outcome) => println!("{}", outcome),
            Err(e) => {
                warn!(%e, "Statement failed");
                println!("error: {}", e);
            }
        }
    }

    Ok(())
}

fn init_command(config_path: &Path, force: bool) -> Result<()> {
    let settings = generate_default_settings();
    let schema_path = resolve(&base_dir(config_path), &settings.schema_path);

    for path in [config_path, schema_path.as_path()] {
        if path.exists() && !force {
            anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
        }
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_settings(&settings, config_path)?;
    save_schema(&generate_default_schema(), &schema_path)?;

    println!("[ok] Wrote {:?} and {:?}", config_path, schema_path);
    println!();
    println!("Next steps:");
    println!("  1. Edit the lots and seed balance in {:?}", config_path);
    println!("  2. Run 'lotbase --config {:?} validate'", config_path);
    println!("  3. Run 'lotbase --config {:?} serve'", config_path);

    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let loaded = Loaded::from_file(config_path)?;
    let report = loaded.report();

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Schema: {}", loaded.schema.name);
    println!("Tables: {}", loaded.schema.tables().len());
    println!("Tuples per page: {}", loaded.schema.tuples_limit);
    println!("Lots: {}", loaded.settings.lots.join(", "));
    println!("Listen: {}", loaded.settings.http_address());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative_paths() {
        assert_eq!(base_dir(Path::new("lotbase.yaml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("/etc/lotbase/lotbase.yaml")), PathBuf::from("/etc/lotbase"));
        assert_eq!(
            resolve(Path::new("/etc/lotbase"), Path::new("schema.json")),
            PathBuf::from("/etc/lotbase/schema.json")
        );
        assert_eq!(
            resolve(Path::new("/etc/lotbase"), Path::new("/var/schema.json")),
            PathBuf::from("/var/schema.json")
        );
    }

    #[test]
    fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("conf").join("lotbase.yaml");

        init_command(&config_path, false).unwrap();
        assert!(dir.path().join("conf").join("schema.json").exists());
        assert!(init_command(&config_path, false).is_err());
        init_command(&config_path, true).unwrap();

        let loaded = Loaded::from_file(&config_path).unwrap();
        assert_eq!(loaded.settings.data_dir, dir.path().join("conf").join("."));
        assert!(loaded.report().is_valid());
        assert_eq!(loaded.log_format(), LogFormat::Pretty);
        validate_command(&config_path).unwrap();
    }
}
