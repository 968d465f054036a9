use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load the schema file (JSON)
#[instrument(skip(path))]
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<SchemaConfig> {
    let path = path.as_ref();
    info!("Loading schema from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {:?}", path))?;

    let schema: SchemaConfig =
        serde_json::from_str(&content).with_context(|| "Failed to parse schema JSON")?;

    debug!(
        tables = schema.tables().len(),
        tuples_limit = schema.tuples_limit,
        "Schema parsed"
    );
    Ok(schema)
}

/// Load exchange settings (YAML with `${VAR}` substitution)
#[instrument(skip(path))]
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ExchangeSettings> {
    let path = path.as_ref();
    info!("Loading settings from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {:?}", path))?;

    debug!("Settings file content length: {} bytes", content.len());

    parse_settings(&content)
}

/// Parse settings from an in-memory YAML document
pub fn parse_settings(content: &str) -> Result<ExchangeSettings> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let settings: ExchangeSettings = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML settings")?;

    Ok(settings)
}

#[instrument]
pub fn generate_default_settings() -> ExchangeSettings {
    ExchangeSettings {
        schema_path: default_schema_path(),
        data_dir: default_data_dir(),
        host: default_host(),
        port: default_port(),
        lots: default_lots(),
        seed_balance: default_seed_balance(),
        metrics_port: None,
        log_format: default_log_format(),
    }
}

/// Schema with exactly the tables the exchange needs
pub fn generate_default_schema() -> SchemaConfig {
    let tables = EXCHANGE_TABLES
        .iter()
        .map(|(name, columns)| {
            TableSchema::new(*name, columns.iter().map(|c| c.to_string()).collect())
        })
        .collect();

    SchemaConfig {
        name: "exchange".to_string(),
        tuples_limit: default_tuples_limit(),
        structure: TableStructure(tables),
    }
}

#[instrument(skip(settings))]
pub fn save_settings<P: AsRef<Path> + std::fmt::Debug>(
    settings: &ExchangeSettings,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    info!("Saving settings to: {:?}", path);

    let yaml = serde_yaml::to_string(settings)
        .with_context(|| "Failed to serialize settings to YAML")?;

    fs::write(path, yaml).with_context(|| format!("Failed to write settings file: {:?}", path))?;

    Ok(())
}

#[instrument(skip(schema))]
pub fn save_schema<P: AsRef<Path> + std::fmt::Debug>(schema: &SchemaConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving schema to: {:?}", path);

    let json = serde_json::to_string_pretty(schema)
        .with_context(|| "Failed to serialize schema to JSON")?;

    fs::write(path, json).with_context(|| format!("Failed to write schema file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_schema_has_exchange_tables() {
        let schema = generate_default_schema();
        assert_eq!(schema.tables().len(), EXCHANGE_TABLES.len());
        assert_eq!(
            schema.table("order").unwrap().columns,
            vec!["user_id", "pair_id", "quantity", "price", "type", "closed"]
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let schema_path = dir.path().join("schema.json");
        let settings_path = dir.path().join("lotbase.yaml");

        save_schema(&generate_default_schema(), &schema_path).unwrap();
        let mut settings = generate_default_settings();
        settings.lots = vec!["RUB".to_string(), "BTC".to_string()];
        save_settings(&settings, &settings_path).unwrap();

        let schema = load_schema(&schema_path).unwrap();
        assert_eq!(schema.name, "exchange");
        assert_eq!(schema.tables()[0].name, "user");

        let loaded = load_settings(&settings_path).unwrap();
        assert_eq!(loaded.lots, vec!["RUB", "BTC"]);
        assert_eq!(loaded.port, 7432);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_schema(dir.path().join("nope.json")).is_err());
        assert!(load_settings(dir.path().join("nope.yaml")).is_err());
    }
}
