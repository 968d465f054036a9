use crate::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Schema name is required")]
    MissingSchemaName,

    #[error("tuples_limit must be a positive integer")]
    InvalidTuplesLimit,

    #[error("Schema defines no tables")]
    NoTables,

    #[error("Table {table}: {message}")]
    InvalidTable { table: String, message: String },

    #[error("Table '{table}' is required by the exchange")]
    MissingExchangeTable { table: String },

    #[error("Table '{table}' must have columns {expected:?}, found {found:?}")]
    ExchangeColumnsMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("At least two lots are required to form a pair, found {count}")]
    NotEnoughLots { count: usize },

    #[error("Lot {name}: {message}")]
    InvalidLot { name: String, message: String },

    #[error("seed_balance must be a non-negative number")]
    InvalidSeedBalance,

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable placeholder left unresolved in '{field}'")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.defaults_applied.extend(other.defaults_applied);
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a schema for use by the exchange
pub fn validate_schema(schema: &SchemaConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if schema.name.trim().is_empty() {
        report.add_error(ValidationError::MissingSchemaName);
    }

    if schema.tuples_limit == 0 {
        report.add_error(ValidationError::InvalidTuplesLimit);
    }

    if schema.tables().is_empty() {
        report.add_error(ValidationError::NoTables);
        return report;
    }

    for table in schema.tables() {
        validate_table(table, &mut report);
    }

    for (name, columns) in EXCHANGE_TABLES {
        match schema.table(name) {
            None => report.add_error(ValidationError::MissingExchangeTable {
                table: name.to_string(),
            }),
            Some(table) => {
                let expected: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                if table.columns != expected {
                    report.add_error(ValidationError::ExchangeColumnsMismatch {
                        table: name.to_string(),
                        expected,
                        found: table.columns.clone(),
                    });
                }
            }
        }
    }

    let extra = schema
        .tables()
        .iter()
        .filter(|t| !EXCHANGE_TABLES.iter().any(|(name, _)| *name == t.name))
        .count();
    if extra > 0 {
        report.add_warning(
            "structure",
            &format!("{} table(s) unused by the exchange, reachable from the console only", extra),
        );
    }

    report
}

fn validate_table(table: &TableSchema, report: &mut ValidationReport) {
    if table.name.trim().is_empty() {
        report.add_error(ValidationError::InvalidTable {
            table: "unknown".to_string(),
            message: "Table name is required".to_string(),
        });
        return;
    }

    if table.name.contains(['.', ',', '/', '\\']) {
        report.add_error(ValidationError::InvalidTable {
            table: table.name.clone(),
            message: "Table name must not contain '.', ',' or path separators".to_string(),
        });
    }

    if table.columns.is_empty() {
        report.add_warning(
            &format!("structure.{}", table.name),
            "Table has no columns besides its primary key",
        );
    }

    let pk = table.pk_column();
    let mut seen = HashSet::new();
    for column in &table.columns {
        if column.trim().is_empty() {
            report.add_error(ValidationError::InvalidTable {
                table: table.name.clone(),
                message: "Column names must not be empty".to_string(),
            });
        } else if *column == pk {
            report.add_error(ValidationError::InvalidTable {
                table: table.name.clone(),
                message: format!("Column '{}' collides with the implicit primary key", pk),
            });
        } else if column.contains([',', '.']) {
            report.add_error(ValidationError::InvalidTable {
                table: table.name.clone(),
                message: format!("Column '{}' must not contain ',' or '.'", column),
            });
        }

        if !seen.insert(column.as_str()) {
            report.add_error(ValidationError::InvalidTable {
                table: table.name.clone(),
                message: format!("Duplicate column '{}'", column),
            });
        }
    }
}

/// Validate exchange settings
pub fn validate_settings(settings: &ExchangeSettings) -> ValidationReport {
    let mut report = ValidationReport::new();

    if settings.lots.len() < 2 {
        report.add_error(ValidationError::NotEnoughLots {
            count: settings.lots.len(),
        });
    }

    let mut seen = HashSet::new();
    for lot in &settings.lots {
        if lot.trim().is_empty() {
            report.add_error(ValidationError::InvalidLot {
                name: "unknown".to_string(),
                message: "Lot name is required".to_string(),
            });
            continue;
        }
        if lot.contains([',', '\'']) {
            report.add_error(ValidationError::InvalidLot {
                name: lot.clone(),
                message: "Lot name must not contain ',' or quotes".to_string(),
            });
        }
        if !seen.insert(lot.as_str()) {
            report.add_error(ValidationError::InvalidLot {
                name: lot.clone(),
                message: "Duplicate lot".to_string(),
            });
        }
    }

    if !settings.seed_balance.is_finite() || settings.seed_balance < 0.0 {
        report.add_error(ValidationError::InvalidSeedBalance);
    } else if settings.seed_balance == 0.0 {
        report.add_warning("seed_balance", "New users start without any funds");
    }

    if !matches!(settings.log_format.as_str(), "pretty" | "json" | "compact") {
        report.add_error(ValidationError::InvalidLogFormat(
            settings.log_format.clone(),
        ));
    }

    if settings.port == 0 {
        report.add_warning("port", "Port 0 binds an ephemeral port");
    }

    if settings.metrics_port.is_some() && settings.metrics_port == Some(settings.port) {
        report.add_warning("metrics_port", "Metrics exporter shares the HTTP port");
    }

    for (field, value) in [
        ("host", settings.host.as_str()),
        ("schema_path", &*settings.schema_path.to_string_lossy()),
        ("data_dir", &*settings.data_dir.to_string_lossy()),
    ] {
        if has_unresolved_env_vars(value) {
            report.add_error(ValidationError::UnresolvedEnvVar {
                field: field.to_string(),
            });
        }
    }

    report
}
