//! Lotbase configuration
//!
//! Two documents are loaded here:
//! - the schema file (`schema.json`) describing every table and its columns
//! - the exchange settings (`lotbase.yaml`) for the server, data location and
//!   bootstrap lots

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Tables and columns the exchange requires, in on-disk column order
pub const EXCHANGE_TABLES: &[(&str, &[&str])] = &[
    ("user", &["username", "key"]),
    ("lot", &["name"]),
    ("pair", &["first_lot_id", "second_lot_id"]),
    ("user_lot", &["user_id", "lot_id", "quantity"]),
    (
        "order",
        &["user_id", "pair_id", "quantity", "price", "type", "closed"],
    ),
];

/// Schema file contents
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    /// Root directory name for every table of this schema
    pub name: String,
    /// Maximum number of data rows per page
    #[serde(default = "default_tuples_limit")]
    pub tuples_limit: usize,
    /// Tables in declaration order
    pub structure: TableStructure,
}

impl SchemaConfig {
    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.structure.0.iter().find(|t| t.name == name)
    }

    /// All tables in declaration order
    pub fn tables(&self) -> &[TableSchema] {
        &self.structure.0
    }
}

/// A table and its user-visible columns.
///
/// The primary key column `<name>_id` is implicit and never listed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Name of the implicit primary key column
    pub fn pk_column(&self) -> String {
        format!("{}_id", self.name)
    }
}

/// Ordered table list, written in the schema file as `{ "table": ["col", ...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStructure(pub Vec<TableSchema>);

impl<'de> Deserialize<'de> for TableStructure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StructureVisitor;

        impl<'de> Visitor<'de> for StructureVisitor {
            type Value = TableStructure;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map from table name to a list of column names")
            }

            fn visit_map<V>(self, mut map: V) -> Result<TableStructure, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut tables: Vec<TableSchema> = Vec::new();

                while let Some(name) = map.next_key::<String>()? {
                    if tables.iter().any(|t| t.name == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate table '{}'",
                            name
                        )));
                    }
                    let columns: Vec<String> = map.next_value()?;
                    tables.push(TableSchema { name, columns });
                }

                Ok(TableStructure(tables))
            }
        }

        deserializer.deserialize_map(StructureVisitor)
    }
}

impl Serialize for TableStructure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for table in &self.0 {
            map.serialize_entry(&table.name, &table.columns)?;
        }
        map.end()
    }
}

/// Exchange settings file contents
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// Path of the schema file
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Directory under which the schema root directory lives
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lots inserted on first start, in id order
    #[serde(default = "default_lots")]
    pub lots: Vec<String>,
    /// Per-lot amount granted to every new user
    #[serde(default = "default_seed_balance")]
    pub seed_balance: f64,
    /// Prometheus exporter port; the exporter is off when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// pretty, json or compact
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl ExchangeSettings {
    /// Bind address of the HTTP server
    pub fn http_address(&self) -> String {
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        parser::generate_default_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_preserves_table_order() {
        let json = r#"{
            "name": "exchange",
            "tuples_limit": 5,
            "structure": {
                "user": ["username", "key"],
                "lot": ["name"],
                "pair": ["first_lot_id", "second_lot_id"]
            }
        }"#;

        let schema: SchemaConfig = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["user", "lot", "pair"]);
        assert_eq!(schema.tuples_limit, 5);
        assert_eq!(schema.table("lot").unwrap().pk_column(), "lot_id");
        assert!(schema.table("missing").is_none());
    }

    #[test]
    fn test_schema_rejects_duplicate_table() {
        let json = r#"{"name": "x", "structure": {"a": ["c"], "a": ["d"]}}"#;
        assert!(serde_json::from_str::<SchemaConfig>(json).is_err());
    }

    #[test]
    fn test_structure_serializes_as_map() {
        let structure = TableStructure(vec![
            TableSchema::new("b", vec!["x".to_string()]),
            TableSchema::new("a", vec!["y".to_string()]),
        ]);
        let out = serde_json::to_string(&structure).unwrap();
        assert_eq!(out, r#"{"b":["x"],"a":["y"]}"#);
    }

    #[test]
    fn test_settings_defaults_applied() {
        let settings: ExchangeSettings = serde_yaml::from_str("port: 9000\n").unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.seed_balance, 1000.0);
        assert!(settings.metrics_port.is_none());
        assert_eq!(settings.http_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_localhost_is_rewritten() {
        let settings = ExchangeSettings {
            host: "localhost".to_string(),
            ..ExchangeSettings::default()
        };
        assert_eq!(settings.http_address(), "127.0.0.1:7432");
    }
}
