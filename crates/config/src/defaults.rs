use std::path::PathBuf;

pub fn default_tuples_limit() -> usize {
    1000
}

pub fn default_schema_path() -> PathBuf {
    PathBuf::from("schema.json")
}

pub fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    7432
}

pub fn default_lots() -> Vec<String> {
    vec!["RUB".to_string(), "BTC".to_string(), "USD".to_string()]
}

/// Amount of every lot granted to a freshly created user
pub fn default_seed_balance() -> f64 {
    1000.0
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
