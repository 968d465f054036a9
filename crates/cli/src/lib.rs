use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Settings file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "lotbase.yaml";

#[derive(Parser, Debug)]
#[command(name = "lotbase")]
#[command(about = "Lotbase - a page-file database with a spot exchange on top")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Path to the exchange settings file
    #[arg(short, long, global = true, env = "LOTBASE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP exchange
    Serve {
        /// Override the bind host from the settings file
        #[arg(long)]
        host: Option<String>,

        /// Override the HTTP port from the settings file
        #[arg(long)]
        port: Option<u16>,
    },

    /// Interactive INSERT / SELECT / DELETE console over the tables
    Console,

    /// Write default settings and schema files
    Init {
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },

    /// Validate settings and schema without starting anything
    Validate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["lotbase", "serve", "--port", "9000"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(9000)
            }
        );
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["lotbase", "console", "--config", "other.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert_eq!(cli.command, Commands::Console);

        let cli = Cli::try_parse_from(["lotbase", "-c", "x.yaml", "init", "--force"]).unwrap();
        assert_eq!(cli.command, Commands::Init { force: true });
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["lotbase", "start"]).is_err());
        assert!(Cli::try_parse_from(["lotbase"]).is_err());
    }
}
