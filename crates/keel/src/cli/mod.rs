mod migrate;
mod plan;

pub use migrate::MigrateCommand;
pub use plan::PlanCommand;

use std::path::Path;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use keel_core::{KeelConfig, TypeSchema};

/// keel - schema-sync migrations from a type schema
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the operations a migration would apply.
    Plan(PlanCommand),

    /// Apply the schema to the database.
    Migrate(MigrateCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Plan(cmd) => cmd.execute().await,
            Commands::Migrate(cmd) => cmd.execute().await,
        }
    }
}

/// Options shared by every command.
#[derive(Args)]
pub struct InputArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "keel.toml")]
    pub config: String,

    /// Type schema (JSON) path.
    #[arg(short, long, default_value = "schema.json")]
    pub schema: String,

    /// Database namespace (overrides config).
    #[arg(long)]
    pub namespace: Option<String>,

    /// Verbose logging, including both models.
    #[arg(long)]
    pub debug: bool,
}

impl InputArgs {
    /// Load the configuration and the type schema, applying command-line overrides.
    pub fn load(&self) -> Result<(KeelConfig, TypeSchema)> {
        if !Path::new(&self.config).exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }
        if !Path::new(&self.schema).exists() {
            anyhow::bail!("Type schema not found: {}", self.schema);
        }

        let mut config = KeelConfig::from_file(&self.config)?;
        if let Some(namespace) = &self.namespace {
            config.migration.schema = namespace.clone();
        }
        if self.debug {
            config.migration.debug = true;
        }

        let schema = TypeSchema::from_file(&self.schema)?;
        Ok((config, schema))
    }
}

/// Install the log subscriber. `RUST_LOG` wins over the default level.
pub fn init_tracing(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(config: &NamedTempFile, schema: &NamedTempFile) -> InputArgs {
        InputArgs {
            config: config.path().to_string_lossy().into_owned(),
            schema: schema.path().to_string_lossy().into_owned(),
            namespace: None,
            debug: false,
        }
    }

    #[test]
    fn test_load_inputs() {
        let config = file(
            r#"
            [database]
            url = "postgres://localhost/keel"

            [migration]
            schema = "app"
            "#,
        );
        let schema = file(r#"{ "types": [ { "kind": "OBJECT", "name": "User", "fields": [] } ] }"#);

        let (config, schema) = args(&config, &schema).load().unwrap();
        assert_eq!(config.migration.schema, "app");
        assert!(schema.get("User").is_some());
    }

    #[test]
    fn test_overrides() {
        let config = file("[database]\nurl = \"postgres://localhost/keel\"\n");
        let schema = file(r#"{ "types": [] }"#);

        let mut input = args(&config, &schema);
        input.namespace = Some("tenant".into());
        input.debug = true;
        let (config, _) = input.load().unwrap();
        assert_eq!(config.migration.schema, "tenant");
        assert!(config.migration.debug);
    }

    #[test]
    fn test_missing_files() {
        let schema = file(r#"{ "types": [] }"#);
        let input = InputArgs {
            config: "/nonexistent/keel.toml".into(),
            schema: schema.path().to_string_lossy().into_owned(),
            namespace: None,
            debug: false,
        };
        let err = input.load().err().unwrap();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_cli_parses_plan() {
        let cli = Cli::try_parse_from(["keel", "plan", "--schema", "types.json", "--json"]).unwrap();
        match cli.command {
            Commands::Plan(cmd) => {
                assert_eq!(cmd.input.schema, "types.json");
                assert_eq!(cmd.input.config, "keel.toml");
                assert!(cmd.json);
            }
            Commands::Migrate(_) => panic!("expected plan"),
        }
    }
}
