use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use keel_runtime::{Database, Migrator};

use super::{init_tracing, InputArgs};

/// Apply the schema to the database.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(flatten)]
    pub input: InputArgs,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let (config, schema) = self.input.load()?;
        init_tracing(config.migration.debug);

        println!();
        println!(
            "  {}  {} Migrate",
            style("⚓").bold(),
            style("KEEL").bold().cyan()
        );
        println!();

        info!("Migrating namespace {}", config.migration.schema);

        let db = Database::from_config(&config.database).await?;
        let migrator = Migrator::postgres(&db, config.migration)?;
        let tx = db.begin().await?;
        let result = migrator.run(&schema, tx).await;
        db.close().await;

        let applied = match result {
            Ok(applied) => applied,
            Err(e) => {
                println!("  {} Migration rolled back", style("✗").red());
                println!();
                return Err(e.into());
            }
        };

        if applied.is_empty() {
            println!("  {} Database is up to date", style("✓").green());
        } else {
            for operation in &applied {
                println!("  {} {}", style("✓").green(), operation);
            }
            println!();
            println!(
                "  {} Applied {} operation(s)",
                style("✓").green(),
                applied.len()
            );
        }
        println!();

        Ok(())
    }
}
