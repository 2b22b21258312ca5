use anyhow::Result;
use clap::Parser;
use console::style;

use keel_runtime::{Database, Migrator};

use super::{init_tracing, InputArgs};

/// Show the operations a migration would apply.
#[derive(Parser)]
pub struct PlanCommand {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print the plan as JSON instead of a list.
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let (config, schema) = self.input.load()?;
        init_tracing(config.migration.debug);

        let db = Database::from_config(&config.database).await?;
        let migrator = Migrator::postgres(&db, config.migration)?;
        let plan = migrator.plan(&schema).await?;
        db.close().await;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "operations": plan.operations,
                    "diagnostics": plan.diagnostics,
                }))?
            );
            return Ok(());
        }

        println!();
        println!("  {}  {} Plan", style("⚓").bold(), style("KEEL").bold().cyan());
        println!();

        for diagnostic in &plan.diagnostics {
            println!("  {} {}", style("!").yellow(), diagnostic);
        }

        if plan.is_empty() {
            println!("  {} Database is up to date", style("✓").green());
            println!();
            return Ok(());
        }

        for operation in &plan.operations {
            println!("  {} {}", style("→").dim(), operation);
        }
        println!();
        println!(
            "  {} {} operation(s) pending",
            style("ℹ").blue(),
            plan.operations.len()
        );
        println!();

        Ok(())
    }
}
