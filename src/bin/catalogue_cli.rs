//! Debug CLI for the catalogue pipeline.
//!
//! Parses admin text, previews the resulting plan, and can apply it against
//! an in-memory store to inspect the audit trail. Never touches a real
//! database.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use care_catalogue::{
    CatalogueParser, CatalogueStore, MemoryStore, SchemaExecutor, SchemaSnapshot, TableConfig,
    TableChangePlanner, ToolGenerator, ValidatorCache,
};
use care_catalogue::tools::ExecutionGatekeeper;

#[derive(Parser)]
#[command(name = "catalogue_cli", about = "Inspect the admin-text to schema pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse admin text and print the structured catalogue
    Parse { text: String },
    /// Parse, then plan against an empty schema snapshot
    Plan { text: String },
    /// Parse, plan and execute against an in-memory store, then print the
    /// audit trail and generated tool schemas
    Apply {
        text: String,
        #[arg(long, default_value = "default")]
        scope: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let parser = CatalogueParser::new();

    match cli.command {
        Command::Parse { text } => {
            let catalogue = parser.parse(&text, None, None);
            println!("{}", "Parsed catalogue".bold());
            println!("{}", serde_json::to_string_pretty(&catalogue)?);
        }
        Command::Plan { text } => {
            let catalogue = parser.parse(&text, None, None);
            let outcome = TableChangePlanner::new().plan(&catalogue, &SchemaSnapshot::new());
            println!("{}", "Plan".bold());
            println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
            for rejection in &outcome.rejections {
                eprintln!("{} [{}] {rejection}", "rejected".red(), rejection.code());
            }
        }
        Command::Apply { text, scope } => {
            let catalogue = parser.parse(&text, None, None);
            let store = Arc::new(MemoryStore::new());
            let planner = TableChangePlanner::new();
            let executor = SchemaExecutor::new(store.clone());

            let snapshot = store.schema_snapshot().await?;
            let outcome = planner.plan(&catalogue, &snapshot);
            for rejection in &outcome.rejections {
                eprintln!("{} [{}] {rejection}", "rejected".red(), rejection.code());
            }

            let result = executor.execute(&outcome.plan, &catalogue, &scope).await?;
            println!(
                "{} version {} with {} action(s)",
                "Committed".green(),
                result.rule_set_version,
                result.applied_actions.len()
            );

            let gatekeeper = Arc::new(ExecutionGatekeeper::new(store.clone()));
            let generator = ToolGenerator::new(gatekeeper, Arc::new(ValidatorCache::new()));
            let configs: Vec<TableConfig> = catalogue
                .metrics
                .iter()
                .map(TableConfig::from_metric)
                .collect();
            let tools = generator.generate(&configs)?;
            for tool in &tools {
                println!("{} {}", "tool".bold(), tool.id());
                println!("{}", serde_json::to_string_pretty(tool.input_schema())?);
            }

            println!("{}", "Audit trail".bold());
            for event in store.events().await? {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}
