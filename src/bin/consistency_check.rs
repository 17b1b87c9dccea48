use campus_exchange_core::{ConsistencyService, EngineConfig, SqliteDocumentStore};
use std::env;
use std::sync::Arc;

/// Operator entry point for the consistency endpoint: runs one operation
/// against the store at EXCHANGE_DB_PATH and prints the JSON report.
///
/// Usage: consistency_check [check-all|fix-orphaned|check-duplicates|fix-references]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let operation = env::args().nth(1).unwrap_or_else(|| "check-all".to_string());
    let db_path = env::var("EXCHANGE_DB_PATH").unwrap_or_else(|_| "./exchange_core.sqlite".to_string());

    let store = Arc::new(SqliteDocumentStore::connect(&db_path).await?);
    let service = ConsistencyService::new(store, EngineConfig::from_env());

    let report = service.run(&operation).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.summary.total_issues > report.summary.total_fixed {
        eprintln!(
            "{} unresolved issues remain; re-run with a fix operation to repair them",
            report.summary.total_issues - report.summary.total_fixed
        );
    }
    Ok(())
}
