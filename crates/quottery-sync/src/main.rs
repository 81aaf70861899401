mod cli;

use clap::Parser;
use eyre::WrapErr;

use quottery_sync_core::{NodeClient, ReconciliationEngine, SchemaMigrator, Store};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    std::fs::create_dir_all(&args.db_path)
        .with_context(|| format!("create cache directory {}", args.db_path.display()))?;
    let store = Store::in_dir(&args.db_path);

    // The engine never runs against a schema it does not recognise.
    let migrator = SchemaMigrator::new(store.path());
    let report = tokio::task::spawn_blocking(move || migrator.run())
        .await
        .wrap_err("migration task panicked")?
        .wrap_err_with(|| format!("migrate cache at {}", store.path().display()))?;
    tracing::info!(
        path = %store.path().display(),
        created = report.created,
        steps = report.applied.len(),
        "cache ready"
    );

    // A previously configured node must not show through.
    store
        .blocking(|s| s.clear_basic_info())
        .await
        .wrap_err("clear node basic info")?;

    let client = NodeClient::connect(&args.node_config())
        .wrap_err_with(|| format!("configure node connection `{}`", args.node))?;
    tracing::info!(node = %client.address(), layout = %client.layout(), "polling node");

    let engine = ReconciliationEngine::new(client, store, args.engine_config());
    engine
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
