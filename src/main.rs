use harvest_market::{
    config::{self, database},
    core::{
        EngineContext, cleanup, integrity,
        notify::DatabaseNotifier,
        retry::{RetryPolicy, with_retry},
        store::{TransientClassifier, classifier_for},
    },
    errors::Result,
};
use dotenvy::dotenv;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file
    dotenv().ok(); // Non-fatal, env vars can be set externally
    info!("Attempted to load .env file.");

    // 3. Load marketplace settings
    let market_config = config::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .map(Arc::new)
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(db.as_ref())
        .await
        .inspect(|_| info!("Database tables ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Run maintenance until interrupted
    let notifier = Arc::new(DatabaseNotifier::new(Arc::clone(&db)));
    let ctx = EngineContext::new(notifier, market_config);
    let policy = ctx.config.retry.policy();
    let classifier = classifier_for(db.get_database_backend());
    let mut ticker =
        tokio::time::interval(Duration::from_secs(ctx.config.maintenance.run_interval_secs));

    info!(
        interval_secs = ctx.config.maintenance.run_interval_secs,
        "Maintenance worker started"
    );
    // Only the first tick consults the recorded run time, so a restart inside the
    // interval does not clean twice. Later ticks are one interval apart already.
    let mut startup = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_maintenance(&db, &ctx, &policy, classifier, startup).await;
                startup = false;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping maintenance worker");
                break;
            }
        }
    }

    Ok(())
}

async fn run_maintenance(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    policy: &RetryPolicy,
    classifier: &dyn TransientClassifier,
    check_due: bool,
) {
    match integrity::validate_data_integrity(db, ctx).await {
        Ok(report) => {
            match report.to_json() {
                Ok(json) => info!(report = %json, "Integrity report"),
                Err(e) => warn!("Failed to serialize integrity report: {}", e),
            }
            if report.has_issues() {
                warn!("{}", integrity::format_integrity_summary(&report));
            }
        }
        Err(e) => error!("Integrity scan failed: {}", e),
    }

    let due = if check_due {
        cleanup::is_cleanup_due(db, ctx).await
    } else {
        Ok(true)
    };
    match due {
        Ok(true) => {
            match with_retry(policy, classifier, || cleanup::cleanup_expired_data(db, ctx)).await
            {
                Ok(result) => info!("{}", cleanup::format_cleanup_summary(&result)),
                Err(e) => error!("Cleanup failed: {}", e),
            }
        }
        Ok(false) => debug!("Cleanup not due yet"),
        Err(e) => error!("Failed to read cleanup state: {}", e),
    }
}
