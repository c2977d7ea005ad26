use anyhow::{Context, Result};
use cleaner_core::{
    domain::{
        repositories::{document_store::DocumentStore, file_storage::FileStorage},
        value_objects::clock::SystemClock,
    },
    infra::appwrite::client::AppwriteClient,
};
use database_cleaner::{
    axum_http, config,
    usecases::{
        database_cleanup::{DatabaseCleanupUseCase, TracingContext},
        purge_collection::PurgeCollectionUseCase,
        purge_orchestrator::PurgeOrchestrator,
    },
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Database cleaner exited with error: {:#}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    cleaner_core::observability::init_observability("database-cleaner")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let appwrite = Arc::new(
        AppwriteClient::new(dotenvy_env.appwrite.clone())
            .context("failed to build Appwrite client")?,
    );
    let document_store: Arc<dyn DocumentStore + Send + Sync> = appwrite.clone();
    let file_storage: Arc<dyn FileStorage + Send + Sync> = appwrite;

    let orchestrator = Arc::new(PurgeOrchestrator::new(
        PurgeCollectionUseCase::new(document_store, dotenvy_env.cleanup.page_size),
        file_storage,
        dotenvy_env.cleanup.bucket_id.clone(),
        dotenvy_env.collections.targets(),
        dotenvy_env.retention.policy.days(),
        dotenvy_env.retention.timestamp_field,
        Arc::new(SystemClock),
    ));
    let usecase = Arc::new(DatabaseCleanupUseCase::new(orchestrator));

    if let Some(server) = dotenvy_env.worker_server.clone() {
        return axum_http::http_serve::start(Arc::clone(&dotenvy_env), server, usecase).await;
    }

    usecase
        .run(&TracingContext, &dotenvy_env.cleanup.purge_options())
        .await?;
    Ok(())
}
