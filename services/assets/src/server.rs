//! Asset service HTTP server

use axum::{
    Router,
    routing::{delete, get, post},
};
use fabric::{
    AssetRouter, Config, CredentialStore, FabricCaClient, FileCredentialStore, Gateway,
    GatewayOptions, IdentityProvisioner,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/createAsset", post(handlers::create_asset))
        .route("/readAsset/:id", get(handlers::read_asset))
        .route("/updateAsset/:id", post(handlers::update_asset))
        .route("/deleteAsset/:id", delete(handlers::delete_asset))
        .route("/getAllAssets", get(handlers::get_all_assets))
        .route(
            "/transferAsset",
            get(handlers::transfer_asset).post(handlers::transfer_asset),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Provision identities, open the gateway session, then serve until shutdown.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let profile = config.load_profile()?;
    tracing::info!(
        "Loaded connection profile {} from {}",
        profile.name,
        config.profile_path.display()
    );

    let store = Arc::new(FileCredentialStore::new(&config.wallet_path)?);
    tracing::info!("Using wallet at {}", store.path().display());

    let ca = Arc::new(FabricCaClient::from_profile(
        &profile,
        &config.ca_name,
        config.ca_timeout,
    )?);

    let report = IdentityProvisioner::new(ca, store.clone(), config.provisioning_plan())
        .provision()
        .await?;
    tracing::info!(
        "Identities ready (admin: {:?}, app user: {:?})",
        report.admin,
        report.app_user
    );

    let identity = store.require(&config.gateway_identity).await?;
    let session = Arc::new(
        Gateway::open(&profile, &identity, GatewayOptions::from(&config)).await?,
    );
    let contract = session.resolve_contract(&config.channel, &config.chaincode)?;
    tracing::info!(
        "Using contract {} on channel {}",
        contract.name(),
        contract.channel()
    );

    let state = Arc::new(AppState {
        router: AssetRouter::new(contract),
        session: session.clone(),
    });
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Asset service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    session.close().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C signal"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received SIGTERM signal");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Starting graceful shutdown...");
}
