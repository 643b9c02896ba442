use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use railpay_backend::api::{router, AppState};
use railpay_backend::cache::{init_cache_pool, CachePoolConfig, RedisPaymentCache};
use railpay_backend::chains::evm::{EvmConfig, EvmNode, EvmRpcClient};
use railpay_backend::config::AppConfig;
use railpay_backend::database::init_pool_from_config;
use railpay_backend::events::RedisEventPublisher;
use railpay_backend::gateway::HttpCardGateway;
use railpay_backend::health::HealthChecker;
use railpay_backend::logging::init_tracing;
use railpay_backend::services::{
    CardSettlementService, ChainSettlementService, LifecycleConfig, LogNotifier, PaymentLifecycle,
};
use railpay_backend::database::payment_repository::PgPaymentRepository;
use railpay_backend::workers::{ConfirmationMonitorConfig, ConfirmationMonitorWorker};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "starting railpay backend service"
    );

    // Persistence
    let db_pool = init_pool_from_config(&config.database).await?;
    let store = Arc::new(PgPaymentRepository::new(db_pool.clone()));

    // Cache and event bus share the Redis pool
    let cache_pool = init_cache_pool(CachePoolConfig {
        redis_url: config.cache.redis_url.clone(),
        max_connections: config.cache.max_connections,
        ..Default::default()
    })
    .await?;
    let cache = Arc::new(RedisPaymentCache::new(
        cache_pool.clone(),
        config.cache.default_ttl,
        config.cache.status_ttl,
    ));
    let events = Arc::new(RedisEventPublisher::new(cache_pool.clone()));

    // Rails
    let gateway = Arc::new(HttpCardGateway::from_env()?);
    let card = CardSettlementService::new(gateway);

    let evm_config = EvmConfig::from_env()?;
    let contract_address = evm_config.contract_address.clone();
    let min_confirmations = evm_config.min_confirmations;
    let node: Arc<dyn EvmNode> = Arc::new(EvmRpcClient::new(evm_config)?);
    let chain = ChainSettlementService::new(node.clone(), contract_address, min_confirmations);

    let lifecycle = Arc::new(PaymentLifecycle::new(
        store,
        cache,
        events,
        Arc::new(LogNotifier::new()),
        card,
        chain,
        LifecycleConfig::from_env(),
    ));

    let health = Arc::new(HealthChecker::new(db_pool, cache_pool, node));

    // Background confirmation monitor, stopped through the shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = ConfirmationMonitorWorker::new(
        lifecycle.clone(),
        ConfirmationMonitorConfig::from_env(),
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    let app = router(AppState { lifecycle, health }).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = monitor_handle.await;
    info!("shutdown complete");

    Ok(())
}
