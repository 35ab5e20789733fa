use std::net::SocketAddr;

use tokio::net::TcpListener;

use voxbridge::infrastructure::engine::EngineFactory;
use voxbridge::infrastructure::observability::{init_tracing, TracingConfig};
use voxbridge::presentation::{create_router, AppState, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    init_tracing(TracingConfig::default(), settings.server.port);

    let engine = EngineFactory::create(
        settings.engine.adapter,
        settings.managed_engine_config(),
        settings.offline_cli_config(),
    );

    // Warm the default model so the first request does not pay the
    // subprocess startup cost. The server still comes up if this fails;
    // /health reports degraded until a model loads.
    if let Err(e) = engine.load_model(&settings.engine.default_model).await {
        tracing::warn!(
            model_id = %settings.engine.default_model,
            error = %e,
            "default model failed to load at startup"
        );
    }

    let state = AppState {
        engine: engine.clone(),
    };
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.unload_model().await;
    tracing::info!("Engine stopped, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
