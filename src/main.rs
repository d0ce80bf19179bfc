use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use close_forecast::artifacts::{ArtifactCache, FsArtifactLoader};
use close_forecast::config::ServiceConfig;
use close_forecast::pipeline::Forecaster;
use close_forecast::server;
use close_forecast::source::YahooChartSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServiceConfig::from_env();
    tracing::info!(
        model = %cfg.artifacts.model_path.display(),
        preprocessor = %cfg.artifacts.preprocessor_path.display(),
        lookback = cfg.pipeline.lookback,
        "starting close-forecast"
    );

    let source = YahooChartSource::new(cfg.fetch_timeout).context("building market data client")?;
    let loader = FsArtifactLoader::new(cfg.artifacts.clone());
    let cache = ArtifactCache::new(Arc::new(loader));
    let forecaster = Arc::new(Forecaster::new(
        Arc::new(cache),
        Arc::new(source),
        cfg.pipeline.clone(),
    ));

    forecaster.warm_up().await;

    let app = server::router(Arc::clone(&forecaster), &cfg.api_prefix);
    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cfg.bind, cfg.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
