mod api;
mod middleware;

use std::sync::Arc;

use storelens_scraper::{FetchClient, LlmEnhancer, Orchestrator, OrchestratorConfig};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = storelens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let fetcher = FetchClient::from_app_config(&config)?;
    let mut orchestrator =
        Orchestrator::new(Arc::new(fetcher), OrchestratorConfig::from_app_config(&config));

    let enhancement_enabled = match config.llm.as_ref() {
        Some(llm) => match LlmEnhancer::new(llm) {
            Ok(enhancer) => {
                orchestrator = orchestrator.with_enhancer(Arc::new(enhancer));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "enhancement pass disabled");
                false
            }
        },
        None => false,
    };

    let app = build_app(AppState {
        orchestrator: Arc::new(orchestrator),
        enhancement_enabled,
    });

    tracing::info!(
        bind_addr = %config.bind_addr,
        env = %config.env,
        enhancement_enabled,
        "storelens server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
