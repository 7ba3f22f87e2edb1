// ABOUTME: HTTP server assembly and lifecycle
// ABOUTME: Connects the store, starts the sandbox runtime and serves the API until a shutdown signal

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use evald_api::{create_router, AppState};
use evald_config::defaults;
use evald_sandbox::{DenoRuntime, Orchestrator, OrchestratorConfig, Permissions};
use evald_staging::RedisScriptStore;

use crate::config::Config;

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = RedisScriptStore::connect(&config.redis_url, config.script_ttl)
        .await
        .context("Failed to connect to the staging store")?;

    let runtime = DenoRuntime::new(&config.deno_path)
        .with_max_heap_mb(config.max_heap_mb)
        .with_max_message_bytes(config.max_message_bytes);
    match runtime.version().await {
        Ok(version) => info!(%version, "Sandbox runtime available"),
        Err(e) => warn!(error = %e, "Sandbox runtime unavailable, evaluations will fail"),
    }

    let deny_net = config.worker_deny_net();
    info!(denied_hosts = ?deny_net, timeout_ms = config.execution_timeout.as_millis() as u64, "Sandbox permissions configured");
    let orchestrator = Orchestrator::new(
        Arc::new(runtime),
        OrchestratorConfig {
            timeout: config.execution_timeout,
            permissions: Permissions::minimal().with_denied_hosts(deny_net),
        },
    );

    let state = AppState::new(
        Arc::new(store),
        Arc::new(orchestrator),
        config.public_url()?,
        config.max_code_bytes,
    );
    let app = build_app(state, config.cors_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        addr = %listener.local_addr()?,
        public_url = %config.public_url()?,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Router with request tracing and CORS applied
pub fn build_app(state: AppState, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    Ok(create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin)?))
}

fn cors_layer(cors_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let allow_origin = match cors_origin {
        Some(origin) => AllowOrigin::exact(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))?,
        ),
        None => AllowOrigin::mirror_request(),
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received, draining connections");
}
