//! Axum API server binary: the composition root.
//!
//! Owns the background tasks (stuck sweeper, upload reaper, scheduled-job
//! redelivery) through explicit start/stop handles and shuts them down with
//! the server.

use std::net::SocketAddr;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidpipe_api::{create_router, metrics, ApiConfig, AppState};
use vidpipe_queue::JobKind;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vidpipe=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vidpipe-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let state = match AppState::new(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create application state: {}", e);
            std::process::exit(1);
        }
    };

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    // Background tasks share one shutdown signal.
    let (shutdown_tx, _) = tokio::sync::watch::channel(false);

    let detector = state.stuck_detector();
    let detector_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        detector.run(detector_shutdown).await;
    });

    let uploads = state.uploads.clone();
    let reaper_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        uploads.run_reaper(reaper_shutdown).await;
    });

    // Move nak-delayed messages back onto their streams.
    let queue = std::sync::Arc::clone(&state.queue);
    let mut redeliver_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = redeliver_shutdown.changed() => {
                    if *redeliver_shutdown.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    for kind in JobKind::ALL {
                        if let Err(e) = queue.redeliver_scheduled(kind).await {
                            error!("Scheduled redelivery error on {}: {}", kind, e);
                        }
                    }
                }
            }
        }
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    let _ = shutdown_tx.send(true);
    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
