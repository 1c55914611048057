//! Site guard server.
//!
//! ```text
//!     Client ──▶ guard (blocklist → attack scan → rate limit → headers) ──▶ upstream site
//!                  │
//!                  └── counter store (rate windows, attack counters, blocks)
//!
//!     Operator ──▶ admin API (separate listener, bearer key)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use site_guard::admin::{setup_admin_router, AdminState};
use site_guard::config::load_runtime_config;
use site_guard::lifecycle::{shutdown_signal, Shutdown};
use site_guard::observability::{logging, metrics};
use site_guard::{GuardServer, MemoryStore, SecurityGuard};

#[derive(Parser)]
#[command(name = "site-guard", version, about = "Request security guard for a public web site")]
struct Args {
    /// TOML config file. Defaults plus environment overrides when omitted.
    #[arg(short, long, env = "SITE_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_runtime_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "site-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = ?config.upstream.address,
        mode = ?config.security.mode,
        environment = ?config.security.environment,
        trust_proxy = config.security.trust_proxy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    let store = MemoryStore::new();
    let sweeper = store.spawn_sweeper(
        Duration::from_secs(config.store.sweep_interval_secs),
        shutdown.subscribe(),
    );

    let guard = Arc::new(SecurityGuard::new(config.clone(), Arc::new(store))?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let admin = if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(AdminState::new(guard.clone()));
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let served = axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let signals = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signals.trigger();
    });

    GuardServer::new(guard).run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    if let Some(admin) = admin {
        let _ = admin.await;
    }
    let _ = sweeper.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
