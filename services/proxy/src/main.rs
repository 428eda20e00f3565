//! wrap-proxy: exposes an HTTP origin through a relay network, per §1.
//!
//! Wires the injected collaborators (relay pool, HTTP client, route gate,
//! optional response transformer) into `wrap_core::Pipeline` and drives the
//! subscription loop, periodic maintenance, and status HTTP server.

mod cli;
mod config;
mod http_client;
mod nprofile;
mod relay_pool;
mod status_http;
mod watcher;

use clap::Parser;
use relay_pool::{Filter, TungsteniteRelayPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use wrap_core::{Pipeline, PipelineConfig};

const WARM_UP_FIRST_SLEEP: Duration = Duration::from_secs(1);
const WARM_UP_SECOND_SLEEP: Duration = Duration::from_secs(5);
const SUBSCRIPTION_LOOKBACK: i64 = 48 * 3600;
const SUBSCRIPTION_REFRESH: Duration = Duration::from_secs(3600);
const WRAP_DEDUP_COMPACT_INTERVAL: Duration = Duration::from_secs(3600);
const REQUEST_DEDUP_COMPACT_INTERVAL: Duration = Duration::from_secs(600);
const REASSEMBLY_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

fn now_secs() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "wrap-proxy starting");

    let cli = cli::Cli::parse();
    let cfg = match config::load_config_from_path(&cli.config) {
        Ok(cfg) => {
            info!(destination = %cfg.destination, relays = cfg.relays.len(), "config loaded");
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    watcher::watch_config_for_exit(&cli.config);

    let our_public = wrap_crypto::public_of(&cfg.secret_key);
    let relay_pool = Arc::new(TungsteniteRelayPool::new(&cfg.relays));

    let status = status_http::SubsystemStatus::new();
    let status_router = status_http::build_router(status.clone());
    let bind = cfg.status_http.bind.clone();
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&bind).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, status_router).await {
                    error!(error = %e, "status http server exited");
                }
            }
            Err(e) => error!(error = %e, bind = %bind, "failed to bind status http server"),
        }
    });

    // Connection warm-up: dial every relay, sleep 1s, check, and if none
    // connected yet, sleep another 5s and check once more. Zero relays
    // connected after that 6s window is a fatal init error (§7 RelayConnectFail).
    relay_pool.connect_all().await;
    tokio::time::sleep(WARM_UP_FIRST_SLEEP).await;
    if relay_pool.connected_count() == 0 {
        tokio::time::sleep(WARM_UP_SECOND_SLEEP).await;
    }
    if relay_pool.connected_count() == 0 {
        eprintln!("FATAL: no relay connections established after warm-up");
        std::process::exit(1);
    }

    let pipeline_config = PipelineConfig {
        destination: cfg.destination.clone(),
        secret_key: cfg.secret_key.clone(),
        relays: cfg.relays.clone(),
        allowed_routes: cfg.allowed_routes.clone(),
        timeout: cfg.timeout,
    };
    let http_client = Arc::new(http_client::ReqwestHttpClient::new());
    let pipeline = match Pipeline::new(pipeline_config, http_client, None) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("FATAL: invalid route configuration: {}", e);
            std::process::exit(1);
        }
    };

    match nprofile::encode_nprofile(&our_public, &relay_pool.connected_relays(), cfg.nprofile_max_relays) {
        Ok(np) => info!(nprofile = %np, "identity ready"),
        Err(e) => warn!(error = %e, "failed to encode nprofile"),
    }

    status.mark_ready();
    spawn_maintenance(pipeline.clone());

    let mut since = now_secs() - SUBSCRIPTION_LOOKBACK;
    loop {
        let filter = Filter { since, kinds: vec![wrap_protocol::kind::EPHEMERAL_GIFT_WRAP], p_tag: vec![our_public.to_hex()] };
        let pipeline_for_events = pipeline.clone();
        let relay_pool_for_events = relay_pool.clone();
        let on_event = Arc::new(move |event: wrap_protocol::Event| {
            let pipeline = pipeline_for_events.clone();
            let relay_pool = relay_pool_for_events.clone();
            tokio::spawn(async move {
                pipeline.handle_wrap_event(relay_pool.as_ref(), event).await;
            });
        });
        relay_pool.subscribe_all("wrap-proxy", filter, on_event).await;

        tokio::select! {
            _ = tokio::time::sleep(SUBSCRIPTION_REFRESH) => {
                since = now_secs() - SUBSCRIPTION_LOOKBACK;
                info!("refreshing subscription with advanced since cursor");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, closing relay connections");
                break;
            }
        }
    }
}

fn spawn_maintenance(pipeline: Arc<Pipeline>) {
    let p = pipeline.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WRAP_DEDUP_COMPACT_INTERVAL);
        loop {
            ticker.tick().await;
            p.compact_wrap_dedup().await;
        }
    });

    let p = pipeline.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REQUEST_DEDUP_COMPACT_INTERVAL);
        loop {
            ticker.tick().await;
            p.compact_request_dedup().await;
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REASSEMBLY_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            pipeline.sweep_reassembly().await;
        }
    });
}
