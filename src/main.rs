mod clients;
mod config;
mod helpers;
mod models;
mod quantity;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use clients::KubeClient;
use clients::aggregator::Aggregator;
use clients::broadcaster::Broadcaster;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub broadcaster: Arc<Broadcaster>,
    pub config: Arc<config::Config>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kube_overview=info,tower_http=info".into()),
        )
        .init();

    let config_path = std::env::args()
        .skip(1)
        .zip(std::env::args().skip(2))
        .find_map(|(k, v)| (k == "-config" || k == "--config").then_some(v))
        .or_else(|| std::env::args().nth(1).filter(|a| !a.starts_with('-')))
        .unwrap_or_else(|| "/etc/kube-overview/config.yaml".to_string());

    let cfg = config::Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });

    let kube_config = cfg.kube_config().await.unwrap_or_else(|e| {
        eprintln!("error loading cluster credentials ({:?} mode): {}", cfg.mode, e);
        std::process::exit(1);
    });

    let kube = Arc::new(KubeClient::new(kube_config).unwrap_or_else(|e| {
        eprintln!("error creating API client: {}", e);
        std::process::exit(1);
    }));
    info!("using API server {}", kube.base_url());

    let aggregator = Arc::new(Aggregator::new(kube.clone(), kube));
    let broadcaster = Arc::new(Broadcaster::new(aggregator.clone(), cfg.stream_interval()));
    let cfg = Arc::new(cfg);

    let state = AppState {
        aggregator,
        broadcaster,
        config: cfg.clone(),
    };

    let router = routes::build_router(state);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!("kube-overview listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {}", e);
            std::process::exit(1);
        });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
}
