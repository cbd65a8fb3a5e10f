//! SDGW Controller
//!
//! Control plane for residential-gateway data-plane nodes. Hosts the
//! inbound node-management gRPC server, the HTTPS REST API, the
//! HTTP-to-HTTPS redirector and the Prometheus exposition endpoint, and
//! runs the stale-node sweeper and failed-event pipeline.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdgw_proto::v1::node_management_server::NodeManagementServer;

use sdgw_controller::api::{self, AppState};
use sdgw_controller::auth::{jwt, JwtManager};
use sdgw_controller::events;
use sdgw_controller::hsi::{CommandPublisher, HsiService, SubscriberCounts};
use sdgw_controller::metrics_server;
use sdgw_controller::monitor::{NodeMetrics, NodeMonitorManager};
use sdgw_controller::redirect;
use sdgw_controller::registry::{MonitorController, NodeRegistry, RegistryConfig};
use sdgw_controller::server::NodeManagementService;
use sdgw_controller::store::{EtcdStore, Store};

/// Prometheus exposition port is fixed; only the bind address varies.
const PROMETHEUS_PORT: u16 = 55688;

#[derive(Parser, Debug)]
#[command(name = "sdgw-controller")]
#[command(
    version,
    about = "SDGW control plane - node lifecycle, HSI configuration and telemetry"
)]
struct Args {
    /// etcd endpoints, comma separated.
    #[arg(long, default_value = "localhost:2379", env = "ETCD_ENDPOINTS")]
    etcd_endpoints: String,

    /// Port for the inbound node-management gRPC server.
    #[arg(long, default_value_t = 50051, env = "GRPC_PORT")]
    grpc_port: u16,

    /// Port for the HTTPS REST API.
    #[arg(long, default_value_t = 8443, env = "HTTPS_PORT")]
    https_port: u16,

    /// Port for the HTTP-to-HTTPS redirect listener.
    #[arg(long, default_value_t = 8080, env = "HTTP_REDIRECT_PORT")]
    http_redirect_port: u16,

    /// Bind address for the Prometheus exposition endpoint.
    #[arg(long, default_value = "127.0.0.1", env = "PROMETHEUS_LISTEN_IP")]
    prometheus_listen_ip: IpAddr,

    /// TLS certificate for the HTTPS server (PEM).
    #[arg(long, default_value = "./certs/server.crt", env = "CERT_FILE")]
    cert_file: PathBuf,

    /// TLS private key for the HTTPS server (PEM).
    #[arg(long, default_value = "./certs/server.key", env = "KEY_FILE")]
    key_file: PathBuf,

    /// Signing secret for bearer tokens; a random one is generated at
    /// startup when unset, invalidating outstanding tokens on restart.
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        etcd_endpoints = %args.etcd_endpoints,
        "Starting sdgw-controller"
    );

    // Single shared store connection for the whole process.
    let store: Arc<dyn Store> = Arc::new(
        EtcdStore::connect(&args.etcd_endpoints)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to etcd: {e}"))?,
    );

    let (shutdown_tx, _) = tokio::sync::watch::channel(false);

    // Metric registry and the monitor supervisor that feeds it.
    let metrics_registry = prometheus::Registry::new();
    let node_metrics = Arc::new(NodeMetrics::register(&metrics_registry)?);
    let monitors = Arc::new(NodeMonitorManager::new(node_metrics));

    let registry = NodeRegistry::new(
        Arc::clone(&store),
        Arc::clone(&monitors) as Arc<dyn MonitorController>,
        RegistryConfig::default(),
    );
    let sweeper = registry.spawn_sweeper(shutdown_tx.subscribe());
    let pipeline = events::spawn_failed_events_pipeline(Arc::clone(&store), shutdown_tx.subscribe());

    let jwt = Arc::new(JwtManager::new(
        jwt::resolve_secret(args.jwt_secret.as_deref()).as_bytes(),
    ));
    let counts = SubscriberCounts::new(Arc::clone(&store));
    let state = AppState {
        store: Arc::clone(&store),
        jwt,
        registry: registry.clone(),
        hsi: HsiService::new(Arc::clone(&store), counts.clone()),
        commands: CommandPublisher::new(Arc::clone(&store), counts.clone()),
        counts,
    };

    // Inbound gRPC server for node registration and heartbeats.
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], args.grpc_port));
    let node_mgmt = NodeManagementService::new(registry);
    let mut grpc_shutdown = shutdown_tx.subscribe();
    let grpc_task = tokio::spawn(async move {
        info!(addr = %grpc_addr, "Starting gRPC server");
        let result = tonic::transport::Server::builder()
            .add_service(NodeManagementServer::new(node_mgmt))
            .serve_with_shutdown(grpc_addr, async {
                let _ = grpc_shutdown.changed().await;
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "gRPC server failed");
        }
    });

    // Prometheus exposition endpoint.
    let prometheus_addr = SocketAddr::new(args.prometheus_listen_ip, PROMETHEUS_PORT);
    let prometheus_task = spawn_http_server(
        prometheus_addr,
        metrics_server::build_router(metrics_registry),
        "Prometheus metrics server",
        shutdown_tx.subscribe(),
    );

    // HTTP-to-HTTPS redirector.
    let redirect_addr = SocketAddr::from(([0, 0, 0, 0], args.http_redirect_port));
    let redirect_task = spawn_http_server(
        redirect_addr,
        redirect::build_router(args.http_redirect_port, args.https_port),
        "HTTP redirect server",
        shutdown_tx.subscribe(),
    );

    // HTTPS REST API.
    let tls = RustlsConfig::from_pem_file(&args.cert_file, &args.key_file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS material: {e}"))?;
    let https_addr = SocketAddr::from(([0, 0, 0, 0], args.https_port));
    let https_handle = axum_server::Handle::new();
    let https_task = tokio::spawn({
        let handle = https_handle.clone();
        let router = api::build_router(state);
        async move {
            info!(addr = %https_addr, "Starting HTTPS server");
            if let Err(e) = axum_server::bind_rustls(https_addr, tls)
                .handle(handle)
                .serve(router.into_make_service())
                .await
            {
                error!(error = %e, "HTTPS server failed");
            }
        }
    });

    // Wait for a shutdown signal.
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    // Fan the cancellation out to every long-lived task, then wait for
    // them to drain.
    let _ = shutdown_tx.send(true);
    monitors.stop_all().await;
    https_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    let _ = tokio::join!(
        grpc_task,
        prometheus_task,
        redirect_task,
        https_task,
        sweeper,
        pipeline
    );

    info!("Controller stopped");
    Ok(())
}

/// Bind and serve a plain-HTTP axum router until shutdown.
fn spawn_http_server(
    addr: SocketAddr,
    router: axum::Router,
    name: &'static str,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(addr = %addr, "Starting {name}");
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %addr, error = %e, "Failed to bind {name}");
                return;
            }
        };
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        });
        if let Err(e) = serve.await {
            error!(error = %e, "{name} failed");
        }
    })
}

fn init_tracing(log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sdgw_controller=info".into()),
    );
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
