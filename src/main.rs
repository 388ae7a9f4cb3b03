//! Volume Syncer
//!
//! Syncs `PersistentVolume` objects between a tenant's virtual control
//! plane and the shared host cluster it runs on.

use clap::Parser;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volume_syncer::syncer::controller::{run_controller, run_physical_sweep, Context};
use volume_syncer::util::{get_vcluster_config, KubePodExecutor};
use volume_syncer::{
    DeletionPolicy, Error, KubeVolumeStore, PersistentVolumeSyncer, Result, SyncMetrics,
    SyncerConfig, VolumeReconciler,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Volume Syncer - PersistentVolume sync between a virtual cluster and its host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host namespace the tenant's objects are synced into
    #[arg(long, env = "TARGET_NAMESPACE")]
    target_namespace: String,

    /// Instance name appended to physical object names
    #[arg(long, env = "SUFFIX", default_value = "vcluster")]
    suffix: String,

    /// Kubeconfig of the virtual control plane
    #[arg(long, env = "VIRTUAL_KUBECONFIG")]
    virtual_kubeconfig: Option<PathBuf>,

    /// Tenant control-plane pod to read the kubeconfig from when no file is given
    #[arg(long, env = "VCLUSTER_POD")]
    vcluster_pod: Option<String>,

    /// Seconds to wait for the tenant control-plane pod
    #[arg(long, env = "VCLUSTER_WAIT_SECS", default_value = "600")]
    vcluster_wait_secs: u64,

    /// Deletion policy (orphan, delete-physical, mirror)
    #[arg(long, env = "DELETION_POLICY", default_value = "orphan")]
    deletion_policy: DeletionPolicy,

    /// Resync interval in seconds
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value = "300")]
    resync_interval_secs: u64,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn syncer_config(&self) -> SyncerConfig {
        let mut config = SyncerConfig::new(self.target_namespace.clone());
        config.suffix = self.suffix.clone();
        config.deletion_policy = self.deletion_policy;
        config.resync_interval_secs = self.resync_interval_secs;
        config.exec.namespace = self.target_namespace.clone();
        config.exec.pod = self.vcluster_pod.clone().unwrap_or_default();
        config.exec.timeout = std::time::Duration::from_secs(self.vcluster_wait_secs);
        config
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.syncer_config();
    config.validate()?;

    info!("Starting Volume Syncer");
    info!("  Version: {}", volume_syncer::VERSION);
    info!("  Target namespace: {}", config.target_namespace);
    info!("  Suffix: {}", config.suffix);
    info!("  Deletion policy: {}", config.deletion_policy);

    let physical_client = Client::try_default().await?;
    let virtual_client = virtual_client(&args, &config, physical_client.clone()).await?;

    let metrics = SyncMetrics::new()?;
    let reconciler = VolumeReconciler::new(
        PersistentVolumeSyncer::from_config(&config),
        Arc::new(KubeVolumeStore::new(
            virtual_client.clone(),
            physical_client,
        )),
        config.deletion_policy,
        metrics.clone(),
    );
    let ctx = Context::new(reconciler, config.resync_interval());

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    tokio::spawn(run_physical_sweep(ctx.clone()));

    let volumes: Api<PersistentVolume> = Api::all(virtual_client);
    run_controller(volumes, ctx).await;

    info!("Syncer shutdown complete");
    Ok(())
}

/// Client for the virtual control plane, from a kubeconfig file or read out
/// of the tenant control-plane pod
async fn virtual_client(args: &Args, config: &SyncerConfig, host: Client) -> Result<Client> {
    let kubeconfig = match (&args.virtual_kubeconfig, &args.vcluster_pod) {
        (Some(path), _) => Kubeconfig::read_from(path)?,
        (None, Some(pod)) => {
            info!("Reading virtual cluster kubeconfig from pod {}", pod);
            let executor = KubePodExecutor::new(host);
            let raw = get_vcluster_config(&executor, &config.exec).await?;
            let raw = String::from_utf8(raw)
                .map_err(|e| Error::Configuration(format!("kubeconfig is not UTF-8: {}", e)))?;
            Kubeconfig::from_yaml(&raw)?
        }
        (None, None) => {
            return Err(Error::Configuration(
                "either --virtual-kubeconfig or --vcluster-pod is required".to_string(),
            ))
        }
    };

    let client_config =
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(client_config)?)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(status: hyper::StatusCode, body: impl Into<hyper::Body>) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => text_response(StatusCode::OK, "ok"),
                _ => text_response(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, metrics: SyncMetrics) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode() {
                            Ok(buffer) => {
                                let mut response = text_response(StatusCode::OK, buffer);
                                if let Ok(value) = hyper::header::HeaderValue::from_str(
                                    prometheus::TEXT_FORMAT,
                                ) {
                                    response
                                        .headers_mut()
                                        .insert(hyper::header::CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => {
                                text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                            }
                        },
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
