use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutor_worker::config::Config;
use tutor_worker::generation::{HttpGenerator, TextGenerator, Throttle};
use tutor_worker::queue::{spawn_workers, JobStore};
use tutor_worker::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_worker=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect queue storage
    let client = redis::Client::open(config.queue.url.as_str())?;
    let store = Arc::new(JobStore::connect(client, &config.queue).await?);
    info!(queue = %config.queue.name, "Queue storage connected");

    // Generation capability and its throttle, explicitly constructed and
    // injected rather than hidden behind process-wide singletons.
    let generator: Arc<dyn TextGenerator> = Arc::new(HttpGenerator::new(&config.generation));
    let throttle = Throttle::new(config.generation.concurrency);
    info!(
        model = %config.generation.model,
        concurrency = config.generation.concurrency,
        "Generation backend configured"
    );

    // Worker pool
    spawn_workers(
        config.queue.workers,
        store.clone(),
        generator,
        throttle,
        config.generation.clone(),
        config.limits.clone(),
    );

    // Create shared state and router
    let state = AppState {
        config: config.clone(),
        store,
    };
    let app = create_router(state);

    // Start server
    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
