use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use freightdeck::api::{CarrierApiClient, CarrierEndpointsCache, TrackingApi};
use freightdeck::config::ServerConfig;
use freightdeck::search::SearchService;
use freightdeck::tracking::{ContainerStore, ShipmentEventBus};
use freightdeck::version::VERSION;
use freightdeck::web::{create_axum_router, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address, overriding LISTEN_ADDR from the environment
    #[arg(short, long)]
    listen: Option<String>,

    /// Skip the initial container list load on startup
    #[arg(long)]
    no_initial_load: bool,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let config = Arc::new(config);

    info!(version = VERSION, "Starting freightdeck server.");

    // Endpoints cache lives for the whole session and is shared with
    // every consumer of the carrier client.
    let endpoints = Arc::new(CarrierEndpointsCache::new());
    let api: Arc<dyn TrackingApi> =
        Arc::new(CarrierApiClient::new(&config.carrier_api_base_url, endpoints.clone())?);

    let (push_tx, _) = broadcast::channel(256);
    let store = Arc::new(ContainerStore::new(api.clone(), push_tx.clone()));
    store.set_page_size(config.default_page_size).await;

    let shipment_bus = ShipmentEventBus::default();
    let update_listener = store.run_update_listener(&shipment_bus);

    let (search_input_tx, search_state_rx, search_task) = SearchService::new(api.clone()).spawn();

    if args.no_initial_load {
        info!("Skipping initial container list load.");
    } else {
        // A failed initial load is surfaced in store state, not fatal;
        // clients can trigger a reload.
        store.load().await;
        if let Some(e) = store.load_error().await {
            error!(error = %e, "Initial container list load failed.");
        }
    }

    let app_state = Arc::new(AppState {
        store,
        api,
        shipment_bus,
        push_tx,
        search_input_tx,
        search_state_rx,
        config: config.clone(),
    });
    let app = create_axum_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for dashboard connections.");
    axum::serve(listener, app.into_make_service()).await?;

    // Background tasks are aborted when main exits; a graceful shutdown
    // would need a cancellation token, which this server does not yet carry.
    let _ = update_listener;
    let _ = search_task;

    Ok(())
}
