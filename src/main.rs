use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smart_irrigation_service::{
    api::{self, AppState},
    config::Config,
    db::{self, PgStore, TelemetryStore},
    hooks::{
        activity::ActivityHistory, energy::EnergyMonitor, historical::HistoricalData,
        live::LiveDashboard, HookHandle,
    },
    notify::Notifier,
    realtime::{listener, ChangeBus},
    settings::SettingsService,
    vision::{camera::CameraClient, DetectionService, Panel},
    weather::{WeatherClient, WeatherService},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Env vars may be set externally, so a missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;
    info!("Database ready");

    let cancel = CancellationToken::new();

    // Realtime changes: Postgres NOTIFY -> bus -> hook channels
    let bus = ChangeBus::new();
    let listener_task = tokio::spawn(listener::run(pool.clone(), bus.clone(), cancel.child_token()));

    let store: Arc<dyn TelemetryStore> = Arc::new(PgStore::new(pool));
    let notifier = Notifier::new();
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let weather = WeatherService::new(
        WeatherClient::new(http.clone(), &config.weather_base_url),
        &config.weather_api_key,
        &config.weather_location,
        config.weather_cache_path.clone(),
        notifier.clone(),
    );
    let weather_task = tokio::spawn(weather.clone().run(cancel.child_token()));

    let state = AppState {
        dashboard: Arc::new(HookHandle::spawn(LiveDashboard::new(config.live_refresh), store.clone(), &bus)),
        energy: Arc::new(HookHandle::spawn(EnergyMonitor::new(config.energy_refresh), store.clone(), &bus)),
        history: Arc::new(HookHandle::spawn(HistoricalData::new(config.history_refresh), store.clone(), &bus)),
        activity: Arc::new(HookHandle::spawn(ActivityHistory::new(config.activity_refresh), store.clone(), &bus)),
        settings: SettingsService::new(store, notifier.clone()),
        ripeness: DetectionService::new(
            Panel::Ripeness,
            http.clone(),
            &config.ripeness_inference_url,
            &config.inference_api_key,
            notifier.clone(),
        ),
        leaf_disease: DetectionService::new(
            Panel::LeafDisease,
            http.clone(),
            &config.leaf_inference_url,
            &config.inference_api_key,
            notifier.clone(),
        ),
        camera: config.camera_ip.as_deref().map(|ip| CameraClient::new(http.clone(), ip)),
        weather,
        notifier,
    };
    info!("Hooks started");

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let tcp = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(tcp, api::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop producers first, then tear the hooks down.
    cancel.cancel();
    tokio::join!(
        state.dashboard.shutdown(),
        state.energy.shutdown(),
        state.history.shutdown(),
        state.activity.shutdown(),
    );
    if let Err(e) = listener_task.await {
        error!(error = %e, "Realtime listener task panicked");
    }
    if let Err(e) = weather_task.await {
        error!(error = %e, "Weather task panicked");
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
