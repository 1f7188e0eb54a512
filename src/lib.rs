pub mod collector;
pub mod db;
pub mod geocode;
pub mod identity;
pub mod permission;
pub mod position;
pub mod settings;
pub mod tracking;
mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use collector::HttpCollector;
use db::Database;
use geocode::{GeocodeCache, HttpGeocoder};
use identity::DeviceIdentityStore;
use log::{error, info, warn};
use permission::{HeadlessAuthority, PermissionGate};
use position::SimulatedPositionSource;
use settings::SettingsStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracking::{
    commands::{dispatch, CommandContext, HostCommand},
    spawn_lifecycle_listener, ControllerConfig, Sampler, StatusBroadcaster, TrackingController,
};

const DEFAULT_HOME: &str = ".fieldtrack";

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("fieldtrack starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("fieldtrack")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to build async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run_agent()) {
        error!("fieldtrack exited with error: {err:#}");
        std::process::exit(1);
    }
}

async fn run_agent() -> Result<()> {
    let home = std::env::var("FIELDTRACK_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_HOME));
    std::fs::create_dir_all(&home)
        .with_context(|| format!("failed to create {}", home.display()))?;

    let settings_store = SettingsStore::new(home.join("settings.json"))?;
    let settings = settings_store.current();
    if settings.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let database = Database::new(home.join("fieldtrack.sqlite3"))?;
    let identity = Arc::new(DeviceIdentityStore::new(Arc::new(database.clone())));
    info!("device id {}", identity.device_id().await);

    let collector = Arc::new(
        HttpCollector::new(&settings.collector_url, settings.http_timeout())
            .context("failed to set up collector client")?,
    );
    let geocoder = HttpGeocoder::new(&settings.geocode_url, settings.http_timeout())
        .context("failed to set up geocoder client")?;
    let source = SimulatedPositionSource::new(
        settings.simulated_origin.latitude,
        settings.simulated_origin.longitude,
    );

    let status = StatusBroadcaster::new();
    let sampler = Sampler::new(
        Arc::new(source),
        collector.clone(),
        identity,
        status.clone(),
        settings.sample_timeout(),
    );
    let permission = Arc::new(PermissionGate::new(
        Arc::new(HeadlessAuthority::from_env()),
        settings.request_background,
    ));
    let controller = TrackingController::new(
        sampler,
        permission,
        status,
        ControllerConfig {
            default_interval: settings.interval(),
            auto_start_on_login: settings.auto_start_on_login,
        },
    );

    let (lifecycle, listener) = spawn_lifecycle_listener(controller.clone());

    let mut observer = controller.status();
    let status_task = tokio::spawn(async move {
        while let Some(status) = observer.changed().await {
            match &status.last_error {
                Some(err) => warn!("tracking status: active={} error={err}", status.is_active),
                None => info!(
                    "tracking status: active={} last_report_at={:?}",
                    status.is_active, status.last_report_at
                ),
            }
        }
    });

    let ctx = CommandContext {
        controller: controller.clone(),
        lifecycle,
        geocode: Arc::new(GeocodeCache::new(Arc::new(geocoder))),
        collector,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<HostCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        let quit = command == HostCommand::Quit;
        match dispatch(&ctx, command).await {
            Ok(output) => println!("{output}"),
            Err(err) => println!("error: {err}"),
        }
        if quit {
            break;
        }
    }

    drop(ctx);
    if let Err(err) = listener.await {
        error!("lifecycle listener failed to join: {err}");
    }
    controller.stop().await;
    drop(controller);
    status_task.abort();

    info!("fieldtrack shut down; data in {}", database.path().display());
    Ok(())
}
