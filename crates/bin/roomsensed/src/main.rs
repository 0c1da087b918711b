//! # roomsensed — roomsense daemon
//!
//! Composition root that wires the state store, the rooms and the MQTT
//! bridge together and keeps them running.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Install the tracing subscriber
//! - Construct the event bus, the state store and the room service
//! - Start the MQTT bridge when enabled
//! - Reload rooms on `SIGHUP`, shut down on `SIGINT`/`SIGTERM`
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use roomsense_adapter_mqtt::MqttBridge;
use roomsense_app::event_bus::InProcessEventBus;
use roomsense_app::services::room_service::RoomService;
use roomsense_app::state_store::InMemoryStateStore;
use roomsense_domain::id::EntityId;
use roomsense_domain::room::RoomConfig;

use crate::config::Config;

const EVENT_BUS_CAPACITY: usize = 256;

type Store = Arc<InMemoryStateStore<Arc<InProcessEventBus>>>;

enum Command {
    Reload,
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config::resolve_path(std::env::args().nth(1));
    let config = Config::load(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();
    let mut signals = Signals::new()?;

    let rooms = config.room_configs()?;
    tracing::info!(path = %path.display(), rooms = rooms.len(), "configuration loaded");

    // Event bus and host state
    let bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));
    let store: Store = Arc::new(InMemoryStateStore::new(bus.clone()));
    let service = Arc::new(RoomService::new(store.clone(), store.clone()));

    // Subscribers first, so the initial room states are not missed
    let bridge = config
        .mqtt
        .enabled
        .then(|| MqttBridge::start(&config.mqtt, store.clone(), bus.subscribe()));
    let dispatcher = {
        let service = service.clone();
        let rx = bus.subscribe();
        tokio::spawn(async move { service.run(rx).await })
    };

    // Rooms are registered with the bridge before they publish their initial state
    if let Some(bridge) = &bridge {
        bridge.sync(watched(&rooms), room_ids(&rooms)).await?;
    }
    service.apply(rooms).await?;
    let running = service.rooms().await;
    tracing::info!(rooms = ?running, "roomsensed running");

    loop {
        match signals.next_command().await? {
            Command::Reload => {
                if let Err(err) = reload(&path, &service, &store, bridge.as_ref()).await {
                    tracing::error!(%err, "reload failed, keeping current rooms");
                }
            }
            Command::Shutdown => break,
        }
    }

    tracing::info!("shutting down");
    dispatcher.abort();
    service.shutdown().await;
    if let Some(bridge) = bridge {
        bridge.stop().await;
    }
    Ok(())
}

/// Re-read the configuration file and reconcile the running rooms.
///
/// The logging filter is only read at startup.
async fn reload(
    path: &Path,
    service: &RoomService<Store, Store>,
    store: &Store,
    bridge: Option<&MqttBridge>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(path)?;
    let rooms = config.room_configs()?;
    if let Some(bridge) = bridge {
        bridge.sync(watched(&rooms), room_ids(&rooms)).await?;
    }
    let summary = service.apply(rooms).await?;

    for room in &summary.removed {
        store.remove(room).await?;
        if let Some(bridge) = bridge {
            bridge.clear(room).await?;
        }
    }

    tracing::info!(
        added = ?summary.added,
        restarted = ?summary.restarted,
        removed = ?summary.removed,
        "configuration reloaded"
    );
    Ok(())
}

fn watched(rooms: &[RoomConfig]) -> BTreeSet<EntityId> {
    rooms.iter().flat_map(RoomConfig::watched).collect()
}

fn room_ids(rooms: &[RoomConfig]) -> BTreeSet<EntityId> {
    rooms.iter().map(|r| r.entity_id().clone()).collect()
}

/// Signal streams registered once, so signals received while a reload runs
/// are still delivered afterwards.
#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn next_command(&mut self) -> std::io::Result<Command> {
        tokio::select! {
            _ = self.interrupt.recv() => Ok(Command::Shutdown),
            _ = self.terminate.recv() => Ok(Command::Shutdown),
            _ = self.hangup.recv() => Ok(Command::Reload),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    #[allow(clippy::unnecessary_wraps)]
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next_command(&mut self) -> std::io::Result<Command> {
        tokio::signal::ctrl_c().await?;
        Ok(Command::Shutdown)
    }
}
