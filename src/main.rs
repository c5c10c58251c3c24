use std::sync::Arc;

use flaps_bus::{Bus, Host};
use tokio_util::sync::CancellationToken;

use crate::{flight::RollDriver, handler::AppState, host::SimHost};

mod api;
mod config;
mod flight;
mod handler;
mod host;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("flaps_bus", log::LevelFilter::Debug)
        .filter_module("flaps_server", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let config = config::config();

    let host = Arc::new(SimHost::new());
    let bus = Arc::new(Bus::new(
        Arc::clone(&host) as Arc<dyn Host>,
        config.bus.clone(),
    ));
    if let Err(e) = bus.start() {
        eprintln!("Error starting bus: {:#}", e);
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();

    host::start_world_clock(
        Arc::clone(&host),
        Arc::clone(&bus),
        config.native_broadcast_interval_ticks,
        cancel.clone(),
    );

    if config.roll_driver {
        flight::start_roll_driver(
            Arc::clone(&host),
            Arc::clone(&bus),
            Arc::new(RollDriver::new()),
            cancel.clone(),
        );
    }

    let state = AppState {
        bus: Arc::clone(&bus),
        host,
    };
    api::start_api_server(config.listen.clone(), state, cancel.clone());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    bus.stop();
    std::process::exit(0);
}
