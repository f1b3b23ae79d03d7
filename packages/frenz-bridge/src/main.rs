use clap::Parser;
use frenz_bridge::config::BridgeSettings;
use frenz_bridge::control::ControlChannel;
use frenz_bridge::outlet::{DiscardOutletFactory, LslOutletFactory, OutletFactory};
use frenz_bridge::session::{ReplayBackend, SessionBackend, SimulatedBackend};
use frenz_bridge::shutdown::spawn_signal_listener;
use frenz_bridge::status::StatusEmitter;
use frenz_bridge::Bridge;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::{Cli, SinkKind, SourceKind};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // stdout carries the status protocol
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    log::info!(
        "frenz-bridge {} starting (source={}, sink={})",
        env!("CARGO_PKG_VERSION"),
        cli.source,
        cli.sink
    );

    let token = CancellationToken::new();
    let _signals = spawn_signal_listener(token.clone());

    let bridge = Bridge::new(
        StatusEmitter::stdout(),
        session_backend(&cli),
        outlet_factory(cli.sink),
        settings(&cli),
        token,
    );
    let exit_code = bridge.run(ControlChannel::stdin()).await;

    // The blocking stdin reader would otherwise keep the runtime alive.
    std::process::exit(exit_code);
}

fn session_backend(cli: &Cli) -> Box<dyn SessionBackend> {
    match cli.source {
        SourceKind::Simulated => Box::new(SimulatedBackend::new(Duration::from_millis(
            cli.simulated_connect_delay_ms,
        ))),
        SourceKind::Replay => Box::new(ReplayBackend::new(
            cli.replay_file.clone(),
            cli.replay_loop,
        )),
    }
}

fn outlet_factory(sink: SinkKind) -> Box<dyn OutletFactory> {
    match sink {
        SinkKind::Lsl => Box::new(LslOutletFactory),
        SinkKind::Discard => Box::new(DiscardOutletFactory),
    }
}

fn settings(cli: &Cli) -> BridgeSettings {
    BridgeSettings {
        data_timeout: Duration::from_secs(cli.data_timeout_secs),
        heartbeat_interval: Duration::from_secs(cli.heartbeat_secs),
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
        ..Default::default()
    }
}
