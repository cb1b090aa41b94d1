extern crate intent_barcodescanner;

use std::sync::Arc;

use anyhow::Result;
use intent_barcodescanner::{
    bus::LocalEventBus,
    config::ScannerConfig,
    controller::{CommandOutput, ScannerController},
    gateway::TracingGateway,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // console output
    let console_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry().with(console_layer).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ScannerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ScannerConfig::default(),
    };
    info!("using scanner {}", config.scanner.selector());
    let mut scanner =
        ScannerController::new(config, Arc::new(TracingGateway), Arc::new(LocalEventBus::new()));

    for action in ["getState", "read", "init", "getState", "scan", "destroy", "getState"] {
        match scanner.execute(action) {
            Ok(CommandOutput::State(state)) => println!("{}: {}", action, state),
            Ok(CommandOutput::Stream(_)) => println!("{}: streaming", action),
            Ok(CommandOutput::Done) => println!("{}: ok", action),
            Err(err) => println!("{}: {}", action, err),
        }
    }

    Ok(())
}
