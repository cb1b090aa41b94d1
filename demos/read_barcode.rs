extern crate intent_barcodescanner;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Local;
use intent_barcodescanner::{
    bus::LocalEventBus, config::ScannerConfig, controller::ScannerController, event::ScanEvent,
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

    let bus = Arc::new(LocalEventBus::new());
    let config = ScannerConfig::default().with_debounce(Duration::from_millis(200));
    let event_id = config.event_id.clone();
    let mut scanner = ScannerController::new(config, Arc::new(TracingGateway), bus.clone());

    info!("claiming scanner");
    scanner.init()?;

    info!("starting read");
    let stream = scanner.read()?;

    // stand-in for the data collection service broadcasting scans
    let device = thread::spawn(move || {
        for (data, code_id) in [("4006381333931", "d"), ("CODE-128-DEMO", "j"), ("", "j")] {
            thread::sleep(Duration::from_millis(300));
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
            let outcome = bus.publish(&ScanEvent::barcode(&event_id, data, code_id, timestamp));
            info!("published {:?}: {:?}", data, outcome);
        }
    });

    for scan in stream.take(3) {
        let scan = scan?;
        println!("{}", serde_json::to_string(&scan)?);
    }

    device
        .join()
        .map_err(|_| anyhow!("simulated device thread panicked"))?;
    scanner.destroy()?;
    Ok(())
}
