//! HRV monitor example
//!
//! Finds a heart-rate strap by name, lists its services, collects RR
//! intervals for a fixed window and prints RMSSD.
//!
//! Run with: cargo run --example hrv_monitor
//!
//! Options:
//!   -d, --duration <seconds>   Collection window (default: 20)
//!   -n, --name <filter>        Advertised name fragment (default: XOSS)

use hrv_monitor_ble::{Error, HeartRateMonitor, HrvResult, MonitorConfig, Result};
use std::time::Duration;

/// Value following the first of `flags` on the command line.
fn arg_value<'a>(args: &'a [String], flags: &[&str]) -> Option<&'a String> {
    args.iter()
        .position(|arg| flags.contains(&arg.as_str()))
        .and_then(|i| args.get(i + 1))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = MonitorConfig::default();
    if let Some(value) = arg_value(&args, &["-d", "--duration"]) {
        let seconds: u64 = value.parse().map_err(|_| Error::InvalidParameter {
            name: "duration".to_string(),
            value: value.clone(),
        })?;
        config = config.with_collection_duration(Duration::from_secs(seconds));
    }
    if let Some(name) = arg_value(&args, &["-n", "--name"]) {
        config = config.with_name_filter(name.clone());
    }

    println!("🔍 Scanning for BLE devices...");

    let monitor = match HeartRateMonitor::discover(config).await {
        Ok(monitor) => monitor,
        Err(Error::DeviceNotFound { filter }) => {
            println!("❌ {} device not found.", filter);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("✅ Found device: {} ({})", monitor.name(), monitor.identifier());

    match monitor.connect().await {
        Ok(()) => {}
        Err(Error::CharacteristicNotFound { .. }) => {
            println!("⚠️ Heart Rate Measurement characteristic not found.");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    println!("🔗 Connected!");
    println!("📡 Listing services and characteristics...");
    for service in monitor.services()? {
        println!("{}", service);
    }

    if let Ok(location) = monitor.read_body_sensor_location().await {
        println!("📍 Sensor location: {}", location);
    }

    let _printer = monitor.on_reading(|reading| {
        if reading.has_rr_data {
            println!("❤️ Heart Rate: {} BPM", reading.heart_rate_bpm);
            println!("📏 RR Intervals: {:?} ms", reading.rr_intervals_ms);
        } else {
            println!("⚠️ No RR intervals in this measurement");
        }
    });

    let duration = monitor.config().collection_duration;
    println!("📥 Subscribing to Heart Rate notifications...");
    println!(
        "⏳ Waiting for heart rate data ({} seconds)...",
        duration.as_secs()
    );

    let result = monitor.collect_hrv().await;
    monitor.disconnect().await?;

    print_summary(&result?);

    Ok(())
}

fn print_summary(result: &HrvResult) {
    if result.sample_count == 0 {
        println!("⚠️ No RR intervals were collected");
        return;
    }

    println!("\n📊 HRV Analysis:");
    println!("Total RR intervals collected: {}", result.sample_count);
    if result.malformed_payloads > 0 {
        println!("Skipped malformed payloads: {}", result.malformed_payloads);
    }

    match result.rmssd_ms {
        Some(rmssd) => {
            println!("RMSSD: {:.2} ms", rmssd);
            println!("HRV Score: {:.2} ms", rmssd);
        }
        None => println!("⚠️ Not enough RR intervals for HRV calculation"),
    }
}
