//! Minimal CLI sensor-streaming client
//!
//! Drives one sensor from the built-in catalog against a verification
//! server at a fixed rate for a bounded duration or sample count, then
//! prints the aggregated stream statistics as JSON.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use ics_attest_core::attestor::{Attestor, Ed25519Attestor, HmacAttestor};
use ics_attest_core::config::{sensor_catalog, ServerConfig};
use ics_attest_core::streaming::{SensorStream, StreamEngine};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn find_sensor(sensor_id: &str) -> anyhow::Result<ics_attest_core::config::SensorConfig> {
    sensor_catalog::all()
        .into_iter()
        .find(|s| s.sensor_id.eq_ignore_ascii_case(sensor_id))
        .ok_or_else(|| anyhow::anyhow!("unknown sensor '{sensor_id}'; known: DM-PIT01, DM-PIT02, DM-FT01, DM-TIT01, DM-LIT01"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();

    let scheme = parse_flag(&args, "--scheme").unwrap_or_else(|| "hmac".to_string());
    let sensor_id = parse_flag(&args, "--sensor").unwrap_or_else(|| "DM-PIT01".to_string());
    let frequency_hz: f64 = parse_flag(&args, "--frequency-hz").and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let duration_s: Option<f64> = parse_flag(&args, "--duration-s").and_then(|s| s.parse().ok());
    let sample_count: Option<u64> = parse_flag(&args, "--samples").and_then(|s| s.parse().ok());
    let max_concurrent: usize = parse_flag(&args, "--max-concurrent").and_then(|s| s.parse().ok()).unwrap_or(50);
    let timeout_s: u64 = parse_flag(&args, "--timeout-s").and_then(|s| s.parse().ok()).unwrap_or(10);

    if duration_s.is_none() && sample_count.is_none() {
        anyhow::bail!("at least one of --duration-s or --samples is required");
    }

    let server = ServerConfig {
        host: parse_flag(&args, "--host").unwrap_or_else(|| "localhost".to_string()),
        port: parse_flag(&args, "--port").and_then(|s| s.parse().ok()).unwrap_or(8084),
        protocol: parse_flag(&args, "--protocol").unwrap_or_else(|| "http".to_string()),
        max_concurrent_requests: max_concurrent,
        ..Default::default()
    };

    let sensor = find_sensor(&sensor_id)?;

    let attestor: Arc<dyn Attestor> = match scheme.as_str() {
        "hmac" => Arc::new(HmacAttestor::generate()),
        "ed25519" => Arc::new(Ed25519Attestor::generate()),
        other => anyhow::bail!("scheme '{other}' requires a server-distributed public key or generator set; use the library API directly"),
    };

    eprintln!("Streaming {sensor_id} via {scheme} at {frequency_hz} Hz against {}...", server.url());

    let stream = SensorStream {
        sensor,
        server,
        frequency_hz,
        duration_s,
        sample_count,
        request_timeout: Some(Duration::from_secs(timeout_s)),
    };

    let engine = StreamEngine::new(max_concurrent);
    let (_records, stats) = engine.run(&stream, attestor).await;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
