//! Concurrent, fixed-rate sensor streaming engine and HTTP dispatch client
//!
//! Distinct from the teacher's tile-streaming module of the same root name
//! (`stream.rs`, an unrelated polynomial-commitment streaming concern): this
//! is the telemetry dispatch engine of §4.5, driving one HTTP request per
//! sample against an external verification server at a fixed rate, bounded
//! by a semaphore rather than by thread count (§5).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::attestor::Attestor;
use crate::config::{SensorConfig, ServerConfig};

/// Errors produced while driving or dispatching a sensor stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The attestor failed to produce a payload for a sample.
    #[error("attestation failed: {0}")]
    Attestation(#[from] crate::attestor::AttestError),
    /// The HTTP request failed outright (connection refused, DNS, TLS, etc).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The request exceeded its configured timeout.
    #[error("request timeout after {0:?}")]
    Timeout(Duration),
    /// The server returned a response that did not parse as the expected envelope.
    #[error("response parse error: {0}")]
    ResponseParse(#[from] serde_json::Error),
}

/// A single scheduled sample, as dispatched into the pipeline (§3).
#[derive(Clone, Debug, Serialize)]
pub struct AttestationRequest {
    /// Sensor this reading came from.
    pub sensor_id: String,
    /// The reading value before encoding.
    pub value: f64,
    /// Unix-epoch milliseconds the sample was drawn at.
    pub timestamp: u64,
    /// A unique identifier correlating this request with its response.
    pub request_id: String,
}

/// The server's wire response envelope (§6): common fields plus an optional
/// scheme-specific recovered value used for `accuracy_error` (§4.5). This is
/// the HTTP JSON body, distinct from the engine's own [`AttestationResponse`]
/// record below.
#[derive(Clone, Debug, Default, Deserialize)]
struct ServerResponseEnvelope {
    verified: bool,
    processing_time_ms: Option<f64>,
    #[allow(dead_code)]
    algorithm: Option<String>,
    error_message: Option<String>,
    recovered_value: Option<f64>,
}

/// The engine's per-request outcome record (§3), folded into [`StreamStats`]
/// and available to callers for per-sample analysis.
#[derive(Clone, Debug, Serialize)]
pub struct AttestationResponse {
    /// Correlates with the originating [`AttestationRequest::request_id`].
    pub request_id: String,
    /// Sensor this reading came from.
    pub sensor_id: String,
    /// Whether the request completed successfully (attested, sent, and verified).
    pub success: bool,
    /// The plaintext value that was attested, before encoding.
    pub original_value: f64,
    /// The plaintext value the server recovered, for schemes that expose it.
    pub recovered_value: Option<f64>,
    /// Time spent producing the attestation payload.
    pub encryption_time_ms: f64,
    /// Time spent waiting for the HTTP response.
    pub response_time_ms: f64,
    /// The server's own self-reported processing time, if provided.
    pub server_processing_time_ms: Option<f64>,
    /// Error description when `success` is false.
    pub error_message: Option<String>,
    /// `|recovered - original| / max(|original|, eps) * 100`, when the server
    /// returned a recovered value.
    pub accuracy_error: Option<f64>,
}

/// Aggregated per-stream totals, emitted on completion (§4.5).
#[derive(Clone, Debug, Default, Serialize)]
pub struct StreamStats {
    /// Total requests dispatched.
    pub total: u64,
    /// Requests that completed successfully.
    pub successful: u64,
    /// Requests that failed (error, timeout, or server-reported rejection).
    pub failed: u64,
    /// Mean attestation-payload construction time.
    pub avg_encryption_ms: f64,
    /// Mean network round-trip time.
    pub avg_response_ms: f64,
    /// Mean accuracy error across requests that reported one.
    pub avg_accuracy_error: f64,
    /// `successful / actual_duration_s`.
    pub throughput_ops_per_sec: f64,
    /// Cumulative schedule lag accrued when dispatch fell behind its target times.
    pub cumulative_schedule_lag_ms: f64,
}

impl StreamStats {
    fn from_responses(responses: &[AttestationResponse], schedule_lag_ms: f64, actual_duration_s: f64) -> Self {
        let total = responses.len() as u64;
        let successful = responses.iter().filter(|r| r.success).count() as u64;
        let failed = total - successful;
        let avg = |f: fn(&AttestationResponse) -> f64| {
            if responses.is_empty() {
                0.0
            } else {
                responses.iter().map(f).sum::<f64>() / responses.len() as f64
            }
        };
        let accuracy_samples: Vec<f64> = responses.iter().filter_map(|r| r.accuracy_error).collect();
        let avg_accuracy_error = if accuracy_samples.is_empty() {
            0.0
        } else {
            accuracy_samples.iter().sum::<f64>() / accuracy_samples.len() as f64
        };
        StreamStats {
            total,
            successful,
            failed,
            avg_encryption_ms: avg(|r| r.encryption_time_ms),
            avg_response_ms: avg(|r| r.response_time_ms),
            avg_accuracy_error,
            throughput_ops_per_sec: if actual_duration_s > 0.0 { successful as f64 / actual_duration_s } else { 0.0 },
            cumulative_schedule_lag_ms: schedule_lag_ms,
        }
    }
}

/// A single sensor's streaming descriptor: which sensor, at what rate, for
/// how long or how many samples (§3, §4.5).
#[derive(Clone, Debug)]
pub struct SensorStream {
    /// The sensor being streamed.
    pub sensor: SensorConfig,
    /// Server connection settings this stream dispatches against.
    pub server: ServerConfig,
    /// Send frequency in Hz. `interval = 1 / frequency_hz`.
    pub frequency_hz: f64,
    /// Stop after this many seconds of wall-clock time, if set.
    pub duration_s: Option<f64>,
    /// Stop after this many samples, if set. At least one of `duration_s` or
    /// `sample_count` must be set.
    pub sample_count: Option<u64>,
    /// Per-request timeout; defaults to `server.timeout_s` when unset.
    pub request_timeout: Option<Duration>,
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ACCURACY_EPSILON: f64 = 1e-9;

fn scheme_path(scheme: &str) -> &'static str {
    match scheme {
        "hmac" => "/api/v1/verify/hmac",
        "ed25519" => "/api/v1/verify/ed25519",
        "bulletproof" => "/api/v1/verify/bulletproof",
        "ckks" => "/api/v1/ckks/verify",
        _ => "/api/v1/verify/unknown",
    }
}

fn compute_accuracy_error(original: f64, recovered: f64) -> f64 {
    let denom = original.abs().max(ACCURACY_EPSILON);
    (recovered - original).abs() / denom * 100.0
}

fn unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Drives a [`SensorStream`] against an [`Attestor`], dispatching requests at
/// a fixed rate under a bounded-concurrency semaphore (§4.5, §5).
pub struct StreamEngine {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    abort: Arc<AtomicBool>,
}

impl StreamEngine {
    /// Build an engine with its own connection pool and concurrency cap.
    pub fn new(max_concurrent_requests: usize) -> Self {
        StreamEngine {
            client: reqwest::Client::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation. In-flight tasks finish or time out; undispatched
    /// samples are dropped and not counted as failures (§4.5).
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Run a stream to completion (or cancellation), returning every
    /// per-request response record plus the aggregated totals (§4.5).
    pub async fn run(&self, stream: &SensorStream, attestor: Arc<dyn Attestor>) -> (Vec<AttestationResponse>, StreamStats) {
        let interval = Duration::from_secs_f64(1.0 / stream.frequency_hz.max(f64::MIN_POSITIVE));
        let timeout = stream.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let base_url = stream.server.url();
        let url = format!("{base_url}{}", scheme_path(attestor.scheme_name()));

        let t0 = Instant::now();
        let dispatched_count = Arc::new(AtomicU64::new(0));
        let schedule_lag_ms = Arc::new(std::sync::Mutex::new(0.0f64));
        let mut tasks = Vec::new();

        let mut i: u64 = 0;
        loop {
            if self.abort.load(Ordering::SeqCst) {
                debug!("stream aborted before dispatching request {i}");
                break;
            }
            if let Some(count) = stream.sample_count {
                if i >= count {
                    break;
                }
            }
            let target = Duration::from_secs_f64(interval.as_secs_f64() * i as f64);
            if let Some(duration_s) = stream.duration_s {
                if target.as_secs_f64() >= duration_s {
                    break;
                }
            }

            let now_offset = t0.elapsed();
            if target > now_offset {
                sleep(target - now_offset).await;
            } else if now_offset > target {
                let lag_ms = (now_offset - target).as_secs_f64() * 1000.0;
                *schedule_lag_ms.lock().unwrap() += lag_ms;
            }

            let permit = Arc::clone(&self.semaphore);
            let client = self.client.clone();
            let attestor = Arc::clone(&attestor);
            let url = url.clone();
            let sensor_id = stream.sensor.sensor_id.clone();
            let value = sample_value(&stream.sensor, i);
            let request = AttestationRequest { sensor_id, value, timestamp: unix_millis(), request_id: format!("{}-{i}", stream.sensor.sensor_id) };
            let timeout = timeout;
            let dispatched_count = Arc::clone(&dispatched_count);

            let task = tokio::spawn(async move {
                let _permit = match permit.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return request_error(request, "semaphore closed".to_string()),
                };
                dispatched_count.fetch_add(1, Ordering::Relaxed);
                dispatch_one(&client, &url, attestor.as_ref(), request, timeout).await
            });
            tasks.push(task);
            i += 1;
        }

        let mut responses = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(response) => responses.push(response),
                Err(e) => warn!(error = %e, "streaming task panicked"),
            }
        }

        let actual_duration_s = t0.elapsed().as_secs_f64();
        let lag = *schedule_lag_ms.lock().unwrap();
        let stats = StreamStats::from_responses(&responses, lag, actual_duration_s);
        (responses, stats)
    }
}

fn sample_value(sensor: &SensorConfig, index: u64) -> f64 {
    let span = sensor.range_max - sensor.range_min;
    let phase = (index % 100) as f64 / 100.0;
    sensor.range_min + span * phase
}

fn request_error(request: AttestationRequest, error: String) -> AttestationResponse {
    AttestationResponse {
        request_id: request.request_id,
        sensor_id: request.sensor_id,
        success: false,
        original_value: request.value,
        recovered_value: None,
        encryption_time_ms: 0.0,
        response_time_ms: 0.0,
        server_processing_time_ms: None,
        error_message: Some(error),
        accuracy_error: None,
    }
}

async fn dispatch_one(client: &reqwest::Client, url: &str, attestor: &dyn Attestor, request: AttestationRequest, timeout: Duration) -> AttestationResponse {
    let t_enc_start = Instant::now();
    let payload = match attestor.attest(request.value, &request.sensor_id) {
        Ok(p) => p,
        Err(e) => return request_error(request, e.to_string()),
    };
    let encryption_time_ms = t_enc_start.elapsed().as_secs_f64() * 1000.0;

    let t_net_start = Instant::now();
    let send = client.post(url).json(&payload).timeout(timeout).send();
    let result = tokio::time::timeout(timeout, send).await;
    let response_time_ms = t_net_start.elapsed().as_secs_f64() * 1000.0;

    let response = match result {
        Err(_) => {
            return AttestationResponse {
                request_id: request.request_id,
                sensor_id: request.sensor_id,
                success: false,
                original_value: request.value,
                recovered_value: None,
                encryption_time_ms: 0.0,
                response_time_ms,
                server_processing_time_ms: None,
                error_message: Some("Request timeout".to_string()),
                accuracy_error: None,
            };
        }
        Ok(Err(e)) => return request_error(request, e.to_string()),
        Ok(Ok(resp)) => resp,
    };

    let parsed: ServerResponseEnvelope = match response.json().await {
        Ok(r) => r,
        Err(e) => return request_error(request, e.to_string()),
    };

    let accuracy_error = parsed.recovered_value.map(|recovered| compute_accuracy_error(request.value, recovered));

    AttestationResponse {
        request_id: request.request_id,
        sensor_id: request.sensor_id,
        success: parsed.verified,
        original_value: request.value,
        recovered_value: parsed.recovered_value,
        encryption_time_ms,
        response_time_ms,
        server_processing_time_ms: parsed.processing_time_ms,
        error_message: parsed.error_message,
        accuracy_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response(request_id: &str, success: bool, accuracy_error: Option<f64>) -> AttestationResponse {
        AttestationResponse {
            request_id: request_id.to_string(),
            sensor_id: "DM-PIT01".to_string(),
            success,
            original_value: 10.0,
            recovered_value: None,
            encryption_time_ms: 1.0,
            response_time_ms: 2.0,
            server_processing_time_ms: None,
            error_message: if success { None } else { Some("x".to_string()) },
            accuracy_error,
        }
    }

    #[test]
    fn accuracy_error_is_zero_for_exact_recovery() {
        assert_eq!(compute_accuracy_error(10.0, 10.0), 0.0);
    }

    #[test]
    fn accuracy_error_uses_epsilon_floor_for_zero_original() {
        let err = compute_accuracy_error(0.0, 0.1);
        assert!(err.is_finite());
        assert!(err > 0.0);
    }

    #[test]
    fn stream_stats_computes_throughput_from_successful_only() {
        let responses = vec![sample_response("r0", true, Some(1.0)), sample_response("r1", false, None)];
        let stats = StreamStats::from_responses(&responses, 0.0, 2.0);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.throughput_ops_per_sec, 0.5);
        assert_eq!(stats.avg_accuracy_error, 1.0);
    }

    #[test]
    fn scheme_path_routes_known_schemes() {
        assert_eq!(scheme_path("hmac"), "/api/v1/verify/hmac");
        assert_eq!(scheme_path("ckks"), "/api/v1/ckks/verify");
    }

    #[tokio::test]
    async fn engine_respects_sample_count_bound() {
        let engine = StreamEngine::new(4);
        let stream = SensorStream {
            sensor: crate::config::sensor_catalog::dm_pit01(),
            server: ServerConfig { host: "127.0.0.1".to_string(), port: 1, ..Default::default() },
            frequency_hz: 1000.0,
            duration_s: None,
            sample_count: Some(3),
            request_timeout: Some(Duration::from_millis(50)),
        };
        let attestor: Arc<dyn Attestor> = Arc::new(crate::attestor::HmacAttestor::generate());
        let (responses, stats) = engine.run(&stream, attestor).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(stats.total, 3);
        // Unreachable port: every request fails, none panic or hang.
        assert_eq!(stats.successful, 0);
    }
}
