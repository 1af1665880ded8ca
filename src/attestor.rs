//! The `Attestor` capability trait and its HMAC/Ed25519/Bulletproofs/CKKS implementations
//!
//! Every scheme converts a single scalar sensor reading into a serializable,
//! authenticated payload (§4.4). The streaming engine (§4.5) holds
//! attestors behind `Arc<dyn Attestor>` and is agnostic to which is active —
//! unlike the original's thread-local crypto clients, a scheme's state here
//! is shared immutable data (a key, a generator set, a public key), safe to
//! hand to every concurrent task in a stream (§9).

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::Serialize;
use sha2::Sha256;

use crate::bulletproof::{Commitment, RawInnerProductProof, RawRangeProof};
use crate::ckks::{self, CkksError, CkksPublicKey};
use crate::ec::{EcError, GeneratorSet, Point, Scalar};
use crate::BULLETPROOF_VALUE_SCALE;

type HmacSha256 = Hmac<Sha256>;

/// Errors produced while attesting a reading.
#[derive(Debug, thiserror::Error)]
pub enum AttestError {
    /// The HMAC key was not the required 32 bytes.
    #[error("HMAC key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    /// Curve arithmetic failed while building a Bulletproofs commitment.
    #[error("bulletproofs commitment error: {0}")]
    Ec(#[from] EcError),
    /// CKKS encryption failed.
    #[error("ckks encryption error: {0}")]
    Ckks(#[from] CkksError),
    /// The reading fell outside the sensor's configured range.
    #[error("value {value} outside configured range [{min}, {max}]")]
    OutOfRange {
        /// The offending value.
        value: f64,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
}

/// The authenticated payload produced by an [`Attestor`], serialized over the
/// wire as the JSON body of a `POST /api/v1/verify/{scheme}` request (§6).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AttestationPayload {
    /// HMAC-SHA256 payload (§4.4): plaintext value exposed, symmetric key, fixed 32-byte MAC.
    Hmac {
        /// The plaintext sensor reading.
        value: f64,
        /// ISO-8601 timestamp the MAC was computed over.
        timestamp: String,
        /// Hex-encoded 32-byte MAC.
        mac_hex: String,
        /// Sensor identifier.
        sensor_id: String,
        /// Hash algorithm used, always `"sha256"` here.
        algorithm: String,
        /// MAC length in bytes, always 32.
        mac_size_bytes: usize,
    },
    /// Ed25519 payload (§4.4): value exposed, asymmetric, public key distributed out-of-band.
    Ed25519 {
        /// The plaintext sensor reading.
        value: f64,
        /// ISO-8601 timestamp the signature was computed over.
        timestamp: String,
        /// Hex-encoded 64-byte signature.
        signature_hex: String,
        /// Hex-encoded 32-byte public key.
        public_key_hex: String,
        /// Sensor identifier.
        sensor_id: String,
        /// Signature algorithm, always `"ed25519"` here.
        algorithm: String,
        /// Signature length in bytes, always 64.
        signature_size_bytes: usize,
    },
    /// Bulletproofs payload (§4.4): value hidden behind a Pedersen commitment.
    ///
    /// This attestor produces only the commitment and a structural proof
    /// envelope (§4.4: "actual proof generation is external"); the envelope's
    /// `proof` field is not a cryptographically valid range proof on its own.
    Bulletproof {
        /// Hex-encoded Pedersen commitment.
        commitment_hex: String,
        /// A structurally-shaped but non-functional proof envelope.
        proof: RawRangeProof,
        /// Lower bound of the scaled integer range.
        range_min: i64,
        /// Upper bound of the scaled integer range.
        range_max: i64,
        /// Sensor identifier.
        sensor_id: String,
    },
    /// CKKS payload (§4.4): value hidden behind RLWE ciphertext, server decrypts to verify.
    Ckks {
        /// Base64-encoded ciphertext.
        encrypted_data_b64: String,
        /// Identifier of the server-side encryption context this was encrypted under.
        context_id: String,
        /// ISO-8601 timestamp the ciphertext was produced at.
        timestamp: String,
        /// Sensor identifier.
        sensor_id: String,
    },
}

/// Capability shared by every attestation scheme (§4.4).
///
/// Implementations are expected to be cheaply `Clone`-able or held behind
/// `Arc` so a single instance can be shared across every concurrent task in
/// a [`crate::streaming::SensorStream`].
pub trait Attestor: Send + Sync {
    /// Produce an authenticated payload for one scalar reading.
    fn attest(&self, value: f64, sensor_id: &str) -> Result<AttestationPayload, AttestError>;

    /// A short label identifying the scheme, e.g. `"hmac"`. Used for logging
    /// and for selecting the verification endpoint (§6).
    fn scheme_name(&self) -> &'static str;
}

fn iso_timestamp() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn canonical_message(value: f64, timestamp: &str) -> Vec<u8> {
    format!("{value:.6}||{timestamp}").into_bytes()
}

/// Test values cycled through by `measure_performance` on the HMAC and
/// Ed25519 attestors, matching `hmac_baseline.py`/`ed25519_baseline.py`.
const PERFORMANCE_TEST_VALUES: [f64; 4] = [42.123456, 1000.789012, 0.000001, 999999.999999];

/// Result of an attestor's `measure_performance` micro-benchmark (§2A.1,
/// §4.4), mirroring the Python baselines' `measure_performance` return shape.
#[derive(Clone, Debug, Serialize)]
pub struct PerformanceReport {
    /// Mean time to produce an attestation payload.
    pub avg_generation_ms: f64,
    /// Mean time to verify a previously-issued payload.
    pub avg_verification_ms: f64,
    /// Fastest generation observed.
    pub min_generation_ms: f64,
    /// Slowest generation observed.
    pub max_generation_ms: f64,
    /// Fastest verification observed.
    pub min_verification_ms: f64,
    /// Slowest verification observed.
    pub max_verification_ms: f64,
    /// Serialized size of one representative payload, in bytes.
    pub payload_size_bytes: usize,
}

fn summarize_timings(generation_ms: Vec<f64>, verification_ms: Vec<f64>, payload_size_bytes: usize) -> PerformanceReport {
    let avg = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let min = |v: &[f64]| v.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = |v: &[f64]| v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    PerformanceReport {
        avg_generation_ms: avg(&generation_ms),
        avg_verification_ms: avg(&verification_ms),
        min_generation_ms: min(&generation_ms),
        max_generation_ms: max(&generation_ms),
        min_verification_ms: min(&verification_ms),
        max_verification_ms: max(&verification_ms),
        payload_size_bytes,
    }
}

/// HMAC-SHA256 attestor (§4.4).
pub struct HmacAttestor {
    key: [u8; 32],
}

impl HmacAttestor {
    /// Build an attestor from an explicit 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        HmacAttestor { key }
    }

    /// Build an attestor with a freshly-generated random key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        HmacAttestor { key }
    }

    /// Verify a previously-issued HMAC payload (primarily for local tests;
    /// production verification lives server-side per §6).
    pub fn verify(&self, value: f64, timestamp: &str, mac_hex: &str) -> bool {
        let Ok(received) = hex::decode(mac_hex) else { return false };
        let message = canonical_message(value, timestamp);
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else { return false };
        mac.update(&message);
        mac.verify_slice(&received).is_ok()
    }

    /// Micro-benchmark generation and verification over `iterations` cycles
    /// through a fixed set of test values (§2A.1), mirroring
    /// `hmac_baseline.py`'s `measure_performance`.
    pub fn measure_performance(&self, iterations: usize) -> PerformanceReport {
        let mut generation_ms = Vec::with_capacity(iterations.max(1));
        let mut verification_ms = Vec::with_capacity(iterations.max(1));
        let mut payload_size_bytes = 0;

        for i in 0..iterations.max(1) {
            let value = PERFORMANCE_TEST_VALUES[i % PERFORMANCE_TEST_VALUES.len()];

            let gen_start = Instant::now();
            let payload = self.attest(value, "perf-test").expect("HMAC attestation with a 32-byte key is infallible");
            generation_ms.push(gen_start.elapsed().as_secs_f64() * 1000.0);
            payload_size_bytes = serde_json::to_vec(&payload).map(|bytes| bytes.len()).unwrap_or(0);

            let AttestationPayload::Hmac { value, timestamp, mac_hex, .. } = &payload else { unreachable!("HmacAttestor::attest always returns Hmac") };
            let ver_start = Instant::now();
            self.verify(*value, timestamp, mac_hex);
            verification_ms.push(ver_start.elapsed().as_secs_f64() * 1000.0);
        }

        summarize_timings(generation_ms, verification_ms, payload_size_bytes)
    }
}

impl Attestor for HmacAttestor {
    fn attest(&self, value: f64, sensor_id: &str) -> Result<AttestationPayload, AttestError> {
        let timestamp = iso_timestamp();
        let message = canonical_message(value, &timestamp);
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| AttestError::InvalidKeyLength(self.key.len()))?;
        mac.update(&message);
        let tag = mac.finalize().into_bytes();
        Ok(AttestationPayload::Hmac {
            value,
            timestamp,
            mac_hex: hex::encode(tag),
            sensor_id: sensor_id.to_string(),
            algorithm: "sha256".to_string(),
            mac_size_bytes: tag.len(),
        })
    }

    fn scheme_name(&self) -> &'static str {
        "hmac"
    }
}

/// Ed25519 digital-signature attestor (§4.4).
pub struct Ed25519Attestor {
    signing_key: SigningKey,
}

impl Ed25519Attestor {
    /// Build an attestor from an explicit signing key.
    pub fn new(signing_key: SigningKey) -> Self {
        Ed25519Attestor { signing_key }
    }

    /// Build an attestor with a freshly-generated random key pair.
    pub fn generate() -> Self {
        Ed25519Attestor { signing_key: SigningKey::generate(&mut OsRng) }
    }

    /// The hex-encoded public key, for out-of-band distribution (§4.4).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Micro-benchmark generation and verification over `iterations` cycles
    /// through a fixed set of test values (§2A.1), mirroring
    /// `ed25519_baseline.py`'s `measure_performance`.
    pub fn measure_performance(&self, iterations: usize) -> PerformanceReport {
        let verifying_key = self.signing_key.verifying_key();
        let mut generation_ms = Vec::with_capacity(iterations.max(1));
        let mut verification_ms = Vec::with_capacity(iterations.max(1));
        let mut payload_size_bytes = 0;

        for i in 0..iterations.max(1) {
            let value = PERFORMANCE_TEST_VALUES[i % PERFORMANCE_TEST_VALUES.len()];

            let gen_start = Instant::now();
            let payload = self.attest(value, "perf-test").expect("ed25519 attestation is infallible");
            generation_ms.push(gen_start.elapsed().as_secs_f64() * 1000.0);
            payload_size_bytes = serde_json::to_vec(&payload).map(|bytes| bytes.len()).unwrap_or(0);

            let AttestationPayload::Ed25519 { value, timestamp, signature_hex, .. } = &payload else { unreachable!("Ed25519Attestor::attest always returns Ed25519") };
            let message = canonical_message(*value, timestamp);
            let ver_start = Instant::now();
            if let Ok(sig_bytes) = hex::decode(signature_hex) {
                if let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) {
                    let signature = ed25519_dalek::Signature::from_bytes(&sig_array);
                    let _ = verifying_key.verify_strict(&message, &signature);
                }
            }
            verification_ms.push(ver_start.elapsed().as_secs_f64() * 1000.0);
        }

        summarize_timings(generation_ms, verification_ms, payload_size_bytes)
    }
}

impl Attestor for Ed25519Attestor {
    fn attest(&self, value: f64, sensor_id: &str) -> Result<AttestationPayload, AttestError> {
        let timestamp = iso_timestamp();
        let message = canonical_message(value, &timestamp);
        let signature = self.signing_key.sign(&message);
        Ok(AttestationPayload::Ed25519 {
            value,
            timestamp,
            signature_hex: hex::encode(signature.to_bytes()),
            public_key_hex: self.public_key_hex(),
            sensor_id: sensor_id.to_string(),
            algorithm: "ed25519".to_string(),
            signature_size_bytes: signature.to_bytes().len(),
        })
    }

    fn scheme_name(&self) -> &'static str {
        "ed25519"
    }
}

/// Bulletproofs commitment-and-envelope attestor (§4.4).
///
/// Produces a real Pedersen commitment over the scaled integer value but,
/// per §4.4's "actual proof generation is external", a structural (not
/// cryptographically valid) range-proof envelope. A companion prover fills
/// in the real proof fields out of band.
pub struct BulletproofAttestor {
    generators: Arc<GeneratorSet>,
    range_min: i64,
    range_max: i64,
}

impl BulletproofAttestor {
    /// Build an attestor sharing `generators` and scoped to `[range_min, range_max]`
    /// in scaled-integer units (§4.4: scale factor 1000 for fractional values).
    pub fn new(generators: Arc<GeneratorSet>, range_min: i64, range_max: i64) -> Self {
        BulletproofAttestor { generators, range_min, range_max }
    }

    fn placeholder_proof(&self) -> RawRangeProof {
        let g_hex = self.generators.g.to_hex();
        let rounds = {
            let mut n = self.generators.n;
            let mut rounds = 0;
            while n > 1 {
                n /= 2;
                rounds += 1;
            }
            rounds
        };
        let zero = Scalar::ZERO.to_hex();
        RawRangeProof {
            a: g_hex.clone(),
            s: g_hex.clone(),
            t1: g_hex.clone(),
            t2: g_hex.clone(),
            tau_x: zero.clone(),
            mu: zero.clone(),
            t: zero.clone(),
            inner_product_proof: RawInnerProductProof {
                l: vec![g_hex.clone(); rounds],
                r: vec![g_hex; rounds],
                a: zero.clone(),
                b: zero,
            },
        }
    }
}

impl Attestor for BulletproofAttestor {
    fn attest(&self, value: f64, sensor_id: &str) -> Result<AttestationPayload, AttestError> {
        let scaled = (value * BULLETPROOF_VALUE_SCALE as f64).round() as i64;
        if scaled < self.range_min || scaled > self.range_max {
            return Err(AttestError::OutOfRange { value, min: self.range_min as f64, max: self.range_max as f64 });
        }
        let mut blinding_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut blinding_bytes);
        let blinding = Scalar::from_hex(&hex::encode(blinding_bytes))?.field();

        let value_scalar = if scaled >= 0 {
            Scalar::from_hex(&format!("{scaled:x}"))?.field()
        } else {
            return Err(AttestError::OutOfRange { value, min: self.range_min as f64, max: self.range_max as f64 });
        };
        let commitment: Commitment = self.generators.g.mul(&value_scalar) + self.generators.h.mul(&blinding);

        Ok(AttestationPayload::Bulletproof {
            commitment_hex: commitment.to_hex(),
            proof: self.placeholder_proof(),
            range_min: self.range_min,
            range_max: self.range_max,
            sensor_id: sensor_id.to_string(),
        })
    }

    fn scheme_name(&self) -> &'static str {
        "bulletproof"
    }
}

/// CKKS encrypt-only attestor (§4.4).
pub struct CkksAttestor {
    public_key: CkksPublicKey,
}

impl CkksAttestor {
    /// Build an attestor bound to a server-supplied public key.
    pub fn new(public_key: CkksPublicKey) -> Self {
        CkksAttestor { public_key }
    }
}

impl Attestor for CkksAttestor {
    fn attest(&self, value: f64, sensor_id: &str) -> Result<AttestationPayload, AttestError> {
        let mut rng = OsRng;
        let ciphertext = ckks::encrypt(value, &self.public_key, &mut rng)?;
        Ok(AttestationPayload::Ckks {
            encrypted_data_b64: ckks::encode_b64(&ciphertext),
            context_id: self.public_key.context_id.clone(),
            timestamp: iso_timestamp(),
            sensor_id: sensor_id.to_string(),
        })
    }

    fn scheme_name(&self) -> &'static str {
        "ckks"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_round_trips_through_verify() {
        let attestor = HmacAttestor::new([0x42; 32]);
        let payload = attestor.attest(2.45, "sensor-01").unwrap();
        let AttestationPayload::Hmac { value, timestamp, mac_hex, .. } = payload else { panic!("wrong variant") };
        assert!(attestor.verify(value, &timestamp, &mac_hex));
    }

    #[test]
    fn hmac_matches_known_test_vector() {
        // key = 32 * 0x42, value = 2.45, timestamp = "2024-01-01T00:00:00"
        // message = "2.450000||2024-01-01T00:00:00"
        let attestor = HmacAttestor::new([0x42; 32]);
        let message = canonical_message(2.45, "2024-01-01T00:00:00");
        assert_eq!(message, b"2.450000||2024-01-01T00:00:00");
        let mut mac = HmacSha256::new_from_slice(&[0x42; 32]).unwrap();
        mac.update(&message);
        let expected_tag = mac.finalize().into_bytes();
        assert!(attestor.verify(2.45, "2024-01-01T00:00:00", &hex::encode(expected_tag)));
    }

    #[test]
    fn hmac_rejects_tampered_value() {
        let attestor = HmacAttestor::new([0x11; 32]);
        let payload = attestor.attest(10.0, "sensor-02").unwrap();
        let AttestationPayload::Hmac { timestamp, mac_hex, .. } = payload else { panic!("wrong variant") };
        assert!(!attestor.verify(999.0, &timestamp, &mac_hex));
    }

    #[test]
    fn ed25519_signature_has_expected_size() {
        let attestor = Ed25519Attestor::generate();
        let payload = attestor.attest(3.14, "sensor-03").unwrap();
        let AttestationPayload::Ed25519 { signature_size_bytes, signature_hex, .. } = payload else { panic!("wrong variant") };
        assert_eq!(signature_size_bytes, 64);
        assert_eq!(hex::decode(signature_hex).unwrap().len(), 64);
    }

    #[test]
    fn bulletproof_attestor_rejects_out_of_scaled_range_values() {
        let gens = Arc::new(GeneratorSet::derive(32));
        let attestor = BulletproofAttestor::new(gens, 0, 1000);
        assert!(attestor.attest(100.0, "sensor-04").is_err());
    }

    #[test]
    fn bulletproof_attestor_produces_structurally_shaped_envelope() {
        let gens = Arc::new(GeneratorSet::derive(32));
        let attestor = BulletproofAttestor::new(gens, 0, 5000);
        let payload = attestor.attest(1.234, "sensor-05").unwrap();
        let AttestationPayload::Bulletproof { proof, commitment_hex, .. } = payload else { panic!("wrong variant") };
        assert!(Point::from_hex(&commitment_hex).is_ok());
        assert_eq!(proof.inner_product_proof.l.len(), proof.inner_product_proof.r.len());
    }

    #[test]
    fn ckks_attestor_produces_base64_ciphertext() {
        let pk = CkksPublicKey { context_id: "ctx-1".to_string(), a: vec![1; crate::ckks::RING_DIM], b: vec![2; crate::ckks::RING_DIM] };
        let attestor = CkksAttestor::new(pk);
        let payload = attestor.attest(5.5, "sensor-06").unwrap();
        let AttestationPayload::Ckks { context_id, encrypted_data_b64, .. } = payload else { panic!("wrong variant") };
        assert_eq!(context_id, "ctx-1");
        assert!(!encrypted_data_b64.is_empty());
    }

    #[test]
    fn hmac_measure_performance_reports_consistent_min_max() {
        let attestor = HmacAttestor::generate();
        let report = attestor.measure_performance(5);
        assert!(report.min_generation_ms <= report.avg_generation_ms);
        assert!(report.avg_generation_ms <= report.max_generation_ms);
        assert!(report.min_verification_ms <= report.max_verification_ms);
        assert!(report.payload_size_bytes > 0);
    }

    #[test]
    fn ed25519_measure_performance_reports_consistent_min_max() {
        let attestor = Ed25519Attestor::generate();
        let report = attestor.measure_performance(5);
        assert!(report.min_generation_ms <= report.avg_generation_ms);
        assert!(report.avg_generation_ms <= report.max_generation_ms);
        assert!(report.min_verification_ms <= report.max_verification_ms);
        assert!(report.payload_size_bytes > 0);
    }
}
