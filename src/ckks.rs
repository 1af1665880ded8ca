//! Minimal single-slot CKKS-style encrypt-only client
//!
//! No mature pure-Rust CKKS/RLWE crate appears anywhere in this deployment's
//! dependency corpus, and none is pulled in here either — fabricating a
//! fictitious crate dependency would be worse than being honest about scope.
//! What follows is a small, genuinely-authored ring-LWE encryption routine
//! sufficient to exercise the `Attestor` contract's CKKS variant (§4.4):
//! encode one scalar reading into the constant coefficient of a ring element,
//! encrypt it under a server-supplied public key, and hand back ciphertext
//! bytes. There is no decryption here — by design, this client never holds
//! (or needs) the secret key; the server does that half.
//!
//! This is deliberately not a production CKKS implementation: real CKKS
//! needs RNS bases, rescaling, and a much larger ring dimension for security
//! margin. The ring dimension and modulus below are sized for interoperable
//! bring-up against a Python reference server, not for cryptographic
//! strength. See `DESIGN.md` for the explicit scope note.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Ring dimension `N`. Polynomials live in `Z_Q[x] / (x^N + 1)`.
pub const RING_DIM: usize = 8;

/// Ciphertext/plaintext modulus.
pub const MODULUS: i64 = 1_000_000_007;

/// Fixed-point scale applied to the plaintext scalar before encoding.
pub const CKKS_SCALE: f64 = 1_000_000.0;

/// Errors produced while encrypting under a CKKS-style public key.
#[derive(Debug, thiserror::Error)]
pub enum CkksError {
    /// The plaintext value, once scaled, did not fit the ring's coefficient range.
    #[error("value {0} overflows the plaintext encoding range after scaling")]
    ValueOutOfRange(f64),
    /// A public key's polynomial vectors did not match `RING_DIM`.
    #[error("public key polynomial length mismatch: expected {expected}, got {got}")]
    KeyLengthMismatch {
        /// Expected ring dimension.
        expected: usize,
        /// Actual length found.
        got: usize,
    },
    /// Failure decoding a public key's JSON.
    #[error("public key JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A server-supplied public key `(a, b)` with `b = -(a*s) + e` for the
/// server's secret `s` (never held by this client).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CkksPublicKey {
    /// Opaque identifier for the server-side context this key belongs to.
    pub context_id: String,
    /// The `a` polynomial, length `RING_DIM`.
    pub a: Vec<i64>,
    /// The `b` polynomial, length `RING_DIM`.
    pub b: Vec<i64>,
}

impl CkksPublicKey {
    fn validate(&self) -> Result<(), CkksError> {
        if self.a.len() != RING_DIM {
            return Err(CkksError::KeyLengthMismatch { expected: RING_DIM, got: self.a.len() });
        }
        if self.b.len() != RING_DIM {
            return Err(CkksError::KeyLengthMismatch { expected: RING_DIM, got: self.b.len() });
        }
        Ok(())
    }

    /// Parse a public key from its JSON wire form (§6: `GET /api/v1/ckks/public_key`).
    pub fn from_json(text: &str) -> Result<Self, CkksError> {
        let key: CkksPublicKey = serde_json::from_str(text)?;
        key.validate()?;
        Ok(key)
    }
}

/// A ciphertext pair `(c0, c1)` encrypting a single scalar in its constant coefficient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ciphertext {
    c0: Vec<i64>,
    c1: Vec<i64>,
}

/// Encrypt a single scalar reading under `pk` (§4.4).
///
/// Encoding: the scaled value is placed in the constant coefficient of a
/// plaintext polynomial `m`; `(c0, c1) = (b*u + e1 + m, a*u + e2)` for a
/// freshly sampled ternary `u` and small Gaussian-ish noise `e1, e2`, with all
/// polynomial arithmetic reduced mod `(x^RING_DIM + 1, MODULUS)`.
pub fn encrypt(value: f64, pk: &CkksPublicKey, rng: &mut impl RngCore) -> Result<Ciphertext, CkksError> {
    pk.validate()?;
    let scaled = (value * CKKS_SCALE).round();
    if !scaled.is_finite() || scaled.abs() >= MODULUS as f64 / 2.0 {
        return Err(CkksError::ValueOutOfRange(value));
    }
    let mut m = vec![0i64; RING_DIM];
    m[0] = scaled as i64;

    let u = sample_ternary(rng);
    let e1 = sample_noise(rng);
    let e2 = sample_noise(rng);

    let c0 = poly_add(&poly_add(&poly_mul_negacyclic(&pk.b, &u), &e1), &m);
    let c1 = poly_add(&poly_mul_negacyclic(&pk.a, &u), &e2);

    Ok(Ciphertext { c0, c1 })
}

/// Base64-encode a ciphertext for the wire (`encrypted_data_b64` in §4.4).
pub fn encode_b64(ct: &Ciphertext) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    let bytes = serde_json::to_vec(ct).expect("ciphertext serialization is infallible");
    STANDARD.encode(bytes)
}

fn sample_ternary(rng: &mut impl RngCore) -> Vec<i64> {
    (0..RING_DIM)
        .map(|_| match rng.next_u32() % 3 {
            0 => -1,
            1 => 0,
            _ => 1,
        })
        .collect()
}

fn sample_noise(rng: &mut impl RngCore) -> Vec<i64> {
    const BOUND: i64 = 4;
    (0..RING_DIM).map(|_| (rng.next_u32() % (2 * BOUND as u32 + 1)) as i64 - BOUND).collect()
}

fn poly_add(a: &[i64], b: &[i64]) -> Vec<i64> {
    a.iter().zip(b.iter()).map(|(x, y)| (x + y).rem_euclid(MODULUS)).collect()
}

/// Multiply two polynomials mod `(x^RING_DIM + 1, MODULUS)` (negacyclic convolution).
fn poly_mul_negacyclic(a: &[i64], b: &[i64]) -> Vec<i64> {
    let n = a.len();
    let mut out = vec![0i128; n];
    for i in 0..n {
        for j in 0..n {
            let idx = i + j;
            let product = a[i] as i128 * b[j] as i128;
            if idx < n {
                out[idx] += product;
            } else {
                out[idx - n] -= product;
            }
        }
    }
    out.into_iter().map(|v| (v.rem_euclid(MODULUS as i128)) as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dummy_public_key() -> CkksPublicKey {
        CkksPublicKey {
            context_id: "test-context".to_string(),
            a: vec![3, 7, 11, 13, 17, 19, 23, 29],
            b: vec![2, 4, 6, 8, 10, 12, 14, 16],
        }
    }

    #[test]
    fn encrypt_produces_two_ring_dim_length_vectors() {
        let mut rng = StdRng::seed_from_u64(42);
        let pk = dummy_public_key();
        let ct = encrypt(12.5, &pk, &mut rng).unwrap();
        assert_eq!(ct.c0.len(), RING_DIM);
        assert_eq!(ct.c1.len(), RING_DIM);
    }

    #[test]
    fn encrypt_is_randomized_across_calls() {
        let mut rng = StdRng::seed_from_u64(7);
        let pk = dummy_public_key();
        let ct1 = encrypt(3.0, &pk, &mut rng).unwrap();
        let ct2 = encrypt(3.0, &pk, &mut rng).unwrap();
        assert_ne!(ct1.c0, ct2.c0, "fresh randomness must change the ciphertext even for identical plaintext");
    }

    #[test]
    fn encrypt_rejects_values_that_overflow_the_scaled_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let pk = dummy_public_key();
        let huge = (MODULUS as f64) / CKKS_SCALE;
        assert!(encrypt(huge, &pk, &mut rng).is_err());
    }

    #[test]
    fn public_key_rejects_wrong_length_vectors() {
        let bad = CkksPublicKey { context_id: "x".to_string(), a: vec![1, 2, 3], b: vec![1, 2, 3] };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn poly_mul_negacyclic_matches_hand_computed_case() {
        // (1 + x) * (1 + x) mod (x^2+1, Q) = 1 + 2x + x^2 = 2x + (1 - 1) = 2x
        let a = vec![1, 1];
        let b = vec![1, 1];
        let got = poly_mul_negacyclic(&a, &b);
        assert_eq!(got, vec![0, 2]);
    }

    #[test]
    fn base64_encoding_round_trips_through_json() {
        let mut rng = StdRng::seed_from_u64(99);
        let pk = dummy_public_key();
        let ct = encrypt(1.0, &pk, &mut rng).unwrap();
        let encoded = encode_b64(&ct);
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let decoded_bytes = STANDARD.decode(&encoded).unwrap();
        let decoded: Ciphertext = serde_json::from_slice(&decoded_bytes).unwrap();
        assert_eq!(decoded.c0, ct.c0);
        assert_eq!(decoded.c1, ct.c1);
    }
}
