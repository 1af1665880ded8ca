//! secp256k1 point/scalar arithmetic, SEC1 (de)serialization, generator derivation
//!
//! This module is the foundation everything else in the crate builds on: the
//! Bulletproof verifier, the Fiat-Shamir transcript, and the Bulletproofs
//! attestor all route their curve arithmetic through [`Point`] and [`Scalar`].
//!
//! Points are backed by [`k256::ProjectivePoint`]; scalars by [`k256::Scalar`].
//! `k256` is part of the same RustCrypto family this crate already depends on
//! for `sha2`/`hmac`, which keeps the dependency stack coherent rather than
//! pulling in a second, unrelated secp256k1 implementation.

use std::fmt;
use std::io;
use std::path::Path;

use elliptic_curve::group::prime::PrimeCurveAffine;
use elliptic_curve::group::GroupEncoding;
use elliptic_curve::ops::Reduce;
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use elliptic_curve::{Curve, PrimeField};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar as FieldScalar, Secp256k1, U256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Errors produced while parsing or loading curve material.
#[derive(Debug, thiserror::Error)]
pub enum EcError {
    /// Hex input was empty where a value was required.
    #[error("empty hex string")]
    EmptyHex,
    /// Hex input contained a non-hex-digit character.
    #[error("invalid hex characters")]
    InvalidHex,
    /// Decoded point bytes were neither 33 nor 65 bytes long.
    #[error("invalid EC point byte length: {len} (expected 33 or 65)")]
    InvalidLength {
        /// The length that was actually observed.
        len: usize,
    },
    /// The leading byte did not match a recognized SEC1 prefix for the given length.
    #[error("invalid EC point prefix: {prefix:#04x}")]
    InvalidPrefix {
        /// The offending prefix byte.
        prefix: u8,
    },
    /// The encoded bytes do not represent a point on the curve.
    #[error("EC point is not on the curve")]
    NotOnCurve,
    /// The point decoded to the identity, which is rejected wherever a
    /// non-identity point is contractually required.
    #[error("EC point is the point at infinity")]
    Identity,
    /// Scalar hex exceeded the maximum of 64 hex characters (32 bytes).
    #[error("scalar hex too long: {len} hex characters (max 64)")]
    ScalarTooLong {
        /// The length that was actually observed.
        len: usize,
    },
    /// A loaded generator file's vector length did not match the expected bit length.
    #[error("generator vector length mismatch: expected {expected}, got {got}")]
    GeneratorLengthMismatch {
        /// Expected vector length (the configured bit length).
        expected: usize,
        /// Actual length found in the file.
        got: usize,
    },
    /// Failure reading or writing a generator file.
    #[error("generator file I/O error: {0}")]
    Io(#[from] io::Error),
    /// Failure decoding a generator file's JSON.
    #[error("generator file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A scalar value mod the secp256k1 curve order *q*.
///
/// Parsing never reduces mod *q* — the raw 32-byte big-endian value is kept
/// alongside the reduced field element so callers can detect out-of-range
/// inputs if they care to (§4.1: "reduce mod q only at use sites").
#[derive(Clone, Copy)]
pub struct Scalar {
    raw: [u8; 32],
}

impl Scalar {
    /// The zero scalar.
    pub const ZERO: Scalar = Scalar { raw: [0u8; 32] };

    /// Parse a scalar from a hex string: optional "0x" prefix, any hex length
    /// up to 64 characters, left-padded to 32 bytes, interpreted big-endian.
    pub fn from_hex(s: &str) -> Result<Self, EcError> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if s.is_empty() {
            return Err(EcError::EmptyHex);
        }
        if s.len() > 64 {
            return Err(EcError::ScalarTooLong { len: s.len() });
        }
        if !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(EcError::InvalidHex);
        }
        let padded = format!("{:0>64}", s);
        let bytes = hex::decode(&padded).map_err(|_| EcError::InvalidHex)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes);
        Ok(Scalar { raw })
    }

    /// Wrap an already-reduced field element.
    pub fn from_field(f: FieldScalar) -> Self {
        Scalar { raw: f.to_repr().into() }
    }

    /// Build a scalar from the big-endian digest of a domain-separated seed,
    /// reducing mod *q* (used for generator derivation, §3).
    pub fn from_digest_reduced(digest: [u8; 32]) -> Self {
        Scalar::from_field(reduce_wide(&digest))
    }

    /// The 32-byte big-endian encoding as originally parsed (not reduced).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.raw
    }

    /// Lowercase hex of the raw (unreduced) bytes, no "0x" prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.raw)
    }

    /// The scalar reduced mod the curve order, as used in every arithmetic op.
    pub fn field(&self) -> FieldScalar {
        reduce_wide(&self.raw)
    }

    /// True if the raw bytes are already the canonical reduced representative.
    pub fn is_canonical(&self) -> bool {
        self.field().to_repr().as_slice() == self.raw
    }

    /// True if this scalar is zero (before or after reduction is irrelevant: 0 mod q = 0).
    pub fn is_zero(&self) -> bool {
        self.raw == [0u8; 32]
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({}...)", &self.to_hex()[..8])
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.field() == other.field()
    }
}
impl Eq for Scalar {}

fn reduce_wide(bytes: &[u8; 32]) -> FieldScalar {
    let u = U256::from_be_slice(bytes);
    <FieldScalar as Reduce<U256>>::reduce(u)
}

/// An element of the secp256k1 group.
///
/// Internally a [`ProjectivePoint`] so chained additions avoid repeated
/// affine normalization; convert to compressed/uncompressed SEC1 only at the
/// boundary (serialization, hashing, equality for logging).
#[derive(Clone, Copy)]
pub struct Point(ProjectivePoint);

impl Point {
    /// The canonical secp256k1 base generator.
    pub fn generator() -> Self {
        Point(ProjectivePoint::GENERATOR)
    }

    /// The point at infinity (identity element).
    pub fn identity() -> Self {
        Point(ProjectivePoint::IDENTITY)
    }

    /// True if this is the point at infinity.
    pub fn is_identity(&self) -> bool {
        bool::from(self.0.to_affine().is_identity())
    }

    /// Parse a point from hex, applying the exact validation rules of §4.1:
    /// optional "0x" prefix, any case; length must be 33 or 65 bytes; the
    /// leading byte must match the length's SEC1 convention; the decoded
    /// point must lie on the curve and must not be the identity.
    pub fn from_hex(s: &str) -> Result<Self, EcError> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if s.is_empty() {
            return Err(EcError::EmptyHex);
        }
        if !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(EcError::InvalidHex);
        }
        let bytes = hex::decode(s).map_err(|_| EcError::InvalidHex)?;
        match bytes.len() {
            33 => {
                if bytes[0] != 0x02 && bytes[0] != 0x03 {
                    return Err(EcError::InvalidPrefix { prefix: bytes[0] });
                }
            }
            65 => {
                if bytes[0] != 0x04 {
                    return Err(EcError::InvalidPrefix { prefix: bytes[0] });
                }
            }
            len => return Err(EcError::InvalidLength { len }),
        }
        let encoded = EncodedPoint::from_bytes(&bytes).map_err(|_| EcError::NotOnCurve)?;
        let affine = AffinePoint::from_encoded_point(&encoded);
        let affine = Option::<AffinePoint>::from(affine).ok_or(EcError::NotOnCurve)?;
        let point = Point(ProjectivePoint::from(affine));
        if point.is_identity() {
            return Err(EcError::Identity);
        }
        Ok(point)
    }

    /// 33-byte SEC1 compressed encoding.
    pub fn to_compressed(&self) -> [u8; 33] {
        let encoded = self.0.to_affine().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Lowercase hex of the 33-byte compressed encoding, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// 65-byte SEC1 uncompressed encoding.
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let encoded = self.0.to_affine().to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Point addition.
    pub fn add(&self, other: &Point) -> Point {
        Point(self.0 + other.0)
    }

    /// Point negation.
    pub fn neg(&self) -> Point {
        Point(-self.0)
    }

    /// Scalar multiplication by a reduced field element.
    pub fn mul(&self, scalar: &FieldScalar) -> Point {
        Point(self.0 * scalar)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}...)", &self.to_hex()[..10])
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}
impl Eq for Point {}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::add(&self, &rhs)
    }
}

impl std::ops::Mul<FieldScalar> for Point {
    type Output = Point;
    fn mul(self, rhs: FieldScalar) -> Point {
        Point::mul(&self, &rhs)
    }
}

impl std::ops::Mul<Point> for FieldScalar {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        Point::mul(&rhs, &self)
    }
}

/// The fixed public generator material shared by prover and verifier (§3).
///
/// Derived once at construction (or loaded from a JSON bring-up file); never
/// mutated afterward.
#[derive(Clone, Debug)]
pub struct GeneratorSet {
    /// Base generator `G` (the canonical secp256k1 generator).
    pub g: Point,
    /// Independent blinding generator `H`.
    pub h: Point,
    /// Length-`n` vector of generators used for the value bits.
    pub g_vec: Vec<Point>,
    /// Length-`n` vector of generators used for the blinding bits.
    pub h_vec: Vec<Point>,
    /// Bit length `n` this set was derived for.
    pub n: usize,
}

/// On-disk generator format used for bring-up interop with a foreign prover.
#[derive(Serialize, Deserialize)]
struct GeneratorFile {
    curve: String,
    domain_tag: String,
    n: usize,
    #[serde(rename = "G")]
    g: String,
    #[serde(rename = "H")]
    h: String,
    #[serde(rename = "G_vec")]
    g_vec: Vec<String>,
    #[serde(rename = "H_vec")]
    h_vec: Vec<String>,
}

impl GeneratorSet {
    /// Deterministically derive the generator set for bit-length `n` (§3):
    /// `H = reduce(SHA256(G_compressed || "bulletproof_h")) * G`,
    /// `G_i = reduce(SHA256("bulletproof_g_{i}")) * G`,
    /// `H_i = reduce(SHA256("bulletproof_h_{i}")) * G`.
    pub fn derive(n: usize) -> Self {
        let g = Point::generator();

        let mut hasher = Sha256::new();
        hasher.update(g.to_compressed());
        hasher.update(b"bulletproof_h");
        let h_scalar = Scalar::from_digest_reduced(hasher.finalize().into());
        let h = g.mul(&h_scalar.field());

        let g_vec = (0..n)
            .map(|i| {
                let seed = format!("bulletproof_g_{i}");
                let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
                g.mul(&Scalar::from_digest_reduced(digest).field())
            })
            .collect();

        let h_vec = (0..n)
            .map(|i| {
                let seed = format!("bulletproof_h_{i}");
                let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
                g.mul(&Scalar::from_digest_reduced(digest).field())
            })
            .collect();

        GeneratorSet { g, h, g_vec, h_vec, n }
    }

    /// Load a generator set from a bring-up JSON file (§4.1, §2A.1). On a bit-
    /// length mismatch between the file and `expected_n`, this aborts with
    /// [`EcError::GeneratorLengthMismatch`] rather than silently truncating.
    pub fn load_from_json(path: &Path, expected_n: usize) -> Result<Self, EcError> {
        let text = std::fs::read_to_string(path)?;
        let file: GeneratorFile = serde_json::from_str(&text)?;
        if file.n != expected_n || file.g_vec.len() != expected_n || file.h_vec.len() != expected_n {
            return Err(EcError::GeneratorLengthMismatch { expected: expected_n, got: file.g_vec.len() });
        }
        let g = Point::from_hex(&file.g)?;
        let h = Point::from_hex(&file.h)?;
        let g_vec = file.g_vec.iter().map(|s| Point::from_hex(s)).collect::<Result<Vec<_>, _>>()?;
        let h_vec = file.h_vec.iter().map(|s| Point::from_hex(s)).collect::<Result<Vec<_>, _>>()?;
        Ok(GeneratorSet { g, h, g_vec, h_vec, n: expected_n })
    }

    /// Dump this generator set to the bring-up JSON format (§2A.1).
    pub fn dump_to_json(&self, path: &Path) -> Result<(), EcError> {
        let file = GeneratorFile {
            curve: "secp256k1".to_string(),
            domain_tag: "ICS_BULLETPROOF_VERIFIER_v1".to_string(),
            n: self.n,
            g: self.g.to_hex(),
            h: self.h.to_hex(),
            g_vec: self.g_vec.iter().map(Point::to_hex).collect(),
            h_vec: self.h_vec.iter().map(Point::to_hex).collect(),
        };
        let text = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Point-by-point comparison against another generator set, for bring-up
    /// diagnostics (§2A.1). Returns the indices that disagree.
    pub fn compare(&self, other: &GeneratorSet) -> GeneratorComparison {
        let g_matches = self.g == other.g;
        let h_matches = self.h == other.h;
        let n = self.n.min(other.n);
        let g_vec_mismatches = (0..n).filter(|&i| self.g_vec[i] != other.g_vec[i]).collect();
        let h_vec_mismatches = (0..n).filter(|&i| self.h_vec[i] != other.h_vec[i]).collect();
        GeneratorComparison { g_matches, h_matches, g_vec_mismatches, h_vec_mismatches }
    }
}

/// Result of [`GeneratorSet::compare`].
#[derive(Debug, Clone)]
pub struct GeneratorComparison {
    /// Whether the base generators match.
    pub g_matches: bool,
    /// Whether the blinding generators match.
    pub h_matches: bool,
    /// Indices where `g_vec` disagrees.
    pub g_vec_mismatches: Vec<usize>,
    /// Indices where `h_vec` disagrees.
    pub h_vec_mismatches: Vec<usize>,
}

impl GeneratorComparison {
    /// True if every compared element matched.
    pub fn all_match(&self) -> bool {
        self.g_matches && self.h_matches && self.g_vec_mismatches.is_empty() && self.h_vec_mismatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trip_compressed_and_uncompressed() {
        let p = Point::generator().mul(&FieldScalar::from(12345u64));
        let compressed_hex = p.to_hex();
        let parsed = Point::from_hex(&compressed_hex).unwrap();
        assert_eq!(p, parsed);

        let uncompressed_hex = hex::encode(p.to_uncompressed());
        let parsed_uncompressed = Point::from_hex(&uncompressed_hex).unwrap();
        assert_eq!(p, parsed_uncompressed);
    }

    #[test]
    fn point_parse_rejects_bad_length_and_prefix() {
        assert!(matches!(Point::from_hex("deadbeef"), Err(EcError::InvalidLength { .. })));
        let mut bad = Point::generator().to_compressed().to_vec();
        bad[0] = 0x05;
        assert!(matches!(Point::from_hex(&hex::encode(bad)), Err(EcError::InvalidPrefix { .. })));
    }

    #[test]
    fn point_parse_rejects_identity() {
        let zero_compressed = "020000000000000000000000000000000000000000000000000000000000000001";
        // 33-byte encoding of a non-identity-but-synthetic invalid point is
        // rejected as not-on-curve before identity is even considered; the
        // identity case is exercised via the additive identity directly.
        assert!(Point::from_hex(zero_compressed).is_err());
    }

    #[test]
    fn scalar_parsing_left_pads_and_accepts_0x_prefix() {
        let a = Scalar::from_hex("0x2a").unwrap();
        let b = Scalar::from_hex("2a").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.to_bytes()[31], 0x2a);
        assert_eq!(a.field(), FieldScalar::from(42u64));
    }

    #[test]
    fn scalar_parsing_rejects_invalid_hex_and_overlong_input() {
        assert!(matches!(Scalar::from_hex("zz"), Err(EcError::InvalidHex)));
        let too_long: String = "a".repeat(65);
        assert!(matches!(Scalar::from_hex(&too_long), Err(EcError::ScalarTooLong { .. })));
        assert!(matches!(Scalar::from_hex(""), Err(EcError::EmptyHex)));
    }

    #[test]
    fn generator_derivation_is_deterministic() {
        let a = GeneratorSet::derive(32);
        let b = GeneratorSet::derive(32);
        assert_eq!(a.g, b.g);
        assert_eq!(a.h, b.h);
        for i in 0..32 {
            assert_eq!(a.g_vec[i], b.g_vec[i]);
            assert_eq!(a.h_vec[i], b.h_vec[i]);
        }
        assert!(a.compare(&b).all_match());
    }

    #[test]
    fn generator_derivation_h_is_independent_of_g_and_vectors_are_distinct() {
        let gs = GeneratorSet::derive(4);
        assert_ne!(gs.h, gs.g);
        for i in 0..gs.n {
            assert_ne!(gs.g_vec[i], gs.h_vec[i]);
            for j in (i + 1)..gs.n {
                assert_ne!(gs.g_vec[i], gs.g_vec[j]);
            }
        }
    }
}
