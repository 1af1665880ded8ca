//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! This module is the **single canonical entry-point** for downstream users of
//! the library. It centralizes the curve/field type aliases, re-exports the
//! submodules that implement the telemetry framework's cryptographic core and
//! streaming engine, and documents the invariants that hold across all of
//! them.
//!
//! ## Invariants
//!
//! - **Curve.** All cryptographic commitments and range proofs operate over
//!   secp256k1 (`k256`). Scalars are elements of the scalar field mod the
//!   curve order *q*; points are elements of the group. Arithmetic is
//!   constant-time as provided by `k256`; we **forbid unsafe** throughout the
//!   crate.
//! - **Fiat-Shamir.** The Bulletproof verifier re-derives every challenge from
//!   SHA-256 over a domain-separated transcript (see [`transcript`]). Client-
//!   supplied challenges are never trusted.
//! - **No silent degradation.** `development_mode`-style relaxed checks are
//!   not a runtime default anywhere in this crate; the only opt-in relaxed
//!   path is the `dev-structural-checks` Cargo feature, which is off by
//!   default and loudly logged when active (see [`bulletproof`]).
//!
//! If any invariant is violated at runtime, the failure mode is a **precise,
//! structured error** (never a panic on attacker-controlled input).

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// secp256k1 point/scalar arithmetic, SEC1 (de)serialization, generator derivation.
pub mod ec;
/// Fiat-Shamir transcript and the Bulletproofs delta(y,z) polynomial.
pub mod transcript;
/// Bulletproofs range-proof verifier: parsing, main equation, inner-product argument.
pub mod bulletproof;
/// The `Attestor` capability trait and its HMAC/Ed25519/Bulletproofs/CKKS implementations.
pub mod attestor;
/// Minimal single-slot CKKS-style encrypt-only client used by the CKKS attestor.
pub mod ckks;
/// Typed server/sensor configuration, replacing the original's module-level settings.
pub mod config;
/// Concurrent, fixed-rate sensor streaming engine and HTTP dispatch client.
pub mod streaming;

pub use ec::{EcError, GeneratorSet, Point, Scalar};
pub use bulletproof::{ClientDebugComparison, ClientDebugError, Commitment, InnerProductProof, RangeProof, RootCause, VerificationResult, VerifyError};
pub use attestor::{AttestError, Attestor, AttestationPayload, PerformanceReport};
pub use config::{SensorConfig, ServerConfig};
pub use streaming::{AttestationRequest, AttestationResponse, SensorStream, StreamEngine, StreamError, StreamStats};

/// Proof bit-length fixed by this deployment (§3, §4.3).
pub const BIT_LENGTH: usize = 32;

/// Maximum inner-product argument rounds accepted before a hard reject (§4.3).
pub const MAX_IPP_ROUNDS: usize = 10;

/// Fiat-Shamir domain separation tag bound into every transcript (§4.2).
pub const TRANSCRIPT_DOMAIN_TAG: &[u8] = b"ICS_BULLETPROOF_VERIFIER_v1";

/// Fixed-point scale applied to fractional sensor values before Pedersen commitment (§4.4).
pub const BULLETPROOF_VALUE_SCALE: i64 = 1000;
