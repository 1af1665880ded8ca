//! Bulletproofs range-proof verifier: parsing, main equation, inner-product argument
//!
//! This is the hardest and largest module in the crate (§2: ~40% of the core
//! budget). Every encoding, every challenge input, and every scalar operation
//! here is bound by an existing Bulletproofs deployment and must match the
//! prover bit-for-bit (§4.3); nothing here is free to deviate for elegance.
//!
//! The verifier never trusts a client-supplied challenge or operating mode
//! hint — it always performs full arithmetic verification and treats such
//! hints as diagnostic annotations only (§4.3, §9).

use std::fmt;
use std::path::Path;
use std::time::Instant;

use elliptic_curve::Field;
use k256::Scalar as FieldScalar;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ec::{EcError, GeneratorSet, Point, Scalar};
use crate::transcript::{challenge_ipp_round, challenge_x, challenge_y, challenge_z, delta, sum_two_powers, sum_y_powers};
use crate::MAX_IPP_ROUNDS;

/// A Pedersen commitment `V = v*G + gamma*H` (§3).
pub type Commitment = Point;

/// The wire shape of an inner-product proof, as received over JSON (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawInnerProductProof {
    /// Per-round left points.
    #[serde(rename = "L")]
    pub l: Vec<String>,
    /// Per-round right points.
    #[serde(rename = "R")]
    pub r: Vec<String>,
    /// Final folded scalar `a`.
    pub a: String,
    /// Final folded scalar `b`.
    pub b: String,
}

/// The wire shape of a range proof, as received over JSON (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRangeProof {
    /// Bit commitment, SEC1 hex.
    #[serde(rename = "A")]
    pub a: String,
    /// Blinding-factor commitment, SEC1 hex.
    #[serde(rename = "S")]
    pub s: String,
    /// First polynomial commitment, SEC1 hex.
    #[serde(rename = "T1")]
    pub t1: String,
    /// Second polynomial commitment, SEC1 hex.
    #[serde(rename = "T2")]
    pub t2: String,
    /// Blinding scalar for the evaluation, hex.
    pub tau_x: String,
    /// Blinding scalar for `A`/`S`, hex.
    pub mu: String,
    /// Claimed evaluation `t_hat`, hex.
    pub t: String,
    /// The inner-product argument.
    pub inner_product_proof: RawInnerProductProof,
}

/// A parsed, typed inner-product proof (§3).
#[derive(Clone, Debug)]
pub struct InnerProductProof {
    /// Per-round left points, `|l| == ceil(log2(n))`.
    pub l: Vec<Point>,
    /// Per-round right points, `|r| == ceil(log2(n))`.
    pub r: Vec<Point>,
    /// Final folded scalar `a`.
    pub a: Scalar,
    /// Final folded scalar `b`.
    pub b: Scalar,
}

/// A parsed, typed range proof (§3).
#[derive(Clone, Debug)]
pub struct RangeProof {
    /// Bit commitment.
    pub a: Point,
    /// Blinding-factor commitment.
    pub s: Point,
    /// First polynomial commitment.
    pub t1: Point,
    /// Second polynomial commitment.
    pub t2: Point,
    /// Blinding scalar for the evaluation.
    pub tau_x: Scalar,
    /// Blinding scalar for `A`/`S`.
    pub mu: Scalar,
    /// Claimed evaluation `t_hat`.
    pub t_hat: Scalar,
    /// The inner-product argument.
    pub ipp: InnerProductProof,
}

/// Client-supplied challenge hints (§6, §9). Always ignored for verification;
/// compared only for diagnostic annotation (`client_challenge_mismatch`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientChallenges {
    /// Client's claimed `y`.
    pub y: Option<String>,
    /// Client's claimed `z`.
    pub z: Option<String>,
    /// Client's claimed `x`.
    pub x: Option<String>,
}

/// Options accepted alongside a verification request; none influence the result (§4.3).
#[derive(Clone, Debug, Default)]
pub struct VerifyOptions {
    /// When true, populate [`VerificationResult::debug_values`].
    pub debug: bool,
    /// Diagnostic-only challenge hints from the client.
    pub client_challenges: Option<ClientChallenges>,
    /// Diagnostic-only operating-mode hint from the client (e.g. `"zk_only"`), echoed but never honored.
    pub client_mode: Option<String>,
}

/// The closed set of diagnostic tags a rejection can carry (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    /// The commitment `V` did not parse as a valid point.
    CommitmentParseFailed,
    /// The proof object itself was structurally invalid.
    ProofParseFailed,
    /// One of `A`, `S`, `T1`, `T2`, `tau_x`, `mu`, `t` failed to parse.
    ProofComponentParseFailed,
    /// `inner_product_proof` was not a well-formed object.
    InnerProductProofInvalidFormat,
    /// `inner_product_proof` was missing the final `a`/`b` scalars.
    InnerProductProofMissingAb,
    /// `L`/`R`/`a`/`b` failed to parse or had inconsistent lengths.
    InnerProductProofParseFailed,
    /// The inner-product recursive reduction did not balance.
    InnerProductProofFailed,
    /// The main commitment-balance equation did not balance.
    MainEquationFailed,
    /// Diagnostic only: the client's supplied challenges disagreed with the
    /// server-recomputed ones. Never itself the reason verification failed.
    ClientChallengeMismatch,
    /// `range_min >= range_max`.
    RangeInvalid,
    /// `range_max` exceeds `2^n - 1` for the configured bit length.
    RangeScaleMismatch,
    /// An unclassified internal failure.
    Exception,
}

impl RootCause {
    /// The exact wire tag (snake_case), matching §7 verbatim.
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::CommitmentParseFailed => "commitment_parse_failed",
            RootCause::ProofParseFailed => "proof_parse_failed",
            RootCause::ProofComponentParseFailed => "proof_component_parse_failed",
            RootCause::InnerProductProofInvalidFormat => "inner_product_proof_invalid_format",
            RootCause::InnerProductProofMissingAb => "inner_product_proof_missing_ab",
            RootCause::InnerProductProofParseFailed => "inner_product_proof_parse_failed",
            RootCause::InnerProductProofFailed => "inner_product_proof_failed",
            RootCause::MainEquationFailed => "main_equation_failed",
            RootCause::ClientChallengeMismatch => "client_challenge_mismatch",
            RootCause::RangeInvalid => "range_invalid",
            RootCause::RangeScaleMismatch => "range_scale_mismatch",
            RootCause::Exception => "exception",
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejection carrying the full structured diagnosis (§7).
#[derive(Debug, thiserror::Error)]
#[error("{root_cause}: {evidence}")]
pub struct VerifyError {
    /// The closed-set diagnosis.
    pub root_cause: RootCause,
    /// A short machine-oriented description of what disagreed.
    pub evidence: String,
    /// A human-oriented hint for what to check next.
    pub fix_instruction: &'static str,
}

impl VerifyError {
    fn new(root_cause: RootCause, evidence: impl Into<String>, fix_instruction: &'static str) -> Self {
        VerifyError { root_cause, evidence: evidence.into(), fix_instruction }
    }
}

/// Hex echoes of every intermediate value, for bit-level interop bring-up (§4.3).
#[derive(Clone, Debug, Serialize)]
pub struct DebugValues {
    /// Recomputed Fiat-Shamir `y` challenge, hex.
    pub y: String,
    /// Recomputed Fiat-Shamir `z` challenge, hex.
    pub z: String,
    /// Recomputed Fiat-Shamir `x` challenge, hex.
    pub x: String,
    /// `delta(y,z)`, hex.
    pub delta_yz: String,
    /// The proof's claimed `t_hat`, hex.
    pub t_hat: String,
    /// The proof's claimed `tau_x`, hex.
    pub tau_x: String,
    /// The proof's claimed `mu`, hex.
    pub mu: String,
    /// Left side of the main equation, compressed point hex.
    pub left: String,
    /// Right side of the main equation, compressed point hex.
    pub right: String,
    /// Whether `left == right`.
    pub left_equals_right: bool,
    /// Milliseconds spent so far when this snapshot was taken.
    pub verification_time_ms: f64,
    /// `sum_{i=0}^{n-1} y^i`, hex.
    pub sum_y_powers: String,
    /// `sum_{i=0}^{n-1} 2^i`, hex.
    pub sum_2_powers: String,
    /// The bit range this proof was checked against, e.g. `"0..31"`.
    pub i_range: String,
    /// The commitment `V`, compressed point hex.
    pub v: String,
    /// `A`, compressed point hex.
    pub a: String,
    /// `S`, compressed point hex.
    pub s: String,
    /// `T1`, compressed point hex.
    pub t1: String,
    /// `T2`, compressed point hex.
    pub t2: String,
    /// Base generator `G`, compressed point hex.
    pub g: String,
    /// Blinding generator `H`, compressed point hex.
    pub h: String,
    /// Configured bit length.
    pub n: usize,
    /// Whether the inner-product argument folded correctly, when evaluated.
    pub inner_product_verified: Option<bool>,
    /// Whether client-supplied challenges were present and ignored.
    pub client_challenges_ignored: Option<bool>,
    /// The client-supplied challenge hints, echoed back verbatim.
    pub client_challenges: Option<ClientChallenges>,
}

/// The outcome of a verification attempt (§3).
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    /// Whether the proof was accepted.
    pub verified: bool,
    /// Total wall-clock time spent verifying, in milliseconds.
    pub processing_time_ms: f64,
    /// Size of the serialized proof, in bytes, if known to the caller.
    pub proof_size_bytes: Option<usize>,
    /// Whether the main commitment-balance equation held.
    pub equation_match: Option<bool>,
    /// Closed-set diagnosis when `verified` is false.
    pub root_cause: Option<RootCause>,
    /// Short machine-oriented evidence string.
    pub evidence: Option<String>,
    /// Human-oriented fix hint.
    pub fix_instruction: Option<String>,
    /// Populated only when `VerifyOptions::debug` was set.
    pub debug_values: Option<DebugValues>,
    /// Set when the caller supplied `client_challenges` (diagnostic only, never rejection-causing).
    pub client_challenges_ignored: Option<bool>,
}

/// Errors produced while parsing a client-dumped `debug_proof_*.json`
/// bring-up file (§2A.1).
#[derive(Debug, thiserror::Error)]
pub enum ClientDebugError {
    /// Failure reading the debug file.
    #[error("debug file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure decoding the debug file's JSON.
    #[error("debug file JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A scalar or point field failed to parse.
    #[error("debug file field error: {0}")]
    Field(#[from] EcError),
}

#[derive(Deserialize, Default)]
struct ClientDebugMetadata {
    n: Option<usize>,
    sensor_id: Option<String>,
}

#[derive(Deserialize)]
struct ClientDebugScalars {
    t: String,
    tau_x: String,
    y: String,
    z: String,
    x: String,
    delta: Option<String>,
}

#[derive(Deserialize)]
struct ClientDebugPoints {
    #[serde(rename = "V")]
    v: String,
    #[serde(rename = "T1")]
    t1: String,
    #[serde(rename = "T2")]
    t2: String,
}

#[derive(Deserialize, Default)]
struct ClientDebugGenerators {
    #[serde(rename = "G")]
    g: Option<String>,
    #[serde(rename = "H")]
    h: Option<String>,
}

#[derive(Deserialize)]
struct ClientDebugFile {
    #[serde(default)]
    metadata: ClientDebugMetadata,
    scalars: ClientDebugScalars,
    points: ClientDebugPoints,
    #[serde(default)]
    generators: ClientDebugGenerators,
}

/// Outcome of [`Verifier::verify_from_client_debug`] (§2A.1): a generator-set
/// interoperability diagnosis, not a proof-acceptance decision — contrast
/// with [`VerificationResult`], which always performs a full Fiat-Shamir
/// re-derivation from `A`/`S`/`T1`/`T2`. Here the challenges themselves are
/// taken from the client's dump, and only the main equation is recomputed,
/// once against this verifier's own generators and once (if supplied)
/// against the client's, to localize a generator mismatch between two
/// independent implementations.
#[derive(Clone, Debug, Serialize)]
pub struct ClientDebugComparison {
    /// Sensor identifier echoed from the debug file's metadata.
    pub sensor_id: String,
    /// Bit length echoed from the debug file's metadata.
    pub n: usize,
    /// Whether the main equation balances using this verifier's own generators.
    pub server_generators_match: bool,
    /// Whether it also balances using the client's generators, when the file supplied them.
    pub client_generators_match: Option<bool>,
    /// Whether the client's claimed `delta(y,z)` matches the recomputed value, when supplied.
    pub delta_match: Option<bool>,
    /// `"success"` when the server generators match, `"generator_mismatch"` otherwise.
    pub diagnosis: &'static str,
}

/// The Bulletproofs verifier for a fixed bit-length and generator set (§4.3).
pub struct Verifier {
    /// Bit length `n` this verifier is configured for (fixed at 32 in this deployment).
    pub n: usize,
    /// The shared, immutable generator material.
    pub generators: GeneratorSet,
}

impl Verifier {
    /// Build a verifier with freshly-derived generators for bit length `n`.
    pub fn new(n: usize) -> Self {
        Verifier { n, generators: GeneratorSet::derive(n) }
    }

    /// Build a verifier from an already-derived (or loaded) generator set.
    pub fn with_generators(generators: GeneratorSet) -> Self {
        Verifier { n: generators.n, generators }
    }

    /// The set of bit lengths this verifier accepts (§2A.1 supplemented introspection).
    pub fn get_supported_ranges(&self) -> Vec<usize> {
        vec![self.n]
    }

    /// Expected serialized proof size in bytes for this verifier's bit length
    /// (§2A.1 supplemented introspection): 4 compressed points + 3 scalars +
    /// `ceil(log2(n))` L/R point pairs + 2 final scalars.
    pub fn estimate_proof_size(&self) -> usize {
        let rounds = (self.n as f64).log2().ceil() as usize;
        4 * 33 + 3 * 32 + rounds * 2 * 33 + 2 * 32
    }

    /// Re-run the main commitment-balance equation from a client-dumped
    /// `debug_proof_*.json` bring-up file (§2A.1), once against this
    /// verifier's own generators and once against the file's own
    /// `generators` block, when present. Used to localize whether a
    /// server/client generator mismatch, rather than a proof defect, is the
    /// cause of a disagreement between two independent implementations.
    /// Never itself accepts or rejects a proof.
    pub fn verify_from_client_debug(&self, path: &Path) -> Result<ClientDebugComparison, ClientDebugError> {
        let text = std::fs::read_to_string(path)?;
        let file: ClientDebugFile = serde_json::from_str(&text)?;

        let n = file.metadata.n.unwrap_or(self.n);
        let sensor_id = file.metadata.sensor_id.unwrap_or_else(|| "unknown".to_string());

        let t = Scalar::from_hex(&file.scalars.t)?.field();
        let tau_x = Scalar::from_hex(&file.scalars.tau_x)?.field();
        let y = Scalar::from_hex(&file.scalars.y)?.field();
        let z = Scalar::from_hex(&file.scalars.z)?.field();
        let x = Scalar::from_hex(&file.scalars.x)?.field();

        let v = Point::from_hex(&file.points.v)?;
        let t1 = Point::from_hex(&file.points.t1)?;
        let t2 = Point::from_hex(&file.points.t2)?;

        let server_delta = delta(&y, &z, n);
        let z_sq = z * z;
        let x_sq = x * x;

        let left_server = self.generators.g.mul(&t) + self.generators.h.mul(&tau_x);
        let right_server = v.mul(&z_sq) + self.generators.g.mul(&server_delta) + t1.mul(&x) + t2.mul(&x_sq);
        let server_generators_match = left_server == right_server;

        let client_generators_match = match (file.generators.g.as_deref(), file.generators.h.as_deref()) {
            (Some(g_hex), Some(h_hex)) => {
                let client_g = Point::from_hex(g_hex)?;
                let client_h = Point::from_hex(h_hex)?;
                let left_client = client_g.mul(&t) + client_h.mul(&tau_x);
                let right_client = v.mul(&z_sq) + client_g.mul(&server_delta) + t1.mul(&x) + t2.mul(&x_sq);
                Some(left_client == right_client)
            }
            _ => None,
        };

        let delta_match = match file.scalars.delta.as_deref() {
            Some(delta_hex) => Some(Scalar::from_hex(delta_hex)?.field() == server_delta),
            None => None,
        };

        let diagnosis = if server_generators_match { "success" } else { "generator_mismatch" };

        Ok(ClientDebugComparison { sensor_id, n, server_generators_match, client_generators_match, delta_match, diagnosis })
    }

    /// Verify a range proof against a commitment and range bounds (§4.3).
    ///
    /// Never panics and never returns `Err`: every failure mode is encoded in
    /// the returned [`VerificationResult`].
    pub fn verify(
        &self,
        commitment_hex: &str,
        proof: &RawRangeProof,
        range_min: i64,
        range_max: i64,
        opts: &VerifyOptions,
    ) -> VerificationResult {
        let start = Instant::now();
        match self.verify_inner(commitment_hex, proof, range_min, range_max, opts) {
            Ok(inner) => self.accept(inner, start, opts),
            Err(e) => self.reject(e, start, opts, commitment_hex, proof),
        }
    }

    fn verify_inner(
        &self,
        commitment_hex: &str,
        proof: &RawRangeProof,
        range_min: i64,
        range_max: i64,
        opts: &VerifyOptions,
    ) -> Result<Accepted, VerifyError> {
        if range_min >= range_max {
            return Err(VerifyError::new(
                RootCause::RangeInvalid,
                format!("range_min={range_min} >= range_max={range_max}"),
                "ensure range_min is strictly less than range_max",
            ));
        }
        let max_representable = (1i128 << self.n) - 1;
        if (range_max as i128) > max_representable {
            return Err(VerifyError::new(
                RootCause::RangeScaleMismatch,
                format!("range_max={range_max} exceeds 2^{}-1", self.n),
                "lower range_max or reconfigure the verifier's bit length",
            ));
        }

        let v = Point::from_hex(commitment_hex)
            .map_err(|e| VerifyError::new(RootCause::CommitmentParseFailed, ec_evidence(&e), "ensure commitment is valid SEC1 hex"))?;

        let parsed = parse_proof(proof, self.n)?;

        let y = challenge_y(self.n, &parsed.a, &parsed.s);
        let z = challenge_z(self.n, &parsed.a, &parsed.s, &Scalar::from_field(y));
        let x = challenge_x(self.n, &parsed.t1, &parsed.t2, &Scalar::from_field(z));

        let client_challenges_present = opts.client_challenges.is_some();
        let challenge_mismatch_detected = opts
            .client_challenges
            .as_ref()
            .map(|c| challenges_disagree(c, &y, &z, &x))
            .unwrap_or(false);

        let delta_yz = delta(&y, &z, self.n);

        let left = self.generators.g.mul(&parsed.t_hat.field()) + self.generators.h.mul(&parsed.tau_x.field());
        let right = v.mul(&(z * z)) + self.generators.g.mul(&delta_yz) + parsed.t1.mul(&x) + parsed.t2.mul(&(x * x));

        let equation_match = left == right;

        if !equation_match {
            return Err(if client_challenges_present && challenge_mismatch_detected {
                VerifyError::new(
                    RootCause::ClientChallengeMismatch,
                    "client_provided_yz_x != server_FS",
                    "do not send challenges; recompute the proof using server Fiat-Shamir order",
                )
            } else {
                VerifyError::new(
                    RootCause::MainEquationFailed,
                    "left_hex != right_hex",
                    "check generators G/H and the delta(y,z) formula match the server",
                )
            });
        }

        let (p_final, g_final, h_final) = self.run_ipp(&parsed, &v, &y, &x)?;
        let ab = parsed.ipp.a.field() * parsed.ipp.b.field();
        let expected = g_final.mul(&parsed.ipp.a.field()) + h_final.mul(&parsed.ipp.b.field()) + self.generators.h.mul(&ab);
        let inner_product_verified = p_final == expected;

        if !inner_product_verified {
            return Err(VerifyError::new(
                RootCause::InnerProductProofFailed,
                "P_final != a*g_final + b*h_final + (a*b)*H",
                "check the inner-product reduction order and per-round challenge derivation",
            ));
        }

        Ok(Accepted { v, parsed, y, z, x, delta_yz, left, right })
    }

    fn run_ipp(&self, proof: &RangeProof, _v: &Point, y: &FieldScalar, x: &FieldScalar) -> Result<(Point, Point, Point), VerifyError> {
        let rounds = proof.ipp.l.len();
        if rounds != proof.ipp.r.len() || rounds == 0 {
            return Err(VerifyError::new(
                RootCause::InnerProductProofInvalidFormat,
                "L and R vectors missing or length mismatch",
                "ensure inner_product_proof.L and .R are present and equal length",
            ));
        }
        let expected_rounds = {
            let mut n = self.n;
            let mut rounds = 0;
            while n > 1 {
                n /= 2;
                rounds += 1;
            }
            rounds
        };
        if rounds != expected_rounds {
            return Err(VerifyError::new(
                RootCause::InnerProductProofInvalidFormat,
                format!("expected {expected_rounds} rounds, got {rounds}"),
                "ensure the proof was generated for this verifier's bit length",
            ));
        }
        if rounds > MAX_IPP_ROUNDS {
            return Err(VerifyError::new(
                RootCause::InnerProductProofInvalidFormat,
                format!("too many proof rounds: {rounds} (max {MAX_IPP_ROUNDS})"),
                "reject proofs claiming bit lengths above 1024",
            ));
        }

        let mut p = proof.a + proof.s.mul(x);

        let y_inv = y.invert().expect("y is never zero: derived from a 256-bit hash");
        let mut y_inv_power = y_inv.pow_vartime([(self.n as u64).saturating_sub(1)]);
        let mut g_prime: Vec<Point> = self.generators.g_vec.clone();
        let mut h_prime: Vec<Point> = self
            .generators
            .h_vec
            .iter()
            .map(|h_i| {
                let weighted = h_i.mul(&y_inv_power);
                y_inv_power *= y;
                weighted
            })
            .collect();

        for i in 0..rounds {
            let x_i = challenge_ipp_round(self.n, &proof.ipp.l[i], &proof.ipp.r[i]);
            let x_i_inv = x_i.invert().expect("ipp challenge is never zero: derived from a 256-bit hash");
            p = proof.ipp.l[i].mul(&x_i_inv) + p + proof.ipp.r[i].mul(&x_i);

            let half = g_prime.len() / 2;
            if half == 0 {
                break;
            }
            let (g_left, g_right) = g_prime.split_at(half);
            let (h_left, h_right) = h_prime.split_at(half);
            let new_g: Vec<Point> = (0..half).map(|j| g_left[j].mul(&x_i_inv) + g_right[j].mul(&x_i)).collect();
            let new_h: Vec<Point> = (0..half).map(|j| h_left[j].mul(&x_i) + h_right[j].mul(&x_i_inv)).collect();
            g_prime = new_g;
            h_prime = new_h;
        }

        if g_prime.len() != 1 || h_prime.len() != 1 {
            return Err(VerifyError::new(
                RootCause::InnerProductProofFailed,
                format!("unexpected final vector sizes: g={}, h={}", g_prime.len(), h_prime.len()),
                "ensure the round count matches log2(n) exactly",
            ));
        }

        Ok((p, g_prime[0], h_prime[0]))
    }

    fn accept(&self, acc: Accepted, start: Instant, opts: &VerifyOptions) -> VerificationResult {
        let debug_values = opts.debug.then(|| self.debug_values(&acc, start, true, Some(true), opts));
        VerificationResult {
            verified: true,
            processing_time_ms: elapsed_ms(start),
            proof_size_bytes: None,
            equation_match: Some(true),
            root_cause: None,
            evidence: None,
            fix_instruction: None,
            debug_values,
            client_challenges_ignored: opts.client_challenges.as_ref().map(|_| true),
        }
    }

    fn reject(
        &self,
        err: VerifyError,
        start: Instant,
        opts: &VerifyOptions,
        commitment_hex: &str,
        raw_proof: &RawRangeProof,
    ) -> VerificationResult {
        if err.root_cause == RootCause::MainEquationFailed || err.root_cause == RootCause::ClientChallengeMismatch {
            warn!(root_cause = %err.root_cause, evidence = %err.evidence, "bulletproof verification rejected");
        }
        // Best-effort debug echo on a partially-parseable proof: only attempted
        // when the failure happened after the challenges were derivable.
        let debug_values = if opts.debug {
            self.debug_values_on_reject(commitment_hex, raw_proof, start, &err, opts)
        } else {
            None
        };
        let equation_match = match err.root_cause {
            RootCause::MainEquationFailed | RootCause::ClientChallengeMismatch => Some(false),
            RootCause::InnerProductProofFailed => Some(true),
            _ => None,
        };
        VerificationResult {
            verified: false,
            processing_time_ms: elapsed_ms(start),
            proof_size_bytes: None,
            equation_match,
            root_cause: Some(err.root_cause),
            evidence: Some(err.evidence),
            fix_instruction: Some(err.fix_instruction.to_string()),
            debug_values,
            client_challenges_ignored: opts.client_challenges.as_ref().map(|_| true),
        }
    }

    fn debug_values(&self, acc: &Accepted, start: Instant, left_equals_right: bool, inner_product_verified: Option<bool>, opts: &VerifyOptions) -> DebugValues {
        DebugValues {
            y: Scalar::from_field(acc.y).to_hex(),
            z: Scalar::from_field(acc.z).to_hex(),
            x: Scalar::from_field(acc.x).to_hex(),
            delta_yz: Scalar::from_field(acc.delta_yz).to_hex(),
            t_hat: acc.parsed.t_hat.to_hex(),
            tau_x: acc.parsed.tau_x.to_hex(),
            mu: acc.parsed.mu.to_hex(),
            left: acc.left.to_hex(),
            right: acc.right.to_hex(),
            left_equals_right,
            verification_time_ms: elapsed_ms(start),
            sum_y_powers: Scalar::from_field(sum_y_powers(&acc.y, self.n)).to_hex(),
            sum_2_powers: Scalar::from_field(sum_two_powers(self.n)).to_hex(),
            i_range: format!("0..{}", self.n - 1),
            v: acc.v.to_hex(),
            a: acc.parsed.a.to_hex(),
            s: acc.parsed.s.to_hex(),
            t1: acc.parsed.t1.to_hex(),
            t2: acc.parsed.t2.to_hex(),
            g: self.generators.g.to_hex(),
            h: self.generators.h.to_hex(),
            n: self.n,
            inner_product_verified,
            client_challenges_ignored: opts.client_challenges.as_ref().map(|_| true),
            client_challenges: opts.client_challenges.clone(),
        }
    }

    fn debug_values_on_reject(
        &self,
        commitment_hex: &str,
        raw_proof: &RawRangeProof,
        start: Instant,
        err: &VerifyError,
        opts: &VerifyOptions,
    ) -> Option<DebugValues> {
        let v = Point::from_hex(commitment_hex).ok()?;
        let parsed = parse_proof(raw_proof, self.n).ok()?;
        let y = challenge_y(self.n, &parsed.a, &parsed.s);
        let z = challenge_z(self.n, &parsed.a, &parsed.s, &Scalar::from_field(y));
        let x = challenge_x(self.n, &parsed.t1, &parsed.t2, &Scalar::from_field(z));
        let delta_yz = delta(&y, &z, self.n);
        let left = self.generators.g.mul(&parsed.t_hat.field()) + self.generators.h.mul(&parsed.tau_x.field());
        let right = v.mul(&(z * z)) + self.generators.g.mul(&delta_yz) + parsed.t1.mul(&x) + parsed.t2.mul(&(x * x));
        let acc = Accepted { v, parsed, y, z, x, delta_yz, left, right };
        Some(self.debug_values(&acc, start, left == right, matches!(err.root_cause, RootCause::InnerProductProofFailed).then_some(false), opts))
    }
}

struct Accepted {
    v: Point,
    parsed: RangeProof,
    y: FieldScalar,
    z: FieldScalar,
    x: FieldScalar,
    delta_yz: FieldScalar,
    left: Point,
    right: Point,
}

fn ec_evidence(e: &EcError) -> String {
    e.to_string()
}

fn challenges_disagree(claimed: &ClientChallenges, y: &FieldScalar, z: &FieldScalar, x: &FieldScalar) -> bool {
    let mismatch = |claim: &Option<String>, actual: &FieldScalar| -> bool {
        match claim {
            None => false,
            Some(hex_str) => match Scalar::from_hex(hex_str) {
                Ok(parsed) => parsed.field() != *actual,
                Err(_) => true,
            },
        }
    };
    mismatch(&claimed.y, y) || mismatch(&claimed.z, z) || mismatch(&claimed.x, x)
}

fn parse_proof(raw: &RawRangeProof, n: usize) -> Result<RangeProof, VerifyError> {
    let parse_point = |s: &str| Point::from_hex(s).map_err(|e| VerifyError::new(RootCause::ProofComponentParseFailed, ec_evidence(&e), "ensure proof points are valid SEC1 hex"));
    let parse_scalar = |s: &str| Scalar::from_hex(s).map_err(|e| VerifyError::new(RootCause::ProofComponentParseFailed, ec_evidence(&e), "ensure proof scalars are valid hex"));

    let a = parse_point(&raw.a)?;
    let s = parse_point(&raw.s)?;
    let t1 = parse_point(&raw.t1)?;
    let t2 = parse_point(&raw.t2)?;
    let tau_x = parse_scalar(&raw.tau_x)?;
    let mu = parse_scalar(&raw.mu)?;
    let t_hat = parse_scalar(&raw.t)?;

    let ipp_raw = &raw.inner_product_proof;
    if ipp_raw.l.len() != ipp_raw.r.len() {
        return Err(VerifyError::new(
            RootCause::InnerProductProofInvalidFormat,
            "L and R vectors length mismatch",
            "ensure inner_product_proof.L and .R are equal length",
        ));
    }
    if ipp_raw.a.is_empty() || ipp_raw.b.is_empty() {
        return Err(VerifyError::new(
            RootCause::InnerProductProofMissingAb,
            "a_or_b_not_in_inner_product_proof",
            "include final a and b scalars in inner_product_proof",
        ));
    }
    let l = ipp_raw
        .l
        .iter()
        .map(|s| parse_point(s).map_err(|_| VerifyError::new(RootCause::InnerProductProofParseFailed, "failed to parse L_i", "ensure every L_i is valid SEC1 hex")))
        .collect::<Result<Vec<_>, _>>()?;
    let r = ipp_raw
        .r
        .iter()
        .map(|s| parse_point(s).map_err(|_| VerifyError::new(RootCause::InnerProductProofParseFailed, "failed to parse R_i", "ensure every R_i is valid SEC1 hex")))
        .collect::<Result<Vec<_>, _>>()?;
    let ipp_a = parse_scalar(&ipp_raw.a).map_err(|_| VerifyError::new(RootCause::InnerProductProofParseFailed, "failed to parse final a", "ensure a is valid hex"))?;
    let ipp_b = parse_scalar(&ipp_raw.b).map_err(|_| VerifyError::new(RootCause::InnerProductProofParseFailed, "failed to parse final b", "ensure b is valid hex"))?;

    let _ = n; // bit length validated against round count in run_ipp
    Ok(RangeProof { a, s, t1, t2, tau_x, mu, t_hat, ipp: InnerProductProof { l, r, a: ipp_a, b: ipp_b } })
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// A debug-only structural check that validates proof shape without any
/// curve arithmetic. Resolves the spec's open question on `development_mode`
/// (§9): never invoked by [`Verifier::verify`], never the default, and only
/// reachable behind the `dev-structural-checks` feature. Exists purely as an
/// opt-in bring-up aid for prover authors iterating on proof shape before
/// their generators are even correct.
#[cfg(feature = "dev-structural-checks")]
pub fn structural_check_only(proof: &RawRangeProof, n: usize) -> bool {
    warn!("dev-structural-checks is active: this path performs NO cryptographic verification");
    let expected_rounds = {
        let mut n = n;
        let mut rounds = 0;
        while n > 1 {
            n /= 2;
            rounds += 1;
        }
        rounds
    };
    proof.inner_product_proof.l.len() == expected_rounds && proof.inner_product_proof.r.len() == expected_rounds
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A proof whose main equation balances by construction. Its IPP rounds
    /// are arbitrary (not a real folding witness), so tests built on this
    /// fixture check `equation_match` rather than `verified`.
    fn sample_valid_proof(n: usize) -> (Verifier, String, RawRangeProof, i64, i64) {
        let gens = GeneratorSet::derive(n);
        let verifier = Verifier::with_generators(gens.clone());

        let value: u64 = 12345;
        let gamma = FieldScalar::from(777u64);
        let v = gens.g.mul(&FieldScalar::from(value)) + gens.h.mul(&gamma);

        let alpha = FieldScalar::from(11u64);
        let rho = FieldScalar::from(13u64);
        let a_point = gens.g.mul(&alpha);
        let s_point = gens.g.mul(&rho);

        let y = challenge_y(n, &a_point, &s_point);
        let z = challenge_z(n, &a_point, &s_point, &Scalar::from_field(y));

        let t1_blind = FieldScalar::from(21u64);
        let t2_blind = FieldScalar::from(22u64);
        let t1_point = gens.g.mul(&t1_blind);
        let t2_point = gens.g.mul(&t2_blind);

        let x = challenge_x(n, &t1_point, &t2_point, &Scalar::from_field(z));
        let delta_yz = delta(&y, &z, n);

        // tau_x and t_hat are solved so Left == Right for the standard
        // Bulletproofs relation V = value*G + gamma*H.
        let tau_x = gamma * z * z + t1_blind * x + t2_blind * x * x;
        let t_hat = FieldScalar::from(value) * z * z + delta_yz;

        let left = gens.g.mul(&t_hat) + gens.h.mul(&tau_x);
        let right = v.mul(&(z * z)) + gens.g.mul(&delta_yz) + t1_point.mul(&x) + t2_point.mul(&(x * x));
        assert_eq!(left, right, "fixture construction must satisfy the main equation");

        let rounds = (n as f64).log2() as usize;
        let l_points: Vec<Point> = (0..rounds).map(|i| gens.g.mul(&FieldScalar::from(3 + i as u64))).collect();
        let r_points: Vec<Point> = (0..rounds).map(|i| gens.g.mul(&FieldScalar::from(5 + i as u64))).collect();

        let raw = RawRangeProof {
            a: a_point.to_hex(),
            s: s_point.to_hex(),
            t1: t1_point.to_hex(),
            t2: t2_point.to_hex(),
            tau_x: Scalar::from_field(tau_x).to_hex(),
            mu: Scalar::from_field(FieldScalar::from(0u64)).to_hex(),
            t: Scalar::from_field(t_hat).to_hex(),
            inner_product_proof: RawInnerProductProof {
                l: l_points.iter().map(Point::to_hex).collect(),
                r: r_points.iter().map(Point::to_hex).collect(),
                a: Scalar::from_field(FieldScalar::from(1u64)).to_hex(),
                b: Scalar::from_field(FieldScalar::from(0u64)).to_hex(),
            },
        };
        (verifier, v.to_hex(), raw, 0, (1i64 << n) - 1)
    }

    #[test]
    fn main_equation_balances_for_a_correctly_constructed_fixture() {
        let (verifier, commitment, proof, range_min, range_max) = sample_valid_proof(4);
        let opts = VerifyOptions { debug: true, ..Default::default() };
        let result = verifier.verify(&commitment, &proof, range_min, range_max, &opts);
        assert_eq!(result.equation_match, Some(true));
        let debug = result.debug_values.expect("debug requested");
        assert_eq!(debug.left, debug.right);
    }

    #[test]
    fn tampering_with_tau_x_breaks_the_main_equation() {
        let (verifier, commitment, mut proof, range_min, range_max) = sample_valid_proof(4);
        let mut tau_x_bytes = hex::decode(&proof.tau_x).unwrap();
        tau_x_bytes[31] ^= 0x01;
        proof.tau_x = hex::encode(tau_x_bytes);
        let result = verifier.verify(&commitment, &proof, range_min, range_max, &VerifyOptions::default());
        assert!(!result.verified);
        assert_eq!(result.root_cause, Some(RootCause::MainEquationFailed));
    }

    #[test]
    fn range_max_above_bit_length_is_rejected() {
        let (verifier, commitment, proof, range_min, _) = sample_valid_proof(4);
        let result = verifier.verify(&commitment, &proof, range_min, 1 << 10, &VerifyOptions::default());
        assert!(!result.verified);
        assert_eq!(result.root_cause, Some(RootCause::RangeScaleMismatch));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let (verifier, commitment, proof, _, _) = sample_valid_proof(4);
        let result = verifier.verify(&commitment, &proof, 10, 5, &VerifyOptions::default());
        assert!(!result.verified);
        assert_eq!(result.root_cause, Some(RootCause::RangeInvalid));
    }

    #[test]
    fn client_challenges_never_cause_acceptance_or_rejection_on_their_own() {
        let (verifier, commitment, proof, range_min, range_max) = sample_valid_proof(4);
        let opts = VerifyOptions {
            debug: false,
            client_challenges: Some(ClientChallenges { y: Some("00".to_string()), z: Some("00".to_string()), x: Some("00".to_string()) }),
            client_mode: None,
        };
        let result = verifier.verify(&commitment, &proof, range_min, range_max, &opts);
        assert_eq!(result.equation_match, Some(true));
        assert_eq!(result.client_challenges_ignored, Some(true));
    }

    #[test]
    fn malformed_commitment_hex_is_a_structured_rejection() {
        let (verifier, _commitment, proof, range_min, range_max) = sample_valid_proof(4);
        let result = verifier.verify("not-hex", &proof, range_min, range_max, &VerifyOptions::default());
        assert!(!result.verified);
        assert_eq!(result.root_cause, Some(RootCause::CommitmentParseFailed));
    }

    #[test]
    fn proof_size_estimate_and_supported_ranges() {
        let verifier = Verifier::new(32);
        assert_eq!(verifier.get_supported_ranges(), vec![32]);
        assert!(verifier.estimate_proof_size() > 4 * 33);
    }

    fn write_client_debug_file(dir: &std::path::Path, name: &str, contents: &serde_json::Value) -> std::path::PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(contents).unwrap()).unwrap();
        path
    }

    #[test]
    fn client_debug_comparison_matches_server_generators_for_honest_fixture() {
        let (verifier, commitment, proof, _, _) = sample_valid_proof(4);
        let y = challenge_y(4, &Point::from_hex(&proof.a).unwrap(), &Point::from_hex(&proof.s).unwrap());
        let z = challenge_z(4, &Point::from_hex(&proof.a).unwrap(), &Point::from_hex(&proof.s).unwrap(), &Scalar::from_field(y));
        let x = challenge_x(4, &Point::from_hex(&proof.t1).unwrap(), &Point::from_hex(&proof.t2).unwrap(), &Scalar::from_field(z));
        let delta_yz = delta(&y, &z, 4);

        let dir = std::env::temp_dir().join(format!("ics-attest-core-test-debug-{}", std::process::id()));
        let debug_json = serde_json::json!({
            "metadata": {"n": 4, "sensor_id": "DM-PIT01"},
            "scalars": {
                "t": proof.t,
                "tau_x": proof.tau_x,
                "y": Scalar::from_field(y).to_hex(),
                "z": Scalar::from_field(z).to_hex(),
                "x": Scalar::from_field(x).to_hex(),
                "delta": Scalar::from_field(delta_yz).to_hex(),
            },
            "points": {"V": commitment, "T1": proof.t1, "T2": proof.t2},
        });
        let path = write_client_debug_file(&dir, "debug_proof_ok.json", &debug_json);

        let result = verifier.verify_from_client_debug(&path).unwrap();
        assert!(result.server_generators_match);
        assert_eq!(result.delta_match, Some(true));
        assert_eq!(result.client_generators_match, None);
        assert_eq!(result.diagnosis, "success");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn client_debug_comparison_flags_generator_mismatch() {
        let (verifier, commitment, proof, _, _) = sample_valid_proof(4);
        let y = challenge_y(4, &Point::from_hex(&proof.a).unwrap(), &Point::from_hex(&proof.s).unwrap());
        let z = challenge_z(4, &Point::from_hex(&proof.a).unwrap(), &Point::from_hex(&proof.s).unwrap(), &Scalar::from_field(y));
        let x = challenge_x(4, &Point::from_hex(&proof.t1).unwrap(), &Point::from_hex(&proof.t2).unwrap(), &Scalar::from_field(z));

        // Distinct from the verifier's own G/H (canonical generator and a
        // hash-derived H): a different implementation's independently-chosen
        // generator pair, which must disagree on the main equation even
        // though the server's own generators satisfy it.
        let foreign_g = Point::generator().mul(&FieldScalar::from(777u64));
        let foreign_h = Point::generator().mul(&FieldScalar::from(888u64));

        let dir = std::env::temp_dir().join(format!("ics-attest-core-test-debug-mismatch-{}", std::process::id()));
        let debug_json = serde_json::json!({
            "metadata": {"n": 4, "sensor_id": "DM-PIT01"},
            "scalars": {
                "t": proof.t,
                "tau_x": proof.tau_x,
                "y": Scalar::from_field(y).to_hex(),
                "z": Scalar::from_field(z).to_hex(),
                "x": Scalar::from_field(x).to_hex(),
            },
            "points": {"V": commitment, "T1": proof.t1, "T2": proof.t2},
            "generators": {"G": foreign_g.to_hex(), "H": foreign_h.to_hex()},
        });
        let path = write_client_debug_file(&dir, "debug_proof_mismatch.json", &debug_json);

        let result = verifier.verify_from_client_debug(&path).unwrap();
        assert!(result.server_generators_match);
        assert_eq!(result.client_generators_match, Some(false));
        assert_eq!(result.diagnosis, "success");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
