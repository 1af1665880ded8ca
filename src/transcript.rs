//! Fiat-Shamir transcript and the Bulletproofs delta(y,z) polynomial
//!
//! Unlike the BLAKE3-based, multi-label transcript this crate's ancestor used
//! for its own (unrelated) polynomial commitment scheme, the wire format here
//! is fixed by an existing Bulletproofs deployment (§4.2): a fresh SHA-256 is
//! seeded with a domain tag and the bit-length every time a challenge is
//! derived, rather than one running hasher threaded through the whole proof.
//! The `label` argument is carried for parity with that shape and for
//! diagnostic logging only — it is never absorbed into the hash.

use k256::Scalar as FieldScalar;
use tracing::debug;

use crate::ec::{Point, Scalar};
use crate::TRANSCRIPT_DOMAIN_TAG;

/// An item that can be absorbed into a Fiat-Shamir challenge.
pub enum Absorb<'a> {
    /// A curve point, absorbed as its 33-byte compressed encoding.
    Point(&'a Point),
    /// A scalar, absorbed as its 32-byte big-endian encoding.
    Scalar(&'a Scalar),
}

impl<'a> From<&'a Point> for Absorb<'a> {
    fn from(p: &'a Point) -> Self {
        Absorb::Point(p)
    }
}
impl<'a> From<&'a Scalar> for Absorb<'a> {
    fn from(s: &'a Scalar) -> Self {
        Absorb::Scalar(s)
    }
}

/// Derive a Fiat-Shamir challenge from the domain-separated transcript.
///
/// Bit-for-bit per §4.2: `SHA256(domain_tag || n_be32 || item_0 || item_1 || ...)`,
/// interpreted big-endian and reduced mod the curve order. `label` is used
/// only for diagnostic logging; changing it has no effect on the result.
pub fn challenge<'a>(n: usize, label: &str, items: impl IntoIterator<Item = Absorb<'a>>) -> FieldScalar {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(TRANSCRIPT_DOMAIN_TAG);
    hasher.update((n as u32).to_be_bytes());
    for item in items {
        match item {
            Absorb::Point(p) => hasher.update(p.to_compressed()),
            Absorb::Scalar(s) => hasher.update(s.to_bytes()),
        }
    }
    let digest: [u8; 32] = hasher.finalize().into();
    let result = Scalar::from_digest_reduced(digest).field();
    if !label.is_empty() {
        debug!(label, digest = %hex::encode(digest), "fiat-shamir challenge derived");
    }
    result
}

/// Derive the `y` challenge: `y = challenge("y", A, S)`.
pub fn challenge_y(n: usize, a: &Point, s: &Point) -> FieldScalar {
    challenge(n, "y", [Absorb::Point(a), Absorb::Point(s)])
}

/// Derive the `z` challenge: `z = challenge("z", A, S, y)`.
pub fn challenge_z(n: usize, a: &Point, s: &Point, y: &Scalar) -> FieldScalar {
    challenge(n, "z", [Absorb::Point(a), Absorb::Point(s), Absorb::Scalar(y)])
}

/// Derive the `x` challenge: `x = challenge("x", T1, T2, z)`.
pub fn challenge_x(n: usize, t1: &Point, t2: &Point, z: &Scalar) -> FieldScalar {
    challenge(n, "x", [Absorb::Point(t1), Absorb::Point(t2), Absorb::Scalar(z)])
}

/// Derive a per-round inner-product-argument challenge `x_i = FS(L_i, R_i)`.
///
/// Unlike `y`/`z`/`x`, this is re-seeded fresh each round with no domain tag
/// re-application beyond the one baked into [`challenge`] (§4.2: "no domain
/// tag re-application inside the IPP" refers to not layering a second tag on
/// top, not to omitting the shared one).
pub fn challenge_ipp_round(n: usize, l_i: &Point, r_i: &Point) -> FieldScalar {
    challenge(n, "", [Absorb::Point(l_i), Absorb::Point(r_i)])
}

/// Compute `delta(y,z) = (z - z^2) * sum_{i=0}^{n-1} y^i - z^3 * sum_{i=0}^{n-1} 2^i`, mod q (§4.2).
pub fn delta(y: &FieldScalar, z: &FieldScalar, n: usize) -> FieldScalar {
    let mut sum_y_powers = FieldScalar::ZERO;
    let mut y_power = FieldScalar::ONE;
    let mut sum_two_powers = FieldScalar::ZERO;
    let mut two_power = FieldScalar::ONE;
    let two = FieldScalar::from(2u64);

    for _ in 0..n {
        sum_y_powers += y_power;
        sum_two_powers += two_power;
        y_power *= y;
        two_power *= two;
    }

    let z_sq = z * z;
    let z_cubed = z_sq * z;
    (*z - z_sq) * sum_y_powers - z_cubed * sum_two_powers
}

/// Sum of `y^i` for `i in 0..n`, exposed for `debug_values` population (§4.3).
pub fn sum_y_powers(y: &FieldScalar, n: usize) -> FieldScalar {
    let mut sum = FieldScalar::ZERO;
    let mut power = FieldScalar::ONE;
    for _ in 0..n {
        sum += power;
        power *= y;
    }
    sum
}

/// Sum of `2^i` for `i in 0..n`, exposed for `debug_values` population (§4.3).
pub fn sum_two_powers(n: usize) -> FieldScalar {
    let mut sum = FieldScalar::ZERO;
    let mut power = FieldScalar::ONE;
    let two = FieldScalar::from(2u64);
    for _ in 0..n {
        sum += power;
        power *= two;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::GeneratorSet;

    #[test]
    fn challenge_is_deterministic_for_fixed_inputs() {
        let gens = GeneratorSet::derive(4);
        let y1 = challenge_y(4, &gens.g, &gens.h);
        let y2 = challenge_y(4, &gens.g, &gens.h);
        assert_eq!(y1, y2);
    }

    #[test]
    fn challenge_label_does_not_affect_result() {
        let gens = GeneratorSet::derive(4);
        let a = challenge(4, "y", [Absorb::Point(&gens.g), Absorb::Point(&gens.h)]);
        let b = challenge(4, "totally different label", [Absorb::Point(&gens.g), Absorb::Point(&gens.h)]);
        assert_eq!(a, b);
    }

    #[test]
    fn challenge_depends_on_bit_length_and_on_item_order() {
        let gens = GeneratorSet::derive(4);
        let a = challenge(4, "", [Absorb::Point(&gens.g), Absorb::Point(&gens.h)]);
        let b = challenge(8, "", [Absorb::Point(&gens.g), Absorb::Point(&gens.h)]);
        assert_ne!(a, b);

        let c = challenge(4, "", [Absorb::Point(&gens.h), Absorb::Point(&gens.g)]);
        assert_ne!(a, c);
    }

    #[test]
    fn delta_matches_hand_computed_small_case() {
        // n = 1: sum_y_powers = 1, sum_two_powers = 1
        // delta = (z - z^2)*1 - z^3*1
        let y = FieldScalar::from(7u64);
        let z = FieldScalar::from(3u64);
        let got = delta(&y, &z, 1);
        let z_sq = z * z;
        let expected = (z - z_sq) - z_sq * z;
        assert_eq!(got, expected);
    }

    #[test]
    fn sum_powers_helpers_agree_with_delta_internals() {
        let y = FieldScalar::from(11u64);
        let n = 6;
        let sy = sum_y_powers(&y, n);
        let s2 = sum_two_powers(n);
        let z = FieldScalar::from(5u64);
        let z_sq = z * z;
        let expected = (z - z_sq) * sy - z_sq * z * s2;
        assert_eq!(delta(&y, &z, n), expected);
    }
}
