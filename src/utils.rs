// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    errors::{InternalError, Result},
    parameters::SCALAR_BYTES,
    serialization::{b64_to_bytes, bytes_to_b64},
};
use k256::{
    elliptic_curve::{
        bigint::Encoding,
        point::AffineCoordinates,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Curve, PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar,
};
use lazy_static::lazy_static;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::error;
use zeroize::Zeroizing;

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

lazy_static! {
    static ref K256_ORDER: BigNumber = {
        let order_bytes: [u8; 32] = k256::Secp256k1::ORDER.to_be_bytes();
        BigNumber::from_slice(order_bytes)
    };
}

/// Wrapper around k256::ProjectivePoint so that we can define our own
/// serialization/deserialization for it.
///
/// On the wire a point is the base64 encoding of its 64-byte `x || y`
/// affine coordinates (the uncompressed SEC1 encoding without its tag byte).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CurvePoint(pub(crate) ProjectivePoint);

impl CurvePoint {
    /// The secp256k1 base point.
    pub const GENERATOR: Self = CurvePoint(ProjectivePoint::GENERATOR);
    pub(crate) const IDENTITY: Self = CurvePoint(ProjectivePoint::IDENTITY);

    /// Multiply `self` by a [`BigNumber`], which is first reduced mod the
    /// curve order.
    pub(crate) fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self> {
        let s = bn_to_scalar(scalar)?;
        Ok(self.multiply_by_scalar(&s))
    }

    pub(crate) fn multiply_by_scalar(&self, scalar: &Scalar) -> Self {
        Self(self.0 * scalar)
    }

    pub(crate) fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// The big-endian x coordinate of the affine point.
    pub(crate) fn x_bytes(&self) -> FieldBytes {
        self.0.to_affine().x()
    }

    pub(crate) fn x_bn(&self) -> BigNumber {
        BigNumber::from_slice(self.x_bytes())
    }

    pub(crate) fn y_is_odd(&self) -> bool {
        self.0.to_affine().y_is_odd().into()
    }

    /// Serialize the point as its 64-byte `x || y` affine coordinates.
    pub fn to_bytes(&self) -> Vec<u8> {
        let encoded = self.0.to_affine().to_encoded_point(false);
        // Drop the SEC1 tag byte; the identity encodes to the tag alone.
        encoded.as_bytes().get(1..).unwrap_or_default().to_vec()
    }

    /// Parse a point from its 64-byte `x || y` affine coordinates.
    ///
    /// Fails if the coordinates are not on the curve.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 * SCALAR_BYTES {
            error!(
                "Curve point must be {} bytes, got {}",
                2 * SCALAR_BYTES,
                bytes.len()
            );
            return Err(decode_err!("curve point has wrong length"));
        }
        let mut tagged = Vec::with_capacity(bytes.len() + 1);
        tagged.push(0x04);
        tagged.extend_from_slice(bytes);

        let encoded = EncodedPoint::from_bytes(&tagged)
            .map_err(|_| decode_err!("malformed curve point encoding"))?;
        let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Failed to decode bytes as a curve point");
                Err(decode_err!("bytes do not describe a curve point"))
            }
        }
    }

    /// Hex encoding of [`CurvePoint::to_bytes`].
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Inverse of [`CurvePoint::to_hex`].
    pub fn try_from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| decode_err!(e.to_string()))?;
        Self::try_from_bytes(&bytes)
    }
}

impl std::ops::Add for CurvePoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for CurvePoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<ProjectivePoint> for CurvePoint {
    fn from(p: ProjectivePoint) -> Self {
        Self(p)
    }
}

impl Serialize for CurvePoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&bytes_to_b64(&self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = b64_to_bytes(&s).map_err(serde::de::Error::custom)?;
        CurvePoint::try_from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// The order `q` of the secp256k1 group.
pub(crate) fn k256_order() -> BigNumber {
    K256_ORDER.clone()
}

/// Returns `x mod q` as a [`Scalar`], for any (possibly negative) `x`.
pub(crate) fn bn_to_scalar(x: &BigNumber) -> Result<Scalar> {
    let x_modded = x.nmod(&K256_ORDER);

    let bytes = Zeroizing::new(x_modded.to_bytes());
    if bytes.len() > SCALAR_BYTES {
        error!("Reduced BigNumber does not fit in a scalar");
        return Err(InternalError::CouldNotConvertToScalar);
    }
    let mut slice = Zeroizing::new(vec![0u8; SCALAR_BYTES - bytes.len()]);
    slice.extend_from_slice(&bytes);

    Option::from(Scalar::from_repr(*FieldBytes::from_slice(&slice))).ok_or_else(|| {
        error!("Failed to convert BigNumber into k256::Scalar");
        InternalError::CouldNotConvertToScalar
    })
}

pub(crate) fn scalar_to_bn(x: &Scalar) -> BigNumber {
    BigNumber::from_slice(x.to_repr())
}

pub(crate) fn invert_scalar(x: &Scalar) -> Result<Scalar> {
    Option::from(x.invert()).ok_or(InternalError::CouldNotInvertScalar)
}

/// Always returns the non-negative representative of `a mod m`.
pub(crate) fn mod_positive(a: &BigNumber, m: &BigNumber) -> BigNumber {
    a.nmod(m)
}

pub(crate) fn mod_inverse(a: &BigNumber, m: &BigNumber) -> Result<BigNumber> {
    a.invert(m).ok_or_else(|| {
        error!("Element has no inverse modulo the given modulus");
        InternalError::CouldNotInvertBigNumber
    })
}

/// Compute a^e (mod n), where a negative exponent raises the inverse of `a`.
#[cfg_attr(feature = "flame_it", flame("utils"))]
pub(crate) fn modpow(a: &BigNumber, e: &BigNumber, n: &BigNumber) -> Result<BigNumber> {
    if e < &BigNumber::zero() {
        let inverse = mod_inverse(a, n)?;
        let positive = -e.clone();
        Ok(inverse.modpow(&positive, n))
    } else {
        Ok(a.modpow(e, n))
    }
}

/// Number of significant bits of a non-negative integer.
pub(crate) fn bit_length(n: &BigNumber) -> usize {
    let bytes = n.to_bytes();
    match bytes.iter().position(|b| *b != 0) {
        Some(first) => (bytes.len() - first - 1) * 8 + (8 - bytes[first].leading_zeros() as usize),
        None => 0,
    }
}

/// SHA-256 over the concatenation of `parts`, read as a big-endian integer.
pub(crate) fn hash_to_bn(parts: &[&[u8]]) -> BigNumber {
    BigNumber::from_slice(sha256(parts))
}

pub(crate) fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Sample a number uniformly at random from the range [0, n).
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a uniformly random non-zero scalar, returned as a [`BigNumber`] in
/// `[1, q)`.
pub(crate) fn random_nonzero_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<BigNumber> {
    std::iter::repeat_with(|| BigNumber::from_rng(&K256_ORDER, rng))
        .take(CRYPTOGRAPHIC_RETRY_MAX)
        .find(|x| x != &BigNumber::zero())
        .ok_or(InternalError::RetryFailed)
}

/// Generate a random `BigNumber` that is in the multiplicative group of
/// integers modulo `n`.
pub(crate) fn random_bn_in_z_star<R: RngCore + CryptoRng>(
    rng: &mut R,
    n: &BigNumber,
) -> Result<BigNumber> {
    std::iter::repeat_with(|| BigNumber::from_rng(n, rng))
        .take(CRYPTOGRAPHIC_RETRY_MAX)
        .find(|result| result != &BigNumber::zero() && result.gcd(n) == BigNumber::one())
        .ok_or(InternalError::RetryFailed)
}

/// Sample `len` uniformly random bytes and read them as an integer.
pub(crate) fn random_bn_from_bytes<R: RngCore + CryptoRng>(rng: &mut R, len: usize) -> BigNumber {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    rng.fill_bytes(bytes.as_mut_slice());
    BigNumber::from_slice(bytes.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn test_random_bn_in_range() {
        let mut rng = init_testing();
        // Statistical tests -- should generate random numbers that are long enough
        let mut max_len = 0;
        let num_bytes = 100;
        let bound = BigNumber::one() << (num_bytes * 8);

        for _ in 0..1000 {
            let bn = random_positive_bn(&mut rng, &bound);
            assert!(bn < bound);
            let len = bn.to_bytes().len();
            if max_len < len {
                max_len = len;
            }
        }

        assert!(max_len > num_bytes - 2);
    }

    #[test]
    fn mod_positive_is_never_negative() {
        let m = BigNumber::from(7u64);
        assert_eq!(mod_positive(&-BigNumber::from(3u64), &m), BigNumber::from(4u64));
        assert_eq!(mod_positive(&BigNumber::from(10u64), &m), BigNumber::from(3u64));
        assert_eq!(mod_positive(&-BigNumber::from(14u64), &m), BigNumber::zero());
    }

    #[test]
    fn modpow_with_negative_exponent_uses_inverse() -> Result<()> {
        let n = BigNumber::from(101u64);
        let a = BigNumber::from(5u64);
        let e = BigNumber::from(13u64);
        let forward = modpow(&a, &e, &n)?;
        let backward = modpow(&a, &-e.clone(), &n)?;
        assert_eq!(forward.modmul(&backward, &n), BigNumber::one());

        // 0 has no inverse
        assert!(modpow(&BigNumber::zero(), &-e, &n).is_err());
        Ok(())
    }

    #[test]
    fn scalar_conversions_reduce_mod_order() -> Result<()> {
        let mut rng = init_testing();
        let q = k256_order();
        let x = random_positive_bn(&mut rng, &q);
        assert_eq!(scalar_to_bn(&bn_to_scalar(&x)?), x);
        assert_eq!(scalar_to_bn(&bn_to_scalar(&(&x + &q))?), x);
        assert_eq!(bn_to_scalar(&-x.clone())?, -bn_to_scalar(&x)?);
        Ok(())
    }

    #[test]
    fn bit_length_counts_significant_bits() {
        assert_eq!(bit_length(&BigNumber::zero()), 0);
        assert_eq!(bit_length(&BigNumber::one()), 1);
        assert_eq!(bit_length(&BigNumber::from(255u64)), 8);
        assert_eq!(bit_length(&(BigNumber::one() << 2047)), 2048);
    }

    #[test]
    fn curve_point_encodings_round_trip() -> Result<()> {
        let mut rng = init_testing();
        let x = random_nonzero_scalar(&mut rng)?;
        let point = CurvePoint::GENERATOR.multiply_by_bignum(&x)?;

        let bytes = point.to_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!(CurvePoint::try_from_bytes(&bytes)?, point);
        assert_eq!(CurvePoint::try_from_hex(&point.to_hex())?, point);

        let json = serde_json::to_string(&point)?;
        assert_eq!(serde_json::from_str::<CurvePoint>(&json)?, point);
        Ok(())
    }

    #[test]
    fn malformed_curve_points_are_rejected() {
        // Wrong length
        assert!(CurvePoint::try_from_bytes(&[1u8; 63]).is_err());
        // Not on the curve
        let mut bytes = CurvePoint::GENERATOR.to_bytes();
        bytes[63] ^= 1;
        assert!(CurvePoint::try_from_bytes(&bytes).is_err());
        // Not hex
        assert!(CurvePoint::try_from_hex("zz").is_err());
    }
}

////////////////////////////
// Test Utility Functions //
////////////////////////////

/// Returns an rng to be used for testing. This will print the rng seed
/// to stderr so that if a test fails, the failing seed can be recovered
/// and used for debugging.
#[cfg(test)]
pub(crate) mod testing {
    use rand::{
        rngs::{OsRng, StdRng},
        Rng, SeedableRng,
    };
    use tracing_subscriber::EnvFilter;

    /// Initialize any fields necessary for our tests. This should be called at
    /// the top of all our tests.
    pub(crate) fn init_testing() -> StdRng {
        let mut seeder = OsRng;
        let seed = seeder.gen();
        eprintln!(
            "To re-run test with the same randomness, use init_testing_with_seed() with the following seed:"
        );
        eprintln!("\t{seed:?}");
        StdRng::from_seed(seed)
    }

    /// A seeded version of [`init_testing`] which also turns on logging,
    /// filtered by `RUST_LOG`.
    #[allow(unused)]
    pub(crate) fn init_testing_with_seed(seed: [u8; 32]) -> StdRng {
        // It's okay if this fails. It just means logging has already been set up.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        StdRng::from_seed(seed)
    }
}
