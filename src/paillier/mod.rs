// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Paillier cryptosystem with generator `g = n + 1`.
//!
//! Encryption of `x` with randomness `r` is `(1 + n)^x · r^n mod n²`, which
//! makes ciphertexts additively homomorphic: multiplying two ciphertexts adds
//! their plaintexts, and raising a ciphertext to `k` multiplies its plaintext
//! by `k`.
//!
//! Key material and decryption come from `libpaillier`. Encryption is done
//! here because the protocol needs to pick the nonce and keep it.

#[cfg(test)]
pub(crate) mod prime_gen;

use crate::{
    errors::{InternalError, Result},
    parameters::{PAILLIER_MODULUS_BITS, PRIME_BITS},
    serialization::{b64_to_bn, bn_to_b64},
    utils::{bit_length, random_bn_in_z_star, CRYPTOGRAPHIC_RETRY_MAX},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{error, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PaillierCiphertext(#[serde(with = "crate::serialization::b64_bn")] pub(crate) BigNumber);

/// A Paillier public key, identified by its modulus `n`.
#[derive(Clone, Debug)]
pub struct PaillierEncryptionKey(pub(crate) libpaillier::EncryptionKey);

impl PartialEq for PaillierEncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.n() == other.n()
    }
}

impl Eq for PaillierEncryptionKey {}

impl PaillierEncryptionKey {
    pub(crate) fn from_modulus(n: &BigNumber) -> Result<Self> {
        libpaillier::EncryptionKey::from_bytes(n.to_bytes())
            .map(Self)
            .map_err(InternalError::Serialization)
    }

    /// The modulus `n`.
    pub fn n(&self) -> &BigNumber {
        self.0.n()
    }

    pub(crate) fn nn(&self) -> &BigNumber {
        self.0.nn()
    }

    /// Number of significant bits of the modulus.
    pub fn bit_length(&self) -> usize {
        bit_length(self.n())
    }

    /// Encrypt `x` with fresh randomness, returning the ciphertext and the
    /// randomness used.
    pub(crate) fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        x: &BigNumber,
    ) -> Result<(PaillierCiphertext, BigNumber)> {
        let nonce = random_bn_in_z_star(rng, self.n())?;
        let c = self.encrypt_with_nonce(x, &nonce)?;
        Ok((c, nonce))
    }

    /// Encrypt `x ∈ [0, n)` with explicit randomness `nonce`.
    pub(crate) fn encrypt_with_nonce(
        &self,
        x: &BigNumber,
        nonce: &BigNumber,
    ) -> Result<PaillierCiphertext> {
        let (n, nn) = (self.n(), self.nn());
        if x < &BigNumber::zero() || x >= n {
            error!("Paillier plaintext is outside of [0, n)");
            return arg_err!("plaintext out of range");
        }
        let base = n + &BigNumber::one();
        let a = base.modpow(x, nn);
        let b = nonce.modpow(n, nn);
        Ok(PaillierCiphertext(a.modmul(&b, nn)))
    }

    /// Homomorphic addition: the result decrypts to the sum of the plaintexts.
    pub(crate) fn add(&self, c1: &PaillierCiphertext, c2: &PaillierCiphertext) -> PaillierCiphertext {
        PaillierCiphertext(c1.0.modmul(&c2.0, self.nn()))
    }

    /// Homomorphic scalar multiplication: the result decrypts to `k` times
    /// the plaintext.
    pub(crate) fn multiply(&self, c: &PaillierCiphertext, k: &BigNumber) -> PaillierCiphertext {
        PaillierCiphertext(c.0.modpow(k, self.nn()))
    }
}

impl Serialize for PaillierEncryptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&bn_to_b64(self.n()))
    }
}

impl<'de> Deserialize<'de> for PaillierEncryptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let n = b64_to_bn(&s).map_err(serde::de::Error::custom)?;
        Self::from_modulus(&n).map_err(serde::de::Error::custom)
    }
}

/// A Paillier private key.
///
/// The two prime factors are kept next to the `libpaillier` key: they are
/// the serialized form of the key and the proof of a well-formed modulus
/// needs them.
#[derive(Clone)]
pub struct PaillierDecryptionKey {
    key: libpaillier::DecryptionKey,
    pk: PaillierEncryptionKey,
    p: BigNumber,
    q: BigNumber,
}

impl PartialEq for PaillierDecryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.p == other.p && self.q == other.q
    }
}

impl Eq for PaillierDecryptionKey {}

impl std::fmt::Debug for PaillierDecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaillierDecryptionKey")
            .field("pk", &self.pk)
            .field("p", &"[redacted]")
            .field("q", &"[redacted]")
            .finish()
    }
}

impl PaillierDecryptionKey {
    /// Generate a fresh keypair whose modulus is exactly 2048 bits.
    ///
    /// This is by far the most expensive step of the protocol. Hosts that
    /// want to run it off-thread can do so and pass the result to
    /// [`P1KeyGen::init_with_keypairs`](crate::P1KeyGen::init_with_keypairs).
    #[cfg_attr(feature = "flame_it", flame("paillier"))]
    pub fn generate() -> Result<Self> {
        for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
            let p = BigNumber::prime(PRIME_BITS);
            let q = BigNumber::prime(PRIME_BITS);
            if p == q || bit_length(&(&p * &q)) != PAILLIER_MODULUS_BITS {
                continue;
            }
            if let Some(key) = libpaillier::DecryptionKey::with_primes_unchecked(&p, &q) {
                info!("Generated a {PAILLIER_MODULUS_BITS}-bit Paillier modulus");
                return Ok(Self::from_parts(key, p, q));
            }
        }
        error!("Failed to generate a Paillier modulus of the right size");
        Err(InternalError::RetryFailed)
    }

    /// Build a keypair from two distinct primes.
    ///
    /// Both factors are tested for primality.
    pub fn from_primes(p: &BigNumber, q: &BigNumber) -> Result<Self> {
        match libpaillier::DecryptionKey::with_primes(p, q) {
            Some(key) => Ok(Self::from_parts(key, p.clone(), q.clone())),
            None => arg_err!("Paillier factors must be two distinct primes"),
        }
    }

    fn from_parts(key: libpaillier::DecryptionKey, p: BigNumber, q: BigNumber) -> Self {
        let pk = PaillierEncryptionKey(libpaillier::EncryptionKey::from(&key));
        Self { key, pk, p, q }
    }

    /// The public half of the keypair.
    pub fn encryption_key(&self) -> &PaillierEncryptionKey {
        &self.pk
    }

    pub(crate) fn p(&self) -> &BigNumber {
        &self.p
    }

    pub(crate) fn q(&self) -> &BigNumber {
        &self.q
    }

    /// Euler's totient `(p - 1)(q - 1)` of the modulus.
    pub(crate) fn phi(&self) -> &BigNumber {
        self.key.totient()
    }

    /// Decrypt to the plaintext in `[0, n)`.
    pub(crate) fn decrypt(&self, c: &PaillierCiphertext) -> Result<BigNumber> {
        if c.0.gcd(self.pk.n()) != BigNumber::one() {
            error!("Ciphertext is not a unit modulo n");
            return Err(InternalError::PaillierDecryptionFailed);
        }
        self.key
            .decrypt(&c.0)
            .map(BigNumber::from_slice)
            .ok_or(InternalError::PaillierDecryptionFailed)
    }
}

#[derive(Serialize, Deserialize)]
struct PaillierPrimes {
    #[serde(with = "crate::serialization::b64_bn")]
    p: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    q: BigNumber,
}

impl Serialize for PaillierDecryptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        PaillierPrimes {
            p: self.p.clone(),
            q: self.q.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaillierDecryptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let primes = PaillierPrimes::deserialize(deserializer)?;
        Self::from_primes(&primes.p, &primes.q).map_err(serde::de::Error::custom)
    }
}
