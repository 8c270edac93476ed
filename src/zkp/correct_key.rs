// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Non-interactive proof that a Paillier modulus `N` was generated
//! correctly.
//!
//! The verifier derives [`CORRECT_KEY_REPETITIONS`] pseudorandom values
//! `ρ_i ∈ [0, N)` from the modulus and the proof context. The prover, who
//! knows the factorization, answers with the `N`-th roots `σ_i` of every
//! `ρ_i`. Such roots exist for all `ρ_i` only if `gcd(N, φ(N)) = 1`. The
//! verifier additionally checks that `N` has no prime factor below
//! [`SMALL_PRIME_BOUND`].

use super::Proof;
use crate::{
    errors::*,
    paillier::{PaillierDecryptionKey, PaillierEncryptionKey},
    parameters::{CORRECT_KEY_REPETITIONS, CORRECT_KEY_SALT, MGF_DIGEST_BITS, SMALL_PRIME_BOUND},
    protocol::ProofContext,
    serialization::i2osp,
    utils::{bit_length, mod_inverse, mod_positive, sha256},
};
use lazy_static::lazy_static;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

lazy_static! {
    /// Product of all primes below [`SMALL_PRIME_BOUND`].
    static ref SMALL_PRIME_PRODUCT: BigNumber = {
        let mut sieve = vec![true; SMALL_PRIME_BOUND];
        let mut product = BigNumber::one();
        for i in 2..SMALL_PRIME_BOUND {
            if sieve[i] {
                product = product * BigNumber::from(i as u64);
                let mut multiple = i * i;
                while multiple < SMALL_PRIME_BOUND {
                    sieve[multiple] = false;
                    multiple += i;
                }
            }
        }
        product
    };
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NiCorrectKeyProof {
    #[serde(with = "crate::serialization::b64_bn_vec")]
    sigma_vec: Vec<BigNumber>,
}

/// Expand `seed` to `out_bits / 256 + 1` SHA-256 blocks, read as an integer.
fn mask_generation(out_bits: usize, seed: &[u8]) -> Result<BigNumber> {
    let blocks = out_bits / MGF_DIGEST_BITS + 1;
    let mut bytes = Vec::with_capacity(blocks * 32);
    for j in 0..blocks {
        bytes.extend_from_slice(&sha256(&[seed, &i2osp(j, 4)?]));
    }
    Ok(BigNumber::from_slice(bytes))
}

/// The challenge values `ρ_i`, determined by `N` and the context alone.
fn rho_values(n: &BigNumber, context: &ProofContext) -> Result<Vec<BigNumber>> {
    let key_length = bit_length(n);
    let n_bytes = n.to_bytes();
    (0..CORRECT_KEY_REPETITIONS)
        .map(|i| {
            let seed = sha256(&[
                &n_bytes,
                CORRECT_KEY_SALT,
                &i2osp(i, 4)?,
                context.sid_bytes(),
                context.pid_bytes(),
            ]);
            Ok(mod_positive(&mask_generation(key_length, &seed)?, n))
        })
        .collect()
}

fn extended_euclidean(a: &BigNumber, b: &BigNumber) -> Result<(BigNumber, BigNumber)> {
    let result = a.extended_gcd(b);

    if result.gcd != BigNumber::one() {
        return Err(InternalError::CouldNotInvertBigNumber);
    }

    Ok((result.x, result.y))
}

/// Finds an x such that x = a1 (mod p) and x = a2 (mod q)
#[allow(clippy::many_single_char_names)]
fn chinese_remainder_theorem(
    a1: &BigNumber,
    a2: &BigNumber,
    p: &BigNumber,
    q: &BigNumber,
) -> Result<BigNumber> {
    let (z, w) = extended_euclidean(p, q)?;
    let x = a1 * w * q + a2 * z * p;
    Ok(mod_positive(&x, &(p * q)))
}

impl Proof for NiCorrectKeyProof {
    type CommonInput = PaillierEncryptionKey;
    type ProverSecret = PaillierDecryptionKey;

    #[cfg_attr(feature = "flame_it", flame("NiCorrectKeyProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        context: &ProofContext,
        _rng: &mut R,
    ) -> Result<Self> {
        if secret.encryption_key() != input {
            error!("Secret key does not match the public key being proven");
            return Err(InternalError::InternalInvariantFailed);
        }
        let (p, q) = (secret.p(), secret.q());
        let n = input.n();

        // The N-th root is raising to N^{-1} mod phi(N), done separately mod p and mod q
        let d = mod_inverse(n, secret.phi())?;
        let dp = mod_positive(&d, &(p - &BigNumber::one()));
        let dq = mod_positive(&d, &(q - &BigNumber::one()));

        let sigma_vec = rho_values(n, context)?
            .iter()
            .map(|rho| {
                let root_p = mod_positive(rho, p).modpow(&dp, p);
                let root_q = mod_positive(rho, q).modpow(&dq, q);
                chinese_remainder_theorem(&root_p, &root_q, p, q)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sigma_vec })
    }

    #[cfg_attr(feature = "flame_it", flame("NiCorrectKeyProof"))]
    fn verify(&self, input: &Self::CommonInput, context: &ProofContext) -> Result<()> {
        let n = input.n();
        if self.sigma_vec.len() != CORRECT_KEY_REPETITIONS {
            return verify_err!("wrong number of roots in key correctness proof");
        }
        if n.gcd(&SMALL_PRIME_PRODUCT) != BigNumber::one() {
            return verify_err!("Paillier modulus has a small prime factor");
        }

        let rho_vec = rho_values(n, context)?;
        for (sigma, rho) in self.sigma_vec.iter().zip(rho_vec.iter()) {
            if sigma <= &BigNumber::zero() || sigma >= n {
                return verify_err!("root is out of range");
            }
            if &sigma.modpow(n, n) != rho {
                return verify_err!("root does not match its challenge");
            }
        }

        Ok(())
    }
}
