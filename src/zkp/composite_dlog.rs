// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Proof of knowledge of a discrete logarithm in `Z*_N` for an RSA modulus
//! `N` of unknown order: the prover knows `x` with `ni = g^{-x} mod N`.
//!
//! The response is computed over the integers, since the verifier cannot
//! reduce modulo the (unknown) group order.

use super::Proof;
use crate::{
    errors::*,
    parameters::{COMPOSITE_DLOG_K, COMPOSITE_DLOG_K_PRIME, COMPOSITE_DLOG_S},
    protocol::ProofContext,
    utils::{hash_to_bn, modpow, random_positive_bn},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CompositeDLogProof {
    #[serde(with = "crate::serialization::b64_bn")]
    x: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    y: BigNumber,
}

/// The statement `ni = g^{-secret} mod N`.
#[derive(Clone, Debug)]
pub(crate) struct CompositeDLogStatement {
    pub(crate) N: BigNumber,
    pub(crate) g: BigNumber,
    pub(crate) ni: BigNumber,
}

pub(crate) struct CompositeDLogSecret(pub(crate) BigNumber);

impl CompositeDLogProof {
    fn challenge(x: &BigNumber, input: &CompositeDLogStatement, context: &ProofContext) -> BigNumber {
        hash_to_bn(&[
            &x.to_bytes(),
            &input.g.to_bytes(),
            &input.N.to_bytes(),
            &input.ni.to_bytes(),
            context.sid_bytes(),
            context.pid_bytes(),
        ])
    }
}

impl Proof for CompositeDLogProof {
    type CommonInput = CompositeDLogStatement;
    type ProverSecret = CompositeDLogSecret;

    #[cfg_attr(feature = "flame_it", flame("CompositeDLogProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        context: &ProofContext,
        rng: &mut R,
    ) -> Result<Self> {
        let r_bound = BigNumber::one() << (COMPOSITE_DLOG_K + COMPOSITE_DLOG_K_PRIME + COMPOSITE_DLOG_S);
        let r = random_positive_bn(rng, &r_bound);
        let x = input.g.modpow(&r, &input.N);

        let e = Self::challenge(&x, input, context);
        let y = r + e * &secret.0;

        Ok(Self { x, y })
    }

    #[cfg_attr(feature = "flame_it", flame("CompositeDLogProof"))]
    fn verify(&self, input: &Self::CommonInput, context: &ProofContext) -> Result<()> {
        let N = &input.N;
        if N <= &(BigNumber::one() << COMPOSITE_DLOG_K) {
            return verify_err!("composite modulus is too small");
        }
        if input.g.gcd(N) != BigNumber::one() || input.ni.gcd(N) != BigNumber::one() {
            return verify_err!("bases are not units modulo N");
        }
        if self.y < BigNumber::zero() {
            return verify_err!("negative response");
        }

        let e = Self::challenge(&self.x, input, context);

        let eq_check_1 = {
            let lhs = input.g.modpow(&self.y, N).modmul(&modpow(&input.ni, &e, N)?, N);
            lhs == self.x
        };
        if !eq_check_1 {
            return verify_err!("eq_check_1 failed");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        paillier::prime_gen,
        parameters::AUX_SECRET_BITS,
        protocol::{ParticipantIdentifier, SessionId},
        utils::{mod_inverse, testing::init_testing},
    };

    fn statement_and_secret<R: RngCore + CryptoRng>(
        rng: &mut R,
    ) -> Result<(CompositeDLogStatement, CompositeDLogSecret)> {
        let (p, q) = prime_gen::get_prime_pair_from_pool_insecure(rng);
        let N = &p * &q;
        let phi = (&p - &BigNumber::one()) * (&q - &BigNumber::one());
        let g = loop {
            let g = random_positive_bn(rng, &phi);
            if g.gcd(&N) == BigNumber::one() {
                break g;
            }
        };
        let secret = random_positive_bn(rng, &(BigNumber::one() << AUX_SECRET_BITS));
        let ni = mod_inverse(&g, &N)?.modpow(&secret, &N);
        Ok((CompositeDLogStatement { N, g, ni }, CompositeDLogSecret(secret)))
    }

    #[test]
    fn test_composite_dlog_proof() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("composite-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let (statement, secret) = statement_and_secret(&mut rng)?;

        let proof = CompositeDLogProof::prove(&statement, &secret, &context, &mut rng)?;
        assert!(proof.verify(&statement, &context).is_ok());

        let other = ProofContext::new(&sid, ParticipantIdentifier::PartyTwo);
        assert!(proof.verify(&statement, &other).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_fails() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("composite-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let (statement, secret) = statement_and_secret(&mut rng)?;

        let wrong = CompositeDLogSecret(&secret.0 + &BigNumber::one());
        let proof = CompositeDLogProof::prove(&statement, &wrong, &context, &mut rng)?;
        assert!(proof.verify(&statement, &context).is_err());
        Ok(())
    }

    #[test]
    fn degenerate_statements_are_rejected() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("composite-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let (statement, secret) = statement_and_secret(&mut rng)?;
        let proof = CompositeDLogProof::prove(&statement, &secret, &context, &mut rng)?;

        let small_modulus = CompositeDLogStatement {
            N: BigNumber::from(3233u64),
            g: BigNumber::from(2u64),
            ni: BigNumber::from(3u64),
        };
        assert!(proof.verify(&small_modulus, &context).is_err());

        let mut non_unit = statement.clone();
        non_unit.ni = BigNumber::zero();
        assert!(proof.verify(&non_unit, &context).is_err());
        Ok(())
    }

    #[test]
    fn bases_sharing_a_factor_with_the_modulus_are_rejected() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("composite-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let (statement, secret) = statement_and_secret(&mut rng)?;
        let proof = CompositeDLogProof::prove(&statement, &secret, &context, &mut rng)?;
        let not_a_unit = Err(InternalError::FailedToVerifyProof(String::from(
            "bases are not units modulo N",
        )));

        // 2N shares every factor with N; so does any prime factor of N
        let (p, q) = prime_gen::get_prime_pair_from_pool_insecure(&mut rng);
        let factored = CompositeDLogStatement {
            N: &p * &q,
            g: p.clone(),
            ni: statement.ni.clone(),
        };
        assert_eq!(proof.verify(&factored, &context), not_a_unit);

        let mut bad_g = statement.clone();
        bad_g.g = &statement.N * &BigNumber::from(2u64);
        assert_eq!(proof.verify(&bad_g, &context), not_a_unit);

        let mut bad_ni = statement.clone();
        bad_ni.ni = statement.N.clone();
        assert_eq!(proof.verify(&bad_ni, &context), not_a_unit);
        Ok(())
    }
}
