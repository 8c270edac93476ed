// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Proof that a Paillier ciphertext encrypts the discrete log of a curve
//! point ("PDL with slack").
//!
//! The statement is `c = Enc_ek(x; r)` and `Q = x·G`. The proof commits to
//! `x` in a ring-Pedersen style commitment over an auxiliary modulus `Ñ`
//! with generators `h1, h2 = h1^{-ξ}`. A [`CompositeDLogProof`] for `ξ`
//! travels with it to show the generators are well formed; [`prove_pdl`]
//! and [`verify_pdl`] produce and check the pair together.

use super::{
    composite_dlog::{CompositeDLogProof, CompositeDLogSecret, CompositeDLogStatement},
    Proof,
};
use crate::{
    errors::*,
    paillier::{PaillierCiphertext, PaillierDecryptionKey, PaillierEncryptionKey},
    parameters::AUX_SECRET_BITS,
    protocol::ProofContext,
    utils::{
        bn_to_scalar, hash_to_bn, k256_order, mod_inverse, modpow, random_bn_in_z_star,
        random_positive_bn, CurvePoint,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PdlWSlackStatement {
    pub(crate) ciphertext: PaillierCiphertext,
    pub(crate) ek: PaillierEncryptionKey,
    pub(crate) Q: CurvePoint,
    pub(crate) G: CurvePoint,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) h1: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) h2: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) N_tilde: BigNumber,
}

impl PdlWSlackStatement {
    fn composite_statement(&self) -> CompositeDLogStatement {
        CompositeDLogStatement {
            N: self.N_tilde.clone(),
            g: self.h1.clone(),
            ni: self.h2.clone(),
        }
    }
}

pub(crate) struct PdlWSlackWitness {
    x: BigNumber,
    r: BigNumber,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PdlWSlackProof {
    #[serde(with = "crate::serialization::b64_bn")]
    z: BigNumber,
    u1: CurvePoint,
    #[serde(with = "crate::serialization::b64_bn")]
    u2: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    u3: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    s1: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    s2: BigNumber,
    #[serde(with = "crate::serialization::b64_bn")]
    s3: BigNumber,
}

/// `h1^a · h2^b mod Ñ`, with either exponent possibly negative.
fn pedersen_commit(
    h1: &BigNumber,
    h2: &BigNumber,
    N_tilde: &BigNumber,
    a: &BigNumber,
    b: &BigNumber,
) -> Result<BigNumber> {
    Ok(modpow(h1, a, N_tilde)?.modmul(&modpow(h2, b, N_tilde)?, N_tilde))
}

impl PdlWSlackProof {
    #[allow(clippy::too_many_arguments)]
    fn challenge(
        statement: &PdlWSlackStatement,
        z: &BigNumber,
        u1: &CurvePoint,
        u2: &BigNumber,
        u3: &BigNumber,
        context: &ProofContext,
    ) -> BigNumber {
        hash_to_bn(&[
            &statement.G.to_bytes(),
            &statement.Q.to_bytes(),
            &statement.ciphertext.0.to_bytes(),
            &z.to_bytes(),
            &u1.to_bytes(),
            &u2.to_bytes(),
            &u3.to_bytes(),
            context.sid_bytes(),
            context.pid_bytes(),
        ])
    }
}

impl Proof for PdlWSlackProof {
    type CommonInput = PdlWSlackStatement;
    type ProverSecret = PdlWSlackWitness;

    #[cfg_attr(feature = "flame_it", flame("PdlWSlackProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        context: &ProofContext,
        rng: &mut R,
    ) -> Result<Self> {
        let q = k256_order();
        let q3 = &q * &q * &q;
        let n = input.ek.n();
        let N_tilde = &input.N_tilde;

        let alpha = random_positive_bn(rng, &q3);
        let beta = random_bn_in_z_star(rng, n)?;
        let rho = random_positive_bn(rng, &(&q * N_tilde));
        let gamma = random_positive_bn(rng, &(&q3 * N_tilde));

        let z = pedersen_commit(&input.h1, &input.h2, N_tilde, &secret.x, &rho)?;
        let u1 = input.G.multiply_by_bignum(&alpha)?;
        let u2 = input.ek.encrypt_with_nonce(&alpha, &beta)?.0;
        let u3 = pedersen_commit(&input.h1, &input.h2, N_tilde, &alpha, &gamma)?;

        let e = Self::challenge(input, &z, &u1, &u2, &u3, context);

        let s1 = &e * &secret.x + alpha;
        let s2 = secret.r.modpow(&e, n).modmul(&beta, n);
        let s3 = &e * rho + gamma;

        Ok(Self {
            z,
            u1,
            u2,
            u3,
            s1,
            s2,
            s3,
        })
    }

    #[cfg_attr(feature = "flame_it", flame("PdlWSlackProof"))]
    fn verify(&self, input: &Self::CommonInput, context: &ProofContext) -> Result<()> {
        if input.G != CurvePoint::GENERATOR {
            return verify_err!("statement does not use the curve generator");
        }
        let n = input.ek.n();
        let nn = input.ek.nn();
        let N_tilde = &input.N_tilde;
        // Both get raised to -e below
        if input.ciphertext.0.gcd(n) != BigNumber::one() {
            return verify_err!("ciphertext is not a unit modulo n^2");
        }
        if self.z.gcd(N_tilde) != BigNumber::one() {
            return verify_err!("commitment z is not a unit modulo N_tilde");
        }
        let e = Self::challenge(input, &self.z, &self.u1, &self.u2, &self.u3, context);
        let minus_e = -e.clone();

        // s1·G - e·Q == u1
        let eq_check_1 = {
            let rhs = input.G.multiply_by_scalar(&bn_to_scalar(&self.s1)?)
                - input.Q.multiply_by_scalar(&bn_to_scalar(&e)?);
            rhs == self.u1
        };
        if !eq_check_1 {
            return verify_err!("eq_check_1 failed");
        }

        // (n+1)^s1 · s2^n · c^{-e} == u2 mod n^2
        let eq_check_2 = {
            let rhs = (n + &BigNumber::one())
                .modpow(&self.s1, nn)
                .modmul(&self.s2.modpow(n, nn), nn)
                .modmul(&modpow(&input.ciphertext.0, &minus_e, nn)?, nn);
            rhs == self.u2
        };
        if !eq_check_2 {
            return verify_err!("eq_check_2 failed");
        }

        // h1^s1 · h2^s3 · z^{-e} == u3 mod Ñ
        let eq_check_3 = {
            let rhs = pedersen_commit(&input.h1, &input.h2, N_tilde, &self.s1, &self.s3)?
                .modmul(&modpow(&self.z, &minus_e, N_tilde)?, N_tilde);
            rhs == self.u3
        };
        if !eq_check_3 {
            return verify_err!("eq_check_3 failed");
        }

        Ok(())
    }
}

/// Generators `h1, h2 = h1^{-ξ}` over the modulus of `aux_keypair`, and `ξ`.
fn generate_h1_h2_n_tilde<R: RngCore + CryptoRng>(
    rng: &mut R,
    aux_keypair: &PaillierDecryptionKey,
) -> Result<(CompositeDLogStatement, CompositeDLogSecret)> {
    let N_tilde = aux_keypair.encryption_key().n().clone();
    let h1 = random_bn_in_z_star(rng, &N_tilde)?;
    let xhi = random_positive_bn(rng, &(BigNumber::one() << AUX_SECRET_BITS));
    let h2 = mod_inverse(&h1, &N_tilde)?.modpow(&xhi, &N_tilde);
    Ok((
        CompositeDLogStatement {
            N: N_tilde,
            g: h1,
            ni: h2,
        },
        CompositeDLogSecret(xhi),
    ))
}

/// The PDL statement, the slack proof and the composite DLog proof for the
/// auxiliary generators.
pub(crate) struct PdlProofBundle {
    pub(crate) statement: PdlWSlackStatement,
    pub(crate) proof: PdlWSlackProof,
    pub(crate) composite_proof: CompositeDLogProof,
}

/// Prove that `ciphertext = Enc_ek(x; nonce)` encrypts the discrete log of
/// `x·G`, using the modulus of `aux_keypair` for the auxiliary commitments.
pub(crate) fn prove_pdl<R: RngCore + CryptoRng>(
    x: &BigNumber,
    nonce: &BigNumber,
    ek: &PaillierEncryptionKey,
    ciphertext: &PaillierCiphertext,
    aux_keypair: &PaillierDecryptionKey,
    context: &ProofContext,
    rng: &mut R,
) -> Result<PdlProofBundle> {
    let (dlog_statement, xhi) = generate_h1_h2_n_tilde(rng, aux_keypair)?;
    let composite_proof = CompositeDLogProof::prove(&dlog_statement, &xhi, context, rng)?;

    let statement = PdlWSlackStatement {
        ciphertext: ciphertext.clone(),
        ek: ek.clone(),
        Q: CurvePoint::GENERATOR.multiply_by_bignum(x)?,
        G: CurvePoint::GENERATOR,
        h1: dlog_statement.g,
        h2: dlog_statement.ni,
        N_tilde: dlog_statement.N,
    };
    let witness = PdlWSlackWitness {
        x: x.clone(),
        r: nonce.clone(),
    };
    let proof = PdlWSlackProof::prove(&statement, &witness, context, rng)?;

    Ok(PdlProofBundle {
        statement,
        proof,
        composite_proof,
    })
}

/// Check that the bundle proves `ciphertext` under `ek` encrypts the discrete
/// log of `q`.
pub(crate) fn verify_pdl(
    bundle: &PdlProofBundle,
    ek: &PaillierEncryptionKey,
    ciphertext: &PaillierCiphertext,
    q: &CurvePoint,
    context: &ProofContext,
) -> Result<()> {
    let statement = &bundle.statement;
    if &statement.ek != ek || &statement.ciphertext != ciphertext || &statement.Q != q {
        error!("PDL statement does not describe the expected key, ciphertext and point");
        return verify_err!("PDL statement mismatch");
    }
    bundle
        .composite_proof
        .verify(&statement.composite_statement(), context)?;
    bundle.proof.verify(statement, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        paillier::prime_gen,
        protocol::{ParticipantIdentifier, SessionId},
        utils::{random_nonzero_scalar, testing::init_testing},
    };

    struct Setup {
        x: BigNumber,
        nonce: BigNumber,
        sk: PaillierDecryptionKey,
        aux: PaillierDecryptionKey,
        ciphertext: PaillierCiphertext,
    }

    fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Setup> {
        let sk = prime_gen::paillier_keypair_from_pool_insecure(rng);
        let aux = prime_gen::paillier_keypair_from_pool_insecure(rng);
        let x = random_nonzero_scalar(rng)?;
        let (ciphertext, nonce) = sk.encryption_key().encrypt(rng, &x)?;
        Ok(Setup {
            x,
            nonce,
            sk,
            aux,
            ciphertext,
        })
    }

    #[test]
    fn test_pdl_proof() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("pdl-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let s = setup(&mut rng)?;
        let ek = s.sk.encryption_key();

        let bundle = prove_pdl(&s.x, &s.nonce, ek, &s.ciphertext, &s.aux, &context, &mut rng)?;
        let q = CurvePoint::GENERATOR.multiply_by_bignum(&s.x)?;
        assert!(verify_pdl(&bundle, ek, &s.ciphertext, &q, &context).is_ok());

        // Statement must match the claimed point, ciphertext and key
        let other_q = q + CurvePoint::GENERATOR;
        assert!(verify_pdl(&bundle, ek, &s.ciphertext, &other_q, &context).is_err());
        let (other_c, _) = ek.encrypt(&mut rng, &s.x)?;
        assert!(verify_pdl(&bundle, ek, &other_c, &q, &context).is_err());
        assert!(verify_pdl(&bundle, s.aux.encryption_key(), &s.ciphertext, &q, &context).is_err());

        let other = ProofContext::new(&sid, ParticipantIdentifier::PartyTwo);
        assert!(verify_pdl(&bundle, ek, &s.ciphertext, &q, &other).is_err());
        Ok(())
    }

    #[test]
    fn ciphertext_of_a_different_value_fails() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("pdl-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let s = setup(&mut rng)?;
        let ek = s.sk.encryption_key();

        // Encrypt x + 1 but claim x·G
        let (c, nonce) = ek.encrypt(&mut rng, &(&s.x + &BigNumber::one()))?;
        let bundle = prove_pdl(&s.x, &nonce, ek, &c, &s.aux, &context, &mut rng)?;
        let q = CurvePoint::GENERATOR.multiply_by_bignum(&s.x)?;
        assert!(verify_pdl(&bundle, ek, &c, &q, &context).is_err());
        Ok(())
    }

    #[test]
    fn tampered_responses_fail() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("pdl-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let s = setup(&mut rng)?;
        let ek = s.sk.encryption_key();
        let bundle = prove_pdl(&s.x, &s.nonce, ek, &s.ciphertext, &s.aux, &context, &mut rng)?;

        let mut proof = bundle.proof.clone();
        proof.s2 = proof.s2.modadd(&BigNumber::one(), ek.n());
        assert!(proof.verify(&bundle.statement, &context).is_err());

        let mut proof = bundle.proof.clone();
        proof.s3 = &proof.s3 + &BigNumber::one();
        assert!(proof.verify(&bundle.statement, &context).is_err());
        Ok(())
    }

    #[test]
    fn non_unit_ciphertext_or_commitment_fails_verification() -> Result<()> {
        let mut rng = init_testing();
        let sid = SessionId::new("pdl-test");
        let context = ProofContext::new(&sid, ParticipantIdentifier::PartyOne);
        let s = setup(&mut rng)?;
        let ek = s.sk.encryption_key();
        let bundle = prove_pdl(&s.x, &s.nonce, ek, &s.ciphertext, &s.aux, &context, &mut rng)?;

        // A multiple of a factor of n has no inverse modulo n^2
        let mut statement = bundle.statement.clone();
        statement.ciphertext = PaillierCiphertext(s.sk.p().clone());
        assert_eq!(
            bundle.proof.verify(&statement, &context),
            Err(InternalError::FailedToVerifyProof(String::from(
                "ciphertext is not a unit modulo n^2"
            )))
        );

        let mut proof = bundle.proof.clone();
        proof.z = s.aux.q().clone();
        assert_eq!(
            proof.verify(&bundle.statement, &context),
            Err(InternalError::FailedToVerifyProof(String::from(
                "commitment z is not a unit modulo N_tilde"
            )))
        );
        Ok(())
    }
}
