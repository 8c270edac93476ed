// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Schnorr proof of knowledge of a discrete logarithm on secp256k1, made
//! non-interactive with Fiat-Shamir.

use super::Proof;
use crate::{
    errors::*,
    protocol::ProofContext,
    utils::{self, bn_to_scalar, hash_to_bn, k256_order, random_positive_bn, CurvePoint},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Proof that the prover knows `x` with `Y = x·G`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DLogProof {
    /// Commitment `t = r·G`.
    pub(crate) t: CurvePoint,
    /// Response `s = r + c·x mod q`.
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) s: BigNumber,
}

pub(crate) struct DLogInput {
    y: CurvePoint,
}

impl DLogInput {
    pub(crate) fn new(y: &CurvePoint) -> Self {
        Self { y: *y }
    }
}

pub(crate) struct DLogSecret {
    x: BigNumber,
}

impl DLogSecret {
    pub(crate) fn new(x: &BigNumber) -> Self {
        Self { x: x.clone() }
    }
}

impl DLogProof {
    fn challenge(y: &CurvePoint, t: &CurvePoint, context: &ProofContext) -> BigNumber {
        hash_to_bn(&[
            &CurvePoint::GENERATOR.x_bytes(),
            &y.x_bytes(),
            &t.x_bytes(),
            context.sid_bytes(),
            context.pid_bytes(),
        ])
    }

    /// Prove knowledge of `x` for the point `x·G`, returning the point too.
    pub(crate) fn prove_for_secret<R: RngCore + CryptoRng>(
        x: &BigNumber,
        context: &ProofContext,
        rng: &mut R,
    ) -> Result<(CurvePoint, Self)> {
        let y = CurvePoint::GENERATOR.multiply_by_bignum(x)?;
        let proof = Self::prove(&DLogInput::new(&y), &DLogSecret::new(x), context, rng)?;
        Ok((y, proof))
    }
}

impl Proof for DLogProof {
    type CommonInput = DLogInput;
    type ProverSecret = DLogSecret;

    #[cfg_attr(feature = "flame_it", flame("DLogProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        context: &ProofContext,
        rng: &mut R,
    ) -> Result<Self> {
        let q = k256_order();
        let r = random_positive_bn(rng, &q);
        let t = CurvePoint::GENERATOR.multiply_by_bignum(&r)?;

        let c = Self::challenge(&input.y, &t, context);
        let s = r.modadd(&c.modmul(&secret.x, &q), &q);

        Ok(Self { t, s })
    }

    #[cfg_attr(feature = "flame_it", flame("DLogProof"))]
    fn verify(&self, input: &Self::CommonInput, context: &ProofContext) -> Result<()> {
        if input.y.is_identity() || self.t.is_identity() {
            return verify_err!("DLog statement or commitment is the identity");
        }
        if self.s < BigNumber::zero() || self.s >= k256_order() {
            return verify_err!("DLog response is not reduced modulo q");
        }
        let c = Self::challenge(&input.y, &self.t, context);

        let eq_check_1 = {
            let lhs = CurvePoint::GENERATOR.multiply_by_scalar(&bn_to_scalar(&self.s)?);
            let rhs = self.t + input.y.multiply_by_scalar(&utils::bn_to_scalar(&c)?);
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!("eq_check_1 failed");
        }

        Ok(())
    }
}
