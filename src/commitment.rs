// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    parameters::BLIND_FACTOR_BYTES,
    protocol::ProofContext,
    utils::{random_bn_from_bytes, sha256, CurvePoint},
    zkp::dlog::DLogProof,
};
use k256::elliptic_curve::subtle::ConstantTimeEq;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// SHA-256 digest binding a point and its DLog proof, sent before they are
/// revealed. Hex-encoded on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct HashCommitment(#[serde(with = "crate::serialization::hex_array")] [u8; 32]);

/// The values a [`HashCommitment`] binds, kept by the committer until the
/// round in which they are revealed.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CommitmentOpening {
    pub(crate) point: CurvePoint,
    pub(crate) proof: DLogProof,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) blind_factor: BigNumber,
}

impl CommitmentOpening {
    /// Sample a fresh blind factor for `point` and its proof.
    pub(crate) fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        point: &CurvePoint,
        proof: &DLogProof,
    ) -> Self {
        Self {
            point: *point,
            proof: proof.clone(),
            blind_factor: random_bn_from_bytes(rng, BLIND_FACTOR_BYTES),
        }
    }

    pub(crate) fn commit(&self, context: &ProofContext) -> HashCommitment {
        HashCommitment(sha256(&[
            &self.point.x_bytes(),
            &self.proof.t.x_bytes(),
            &self.proof.s.to_bytes(),
            &self.blind_factor.to_bytes(),
            context.sid_bytes(),
            context.pid_bytes(),
        ]))
    }

    /// Returns `true` if `self` opens `com` for the given context.
    pub(crate) fn verify(&self, context: &ProofContext, com: &HashCommitment) -> bool {
        self.commit(context).0[..].ct_eq(&com.0[..]).into()
    }
}
