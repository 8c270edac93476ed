// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{digest_array, r_bytes};
use crate::{
    commitment::{CommitmentOpening, HashCommitment},
    errors::*,
    keygen::P2KeyShare,
    messages::{
        expect_message, Message, SignMessage1, SignMessage2, SignMessage3, SignMessage4,
        SignMessage5,
    },
    participant::{advance, MachineState, ProcessOutcome, ProtocolParticipant},
    protocol::{recover_id, ParticipantIdentifier, ProofContext, ProtocolType, SessionId, Signature},
    utils::{k256_order, mod_inverse, random_nonzero_scalar, random_positive_bn},
    zkp::{
        dlog::{DLogInput, DLogProof},
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::{error, info, instrument};

/// Where a [`P2Signature`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2SignatureStatus {
    /// Waiting for party one's commitment.
    ProcessMessage1,
    /// Waiting for party one's opening.
    ProcessMessage3,
    /// Waiting for the final signature.
    ProcessMessage5,
    /// The signature has been received and checked.
    Complete,
    /// An error occurred; the participant can no longer be used.
    Failed,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum P2SignatureState {
    ProcessMessage1,
    ProcessMessage3 {
        commitment: HashCommitment,
        #[serde(with = "crate::serialization::b64_bn")]
        k2: BigNumber,
    },
    ProcessMessage5 {
        #[serde(with = "crate::serialization::hex_array")]
        r: [u8; 32],
    },
    Complete,
    Failed,
}

impl MachineState for P2SignatureState {
    const FAILED: Self = P2SignatureState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(self, P2SignatureState::Complete | P2SignatureState::Failed)
    }

    fn name(&self) -> &'static str {
        match self {
            P2SignatureState::ProcessMessage1 => "process_message_1",
            P2SignatureState::ProcessMessage3 { .. } => "process_message_3",
            P2SignatureState::ProcessMessage5 { .. } => "process_message_5",
            P2SignatureState::Complete => "complete",
            P2SignatureState::Failed => "failed",
        }
    }
}

/// Party two's side of signing.
#[derive(Serialize, Deserialize)]
pub struct P2Signature {
    sid: SessionId,
    #[serde(with = "crate::serialization::hex_array")]
    digest: [u8; 32],
    key_share: P2KeyShare,
    state: P2SignatureState,
}

impl Debug for P2Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2Signature")
            .field("sid", &self.sid)
            .field("digest", &hex::encode(self.digest))
            .field("key_share", &self.key_share)
            .field("state", &self.state.name())
            .finish()
    }
}

impl P2Signature {
    /// Prepare to sign the 32-byte `digest` with `key_share`.
    pub fn new(sid: SessionId, digest: &[u8], key_share: &P2KeyShare) -> Result<Self> {
        let digest = digest_array(digest)?;
        info!("Created party two signing for session `{}`", sid);
        Ok(Self {
            sid,
            digest,
            key_share: key_share.clone(),
            state: P2SignatureState::ProcessMessage1,
        })
    }
}

impl ProtocolParticipant for P2Signature {
    type Output = Signature;
    type Status = P2SignatureStatus;

    fn protocol_type() -> ProtocolType {
        ProtocolType::Sign
    }

    fn party() -> ParticipantIdentifier {
        ParticipantIdentifier::PartyTwo
    }

    fn sid(&self) -> &SessionId {
        &self.sid
    }

    fn status(&self) -> Self::Status {
        match self.state {
            P2SignatureState::ProcessMessage1 => P2SignatureStatus::ProcessMessage1,
            P2SignatureState::ProcessMessage3 { .. } => P2SignatureStatus::ProcessMessage3,
            P2SignatureState::ProcessMessage5 { .. } => P2SignatureStatus::ProcessMessage5,
            P2SignatureState::Complete => P2SignatureStatus::Complete,
            P2SignatureState::Failed => P2SignatureStatus::Failed,
        }
    }

    fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    #[cfg_attr(feature = "flame_it", flame("sign"))]
    #[instrument(skip_all, err(Debug))]
    fn process_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: Option<&Message>,
    ) -> Result<ProcessOutcome<Signature>> {
        let Self {
            ref sid,
            ref digest,
            ref key_share,
            ref mut state,
        } = *self;
        advance(sid, state, |current| match current {
            P2SignatureState::ProcessMessage1 => {
                let message = expect_message::<SignMessage1>(message, sid)?;
                process_message_1(rng, sid, message)
            }
            P2SignatureState::ProcessMessage3 { commitment, k2 } => {
                let message = expect_message::<SignMessage3>(message, sid)?;
                process_message_3(rng, sid, digest, key_share, &commitment, &k2, message)
            }
            P2SignatureState::ProcessMessage5 { r } => {
                let message = expect_message::<SignMessage5>(message, sid)?;
                process_message_5(sid, digest, key_share, &r, message)
            }
            P2SignatureState::Complete | P2SignatureState::Failed => {
                state_err!("participant is in a terminal state")
            }
        })
    }
}

type Transition = Result<(P2SignatureState, ProcessOutcome<Signature>)>;

fn process_message_1<R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &SessionId,
    message: &SignMessage1,
) -> Transition {
    let context = ProofContext::new(sid, ParticipantIdentifier::PartyTwo);
    let k2 = random_nonzero_scalar(rng)?;
    let (r2, dlog_proof) = DLogProof::prove_for_secret(&k2, &context, rng)?;

    let reply = Message::Sign2(SignMessage2 {
        session_id: sid.clone(),
        r2,
        dlog_proof,
    });
    Ok((
        P2SignatureState::ProcessMessage3 {
            commitment: message.commitment.clone(),
            k2,
        },
        ProcessOutcome::Processed(reply),
    ))
}

fn process_message_3<R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &SessionId,
    digest: &[u8; 32],
    key_share: &P2KeyShare,
    commitment: &HashCommitment,
    k2: &BigNumber,
    message: &SignMessage3,
) -> Transition {
    let peer = ProofContext::new(sid, ParticipantIdentifier::PartyOne);
    message
        .dlog_proof
        .verify(&DLogInput::new(&message.r1), &peer)?;
    let opening = CommitmentOpening {
        point: message.r1,
        proof: message.dlog_proof.clone(),
        blind_factor: message.blind_factor.clone(),
    };
    if !opening.verify(&peer, commitment) {
        error!("Revealed nonce point does not open the first-round commitment");
        return verify_err!("commitment does not open");
    }

    let q = k256_order();
    let big_r = message.r1.multiply_by_bignum(k2)?;
    let r = r_bytes(&big_r.x_bn())?;
    let r_bn = BigNumber::from_slice(r);

    let k2_inv = mod_inverse(k2, &q)?;
    let m = BigNumber::from_slice(digest);
    let rho = random_positive_bn(rng, &(&q * &q));

    let ek = key_share.paillier_public_key();
    let (c1, _) = ek.encrypt(rng, &(rho * &q + k2_inv.modmul(&m, &q)))?;
    let v = k2_inv.modmul(&r_bn, &q).modmul(key_share.x2(), &q);
    let c2 = ek.multiply(key_share.c_key_x1(), &v);
    let c3 = ek.add(&c1, &c2);

    let reply = Message::Sign4(SignMessage4 {
        session_id: sid.clone(),
        c3,
    });
    Ok((
        P2SignatureState::ProcessMessage5 { r },
        ProcessOutcome::Processed(reply),
    ))
}

fn process_message_5(
    sid: &SessionId,
    digest: &[u8; 32],
    key_share: &P2KeyShare,
    r: &[u8; 32],
    message: &SignMessage5,
) -> Transition {
    let (sig_r, sig_s) = message.signature.split_at(32);
    if sig_r != r {
        error!("Final signature does not use the agreed nonce");
        return Err(InternalError::SignatureSelfCheck(String::from(
            "r does not match the joint nonce",
        )));
    }
    let s: [u8; 32] = sig_s
        .try_into()
        .map_err(|_| InternalError::InternalInvariantFailed)?;

    let unchecked = Signature::new(*r, s, 0);
    let recovery_id = recover_id(key_share.public_key(), digest, &unchecked.to_ecdsa()?)?;
    let signature = Signature::new(*r, s, recovery_id);
    signature.verify(key_share.public_key(), digest)?;

    info!("Party two completed signing for session `{}`", sid);
    Ok((P2SignatureState::Complete, ProcessOutcome::Terminated(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        paillier::prime_gen,
        utils::{testing::init_testing, CurvePoint},
    };

    fn key_share<R: RngCore + CryptoRng>(rng: &mut R) -> Result<P2KeyShare> {
        let x1 = random_nonzero_scalar(rng)?;
        let x2 = random_nonzero_scalar(rng)?;
        let public_key = CurvePoint::GENERATOR.multiply_by_bignum(&(&x1 * &x2))?;
        let keypair = prime_gen::paillier_keypair_from_pool_insecure(rng);
        let (c_key_x1, _) = keypair.encryption_key().encrypt(rng, &x1)?;
        Ok(P2KeyShare::new(
            x2,
            public_key,
            c_key_x1,
            keypair.encryption_key().clone(),
        ))
    }

    #[test]
    fn signing_waits_for_a_commitment() -> Result<()> {
        let mut rng = init_testing();
        let share = key_share(&mut rng)?;
        let mut p2 = P2Signature::new(SessionId::new("p2-sign"), &[2u8; 32], &share)?;
        assert_eq!(p2.status(), P2SignatureStatus::ProcessMessage1);
        assert!(matches!(
            p2.process_message(&mut rng, None),
            Err(InternalError::InvalidState(_))
        ));
        assert_eq!(p2.status(), P2SignatureStatus::Failed);
        Ok(())
    }

    #[test]
    fn mismatched_r_is_rejected() -> Result<()> {
        let mut rng = init_testing();
        let share = key_share(&mut rng)?;
        let sid = SessionId::new("p2-sign");
        let digest = [2u8; 32];
        let message = SignMessage5 {
            session_id: sid.clone(),
            signature: [1u8; 64],
        };
        assert!(matches!(
            process_message_5(&sid, &digest, &share, &[2u8; 32], &message),
            Err(InternalError::SignatureSelfCheck(_))
        ));
        Ok(())
    }
}
