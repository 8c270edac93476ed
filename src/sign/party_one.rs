// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{digest_array, r_bytes};
use crate::{
    commitment::CommitmentOpening,
    errors::*,
    keygen::P1KeyShare,
    messages::{
        expect_message, Message, SignMessage1, SignMessage2, SignMessage3, SignMessage4,
        SignMessage5,
    },
    participant::{advance, MachineState, ProcessOutcome, ProtocolParticipant},
    protocol::{ParticipantIdentifier, ProofContext, ProtocolType, SessionId, Signature},
    utils::{bn_to_scalar, invert_scalar, random_nonzero_scalar},
    zkp::{
        dlog::{DLogInput, DLogProof},
        Proof,
    },
};
use k256::elliptic_curve::scalar::IsHigh;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::{error, info, instrument};

/// Where a [`P1Signature`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P1SignatureStatus {
    /// Ready to produce the first message.
    CreateMessage1,
    /// Waiting for party two's nonce point.
    ProcessMessage2,
    /// Waiting for the encrypted partial signature.
    ProcessMessage4,
    /// The signature has been produced.
    Complete,
    /// An error occurred; the participant can no longer be used.
    Failed,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum P1SignatureState {
    CreateMessage1,
    ProcessMessage2 {
        #[serde(with = "crate::serialization::b64_bn")]
        k1: BigNumber,
        opening: CommitmentOpening,
    },
    ProcessMessage4 {
        #[serde(with = "crate::serialization::b64_bn")]
        k1: BigNumber,
        #[serde(with = "crate::serialization::hex_array")]
        r: [u8; 32],
        recovery_id: u8,
    },
    Complete,
    Failed,
}

impl MachineState for P1SignatureState {
    const FAILED: Self = P1SignatureState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(self, P1SignatureState::Complete | P1SignatureState::Failed)
    }

    fn name(&self) -> &'static str {
        match self {
            P1SignatureState::CreateMessage1 => "create_message_1",
            P1SignatureState::ProcessMessage2 { .. } => "process_message_2",
            P1SignatureState::ProcessMessage4 { .. } => "process_message_4",
            P1SignatureState::Complete => "complete",
            P1SignatureState::Failed => "failed",
        }
    }
}

/// Party one's side of signing.
///
/// Driven with `None` to produce `sign_message_1`, then with
/// `sign_message_2` and `sign_message_4`. The last call yields the
/// [`Signature`] together with `sign_message_5` for party two. The
/// signature is checked against the joint public key before it is
/// released.
#[derive(Serialize, Deserialize)]
pub struct P1Signature {
    sid: SessionId,
    #[serde(with = "crate::serialization::hex_array")]
    digest: [u8; 32],
    key_share: P1KeyShare,
    state: P1SignatureState,
}

impl Debug for P1Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P1Signature")
            .field("sid", &self.sid)
            .field("digest", &hex::encode(self.digest))
            .field("key_share", &self.key_share)
            .field("state", &self.state.name())
            .finish()
    }
}

impl P1Signature {
    /// Prepare to sign the 32-byte `digest` with `key_share`.
    pub fn new(sid: SessionId, digest: &[u8], key_share: &P1KeyShare) -> Result<Self> {
        let digest = digest_array(digest)?;
        info!("Created party one signing for session `{}`", sid);
        Ok(Self {
            sid,
            digest,
            key_share: key_share.clone(),
            state: P1SignatureState::CreateMessage1,
        })
    }
}

impl ProtocolParticipant for P1Signature {
    type Output = Signature;
    type Status = P1SignatureStatus;

    fn protocol_type() -> ProtocolType {
        ProtocolType::Sign
    }

    fn party() -> ParticipantIdentifier {
        ParticipantIdentifier::PartyOne
    }

    fn sid(&self) -> &SessionId {
        &self.sid
    }

    fn status(&self) -> Self::Status {
        match self.state {
            P1SignatureState::CreateMessage1 => P1SignatureStatus::CreateMessage1,
            P1SignatureState::ProcessMessage2 { .. } => P1SignatureStatus::ProcessMessage2,
            P1SignatureState::ProcessMessage4 { .. } => P1SignatureStatus::ProcessMessage4,
            P1SignatureState::Complete => P1SignatureStatus::Complete,
            P1SignatureState::Failed => P1SignatureStatus::Failed,
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
            P1SignatureState::CreateMessage1 => {
                if message.is_some() {
                    return state_err!("the first round takes no message");
                }
                create_message_1(rng, sid)
            }
            P1SignatureState::ProcessMessage2 { k1, opening } => {
                let message = expect_message::<SignMessage2>(message, sid)?;
                process_message_2(sid, k1, opening, message)
            }
            P1SignatureState::ProcessMessage4 { k1, r, recovery_id } => {
                let message = expect_message::<SignMessage4>(message, sid)?;
                process_message_4(sid, digest, key_share, &k1, r, recovery_id, message)
            }
            P1SignatureState::Complete | P1SignatureState::Failed => {
                state_err!("participant is in a terminal state")
            }
        })
    }
}

type Transition = Result<(P1SignatureState, ProcessOutcome<Signature>)>;

fn create_message_1<R: RngCore + CryptoRng>(rng: &mut R, sid: &SessionId) -> Transition {
    let context = ProofContext::new(sid, ParticipantIdentifier::PartyOne);
    let k1 = random_nonzero_scalar(rng)?;
    let (r1, proof) = DLogProof::prove_for_secret(&k1, &context, rng)?;
    let opening = CommitmentOpening::new(rng, &r1, &proof);

    let message = Message::Sign1(SignMessage1 {
        session_id: sid.clone(),
        commitment: opening.commit(&context),
    });
    Ok((
        P1SignatureState::ProcessMessage2 { k1, opening },
        ProcessOutcome::Processed(message),
    ))
}

fn process_message_2(
    sid: &SessionId,
    k1: BigNumber,
    opening: CommitmentOpening,
    message: &SignMessage2,
) -> Transition {
    let peer = ProofContext::new(sid, ParticipantIdentifier::PartyTwo);
    message
        .dlog_proof
        .verify(&DLogInput::new(&message.r2), &peer)?;

    let big_r = message.r2.multiply_by_bignum(&k1)?;
    let r = r_bytes(&big_r.x_bn())?;
    let recovery_id = u8::from(big_r.y_is_odd());

    let reply = Message::Sign3(SignMessage3 {
        session_id: sid.clone(),
        r1: opening.point,
        dlog_proof: opening.proof,
        blind_factor: opening.blind_factor,
    });
    Ok((
        P1SignatureState::ProcessMessage4 { k1, r, recovery_id },
        ProcessOutcome::Processed(reply),
    ))
}

fn process_message_4(
    sid: &SessionId,
    digest: &[u8; 32],
    key_share: &P1KeyShare,
    k1: &BigNumber,
    r: [u8; 32],
    recovery_id: u8,
    message: &SignMessage4,
) -> Transition {
    let partial = key_share.paillier_private_key().decrypt(&message.c3)?;
    let k1_inv = invert_scalar(&bn_to_scalar(k1)?)?;
    let mut s = k1_inv * bn_to_scalar(&partial)?;
    let mut recovery_id = recovery_id;
    if bool::from(s.is_high()) {
        s = -s;
        recovery_id ^= 1;
    }
    if bool::from(s.is_zero()) {
        error!("Assembled signature has s = 0");
        return Err(InternalError::SignatureSelfCheck(String::from("s is zero")));
    }

    let signature = Signature::new(r, s.to_bytes().into(), recovery_id);
    if let Err(err) = signature.verify(key_share.public_key(), digest) {
        error!("Assembled signature failed its own verification");
        return Err(err);
    }

    let reply = Message::Sign5(SignMessage5 {
        session_id: sid.clone(),
        signature: signature.to_bytes(),
    });
    info!("Party one completed signing for session `{}`", sid);
    Ok((
        P1SignatureState::Complete,
        ProcessOutcome::TerminatedForThisParticipant(signature, reply),
    ))
}
