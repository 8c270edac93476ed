// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{initial_share, rotation_value, P2KeyShare};
use crate::{
    commitment::{CommitmentOpening, HashCommitment},
    errors::*,
    messages::{expect_message, KeyGenMessage1, KeyGenMessage2, KeyGenMessage3, Message},
    parameters::PAILLIER_MODULUS_BITS,
    participant::{advance, MachineState, ProcessOutcome, ProtocolParticipant},
    protocol::{ParticipantIdentifier, ProofContext, ProtocolType, SessionId},
    utils::{k256_order, mod_inverse, random_nonzero_scalar, CurvePoint},
    zkp::{
        correct_key::NiCorrectKeyProof,
        dlog::{DLogInput, DLogProof},
        pdl_slack::verify_pdl,
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::{error, info, instrument};

/// Where a [`P2KeyGen`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2KeyGenStatus {
    /// Waiting for party one's commitments.
    ProcessMessage1,
    /// Waiting for party one's openings and proofs.
    ProcessMessage3,
    /// The key share has been produced.
    Complete,
    /// An error occurred; the participant can no longer be used.
    Failed,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum P2KeyGenState {
    ProcessMessage1,
    ProcessMessage3 {
        commitment_1: HashCommitment,
        commitment_2: HashCommitment,
        #[serde(with = "crate::serialization::b64_bn")]
        eph2: BigNumber,
    },
    Complete,
    Failed,
}

impl MachineState for P2KeyGenState {
    const FAILED: Self = P2KeyGenState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(self, P2KeyGenState::Complete | P2KeyGenState::Failed)
    }

    fn name(&self) -> &'static str {
        match self {
            P2KeyGenState::ProcessMessage1 => "process_message_1",
            P2KeyGenState::ProcessMessage3 { .. } => "process_message_3",
            P2KeyGenState::Complete => "complete",
            P2KeyGenState::Failed => "failed",
        }
    }
}

/// Party two's side of key generation or refresh.
///
/// Party two reveals `Q2` and `E2` directly and checks everything party one
/// sends. It produces its [`P2KeyShare`] on `key_gen_message_3` and sends
/// nothing further.
#[derive(Serialize, Deserialize)]
pub struct P2KeyGen {
    sid: SessionId,
    #[serde(with = "crate::serialization::b64_bn")]
    x2: BigNumber,
    expected_public_key: Option<CurvePoint>,
    state: P2KeyGenState,
}

impl Debug for P2KeyGen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2KeyGen")
            .field("sid", &self.sid)
            .field("x2", &"[redacted]")
            .field("expected_public_key", &self.expected_public_key)
            .field("state", &self.state.name())
            .finish()
    }
}

impl P2KeyGen {
    /// Start a fresh key generation, seeding the share like
    /// [`P1KeyGen::new`](crate::P1KeyGen::new).
    pub fn new<R: RngCore + CryptoRng>(
        sid: SessionId,
        seed: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Self> {
        let x2 = initial_share(seed, rng)?;
        info!("Created party two key generation for session `{}`", sid);
        Ok(Self {
            sid,
            x2,
            expected_public_key: None,
            state: P2KeyGenState::ProcessMessage1,
        })
    }

    /// Start a refresh of `key_share`.
    pub fn for_refresh(sid: SessionId, key_share: &P2KeyShare) -> Self {
        info!("Created party two key refresh for session `{}`", sid);
        Self {
            sid,
            x2: key_share.x2().clone(),
            expected_public_key: Some(*key_share.public_key()),
            state: P2KeyGenState::ProcessMessage1,
        }
    }
}

impl ProtocolParticipant for P2KeyGen {
    type Output = P2KeyShare;
    type Status = P2KeyGenStatus;

    fn protocol_type() -> ProtocolType {
        ProtocolType::Keygen
    }

    fn party() -> ParticipantIdentifier {
        ParticipantIdentifier::PartyTwo
    }

    fn sid(&self) -> &SessionId {
        &self.sid
    }

    fn status(&self) -> Self::Status {
        match self.state {
            P2KeyGenState::ProcessMessage1 => P2KeyGenStatus::ProcessMessage1,
            P2KeyGenState::ProcessMessage3 { .. } => P2KeyGenStatus::ProcessMessage3,
            P2KeyGenState::Complete => P2KeyGenStatus::Complete,
            P2KeyGenState::Failed => P2KeyGenStatus::Failed,
        }
    }

    fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    #[cfg_attr(feature = "flame_it", flame("keygen"))]
    #[instrument(skip_all, err(Debug))]
    fn process_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: Option<&Message>,
    ) -> Result<ProcessOutcome<P2KeyShare>> {
        let Self {
            ref sid,
            ref x2,
            ref expected_public_key,
            ref mut state,
        } = *self;
        advance(sid, state, |current| match current {
            P2KeyGenState::ProcessMessage1 => {
                let message = expect_message::<KeyGenMessage1>(message, sid)?;
                process_message_1(rng, sid, x2, message)
            }
            P2KeyGenState::ProcessMessage3 {
                commitment_1,
                commitment_2,
                eph2,
            } => {
                let message = expect_message::<KeyGenMessage3>(message, sid)?;
                let round = RoundThreeInput {
                    commitment_1,
                    commitment_2,
                    eph2,
                };
                process_message_3(sid, x2, expected_public_key.as_ref(), round, message)
            }
            P2KeyGenState::Complete | P2KeyGenState::Failed => {
                state_err!("participant is in a terminal state")
            }
        })
    }
}

type Transition = Result<(P2KeyGenState, ProcessOutcome<P2KeyShare>)>;

fn process_message_1<R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &SessionId,
    x2: &BigNumber,
    message: &KeyGenMessage1,
) -> Transition {
    let context = ProofContext::new(sid, ParticipantIdentifier::PartyTwo);

    let (q2, dlog_proof_1) = DLogProof::prove_for_secret(x2, &context, rng)?;
    let eph2 = random_nonzero_scalar(rng)?;
    let (e2, dlog_proof_2) = DLogProof::prove_for_secret(&eph2, &context, rng)?;

    let reply = Message::KeyGen2(KeyGenMessage2 {
        session_id: sid.clone(),
        q2,
        dlog_proof_1,
        e2,
        dlog_proof_2,
    });

    Ok((
        P2KeyGenState::ProcessMessage3 {
            commitment_1: message.commitment_1.clone(),
            commitment_2: message.commitment_2.clone(),
            eph2,
        },
        ProcessOutcome::Processed(reply),
    ))
}

struct RoundThreeInput {
    commitment_1: HashCommitment,
    commitment_2: HashCommitment,
    eph2: BigNumber,
}

/// Check a revealed point's DLog proof and that it opens the commitment
/// received in the first round.
fn verify_opening(
    point: &CurvePoint,
    proof: &DLogProof,
    blind_factor: &BigNumber,
    commitment: &HashCommitment,
    peer: &ProofContext,
) -> Result<()> {
    proof.verify(&DLogInput::new(point), peer)?;
    let opening = CommitmentOpening {
        point: *point,
        proof: proof.clone(),
        blind_factor: blind_factor.clone(),
    };
    if !opening.verify(peer, commitment) {
        error!("Revealed values do not open the first-round commitment");
        return verify_err!("commitment does not open");
    }
    Ok(())
}

fn process_message_3(
    sid: &SessionId,
    x2: &BigNumber,
    expected_public_key: Option<&CurvePoint>,
    round: RoundThreeInput,
    message: &KeyGenMessage3,
) -> Transition {
    let peer = ProofContext::new(sid, ParticipantIdentifier::PartyOne);
    let q = k256_order();

    verify_opening(
        &message.q1,
        &message.dlog_proof_1,
        &message.blind_factor_1,
        &round.commitment_1,
        &peer,
    )?;

    let public_key = message.q1.multiply_by_bignum(x2)?;
    if let Some(expected) = expected_public_key {
        if expected != &public_key {
            error!("Refreshed shares do not reproduce the expected public key");
            return Err(InternalError::KeyConsistency(String::from(
                "public key does not match the key share being refreshed",
            )));
        }
    }

    verify_opening(
        &message.e1,
        &message.dlog_proof_2,
        &message.blind_factor_2,
        &round.commitment_2,
        &peer,
    )?;

    let rotation = rotation_value(&round.eph2, &message.e1)?;
    let q1_rotated = message.q1.multiply_by_bignum(&rotation)?;
    let x2_rotated = x2.modmul(&mod_inverse(&rotation, &q)?, &q);

    let ek = &message.paillier_public_key;
    if ek.bit_length() != PAILLIER_MODULUS_BITS {
        error!(
            "Party one's Paillier modulus has {} bits, expected {}",
            ek.bit_length(),
            PAILLIER_MODULUS_BITS
        );
        return Err(InternalError::KeyConsistency(format!(
            "Paillier modulus must be {PAILLIER_MODULUS_BITS} bits"
        )));
    }
    message.ni_key_correct_proof.verify(ek, &peer)?;
    verify_pdl(&message.pdl_bundle(), ek, &message.c_key, &q1_rotated, &peer)?;

    let key_share = P2KeyShare::new(x2_rotated, public_key, message.c_key.clone(), ek.clone());
    info!("Party two completed key generation for session `{}`", sid);
    Ok((P2KeyGenState::Complete, ProcessOutcome::Terminated(key_share)))
}
