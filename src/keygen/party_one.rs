// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{initial_share, rotation_value, P1KeyShare};
use crate::{
    commitment::CommitmentOpening,
    errors::*,
    messages::{expect_message, KeyGenMessage1, KeyGenMessage2, KeyGenMessage3, Message},
    paillier::PaillierDecryptionKey,
    parameters::PAILLIER_MODULUS_BITS,
    participant::{advance, MachineState, ProcessOutcome, ProtocolParticipant},
    protocol::{ParticipantIdentifier, ProofContext, ProtocolType, SessionId},
    utils::{k256_order, random_nonzero_scalar, CurvePoint},
    zkp::{
        correct_key::NiCorrectKeyProof,
        dlog::{DLogInput, DLogProof},
        pdl_slack::prove_pdl,
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::{error, info, instrument};

/// Where a [`P1KeyGen`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P1KeyGenStatus {
    /// Waiting for [`P1KeyGen::init`].
    NotInitialized,
    /// Ready to produce the first message.
    CreateMessage1,
    /// Waiting for party two's reply.
    ProcessMessage2,
    /// The key share has been produced.
    Complete,
    /// An error occurred; the participant can no longer be used.
    Failed,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum P1KeyGenState {
    NotInitialized,
    CreateMessage1 {
        paillier_keypair: PaillierDecryptionKey,
        aux_keypair: PaillierDecryptionKey,
    },
    ProcessMessage2 {
        paillier_keypair: PaillierDecryptionKey,
        aux_keypair: PaillierDecryptionKey,
        share_opening: CommitmentOpening,
        ephemeral_opening: CommitmentOpening,
        #[serde(with = "crate::serialization::b64_bn")]
        eph1: BigNumber,
    },
    Complete,
    Failed,
}

impl MachineState for P1KeyGenState {
    const FAILED: Self = P1KeyGenState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(self, P1KeyGenState::Complete | P1KeyGenState::Failed)
    }

    fn name(&self) -> &'static str {
        match self {
            P1KeyGenState::NotInitialized => "not_initialized",
            P1KeyGenState::CreateMessage1 { .. } => "create_message_1",
            P1KeyGenState::ProcessMessage2 { .. } => "process_message_2",
            P1KeyGenState::Complete => "complete",
            P1KeyGenState::Failed => "failed",
        }
    }
}

/// Party one's side of key generation or refresh.
///
/// Construct with [`P1KeyGen::new`] or [`P1KeyGen::for_refresh`], call
/// [`P1KeyGen::init`] (or [`P1KeyGen::init_with_keypairs`]) and then drive
/// it with [`ProtocolParticipant::process_message`]: first with `None` to
/// produce `key_gen_message_1`, then with party two's `key_gen_message_2`,
/// which yields the [`P1KeyShare`] and `key_gen_message_3`.
#[derive(Serialize, Deserialize)]
pub struct P1KeyGen {
    sid: SessionId,
    #[serde(with = "crate::serialization::b64_bn")]
    x1: BigNumber,
    expected_public_key: Option<CurvePoint>,
    state: P1KeyGenState,
}

impl Debug for P1KeyGen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P1KeyGen")
            .field("sid", &self.sid)
            .field("x1", &"[redacted]")
            .field("expected_public_key", &self.expected_public_key)
            .field("state", &self.state.name())
            .finish()
    }
}

impl P1KeyGen {
    /// Start a fresh key generation.
    ///
    /// With a `seed`, the initial share is the 32-byte seed reduced mod q;
    /// otherwise it is sampled from `rng`.
    pub fn new<R: RngCore + CryptoRng>(
        sid: SessionId,
        seed: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Self> {
        let x1 = initial_share(seed, rng)?;
        info!("Created party one key generation for session `{}`", sid);
        Ok(Self {
            sid,
            x1,
            expected_public_key: None,
            state: P1KeyGenState::NotInitialized,
        })
    }

    /// Start a refresh of `key_share`: the run begins from the existing
    /// share and must reproduce its public key.
    pub fn for_refresh(sid: SessionId, key_share: &P1KeyShare) -> Self {
        info!("Created party one key refresh for session `{}`", sid);
        Self {
            sid,
            x1: key_share.x1().clone(),
            expected_public_key: Some(*key_share.public_key()),
            state: P1KeyGenState::NotInitialized,
        }
    }

    /// Generate the two Paillier keypairs: one to encrypt `x1` under, and
    /// one whose modulus serves as the auxiliary modulus of the PDL proof.
    #[instrument(skip_all, err(Debug))]
    pub fn init(&mut self) -> Result<()> {
        self.check_uninitialized()?;
        let generated = PaillierDecryptionKey::generate()
            .and_then(|keypair| Ok((keypair, PaillierDecryptionKey::generate()?)));
        match generated {
            Ok((paillier_keypair, aux_keypair)) => {
                self.init_with_keypairs(paillier_keypair, aux_keypair)
            }
            Err(err) => {
                self.state = P1KeyGenState::Failed;
                Err(err)
            }
        }
    }

    /// Like [`P1KeyGen::init`], with keypairs generated elsewhere. Both
    /// moduli must be exactly 2048 bits.
    #[instrument(skip_all, err(Debug))]
    pub fn init_with_keypairs(
        &mut self,
        paillier_keypair: PaillierDecryptionKey,
        aux_keypair: PaillierDecryptionKey,
    ) -> Result<()> {
        self.check_uninitialized()?;
        for keypair in [&paillier_keypair, &aux_keypair] {
            let bits = keypair.encryption_key().bit_length();
            if bits != PAILLIER_MODULUS_BITS {
                error!(
                    "Paillier modulus has {} bits, expected {}",
                    bits, PAILLIER_MODULUS_BITS
                );
                self.state = P1KeyGenState::Failed;
                return Err(InternalError::KeyConsistency(format!(
                    "Paillier modulus must be {PAILLIER_MODULUS_BITS} bits"
                )));
            }
        }
        self.state = P1KeyGenState::CreateMessage1 {
            paillier_keypair,
            aux_keypair,
        };
        Ok(())
    }

    fn check_uninitialized(&mut self) -> Result<()> {
        if matches!(self.state, P1KeyGenState::NotInitialized) {
            return Ok(());
        }
        error!(
            "Session `{}` was initialized in state `{}`",
            self.sid,
            self.state.name()
        );
        if !self.state.is_terminal() {
            self.state = P1KeyGenState::Failed;
        }
        state_err!("init is only valid before the protocol starts")
    }
}

impl ProtocolParticipant for P1KeyGen {
    type Output = P1KeyShare;
    type Status = P1KeyGenStatus;

    fn protocol_type() -> ProtocolType {
        ProtocolType::Keygen
    }

    fn party() -> ParticipantIdentifier {
        ParticipantIdentifier::PartyOne
    }

    fn sid(&self) -> &SessionId {
        &self.sid
    }

    fn status(&self) -> Self::Status {
        match self.state {
            P1KeyGenState::NotInitialized => P1KeyGenStatus::NotInitialized,
            P1KeyGenState::CreateMessage1 { .. } => P1KeyGenStatus::CreateMessage1,
            P1KeyGenState::ProcessMessage2 { .. } => P1KeyGenStatus::ProcessMessage2,
            P1KeyGenState::Complete => P1KeyGenStatus::Complete,
            P1KeyGenState::Failed => P1KeyGenStatus::Failed,
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state,
            P1KeyGenState::CreateMessage1 { .. } | P1KeyGenState::ProcessMessage2 { .. }
        )
    }

    #[cfg_attr(feature = "flame_it", flame("keygen"))]
    #[instrument(skip_all, err(Debug))]
    fn process_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: Option<&Message>,
    ) -> Result<ProcessOutcome<P1KeyShare>> {
        let Self {
            ref sid,
            ref x1,
            ref expected_public_key,
            ref mut state,
        } = *self;
        advance(sid, state, |current| match current {
            P1KeyGenState::NotInitialized => {
                state_err!("init must be called before processing messages")
            }
            P1KeyGenState::CreateMessage1 {
                paillier_keypair,
                aux_keypair,
            } => {
                if message.is_some() {
                    return state_err!("the first round takes no message");
                }
                create_message_1(rng, sid, x1, paillier_keypair, aux_keypair)
            }
            P1KeyGenState::ProcessMessage2 {
                paillier_keypair,
                aux_keypair,
                share_opening,
                ephemeral_opening,
                eph1,
            } => {
                let message = expect_message::<KeyGenMessage2>(message, sid)?;
                let round = RoundTwoInput {
                    paillier_keypair,
                    aux_keypair,
                    share_opening,
                    ephemeral_opening,
                    eph1,
                };
                process_message_2(rng, sid, x1, expected_public_key.as_ref(), round, message)
            }
            P1KeyGenState::Complete | P1KeyGenState::Failed => {
                state_err!("participant is in a terminal state")
            }
        })
    }
}

type Transition = Result<(P1KeyGenState, ProcessOutcome<P1KeyShare>)>;

fn create_message_1<R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &SessionId,
    x1: &BigNumber,
    paillier_keypair: PaillierDecryptionKey,
    aux_keypair: PaillierDecryptionKey,
) -> Transition {
    let context = ProofContext::new(sid, ParticipantIdentifier::PartyOne);

    let (q1, share_proof) = DLogProof::prove_for_secret(x1, &context, rng)?;
    let share_opening = CommitmentOpening::new(rng, &q1, &share_proof);

    let eph1 = random_nonzero_scalar(rng)?;
    let (e1, ephemeral_proof) = DLogProof::prove_for_secret(&eph1, &context, rng)?;
    let ephemeral_opening = CommitmentOpening::new(rng, &e1, &ephemeral_proof);

    let message = Message::KeyGen1(KeyGenMessage1 {
        session_id: sid.clone(),
        commitment_1: share_opening.commit(&context),
        commitment_2: ephemeral_opening.commit(&context),
    });

    Ok((
        P1KeyGenState::ProcessMessage2 {
            paillier_keypair,
            aux_keypair,
            share_opening,
            ephemeral_opening,
            eph1,
        },
        ProcessOutcome::Processed(message),
    ))
}

struct RoundTwoInput {
    paillier_keypair: PaillierDecryptionKey,
    aux_keypair: PaillierDecryptionKey,
    share_opening: CommitmentOpening,
    ephemeral_opening: CommitmentOpening,
    eph1: BigNumber,
}

fn process_message_2<R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &SessionId,
    x1: &BigNumber,
    expected_public_key: Option<&CurvePoint>,
    round: RoundTwoInput,
    message: &KeyGenMessage2,
) -> Transition {
    let peer = ProofContext::new(sid, ParticipantIdentifier::PartyTwo);
    let own = ProofContext::new(sid, ParticipantIdentifier::PartyOne);

    message
        .dlog_proof_1
        .verify(&DLogInput::new(&message.q2), &peer)?;

    let public_key = message.q2.multiply_by_bignum(x1)?;
    if let Some(expected) = expected_public_key {
        if expected != &public_key {
            error!("Refreshed shares do not reproduce the expected public key");
            return Err(InternalError::KeyConsistency(String::from(
                "public key does not match the key share being refreshed",
            )));
        }
    }

    message
        .dlog_proof_2
        .verify(&DLogInput::new(&message.e2), &peer)?;

    let rotation = rotation_value(&round.eph1, &message.e2)?;
    let x1_rotated = x1.modmul(&rotation, &k256_order());

    let ek = round.paillier_keypair.encryption_key();
    let ni_key_correct_proof = NiCorrectKeyProof::prove(ek, &round.paillier_keypair, &own, rng)?;
    let (c_key, nonce) = ek.encrypt(rng, &x1_rotated)?;
    let pdl = prove_pdl(
        &x1_rotated,
        &nonce,
        ek,
        &c_key,
        &round.aux_keypair,
        &own,
        rng,
    )?;

    let message = Message::KeyGen3(KeyGenMessage3 {
        session_id: sid.clone(),
        q1: round.share_opening.point,
        dlog_proof_1: round.share_opening.proof,
        blind_factor_1: round.share_opening.blind_factor,
        c_key,
        paillier_public_key: ek.clone(),
        ni_key_correct_proof,
        pdl_w_slack_statement: pdl.statement,
        pdl_w_slack_proof: pdl.proof,
        composite_dlog_proof: pdl.composite_proof,
        e1: round.ephemeral_opening.point,
        dlog_proof_2: round.ephemeral_opening.proof,
        blind_factor_2: round.ephemeral_opening.blind_factor,
    });

    let key_share = P1KeyShare::new(x1_rotated, public_key, round.paillier_keypair);
    info!("Party one completed key generation for session `{}`", sid);
    Ok((
        P1KeyGenState::Complete,
        ProcessOutcome::TerminatedForThisParticipant(key_share, message),
    ))
}
