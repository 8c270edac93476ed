// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Contains the functions and definitions for dealing with messages that are
//! passed between the two parties.
//!
//! Every message is a JSON object carrying a `phase` tag, the `session_id`
//! of the run it belongs to, and the fields of its kind. [`Message`] is the
//! closed set of kinds; parsing fails on an unknown tag or a missing field.

use crate::{
    commitment::HashCommitment,
    errors::{InternalError, Result},
    paillier::{PaillierCiphertext, PaillierEncryptionKey},
    protocol::SessionId,
    utils::CurvePoint,
    zkp::{
        composite_dlog::CompositeDLogProof,
        correct_key::NiCorrectKeyProof,
        dlog::DLogProof,
        pdl_slack::{PdlProofBundle, PdlWSlackProof, PdlWSlackStatement},
    },
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// The phase tag of a [`Message`].
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Phase {
    KeyGenMessage1,
    KeyGenMessage2,
    KeyGenMessage3,
    SignMessage1,
    SignMessage2,
    SignMessage3,
    SignMessage4,
    SignMessage5,
}

impl Phase {
    /// The tag as it appears in the `phase` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::KeyGenMessage1 => "key_gen_message_1",
            Phase::KeyGenMessage2 => "key_gen_message_2",
            Phase::KeyGenMessage3 => "key_gen_message_3",
            Phase::SignMessage1 => "sign_message_1",
            Phase::SignMessage2 => "sign_message_2",
            Phase::SignMessage3 => "sign_message_3",
            Phase::SignMessage4 => "sign_message_4",
            Phase::SignMessage5 => "sign_message_5",
        }
    }
}

/// A message that is sent from one party to the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase")]
pub enum Message {
    /// P1 → P2: commitments to `Q1` and `E1`.
    KeyGen1(KeyGenMessage1),
    /// P2 → P1: `Q2` and `E2` with their DLog proofs.
    KeyGen2(KeyGenMessage2),
    /// P1 → P2: openings, the encrypted share and its proofs.
    KeyGen3(KeyGenMessage3),
    /// P1 → P2: commitment to `R1`.
    Sign1(SignMessage1),
    /// P2 → P1: `R2` and its DLog proof.
    Sign2(SignMessage2),
    /// P1 → P2: opening of `R1`.
    Sign3(SignMessage3),
    /// P2 → P1: the encrypted partial signature.
    Sign4(SignMessage4),
    /// P1 → P2: the final signature.
    Sign5(SignMessage5),
}

impl Message {
    /// The phase tag of this message.
    pub fn phase(&self) -> Phase {
        match self {
            Message::KeyGen1(_) => Phase::KeyGenMessage1,
            Message::KeyGen2(_) => Phase::KeyGenMessage2,
            Message::KeyGen3(_) => Phase::KeyGenMessage3,
            Message::Sign1(_) => Phase::SignMessage1,
            Message::Sign2(_) => Phase::SignMessage2,
            Message::Sign3(_) => Phase::SignMessage3,
            Message::Sign4(_) => Phase::SignMessage4,
            Message::Sign5(_) => Phase::SignMessage5,
        }
    }

    /// The session this message belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Message::KeyGen1(m) => &m.session_id,
            Message::KeyGen2(m) => &m.session_id,
            Message::KeyGen3(m) => &m.session_id,
            Message::Sign1(m) => &m.session_id,
            Message::Sign2(m) => &m.session_id,
            Message::Sign3(m) => &m.session_id,
            Message::Sign4(m) => &m.session_id,
            Message::Sign5(m) => &m.session_id,
        }
    }

    /// Serialize to the JSON wire document.
    pub fn to_json(&self) -> Result<String> {
        serialize!(self)
    }

    /// Parse a JSON wire document.
    pub fn from_json(json: &str) -> Result<Self> {
        deserialize!(json)
    }
}

/// Implemented by every per-kind message struct so a state machine can ask
/// for exactly the kind it expects.
pub(crate) trait PhaseMessage: Sized {
    const PHASE: Phase;
    fn from_message(message: &Message) -> Option<&Self>;
}

macro_rules! phase_message {
    ($ty:ident, $variant:ident, $phase:ident) => {
        impl PhaseMessage for $ty {
            const PHASE: Phase = Phase::$phase;
            fn from_message(message: &Message) -> Option<&Self> {
                match message {
                    Message::$variant(m) => Some(m),
                    _ => None,
                }
            }
        }
    };
}

phase_message!(KeyGenMessage1, KeyGen1, KeyGenMessage1);
phase_message!(KeyGenMessage2, KeyGen2, KeyGenMessage2);
phase_message!(KeyGenMessage3, KeyGen3, KeyGenMessage3);
phase_message!(SignMessage1, Sign1, SignMessage1);
phase_message!(SignMessage2, Sign2, SignMessage2);
phase_message!(SignMessage3, Sign3, SignMessage3);
phase_message!(SignMessage4, Sign4, SignMessage4);
phase_message!(SignMessage5, Sign5, SignMessage5);

/// Check that `message` is present, belongs to `sid`, and is of kind `T`.
///
/// The session id is checked before the phase.
#[instrument(skip_all, err(Debug))]
pub(crate) fn expect_message<'a, T: PhaseMessage>(
    message: Option<&'a Message>,
    sid: &SessionId,
) -> Result<&'a T> {
    let message = match message {
        Some(message) => message,
        None => {
            error!("Expected a `{}` message but none was given", T::PHASE.as_str());
            return state_err!("a message is required in this state");
        }
    };
    if message.session_id() != sid {
        error!(
            "Message for session `{}` delivered to session `{}`",
            message.session_id(),
            sid
        );
        return Err(InternalError::SessionMismatch {
            expected: sid.to_string(),
            actual: message.session_id().to_string(),
        });
    }
    T::from_message(message).ok_or_else(|| {
        error!(
            "Expected a `{}` message, got `{}`",
            T::PHASE.as_str(),
            message.phase().as_str()
        );
        InternalError::PhaseMismatch {
            expected: T::PHASE.as_str(),
            actual: message.phase().as_str(),
        }
    })
}

/// Round 1 of key generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyGenMessage1 {
    pub(crate) session_id: SessionId,
    pub(crate) commitment_1: HashCommitment,
    pub(crate) commitment_2: HashCommitment,
}

/// Round 2 of key generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyGenMessage2 {
    pub(crate) session_id: SessionId,
    pub(crate) q2: CurvePoint,
    pub(crate) dlog_proof_1: DLogProof,
    pub(crate) e2: CurvePoint,
    pub(crate) dlog_proof_2: DLogProof,
}

/// Round 3 of key generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyGenMessage3 {
    pub(crate) session_id: SessionId,
    pub(crate) q1: CurvePoint,
    pub(crate) dlog_proof_1: DLogProof,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) blind_factor_1: BigNumber,
    pub(crate) c_key: PaillierCiphertext,
    pub(crate) paillier_public_key: PaillierEncryptionKey,
    pub(crate) ni_key_correct_proof: NiCorrectKeyProof,
    pub(crate) pdl_w_slack_statement: PdlWSlackStatement,
    pub(crate) pdl_w_slack_proof: PdlWSlackProof,
    pub(crate) composite_dlog_proof: CompositeDLogProof,
    pub(crate) e1: CurvePoint,
    pub(crate) dlog_proof_2: DLogProof,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) blind_factor_2: BigNumber,
}

impl KeyGenMessage3 {
    pub(crate) fn pdl_bundle(&self) -> PdlProofBundle {
        PdlProofBundle {
            statement: self.pdl_w_slack_statement.clone(),
            proof: self.pdl_w_slack_proof.clone(),
            composite_proof: self.composite_dlog_proof.clone(),
        }
    }
}

/// Round 1 of signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessage1 {
    pub(crate) session_id: SessionId,
    pub(crate) commitment: HashCommitment,
}

/// Round 2 of signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessage2 {
    pub(crate) session_id: SessionId,
    #[serde(with = "crate::serialization::hex_point")]
    pub(crate) r2: CurvePoint,
    pub(crate) dlog_proof: DLogProof,
}

/// Round 3 of signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessage3 {
    pub(crate) session_id: SessionId,
    #[serde(with = "crate::serialization::hex_point")]
    pub(crate) r1: CurvePoint,
    pub(crate) dlog_proof: DLogProof,
    #[serde(with = "crate::serialization::b64_bn")]
    pub(crate) blind_factor: BigNumber,
}

/// Round 4 of signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessage4 {
    pub(crate) session_id: SessionId,
    pub(crate) c3: PaillierCiphertext,
}

/// Round 5 of signing: the signature as hex of `r || s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessage5 {
    pub(crate) session_id: SessionId,
    #[serde(with = "crate::serialization::hex_array")]
    pub(crate) signature: [u8; 64],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{ParticipantIdentifier, ProofContext},
        utils::{random_nonzero_scalar, testing::init_testing},
    };

    fn sign_message_2(sid: &SessionId) -> Result<Message> {
        let mut rng = init_testing();
        let context = ProofContext::new(sid, ParticipantIdentifier::PartyTwo);
        let k2 = random_nonzero_scalar(&mut rng)?;
        let (r2, dlog_proof) = DLogProof::prove_for_secret(&k2, &context, &mut rng)?;
        Ok(Message::Sign2(SignMessage2 {
            session_id: sid.clone(),
            r2,
            dlog_proof,
        }))
    }

    #[test]
    fn messages_round_trip_through_json() -> Result<()> {
        let sid = SessionId::new("messages-test");
        let message = sign_message_2(&sid)?;
        let json = message.to_json()?;
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["phase"], "sign_message_2");
        assert_eq!(value["session_id"], "messages-test");
        // r2 travels as hex of x || y
        assert_eq!(value["r2"].as_str().map(str::len), Some(128));

        let parsed = Message::from_json(&json)?;
        assert_eq!(parsed, message);
        assert_eq!(parsed.phase(), Phase::SignMessage2);
        assert_eq!(parsed.session_id(), &sid);

        let signature = Message::Sign5(SignMessage5 {
            session_id: sid,
            signature: [7u8; 64],
        });
        assert_eq!(Message::from_json(&signature.to_json()?)?, signature);
        Ok(())
    }

    #[test]
    fn malformed_documents_are_rejected() -> Result<()> {
        let sid = SessionId::new("messages-test");
        let json = sign_message_2(&sid)?.to_json()?;
        let value: serde_json::Value = serde_json::from_str(&json)?;

        let mut missing = value.clone();
        missing
            .as_object_mut()
            .ok_or(InternalError::InternalInvariantFailed)?
            .remove("dlog_proof");
        assert!(Message::from_json(&missing.to_string()).is_err());

        let mut unknown = value.clone();
        unknown["phase"] = serde_json::Value::from("sign_message_9");
        assert!(Message::from_json(&unknown.to_string()).is_err());

        let mut short_signature = serde_json::json!({
            "phase": "sign_message_5",
            "session_id": "messages-test",
            "signature": "abcd",
        });
        assert!(Message::from_json(&short_signature.to_string()).is_err());
        short_signature["signature"] = serde_json::Value::from("zz".repeat(64));
        assert!(Message::from_json(&short_signature.to_string()).is_err());
        Ok(())
    }

    #[test]
    fn expect_message_checks_session_then_phase() -> Result<()> {
        let sid = SessionId::new("messages-test");
        let message = sign_message_2(&sid)?;

        assert!(expect_message::<SignMessage2>(Some(&message), &sid).is_ok());

        let other = SessionId::new("other-session");
        assert_eq!(
            expect_message::<SignMessage3>(Some(&message), &other).unwrap_err(),
            InternalError::SessionMismatch {
                expected: String::from("other-session"),
                actual: String::from("messages-test"),
            }
        );
        assert_eq!(
            expect_message::<SignMessage3>(Some(&message), &sid).unwrap_err(),
            InternalError::PhaseMismatch {
                expected: "sign_message_3",
                actual: "sign_message_2",
            }
        );
        assert!(matches!(
            expect_message::<SignMessage2>(None, &sid),
            Err(InternalError::InvalidState(_))
        ));
        Ok(())
    }
}
