// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! This module contains [`ProtocolParticipant`], the trait shared by the
//! key-generation and signing state machines of both parties.

use crate::{
    errors::{InternalError, Result},
    messages::Message,
    parameters::SNAPSHOT_VERSION,
    protocol::{ParticipantIdentifier, ProtocolType, SessionId},
};
use rand::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{error, info};

/// Possible outcomes from processing one message.
///
/// Every successful call completes exactly one round, so an outcome always
/// carries either a message for the peer, the participant's output, or both.
pub enum ProcessOutcome<O> {
    /// The round completed and the protocol continues.
    Processed(Message),
    /// The protocol is done for this participant but the peer still needs
    /// the enclosed message to finish.
    TerminatedForThisParticipant(O, Message),
    /// The protocol is done and there is nothing left to send.
    Terminated(O),
}

impl<O> Debug for ProcessOutcome<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let descriptor = match self {
            ProcessOutcome::Processed(_) => "Processed",
            ProcessOutcome::Terminated(_) => "Terminated",
            ProcessOutcome::TerminatedForThisParticipant(_, _) => "Terminated for this participant",
        };
        write!(f, "ProcessOutcome::{descriptor}")
    }
}

impl<O> ProcessOutcome<O> {
    /// Convert the [`ProcessOutcome`] into its constituent parts.
    pub fn into_parts(self) -> (Option<O>, Option<Message>) {
        match self {
            Self::Processed(message) => (None, Some(message)),
            Self::TerminatedForThisParticipant(output, message) => (Some(output), Some(message)),
            Self::Terminated(output) => (Some(output), None),
        }
    }

    /// The message to deliver to the peer, if any.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Processed(message) | Self::TerminatedForThisParticipant(_, message) => {
                Some(message)
            }
            Self::Terminated(_) => None,
        }
    }

    /// The participant's output, if the protocol finished for it.
    pub fn output(&self) -> Option<&O> {
        match self {
            Self::Processed(_) => None,
            Self::TerminatedForThisParticipant(output, _) | Self::Terminated(output) => {
                Some(output)
            }
        }
    }
}

/// The public-facing methods of every state machine.
///
/// A participant is driven by calling [`process_message`] once per round,
/// with `None` for the round that starts the protocol and the peer's
/// message otherwise. Any error moves the participant to its failed state,
/// after which every call fails with [`InternalError::InvalidState`].
///
/// [`process_message`]: ProtocolParticipant::process_message
pub trait ProtocolParticipant: Serialize + DeserializeOwned + Sized {
    /// Output type of a successful protocol execution.
    type Output: Debug;
    /// Type to determine status of protocol execution.
    type Status: Debug + PartialEq + Copy;

    /// Define which protocol this implements.
    fn protocol_type() -> ProtocolType;

    /// Which party this state machine plays.
    fn party() -> ParticipantIdentifier;

    /// The session this participant is bound to.
    fn sid(&self) -> &SessionId;

    /// The current state.
    fn status(&self) -> Self::Status;

    /// Returns `true` when another [`process_message`] call is legal.
    ///
    /// [`process_message`]: ProtocolParticipant::process_message
    fn is_active(&self) -> bool;

    /// Run one round of the protocol.
    fn process_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: Option<&Message>,
    ) -> Result<ProcessOutcome<Self::Output>>;

    /// Serialize the full state of this participant, secrets included, into
    /// a versioned JSON document.
    fn snapshot(&self) -> Result<String> {
        serialize!(&SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            protocol: Self::protocol_type(),
            party: Self::party(),
            participant: self,
        })
    }

    /// Rebuild a participant from the output of [`snapshot`].
    ///
    /// [`snapshot`]: ProtocolParticipant::snapshot
    fn restore(snapshot: &str) -> Result<Self> {
        let envelope: SnapshotEnvelope<Self> = deserialize!(snapshot)?;
        if envelope.version != SNAPSHOT_VERSION {
            error!(
                "Snapshot has version {}, expected {}",
                envelope.version, SNAPSHOT_VERSION
            );
            return Err(decode_err!("unsupported snapshot version"));
        }
        if envelope.protocol != Self::protocol_type() || envelope.party != Self::party() {
            error!(
                "Snapshot of a {:?} participant for {:?} cannot restore a {:?} participant for {:?}",
                envelope.party,
                envelope.protocol,
                Self::party(),
                Self::protocol_type()
            );
            return Err(decode_err!("snapshot belongs to a different protocol or party"));
        }
        Ok(envelope.participant)
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope<P> {
    version: u32,
    protocol: ProtocolType,
    party: ParticipantIdentifier,
    participant: P,
}

/// The state machines keep their round data in an enum and implement this to
/// share the take-transition-restore discipline of [`advance`].
pub(crate) trait MachineState: Sized {
    /// The absorbing failure state.
    const FAILED: Self;

    /// Returns `true` for the absorbing `Complete` and `Failed` states.
    fn is_terminal(&self) -> bool;

    /// Name of the state, for logs.
    fn name(&self) -> &'static str;
}

/// Move `slot` to the state produced by `transition`.
///
/// The current state is taken out of `slot` and replaced by the failure
/// state for the duration of the transition; it is only overwritten again
/// on success. A participant already in a terminal state is left untouched
/// and the call fails.
pub(crate) fn advance<S, O, F>(
    sid: &SessionId,
    slot: &mut S,
    transition: F,
) -> Result<ProcessOutcome<O>>
where
    S: MachineState,
    F: FnOnce(S) -> Result<(S, ProcessOutcome<O>)>,
{
    if slot.is_terminal() {
        error!(
            "Session `{}` received a message after reaching the terminal state `{}`",
            sid,
            slot.name()
        );
        return Err(InternalError::InvalidState(format!(
            "participant is in terminal state `{}`",
            slot.name()
        )));
    }
    let current = std::mem::replace(slot, S::FAILED);
    let from = current.name();
    match transition(current) {
        Ok((next, outcome)) => {
            info!("Session `{}` moved from `{}` to `{}`", sid, from, next.name());
            *slot = next;
            Ok(outcome)
        }
        Err(err) => {
            error!("Session `{}` failed in state `{}`: {}", sid, from, err);
            Err(err)
        }
    }
}
