// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Two-party (2-of-2) threshold ECDSA over secp256k1
//!
//! The signing key `x = x1·x2 mod q` is never held by anyone: party one
//! keeps `x1` and a Paillier keypair, party two keeps `x2` and `Enc(x1)`
//! under party one's Paillier key. Together they can produce an ordinary
//! ECDSA signature that verifies against `Q = x·G` with any standard
//! verifier.
//!
//! The crate provides four state machines, one per party and sub-protocol:
//! [`P1KeyGen`]/[`P2KeyGen`] for key generation and key refresh, and
//! [`P1Signature`]/[`P2Signature`] for signing. Each implements
//! [`ProtocolParticipant`]: the caller feeds it the peer's [`Message`] (or
//! `None` to start) and gets back a [`ProcessOutcome`] holding the next
//! message to deliver and, once finished, the output. Any failure moves the
//! participant to a failed state from which every later call is rejected;
//! the only recovery is a new session.
//!
//! Note that this library does not handle communication. Messages are
//! plain values with a JSON form ([`Message::to_json`]) and each
//! participant can be suspended between rounds with
//! [`ProtocolParticipant::snapshot`] and resumed with
//! [`ProtocolParticipant::restore`].
//!
//! Key generation uses the proofs of Lindell's two-party ECDSA: Schnorr
//! proofs of discrete log for every point, a non-interactive proof that the
//! Paillier modulus is well formed, and a PDL-with-slack proof (backed by a
//! composite discrete log proof) that `Enc(x1)` encrypts the discrete log
//! of party one's share.

#![allow(non_snake_case)]
#![warn(missing_docs)]
#![cfg_attr(feature = "flame_it", feature(proc_macro_hygiene))]
#[cfg(feature = "flame_it")]
extern crate flame;
#[cfg(feature = "flame_it")]
#[macro_use]
extern crate flamer;

#[macro_use]
pub mod errors;

mod commitment;
mod keygen;
mod messages;
mod paillier;
mod parameters;
mod participant;
mod protocol;
mod serialization;
mod sign;
mod utils;
mod zkp;

pub use keygen::{P1KeyGen, P1KeyGenStatus, P1KeyShare, P2KeyGen, P2KeyGenStatus, P2KeyShare};
pub use messages::{
    KeyGenMessage1, KeyGenMessage2, KeyGenMessage3, Message, Phase, SignMessage1, SignMessage2,
    SignMessage3, SignMessage4, SignMessage5,
};
pub use paillier::{PaillierDecryptionKey, PaillierEncryptionKey};
pub use participant::{ProcessOutcome, ProtocolParticipant};
pub use protocol::{verify_signature, ParticipantIdentifier, ProtocolType, SessionId, Signature};
pub use sign::{P1Signature, P1SignatureStatus, P2Signature, P2SignatureStatus};
pub use utils::CurvePoint;
