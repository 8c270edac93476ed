// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the protocol
use core::fmt::Debug;
use thiserror::Error;

/// The default Result type used in this crate
pub type Result<T> = std::result::Result<T, InternalError>;

/// Represents an error in the manipulation of internal cryptographic data or
/// in the sequencing of a protocol run.
///
/// Every error returned from a state machine's `process_message` is fatal:
/// the state machine moves to its `Failed` state and rejects all further
/// calls with [`InternalError::InvalidState`].
#[derive(Clone, Eq, PartialEq, Error, Debug)]
#[allow(missing_docs)]
pub enum InternalError {
    #[error("Serialization Error: `{0}`")]
    Serialization(String),
    #[error("Operation is not valid in the current state: `{0}`")]
    InvalidState(String),
    #[error("Message session id `{actual}` does not match `{expected}`")]
    SessionMismatch { expected: String, actual: String },
    #[error("Expected a message of phase `{expected}`, got `{actual}`")]
    PhaseMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Failed to verify proof: `{0}`")]
    FailedToVerifyProof(String),
    #[error("Key consistency check failed: `{0}`")]
    KeyConsistency(String),
    #[error("Signature failed its own verification: `{0}`")]
    SignatureSelfCheck(String),
    #[error("Function call contained invalid arguments: `{0}`")]
    InvalidArgument(String),
    #[error("Could not invert a BigNumber")]
    CouldNotInvertBigNumber,
    #[error("Could not invert a Scalar")]
    CouldNotInvertScalar,
    #[error("Failed to convert BigNumber to k256::Scalar")]
    CouldNotConvertToScalar,
    #[error("Paillier decryption failed")]
    PaillierDecryptionFailed,
    #[error("Represents some code assumption that was checked at runtime but failed to be true")]
    InternalInvariantFailed,
    #[error("Reached the maximum allowed number of retries")]
    RetryFailed,
}

impl From<serde_json::Error> for InternalError {
    fn from(err: serde_json::Error) -> Self {
        InternalError::Serialization(err.to_string())
    }
}

macro_rules! serialize {
    ($x:expr) => {{
        serde_json::to_string($x).map_err(crate::errors::InternalError::from)
    }};
}

macro_rules! deserialize {
    ($x:expr) => {{
        serde_json::from_str($x).map_err(crate::errors::InternalError::from)
    }};
}

macro_rules! verify_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::FailedToVerifyProof(
            String::from($x),
        ))
    }};
}

macro_rules! arg_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::InvalidArgument(String::from(
            $x,
        )))
    }};
}

macro_rules! state_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::InvalidState(String::from($x)))
    }};
}

macro_rules! decode_err {
    ($x:expr) => {{
        crate::errors::InternalError::Serialization(String::from($x))
    }};
}
