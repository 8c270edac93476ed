// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Identifiers shared by both parties and the signature produced by a
//! signing run.

use crate::{
    errors::{InternalError, Result},
    parameters::SCALAR_BYTES,
    utils::CurvePoint,
};
use k256::ecdsa::{
    signature::hazmat::PrehashVerifier, RecoveryId, Signature as EcdsaSignature, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;

/// The caller-chosen identifier binding every message, proof and
/// commitment of one protocol run together.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session id string.
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(sid: &str) -> Self {
        Self::new(sid)
    }
}

/// Which of the two parties is acting.
///
/// Party one owns the Paillier key; party two holds an encryption of party
/// one's share under that key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantIdentifier {
    /// The Paillier key holder.
    PartyOne,
    /// The holder of the encrypted share.
    PartyTwo,
}

impl ParticipantIdentifier {
    /// Domain separation label mixed into every hash this party produces.
    pub(crate) fn label(&self) -> &'static [u8] {
        match self {
            ParticipantIdentifier::PartyOne => b"party_one",
            ParticipantIdentifier::PartyTwo => b"party_two",
        }
    }
}

/// Which sub-protocol a participant runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    /// Key generation or refresh.
    Keygen,
    /// Signing.
    Sign,
}

/// The `(sid, pid)` pair hashed into every proof challenge and commitment.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProofContext<'a> {
    sid: &'a SessionId,
    pid: ParticipantIdentifier,
}

impl<'a> ProofContext<'a> {
    pub(crate) fn new(sid: &'a SessionId, pid: ParticipantIdentifier) -> Self {
        Self { sid, pid }
    }

    pub(crate) fn sid_bytes(&self) -> &[u8] {
        self.sid.as_bytes()
    }

    pub(crate) fn pid_bytes(&self) -> &[u8] {
        self.pid.label()
    }
}

/// An ECDSA signature `(r, s)` in low-s form together with its recovery id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    recovery_id: u8,
}

impl Signature {
    pub(crate) fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// The big-endian `r` component.
    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// The big-endian `s` component.
    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Recovery id (0 or 1) selecting the public key among the candidates
    /// recoverable from `(r, s)`.
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..SCALAR_BYTES].copy_from_slice(&self.r);
        bytes[SCALAR_BYTES..].copy_from_slice(&self.s);
        bytes
    }

    /// Hex encoding of [`Signature::to_bytes`].
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn to_ecdsa(&self) -> Result<EcdsaSignature> {
        EcdsaSignature::from_scalars(self.r, self.s).map_err(|_| {
            error!("Could not construct signature from the provided scalars");
            InternalError::SignatureSelfCheck(String::from("r or s is not a valid scalar"))
        })
    }

    /// Verify the signature and its recovery id against a public key.
    pub fn verify(&self, public_key: &CurvePoint, digest: &[u8; 32]) -> Result<()> {
        let signature = self.to_ecdsa()?;
        verify_prehash(public_key, digest, &signature)?;

        let recovery_id = RecoveryId::from_byte(self.recovery_id).ok_or_else(|| {
            InternalError::SignatureSelfCheck(String::from("recovery id out of range"))
        })?;
        let recovered = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|_| {
                InternalError::SignatureSelfCheck(String::from("public key recovery failed"))
            })?;
        if recovered != verifying_key(public_key)? {
            error!("Recovery id does not select the signing public key");
            return Err(InternalError::SignatureSelfCheck(String::from(
                "recovery id mismatch",
            )));
        }
        Ok(())
    }
}

fn verifying_key(public_key: &CurvePoint) -> Result<VerifyingKey> {
    VerifyingKey::from_affine(public_key.0.to_affine())
        .map_err(|_| InternalError::KeyConsistency(String::from("public key is the identity")))
}

/// Standard ECDSA verification of `(r, s)` over a 32-byte digest.
fn verify_prehash(
    public_key: &CurvePoint,
    digest: &[u8; 32],
    signature: &EcdsaSignature,
) -> Result<()> {
    verifying_key(public_key)?
        .verify_prehash(digest, signature)
        .map_err(|_| {
            error!("ECDSA signature does not verify against the public key");
            InternalError::SignatureSelfCheck(String::from("ECDSA verification failed"))
        })
}

/// Find the recovery id of a valid signature by trial recovery.
pub(crate) fn recover_id(
    public_key: &CurvePoint,
    digest: &[u8; 32],
    signature: &EcdsaSignature,
) -> Result<u8> {
    let recovery_id =
        RecoveryId::trial_recovery_from_prehash(&verifying_key(public_key)?, digest, signature)
            .map_err(|_| {
                error!("Failed to compute recovery id for signature");
                InternalError::SignatureSelfCheck(String::from("trial recovery failed"))
            })?;
    Ok(recovery_id.to_byte())
}

/// Verify a hex-encoded `r || s` signature over `digest` against a public
/// key in the hex `x || y` form stored in key shares.
pub fn verify_signature(public_key_hex: &str, digest: &[u8], signature_hex: &str) -> Result<()> {
    let digest: [u8; 32] = digest
        .try_into()
        .map_err(|_| InternalError::InvalidArgument(String::from("digest must be 32 bytes")))?;
    let public_key = CurvePoint::try_from_hex(public_key_hex)?;
    let bytes = hex::decode(signature_hex).map_err(|e| decode_err!(e.to_string()))?;
    let signature = EcdsaSignature::from_slice(&bytes)
        .map_err(|_| decode_err!("signature must be 64 bytes of r || s"))?;
    verify_prehash(&public_key, &digest, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{bn_to_scalar, random_nonzero_scalar, testing::init_testing};
    use k256::ecdsa::SigningKey;
    use rand::RngCore;

    #[test]
    fn signatures_from_k256_verify() -> Result<()> {
        let mut rng = init_testing();
        let secret = bn_to_scalar(&random_nonzero_scalar(&mut rng)?)?;
        let signing_key = SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|_| InternalError::InternalInvariantFailed)?;
        let public_key = CurvePoint::GENERATOR.multiply_by_scalar(&secret);

        let mut digest = [0u8; 32];
        rng.fill_bytes(&mut digest);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|_| InternalError::InternalInvariantFailed)?;

        let bytes = signature.to_bytes();
        let ours = Signature::new(
            bytes[..32].try_into().unwrap(),
            bytes[32..].try_into().unwrap(),
            recovery_id.to_byte(),
        );
        ours.verify(&public_key, &digest)?;
        assert_eq!(recover_id(&public_key, &digest, &signature)?, recovery_id.to_byte());
        verify_signature(&public_key.to_hex(), &digest, &ours.to_hex())?;

        // A flipped recovery id selects a different key
        let wrong = Signature::new(ours.r, ours.s, ours.recovery_id ^ 1);
        assert!(wrong.verify(&public_key, &digest).is_err());

        // A different digest fails
        digest[0] ^= 1;
        assert!(verify_signature(&public_key.to_hex(), &digest, &ours.to_hex()).is_err());
        Ok(())
    }

    #[test]
    fn party_labels_differ() {
        assert_ne!(
            ParticipantIdentifier::PartyOne.label(),
            ParticipantIdentifier::PartyTwo.label()
        );
    }
}
