// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Two-party signing of a 32-byte digest.
//!
//! The parties agree on `R = k1·k2·G` through a commit/reveal exchange of
//! `R1` and `R2`. Party two then uses the additive homomorphism of party
//! one's Paillier key and its encryption of `x1` to send
//! `Enc(ρ·q + k2⁻¹·m + k2⁻¹·r·x2·x1)`; party one decrypts, multiplies by
//! `k1⁻¹` and obtains `s`. The `ρ·q` term hides the unreduced plaintext
//! from party one.

mod party_one;
mod party_two;

pub use party_one::{P1Signature, P1SignatureStatus};
pub use party_two::{P2Signature, P2SignatureStatus};

use crate::{errors::*, utils::bn_to_scalar};
use libpaillier::unknown_order::BigNumber;
use tracing::error;

/// The digest as a fixed-size array.
pub(crate) fn digest_array(digest: &[u8]) -> Result<[u8; 32]> {
    digest.try_into().map_err(|_| {
        error!("Message digest must be 32 bytes, got {}", digest.len());
        InternalError::InvalidArgument(String::from("digest must be exactly 32 bytes"))
    })
}

/// `r = R.x mod q` as big-endian bytes.
pub(crate) fn r_bytes(x: &BigNumber) -> Result<[u8; 32]> {
    let r = bn_to_scalar(x)?;
    if bool::from(r.is_zero()) {
        error!("Joint nonce point has a zero x coordinate modulo q");
        return Err(InternalError::InternalInvariantFailed);
    }
    Ok(r.to_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::k256_order;

    #[test]
    fn digests_must_be_32_bytes() {
        assert!(digest_array(&[0u8; 32]).is_ok());
        assert!(matches!(
            digest_array(&[0u8; 33]),
            Err(InternalError::InvalidArgument(_))
        ));
        assert!(digest_array(&[]).is_err());
    }

    #[test]
    fn r_is_reduced_and_nonzero() -> Result<()> {
        let q = k256_order();
        let mut expected = [0u8; 32];
        expected[31] = 3;
        assert_eq!(r_bytes(&(&q + &BigNumber::from(3u64)))?, expected);
        assert!(r_bytes(&q).is_err());
        Ok(())
    }
}
