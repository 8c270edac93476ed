// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Two-party key generation and key refresh.
//!
//! Party one commits to its share point `Q1 = x1·G` and an ephemeral point
//! `E1`; party two answers with `Q2`, `E2` and proofs; party one then opens
//! its commitments and sends `Enc(x1')` together with proofs that the
//! Paillier key is well formed and that the ciphertext encrypts the
//! discrete log of `Q1'`. Both shares are rotated by the x coordinate of
//! the shared ephemeral point (`x1' = x1·t`, `x2' = x2·t⁻¹`), which keeps
//! the joint public key and makes refresh a fresh run seeded with the old
//! shares.

mod keyshare;
mod party_one;
mod party_two;

pub use keyshare::{P1KeyShare, P2KeyShare};
pub use party_one::{P1KeyGen, P1KeyGenStatus};
pub use party_two::{P2KeyGen, P2KeyGenStatus};

use crate::{
    errors::*,
    utils::{k256_order, mod_positive, random_nonzero_scalar, CurvePoint},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use tracing::error;
use zeroize::Zeroizing;

/// The rotation factor both parties derive from their ephemeral keys: the x
/// coordinate of `own_ephemeral·E_peer`, reduced mod q.
pub(crate) fn rotation_value(
    own_ephemeral: &BigNumber,
    peer_point: &CurvePoint,
) -> Result<BigNumber> {
    let shared = peer_point.multiply_by_bignum(own_ephemeral)?;
    let rotation = mod_positive(&shared.x_bn(), &k256_order());
    if rotation == BigNumber::zero() {
        error!("Shared ephemeral point has a zero x coordinate");
        return Err(InternalError::InternalInvariantFailed);
    }
    Ok(rotation)
}

/// The initial share scalar: the seed reduced mod q, or a random scalar.
pub(crate) fn initial_share<R: RngCore + CryptoRng>(
    seed: Option<&[u8]>,
    rng: &mut R,
) -> Result<BigNumber> {
    let seed = match seed {
        Some(seed) => seed,
        None => return random_nonzero_scalar(rng),
    };
    if seed.len() != 32 {
        error!("Key share seed must be 32 bytes, got {}", seed.len());
        return arg_err!("seed must be exactly 32 bytes");
    }
    let bytes = Zeroizing::new(seed.to_vec());
    let x = mod_positive(&BigNumber::from_slice(bytes.as_slice()), &k256_order());
    if x == BigNumber::zero() {
        error!("Key share seed reduces to zero");
        return arg_err!("seed reduces to zero modulo the curve order");
    }
    Ok(x)
}
