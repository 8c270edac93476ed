// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The key shares produced by key generation, and their persisted form.

use crate::{
    errors::*,
    paillier::{PaillierCiphertext, PaillierDecryptionKey, PaillierEncryptionKey},
    utils::{k256_order, CurvePoint},
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::error;

fn check_share(x: &BigNumber) -> Result<()> {
    if x <= &BigNumber::zero() || x >= &k256_order() {
        error!("Key share scalar is outside of [1, q)");
        return Err(decode_err!("key share scalar out of range"));
    }
    Ok(())
}

/// Party one's key share: its scalar `x1`, the joint public key and the
/// Paillier keypair under which party two holds `Enc(x1)`.
#[derive(Clone, Serialize, Deserialize)]
pub struct P1KeyShare {
    #[serde(with = "crate::serialization::hex_bn")]
    x1: BigNumber, // in the range [1, q)
    #[serde(with = "crate::serialization::hex_point")]
    public_key: CurvePoint,
    paillier_private_key: PaillierDecryptionKey,
    paillier_public_key: PaillierEncryptionKey,
}

impl P1KeyShare {
    pub(crate) fn new(
        x1: BigNumber,
        public_key: CurvePoint,
        paillier_private_key: PaillierDecryptionKey,
    ) -> Self {
        let paillier_public_key = paillier_private_key.encryption_key().clone();
        Self {
            x1,
            public_key,
            paillier_private_key,
            paillier_public_key,
        }
    }

    pub(crate) fn x1(&self) -> &BigNumber {
        &self.x1
    }

    pub(crate) fn paillier_private_key(&self) -> &PaillierDecryptionKey {
        &self.paillier_private_key
    }

    /// The joint public key `Q = x1·x2·G`.
    pub fn public_key(&self) -> &CurvePoint {
        &self.public_key
    }

    /// Hex of the public key's `x || y` coordinates.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    /// Serialize to the persisted JSON form.
    pub fn to_json(&self) -> Result<String> {
        serialize!(self)
    }

    /// Parse the persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let share: Self = deserialize!(json)?;
        check_share(&share.x1)?;
        if share.paillier_private_key.encryption_key() != &share.paillier_public_key {
            error!("Persisted Paillier public key does not match the private key");
            return Err(decode_err!("Paillier keypair mismatch"));
        }
        Ok(share)
    }
}

impl Debug for P1KeyShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P1KeyShare")
            .field("x1", &"[redacted]")
            .field("public_key", &self.public_key)
            .field("paillier_public_key", &self.paillier_public_key)
            .finish()
    }
}

/// Party two's key share: its scalar `x2`, the joint public key, and party
/// one's share encrypted under party one's Paillier key.
#[derive(Clone, Serialize, Deserialize)]
pub struct P2KeyShare {
    #[serde(with = "crate::serialization::hex_bn")]
    x2: BigNumber, // in the range [1, q)
    #[serde(with = "crate::serialization::hex_point")]
    public_key: CurvePoint,
    c_key_x1: PaillierCiphertext,
    paillier_public_key: PaillierEncryptionKey,
}

impl P2KeyShare {
    pub(crate) fn new(
        x2: BigNumber,
        public_key: CurvePoint,
        c_key_x1: PaillierCiphertext,
        paillier_public_key: PaillierEncryptionKey,
    ) -> Self {
        Self {
            x2,
            public_key,
            c_key_x1,
            paillier_public_key,
        }
    }

    pub(crate) fn x2(&self) -> &BigNumber {
        &self.x2
    }

    pub(crate) fn c_key_x1(&self) -> &PaillierCiphertext {
        &self.c_key_x1
    }

    pub(crate) fn paillier_public_key(&self) -> &PaillierEncryptionKey {
        &self.paillier_public_key
    }

    /// The joint public key `Q = x1·x2·G`.
    pub fn public_key(&self) -> &CurvePoint {
        &self.public_key
    }

    /// Hex of the public key's `x || y` coordinates.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    /// Serialize to the persisted JSON form.
    pub fn to_json(&self) -> Result<String> {
        serialize!(self)
    }

    /// Parse the persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let share: Self = deserialize!(json)?;
        check_share(&share.x2)?;
        Ok(share)
    }
}

impl Debug for P2KeyShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2KeyShare")
            .field("x2", &"[redacted]")
            .field("public_key", &self.public_key)
            .field("paillier_public_key", &self.paillier_public_key)
            .finish()
    }
}
