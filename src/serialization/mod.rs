// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Byte-level encodings shared by the wire messages, snapshots and key
//! shares.
//!
//! Big integers travel as base64 (or, in key shares, hex) of their minimal
//! big-endian bytes. The submodules are `#[serde(with = ...)]` adapters for
//! those encodings.

use crate::errors::*;
use base64::{engine::general_purpose::STANDARD, Engine};
use libpaillier::unknown_order::BigNumber;

// Corresponds to the I2OSP() function from RFC8017
pub(crate) fn i2osp(input: usize, length: usize) -> Result<Vec<u8>> {
    let sizeof_usize = core::mem::size_of::<usize>();

    // Check if input >= 256^length
    if (sizeof_usize as u32 - input.leading_zeros() / 8) > length as u32 {
        return Err(decode_err!("integer too large for I2OSP length"));
    }

    if length <= sizeof_usize {
        return Ok((&input.to_be_bytes()[sizeof_usize - length..]).to_vec());
    }

    let mut output = vec![0u8; length];
    output.splice(
        length - sizeof_usize..length,
        input.to_be_bytes().iter().cloned(),
    );
    Ok(output)
}

pub(crate) fn bytes_to_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn b64_to_bytes(s: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| decode_err!(format!("invalid base64: {e}")))
}

pub(crate) fn bn_to_b64(n: &BigNumber) -> String {
    bytes_to_b64(&n.to_bytes())
}

pub(crate) fn b64_to_bn(s: &str) -> Result<BigNumber> {
    Ok(BigNumber::from_slice(b64_to_bytes(s)?))
}

pub(crate) fn bn_to_hex(n: &BigNumber) -> String {
    hex::encode(n.to_bytes())
}

pub(crate) fn hex_to_bn(s: &str) -> Result<BigNumber> {
    let bytes = hex::decode(s).map_err(|e| decode_err!(format!("invalid hex: {e}")))?;
    Ok(BigNumber::from_slice(bytes))
}

/// `#[serde(with)]` adapter: [`BigNumber`] as base64 of its big-endian bytes.
pub(crate) mod b64_bn {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        n: &BigNumber,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&bn_to_b64(n))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<BigNumber, D::Error> {
        let s = String::deserialize(deserializer)?;
        b64_to_bn(&s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with)]` adapter: a list of base64-encoded [`BigNumber`]s.
pub(crate) mod b64_bn_vec {
    use super::*;
    use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        ns: &[BigNumber],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(ns.len()))?;
        for n in ns {
            seq.serialize_element(&bn_to_b64(n))?;
        }
        seq.end()
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<BigNumber>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| b64_to_bn(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// `#[serde(with)]` adapter: [`BigNumber`] as hex of its big-endian bytes.
pub(crate) mod hex_bn {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        n: &BigNumber,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&bn_to_hex(n))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<BigNumber, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex_to_bn(&s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with)]` adapter: [`CurvePoint`](crate::CurvePoint) as hex of its
/// `x || y` coordinates instead of the default base64.
pub(crate) mod hex_point {
    use crate::utils::CurvePoint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        p: &CurvePoint,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&p.to_hex())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<CurvePoint, D::Error> {
        let s = String::deserialize(deserializer)?;
        CurvePoint::try_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with)]` adapter: a fixed-size byte array as hex.
pub(crate) mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> std::result::Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected exactly {N} bytes")))
    }
}
