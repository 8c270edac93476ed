// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Security parameter definitions.
//!
//! These constants fix the sizes of the Paillier moduli, the number of
//! repetitions in the key-correctness proof and the ranges used by the
//! composite discrete-log and PDL-with-slack proofs. They are the only
//! configuration surface of the protocol; everything else is supplied by the
//! caller when a state machine is constructed.

/// Bit size of the prime factors of a Paillier modulus.
///
/// The product of two 1024-bit primes will produce 2048-bit Pallier moduli.
pub(crate) const PRIME_BITS: usize = 1024;

/// Exact bit length a Paillier modulus must have to be accepted from a peer.
pub(crate) const PAILLIER_MODULUS_BITS: usize = 2 * PRIME_BITS;

/// Number of `N`-th roots in the non-interactive Paillier key-correctness
/// proof (`M2`).
pub(crate) const CORRECT_KEY_REPETITIONS: usize = 11;

/// Upper bound (exclusive) on the small primes whose product is checked for
/// coprimality with a peer's Paillier modulus.
pub(crate) const SMALL_PRIME_BOUND: usize = 6370;

/// Domain separation salt for the key-correctness mask generation function.
pub(crate) const CORRECT_KEY_SALT: &[u8] = b"two-party-ecdsa/correct-key";

/// Output size of the hash used by the mask generation function, in bits.
pub(crate) const MGF_DIGEST_BITS: usize = 256;

/// Composite discrete-log proof: statistical security of the challenge.
pub(crate) const COMPOSITE_DLOG_K: usize = 128;

/// Composite discrete-log proof: slack on the challenge.
pub(crate) const COMPOSITE_DLOG_K_PRIME: usize = 128;

/// Composite discrete-log proof: bit size of the secret exponent.
pub(crate) const COMPOSITE_DLOG_S: usize = 256;

/// Bit size of the secret exponent `ξ` linking the auxiliary generators
/// `h1` and `h2`.
pub(crate) const AUX_SECRET_BITS: usize = 256;

/// Number of random bytes in a commitment blind factor.
pub(crate) const BLIND_FACTOR_BYTES: usize = 32;

/// Byte size of scalars, message digests and coordinates on secp256k1.
pub(crate) const SCALAR_BYTES: usize = 32;

/// Version tag written into every state-machine snapshot.
pub(crate) const SNAPSHOT_VERSION: u32 = 1;
