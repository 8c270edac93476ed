// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use criterion::{criterion_group, criterion_main, Criterion};

use rand::{rngs::OsRng, CryptoRng, RngCore};
use two_party_ecdsa::{
    errors::{InternalError, Result},
    Message, P1KeyGen, P1KeyShare, P1Signature, P2KeyGen, P2KeyShare, P2Signature,
    PaillierDecryptionKey, ProtocolParticipant, SessionId,
};

/// Passes messages back and forth between the two parties until both have
/// produced an output. Party one always speaks first.
fn run_two_party<R, A, B>(rng: &mut R, p1: &mut A, p2: &mut B) -> Result<(A::Output, B::Output)>
where
    R: RngCore + CryptoRng,
    A: ProtocolParticipant,
    B: ProtocolParticipant,
{
    let mut p1_output = None;
    let mut p2_output = None;
    let mut message: Option<Message> = None;
    let mut p1_turn = true;
    loop {
        if p1_turn {
            let (output, next) = p1.process_message(rng, message.as_ref())?.into_parts();
            p1_output = p1_output.or(output);
            message = next;
        } else {
            let (output, next) = p2.process_message(rng, message.as_ref())?.into_parts();
            p2_output = p2_output.or(output);
            message = next;
        }
        p1_turn = !p1_turn;

        match (p1_output.take(), p2_output.take()) {
            (Some(a), Some(b)) => return Ok((a, b)),
            (a, b) => {
                p1_output = a;
                p2_output = b;
            }
        }
        if message.is_none() {
            return Err(InternalError::InternalInvariantFailed);
        }
    }
}

fn run_keygen(
    paillier_keypair: &PaillierDecryptionKey,
    aux_keypair: &PaillierDecryptionKey,
) -> Result<(P1KeyShare, P2KeyShare)> {
    let mut rng = OsRng;
    let sid = SessionId::new("keygen-benchmark");
    let mut p1 = P1KeyGen::new(sid.clone(), None, &mut rng)?;
    p1.init_with_keypairs(paillier_keypair.clone(), aux_keypair.clone())?;
    let mut p2 = P2KeyGen::new(sid, None, &mut rng)?;
    run_two_party(&mut rng, &mut p1, &mut p2)
}

fn run_sign(p1_share: &P1KeyShare, p2_share: &P2KeyShare) -> Result<()> {
    let mut rng = OsRng;
    let sid = SessionId::new("sign-benchmark");
    let mut digest = [0u8; 32];
    rng.fill_bytes(&mut digest);
    let mut p1 = P1Signature::new(sid.clone(), &digest, p1_share)?;
    let mut p2 = P2Signature::new(sid, &digest, p2_share)?;
    let _ = run_two_party(&mut rng, &mut p1, &mut p2)?;
    Ok(())
}

fn criterion_benchmark(c: &mut Criterion) {
    // Paillier key generation dominates and is benchmarked on its own
    c.bench_function("Paillier keypair generation", |b| {
        b.iter(|| PaillierDecryptionKey::generate().unwrap())
    });

    let paillier_keypair = PaillierDecryptionKey::generate().unwrap();
    let aux_keypair = PaillierDecryptionKey::generate().unwrap();
    c.bench_function("Keygen with pre-generated Paillier keys", |b| {
        b.iter(|| run_keygen(&paillier_keypair, &aux_keypair).unwrap())
    });

    let (p1_share, p2_share) = run_keygen(&paillier_keypair, &aux_keypair).unwrap();
    c.bench_function("Sign", |b| b.iter(|| run_sign(&p1_share, &p2_share).unwrap()));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = criterion_benchmark
}
criterion_main!(benches);
