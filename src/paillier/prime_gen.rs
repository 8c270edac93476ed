// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A fixed pool of 1024-bit primes for tests.
//!
//! Generating fresh 1024-bit primes dominates test run time, so tests draw
//! Paillier factors from this pool instead. The top two bits of every prime
//! are set, so the product of any two of them is exactly 2048 bits.
//! **These primes are public. Never use them outside of tests.**

use super::PaillierDecryptionKey;
use libpaillier::unknown_order::BigNumber;
use rand::{seq::SliceRandom, CryptoRng, RngCore};

const POOL_OF_PRIMES: [&str; 8] = [
    "cec4e5f79e5203549494b1b6241a3378f602407462c933bf6a6ad1cdb501dd0656b0df31a573ecc55109486f2533cb54f31149482167765a75b2e2590a6d76403b454a886a102d5161d3b26ed2b028eb92b707432bdc02dc01e99486f48c219b8ce83769039e1debd94c00e43330184847ce549a92d6cb2abb1a8a28c714c92b",
    "f40164b425e0000eb5ff52830bc4086d4dc5cf3aa0ebd1693ec351d4ccf877bdfdebbfef2fde92d169a43712ae49e349e476c3d1f493e14c315607dfe9de671adcd05763fc8b5b5ebf0953c8940aea09de6433f276f520550d8215bebc0eb4503458f6c6748e31dac2f945846d7060e5fa649d713b309cf5a2b1d0e151ec9495",
    "fa66ba9d35f32e5e78baa08f713f5ffcee851743cef65fb726e71c9066b2141aa4109afd9548d3faa8fd9b89b1af10463a7d7b0262554564fe9898def17a6f34a2f9acf20ab192c24541b15dc3fbb1366d770d1fe414ab1682bc79f926ec7696fd958f65973d008f57c57191bef528ccb6c38d422248742577dfd610e4373bd1",
    "e3a480f5032ec112f965432328224d5c7b191c96f53a56615a3042e4f0ae531f6fc1448f6cb0a7aee0b53c2be7754bff67836323a68048c7831c9370ad7a037182a1c651eafa998a5e410430539cc4bd73a905d056a326204e6cb7a424340d1554c761d268bb1d59d6e7acd7f89a583b77cb95890331b76f87d4a31b5fc47d75",
    "ce906ae7a760d7a3549b5475778ab80f2fa7230ef30f756fad03c8ba4c052837a3eb02b5f7d6555b1c8ca759dcf89f495ad8ae230479cb38c0e6475e932f04a86ea0b8ee85dea24bdb2288d0131278a530cfdf32ee1b86698c19e04360c2718524b069de4e9b98466072041137e2da4f0b4ccfb9e3fab95767fb5ff3144fcafd",
    "dc2acac833a94159957912847e0788c25f20d0e23ed24e05724ea85a84f531c29187141eb8c27f9f2fbad454e4ad1a396a558e7ce9cd4a8f8a3136ddc55277789394e61d1065fde0a37e2a6d26cf5dbae6043914f6494f85e80305a2475a6a3266f15ddd9234c6cec2ce9b0b46d2d036e6df246ad6f3ed9bd7ebb1423d0b85b3",
    "fbd5efbee8bc4b49a6fea20b4089bbacec193ce716e6e23a2852f09b174c3eb09818ff74028712e6ccffd3b93c274b90564de1be59977853393f7bc4aa618933f07350ed9c8ab6dfeadb722b7bdadde1f5460f5e63668a18c9f5fdaf18751a35e5cca0ae4b459d5619503b3787f11bf3acc102ca2bef7d1b56b7ae1232be415f",
    "c53c08fe130f0fe0567c2ae48f55ac47312d6739d63476384b1ab475bc96cdea18dc4359484945f35f2c8bb4bed644ff3a7e2848abdcabbac46f3b244fa3ffc02efeae6c2c4bab1dfe7ec2b22d69c20fd2959dc604f2babf7a90942599fdcb7363819cfacbb05c15359aeea07a03ed44a0ed4aa9fc005cf56b4253a1a7fa8af3",
];

/// Sample a single prime from the pool.
pub(crate) fn get_prime_from_pool_insecure<R: RngCore + CryptoRng>(rng: &mut R) -> BigNumber {
    let hex = POOL_OF_PRIMES.choose(rng).copied().unwrap_or(POOL_OF_PRIMES[0]);
    BigNumber::from_slice(hex::decode(hex).unwrap())
}

/// Sample two distinct primes from the pool.
pub(crate) fn get_prime_pair_from_pool_insecure<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> (BigNumber, BigNumber) {
    let pair: Vec<&&str> = POOL_OF_PRIMES.choose_multiple(rng, 2).collect();
    (
        BigNumber::from_slice(hex::decode(pair[0]).unwrap()),
        BigNumber::from_slice(hex::decode(pair[1]).unwrap()),
    )
}

/// Build a 2048-bit Paillier keypair from two distinct pool primes.
pub(crate) fn paillier_keypair_from_pool_insecure<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> PaillierDecryptionKey {
    let (p, q) = get_prime_pair_from_pool_insecure(rng);
    PaillierDecryptionKey::from_primes(&p, &q).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parameters::PRIME_BITS, utils::bit_length};

    #[test]
    fn pool_primes_have_expected_size() {
        for hex in POOL_OF_PRIMES {
            let p = BigNumber::from_slice(hex::decode(hex).unwrap());
            assert_eq!(bit_length(&p), PRIME_BITS);
            assert!(p.is_prime());
        }
    }
}
