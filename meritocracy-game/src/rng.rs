//! Deterministic random streams used during settlement.
use hmac::{Hmac, Mac};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

use crate::constants::{RNG_TAG_NOISE, RNG_TAG_TIE_BREAK};

/// Independent streams for tie-breaking and noise, derived from one seed.
///
/// Keeping the streams apart means switching the noise strategy never
/// changes the tie-break draws of the raw ranking.
#[derive(Debug, Clone)]
pub struct SettlementRng {
    seed: u64,
    tie_break: CountingRng<ChaCha20Rng>,
    noise: CountingRng<ChaCha20Rng>,
}

impl SettlementRng {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            tie_break: CountingRng::new(derive_stream_seed(seed, RNG_TAG_TIE_BREAK)),
            noise: CountingRng::new(derive_stream_seed(seed, RNG_TAG_NOISE)),
        }
    }

    /// Construct the bundle from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_user_seed(rand::random())
    }

    /// Seed the bundle was derived from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Access the tie-break stream.
    pub const fn tie_break(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.tie_break
    }

    /// Access the noise stream.
    pub const fn noise(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.noise
    }

    /// Borrow both streams at once.
    pub const fn split(
        &mut self,
    ) -> (&mut CountingRng<ChaCha20Rng>, &mut CountingRng<ChaCha20Rng>) {
        (&mut self.tie_break, &mut self.noise)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_streams() {
        let mut a = SettlementRng::from_user_seed(7);
        let mut b = SettlementRng::from_user_seed(7);
        assert_eq!(a.tie_break().next_u64(), b.tie_break().next_u64());
        assert_eq!(a.noise().next_u64(), b.noise().next_u64());
    }

    #[test]
    fn streams_are_domain_separated() {
        let mut rng = SettlementRng::from_user_seed(7);
        let tie = rng.tie_break().next_u64();
        let noise = rng.noise().next_u64();
        assert_ne!(tie, noise);
    }

    #[test]
    fn draws_are_counted_per_stream() {
        let mut rng = SettlementRng::from_user_seed(1);
        rng.tie_break().next_u64();
        rng.tie_break().next_u32();
        assert_eq!(rng.tie_break().draws(), 2);
        assert_eq!(rng.noise().draws(), 0);
        assert_eq!(rng.seed(), 1);
    }
}
