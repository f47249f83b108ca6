use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Per-system random streams for one outbreak.
///
/// Every stream is keyed by the run seed and the system's name only, so a
/// system sees the same sequence no matter which other systems draw, or in
/// which order the streams are first requested. [`RngManager::rewind`] puts
/// every stream back at its start when a new outbreak begins.
pub struct RngManager {
    seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Drops all draw positions; the next request for any stream starts over.
    pub fn rewind(&mut self) {
        self.streams.clear();
    }

    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let seed = self.seed;
        let inner = self.streams.entry(name.to_string()).or_insert_with(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(stream_id(name));
            rng
        });
        SystemRng { inner }
    }
}

/// FNV-1a over the system name; stable across builds and platforms.
fn stream_id(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl RngCore for SystemRng<'_> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
