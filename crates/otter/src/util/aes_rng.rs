//! PRG based on AES-128 in counter mode.
//!
//! The construction follows the fixed-key AES RNGs common in OT
//! implementations: the seed keys the cipher and the stream is the
//! encryption of an incrementing counter. The same seed and starting counter
//! produce the same stream on every host.
use crate::util::block::{blocks_to_sparse_bytes, Block, BLOCK_BITS};

use aes::cipher::{crypto_common, BlockEncrypt, KeyInit};
use aes::Aes128;

use bytemuck::cast_slice_mut;
use rand::{CryptoRng, Error, Rng, RngCore, SeedableRng};
use rand_core::block::{BlockRng, BlockRngCore};

#[derive(Clone, Debug)]
pub struct AesRng(BlockRng<AesRngCore>);

impl RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl SeedableRng for AesRng {
    type Seed = <AesRngCore as SeedableRng>::Seed;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRng(BlockRng::<AesRngCore>::from_seed(seed))
    }
    #[inline]
    fn from_rng<R: RngCore>(rng: R) -> Result<Self, Error> {
        BlockRng::<AesRngCore>::from_rng(rng).map(AesRng)
    }
}

impl CryptoRng for AesRng {}

impl AesRng {
    /// Create a new random number generator using a random seed from
    /// `rand::random`.
    #[inline]
    pub fn new() -> Self {
        let seed = rand::random::<Block>();
        AesRng::from_seed(seed)
    }

    /// Create a generator whose counter starts at `counter` instead of zero.
    #[inline]
    pub fn from_seed_and_counter(seed: Block, counter: u128) -> Self {
        AesRng(BlockRng::new(AesRngCore {
            aes: Aes128::new(&seed.to_le_bytes().into()),
            state: counter,
        }))
    }

    /// Re-key the generator in place and reset its counter.
    #[inline]
    pub fn reseed(&mut self, key: Block, counter: u128) {
        *self = AesRng::from_seed_and_counter(key, counter);
    }

    /// Create a new RNG using a random seed from this one.
    #[inline]
    pub fn fork(&mut self) -> Self {
        let seed = self.gen::<Block>();
        AesRng::from_seed(seed)
    }

    /// Expand `n` pseudorandom blocks.
    pub fn random_blocks(&mut self, n: usize) -> Vec<Block> {
        let mut blocks = vec![Block::zero(); n];
        self.fill_bytes(cast_slice_mut(&mut blocks));
        blocks
    }

    /// Expand `n` pseudorandom bytes.
    pub fn random_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut bytes = vec![0_u8; n];
        self.fill_bytes(&mut bytes);
        bytes
    }

    /// Expand `n` pseudorandom bits in sparse form, one 0/1 byte per bit.
    pub fn random_sparse_bits(&mut self, n: usize) -> Vec<u8> {
        let blocks = self.random_blocks((n + BLOCK_BITS - 1) / BLOCK_BITS);
        let mut bits = blocks_to_sparse_bytes(&blocks);
        bits.truncate(n);
        bits
    }
}

impl Default for AesRng {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// The core of `AesRng`, used with `BlockRng`.
#[derive(Clone)]
pub struct AesRngCore {
    aes: Aes128,
    state: u128,
}

impl std::fmt::Debug for AesRngCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRngCore {{}}")
    }
}

impl BlockRngCore for AesRngCore {
    type Item = u32;
    // This is equivalent to `[Block; 8]`, but we need to use `u32` to be
    // compatible with `RngCore`.
    type Results = [u32; 32];

    // Compute `E(state)` eight times, where `state` is a counter.
    #[inline]
    fn generate(&mut self, results: &mut Self::Results) {
        // Safety: GenericArray<u8, 16> is layout compatible with [u8; 16],
        // and [u32; 32] with [[u8; 16]; 8]
        let blocks = unsafe { &mut *(results as *mut _ as *mut [crypto_common::Block<Aes128>; 8]) };
        blocks.iter_mut().for_each(|blk| {
            *blk = self.state.to_le_bytes().into();
            self.state = self.state.wrapping_add(1);
        });
        self.aes.encrypt_blocks(blocks);
    }
}

impl SeedableRng for AesRngCore {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        let aes = Aes128::new(&seed.to_le_bytes().into());
        AesRngCore {
            aes,
            state: Default::default(),
        }
    }
}

impl CryptoRng for AesRngCore {}

impl From<AesRngCore> for AesRng {
    #[inline]
    fn from(core: AesRngCore) -> Self {
        AesRng(BlockRng::new(core))
    }
}
