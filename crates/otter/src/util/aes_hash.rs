//! Correlation robust AES hash.
//!
//! This implementation of a correlation robust AES hash function
//! is based on the findings of <https://eprint.iacr.org/2019/074>.
use crate::util::Block;
use aes::cipher::{BlockEncrypt, Key, KeyInit};
use aes::Aes128;
use once_cell::sync::Lazy;

pub struct AesHash {
    aes: Aes128,
}

impl AesHash {
    /// Create a new `AesHash` with the given key.
    pub fn new(key: &Key<Aes128>) -> Self {
        Self {
            aes: Aes128::new(key),
        }
    }

    /// Compute the correlation robust hash of a block.
    ///
    /// # Warning: only secure in semi-honest setting!
    /// See <https://eprint.iacr.org/2019/074> for details.
    pub fn cr_hash_block(&self, x: Block) -> Block {
        let mut x_enc = x.into();
        self.aes.encrypt_block(&mut x_enc);
        x ^ x_enc.into()
    }

    /// Compress an arbitrary-length block sequence into a single block with a
    /// Davies-Meyer style fold over the keyed permutation. Used to derive the
    /// final OT keys from matrix rows.
    pub fn compress_blocks(&self, blocks: &[Block]) -> Block {
        let mut acc = Block::zero();
        for &block in blocks {
            acc = self.cr_hash_block(acc ^ block);
        }
        acc
    }
}

/// An `AesHash` with a fixed key.
pub static FIXED_KEY_HASH: Lazy<AesHash> = Lazy::new(|| {
    let key = 193502124791825095790518994062991136444_u128
        .to_le_bytes()
        .into();
    AesHash::new(&key)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_single_block_equals_cr_hash() {
        let block = Block::from(42_u128);
        assert_eq!(
            FIXED_KEY_HASH.compress_blocks(&[block]),
            FIXED_KEY_HASH.cr_hash_block(block)
        );
    }

    #[test]
    fn compress_is_order_sensitive() {
        let a = Block::from(1_u128);
        let b = Block::from(2_u128);
        assert_ne!(
            FIXED_KEY_HASH.compress_blocks(&[a, b]),
            FIXED_KEY_HASH.compress_blocks(&[b, a])
        );
    }
}
