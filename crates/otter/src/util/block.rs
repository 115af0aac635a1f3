//! 128 bit Block
use crate::DefaultRom;
use bitvec::order::Lsb0;
use bitvec::store::BitStore;
use bitvec::vec::BitVec;
use blake2::digest::Output;
use blake2::Digest;
use bytemuck::{Pod, Zeroable};
use generic_array::{typenum::U16, GenericArray};
use rand::distributions::{Distribution, Standard};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};
use std::{array, mem};

/// Number of bits in a [`Block`].
pub const BLOCK_BITS: usize = 128;

#[derive(Pod, Zeroable, Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[repr(C, align(16))]
pub struct Block {
    data: u128,
}

impl Block {
    /// Block with all bits set to 0.
    pub const fn zero() -> Self {
        Self { data: 0 }
    }

    /// Block with only the least significant bit set.
    pub const fn one() -> Self {
        Self { data: 1 }
    }

    /// Block where every bit is set to `1`.
    pub const fn all_ones() -> Self {
        Self { data: u128::MAX }
    }

    /// Least significant bit of the block.
    pub fn lsb(&self) -> bool {
        *self & Block::one() == Block::one()
    }

    /// Bit `idx` of the block, LSB first.
    pub fn bit(&self, idx: usize) -> bool {
        debug_assert!(idx < BLOCK_BITS);
        (self.data >> idx) & 1 == 1
    }

    /// Compute a hash of the Block using the [`DefaultRom`](`DefaultRom`) random oracle.
    pub fn rom_hash(&self) -> Output<DefaultRom> {
        DefaultRom::digest(self.data.to_le_bytes())
    }

    /// Convert the block to bytes in little-endian order (the dense form).
    pub fn to_le_bytes(self) -> [u8; mem::size_of::<u128>()] {
        self.data.to_le_bytes()
    }

    /// Convert bytes in little-endian order into a block.
    pub fn from_le_bytes(bytes: [u8; mem::size_of::<u128>()]) -> Self {
        Self {
            data: u128::from_le_bytes(bytes),
        }
    }

    /// Expand the block into its sparse form: one byte per bit, LSB first.
    pub fn to_sparse_bytes(self) -> [u8; BLOCK_BITS] {
        let mut out = [0_u8; BLOCK_BITS];
        for (idx, byte) in out.iter_mut().enumerate() {
            *byte = ((self.data >> idx) & 1) as u8;
        }
        out
    }

    /// Pack a sparse bit vector of length 128 into a block. Every byte of
    /// `bits` must be 0 or 1.
    pub fn from_sparse_bytes(bits: &[u8]) -> Self {
        assert_eq!(bits.len(), BLOCK_BITS, "sparse form must have one byte per bit");
        let mut data = 0_u128;
        for (idx, &bit) in bits.iter().enumerate() {
            debug_assert!(bit <= 1);
            data |= (bit as u128) << idx;
        }
        Self { data }
    }
}

/// Expand a slice of blocks into the sparse form, one byte per bit.
pub fn blocks_to_sparse_bytes(blocks: &[Block]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks.len() * BLOCK_BITS);
    for block in blocks {
        out.extend_from_slice(&block.to_sparse_bytes());
    }
    out
}

/// Pack a sparse bit vector into blocks. The length must be a multiple of 128.
pub fn sparse_bytes_to_blocks(bits: &[u8]) -> Vec<Block> {
    assert_eq!(
        bits.len() % BLOCK_BITS,
        0,
        "sparse bit vector length must be a multiple of 128"
    );
    bits.chunks_exact(BLOCK_BITS)
        .map(Block::from_sparse_bytes)
        .collect()
}

impl Distribution<Block> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block { data: rng.gen() }
    }
}

impl From<u32> for Block {
    fn from(val: u32) -> Self {
        Self { data: val.into() }
    }
}

impl From<u64> for Block {
    fn from(val: u64) -> Self {
        Self { data: val.into() }
    }
}

impl From<usize> for Block {
    fn from(val: usize) -> Self {
        Self {
            data: val
                .try_into()
                .expect("This library only works on platforms with a pointer size <= 128 bits"),
        }
    }
}

impl From<u128> for Block {
    fn from(val: u128) -> Self {
        Self { data: val }
    }
}

impl From<Block> for u128 {
    fn from(block: Block) -> Self {
        block.data
    }
}

impl<'a, T: BitStore + Pod> TryFrom<&'a BitVec<T, Lsb0>> for Block {
    type Error = array::TryFromSliceError;

    fn try_from(value: &'a BitVec<T, Lsb0>) -> Result<Self, Self::Error> {
        let bytes = bytemuck::cast_slice(value.as_raw_slice()).try_into()?;
        Ok(Block::from_le_bytes(bytes))
    }
}

impl TryFrom<&[u8]> for Block {
    type Error = array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let arr = value.try_into()?;
        Ok(Block::from_le_bytes(arr))
    }
}

impl From<GenericArray<u8, U16>> for Block {
    fn from(arr: GenericArray<u8, U16>) -> Self {
        Block::from_le_bytes(arr.into())
    }
}

impl From<Block> for GenericArray<u8, U16> {
    fn from(block: Block) -> Self {
        block.to_le_bytes().into()
    }
}

impl BitXor for Block {
    type Output = Block;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Block {
            data: self.data ^ rhs.data,
        }
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.data ^= rhs.data;
    }
}

impl BitOr for Block {
    type Output = Block;

    fn bitor(self, rhs: Self) -> Self::Output {
        Block {
            data: self.data | rhs.data,
        }
    }
}

impl BitOrAssign for Block {
    fn bitor_assign(&mut self, rhs: Self) {
        self.data |= rhs.data;
    }
}

impl BitAnd for Block {
    type Output = Block;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self {
            data: self.data & rhs.data,
        }
    }
}

impl BitAndAssign for Block {
    fn bitand_assign(&mut self, rhs: Self) {
        self.data &= rhs.data;
    }
}

impl Not for Block {
    type Output = Block;

    fn not(self) -> Self::Output {
        Self { data: !self.data }
    }
}

impl AsMut<[u8]> for Block {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }
}
