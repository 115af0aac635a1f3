//! Salted multi-hash Bloom filter.
//!
//! The filter derives `ceil(-log2 p)` salted hash functions and a table of
//! `ceil(-1.44 n log2 p)` bits. Salts are deterministic given the filter's
//! random seed, so serialization only needs to persist `(hash_num,
//! random_seed, table_size, bit_table)` and can rebuild the salts on load.
use crate::util::aes_rng::AesRng;
use crate::util::Block;
use blake2::digest::consts::U4;
use blake2::{Blake2b, Digest};
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::{RngCore, SeedableRng};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Blake2b random oracle with a 32 bit output, keyed by a salt.
type Rom32 = Blake2b<U4>;

const HEADER_LEN: usize = 3 * 4;

//00000001 00000010 00000100 00001000 00010000 00100000 01000000 10000000
const BIT_MASK: [u8; 8] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

// A distinct hash function need not be implementation-wise distinct: seeding
// a common keyed hash with different salts is adequate.
const PREDEFINED_SALTS: [u32; 128] = [
    0xAAAAAAAA, 0x55555555, 0x33333333, 0xCCCCCCCC, 0x66666666, 0x99999999, 0xB5B5B5B5, 0x4B4B4B4B,
    0xAA55AA55, 0x55335533, 0x33CC33CC, 0xCC66CC66, 0x66996699, 0x99B599B5, 0xB54BB54B, 0x4BAA4BAA,
    0xAA33AA33, 0x55CC55CC, 0x33663366, 0xCC99CC99, 0x66B566B5, 0x994B994B, 0xB5AAB5AA, 0xAAAAAA33,
    0x555555CC, 0x33333366, 0xCCCCCC99, 0x666666B5, 0x9999994B, 0xB5B5B5AA, 0xFFFFFFFF, 0xFFFF0000,
    0xB823D5EB, 0xC1191CDF, 0xF623AEB3, 0xDB58499F, 0xC8D42E70, 0xB173F616, 0xA91A5967, 0xDA427D63,
    0xB1E8A2EA, 0xF6C0D155, 0x4909FEA3, 0xA68CC6A7, 0xC395E782, 0xA26057EB, 0x0CD5DA28, 0x467C5492,
    0xF15E6982, 0x61C6FAD3, 0x9615E352, 0x6E9E355A, 0x689B563E, 0x0C9831A8, 0x6753C18B, 0xA622689B,
    0x8CA63C47, 0x42CC2884, 0x8E89919B, 0x6EDBD7D3, 0x15B6796C, 0x1D6FDFE4, 0x63FF9092, 0xE7401432,
    0xEFFE9412, 0xAEAEDF79, 0x9F245A31, 0x83C136FC, 0xC3DA4A8C, 0xA5112C8C, 0x5271F491, 0x9A948DAB,
    0xCEE59A8D, 0xB5F525AB, 0x59D13217, 0x24E7C331, 0x697C2103, 0x84B0A460, 0x86156DA9, 0xAEF2AC68,
    0x23243DA5, 0x3F649643, 0x5FA495A8, 0x67710DF8, 0x9A6C499E, 0xDCFB0227, 0x46A43433, 0x1832B07A,
    0xC46AFF3C, 0xB9C8FFF0, 0xC9500467, 0x34431BDF, 0xB652432B, 0xE367F12B, 0x427F4C1B, 0x224C006E,
    0x2E7E5A89, 0x96F99AA5, 0x0BEB452A, 0x2FD87C39, 0x74B2E1FB, 0x222EFD24, 0xF357F60C, 0x440FCB1E,
    0x8BBE030F, 0x6704DC29, 0x1144D12F, 0x948B1355, 0x6D8FD7E9, 0x1C11A014, 0xADD1592F, 0xFB3C712E,
    0xFC77642F, 0xF9C4CE8C, 0x31312FB9, 0x08B0DD79, 0x318FA6E7, 0xC040D23D, 0xC0589AA7, 0x0CA5C075,
    0xF874B172, 0x0CF914D5, 0x784D3280, 0x4E8CFEBC, 0xC569F575, 0xCDB2A091, 0x2CC016B4, 0x5C5F4421,
];

const DEFAULT_RANDOM_SEED: u32 = 0xA5A5_A5A5_u32.wrapping_mul(0xA5A5_A5A5).wrapping_add(1);

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("serialized filter is truncated")]
    Truncated,
    #[error("table size {table_size} disagrees with table of {actual} bytes")]
    TableSize { table_size: u32, actual: usize },
    #[error("Io error persisting filter")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    hash_num: u32,
    random_seed: u32,
    salts: Vec<u32>,
    /// Table size in bits, a multiple of 8.
    table_size: u32,
    bit_table: Vec<u8>,
    inserted: usize,
}

impl BloomFilter {
    /// Filter dimensioned for `projected_n` insertions at false positive
    /// probability `fpp`.
    pub fn new(projected_n: usize, fpp: f64) -> Self {
        Self::with_seed(projected_n, fpp, DEFAULT_RANDOM_SEED)
    }

    /// Like [`new`](`Self::new`) with a caller supplied salt seed, producing
    /// an independent filter instance.
    pub fn with_seed(projected_n: usize, fpp: f64, random_seed: u32) -> Self {
        assert!(fpp > 0.0 && fpp < 1.0, "false positive probability must be in (0, 1)");
        let bits_per_element = -fpp.log2();
        let hash_num = bits_per_element.ceil() as u32;
        let table_size = (projected_n as f64 * 1.44 * bits_per_element).ceil() as u32;
        // round up to whole bytes
        let table_size = (table_size + 7) / 8 * 8;
        Self {
            hash_num,
            random_seed,
            salts: derive_salts(hash_num, random_seed),
            table_size,
            bit_table: vec![0; table_size as usize / 8],
            inserted: 0,
        }
    }

    pub fn insert(&mut self, input: &[u8]) {
        for i in 0..self.hash_num as usize {
            let bit_index = (salted_hash(self.salts[i], input) % self.table_size) as usize;
            self.bit_table[bit_index >> 3] |= BIT_MASK[bit_index & 0x07];
        }
        self.inserted += 1;
    }

    pub fn contains(&self, input: &[u8]) -> bool {
        self.salts.iter().all(|&salt| {
            let bit_index = (salted_hash(salt, input) % self.table_size) as usize;
            self.bit_table[bit_index >> 3] & BIT_MASK[bit_index & 0x07] != 0
        })
    }

    pub fn insert_block(&mut self, block: Block) {
        self.insert(&block.to_le_bytes());
    }

    pub fn contains_block(&self, block: Block) -> bool {
        self.contains(&block.to_le_bytes())
    }

    pub fn insert_point(&mut self, point: &MontgomeryPoint) {
        self.insert(point.as_bytes());
    }

    pub fn contains_point(&self, point: &MontgomeryPoint) -> bool {
        self.contains(point.as_bytes())
    }

    pub fn clear(&mut self) {
        self.bit_table.fill(0);
        self.inserted = 0;
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Serialize as `(hash_num, random_seed, table_size, bit_table)`, all
    /// little-endian. Salts are rebuilt on load.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.bit_table.len());
        out.extend_from_slice(&self.hash_num.to_le_bytes());
        out.extend_from_slice(&self.random_seed.to_le_bytes());
        out.extend_from_slice(&self.table_size.to_le_bytes());
        out.extend_from_slice(&self.bit_table);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        if bytes.len() < HEADER_LEN {
            return Err(FilterError::Truncated);
        }
        let word = |i: usize| {
            u32::from_le_bytes(bytes[i * 4..(i + 1) * 4].try_into().expect("4 byte slice"))
        };
        let hash_num = word(0);
        let random_seed = word(1);
        let table_size = word(2);
        let bit_table = bytes[HEADER_LEN..].to_vec();
        if bit_table.len() != table_size as usize / 8 {
            return Err(FilterError::TableSize {
                table_size,
                actual: bit_table.len(),
            });
        }
        Ok(Self {
            hash_num,
            random_seed,
            salts: derive_salts(hash_num, random_seed),
            table_size,
            bit_table,
            inserted: 0,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FilterError> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        Self::from_bytes(&fs::read(path)?)
    }
}

fn salted_hash(salt: u32, input: &[u8]) -> u32 {
    let mut rom = Rom32::new();
    rom.update(salt.to_le_bytes());
    rom.update(input);
    u32::from_le_bytes(rom.finalize().into())
}

/// The first 128 salts come from the predefined table mixed with the seed,
/// further ones are drawn from a PRG keyed by the seed.
fn derive_salts(hash_num: u32, random_seed: u32) -> Vec<u32> {
    let hash_num = hash_num as usize;
    let mut salts: Vec<u32> = PREDEFINED_SALTS
        .iter()
        .copied()
        .take(hash_num)
        .collect();
    if hash_num <= PREDEFINED_SALTS.len() {
        for i in 0..salts.len() {
            salts[i] = salts[i]
                .wrapping_mul(salts[(i + 3) % salts.len()])
                .wrapping_add(random_seed);
        }
    } else {
        let mut prg = AesRng::from_seed(Block::from(random_seed as u128));
        while salts.len() < hash_num {
            let candidate = prg.next_u32();
            if candidate != 0 && !salts.contains(&candidate) {
                salts.push(candidate);
            }
        }
    }
    salts
}
