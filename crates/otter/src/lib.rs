//! # Otter
//!
//! Two-party secure computation primitives:
//! - The [Naor-Pinkas](`base_ot`) base OT protocol
//! - The [ALSZ13](`ot_ext`) OT extension protocol
//! - A [cwPRF based private set intersection](`psi`) on Curve25519
//! - A [NIZK proof of discrete log equality](`nizk`)
//! - A [Bloom filter](`filter`) with deterministic salt derivation
//!
//! Protocols communicate over [`net_channel`] channels and are secure against
//! semi-honest adversaries.

use blake2::{
    digest::consts::{U16, U20, U32},
    Blake2b,
};

pub mod base_ot;
pub mod filter;
pub mod nizk;
pub mod ot_ext;
pub mod psi;
pub mod traits;
pub mod util;

pub mod bitvec {
    pub use bitvec::order::Lsb0;
    pub use bitvec::slice::BitSlice;
    pub use bitvec::vec::BitVec;
}

/// The default random oracle. Blake2b with an output of 160 bits.
pub type DefaultRom = Blake2b<U20>;
/// Blake2b random oracle with an output of 128 bits.
pub type Rom128 = Blake2b<U16>;
/// Blake2b random oracle with an output of 256 bits.
pub type Rom256 = Blake2b<U32>;

/// Number of base OTs used to bootstrap the extension.
pub const BASE_OT_COUNT: usize = 128;
