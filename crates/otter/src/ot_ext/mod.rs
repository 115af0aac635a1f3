//! ALSZ13 OT extension protocol.
//!
//! Promotes [`BASE_OT_COUNT`] base OTs run in the reverse direction into an
//! arbitrary multiple-of-128 number of 1-out-of-2 OTs on blocks. The
//! extension receiver plays the base OT sender: it transfers one of two
//! column seeds per base OT, sends the correction matrix `P = T ^ U ^ r`,
//! and both parties derive the final keys by hashing the rows of the
//! transposed matrices.
use crate::base_ot;
use crate::traits::{BaseOTReceiver, BaseOTSender, Error};
use crate::util::aes_hash::FIXED_KEY_HASH;
use crate::util::aes_rng::AesRng;
use crate::util::block::sparse_bytes_to_blocks;
use crate::util::tokio_rayon::spawn_compute;
use crate::util::transpose::transpose_blocks;
use crate::util::Block;
use crate::BASE_OT_COUNT;
use bitvec::bitvec;
use bitvec::slice::BitSlice;
use bytemuck::cast_slice_mut;
use rand::{CryptoRng, Rng, RngCore};
use rand_core::SeedableRng;
use rayon::prelude::*;
use remoc::RemoteSend;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Blocks per matrix row after transposition. The row width is the number of
/// base OTs, which is exactly one block.
const ROW_BLOCKS: usize = BASE_OT_COUNT / 128;

pub struct Sender<BaseOT> {
    base_ot: BaseOT,
}

pub struct Receiver<BaseOT> {
    base_ot: BaseOT,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum ExtOTMsg<BaseOTMsg: RemoteSend = base_ot::BaseOTMsg> {
    // Workaround for compiler bug,
    // see https://github.com/serde-rs/serde/issues/1296#issuecomment-394056188
    #[serde(bound = "")]
    BaseOTChannel(net_channel::Receiver<BaseOTMsg>),
    EncryptedSeeds(Vec<Block>, Vec<Block>),
    CorrectionMatrix(Vec<Block>),
    MaskedPayloads(Vec<Block>, Vec<Block>),
}

impl<BaseOT> Sender<BaseOT>
where
    BaseOT: BaseOTReceiver + Send,
    BaseOT::Msg: RemoteSend + Debug,
{
    /// Run the extension setup, deriving `count` random OT key pairs.
    ///
    /// Together with the keys returned by
    /// [`Receiver::receive_random`](`Receiver::receive_random`) the output
    /// satisfies `receiver_key[i] == keys[i][choice[i]]`.
    #[tracing::instrument(level = "debug", skip(self, rng, sender, receiver))]
    pub async fn send_random<RNG>(
        &mut self,
        count: usize,
        rng: &mut RNG,
        sender: &net_channel::Sender<ExtOTMsg<BaseOT::Msg>>,
        receiver: &mut net_channel::Receiver<ExtOTMsg<BaseOT::Msg>>,
    ) -> Result<Vec<[Block; 2]>, Error<ExtOTMsg<BaseOT::Msg>>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        assert_eq!(
            count % BASE_OT_COUNT,
            0,
            "Number of OT extensions must be a multiple of 128"
        );
        let col_blocks = count / 128;
        let (base_keys, base_choices) = {
            let (base_sender, base_remote_receiver) = net_channel::channel();
            sender
                .send(ExtOTMsg::BaseOTChannel(base_remote_receiver))
                .await
                .map_err(Error::Send)?;
            let msg = receiver
                .recv()
                .await
                .map_err(Error::Receive)?
                .ok_or(Error::UnexpectedTermination)?;
            let base_receiver = match msg {
                ExtOTMsg::BaseOTChannel(receiver) => receiver,
                msg => return Err(Error::WrongOrder(msg)),
            };
            let mut base_choices = bitvec![0; BASE_OT_COUNT];
            rng.fill(base_choices.as_raw_mut_slice());
            let base_keys = self
                .base_ot
                .receive(&base_choices, rng, base_sender, base_receiver)
                .await
                .map_err(|err| Error::BaseOT(Box::new(err)))?;
            (base_keys, base_choices)
        };
        tracing::debug!("Obtained {BASE_OT_COUNT} column keys via base OT");

        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let (c0, c1) = match msg {
            ExtOTMsg::EncryptedSeeds(c0, c1) => (c0, c1),
            msg => return Err(Error::WrongOrder(msg)),
        };
        if c0.len() != BASE_OT_COUNT || c1.len() != BASE_OT_COUNT {
            return Err(Error::ProtocolDeviation);
        }
        // decrypt the seed chosen by our base OT selection bit
        let q_seeds: Vec<Block> = base_keys
            .into_iter()
            .zip(base_choices.iter().by_vals())
            .zip(c0.into_iter().zip(c1))
            .map(|((key, s), (c0, c1))| if s { c1 ^ key } else { c0 ^ key })
            .collect();

        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let p_mat = match msg {
            ExtOTMsg::CorrectionMatrix(p) => p,
            msg => return Err(Error::WrongOrder(msg)),
        };
        if p_mat.len() != BASE_OT_COUNT * col_blocks {
            return Err(Error::ProtocolDeviation);
        }
        tracing::debug!("Received correction matrix");

        let s_star: Vec<Block> = choice_blocks(&base_choices);
        let ots = spawn_compute(move || {
            // expand Q column-wise, a distinct PRG per column seed
            let mut q_mat = vec![Block::zero(); BASE_OT_COUNT * col_blocks];
            q_mat
                .par_chunks_exact_mut(col_blocks)
                .zip(q_seeds)
                .for_each(|(column, seed)| {
                    let mut prg = AesRng::from_seed(seed);
                    prg.fill_bytes(cast_slice_mut(column));
                });
            // the matrices are column-major; transposing yields rows of
            // BASE_OT_COUNT bits
            let q_t = transpose_blocks(&q_mat, BASE_OT_COUNT, count);
            let p_t = transpose_blocks(&p_mat, BASE_OT_COUNT, count);
            q_t.par_chunks_exact(ROW_BLOCKS)
                .zip(p_t.par_chunks_exact(ROW_BLOCKS))
                .map(|(q_row, p_row)| {
                    // rows where the receiver chose 1 carry an extra r*, the
                    // selection-masked correction removes it
                    let adjusted: Vec<Block> = q_row
                        .iter()
                        .zip(p_row)
                        .zip(&s_star)
                        .map(|((&q, &p), &s)| q ^ (p & s))
                        .collect();
                    let k0 = FIXED_KEY_HASH.compress_blocks(&adjusted);
                    let shifted: Vec<Block> = adjusted
                        .iter()
                        .zip(&s_star)
                        .map(|(&q, &s)| q ^ s)
                        .collect();
                    let k1 = FIXED_KEY_HASH.compress_blocks(&shifted);
                    [k0, k1]
                })
                .collect()
        })
        .await;
        Ok(ots)
    }

    /// Obliviously transfer one block of every `(m0[i], m1[i])` pair.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn send<RNG>(
        &mut self,
        m0: &[Block],
        m1: &[Block],
        rng: &mut RNG,
        sender: &net_channel::Sender<ExtOTMsg<BaseOT::Msg>>,
        receiver: &mut net_channel::Receiver<ExtOTMsg<BaseOT::Msg>>,
    ) -> Result<(), Error<ExtOTMsg<BaseOT::Msg>>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        assert_eq!(m0.len(), m1.len(), "message vectors must have equal length");
        let keys = self.send_random(m0.len(), rng, sender, receiver).await?;
        let (c0, c1) = m0
            .iter()
            .zip(m1)
            .zip(keys)
            .map(|((&m0, &m1), [k0, k1])| (m0 ^ k0, m1 ^ k1))
            .unzip();
        sender
            .send(ExtOTMsg::MaskedPayloads(c0, c1))
            .await
            .map_err(Error::Send)?;
        tracing::debug!("Sent masked payloads");
        Ok(())
    }
}

impl<BaseOT> Receiver<BaseOT>
where
    BaseOT: BaseOTSender + Send,
    BaseOT::Msg: RemoteSend + Debug,
{
    /// Run the extension setup, deriving one random OT key per choice bit.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn receive_random<RNG>(
        &mut self,
        choices: &BitSlice,
        rng: &mut RNG,
        sender: &net_channel::Sender<ExtOTMsg<BaseOT::Msg>>,
        receiver: &mut net_channel::Receiver<ExtOTMsg<BaseOT::Msg>>,
    ) -> Result<Vec<Block>, Error<ExtOTMsg<BaseOT::Msg>>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        assert_eq!(
            choices.len() % BASE_OT_COUNT,
            0,
            "Number of OT extensions must be a multiple of 128"
        );
        let count = choices.len();
        let col_blocks = count / 128;

        // per-column seeds and the key pairs that will encrypt them
        let t_seeds: Vec<Block> = (0..BASE_OT_COUNT).map(|_| rng.gen()).collect();
        let u_seeds: Vec<Block> = (0..BASE_OT_COUNT).map(|_| rng.gen()).collect();
        let key_pairs: Vec<[Block; 2]> = (0..BASE_OT_COUNT).map(|_| rng.gen()).collect();

        {
            let (base_sender, base_remote_receiver) = net_channel::channel();
            sender
                .send(ExtOTMsg::BaseOTChannel(base_remote_receiver))
                .await
                .map_err(Error::Send)?;
            let msg = receiver
                .recv()
                .await
                .map_err(Error::Receive)?
                .ok_or(Error::UnexpectedTermination)?;
            let base_receiver = match msg {
                ExtOTMsg::BaseOTChannel(receiver) => receiver,
                msg => return Err(Error::WrongOrder(msg)),
            };
            self.base_ot
                .send(&key_pairs, rng, base_sender, base_receiver)
                .await
                .map_err(|err| Error::BaseOT(Box::new(err)))?;
        }
        tracing::debug!("Transferred {BASE_OT_COUNT} column key pairs via base OT");

        let c0 = key_pairs
            .iter()
            .zip(&t_seeds)
            .map(|([k0, _], &t_seed)| *k0 ^ t_seed)
            .collect();
        let c1 = key_pairs
            .iter()
            .zip(&u_seeds)
            .map(|([_, k1], &u_seed)| *k1 ^ u_seed)
            .collect();
        sender
            .send(ExtOTMsg::EncryptedSeeds(c0, c1))
            .await
            .map_err(Error::Send)?;
        tracing::debug!("Sent encrypted column seeds");

        let r_star = choice_blocks(choices);
        let (t_mat, p_mat) = spawn_compute(move || {
            let mut t_mat = vec![Block::zero(); BASE_OT_COUNT * col_blocks];
            let mut p_mat = vec![Block::zero(); BASE_OT_COUNT * col_blocks];
            t_mat
                .par_chunks_exact_mut(col_blocks)
                .zip(p_mat.par_chunks_exact_mut(col_blocks))
                .zip(t_seeds.into_par_iter().zip(u_seeds))
                .for_each(|((t_col, p_col), (t_seed, u_seed))| {
                    let mut prg = AesRng::from_seed(t_seed);
                    prg.fill_bytes(cast_slice_mut(t_col));
                    // U is ephemeral, it only feeds the correction column
                    let mut prg = AesRng::from_seed(u_seed);
                    let u_col = prg.random_blocks(col_blocks);
                    for (((p, &t), &u), &r) in p_col
                        .iter_mut()
                        .zip(t_col.iter())
                        .zip(&u_col)
                        .zip(&r_star)
                    {
                        *p = t ^ u ^ r;
                    }
                });
            (t_mat, p_mat)
        })
        .await;
        sender
            .send(ExtOTMsg::CorrectionMatrix(p_mat))
            .await
            .map_err(Error::Send)?;
        tracing::debug!("Sent correction matrix");

        let keys = spawn_compute(move || {
            let t_t = transpose_blocks(&t_mat, BASE_OT_COUNT, count);
            t_t.par_chunks_exact(ROW_BLOCKS)
                .map(|row| FIXED_KEY_HASH.compress_blocks(row))
                .collect()
        })
        .await;
        Ok(keys)
    }

    /// Receive one block per choice bit, `m[choices[i]][i]`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn receive<RNG>(
        &mut self,
        choices: &BitSlice,
        rng: &mut RNG,
        sender: &net_channel::Sender<ExtOTMsg<BaseOT::Msg>>,
        receiver: &mut net_channel::Receiver<ExtOTMsg<BaseOT::Msg>>,
    ) -> Result<Vec<Block>, Error<ExtOTMsg<BaseOT::Msg>>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let keys = self.receive_random(choices, rng, sender, receiver).await?;
        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let (c0, c1) = match msg {
            ExtOTMsg::MaskedPayloads(c0, c1) => (c0, c1),
            msg => return Err(Error::WrongOrder(msg)),
        };
        if c0.len() != choices.len() || c1.len() != choices.len() {
            return Err(Error::ProtocolDeviation);
        }
        let out = choices
            .iter()
            .by_vals()
            .zip(keys)
            .zip(c0.into_iter().zip(c1))
            .map(|((r, key), (c0, c1))| if r { c1 ^ key } else { c0 ^ key })
            .collect();
        Ok(out)
    }
}

/// Pack a bit slice into its dense block representation.
fn choice_blocks(choices: &BitSlice) -> Vec<Block> {
    let sparse: Vec<u8> = choices.iter().by_vals().map(u8::from).collect();
    sparse_bytes_to_blocks(&sparse)
}

impl<BaseOt> Sender<BaseOt> {
    pub fn new(base_ot_receiver: BaseOt) -> Self {
        Self {
            base_ot: base_ot_receiver,
        }
    }
}

impl<BaseOt> Receiver<BaseOt> {
    pub fn new(base_ot_sender: BaseOt) -> Self {
        Self {
            base_ot: base_ot_sender,
        }
    }
}

impl Default for Sender<base_ot::Receiver> {
    fn default() -> Self {
        Sender::new(base_ot::Receiver)
    }
}

impl Default for Receiver<base_ot::Sender> {
    fn default() -> Self {
        Receiver::new(base_ot::Sender)
    }
}
