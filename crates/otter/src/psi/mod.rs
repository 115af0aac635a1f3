//! cwPRF based private set intersection.
//!
//! Both parties evaluate the commutative weak PRF `F_k(x) = H(x)^k` on
//! Curve25519: `F_k1(F_k2(x)) == F_k2(F_k1(x))`, so after one exchange of
//! blinded points each side can bring the other's set into a comparable
//! form. The sender transmits its second-round values truncated to
//! [`PsiParams::truncate_len`] bytes. The compressed u-coordinates of
//! Curve25519 are statistically close to uniform bit strings, so the
//! truncation bound of SpOT-light (PRTY, CRYPTO'19) applies and keeps the
//! collision probability across all cross pairs below `2^-stat_sec`.
use crate::util::tokio_rayon::spawn_compute;
use crate::util::Block;
use crate::Rom256;
use blake2::Digest;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use remoc::rch::mpsc::{RecvError, SendError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Public parameters of a PSI run. Created once at setup, read-only after.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsiParams {
    /// Statistical security parameter, 40 by default.
    pub stat_sec: usize,
    /// Computational security parameter, 128 by default.
    pub comp_sec: usize,
    pub log_sender_items: usize,
    pub sender_items: usize,
    pub log_receiver_items: usize,
    pub receiver_items: usize,
    /// Bytes kept of each PRF value, `ceil((stat_sec + log|Y| + log|X|) / 8)`.
    pub truncate_len: usize,
}

impl PsiParams {
    /// Parameters for sets of `2^log_sender_items` and
    /// `2^log_receiver_items` elements with the default security levels.
    pub fn new(log_sender_items: usize, log_receiver_items: usize) -> Self {
        Self::with_security(128, 40, log_sender_items, log_receiver_items)
    }

    pub fn with_security(
        comp_sec: usize,
        stat_sec: usize,
        log_sender_items: usize,
        log_receiver_items: usize,
    ) -> Self {
        let truncate_len = (stat_sec + log_sender_items + log_receiver_items + 7) / 8;
        assert!(
            truncate_len <= 32,
            "truncate length exceeds the point encoding"
        );
        Self {
            stat_sec,
            comp_sec,
            log_sender_items,
            sender_items: 1 << log_sender_items,
            log_receiver_items,
            receiver_items: 1 << log_receiver_items,
            truncate_len,
        }
    }

    /// Persist the parameters as field-by-field little-endian binary.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load parameters written by [`save`](`Self::save`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        let params = bincode::deserialize_from(BufReader::new(file))?;
        Ok(params)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub enum PsiMsg {
    SenderPoints(Vec<MontgomeryPoint>),
    ReceiverPoints(Vec<MontgomeryPoint>),
    TruncatedPrf(Vec<Vec<u8>>),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error sending value")]
    Send(#[from] SendError<PsiMsg>),
    #[error("Error receiving value")]
    Receive(#[from] RecvError),
    #[error("Received out of order message")]
    WrongOrder(PsiMsg),
    #[error("The other party terminated the protocol")]
    UnexpectedTermination,
    #[error("The other party deviated from the protocol")]
    ProtocolDeviation,
    #[error("input set has {actual} items, public parameters declare {expected}")]
    InputSize { expected: usize, actual: usize },
    #[error("Io error persisting public parameters")]
    Io(#[from] std::io::Error),
    #[error("Serialization of public parameters failed")]
    Serialize(#[from] bincode::Error),
}

/// Hash an item onto the curve.
fn hash_to_curve(item: Block) -> MontgomeryPoint {
    let digest = Rom256::digest(item.to_le_bytes());
    MontgomeryPoint(digest.into())
}

/// Run the PSI sender on the set `items`. The sender learns nothing about
/// the intersection.
#[tracing::instrument(level = "debug", skip_all, fields(items = items.len()))]
pub async fn send<RNG>(
    params: &PsiParams,
    items: &[Block],
    rng: &mut RNG,
    sender: &net_channel::Sender<PsiMsg>,
    receiver: &mut net_channel::Receiver<PsiMsg>,
) -> Result<(), Error>
where
    RNG: RngCore + CryptoRng + Send,
{
    if items.len() != params.sender_items {
        return Err(Error::InputSize {
            expected: params.sender_items,
            actual: items.len(),
        });
    }
    let k1 = Scalar::random(rng);

    let items = items.to_vec();
    let blinded =
        spawn_compute(move || {
            items
                .par_iter()
                .map(|&y| hash_to_curve(y) * k1)
                .collect::<Vec<_>>()
        })
        .await;
    sender.send(PsiMsg::SenderPoints(blinded)).await?;
    tracing::debug!("Sent blinded sender items");

    let msg = receiver
        .recv()
        .await?
        .ok_or(Error::UnexpectedTermination)?;
    let receiver_points = match msg {
        PsiMsg::ReceiverPoints(points) => points,
        msg => return Err(Error::WrongOrder(msg)),
    };
    if receiver_points.len() != params.receiver_items {
        return Err(Error::ProtocolDeviation);
    }
    tracing::debug!("Received blinded receiver items");

    let truncate_len = params.truncate_len;
    let truncated = spawn_compute(move || {
        receiver_points
            .par_iter()
            .map(|point| (point * k1).to_bytes()[..truncate_len].to_vec())
            .collect::<Vec<_>>()
    })
    .await;
    sender.send(PsiMsg::TruncatedPrf(truncated)).await?;
    tracing::debug!("Sent truncated PRF values");
    Ok(())
}

/// Run the PSI receiver on the set `items`. Returns the intersection in the
/// order of `items`.
#[tracing::instrument(level = "debug", skip_all, fields(items = items.len()))]
pub async fn receive<RNG>(
    params: &PsiParams,
    items: &[Block],
    rng: &mut RNG,
    sender: &net_channel::Sender<PsiMsg>,
    receiver: &mut net_channel::Receiver<PsiMsg>,
) -> Result<Vec<Block>, Error>
where
    RNG: RngCore + CryptoRng + Send,
{
    if items.len() != params.receiver_items {
        return Err(Error::InputSize {
            expected: params.receiver_items,
            actual: items.len(),
        });
    }
    let k2 = Scalar::random(rng);

    let own_items = items.to_vec();
    let blinded =
        spawn_compute(move || {
            own_items
                .par_iter()
                .map(|&x| hash_to_curve(x) * k2)
                .collect::<Vec<_>>()
        })
        .await;

    let msg = receiver
        .recv()
        .await?
        .ok_or(Error::UnexpectedTermination)?;
    let sender_points = match msg {
        PsiMsg::SenderPoints(points) => points,
        msg => return Err(Error::WrongOrder(msg)),
    };
    if sender_points.len() != params.sender_items {
        return Err(Error::ProtocolDeviation);
    }
    sender.send(PsiMsg::ReceiverPoints(blinded)).await?;
    tracing::debug!("Exchanged blinded items");

    let truncate_len = params.truncate_len;
    let prf_set: HashSet<Vec<u8>> = spawn_compute(move || {
        sender_points
            .par_iter()
            .map(|point| (point * k2).to_bytes()[..truncate_len].to_vec())
            .collect()
    })
    .await;

    let msg = receiver
        .recv()
        .await?
        .ok_or(Error::UnexpectedTermination)?;
    let truncated = match msg {
        PsiMsg::TruncatedPrf(values) => values,
        msg => return Err(Error::WrongOrder(msg)),
    };
    if truncated.len() != params.receiver_items
        || truncated.iter().any(|value| value.len() != truncate_len)
    {
        return Err(Error::ProtocolDeviation);
    }
    tracing::debug!("Received truncated PRF values");

    let intersection = items
        .iter()
        .zip(truncated)
        .filter_map(|(&item, value)| prf_set.contains(&value).then_some(item))
        .collect();
    Ok(intersection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    async fn run_psi(
        params: PsiParams,
        sender_items: Vec<Block>,
        receiver_items: Vec<Block>,
    ) -> Vec<Block> {
        let (ch1, ch2) = net_channel::in_memory::new_pair();
        let (s_tx, mut s_rx) = ch1;
        let (r_tx, mut r_rx) = ch2;
        let send_fut = async {
            let mut rng = StdRng::seed_from_u64(1337);
            send(&params, &sender_items, &mut rng, &s_tx, &mut s_rx).await
        };
        let recv_fut = async {
            let mut rng = StdRng::seed_from_u64(7331);
            receive(&params, &receiver_items, &mut rng, &r_tx, &mut r_rx).await
        };
        let (_, intersection) = tokio::try_join!(send_fut, recv_fut).unwrap();
        intersection
    }

    fn random_items(rng: &mut StdRng, n: usize) -> Vec<Block> {
        (0..n).map(|_| rng.gen()).collect()
    }

    #[test]
    fn truncate_len_follows_set_sizes() {
        let params = PsiParams::new(10, 10);
        assert_eq!(params.truncate_len, (40 + 10 + 10 + 7) / 8);
        assert_eq!(params.sender_items, 1024);
        let params = PsiParams::with_security(128, 40, 16, 20);
        assert_eq!(params.truncate_len, (40 + 16 + 20 + 7) / 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn chosen_intersection() {
        let params = PsiParams::new(10, 10);
        let mut rng = StdRng::seed_from_u64(4);
        let mut sender_items = random_items(&mut rng, 1024);
        let mut receiver_items = random_items(&mut rng, 1024);
        // plant exactly 7 common items at scattered positions
        let common: Vec<Block> = random_items(&mut rng, 7);
        for (i, &item) in common.iter().enumerate() {
            sender_items[i * 100] = item;
            receiver_items[i * 37 + 5] = item;
        }
        let intersection = run_psi(params, sender_items, receiver_items.clone()).await;
        assert_eq!(intersection.len(), 7);
        // output preserves the receiver's input order
        let expected: Vec<Block> = receiver_items
            .iter()
            .copied()
            .filter(|item| common.contains(item))
            .collect();
        assert_eq!(intersection, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn identical_sets() {
        let params = PsiParams::with_security(128, 40, 8, 8);
        let mut rng = StdRng::seed_from_u64(5);
        let items = random_items(&mut rng, 256);
        let intersection = run_psi(params, items.clone(), items.clone()).await;
        assert_eq!(intersection, items);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn disjoint_sets() {
        let params = PsiParams::with_security(128, 40, 9, 9);
        let mut rng = StdRng::seed_from_u64(6);
        let sender_items = random_items(&mut rng, 512);
        let receiver_items = random_items(&mut rng, 512);
        let intersection = run_psi(params, sender_items, receiver_items).await;
        assert!(intersection.is_empty());
    }

    #[tokio::test]
    async fn input_size_mismatch_is_fatal() {
        let params = PsiParams::new(4, 4);
        let (ch1, _ch2) = net_channel::in_memory::new_pair::<PsiMsg>();
        let (s_tx, mut s_rx) = ch1;
        let mut rng = StdRng::seed_from_u64(2);
        let items = random_items(&mut rng, 3);
        let err = send(&params, &items, &mut rng, &s_tx, &mut s_rx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InputSize {
                expected: 16,
                actual: 3
            }
        ));
    }

    #[test]
    fn params_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psi.pp");
        let params = PsiParams::new(12, 14);
        params.save(&path).unwrap();
        assert_eq!(PsiParams::load(&path).unwrap(), params);
    }
}
