//! NIZK proof of discrete log equality.
//!
//! Chaum-Pedersen Sigma protocol for the relation `h1 = g1^w, h2 = g2^w`
//! over Ristretto, made non-interactive with the Fiat-Shamir transform. The
//! challenge binds the instance, both commitments and a caller supplied
//! transcript prefix.
use blake2::{Blake2b512, Digest};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance {
    pub g1: RistrettoPoint,
    pub h1: RistrettoPoint,
    pub g2: RistrettoPoint,
    pub h2: RistrettoPoint,
}

#[derive(Debug, Clone, Copy)]
pub struct Witness {
    pub w: Scalar,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    pub a1: RistrettoPoint,
    pub a2: RistrettoPoint,
    pub z: Scalar,
}

impl Instance {
    /// Build the instance `(g1, g1^w, g2, g2^w)` for a witness.
    pub fn for_witness(g1: RistrettoPoint, g2: RistrettoPoint, witness: &Witness) -> Self {
        Self {
            g1,
            h1: g1 * witness.w,
            g2,
            h2: g2 * witness.w,
        }
    }
}

/// Prove knowledge of `w` with `h1 = g1^w` and `h2 = g2^w`.
pub fn prove<RNG>(
    instance: &Instance,
    witness: &Witness,
    transcript: &[u8],
    rng: &mut RNG,
) -> Proof
where
    RNG: RngCore + CryptoRng,
{
    let a = Scalar::random(rng);
    let a1 = instance.g1 * a;
    let a2 = instance.g2 * a;
    let e = challenge(instance, &a1, &a2, transcript);
    let z = a + e * witness.w;
    Proof { a1, a2, z }
}

/// Check a proof. A failed check is a regular `false`, not an error.
#[must_use]
pub fn verify(instance: &Instance, transcript: &[u8], proof: &Proof) -> bool {
    let e = challenge(instance, &proof.a1, &proof.a2, transcript);
    instance.g1 * proof.z == proof.a1 + instance.h1 * e
        && instance.g2 * proof.z == proof.a2 + instance.h2 * e
}

/// Fiat-Shamir challenge `H(g1 || g2 || h1 || h2 || A1 || A2 || transcript)`.
fn challenge(
    instance: &Instance,
    a1: &RistrettoPoint,
    a2: &RistrettoPoint,
    transcript: &[u8],
) -> Scalar {
    let mut hasher = Blake2b512::new();
    for point in [
        &instance.g1,
        &instance.g2,
        &instance.h1,
        &instance.h2,
        a1,
        a2,
    ] {
        hasher.update(point.compress().as_bytes());
    }
    hasher.update(transcript);
    Scalar::from_hash(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_instance(rng: &mut StdRng) -> (Instance, Witness) {
        let witness = Witness {
            w: Scalar::random(rng),
        };
        let g1 = RistrettoPoint::random(rng);
        let g2 = RistrettoPoint::random(rng);
        (Instance::for_witness(g1, g2, &witness), witness)
    }

    #[test]
    fn completeness() {
        let mut rng = StdRng::seed_from_u64(11);
        let (instance, witness) = random_instance(&mut rng);
        let proof = prove(&instance, &witness, b"test transcript", &mut rng);
        assert!(verify(&instance, b"test transcript", &proof));
    }

    #[test]
    fn tampered_instance_rejected() {
        let mut rng = StdRng::seed_from_u64(12);
        let (instance, witness) = random_instance(&mut rng);
        let proof = prove(&instance, &witness, b"", &mut rng);
        assert!(verify(&instance, b"", &proof));

        let mut tampered = instance;
        tampered.h2 += RISTRETTO_BASEPOINT_POINT;
        assert!(!verify(&tampered, b"", &proof));
    }

    #[test]
    fn transcript_binds_proof() {
        let mut rng = StdRng::seed_from_u64(13);
        let (instance, witness) = random_instance(&mut rng);
        let proof = prove(&instance, &witness, b"context a", &mut rng);
        assert!(!verify(&instance, b"context b", &proof));
    }

    #[test]
    fn proof_serialization_round_trip() {
        let mut rng = StdRng::seed_from_u64(14);
        let (instance, witness) = random_instance(&mut rng);
        let proof = prove(&instance, &witness, b"", &mut rng);
        let bytes = bincode::serialize(&proof).unwrap();
        let restored: Proof = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, proof);
        assert!(verify(&instance, b"", &restored));
    }
}
