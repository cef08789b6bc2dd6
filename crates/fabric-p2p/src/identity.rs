//! Deterministic node identity derived from a seed string.
//!
//! Every node derives its libp2p [`identity::Keypair`] (and therefore its
//! [`PeerId`]) purely from its `host:port` seed — there is no keypair file to
//! generate, persist or lose. Two nodes started with the same seed always
//! produce the same identity, which lets the rest of the fabric dial peers by
//! precomputing their expected `PeerId` from config alone.

use libp2p::identity::{self, PeerId};
use sha2::{Digest, Sha256};

/// An infinite byte stream seeded from a SHA-256 digest of the input seed.
/// Re-hashes its own output whenever the current block is exhausted, so an
/// arbitrarily long key material request never repeats bytes.
struct SeedReader {
    seed: [u8; 32],
    block: [u8; 32],
    pos: usize,
}

impl SeedReader {
    fn new(seed_str: &str) -> Self {
        let seed: [u8; 32] = Sha256::digest(seed_str.as_bytes()).into();
        Self {
            block: seed,
            seed,
            pos: 0,
        }
    }

    fn fill(&mut self, out: &mut [u8]) {
        for byte in out.iter_mut() {
            if self.pos == self.block.len() {
                self.block = Sha256::digest(self.block).into();
                self.pos = 0;
            }
            *byte = self.block[self.pos];
            self.pos += 1;
        }
    }
}

/// Derive an Ed25519 keypair deterministically from `seed` (conventionally
/// `"{host}:{port}"`). The first 32 bytes out of [`SeedReader`] become the
/// Ed25519 secret scalar.
pub fn derive_keypair(seed: &str) -> identity::Keypair {
    let mut reader = SeedReader::new(seed);
    let mut secret_bytes = [0u8; 32];
    reader.fill(&mut secret_bytes);

    let secret = identity::ed25519::SecretKey::try_from_bytes(&mut secret_bytes)
        .expect("SeedReader always produces exactly 32 bytes");
    identity::Keypair::from(identity::ed25519::Keypair::from(secret))
}

/// Derive the [`PeerId`] that would result from [`derive_keypair`] without
/// needing to hold the private key around.
pub fn derive_peer_id(seed: &str) -> PeerId {
    PeerId::from(derive_keypair(seed).public())
}

/// Conventional seed string for a node reachable at `host:port`.
pub fn seed_for(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_derives_same_peer_id() {
        let a = derive_peer_id("10.0.0.1:4001");
        let b = derive_peer_id("10.0.0.1:4001");
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_derive_different_peer_ids() {
        let a = derive_peer_id("10.0.0.1:4001");
        let b = derive_peer_id("10.0.0.2:4001");
        assert_ne!(a, b);
    }

    #[test]
    fn seed_reader_never_repeats_within_one_block() {
        let mut reader = SeedReader::new("node-a:4001");
        let mut out = [0u8; 64];
        reader.fill(&mut out);
        assert_ne!(&out[0..32], &out[32..64]);
    }

    #[test]
    fn seed_for_matches_host_colon_port_convention() {
        assert_eq!(seed_for("10.0.0.1", 4001), "10.0.0.1:4001");
    }
}
