use rand::SeedableRng;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

/// Derive an independent 64-bit seed from a parent seed and a label.
///
/// Items and the random choices inside one item each get their own stream,
/// so adding an item or a choice never shifts the others.
pub fn derive_seed(parent: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(parent.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub fn rng_for(parent: u64, label: &str) -> StdRng {
    StdRng::seed_from_u64(derive_seed(parent, label))
}
