//! Merkle tree over transaction hashes.

use crate::hash::hash256;

/// Computes Merkle roots the way block headers require: pairwise double
/// SHA-256 with the odd leaf duplicated, empty set hashing to zero.
pub struct MerkleTree;

impl MerkleTree {
    /// Computes the Merkle root of the given 32-byte leaves.
    pub fn compute_root(leaves: &[[u8; 32]]) -> [u8; 32] {
        match leaves.len() {
            0 => [0u8; 32],
            1 => leaves[0],
            _ => {
                let mut level: Vec<[u8; 32]> = leaves.to_vec();
                while level.len() > 1 {
                    let mut next = Vec::with_capacity((level.len() + 1) / 2);
                    for pair in level.chunks(2) {
                        let left = pair[0];
                        let right = if pair.len() == 2 { pair[1] } else { pair[0] };
                        let mut buffer = [0u8; 64];
                        buffer[..32].copy_from_slice(&left);
                        buffer[32..].copy_from_slice(&right);
                        next.push(hash256(&buffer));
                    }
                    level = next;
                }
                level[0]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(MerkleTree::compute_root(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = [7u8; 32];
        assert_eq!(MerkleTree::compute_root(&[leaf]), leaf);
    }

    #[test]
    fn two_leaves_hash_together() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let mut buffer = [0u8; 64];
        buffer[..32].copy_from_slice(&a);
        buffer[32..].copy_from_slice(&b);
        assert_eq!(MerkleTree::compute_root(&[a, b]), hash256(&buffer));
    }

    #[test]
    fn odd_leaf_is_duplicated() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        // The three-leaf tree equals the four-leaf tree with c duplicated.
        assert_eq!(
            MerkleTree::compute_root(&[a, b, c]),
            MerkleTree::compute_root(&[a, b, c, c])
        );
    }

    #[test]
    fn root_depends_on_order() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(
            MerkleTree::compute_root(&[a, b]),
            MerkleTree::compute_root(&[b, a])
        );
    }
}
