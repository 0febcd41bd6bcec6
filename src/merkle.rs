use crate::crypto::{hash, DeedHash};

/// Transaction id of a packed record: the digest of exactly the bytes the
/// record occupied in the block body.
pub fn new_digest(packed: &[u8]) -> DeedHash {
    hash(packed)
}

//
// The full tree is returned as one flattened vector: the leaf ids first,
// then each successive level, with the root as the final element. A level
// with an odd entry promotes its last digest unchanged.
//
pub fn full_merkle_tree(tx_ids: &[DeedHash]) -> Vec<DeedHash> {
    let mut tree: Vec<DeedHash> = tx_ids.to_vec();
    let mut level_start = 0;
    let mut level_len = tx_ids.len();

    while level_len > 1 {
        let level_end = level_start + level_len;
        let mut i = level_start;
        while i < level_end {
            if i + 1 < level_end {
                let mut vbytes: Vec<u8> = Vec::with_capacity(64);
                vbytes.extend(&tree[i]);
                vbytes.extend(&tree[i + 1]);
                tree.push(hash(&vbytes));
            } else {
                let last = tree[i];
                tree.push(last);
            }
            i += 2;
        }
        level_start = level_end;
        level_len = tree.len() - level_end;
    }

    tree
}

/// Root of the full tree, the last element.
pub fn merkle_root(tx_ids: &[DeedHash]) -> DeedHash {
    let tree = full_merkle_tree(tx_ids);
    *tree.last().expect("merkle tree of zero transactions")
}
