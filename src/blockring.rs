use crate::crypto::DeedHash;

/// Slots in the recent-block ring
pub const RING_SIZE: u64 = 20;

//
// A small fixed-size cache of the most recently committed blocks so digest
// lookups near the head avoid the blocks pool. Slot index is simply
// number % RING_SIZE; an old entry is overwritten when the ring wraps.
// The ring lives inside the chain state and is only touched under the
// chain lock.
//
#[derive(Debug, Clone)]
struct RingEntry {
    number: u64,
    digest: DeedHash,
    packed: Vec<u8>,
}

#[derive(Debug)]
pub struct BlockRing {
    entries: Vec<Option<RingEntry>>,
}

impl BlockRing {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(RING_SIZE as usize);
        for _ in 0..RING_SIZE {
            entries.push(None);
        }
        BlockRing { entries }
    }

    pub fn put(&mut self, number: u64, digest: DeedHash, packed: &[u8]) {
        let insert_pos = (number % RING_SIZE) as usize;
        self.entries[insert_pos] = Some(RingEntry {
            number,
            digest,
            packed: packed.to_vec(),
        });
    }

    /// Digest of the cached block with this number, if it is still in the
    /// ring.
    pub fn digest_for_block(&self, number: u64) -> Option<DeedHash> {
        let insert_pos = (number % RING_SIZE) as usize;
        match &self.entries[insert_pos] {
            Some(entry) if entry.number == number => Some(entry.digest),
            _ => None,
        }
    }

    /// Packed bytes of the cached block with this number.
    pub fn block_for_number(&self, number: u64) -> Option<Vec<u8>> {
        let insert_pos = (number % RING_SIZE) as usize;
        match &self.entries[insert_pos] {
            Some(entry) if entry.number == number => Some(entry.packed.clone()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.is_none())
    }
}

impl Default for BlockRing {
    fn default() -> Self {
        BlockRing::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn put_and_lookup() {
        let mut ring = BlockRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.digest_for_block(2), None);

        ring.put(2, hash(b"block 2"), b"packed 2");
        assert_eq!(ring.digest_for_block(2), Some(hash(b"block 2")));
        assert_eq!(ring.block_for_number(2), Some(b"packed 2".to_vec()));
        assert!(!ring.is_empty());
    }

    #[test]
    fn wrap_overwrites_stale_slot() {
        let mut ring = BlockRing::new();
        ring.put(2, hash(b"block 2"), b"packed 2");

        // same slot, one full revolution later
        ring.put(2 + RING_SIZE, hash(b"block 22"), b"packed 22");
        assert_eq!(ring.digest_for_block(2), None);
        assert_eq!(ring.digest_for_block(2 + RING_SIZE), Some(hash(b"block 22")));
    }

    #[test]
    fn a_full_revolution_keeps_every_recent_block() {
        let mut ring = BlockRing::new();
        for number in 2..2 + RING_SIZE {
            ring.put(number, hash(&number.to_be_bytes()), b"packed");
        }
        for number in 2..2 + RING_SIZE {
            assert_eq!(
                ring.digest_for_block(number),
                Some(hash(&number.to_be_bytes()))
            );
        }
    }
}
