use crate::crypto::{hash, DeedHash};
use crate::error::{ChainError, Result};
use std::convert::TryInto;

/// Packed header length: version, transaction count, number, previous
/// digest, merkle root, timestamp
pub const HEADER_SIZE: usize = 2 + 2 + 8 + 32 + 32 + 8;

/// Consensus-relevant block header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u16,
    pub transaction_count: u16,
    pub number: u64,
    pub previous_block: DeedHash,
    pub merkle_root: DeedHash,
    pub timestamp: u64,
}

impl BlockHeader {
    pub fn pack(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = Vec::with_capacity(HEADER_SIZE);
        vbytes.extend(&self.version.to_be_bytes());
        vbytes.extend(&self.transaction_count.to_be_bytes());
        vbytes.extend(&self.number.to_be_bytes());
        vbytes.extend(&self.previous_block);
        vbytes.extend(&self.merkle_root);
        vbytes.extend(&self.timestamp.to_be_bytes());
        vbytes
    }
}

/// Split a packed block into its header, the header's digest and the
/// transaction body bytes.
pub fn extract_header(packed: &[u8]) -> Result<(BlockHeader, DeedHash, &[u8])> {
    if packed.len() < HEADER_SIZE {
        return Err(ChainError::InvalidBlockHeaderSize);
    }
    let header = BlockHeader {
        version: u16::from_be_bytes(packed[0..2].try_into().unwrap()),
        transaction_count: u16::from_be_bytes(packed[2..4].try_into().unwrap()),
        number: u64::from_be_bytes(packed[4..12].try_into().unwrap()),
        previous_block: packed[12..44].try_into().unwrap(),
        merkle_root: packed[44..76].try_into().unwrap(),
        timestamp: u64::from_be_bytes(packed[76..84].try_into().unwrap()),
    };
    let digest = hash(&packed[..HEADER_SIZE]);
    Ok((header, digest, &packed[HEADER_SIZE..]))
}

/// Tx id of the synthetic foundation record: derived from the header and
/// the block digest, so it can never collide with a packed transaction id.
pub fn foundation_tx_id(header: &BlockHeader, digest: &DeedHash) -> DeedHash {
    let mut vbytes = header.pack();
    vbytes.extend(digest);
    hash(&vbytes)
}

/// 8-byte big-endian key form of a block number, the key layout every
/// number-indexed pool uses.
pub fn block_number_key(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_fixture() -> BlockHeader {
        BlockHeader {
            version: 2,
            transaction_count: 3,
            number: 9,
            previous_block: hash(b"previous"),
            merkle_root: hash(b"root"),
            timestamp: 1_600_000_000,
        }
    }

    #[test]
    fn pack_extract_round_trip() {
        let header = header_fixture();
        let mut packed = header.pack();
        packed.extend(b"transaction body bytes");

        let (extracted, digest, body) = extract_header(&packed).unwrap();
        assert_eq!(extracted, header);
        assert_eq!(digest, hash(&packed[..HEADER_SIZE]));
        assert_eq!(body, b"transaction body bytes");
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(
            extract_header(&[0u8; HEADER_SIZE - 1]),
            Err(ChainError::InvalidBlockHeaderSize)
        );
    }

    #[test]
    fn foundation_tx_id_binds_header_and_digest() {
        let header = header_fixture();
        let digest = hash(&header.pack());
        let id = foundation_tx_id(&header, &digest);

        let mut other = header.clone();
        other.number += 1;
        assert_ne!(id, foundation_tx_id(&other, &digest));
        assert_ne!(id, foundation_tx_id(&header, &hash(b"other digest")));
    }

    #[test]
    fn number_keys_sort_numerically() {
        assert!(block_number_key(2) < block_number_key(10));
        assert!(block_number_key(255) < block_number_key(256));
    }
}
