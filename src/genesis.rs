use crate::crypto::DeedHash;

/// Block number of the genesis block. Stored chain data starts at
/// `BLOCK_NUMBER + 1`.
pub const BLOCK_NUMBER: u64 = 1;

/// Header timestamp of the genesis block
pub const BLOCK_TIMESTAMP: u64 = 1_473_638_400;

/// Digest of the live-chain genesis block
pub const LIVE_GENESIS_DIGEST: DeedHash = [
    0x9a, 0x71, 0x2c, 0x55, 0xe3, 0x82, 0x0f, 0x10, 0x41, 0xcc, 0x5e, 0xf2, 0x5a, 0x9d, 0x6e,
    0x0b, 0xc2, 0x44, 0x97, 0x31, 0x8d, 0x5a, 0xf3, 0x6c, 0x24, 0x16, 0x3a, 0x8e, 0x57, 0x0d,
    0xd1, 0x9e,
];

/// Digest of the testing-chain genesis block
pub const TEST_GENESIS_DIGEST: DeedHash = [
    0x25, 0xd0, 0x3f, 0x8c, 0x1a, 0x6b, 0xe2, 0x47, 0x90, 0x5b, 0xa1, 0x3e, 0x6f, 0x48, 0x82,
    0xc9, 0x17, 0x2b, 0xd4, 0x65, 0x0e, 0x39, 0x1f, 0xaa, 0x7c, 0x53, 0xe8, 0x04, 0xb6, 0x91,
    0x2d, 0x70,
];
