use crate::asset::AssetCache;
use crate::blockrecord::{self, BlockHeader};
use crate::blockring::BlockRing;
use crate::constants::{VERSION_1_TIMESTAMP_TOLERANCE, VERSION_2_TIMESTAMP_TOLERANCE};
use crate::crypto::{DeedHash, DeedPublicKey};
use crate::currency::{litecoin_from_bitcoin, Currency, PaymentMap};
use crate::error::{ChainError, Result};
use crate::genesis;
use crate::merkle;
use crate::mode::Mode;
use crate::ownership::Ownership;
use crate::reservoir::Reservoir;
use crate::storage::Pools;
use crate::transaction::{check_payments, TransactionRecord};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

//
// The chain head and everything that may move it. One mutex serialises the
// whole subsystem: store_incoming validates and commits inside a single
// critical section, and the readers take the same lock briefly, so no
// observer ever sees a half-applied block.
//

#[derive(Debug)]
struct ChainData {
    height: u64,
    previous_block: DeedHash,
    previous_version: u16,
    previous_timestamp: u64,
    rebuild: bool,
    ring: BlockRing,
}

/// The block pipeline context: current tip, recent-block ring and the
/// collaborators a block mutates when it commits.
pub struct Blockchain {
    inner: Mutex<ChainData>,
    mode: Mode,
    pools: Arc<Pools>,
    ownership: Arc<Ownership>,
    assets: Arc<AssetCache>,
    reservoir: Arc<Reservoir>,
}

// one parsed transaction, carried from validation into commit
#[derive(Debug)]
struct ValidatedTx {
    tx_id: DeedHash,
    packed: Vec<u8>,
    record: TransactionRecord,
    link_owner: Option<DeedPublicKey>,
    previous_block_number_key: Option<Vec<u8>>,
}

// everything commit needs, assembled without touching any store
#[derive(Debug)]
struct ValidatedBlock {
    header: BlockHeader,
    digest: DeedHash,
    txs: Vec<ValidatedTx>,
    tx_start: usize,
    block_owner: DeedPublicKey,
    packed_payments: Vec<u8>,
    packed_foundation: Vec<u8>,
}

impl Blockchain {
    /// Build the block pipeline. The head starts at genesis for the
    /// selected chain; if the blocks pool already holds data the head is
    /// recovered from the highest stored block.
    pub fn new(
        mode: Mode,
        pools: Arc<Pools>,
        ownership: Arc<Ownership>,
        assets: Arc<AssetCache>,
        reservoir: Arc<Reservoir>,
    ) -> Self {
        let mut data = ChainData {
            height: genesis::BLOCK_NUMBER,
            previous_block: if mode.is_testing() {
                genesis::TEST_GENESIS_DIGEST
            } else {
                genesis::LIVE_GENESIS_DIGEST
            },
            previous_version: 1,
            previous_timestamp: genesis::BLOCK_TIMESTAMP,
            rebuild: false,
            ring: BlockRing::new(),
        };

        if let Some((_, packed)) = pools.blocks.last() {
            match blockrecord::extract_header(&packed) {
                Ok((header, digest, _)) => {
                    data.height = header.number;
                    data.previous_block = digest;
                    data.previous_version = header.version;
                    data.previous_timestamp = header.timestamp;
                    data.ring.put(header.number, digest, &packed);
                }
                Err(err) => {
                    error!("stored block is unreadable: {}", err);
                    panic!("blocks pool is corrupt");
                }
            }
        }

        Blockchain {
            inner: Mutex::new(data),
            mode,
            pools,
            ownership,
            assets,
            reservoir,
        }
    }

    /// Current height of the chain
    pub fn get_height(&self) -> u64 {
        self.inner.lock().unwrap().height
    }

    /// Data for assembling the next block: the digest the new block must
    /// link to and the number it must carry.
    pub fn get(&self) -> (DeedHash, u64) {
        let data = self.inner.lock().unwrap();
        (data.previous_block, data.height + 1)
    }

    /// Switch rebuild mode: while set, commits advance the head and the
    /// indexes but skip the ring and the blocks pool.
    pub fn set_rebuild(&self, rebuild: bool) {
        self.inner.lock().unwrap().rebuild = rebuild;
    }

    /// Digest of the block at `number`.
    ///
    /// Numbers at or below genesis return the fixed genesis digest for the
    /// selected chain. Recent numbers come from the ring; anything older
    /// is re-extracted from the blocks pool.
    pub fn digest_for_block(&self, number: u64) -> Result<DeedHash> {
        let data = self.inner.lock().unwrap();

        if number <= genesis::BLOCK_NUMBER {
            if self.mode.is_testing() {
                return Ok(genesis::TEST_GENESIS_DIGEST);
            }
            return Ok(genesis::LIVE_GENESIS_DIGEST);
        }

        if number <= data.height {
            if let Some(digest) = data.ring.digest_for_block(number) {
                return Ok(digest);
            }
        }

        let packed = self
            .pools
            .blocks
            .get(&blockrecord::block_number_key(number))
            .ok_or(ChainError::BlockNotFound)?;
        let (_, digest, _) = blockrecord::extract_header(&packed)?;
        Ok(digest)
    }

    /// Validate and commit one packed block.
    ///
    /// Validation is a pure function of the block bytes plus read-only
    /// views of the pools, the ownership index and the head snapshot; any
    /// error leaves every store byte-identical. The pending reservoir is
    /// quiesced for the duration and re-enabled on every exit path.
    pub fn store_incoming(&self, packed_block: &[u8]) -> Result<()> {
        let mut data = self.inner.lock().unwrap();
        let _pause = self.reservoir.pause();

        let validated = self.validate(&data, packed_block)?;
        self.commit(&mut data, &validated, packed_block);
        Ok(())
    }

    //
    // validation, steps in strict order, first violation wins
    //
    fn validate(&self, data: &ChainData, packed_block: &[u8]) -> Result<ValidatedBlock> {
        let testing = self.mode.is_testing();

        let (header, digest, body) = blockrecord::extract_header(packed_block)?;

        if data.previous_block != header.previous_block {
            return Err(ChainError::PreviousBlockDigestDoesNotMatch);
        }

        if header.version < 1 {
            return Err(ChainError::InvalidBlockHeaderVersion);
        }

        if data.previous_version > header.version {
            return Err(ChainError::BlockVersionMustNotDecrease);
        }

        // timestamps normally increase; old block versions tolerate a
        // bounded regression
        if data.previous_timestamp > header.timestamp {
            let d = data.previous_timestamp - header.timestamp;
            warn!(
                "prev: {}  next: {}  diff: {}  block: {}  version: {}",
                data.previous_timestamp, header.timestamp, d, header.number, header.version
            );
            let fail = match header.version {
                1 => d > VERSION_1_TIMESTAMP_TOLERANCE,
                2 => d > VERSION_2_TIMESTAMP_TOLERANCE,
                _ => true,
            };
            if fail {
                return Err(ChainError::InvalidBlockHeaderTimestamp);
            }
        }

        // v1 blocks carry historic duplicates that must not fail the chain
        let suppress_duplicate_record_checks = header.version == 1;

        if header.transaction_count == 0 {
            return Err(ChainError::TransactionCountOutOfRange);
        }

        let count = header.transaction_count as usize;
        let mut txs: Vec<ValidatedTx> = Vec::with_capacity(count);
        let mut tx_ids: Vec<DeedHash> = Vec::with_capacity(count);
        let mut cursor = body;

        for i in 0..count {
            let (record, n) = TransactionRecord::unpack(cursor, testing)?;
            let tx_id = merkle::new_digest(&cursor[..n]);

            let mut link_owner: Option<DeedPublicKey> = None;
            let mut previous_block_number_key: Option<Vec<u8>> = None;

            // re-pack against the claimed signer; this rebuilds the
            // signature-bearing byte form and so checks the signature
            match &record {
                TransactionRecord::OldBaseData(tx) => {
                    record.pack(&tx.owner)?;
                }

                TransactionRecord::AssetData(tx) => {
                    record.pack(&tx.registrant)?;
                    let asset_id = tx.asset_id();
                    if !suppress_duplicate_record_checks && self.pools.assets.has(&asset_id) {
                        return Err(ChainError::TransactionAlreadyExists);
                    }
                }

                TransactionRecord::DeedIssue(tx) => {
                    record.pack(&tx.owner)?;
                    if !suppress_duplicate_record_checks && self.pools.transactions.has(&tx_id) {
                        return Err(ChainError::TransactionAlreadyExists);
                    }
                }

                TransactionRecord::DeedTransferUnratified(tx) => {
                    let owner = self.link_owner_or_fatal(&tx.link, &record);
                    record.pack(&owner)?;
                    if !self.ownership.currently_owns(&owner, &tx.link) {
                        return Err(ChainError::DoubleTransferAttempt);
                    }
                    link_owner = Some(owner);
                }

                TransactionRecord::DeedTransferCountersigned(tx) => {
                    let owner = self.link_owner_or_fatal(&tx.link, &record);
                    record.pack(&owner)?;
                    if !self.ownership.currently_owns(&owner, &tx.link) {
                        return Err(ChainError::DoubleTransferAttempt);
                    }
                    link_owner = Some(owner);
                }

                TransactionRecord::BlockFoundation(tx) => {
                    record.pack(&tx.owner)?;
                }

                TransactionRecord::BlockOwnerTransfer(tx) => {
                    let owner = self.link_owner_or_fatal(&tx.link, &record);
                    record.pack(&owner)?;
                    if !self.ownership.currently_owns(&owner, &tx.link) {
                        return Err(ChainError::DoubleTransferAttempt);
                    }

                    // the block this record hands over
                    let n_key = match self.pools.block_owner_tx_index.get(&tx.link) {
                        Some(n_key) => n_key,
                        None => {
                            error!("missing block owner tx index for link: {}", hex::encode(tx.link));
                            panic!("block owner index is corrupt");
                        }
                    };

                    check_payments(tx.version, testing, &tx.payments)?;

                    previous_block_number_key = Some(n_key);
                    link_owner = Some(owner);
                }
            }

            txs.push(ValidatedTx {
                tx_id,
                packed: cursor[..n].to_vec(),
                record,
                link_owner,
                previous_block_number_key,
            });
            tx_ids.push(tx_id);
            cursor = &cursor[n..];

            // extraneous bytes after the final transaction
            if i + 1 == count && !cursor.is_empty() {
                return Err(ChainError::TransactionCountOutOfRange);
            }
        }

        let full_tree = merkle::full_merkle_tree(&tx_ids);
        let merkle_root = full_tree[full_tree.len() - 1];
        if merkle_root != header.merkle_root {
            return Err(ChainError::MerkleRootDoesNotMatch);
        }

        // the first transaction founds the block and fixes its payments
        let mut tx_start = 1;
        let (block_owner, packed_payments, packed_foundation) = match &txs[0].record {
            TransactionRecord::BlockFoundation(tx) => {
                check_payments(tx.version, testing, &tx.payments)?;
                let packed_payments = tx.payments.pack(testing)?;
                (tx.owner, packed_payments, txs[0].packed.clone())
            }

            TransactionRecord::OldBaseData(tx) => {
                tx.currency.validate_address(&tx.payment_address, testing)?;
                let mut currencies = PaymentMap::new();
                currencies.insert(tx.currency, tx.payment_address.clone());

                let packed_foundation = match txs.get(1).map(|t| &t.record) {
                    Some(TransactionRecord::OldBaseData(tx1)) => {
                        // second base record carries the other currency
                        currencies.insert(tx1.currency, tx1.payment_address.clone());
                        tx_start = 2;
                        let mut both = txs[0].packed.clone();
                        both.extend(&txs[1].packed);
                        both
                    }
                    _ => {
                        // single base block: derive the matching Litecoin
                        // address from the Bitcoin one
                        currencies.insert(
                            Currency::Litecoin,
                            litecoin_from_bitcoin(&tx.payment_address)?,
                        );
                        txs[0].packed.clone()
                    }
                };
                let packed_payments = currencies.pack(testing)?;
                (tx.owner, packed_payments, packed_foundation)
            }

            _ => return Err(ChainError::MissingBlockOwner),
        };

        if txs.len() < tx_start {
            return Err(ChainError::TransactionCountOutOfRange);
        }

        Ok(ValidatedBlock {
            header,
            digest,
            txs,
            tx_start,
            block_owner,
            packed_payments,
            packed_foundation,
        })
    }

    // a transfer whose link has no ownership record means the indexes are
    // inconsistent with the chain; continuing would spread the corruption
    fn link_owner_or_fatal(&self, link: &DeedHash, record: &TransactionRecord) -> DeedPublicKey {
        match self.ownership.owner_of(link) {
            Some(owner) => owner,
            None => {
                error!(
                    "missing transaction record for link: {} referenced by tx: {:?}",
                    hex::encode(link),
                    record
                );
                panic!("transactions database is corrupt");
            }
        }
    }

    //
    // commit, mutation in fixed order, errors here are invariant
    // violations and terminate the process
    //
    fn commit(&self, data: &mut ChainData, validated: &ValidatedBlock, packed_block: &[u8]) {
        let header = &validated.header;
        let block_number_key = blockrecord::block_number_key(header.number);

        for item in &validated.txs[validated.tx_start..] {
            match &item.record {
                TransactionRecord::OldBaseData(_) | TransactionRecord::BlockFoundation(_) => {
                    error!("foundation record after tx start: {:?}", item.record);
                    panic!("should not occur: {:?}", item.record);
                }

                TransactionRecord::AssetData(tx) => {
                    let asset_id = tx.asset_id();
                    self.assets.delete(&asset_id);
                    if !self.pools.assets.has(&asset_id) {
                        self.pools
                            .assets
                            .put_record(&asset_id, &block_number_key, &item.packed);
                    }
                }

                TransactionRecord::DeedIssue(tx) => {
                    self.reservoir.delete_by_tx_id(&item.tx_id);
                    if !self.pools.transactions.has(&item.tx_id) {
                        self.pools.transactions.put_record(
                            &item.tx_id,
                            &block_number_key,
                            &item.packed,
                        );
                        self.ownership.create_asset(
                            item.tx_id,
                            header.number,
                            tx.asset_id,
                            &tx.owner,
                        );
                    }
                }

                TransactionRecord::DeedTransferUnratified(tx) => {
                    self.commit_transfer(item, &tx.link, &tx.owner, &block_number_key, header.number);
                }

                TransactionRecord::DeedTransferCountersigned(tx) => {
                    self.commit_transfer(item, &tx.link, &tx.owner, &block_number_key, header.number);
                }

                TransactionRecord::BlockOwnerTransfer(tx) => {
                    self.reservoir.delete_by_tx_id(&item.tx_id);
                    self.reservoir.delete_by_link(&tx.link);

                    let packed_payments = match tx.payments.pack(self.mode.is_testing()) {
                        Ok(packed_payments) => packed_payments,
                        Err(err) => {
                            // packing was checked during validation; an
                            // error here is memory corruption
                            error!("payment pack failed after validation: {}", err);
                            panic!("pack, should not error: {}", err);
                        }
                    };

                    let previous_key = match &item.previous_block_number_key {
                        Some(previous_key) => previous_key,
                        None => {
                            error!("block owner transfer without index key: {:?}", item.record);
                            panic!("should not occur: {:?}", item.record);
                        }
                    };
                    let link_owner = match &item.link_owner {
                        Some(link_owner) => link_owner,
                        None => {
                            error!("block owner transfer without link owner: {:?}", item.record);
                            panic!("should not occur: {:?}", item.record);
                        }
                    };

                    self.pools.transactions.put_record(
                        &item.tx_id,
                        &block_number_key,
                        &item.packed,
                    );
                    self.pools
                        .block_owner_payment
                        .put(previous_key, &packed_payments);
                    self.pools
                        .block_owner_tx_index
                        .put(&item.tx_id, &block_number_key);
                    self.ownership.transfer(
                        &tx.link,
                        item.tx_id,
                        header.number,
                        link_owner,
                        &tx.owner,
                    );
                }
            }
        }

        // this block's own payment data
        self.pools
            .block_owner_payment
            .put(&block_number_key, &validated.packed_payments);

        // the synthetic foundation record for the new block
        let foundation_tx_id = blockrecord::foundation_tx_id(header, &validated.digest);
        self.pools.transactions.put_record(
            &foundation_tx_id,
            &block_number_key,
            &validated.packed_foundation,
        );
        self.pools
            .block_owner_tx_index
            .put(&foundation_tx_id, &block_number_key);
        self.ownership
            .create_block(foundation_tx_id, header.number, &validated.block_owner);

        let expected_block_number = data.height + 1;
        if expected_block_number != header.number {
            error!(
                "out of sequence block: actual: {}  expected: {}",
                header.number, expected_block_number
            );
            panic!(
                "store_incoming: out of sequence block: actual: {}  expected: {}",
                header.number, expected_block_number
            );
        }

        data.previous_block = validated.digest;
        data.previous_version = header.version;
        data.previous_timestamp = header.timestamp;
        data.height = header.number;

        // a rebuild replays blocks that are already stored
        if data.rebuild {
            warn!("rebuilt block: {}", data.height);
            return;
        }

        data.ring.put(header.number, validated.digest, packed_block);
        self.pools.blocks.put(&block_number_key, packed_block);
    }

    fn commit_transfer(
        &self,
        item: &ValidatedTx,
        link: &DeedHash,
        new_owner: &DeedPublicKey,
        block_number_key: &[u8],
        block_number: u64,
    ) {
        self.reservoir.delete_by_tx_id(&item.tx_id);

        // a pending record spending this link may sit under a different
        // tx id; it must go as well or it becomes a double-spend
        self.reservoir.delete_by_link(link);

        let link_owner = match &item.link_owner {
            Some(link_owner) => link_owner,
            None => {
                error!("transfer without link owner: {:?}", item.record);
                panic!("should not occur: {:?}", item.record);
            }
        };

        self.pools
            .transactions
            .put_record(&item.tx_id, block_number_key, &item.packed);
        self.ownership
            .transfer(link, item.tx_id, block_number, link_owner, new_owner);
    }
}
