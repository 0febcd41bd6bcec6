use crate::asset::AssetCache;
use crate::blockchain::Blockchain;
use crate::blockrecord::BlockHeader;
use crate::crypto::{generate_keys, sign, DeedHash, DeedPrivateKey, DeedPublicKey};
use crate::currency::test::test_address;
use crate::currency::{Currency, PaymentMap};
use crate::merkle;
use crate::mode::{Chain, Mode};
use crate::ownership::Ownership;
use crate::reservoir::Reservoir;
use crate::storage::Pools;
use crate::transaction::{
    AssetData, BlockFoundation, BlockOwnerTransfer, DeedIssue, DeedTransferCountersigned,
    DeedTransferUnratified, OldBaseData, TransactionRecord,
};
use std::sync::Arc;

/// A keypair plus the helpers tests keep reaching for
#[derive(Clone)]
pub struct TestKeypair {
    pub publickey: DeedPublicKey,
    pub privatekey: DeedPrivateKey,
}

impl TestKeypair {
    pub fn new() -> Self {
        let (publickey, privatekey) = generate_keys();
        TestKeypair {
            publickey,
            privatekey,
        }
    }
}

/// Builds valid blocks and records against a wired-up testing-mode chain
/// so individual tests stay at the level of the behaviour they check.
pub struct TestManager {
    pub mode: Mode,
    pub pools: Arc<Pools>,
    pub ownership: Arc<Ownership>,
    pub assets: Arc<AssetCache>,
    pub reservoir: Arc<Reservoir>,
    pub blockchain: Blockchain,
}

impl TestManager {
    pub fn new() -> Self {
        let mode = Mode::new(Chain::Testing);
        let pools = Arc::new(Pools::new());
        let ownership = Arc::new(Ownership::new());
        let assets = Arc::new(AssetCache::new());
        let reservoir = Arc::new(Reservoir::new());
        let blockchain = Blockchain::new(
            mode.clone(),
            pools.clone(),
            ownership.clone(),
            assets.clone(),
            reservoir.clone(),
        );
        TestManager {
            mode,
            pools,
            ownership,
            assets,
            reservoir,
            blockchain,
        }
    }

    /// A bitcoin testnet payment address fixture
    pub fn bitcoin_address(seed: u8) -> String {
        test_address(0x6f, seed)
    }

    /// A litecoin testnet payment address fixture
    pub fn litecoin_address(seed: u8) -> String {
        test_address(0x3a, seed)
    }

    /// Sign a record in place with `privatekey`, which must belong to the
    /// record's expected signer.
    pub fn sign_record(record: &mut TransactionRecord, privatekey: &DeedPrivateKey) {
        let unsigned = record.pack_unsigned();
        let signature = sign(&unsigned, privatekey);
        match record {
            TransactionRecord::OldBaseData(tx) => tx.signature = signature,
            TransactionRecord::AssetData(tx) => tx.signature = signature,
            TransactionRecord::DeedIssue(tx) => tx.signature = signature,
            TransactionRecord::DeedTransferUnratified(tx) => tx.signature = signature,
            TransactionRecord::DeedTransferCountersigned(tx) => tx.signature = signature,
            TransactionRecord::BlockFoundation(tx) => tx.signature = signature,
            TransactionRecord::BlockOwnerTransfer(tx) => tx.signature = signature,
        }
    }

    /// A version 1 block foundation with a single bitcoin payment address
    pub fn make_foundation(&self, owner: &TestKeypair) -> TransactionRecord {
        let mut payments = PaymentMap::new();
        payments.insert(Currency::Bitcoin, Self::bitcoin_address(11));
        let mut record = TransactionRecord::BlockFoundation(BlockFoundation {
            version: 1,
            payments,
            owner: owner.publickey,
            nonce: 1,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &owner.privatekey);
        record
    }

    /// An old-style base record for one currency
    pub fn make_base(
        &self,
        owner: &TestKeypair,
        currency: Currency,
        payment_address: String,
    ) -> TransactionRecord {
        let mut record = TransactionRecord::OldBaseData(OldBaseData {
            currency,
            payment_address,
            owner: owner.publickey,
            nonce: 1,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &owner.privatekey);
        record
    }

    pub fn make_asset(&self, registrant: &TestKeypair, fingerprint: &str) -> TransactionRecord {
        let mut record = TransactionRecord::AssetData(AssetData {
            name: "test asset".to_string(),
            fingerprint: fingerprint.to_string(),
            metadata: "description\u{0}test".to_string(),
            registrant: registrant.publickey,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &registrant.privatekey);
        record
    }

    pub fn make_issue(
        &self,
        asset_id: DeedHash,
        owner: &TestKeypair,
        nonce: u64,
    ) -> TransactionRecord {
        let mut record = TransactionRecord::DeedIssue(DeedIssue {
            asset_id,
            owner: owner.publickey,
            nonce,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &owner.privatekey);
        record
    }

    /// A one-party transfer signed by the current link owner
    pub fn make_transfer(
        &self,
        link: DeedHash,
        current_owner: &TestKeypair,
        new_owner: &DeedPublicKey,
    ) -> TransactionRecord {
        let mut record = TransactionRecord::DeedTransferUnratified(DeedTransferUnratified {
            link,
            owner: *new_owner,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &current_owner.privatekey);
        record
    }

    /// A two-party transfer: signed by the current link owner and
    /// countersigned by the new one
    pub fn make_countersigned_transfer(
        &self,
        link: DeedHash,
        current_owner: &TestKeypair,
        new_owner: &TestKeypair,
    ) -> TransactionRecord {
        let mut transfer = DeedTransferCountersigned {
            link,
            owner: new_owner.publickey,
            signature: [0; 64],
            countersignature: [0; 64],
        };
        let unsigned = TransactionRecord::DeedTransferCountersigned(transfer.clone()).pack_unsigned();
        transfer.signature = sign(&unsigned, &current_owner.privatekey);

        let mut countersigned = unsigned;
        countersigned.extend(&transfer.signature[..]);
        transfer.countersignature = sign(&countersigned, &new_owner.privatekey);

        TransactionRecord::DeedTransferCountersigned(transfer)
    }

    /// A block-owner transfer signed by the current block owner
    pub fn make_block_owner_transfer(
        &self,
        link: DeedHash,
        current_owner: &TestKeypair,
        new_owner: &DeedPublicKey,
    ) -> TransactionRecord {
        let mut payments = PaymentMap::new();
        payments.insert(Currency::Bitcoin, Self::bitcoin_address(13));
        let mut record = TransactionRecord::BlockOwnerTransfer(BlockOwnerTransfer {
            link,
            version: 1,
            payments,
            owner: *new_owner,
            signature: [0; 64],
        });
        Self::sign_record(&mut record, &current_owner.privatekey);
        record
    }

    /// Assemble a packed block from signed records, linked to the current
    /// head. Signer keys are only needed at creation; packing here reuses
    /// the embedded signatures directly.
    pub fn build_block(&self, version: u16, timestamp: u64, records: &[TransactionRecord]) -> Vec<u8> {
        let (previous_block, number) = self.blockchain.get();
        self.build_block_at(version, timestamp, records, previous_block, number)
    }

    /// Same as `build_block` with explicit linkage, for tamper tests
    pub fn build_block_at(
        &self,
        version: u16,
        timestamp: u64,
        records: &[TransactionRecord],
        previous_block: DeedHash,
        number: u64,
    ) -> Vec<u8> {
        let mut body: Vec<u8> = vec![];
        let mut tx_ids: Vec<DeedHash> = vec![];
        for record in records {
            let packed = Self::pack_signed(record);
            tx_ids.push(merkle::new_digest(&packed));
            body.extend(packed);
        }

        let merkle_root = if tx_ids.is_empty() {
            [0u8; 32]
        } else {
            merkle::merkle_root(&tx_ids)
        };
        let header = BlockHeader {
            version,
            transaction_count: records.len() as u16,
            number,
            previous_block,
            merkle_root,
            timestamp,
        };

        let mut packed_block = header.pack();
        packed_block.extend(body);
        packed_block
    }

    // the signed byte form without signer verification, so tests can also
    // assemble deliberately broken blocks
    fn pack_signed(record: &TransactionRecord) -> Vec<u8> {
        let mut vbytes = record.pack_unsigned();
        match record {
            TransactionRecord::OldBaseData(tx) => vbytes.extend(&tx.signature[..]),
            TransactionRecord::AssetData(tx) => vbytes.extend(&tx.signature[..]),
            TransactionRecord::DeedIssue(tx) => vbytes.extend(&tx.signature[..]),
            TransactionRecord::DeedTransferUnratified(tx) => vbytes.extend(&tx.signature[..]),
            TransactionRecord::DeedTransferCountersigned(tx) => {
                vbytes.extend(&tx.signature[..]);
                vbytes.extend(&tx.countersignature[..]);
            }
            TransactionRecord::BlockFoundation(tx) => vbytes.extend(&tx.signature[..]),
            TransactionRecord::BlockOwnerTransfer(tx) => vbytes.extend(&tx.signature[..]),
        }
        vbytes
    }

    /// Tx id a record will have once packed into a block
    pub fn tx_id(record: &TransactionRecord) -> DeedHash {
        merkle::new_digest(&Self::pack_signed(record))
    }

    /// Commit a simple foundation-plus-issue block and return the tx id of
    /// the issue, for tests that need existing ownership.
    pub fn commit_issue_block(
        &self,
        version: u16,
        timestamp: u64,
        foundation_owner: &TestKeypair,
        issue_owner: &TestKeypair,
        fingerprint: &str,
    ) -> DeedHash {
        let foundation = self.make_foundation(foundation_owner);
        let asset = self.make_asset(issue_owner, fingerprint);
        let asset_id = match &asset {
            TransactionRecord::AssetData(tx) => tx.asset_id(),
            _ => unreachable!(),
        };
        let issue = self.make_issue(asset_id, issue_owner, 1);
        let issue_id = Self::tx_id(&issue);

        let packed = self.build_block(version, timestamp, &[foundation, asset, issue]);
        self.blockchain.store_incoming(&packed).unwrap();
        issue_id
    }
}
