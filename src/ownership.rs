use crate::crypto::{DeedHash, DeedPublicKey};
use ahash::AHashMap;
use std::sync::Mutex;

//
// Who holds what. Every issue, transfer and block foundation leaves a
// permanent record keyed by its tx id; a separate live set tracks which
// links are currently spendable. A transfer consumes its link from the
// live set, so a second spend of the same link is detectable.
//

/// What a link currently or historically resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipRecord {
    pub owner: DeedPublicKey,
    pub block_number: u64,
    pub kind: PropertyKind,
}

/// The property class behind a tx id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Asset { asset_id: DeedHash },
    Block { block_number: u64 },
}

#[derive(Debug, Default)]
struct OwnershipData {
    // tx id -> record, never removed
    records: AHashMap<DeedHash, OwnershipRecord>,
    // link -> current holder, removed when the link is spent
    live: AHashMap<DeedHash, DeedPublicKey>,
}

/// Ownership index shared by the validator (read-only) and the committer.
#[derive(Debug, Default)]
pub struct Ownership {
    inner: Mutex<OwnershipData>,
}

impl Ownership {
    pub fn new() -> Self {
        Ownership {
            inner: Mutex::new(OwnershipData::default()),
        }
    }

    /// Owner recorded for a link, whether or not it is still spendable.
    pub fn owner_of(&self, link: &DeedHash) -> Option<DeedPublicKey> {
        self.inner
            .lock()
            .unwrap()
            .records
            .get(link)
            .map(|r| r.owner)
    }

    /// Does `owner` still hold the property behind `link`?
    pub fn currently_owns(&self, owner: &DeedPublicKey, link: &DeedHash) -> bool {
        self.inner.lock().unwrap().live.get(link) == Some(owner)
    }

    /// Record a freshly issued deed over an asset.
    pub fn create_asset(
        &self,
        tx_id: DeedHash,
        block_number: u64,
        asset_id: DeedHash,
        owner: &DeedPublicKey,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(
            tx_id,
            OwnershipRecord {
                owner: *owner,
                block_number,
                kind: PropertyKind::Asset { asset_id },
            },
        );
        inner.live.insert(tx_id, *owner);
    }

    /// Record a block foundation: the block itself becomes property.
    pub fn create_block(&self, tx_id: DeedHash, block_number: u64, owner: &DeedPublicKey) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(
            tx_id,
            OwnershipRecord {
                owner: *owner,
                block_number,
                kind: PropertyKind::Block { block_number },
            },
        );
        inner.live.insert(tx_id, *owner);
    }

    /// Move the property behind `link` to `new_owner` under the transfer's
    /// own tx id. The link stops being spendable; the new tx id starts.
    pub fn transfer(
        &self,
        link: &DeedHash,
        new_tx_id: DeedHash,
        block_number: u64,
        old_owner: &DeedPublicKey,
        new_owner: &DeedPublicKey,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let kind = match inner.records.get(link) {
            Some(record) => record.kind,
            None => return, // validated before commit; nothing to move
        };
        debug_assert_eq!(inner.live.get(link), Some(old_owner));
        inner.live.remove(link);
        inner.records.insert(
            new_tx_id,
            OwnershipRecord {
                owner: *new_owner,
                block_number,
                kind,
            },
        );
        inner.live.insert(new_tx_id, *new_owner);
    }
}
