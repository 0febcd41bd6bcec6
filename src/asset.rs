use crate::crypto::DeedHash;
use ahash::AHashMap;
use std::sync::Mutex;

/// Pending-asset cache: asset registrations seen on the network but not
/// yet confirmed by a block. The committer deletes an entry the moment a
/// block carries the asset.
#[derive(Debug, Default)]
pub struct AssetCache {
    pending: Mutex<AHashMap<DeedHash, Vec<u8>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        AssetCache {
            pending: Mutex::new(AHashMap::new()),
        }
    }

    pub fn insert_pending(&self, asset_id: DeedHash, packed: Vec<u8>) {
        self.pending.lock().unwrap().insert(asset_id, packed);
    }

    pub fn is_pending(&self, asset_id: &DeedHash) -> bool {
        self.pending.lock().unwrap().contains_key(asset_id)
    }

    pub fn delete(&self, asset_id: &DeedHash) {
        self.pending.lock().unwrap().remove(asset_id);
    }

    pub fn count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn pending_lifecycle() {
        let cache = AssetCache::new();
        let asset_id = hash(b"fingerprint");

        assert!(!cache.is_pending(&asset_id));
        cache.insert_pending(asset_id, b"packed asset".to_vec());
        assert!(cache.is_pending(&asset_id));
        assert_eq!(cache.count(), 1);

        cache.delete(&asset_id);
        assert!(!cache.is_pending(&asset_id));
        // deleting an absent id is harmless
        cache.delete(&asset_id);
        assert_eq!(cache.count(), 0);
    }
}
