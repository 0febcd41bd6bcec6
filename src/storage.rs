use ahash::AHashMap;
use std::sync::Mutex;

//
// Named persistent key-value namespaces. The engine underneath is a
// collaborator outside this crate; what the committer relies on is the
// point-operation contract here, with each pool individually thread-safe.
// Keys are 8-byte big-endian block numbers or fixed-width digests.
//

/// One key-value namespace
#[derive(Debug)]
pub struct Pool {
    name: &'static str,
    entries: Mutex<AHashMap<Vec<u8>, Vec<u8>>>,
}

impl Pool {
    fn new(name: &'static str) -> Self {
        Pool {
            name,
            entries: Mutex::new(AHashMap::new()),
        }
    }

    pub fn get_name(&self) -> &'static str {
        self.name
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
    }

    /// Store a record pool entry: the block number key followed by the
    /// packed bytes, in one value.
    pub fn put_record(&self, key: &[u8], block_number_key: &[u8], packed: &[u8]) {
        let mut value = Vec::with_capacity(block_number_key.len() + packed.len());
        value.extend(block_number_key);
        value.extend(packed);
        self.put(key, &value);
    }

    /// Entry with the byte-wise largest key, used to recover the chain head
    /// from the blocks pool at startup.
    pub fn last(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .max_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Full byte-equal snapshot, for atomicity assertions in tests
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let entries = self.entries.lock().unwrap();
        let mut all: Vec<(Vec<u8>, Vec<u8>)> =
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        all.sort();
        all
    }
}

/// The pool set the block pipeline writes
#[derive(Debug)]
pub struct Pools {
    pub blocks: Pool,
    pub transactions: Pool,
    pub assets: Pool,
    pub block_owner_payment: Pool,
    pub block_owner_tx_index: Pool,
}

impl Pools {
    pub fn new() -> Self {
        Pools {
            blocks: Pool::new("blocks"),
            transactions: Pool::new("transactions"),
            assets: Pool::new("assets"),
            block_owner_payment: Pool::new("block-owner-payment"),
            block_owner_tx_index: Pool::new("block-owner-tx-index"),
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Pools::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn put_get_has() {
        let pool = Pool::new("test");
        assert!(!pool.has(b"k"));
        assert_eq!(pool.get(b"k"), None);

        pool.put(b"k", b"v1");
        assert!(pool.has(b"k"));
        assert_eq!(pool.get(b"k"), Some(b"v1".to_vec()));

        pool.put(b"k", b"v2");
        assert_eq!(pool.get(b"k"), Some(b"v2".to_vec()));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn record_entries_carry_block_number_prefix() {
        let pool = Pool::new("test");
        pool.put_record(b"tx-id", &9u64.to_be_bytes(), b"packed");
        let value = pool.get(b"tx-id").unwrap();
        assert_eq!(&value[..8], &9u64.to_be_bytes());
        assert_eq!(&value[8..], b"packed");
    }

    #[test]
    fn last_is_largest_key() {
        let pool = Pool::new("test");
        assert_eq!(pool.last(), None);
        for n in [3u64, 1, 7, 5] {
            pool.put(&n.to_be_bytes(), &[n as u8]);
        }
        let (key, value) = pool.last().unwrap();
        assert_eq!(key, 7u64.to_be_bytes().to_vec());
        assert_eq!(value, vec![7]);
    }
}
