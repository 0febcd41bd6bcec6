use crate::crypto::DeedHash;
use ahash::AHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

//
// Pending-transaction staging area. Records wait here between network
// arrival and block confirmation, indexed both by their own tx id and by
// the link they spend; a confirmed duplicate under a different tx id is
// still evicted through the link index.
//

#[derive(Debug, Default)]
struct PendingIndex {
    by_tx_id: AHashMap<DeedHash, Vec<u8>>,
    by_link: AHashMap<DeedHash, DeedHash>, // link -> pending tx id
}

/// The staging area, briefly quiesced while a block commits.
#[derive(Debug, Default)]
pub struct Reservoir {
    enabled: AtomicBool,
    pending: Mutex<PendingIndex>,
}

impl Reservoir {
    pub fn new() -> Self {
        Reservoir {
            enabled: AtomicBool::new(true),
            pending: Mutex::new(PendingIndex::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Disable for the scope of the returned guard. The guard re-enables
    /// on drop, so every exit path out of a commit restores processing,
    /// panics included.
    pub fn pause(&self) -> ReservoirPause<'_> {
        self.disable();
        ReservoirPause { reservoir: self }
    }

    /// Stage a pending record. Refused while the reservoir is disabled.
    pub fn insert_pending(&self, tx_id: DeedHash, link: Option<DeedHash>, packed: Vec<u8>) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut pending = self.pending.lock().unwrap();
        pending.by_tx_id.insert(tx_id, packed);
        if let Some(link) = link {
            pending.by_link.insert(link, tx_id);
        }
        true
    }

    pub fn has_pending(&self, tx_id: &DeedHash) -> bool {
        self.pending.lock().unwrap().by_tx_id.contains_key(tx_id)
    }

    pub fn delete_by_tx_id(&self, tx_id: &DeedHash) {
        let mut pending = self.pending.lock().unwrap();
        pending.by_tx_id.remove(tx_id);
        pending.by_link.retain(|_, id| id != tx_id);
    }

    /// Evict whatever pending record spends `link`, even when it was
    /// staged under a different tx id than the confirmed one.
    pub fn delete_by_link(&self, link: &DeedHash) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(tx_id) = pending.by_link.remove(link) {
            pending.by_tx_id.remove(&tx_id);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().by_tx_id.len()
    }
}

/// RAII guard from [`Reservoir::pause`]
pub struct ReservoirPause<'a> {
    reservoir: &'a Reservoir,
}

impl Drop for ReservoirPause<'_> {
    fn drop(&mut self) {
        self.reservoir.enable();
    }
}
