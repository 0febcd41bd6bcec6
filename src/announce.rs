use crate::avl::Tree;
use crate::constants::{ANNOUNCE_EXPIRY, ANNOUNCE_REBROADCAST};
use crate::error::{ChainError, Result};
use crate::mode::Mode;
use crate::time::create_timestamp;
use std::sync::Mutex;
use tracing::debug;

//
// Live peers, ordered by public key. The ordering is what matters: each
// node finds its overlay neighbour by walking to the next key on the ring,
// wrapping at the end. Entries expire passively and updates are
// rate-limited so a storm of identical announcements is not re-broadcast.
//

/// One announced peer
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub public_key: Vec<u8>,
    pub listeners: Vec<u8>,
    pub timestamp: u64,
}

/// Transport used to push a registration frame to another node
pub trait AnnounceClient {
    fn send(&mut self, frames: &[&[u8]]) -> Result<()>;
}

/// Collaborator that recomputes outgoing connections after this node's
/// own entry is planted.
pub trait ConnectionDirector: Send + Sync {
    fn determine_connections(&self);
}

/// Director that does nothing, for nodes without outbound management
pub struct NoDirector;

impl ConnectionDirector for NoDirector {
    fn determine_connections(&self) {}
}

#[derive(Debug)]
struct AnnounceData {
    public_key: Vec<u8>,
    listeners: Vec<u8>,
    peer_set: bool,
    peers: Tree<Vec<u8>, PeerEntry>,
    tree_changed: bool,
}

/// The announcement ring context, one per process.
pub struct Announce {
    inner: Mutex<AnnounceData>,
    mode: Mode,
    director: Box<dyn ConnectionDirector>,
}

impl Announce {
    pub fn new(mode: Mode, director: Box<dyn ConnectionDirector>) -> Self {
        Announce {
            inner: Mutex::new(AnnounceData {
                public_key: Vec::new(),
                listeners: Vec::new(),
                peer_set: false,
                peers: Tree::new(),
                tree_changed: false,
            }),
            mode,
            director,
        }
    }

    /// One-shot initialisation with this node's own identity. Plants the
    /// self entry and asks the director for outgoing connections.
    pub fn set_peer(&self, public_key: &[u8], listeners: &[u8]) -> Result<()> {
        {
            let mut data = self.inner.lock().unwrap();
            if data.peer_set {
                return Err(ChainError::AlreadyInitialised);
            }
            data.public_key = public_key.to_vec();
            data.listeners = listeners.to_vec();
            data.peer_set = true;

            add_peer_internal(&mut data, public_key, listeners, 0);
        }

        self.director.determine_connections();
        Ok(())
    }

    /// Admit a peer announcement.
    ///
    /// Returns `true` when the entry was added or refreshed and is worth
    /// relaying; `false` when it was expired, rate-limited or this node's
    /// own key.
    pub fn add_peer(&self, public_key: &[u8], listeners: &[u8], timestamp: u64) -> bool {
        let mut data = self.inner.lock().unwrap();
        add_peer_internal(&mut data, public_key, listeners, timestamp)
    }

    /// The peer after `public_key` on the ring, wrapping to the first
    /// entry when the key is absent or last. Fails only on an empty ring.
    pub fn get_next(&self, public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>, u64)> {
        let data = self.inner.lock().unwrap();
        let key = public_key.to_vec();

        let mut entry = None;
        if data.peers.search(&key).is_some() {
            entry = data.peers.successor(&key).map(|(_, peer)| peer);
        }
        if entry.is_none() {
            entry = data.peers.first().map(|(_, peer)| peer);
        }

        match entry {
            Some(peer) => Ok((peer.public_key.clone(), peer.listeners.clone(), peer.timestamp)),
            None => Err(ChainError::InvalidPublicKey),
        }
    }

    /// Compose a registration frame and hand it to the transport client.
    pub fn send_registration(&self, client: &mut dyn AnnounceClient, fn_name: &str) -> Result<()> {
        let data = self.inner.lock().unwrap();
        let chain = self.mode.chain_name();
        let timestamp = create_timestamp().to_be_bytes();

        client.send(&[
            fn_name.as_bytes(),
            chain.as_bytes(),
            &data.public_key,
            &data.listeners,
            &timestamp,
        ])
    }

    /// Has a new key entered the ring since the flag was last reset?
    pub fn tree_changed(&self) -> bool {
        self.inner.lock().unwrap().tree_changed
    }

    pub fn reset_tree_changed(&self) {
        self.inner.lock().unwrap().tree_changed = false;
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().peers.count()
    }
}

// admission with the lock already held
fn add_peer_internal(
    data: &mut AnnounceData,
    public_key: &[u8],
    listeners: &[u8],
    timestamp: u64,
) -> bool {
    let now = create_timestamp();

    // a supplied timestamp is only honoured when it is not in the future;
    // zero and future values both mean "now"
    let ts = if timestamp != 0 && timestamp <= now {
        timestamp
    } else {
        now
    };

    // ignore expired announcements
    if now - ts >= ANNOUNCE_EXPIRY {
        return false;
    }

    if let Some((existing, _rank)) = data.peers.search(&public_key.to_vec()) {
        if ts < existing.timestamp + ANNOUNCE_REBROADCAST {
            return false;
        }
    }

    let record_added = data.peers.insert(
        public_key.to_vec(),
        PeerEntry {
            public_key: public_key.to_vec(),
            listeners: listeners.to_vec(),
            timestamp: ts,
        },
    );

    debug!(
        "added: {}  nodes in the peer tree: {}",
        record_added,
        data.peers.count()
    );

    // own announcements are never propagated and never flag the tree
    if data.public_key == public_key {
        return false;
    }

    if record_added {
        data.tree_changed = true;
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mode::Chain;
    use std::convert::TryInto;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn announce() -> Announce {
        Announce::new(Mode::new(Chain::Testing), Box::new(NoDirector))
    }

    #[test]
    fn ring_wrap_around() {
        let announce = announce();
        assert!(announce.add_peer(&[0x01], b"tcp://one", 0));
        assert!(announce.add_peer(&[0x05], b"tcp://five", 0));
        assert!(announce.add_peer(&[0x0a], b"tcp://ten", 0));

        let (next, _, _) = announce.get_next(&[0x05]).unwrap();
        assert_eq!(next, vec![0x0a]);

        let (next, _, _) = announce.get_next(&[0x0a]).unwrap();
        assert_eq!(next, vec![0x01]);

        // an absent key wraps to the first entry
        let (next, _, _) = announce.get_next(&[0xff]).unwrap();
        assert_eq!(next, vec![0x01]);
    }

    #[test]
    fn cyclic_walk_visits_every_peer_once() {
        let announce = announce();
        let keys: Vec<Vec<u8>> = vec![
            vec![0x40],
            vec![0x02, 0x01],
            vec![0x90],
            vec![0x02],
            vec![0xfe],
        ];
        for key in &keys {
            assert!(announce.add_peer(key, b"l", 0));
        }

        let mut sorted = keys.clone();
        sorted.sort();

        for start in &keys {
            let mut visited = vec![];
            let mut current = start.clone();
            for _ in 0..keys.len() {
                let (next, _, _) = announce.get_next(&current).unwrap();
                visited.push(next.clone());
                current = next;
            }
            // one full revolution ends where it began
            assert_eq!(&current, start);

            let mut expected = sorted.clone();
            let pos = sorted.iter().position(|k| k == start).unwrap();
            expected.rotate_left(pos + 1);
            assert_eq!(visited, expected);
        }
    }

    #[test]
    fn rebroadcast_suppression() {
        let announce = announce();
        let now = create_timestamp();

        assert!(announce.add_peer(&[0x42], b"first", now));
        // half the rebroadcast interval later; still suppressed
        assert!(!announce.add_peer(&[0x42], b"second", now + ANNOUNCE_REBROADCAST / 2));

        let (_, listeners, _) = announce.get_next(&[0x00]).unwrap();
        assert_eq!(listeners, b"first".to_vec());
    }

    #[test]
    fn update_after_rebroadcast_interval() {
        let announce = announce();
        let now = create_timestamp();

        assert!(announce.add_peer(&[0x42], b"old", now - ANNOUNCE_REBROADCAST - 5));
        announce.reset_tree_changed();

        // a refresh is not a tree change, only new keys are
        assert!(announce.add_peer(&[0x42], b"new", now));
        assert!(!announce.tree_changed());
        assert_eq!(announce.count(), 1);

        let (_, listeners, _) = announce.get_next(&[0x00]).unwrap();
        assert_eq!(listeners, b"new".to_vec());
    }

    #[test]
    fn expired_announcement_is_rejected() {
        let announce = announce();
        let now = create_timestamp();

        assert!(!announce.add_peer(&[0x42], b"l", now - ANNOUNCE_EXPIRY - 1));
        assert_eq!(announce.count(), 0);
    }

    #[test]
    fn future_timestamp_falls_back_to_now() {
        let announce = announce();
        let now = create_timestamp();

        // far in the future, yet accepted as "now" rather than rejected
        assert!(announce.add_peer(&[0x42], b"l", now + 10 * ANNOUNCE_EXPIRY));
        let (_, _, ts) = announce.get_next(&[0x00]).unwrap();
        assert!(ts >= now && ts <= now + 2);
    }

    #[test]
    fn idempotent_rejection() {
        let announce = announce();
        let now = create_timestamp();

        assert!(announce.add_peer(&[0x42], b"l", now));
        assert!(!announce.add_peer(&[0x42], b"l", now));
    }

    #[test]
    fn self_announcements_are_suppressed_but_present() {
        let announce = announce();
        let self_key = [0x77u8];
        announce.set_peer(&self_key, b"tcp://self").unwrap();

        // never relayed
        assert!(!announce.add_peer(&self_key, b"tcp://self", 0));
        // never a tree change
        assert!(!announce.tree_changed());

        // yet the entry is on the ring
        let (next, listeners, _) = announce.get_next(&[0x00]).unwrap();
        assert_eq!(next, self_key.to_vec());
        assert_eq!(listeners, b"tcp://self".to_vec());
    }

    #[test]
    fn set_peer_is_one_shot() {
        let announce = announce();
        announce.set_peer(&[0x01], b"l").unwrap();
        assert_eq!(
            announce.set_peer(&[0x02], b"l"),
            Err(ChainError::AlreadyInitialised)
        );
    }

    #[test]
    fn set_peer_invokes_director() {
        struct CountingDirector(Arc<AtomicUsize>);
        impl ConnectionDirector for CountingDirector {
            fn determine_connections(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let announce = Announce::new(
            Mode::new(Chain::Testing),
            Box::new(CountingDirector(calls.clone())),
        );
        announce.set_peer(&[0x01], b"l").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_next_on_empty_ring_fails() {
        let announce = announce();
        assert_eq!(
            announce.get_next(&[0x01]),
            Err(ChainError::InvalidPublicKey)
        );
    }

    #[test]
    fn new_key_flags_tree_change() {
        let announce = announce();
        assert!(!announce.tree_changed());
        announce.add_peer(&[0x01], b"l", 0);
        assert!(announce.tree_changed());

        announce.reset_tree_changed();
        assert!(!announce.tree_changed());
    }

    #[test]
    fn registration_frame_layout() {
        struct RecordingClient {
            frames: Vec<Vec<u8>>,
        }
        impl AnnounceClient for RecordingClient {
            fn send(&mut self, frames: &[&[u8]]) -> Result<()> {
                self.frames = frames.iter().map(|f| f.to_vec()).collect();
                Ok(())
            }
        }

        let announce = announce();
        announce.set_peer(&[0x09], b"tcp://self").unwrap();

        let mut client = RecordingClient { frames: vec![] };
        announce.send_registration(&mut client, "R").unwrap();

        assert_eq!(client.frames.len(), 5);
        assert_eq!(client.frames[0], b"R".to_vec());
        assert_eq!(client.frames[1], b"testing".to_vec());
        assert_eq!(client.frames[2], vec![0x09]);
        assert_eq!(client.frames[3], b"tcp://self".to_vec());
        assert_eq!(client.frames[4].len(), 8);

        let sent = u64::from_be_bytes(client.frames[4][..].try_into().unwrap());
        let now = create_timestamp();
        assert!(sent <= now && sent + 5 > now);
    }
}
