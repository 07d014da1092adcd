use crate::config::Config;
use crate::error::Error;
use crate::rpc::{MessageId, TopicId};
use sansp2p_core::PeerId;
use std::collections::{HashMap, VecDeque};

/// A message kept for de-duplication and for answering IWANT requests.
///
/// The wire description only needs `payload_hash` for duplicate detection,
/// but IWANT replies must carry the original bytes, so both are kept.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub topic: TopicId,
    pub source: PeerId,
    pub seqno: u64,
    pub payload_hash: [u8; 32],
    pub data: Vec<u8>,
}

/// A sliding window of recently-seen messages, shifted one slot per heartbeat.
/// `windows[0]` is the current (newest) slot. Each entry is stamped with the
/// time it was inserted so `contains` can stop suppressing an id once
/// `seen_ttl_ms` has passed, independent of the count-based window eviction.
pub struct MessageCache {
    windows: VecDeque<HashMap<MessageId, (u64, CacheEntry)>>,
    history: usize,
    gossip_history: usize,
    max_per_window: usize,
    seen_ttl_ms: u64,
}

impl MessageCache {
    pub fn new(config: &Config) -> Self {
        let mut windows = VecDeque::with_capacity(config.heartbeat_history);
        windows.push_front(HashMap::new());
        MessageCache {
            windows,
            history: config.heartbeat_history,
            gossip_history: config.gossip_history,
            max_per_window: config.max_messages_per_window,
            seen_ttl_ms: config.seen_ttl_ms,
        }
    }

    /// Whether `id` is still suppressed as a duplicate: present in some
    /// window and inserted less than `seen_ttl_ms` ago.
    pub fn contains(&self, id: &MessageId, now_ms: u64) -> bool {
        self.windows.iter().find_map(|w| w.get(id)).map_or(false, |(seen_at, _)| {
            now_ms.saturating_sub(*seen_at) < self.seen_ttl_ms
        })
    }

    pub fn get(&self, id: &MessageId) -> Option<&CacheEntry> {
        self.windows.iter().find_map(|w| w.get(id)).map(|(_, entry)| entry)
    }

    /// Inserts a message into the current window. A no-op (returns `Ok`) if
    /// the id is still suppressed as a duplicate (see [`Self::contains`]).
    pub fn insert(&mut self, id: MessageId, entry: CacheEntry, now_ms: u64) -> Result<(), Error> {
        if self.contains(&id, now_ms) {
            return Ok(());
        }
        let current = self.windows.front_mut().expect("at least one window always present");
        if current.len() >= self.max_per_window {
            log::warn!("mcache window full at {} entries, dropping message for topic {}", self.max_per_window, entry.topic);
            return Err(Error::McacheFull);
        }
        current.insert(id, (now_ms, entry));
        Ok(())
    }

    /// Rotates in a fresh window, evicting the oldest once `history` is exceeded.
    pub fn shift(&mut self) {
        self.windows.push_front(HashMap::new());
        while self.windows.len() > self.history {
            self.windows.pop_back();
        }
    }

    /// Message ids eligible for an IHAVE gossip announcement for `topic`,
    /// drawn from the `gossip_history` most recent windows.
    pub fn gossip_ids(&self, topic: &str) -> Vec<MessageId> {
        self.windows
            .iter()
            .take(self.gossip_history)
            .flat_map(|w| w.iter().filter(|(_, (_, e))| e.topic == topic).map(|(id, _)| *id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sansp2p_identity::{Keypair, PublicKeyBytes};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn peer(seed: u64) -> PeerId {
        let mut rng = StdRng::seed_from_u64(seed);
        let kp = Keypair::generate(&mut rng);
        PeerId::from_public_key(&kp.public())
    }

    fn entry(topic: &str, source: PeerId, seqno: u64) -> CacheEntry {
        CacheEntry {
            topic: topic.to_string(),
            source,
            seqno,
            payload_hash: [0u8; 32],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut cache = MessageCache::new(&Config::default());
        let source = peer(1);
        let id = MessageId::for_message(&source, 1);
        cache.insert(id, entry("x", source, 1), 0).unwrap();
        cache.insert(id, entry("x", source, 1), 0).unwrap();
        assert!(cache.contains(&id, 0));
    }

    #[test]
    fn shift_evicts_beyond_history_but_keeps_recent() {
        let mut config = Config::default();
        config.heartbeat_history = 2;
        let mut cache = MessageCache::new(&config);
        let source = peer(2);
        let id = MessageId::for_message(&source, 1);
        cache.insert(id, entry("x", source, 1), 0).unwrap();
        assert!(cache.contains(&id, 0));
        cache.shift();
        assert!(cache.contains(&id, 0));
        cache.shift();
        assert!(!cache.contains(&id, 0));
    }

    #[test]
    fn gossip_ids_limited_to_gossip_history_window() {
        let mut config = Config::default();
        config.heartbeat_history = 5;
        config.gossip_history = 1;
        let mut cache = MessageCache::new(&config);
        let source = peer(3);
        let old_id = MessageId::for_message(&source, 1);
        cache.insert(old_id, entry("x", source, 1), 0).unwrap();
        cache.shift();
        let new_id = MessageId::for_message(&source, 2);
        cache.insert(new_id, entry("x", source, 2), 0).unwrap();

        let ids = cache.gossip_ids("x");
        assert!(ids.contains(&new_id));
        assert!(!ids.contains(&old_id));
    }

    #[test]
    fn full_window_rejects_further_inserts() {
        let mut config = Config::default();
        config.max_messages_per_window = 1;
        let mut cache = MessageCache::new(&config);
        let source = peer(4);
        cache
            .insert(MessageId::for_message(&source, 1), entry("x", source, 1), 0)
            .unwrap();
        let result = cache.insert(MessageId::for_message(&source, 2), entry("x", source, 2), 0);
        assert_eq!(result, Err(Error::McacheFull));
    }

    #[test]
    fn seen_ttl_lets_a_message_be_reinserted_once_expired() {
        let mut config = Config::default();
        config.seen_ttl_ms = 1_000;
        let mut cache = MessageCache::new(&config);
        let source = peer(5);
        let id = MessageId::for_message(&source, 1);
        cache.insert(id, entry("x", source, 1), 0).unwrap();

        assert!(cache.contains(&id, 500));
        assert!(!cache.contains(&id, 1_000));

        cache.insert(id, entry("x", source, 1), 1_000).unwrap();
        assert!(cache.contains(&id, 1_000));
        assert!(!cache.contains(&id, 2_000));
    }
}
