use crate::config::Config;
use crate::error::Error;
use crate::mcache::{CacheEntry, MessageCache};
use crate::rpc::{Control, Message, MessageId, Rpc, SubOpt, TopicId};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use sansp2p_core::PeerId;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendToPeer { peer: PeerId, data: Vec<u8> },
    ScheduleHeartbeat { duration_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message {
        topic: TopicId,
        source: PeerId,
        message_id: MessageId,
        data: Vec<u8>,
    },
    /// Emitted on publish when no mesh or fanout peers are reachable for the topic.
    InsufficientPeers { topic: TopicId },
}

struct FanoutEntry {
    peers: HashSet<PeerId>,
    last_published_ms: u64,
}

/// Peer-id-only pub/sub state machine. Connection-level concerns (mapping a
/// peer to its live `ConnectionId`, routing `SendToPeer` onto the wire) are
/// the swarm's job; this type never sees a `ConnectionId`.
pub struct GossipSub {
    config: Config,
    local_peer: PeerId,
    rng: StdRng,
    subscriptions: HashSet<TopicId>,
    /// Full mesh membership per topic (peers we exchange messages with eagerly).
    mesh: HashMap<TopicId, HashSet<PeerId>>,
    /// Peers known to be subscribed to a topic, mesh or not.
    topic_peers: HashMap<TopicId, HashSet<PeerId>>,
    fanout: HashMap<TopicId, FanoutEntry>,
    connected_peers: HashSet<PeerId>,
    mcache: MessageCache,
    seqno: u64,
}

impl GossipSub {
    pub fn new(config: Config, local_peer: PeerId, rng_seed: u64) -> (Self, Vec<Action>) {
        let heartbeat_interval_ms = config.heartbeat_interval_ms;
        let gossipsub = GossipSub {
            mcache: MessageCache::new(&config),
            config,
            local_peer,
            rng: StdRng::seed_from_u64(rng_seed),
            subscriptions: HashSet::new(),
            mesh: HashMap::new(),
            topic_peers: HashMap::new(),
            fanout: HashMap::new(),
            connected_peers: HashSet::new(),
            seqno: 0,
        };
        (gossipsub, vec![Action::ScheduleHeartbeat { duration_ms: heartbeat_interval_ms }])
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    /// Announces subscription to every connected peer; mesh membership fills
    /// in on the next heartbeat rather than synchronously.
    pub fn subscribe(&mut self, topic: &str) -> Vec<Action> {
        if !self.subscriptions.insert(topic.to_string()) {
            return vec![];
        }
        self.mesh.entry(topic.to_string()).or_default();
        self.broadcast_subscription(topic, true)
    }

    pub fn unsubscribe(&mut self, topic: &str) -> Vec<Action> {
        if !self.subscriptions.remove(topic) {
            return vec![];
        }
        let mut actions = self.broadcast_subscription(topic, false);
        if let Some(peers) = self.mesh.remove(topic) {
            for peer in peers {
                actions.push(self.send_rpc(peer, Rpc { control: Control { prune: vec![topic.to_string()], ..Default::default() }, ..Default::default() }));
            }
        }
        actions
    }

    fn broadcast_subscription(&self, topic: &str, subscribe: bool) -> Vec<Action> {
        let rpc = Rpc {
            subscriptions: vec![SubOpt { topic: topic.to_string(), subscribe }],
            ..Default::default()
        };
        self.connected_peers
            .iter()
            .map(|peer| self.send_rpc(*peer, rpc.clone()))
            .collect()
    }

    /// Publishes to the topic's mesh if joined, otherwise to a fanout set
    /// that's lazily populated and expires after `fanout_ttl_ms` of disuse.
    pub fn publish(&mut self, topic: &str, data: Vec<u8>, now_ms: u64) -> Result<(Vec<Event>, Vec<Action>, MessageId), Error> {
        let seqno = self.seqno;
        self.seqno += 1;
        let message = Message { source: self.local_peer, seqno, topic: topic.to_string(), data: data.clone() };
        let id = message.id();

        let mut payload_hash_input = Sha256::new();
        payload_hash_input.update(&data);
        let mut payload_hash = [0u8; 32];
        payload_hash.copy_from_slice(&payload_hash_input.finalize());
        self.mcache.insert(
            id,
            CacheEntry { topic: topic.to_string(), source: self.local_peer, seqno, payload_hash, data },
            now_ms,
        )?;

        let targets = self.publish_targets(topic, now_ms);
        if targets.is_empty() {
            return Ok((vec![Event::InsufficientPeers { topic: topic.to_string() }], vec![], id));
        }
        let rpc = Rpc { messages: vec![message], ..Default::default() };
        let actions = targets.into_iter().map(|peer| self.send_rpc(peer, rpc.clone())).collect();
        Ok((vec![], actions, id))
    }

    fn publish_targets(&mut self, topic: &str, now_ms: u64) -> Vec<PeerId> {
        if let Some(mesh_peers) = self.mesh.get(topic) {
            if !mesh_peers.is_empty() {
                return mesh_peers.iter().copied().collect();
            }
        }
        let d = self.config.d;
        let candidates = self.topic_peers.get(topic).cloned().unwrap_or_default();
        let entry = self.fanout.entry(topic.to_string()).or_insert_with(|| FanoutEntry {
            peers: HashSet::new(),
            last_published_ms: now_ms,
        });
        entry.last_published_ms = now_ms;
        entry.peers.retain(|p| candidates.contains(p));
        while entry.peers.len() < d {
            let remaining: Vec<PeerId> = candidates.iter().filter(|p| !entry.peers.contains(*p)).copied().collect();
            match remaining.into_iter().choose(&mut self.rng) {
                Some(p) => {
                    entry.peers.insert(p);
                }
                None => break,
            }
        }
        entry.peers.iter().copied().collect()
    }

    pub fn handle_rpc(&mut self, from: PeerId, data: &[u8], now_ms: u64) -> Result<(Vec<Event>, Vec<Action>), Error> {
        let rpc = Rpc::decode(data)?;
        let mut events = Vec::new();
        let mut actions = Vec::new();

        for sub in &rpc.subscriptions {
            let peers = self.topic_peers.entry(sub.topic.clone()).or_default();
            if sub.subscribe {
                peers.insert(from);
            } else {
                peers.remove(&from);
                if let Some(mesh) = self.mesh.get_mut(&sub.topic) {
                    mesh.remove(&from);
                }
            }
        }

        for message in rpc.messages {
            let id = message.id();
            if self.mcache.contains(&id, now_ms) {
                continue;
            }
            let mut hasher = Sha256::new();
            hasher.update(&message.data);
            let mut payload_hash = [0u8; 32];
            payload_hash.copy_from_slice(&hasher.finalize());
            let topic = message.topic.clone();
            self.mcache.insert(
                id,
                CacheEntry {
                    topic: topic.clone(),
                    source: message.source,
                    seqno: message.seqno,
                    payload_hash,
                    data: message.data.clone(),
                },
                now_ms,
            )?;
            if self.subscriptions.contains(&topic) {
                events.push(Event::Message { topic: topic.clone(), source: message.source, message_id: id, data: message.data.clone() });
            }
            if let Some(mesh_peers) = self.mesh.get(&topic) {
                let forward = Rpc { messages: vec![message], ..Default::default() };
                for peer in mesh_peers.iter().filter(|p| **p != from) {
                    actions.push(self.send_rpc(*peer, forward.clone()));
                }
            }
        }

        if !rpc.control.is_empty() {
            actions.extend(self.handle_control(from, rpc.control, now_ms));
        }

        Ok((events, actions))
    }

    fn handle_control(&mut self, from: PeerId, control: Control, now_ms: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut wanted = Vec::new();
        for (_topic, ids) in &control.ihave {
            for id in ids {
                if !self.mcache.contains(id, now_ms) {
                    wanted.push(*id);
                }
            }
        }
        if !wanted.is_empty() {
            actions.push(self.send_rpc(
                from,
                Rpc { control: Control { iwant: wanted, ..Default::default() }, ..Default::default() },
            ));
        }

        for id in &control.iwant {
            if let Some(entry) = self.mcache.get(id) {
                let message = Message { source: entry.source, seqno: entry.seqno, topic: entry.topic.clone(), data: entry.data.clone() };
                actions.push(self.send_rpc(from, Rpc { messages: vec![message], ..Default::default() }));
            }
        }

        for topic in &control.graft {
            let mesh = self.mesh.entry(topic.clone()).or_default();
            if self.subscriptions.contains(topic) && mesh.len() < self.config.d_hi {
                mesh.insert(from);
            } else {
                actions.push(self.send_rpc(
                    from,
                    Rpc { control: Control { prune: vec![topic.clone()], ..Default::default() }, ..Default::default() },
                ));
            }
        }

        for topic in &control.prune {
            if let Some(mesh) = self.mesh.get_mut(topic) {
                mesh.remove(&from);
            }
        }

        actions
    }

    /// Grafts/prunes each topic's mesh toward `D`, gossips IHAVE to non-mesh
    /// peers, expires stale fanout entries, and rotates the message cache.
    pub fn heartbeat(&mut self, now_ms: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        let topics: Vec<TopicId> = self.subscriptions.iter().cloned().collect();

        for topic in &topics {
            let candidates = self.topic_peers.get(topic).cloned().unwrap_or_default();
            let mesh = self.mesh.entry(topic.clone()).or_default();

            if mesh.len() < self.config.d_lo {
                let need = self.config.d - mesh.len();
                let extra: Vec<PeerId> = candidates
                    .iter()
                    .filter(|p| !mesh.contains(*p))
                    .copied()
                    .choose_multiple(&mut self.rng, need);
                for peer in extra {
                    mesh.insert(peer);
                    actions.push(self.send_rpc(
                        peer,
                        Rpc { control: Control { graft: vec![topic.clone()], ..Default::default() }, ..Default::default() },
                    ));
                }
                log::trace!("heartbeat grafted {} into mesh for {topic}, now {}", topic, mesh.len());
            } else if mesh.len() > self.config.d_hi {
                let excess: Vec<PeerId> = mesh.iter().copied().choose_multiple(&mut self.rng, mesh.len() - self.config.d);
                for peer in excess {
                    mesh.remove(&peer);
                    actions.push(self.send_rpc(
                        peer,
                        Rpc { control: Control { prune: vec![topic.clone()], ..Default::default() }, ..Default::default() },
                    ));
                }
                log::trace!("heartbeat pruned mesh for {topic} down to {}", mesh.len());
            }

            let mesh_snapshot = self.mesh.get(topic).cloned().unwrap_or_default();
            let gossip_ids = self.mcache.gossip_ids(topic);
            if !gossip_ids.is_empty() {
                let lazy_candidates: Vec<PeerId> =
                    candidates.iter().filter(|p| !mesh_snapshot.contains(*p)).copied().collect();
                let lazy_targets = lazy_candidates.into_iter().choose_multiple(&mut self.rng, self.config.d_lazy);
                for peer in lazy_targets {
                    actions.push(self.send_rpc(
                        peer,
                        Rpc {
                            control: Control { ihave: vec![(topic.clone(), gossip_ids.clone())], ..Default::default() },
                            ..Default::default()
                        },
                    ));
                }
            }
        }

        self.fanout.retain(|_, entry| now_ms.saturating_sub(entry.last_published_ms) < self.config.fanout_ttl_ms);
        self.mcache.shift();
        actions.push(Action::ScheduleHeartbeat { duration_ms: self.config.heartbeat_interval_ms });
        actions
    }

    pub fn on_peer_connected(&mut self, peer: PeerId) -> Vec<Action> {
        self.connected_peers.insert(peer);
        if self.subscriptions.is_empty() {
            return vec![];
        }
        let rpc = Rpc {
            subscriptions: self.subscriptions.iter().map(|t| SubOpt { topic: t.clone(), subscribe: true }).collect(),
            ..Default::default()
        };
        vec![self.send_rpc(peer, rpc)]
    }

    pub fn on_peer_disconnected(&mut self, peer: PeerId) {
        self.connected_peers.remove(&peer);
        for peers in self.topic_peers.values_mut() {
            peers.remove(&peer);
        }
        for mesh in self.mesh.values_mut() {
            mesh.remove(&peer);
        }
        for entry in self.fanout.values_mut() {
            entry.peers.remove(&peer);
        }
    }

    fn send_rpc(&self, peer: PeerId, rpc: Rpc) -> Action {
        Action::SendToPeer { peer, data: rpc.encode() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sansp2p_identity::{Keypair, PublicKeyBytes};

    fn peer(seed: u64) -> PeerId {
        let mut rng = StdRng::seed_from_u64(seed);
        let kp = Keypair::generate(&mut rng);
        PeerId::from_public_key(&kp.public())
    }

    fn new_node(seed: u64) -> GossipSub {
        GossipSub::new(Config::default(), peer(seed), seed).0
    }

    #[test]
    fn subscribe_announces_to_connected_peers() {
        let mut node = new_node(1);
        let remote = peer(2);
        node.on_peer_connected(remote);
        let actions = node.subscribe("chat");
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::SendToPeer { peer, data } => {
                assert_eq!(*peer, remote);
                let rpc = Rpc::decode(data).unwrap();
                assert_eq!(rpc.subscriptions, vec![SubOpt { topic: "chat".into(), subscribe: true }]);
            }
            _ => panic!("expected SendToPeer"),
        }
    }

    #[test]
    fn heartbeat_grafts_subscribed_peers_into_mesh() {
        let mut node = new_node(10);
        node.subscribe("chat");
        for i in 0..8u64 {
            let p = peer(100 + i);
            node.on_peer_connected(p);
            node.handle_rpc(p, &Rpc { subscriptions: vec![SubOpt { topic: "chat".into(), subscribe: true }], ..Default::default() }.encode(), 0).unwrap();
        }
        let actions = node.heartbeat(1_000);
        let grafts = actions
            .iter()
            .filter(|a| matches!(a, Action::SendToPeer { .. }))
            .count();
        assert!(grafts >= node.config.d_lo);
        assert!(node.mesh.get("chat").unwrap().len() >= node.config.d_lo);
    }

    #[test]
    fn duplicate_message_is_not_redelivered() {
        let mut node = new_node(20);
        node.subscribe("chat");
        let remote = peer(21);
        node.on_peer_connected(remote);
        node.mesh.get_mut("chat").unwrap().insert(remote);

        let message = Message { source: remote, seqno: 1, topic: "chat".into(), data: b"hi".to_vec() };
        let rpc = Rpc { messages: vec![message.clone()], ..Default::default() };
        let (events1, _) = node.handle_rpc(remote, &rpc.encode(), 0).unwrap();
        assert_eq!(events1.len(), 1);
        let (events2, actions2) = node.handle_rpc(remote, &rpc.encode(), 0).unwrap();
        assert!(events2.is_empty());
        assert!(actions2.is_empty());
    }

    #[test]
    fn iwant_is_answered_with_full_message() {
        let mut node = new_node(30);
        node.subscribe("chat");
        let (_, _, id) = node.publish("chat", b"payload".to_vec(), 0).unwrap();
        let remote = peer(31);
        node.on_peer_connected(remote);

        let control = Control { iwant: vec![id], ..Default::default() };
        let actions = node.handle_control(remote, control, 0);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::SendToPeer { peer, data } => {
                assert_eq!(*peer, remote);
                let rpc = Rpc::decode(data).unwrap();
                assert_eq!(rpc.messages[0].data, b"payload".to_vec());
            }
            _ => panic!("expected SendToPeer"),
        }
    }

    #[test]
    fn disconnect_scrubs_peer_from_mesh_and_topic_peers() {
        let mut node = new_node(40);
        node.subscribe("chat");
        let remote = peer(41);
        node.on_peer_connected(remote);
        node.mesh.get_mut("chat").unwrap().insert(remote);
        node.topic_peers.entry("chat".into()).or_default().insert(remote);

        node.on_peer_disconnected(remote);
        assert!(!node.mesh.get("chat").unwrap().contains(&remote));
        assert!(!node.topic_peers.get("chat").unwrap().contains(&remote));
    }
}
