use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sansp2p_core::{ConnectionId, ConnectionIdAllocator, Direction, Multiaddr};
use sansp2p_gossipsub::GossipSub;
use sansp2p_identify::Info;
use sansp2p_identity::{Keypair, PeerId};

use crate::action::Action;
use crate::config::Config;
use crate::connection::{Connection, ConnOutput, ConnPhase, SUBSTREAM_GOSSIPSUB};
use crate::error::Error;
use crate::event::{CloseReason, Event};

/// What a timer id was scheduled for, so `on_timer` knows where to route it.
enum TimerPurpose {
    Ping(ConnectionId),
    HandshakeTimeout(ConnectionId),
    Heartbeat,
}

/// Heartbeat always reuses this fixed id: there is exactly one gossipsub
/// heartbeat per swarm, never concurrently outstanding more than once.
const HEARTBEAT_TIMER_ID: u64 = 0;

/// The central per-process dispatcher: owns every [`Connection`], the
/// swarm-wide [`GossipSub`] engine, and the action/event FIFOs the host
/// drains via [`Swarm::poll`] / [`Swarm::drain_events`].
pub struct Swarm {
    config: Config,
    identity: Keypair,
    rng: StdRng,
    connections: HashMap<ConnectionId, Connection>,
    conn_alloc: ConnectionIdAllocator,
    peer_conns: HashMap<PeerId, ConnectionId>,
    gossipsub: GossipSub,
    actions: VecDeque<Action>,
    events: VecDeque<Event>,
    next_pending_id: u64,
    next_listener_id: u64,
    next_timer_id: u64,
    timers: HashMap<u64, TimerPurpose>,
    local_info_template: Info,
}

impl Swarm {
    pub fn new(config: Config, identity_keypair: Keypair, rng_seed: u64) -> Self {
        let local_peer = PeerId::from_public_key(&identity_keypair.public());
        let (gossipsub, initial_actions) =
            GossipSub::new(config.gossipsub.clone(), local_peer, rng_seed.wrapping_add(1));

        let mut swarm = Swarm {
            config,
            identity: identity_keypair,
            rng: StdRng::seed_from_u64(rng_seed),
            connections: HashMap::new(),
            conn_alloc: ConnectionIdAllocator::default(),
            peer_conns: HashMap::new(),
            gossipsub,
            actions: VecDeque::new(),
            events: VecDeque::new(),
            next_pending_id: 0,
            next_listener_id: 0,
            next_timer_id: 1, // 0 is reserved for the heartbeat timer
            timers: HashMap::new(),
            local_info_template: Info {
                public_key: *local_peer.as_bytes(),
                listen_addrs: vec![],
                observed_addr: String::new(),
                protocols: vec![],
                agent_version: "sansp2p/0.1.0".to_string(),
            },
        };

        for action in initial_actions {
            swarm.translate_gossipsub_action(action);
        }
        swarm.timers.insert(HEARTBEAT_TIMER_ID, TimerPurpose::Heartbeat);
        swarm
    }

    pub fn local_peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.identity.public())
    }

    pub fn dial(&mut self, addr: &str) -> Result<u64, Error> {
        Multiaddr::parse(addr)?;
        let pending_id = self.next_pending_id;
        self.next_pending_id += 1;
        self.actions.push_back(Action::Dial { pending_id, addr: addr.to_string() });
        Ok(pending_id)
    }

    pub fn listen(&mut self, addr: &str) -> Result<u64, Error> {
        Multiaddr::parse(addr)?;
        let listener_id = self.next_listener_id;
        self.next_listener_id += 1;
        self.actions.push_back(Action::Listen { listener_id, addr: addr.to_string() });
        Ok(listener_id)
    }

    pub fn close(&mut self, conn_id: ConnectionId) -> Result<(), Error> {
        self.teardown_connection(conn_id, CloseReason::Requested)
    }

    pub fn subscribe(&mut self, topic: &str) {
        let actions = self.gossipsub.subscribe(topic);
        for action in actions {
            self.translate_gossipsub_action(action);
        }
    }

    pub fn unsubscribe(&mut self, topic: &str) {
        let actions = self.gossipsub.unsubscribe(topic);
        for action in actions {
            self.translate_gossipsub_action(action);
        }
    }

    pub fn publish(&mut self, topic: &str, data: Vec<u8>, now_ms: u64) -> Result<(), Error> {
        let (events, actions, _id) = self.gossipsub.publish(topic, data, now_ms)?;
        for event in events {
            self.events.push_back(translate_gossipsub_event(event));
        }
        for action in actions {
            self.translate_gossipsub_action(action);
        }
        Ok(())
    }

    pub fn poll(&mut self) -> Vec<Action> {
        self.actions.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn on_connection_opened(&mut self, _pending_id: u64, remote_addr: Option<&str>, direction: Direction) -> Result<ConnectionId, Error> {
        let conn_id = self.conn_alloc.next();
        let remote_addr = remote_addr.map(Multiaddr::parse).transpose()?;
        let ping_timer_id = self.alloc_timer_id();
        let handshake_timer_id = self.alloc_timer_id();
        let static_key = self.identity_static_key();
        let (conn, outbound) = Connection::new(
            conn_id,
            remote_addr,
            direction,
            static_key,
            self.config.max_inbound_buffer_bytes,
            ping_timer_id,
            handshake_timer_id,
        );
        self.timers.insert(ping_timer_id, TimerPurpose::Ping(conn_id));
        self.timers.insert(handshake_timer_id, TimerPurpose::HandshakeTimeout(conn_id));
        self.connections.insert(conn_id, conn);
        self.actions.push_back(Action::SetTimer {
            timer_id: handshake_timer_id,
            duration_ms: self.config.handshake_timeout_ms,
        });
        if !outbound.is_empty() {
            self.actions.push_back(Action::Send { conn_id, bytes: outbound });
        }
        Ok(conn_id)
    }

    pub fn on_data_received(&mut self, conn_id: ConnectionId, bytes: &[u8], now_ms: u64) -> Result<(), Error> {
        let local_info = self.local_info_template.clone();
        let ping_config = self.config.ping;
        let outputs = {
            let conn = self.connections.get_mut(&conn_id).ok_or(Error::UnknownConnection)?;
            conn.on_raw_bytes(bytes, now_ms, &mut self.rng, &local_info, ping_config)
        };

        let outputs = match outputs {
            Ok(outputs) => outputs,
            Err(err) => {
                self.teardown_connection(conn_id, close_reason_for(&err))?;
                return Ok(());
            }
        };

        for output in outputs {
            if let Err(err) = self.handle_conn_output(conn_id, output, now_ms) {
                self.teardown_connection(conn_id, close_reason_for(&err))?;
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn on_connection_closed(&mut self, conn_id: ConnectionId, _reason: &str) {
        let _ = self.teardown_connection(conn_id, CloseReason::PeerClosed);
    }

    pub fn on_timer(&mut self, timer_id: u64, now_ms: u64) -> Result<(), Error> {
        match self.timers.get(&timer_id) {
            Some(TimerPurpose::Heartbeat) => {
                let actions = self.gossipsub.heartbeat(now_ms);
                for action in actions {
                    self.translate_gossipsub_action(action);
                }
            }
            Some(TimerPurpose::Ping(conn_id)) => {
                let conn_id = *conn_id;
                let outputs = match self.connections.get_mut(&conn_id) {
                    Some(conn) if conn.phase == ConnPhase::Secured => conn.on_ping_timer(now_ms, &mut self.rng)?,
                    _ => vec![],
                };
                for output in outputs {
                    self.handle_conn_output(conn_id, output, now_ms)?;
                }
            }
            Some(TimerPurpose::HandshakeTimeout(conn_id)) => {
                let conn_id = *conn_id;
                if let Some(conn) = self.connections.get_mut(&conn_id) {
                    let output = conn.on_handshake_timeout();
                    self.handle_conn_output(conn_id, output, now_ms)?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn handle_conn_output(&mut self, conn_id: ConnectionId, output: ConnOutput, now_ms: u64) -> Result<(), Error> {
        match output {
            ConnOutput::SendRaw(bytes) => self.actions.push_back(Action::Send { conn_id, bytes }),
            ConnOutput::Close(reason) => {
                self.teardown_connection(conn_id, reason)?;
            }
            ConnOutput::Secured(peer_id) => {
                self.peer_conns.insert(peer_id, conn_id);
                self.events.push_back(Event::ConnectionSecured { conn_id, peer_id });
                let actions = self.gossipsub.on_peer_connected(peer_id);
                for action in actions {
                    self.translate_gossipsub_action(action);
                }
            }
            ConnOutput::Identified(info) => {
                if let Some(conn) = self.connections.get(&conn_id) {
                    if let Some(peer_id) = conn.remote_peer_id {
                        self.events.push_back(Event::Identified { conn_id, peer_id, info });
                    }
                }
            }
            ConnOutput::IdentifyFailed => {}
            ConnOutput::Pong { latency_ms } => {
                self.events.push_back(Event::Pong { conn_id, latency_ms });
            }
            ConnOutput::GossipsubRpc(payload) => {
                if let Some(conn) = self.connections.get(&conn_id) {
                    if let Some(peer_id) = conn.remote_peer_id {
                        let (events, actions) = self.gossipsub.handle_rpc(peer_id, &payload, now_ms)?;
                        for event in events {
                            self.events.push_back(translate_gossipsub_event(event));
                        }
                        for action in actions {
                            self.translate_gossipsub_action(action);
                        }
                    }
                }
            }
            ConnOutput::SetTimer { timer_id, duration_ms } => {
                self.actions.push_back(Action::SetTimer { timer_id, duration_ms });
            }
            ConnOutput::CancelTimer { timer_id } => {
                self.actions.push_back(Action::CancelTimer { timer_id });
            }
        }
        Ok(())
    }

    fn translate_gossipsub_action(&mut self, action: sansp2p_gossipsub::Action) {
        match action {
            sansp2p_gossipsub::Action::SendToPeer { peer, data } => {
                if let Some(&conn_id) = self.peer_conns.get(&peer) {
                    if let Some(conn) = self.connections.get_mut(&conn_id) {
                        if let Ok(bytes) = conn.send_on_substream(SUBSTREAM_GOSSIPSUB, &data) {
                            self.actions.push_back(Action::Send { conn_id, bytes });
                        }
                    }
                }
            }
            sansp2p_gossipsub::Action::ScheduleHeartbeat { duration_ms } => {
                self.actions.push_back(Action::SetTimer { timer_id: HEARTBEAT_TIMER_ID, duration_ms });
            }
        }
    }

    fn teardown_connection(&mut self, conn_id: ConnectionId, reason: CloseReason) -> Result<(), Error> {
        let conn = self.connections.remove(&conn_id).ok_or(Error::UnknownConnection)?;
        log::debug!("tearing down connection {conn_id:?}: {reason:?}");
        if let Some(peer_id) = conn.remote_peer_id {
            self.peer_conns.remove(&peer_id);
            self.gossipsub.on_peer_disconnected(peer_id);
        }
        self.actions.push_back(Action::CancelTimer { timer_id: conn.ping_timer_id });
        self.actions.push_back(Action::CancelTimer { timer_id: conn.handshake_timer_id });
        self.actions.push_back(Action::CloseConnection { conn_id });
        self.events.push_back(Event::ConnectionClosed { conn_id, reason });
        Ok(())
    }

    fn alloc_timer_id(&mut self) -> u64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        id
    }

    fn identity_static_key(&self) -> [u8; 32] {
        // Noise's static key is distinct from the long-term identity key in
        // real libp2p (it's signed by the identity key instead). This
        // minimal core reuses the identity key's bytes directly as the
        // Noise static key, which is sufficient for the handshake's
        // mutual-authentication guarantee without a separate signature step.
        *self.identity.public().as_bytes()
    }
}

/// Maps a pipeline error surfacing from [`Connection::on_raw_bytes`] onto the
/// specific [`CloseReason`] the driver sees in `ConnectionClosed`, per the
/// protocol-errors row of the error taxonomy.
fn close_reason_for(err: &Error) -> CloseReason {
    match err {
        Error::Noise(sansp2p_noise::Error::NoiseAuthFail) => CloseReason::NoiseAuthFail,
        Error::Noise(sansp2p_noise::Error::NoiseOutOfTurn) => CloseReason::NoiseOutOfTurn,
        Error::Noise(sansp2p_noise::Error::NonceOverflow) => CloseReason::MalformedFrame,
        Error::Noise(sansp2p_noise::Error::MalformedFrame) => CloseReason::MalformedFrame,
        Error::Negotiation(_) => CloseReason::BadNegotiation,
        Error::Gossipsub(_) => CloseReason::MalformedFrame,
        Error::Ping(_) => CloseReason::MalformedFrame,
        Error::Identity(_) => CloseReason::BadKey,
        _ => CloseReason::MalformedFrame,
    }
}

fn translate_gossipsub_event(event: sansp2p_gossipsub::Event) -> Event {
    match event {
        sansp2p_gossipsub::Event::Message { topic, source, message_id, data } => {
            Event::Message { topic, source, message_id, data }
        }
        sansp2p_gossipsub::Event::InsufficientPeers { topic } => Event::InsufficientPeers { topic },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_swarm(seed: u64) -> Swarm {
        let mut keygen_rng = StdRng::seed_from_u64(seed);
        let identity = Keypair::generate(&mut keygen_rng);
        Swarm::new(Config::default(), identity, seed)
    }

    /// Ferries `Send` actions between two swarms whose single open
    /// connection ids are `conn_a`/`conn_b` until neither side has any left
    /// to deliver. Other action kinds (timers, dial/listen) are irrelevant
    /// to this in-memory wiring and are dropped on the floor.
    fn pump(a: &mut Swarm, b: &mut Swarm, conn_a: ConnectionId, conn_b: ConnectionId, now_ms: u64) {
        for _ in 0..64 {
            let a_actions = a.poll();
            let b_actions = b.poll();
            let a_has_send = a_actions.iter().any(|act| matches!(act, Action::Send { .. }));
            let b_has_send = b_actions.iter().any(|act| matches!(act, Action::Send { .. }));
            if !a_has_send && !b_has_send {
                break;
            }
            for action in a_actions {
                if let Action::Send { bytes, .. } = action {
                    b.on_data_received(conn_b, &bytes, now_ms).unwrap();
                }
            }
            for action in b_actions {
                if let Action::Send { bytes, .. } = action {
                    a.on_data_received(conn_a, &bytes, now_ms).unwrap();
                }
            }
        }
    }

    fn open_pair(a: &mut Swarm, b: &mut Swarm) -> (ConnectionId, ConnectionId) {
        let conn_a = a.on_connection_opened(0, None, Direction::Outbound).unwrap();
        let conn_b = b.on_connection_opened(0, None, Direction::Inbound).unwrap();
        pump(a, b, conn_a, conn_b, 0);
        (conn_a, conn_b)
    }

    #[test]
    fn handshake_secures_and_identifies_both_ends() {
        let mut a = new_swarm(1);
        let mut b = new_swarm(2);
        let (conn_a, conn_b) = open_pair(&mut a, &mut b);

        let a_events = a.drain_events();
        let b_events = b.drain_events();

        assert!(a_events
            .iter()
            .any(|e| matches!(e, Event::ConnectionSecured { conn_id, peer_id } if *conn_id == conn_a && *peer_id == b.local_peer_id())));
        assert!(b_events
            .iter()
            .any(|e| matches!(e, Event::ConnectionSecured { conn_id, peer_id } if *conn_id == conn_b && *peer_id == a.local_peer_id())));
        assert!(a_events.iter().any(|e| matches!(e, Event::Identified { .. })));
        assert!(b_events.iter().any(|e| matches!(e, Event::Identified { .. })));
    }

    #[test]
    fn ping_cycle_reports_latency_on_both_sides() {
        let mut a = new_swarm(3);
        let mut b = new_swarm(4);
        // Both sides start their own outstanding ping the moment they reach
        // `Secured`; `open_pair`'s pump already carries the challenge/echo
        // exchange to completion, so the resulting events are checked
        // directly rather than via a further pump.
        let (_conn_a, _conn_b) = open_pair(&mut a, &mut b);

        let a_events = a.drain_events();
        let b_events = b.drain_events();
        assert!(a_events.iter().any(|e| matches!(e, Event::Pong { .. })));
        assert!(b_events.iter().any(|e| matches!(e, Event::Pong { .. })));
    }

    #[test]
    fn gossipsub_message_delivers_exactly_once_and_duplicates_are_suppressed() {
        let mut a = new_swarm(5);
        let mut b = new_swarm(6);
        let (conn_a, conn_b) = open_pair(&mut a, &mut b);
        a.drain_events();
        b.drain_events();

        a.subscribe("news");
        b.subscribe("news");
        pump(&mut a, &mut b, conn_a, conn_b, 100);

        // Subscription deltas are now known to both sides; a heartbeat
        // grafts the sole known peer into each mesh (see gossipsub's
        // heartbeat: it grafts whatever candidates are available even
        // below Dlo).
        a.on_timer(HEARTBEAT_TIMER_ID, 1_100).unwrap();
        b.on_timer(HEARTBEAT_TIMER_ID, 1_100).unwrap();
        pump(&mut a, &mut b, conn_a, conn_b, 1_100);

        a.publish("news", b"hello".to_vec(), 1_200).unwrap();
        pump(&mut a, &mut b, conn_a, conn_b, 1_200);

        let b_events = b.drain_events();
        let messages: Vec<_> = b_events
            .iter()
            .filter(|e| matches!(e, Event::Message { topic, .. } if topic == "news"))
            .collect();
        assert_eq!(messages.len(), 1);

        // Publishing the identical payload again increments the sender's
        // seqno, so it is a distinct message-id and is delivered again —
        // true duplicate suppression requires the *same* id, exercised
        // directly in the gossipsub crate's own tests.
        a.publish("news", b"hello".to_vec(), 1_300).unwrap();
        pump(&mut a, &mut b, conn_a, conn_b, 1_300);
        let second_batch = b.drain_events();
        assert_eq!(
            second_batch
                .iter()
                .filter(|e| matches!(e, Event::Message { topic, .. } if topic == "news"))
                .count(),
            1
        );
    }

    #[test]
    fn closing_a_connection_cancels_its_timers_and_emits_closed_event() {
        let mut a = new_swarm(7);
        let mut b = new_swarm(8);
        let (conn_a, _conn_b) = open_pair(&mut a, &mut b);
        a.drain_events();

        a.close(conn_a).unwrap();
        let actions = a.poll();
        assert!(actions.iter().any(|act| matches!(act, Action::CloseConnection { conn_id } if *conn_id == conn_a)));
        let events = a.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ConnectionClosed { conn_id, reason } if *conn_id == conn_a && *reason == CloseReason::Requested)));

        // A second close on the now-unknown id is a caller error, not a panic.
        assert!(matches!(a.close(conn_a), Err(Error::UnknownConnection)));
    }
}
