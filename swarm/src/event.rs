use sansp2p_core::ConnectionId;
use sansp2p_gossipsub::MessageId;
use sansp2p_identify::Info;
use sansp2p_identity::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Requested,
    NoiseAuthFail,
    NoiseOutOfTurn,
    BadNegotiation,
    BadKey,
    MalformedFrame,
    BufferOverflow,
    PingTimeout,
    HandshakeTimeout,
    PeerClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ConnectionSecured { conn_id: ConnectionId, peer_id: PeerId },
    ConnectionClosed { conn_id: ConnectionId, reason: CloseReason },
    Identified { conn_id: ConnectionId, peer_id: PeerId, info: Info },
    Pong { conn_id: ConnectionId, latency_ms: u64 },
    Message { topic: String, source: PeerId, message_id: MessageId, data: Vec<u8> },
    InsufficientPeers { topic: String },
}
