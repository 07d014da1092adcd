use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no connection with that id is known to this swarm")]
    UnknownConnection,
    #[error("bad multiaddr: {0}")]
    BadAddr(#[from] sansp2p_core::Error),
    #[error(transparent)]
    Noise(#[from] sansp2p_noise::Error),
    #[error(transparent)]
    Negotiation(#[from] sansp2p_multistream_select::Error),
    #[error(transparent)]
    Gossipsub(#[from] sansp2p_gossipsub::Error),
    #[error(transparent)]
    Ping(#[from] sansp2p_ping::Error),
    #[error(transparent)]
    Identity(#[from] sansp2p_identity::Error),
    #[error("per-connection inbound buffer exceeded its cap")]
    BufferOverflow,
    #[error("not subscribed to this topic and no fanout route is available")]
    NotSubscribed,
}
