//! Addressing and connection-identity primitives shared across the sansp2p core.

mod connection;
mod error;
mod multiaddr;

pub use connection::{ConnectionId, ConnectionIdAllocator, Direction};
pub use error::Error;
pub use multiaddr::{Multiaddr, Protocol};

pub use sansp2p_identity::PeerId;
