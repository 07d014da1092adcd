//! Sans-I/O peer-to-peer networking core implementing the libp2p protocol
//! family as deterministic state machines.
//!
//! This crate is a thin facade over the workspace's constituent crates: it
//! re-exports the pieces a host application actually drives ([`Swarm`] and
//! its [`Action`]/[`Event`] surface) and the identity/address types those
//! pieces speak in. The sub-protocols themselves ([`gossipsub`], [`ping`],
//! [`identify`], [`noise`]) are each gated behind a feature of the same name
//! and can be disabled independently; `swarm` and `multistream_select` are
//! always present since nothing works without a transport negotiation path.

pub use sansp2p_core::{ConnectionId, Direction, Error as CoreError, Multiaddr};
pub use sansp2p_identity::{Keypair, PeerId, PublicKeyBytes};
pub use sansp2p_swarm::{Action, CloseReason, Config, Error, Event, Swarm};

pub mod multistream_select {
    pub use sansp2p_multistream_select::*;
}

#[cfg(feature = "noise")]
pub mod noise {
    pub use sansp2p_noise::*;
}

#[cfg(feature = "ping")]
pub mod ping {
    pub use sansp2p_ping::*;
}

#[cfg(feature = "identify")]
pub mod identify {
    pub use sansp2p_identify::*;
}

#[cfg(feature = "gossipsub")]
pub mod gossipsub {
    pub use sansp2p_gossipsub::*;
}
