//! Sans-I/O GossipSub: mesh maintenance, message cache, and heartbeat engine.
//!
//! This crate speaks only in [`sansp2p_core::PeerId`] — it has no notion of a
//! connection. The swarm is expected to own the peer-id-to-connection
//! mapping and translate [`Action::SendToPeer`] into bytes on the wire.

mod behaviour;
mod config;
mod error;
mod mcache;
mod rpc;
mod wire;

pub use behaviour::{Action, Event, GossipSub};
pub use config::Config;
pub use error::Error;
pub use rpc::{Message, MessageId, SubOpt, TopicId};
