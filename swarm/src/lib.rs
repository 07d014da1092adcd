//! Sans-I/O connection registry and per-connection protocol dispatch.
//!
//! [`Swarm`] owns every [`connection::Connection`], drives them with raw
//! bytes and timer firings, and is the one place that knows how a
//! [`sansp2p_identity::PeerId`] maps onto a live [`sansp2p_core::ConnectionId`] —
//! the sub-protocol crates ([`sansp2p_gossipsub`], [`sansp2p_ping`],
//! [`sansp2p_identify`]) never see a connection id at all.

mod action;
mod config;
mod connection;
mod error;
mod event;
mod swarm;

pub use action::Action;
pub use config::Config;
pub use error::Error;
pub use event::{CloseReason, Event};
pub use swarm::Swarm;

pub use sansp2p_core::{ConnectionId, Direction};
