//! Peer identity primitives: Ed25519 keypairs and the [`PeerId`] derived from them.
//!
//! This crate performs no I/O and owns no randomness source of its own;
//! every operation that needs entropy takes an explicit `&mut impl RngCore`.

mod error;
mod keypair;
mod peer_id;

pub use error::Error;
pub use keypair::{Keypair, PublicKeyBytes};
pub use peer_id::PeerId;
