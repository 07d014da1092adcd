//! Noise XX handshake state machine and the framed AEAD record channel it
//! produces. Pure state over in-memory buffers: no sockets, no async, no
//! internal clock.

mod cipher;
mod error;
mod framed;
mod session;

pub use cipher::{Cipher, MAX_CIPHERTEXT};
pub use error::Error;
pub use framed::FramedChannel;
pub use session::{Phase, Role, Session};
