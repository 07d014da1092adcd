use crate::error::Error;
use snow::TransportState;
use std::cell::RefCell;
use std::rc::Rc;

const TAG_LEN: usize = 16;
/// Noise records are `u16`-length prefixed; ciphertext (including the tag)
/// can never exceed this.
pub const MAX_CIPHERTEXT: usize = 65535;

/// One direction of an established Noise session. `cipher_out` and
/// `cipher_in` share the underlying [`TransportState`] (it already keeps
/// independent send/receive nonce counters) but each tracks its own
/// monotonic nonce for the invariant that a cipher's emitted nonces never
/// repeat or go backwards.
pub struct Cipher {
    transport: Rc<RefCell<TransportState>>,
    nonce: u64,
}

impl Cipher {
    pub(crate) fn new(transport: Rc<RefCell<TransportState>>) -> Self {
        Cipher { transport, nonce: 0 }
    }

    /// Encrypts `plaintext`, returning the ciphertext-with-tag. Fails the
    /// connection with [`Error::NonceOverflow`] rather than wrapping.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        if plaintext.len() + TAG_LEN > MAX_CIPHERTEXT {
            return Err(Error::MalformedFrame);
        }
        let next_nonce = self.nonce.checked_add(1).ok_or(Error::NonceOverflow)?;
        let mut buf = vec![0u8; plaintext.len() + TAG_LEN];
        let len = self
            .transport
            .borrow_mut()
            .write_message(plaintext, &mut buf)
            .map_err(|_| Error::NoiseAuthFail)?;
        buf.truncate(len);
        self.nonce = next_nonce;
        Ok(buf)
    }

    /// Decrypts a ciphertext-with-tag. An AEAD tag mismatch surfaces as
    /// [`Error::NoiseAuthFail`]; the caller is responsible for closing the
    /// connection on that error.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let next_nonce = self.nonce.checked_add(1).ok_or(Error::NonceOverflow)?;
        let mut buf = vec![0u8; ciphertext.len()];
        let len = self
            .transport
            .borrow_mut()
            .read_message(ciphertext, &mut buf)
            .map_err(|_| Error::NoiseAuthFail)?;
        buf.truncate(len);
        self.nonce = next_nonce;
        Ok(buf)
    }

    /// The number of records this cipher has produced or consumed so far.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}
