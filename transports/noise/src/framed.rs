use crate::cipher::Cipher;
use crate::error::Error;

const LENGTH_PREFIX_LEN: usize = 2;

/// Length-prefixed, AEAD-protected record channel built on top of an
/// established Noise session: `u16-be length || ciphertext-with-tag`.
///
/// This is sans-I/O: [`feed`](Self::feed) only buffers bytes handed in by
/// the driver, and [`decode_next`](Self::decode_next) pulls out whatever
/// complete records are available so far.
pub struct FramedChannel {
    cipher_out: Cipher,
    cipher_in: Cipher,
    inbound: Vec<u8>,
}

impl FramedChannel {
    pub fn new(cipher_out: Cipher, cipher_in: Cipher) -> Self {
        FramedChannel {
            cipher_out,
            cipher_in,
            inbound: Vec::new(),
        }
    }

    /// Encrypts and frames one outbound record.
    pub fn encode(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let ciphertext = self.cipher_out.encrypt(plaintext)?;
        let len: u16 = ciphertext
            .len()
            .try_into()
            .map_err(|_| Error::MalformedFrame)?;
        let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + ciphertext.len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Buffers raw bytes received from the driver.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Decrypts and returns the next complete record, if the buffer holds
    /// one yet. `Ok(None)` means the caller should wait for more bytes.
    pub fn decode_next(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.inbound.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let len = u16::from_be_bytes([self.inbound[0], self.inbound[1]]) as usize;
        if self.inbound.len() < LENGTH_PREFIX_LEN + len {
            return Ok(None);
        }
        let record: Vec<u8> = self
            .inbound
            .drain(0..LENGTH_PREFIX_LEN + len)
            .skip(LENGTH_PREFIX_LEN)
            .collect();
        let plaintext = self.cipher_in.decrypt(&record)?;
        Ok(Some(plaintext))
    }

    pub fn has_buffered_bytes(&self) -> bool {
        !self.inbound.is_empty()
    }

    pub fn buffered_len(&self) -> usize {
        self.inbound.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    fn channel_pair() -> (FramedChannel, FramedChannel) {
        let mut a = Session::initiate(b"", [1u8; 32]).unwrap();
        let mut b = Session::respond(b"", [2u8; 32]).unwrap();
        let m1 = a.write_message(&[]).unwrap();
        b.read_message(&m1).unwrap();
        let m2 = b.write_message(&[]).unwrap();
        a.read_message(&m2).unwrap();
        let m3 = a.write_message(&[]).unwrap();
        b.read_message(&m3).unwrap();
        let (a_out, a_in, _) = a.finish().unwrap();
        let (b_out, b_in, _) = b.finish().unwrap();
        (FramedChannel::new(a_out, a_in), FramedChannel::new(b_out, b_in))
    }

    #[test]
    fn single_record_roundtrip() {
        let (mut a, mut b) = channel_pair();
        let framed = a.encode(b"hello").unwrap();
        b.feed(&framed);
        assert_eq!(b.decode_next().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(b.decode_next().unwrap(), None);
    }

    #[test]
    fn partial_delivery_waits_for_full_record() {
        let (mut a, mut b) = channel_pair();
        let framed = a.encode(b"split me").unwrap();
        let (first, second) = framed.split_at(3);
        b.feed(first);
        assert_eq!(b.decode_next().unwrap(), None);
        b.feed(second);
        assert_eq!(b.decode_next().unwrap(), Some(b"split me".to_vec()));
    }

    #[test]
    fn multiple_records_in_one_feed_decode_in_order() {
        let (mut a, mut b) = channel_pair();
        let mut bytes = a.encode(b"one").unwrap();
        bytes.extend(a.encode(b"two").unwrap());
        b.feed(&bytes);
        assert_eq!(b.decode_next().unwrap(), Some(b"one".to_vec()));
        assert_eq!(b.decode_next().unwrap(), Some(b"two".to_vec()));
        assert_eq!(b.decode_next().unwrap(), None);
    }
}
