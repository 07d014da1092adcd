use crate::error::Error;
use crate::keypair::PublicKeyBytes;
use multihash::Multihash;

/// Multihash code for the "identity" hash function: the digest is the input unchanged.
const MULTIHASH_IDENTITY: u64 = 0x00;

/// libp2p's `KeyType` enum value for Ed25519, as used in the `PublicKey` protobuf message.
const KEY_TYPE_ED25519: u8 = 1;

/// A peer's identity, derived from its Ed25519 public key.
///
/// Equality is byte equality on the 32-byte key body; the multihash/base58
/// wrapping only matters for the textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    pub fn from_public_key(key: &PublicKeyBytes) -> Self {
        PeerId(*key.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encodes as a base58btc multihash, e.g. `12D3KooW...` for Ed25519 keys.
    pub fn encode_base58(&self) -> String {
        let proto = encode_public_key_proto(&self.0);
        let mh = Multihash::wrap(MULTIHASH_IDENTITY, &proto).expect("digest within size limit");
        bs58::encode(mh.to_bytes()).into_string()
    }

    pub fn decode_base58(s: &str) -> Result<Self, Error> {
        let bytes = bs58::decode(s).into_vec().map_err(|_| Error::BadBase58)?;
        let mh = Multihash::from_bytes(&bytes).map_err(|_| Error::BadBase58)?;
        if mh.code() != MULTIHASH_IDENTITY {
            return Err(Error::BadBase58);
        }
        let key_bytes = decode_public_key_proto(mh.digest()).ok_or(Error::BadBase58)?;
        Ok(PeerId(key_bytes))
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode_base58())
    }
}

/// Hand-rolled encode of the two-field `PublicKey` protobuf message
/// (`key_type` varint field 1, `data` bytes field 2) used by libp2p identity
/// multihashes. Both field numbers and all lengths here fit in one byte, so
/// a full varint encoder is unnecessary.
fn encode_public_key_proto(key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 2 + 32);
    out.push((1 << 3) | 0); // field 1, varint wire type
    out.push(KEY_TYPE_ED25519 as u8);
    out.push((2 << 3) | 2); // field 2, length-delimited wire type
    out.push(32);
    out.extend_from_slice(key);
    out
}

fn decode_public_key_proto(bytes: &[u8]) -> Option<[u8; 32]> {
    if bytes.len() != 36 {
        return None;
    }
    if bytes[0] != (1 << 3) || bytes[1] != KEY_TYPE_ED25519 {
        return None;
    }
    if bytes[2] != ((2 << 3) | 2) || bytes[3] != 32 {
        return None;
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[4..36]);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use quickcheck::{Arbitrary, Gen};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    impl Arbitrary for PeerId {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut rng = StdRng::seed_from_u64(u64::arbitrary(g));
            let keypair = Keypair::generate(&mut rng);
            PeerId::from_public_key(&keypair.public())
        }
    }

    quickcheck::quickcheck! {
        fn base58_roundtrip(id: PeerId) -> bool {
            PeerId::decode_base58(&id.encode_base58()) == Ok(id)
        }
    }

    #[test]
    fn base58_roundtrip_all_zero_key() {
        let key = PublicKeyBytes([0u8; 32]);
        let peer = PeerId::from_public_key(&key);
        let encoded = peer.encode_base58();
        assert!(encoded.starts_with("12D3KooW"), "got {encoded}");
        assert_eq!(PeerId::decode_base58(&encoded).unwrap(), peer);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(PeerId::decode_base58("not-base58!!!").is_err());
    }

    #[test]
    fn equality_is_structural() {
        let a = PeerId::from_public_key(&PublicKeyBytes([1u8; 32]));
        let b = PeerId::from_public_key(&PublicKeyBytes([1u8; 32]));
        let c = PeerId::from_public_key(&PublicKeyBytes([2u8; 32]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
