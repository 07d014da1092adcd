use crate::error::Error;
use ed25519_dalek::{ExpandedSecretKey, PublicKey, SecretKey, Signature, Signer};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// An Ed25519 keypair. The secret half is zeroized on drop.
///
/// The core never sources its own entropy: callers always hand in the
/// CSPRNG, which in the swarm is seeded once at construction from the
/// host-provided `rng_seed` (see `Swarm::new`).
pub struct Keypair {
    secret_bytes: [u8; 32],
    public: PublicKey,
}

impl Keypair {
    /// Generates a fresh keypair from the given CSPRNG.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let dalek = ed25519_dalek::Keypair::generate(rng);
        Keypair {
            secret_bytes: dalek.secret.to_bytes(),
            public: dalek.public,
        }
    }

    /// Rebuilds a keypair from a 32-byte Ed25519 secret scalar.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, Error> {
        let secret = SecretKey::from_bytes(&bytes).map_err(|_| Error::BadKey)?;
        let public = PublicKey::from(&secret);
        Ok(Keypair {
            secret_bytes: bytes,
            public,
        })
    }

    pub fn public(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.public.to_bytes())
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        let secret = SecretKey::from_bytes(&self.secret_bytes).expect("valid secret scalar");
        let expanded = ExpandedSecretKey::from(&secret);
        let sig: Signature = expanded.sign(msg, &self.public);
        sig.to_bytes()
    }
}

/// The canonical 32-byte encoding of an Ed25519 public key.
///
/// The inner bytes are only reachable within this crate: every other crate
/// must go through [`PublicKeyBytes::from_bytes`], which rejects encodings
/// that aren't valid Ed25519 points, so a `PeerId` can never be derived from
/// an unvalidated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes(pub(crate) [u8; 32]);

impl PublicKeyBytes {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let public = PublicKey::from_bytes(bytes).map_err(|_| Error::BadKey)?;
        Ok(PublicKeyBytes(public.to_bytes()))
    }

    pub fn verify(&self, msg: &[u8], signature: &[u8; 64]) -> bool {
        let public = match PublicKey::from_bytes(&self.0) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let sig = match Signature::from_bytes(signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        public.verify_strict(msg, &sig).is_ok()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret_bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sign_and_verify_roundtrip() {
        let mut rng = StdRng::seed_from_u64(1);
        let kp = Keypair::generate(&mut rng);
        let sig = kp.sign(b"hello");
        assert!(kp.public().verify(b"hello", &sig));
        assert!(!kp.public().verify(b"goodbye", &sig));
    }
}
