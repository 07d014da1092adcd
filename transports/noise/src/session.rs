use crate::cipher::Cipher;
use crate::error::Error;
use snow::Builder;
use std::cell::RefCell;
use std::rc::Rc;

const NOISE_PARAMS: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Handshake progress. `Established` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    EphSent,
    EphRecv,
    StaticSent,
    StaticRecv,
    Established,
    Failed,
}

/// A Noise XX handshake in progress (or finished).
///
/// The three-message exchange is `-> e`, `<- e, ee, s, es`, `-> s, se`; each
/// `write_message`/`read_message` call advances [`Phase`] by exactly one
/// step and fails with [`Error::NoiseOutOfTurn`] if called out of sequence.
pub struct Session {
    role: Role,
    phase: Phase,
    handshake: Option<snow::HandshakeState>,
    remote_static: Option<[u8; 32]>,
}

impl Session {
    pub fn initiate(prologue: &[u8], static_key: [u8; 32]) -> Result<Self, Error> {
        let params = parse_params();
        let handshake = Builder::new(params)
            .local_private_key(&static_key)
            .prologue(prologue)
            .build_initiator()
            .map_err(|_| Error::NoiseAuthFail)?;
        Ok(Session {
            role: Role::Initiator,
            phase: Phase::Init,
            handshake: Some(handshake),
            remote_static: None,
        })
    }

    pub fn respond(prologue: &[u8], static_key: [u8; 32]) -> Result<Self, Error> {
        let params = parse_params();
        let handshake = Builder::new(params)
            .local_private_key(&static_key)
            .prologue(prologue)
            .build_responder()
            .map_err(|_| Error::NoiseAuthFail)?;
        Ok(Session {
            role: Role::Responder,
            phase: Phase::Init,
            handshake: Some(handshake),
            remote_static: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether it is currently our turn to call [`write_message`](Self::write_message).
    pub fn can_write(&self) -> bool {
        matches!(
            (self.role, self.phase),
            (Role::Initiator, Phase::Init)
                | (Role::Initiator, Phase::StaticRecv)
                | (Role::Responder, Phase::EphRecv)
        )
    }

    fn can_read(&self) -> bool {
        matches!(
            (self.role, self.phase),
            (Role::Initiator, Phase::EphSent)
                | (Role::Responder, Phase::Init)
                | (Role::Responder, Phase::StaticSent)
        )
    }

    /// Valid only when it is our turn to send.
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        if !self.can_write() {
            return Err(Error::NoiseOutOfTurn);
        }
        let hs = self.handshake.as_mut().expect("handshake present while not Established/Failed");
        let mut buf = vec![0u8; payload.len() + 256];
        let len = hs.write_message(payload, &mut buf).map_err(|_| {
            self.phase = Phase::Failed;
            log::warn!("noise handshake failed encrypting message as {:?}", self.role);
            Error::NoiseAuthFail
        })?;
        buf.truncate(len);
        self.advance_after_write();
        Ok(buf)
    }

    /// Valid only when it is their turn, i.e. we're expecting a message.
    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>, Error> {
        if !self.can_read() {
            return Err(Error::NoiseOutOfTurn);
        }
        let hs = self.handshake.as_mut().expect("handshake present while not Established/Failed");
        let mut buf = vec![0u8; message.len()];
        let len = hs.read_message(message, &mut buf).map_err(|_| {
            self.phase = Phase::Failed;
            log::warn!("noise handshake auth failed decrypting message as {:?}", self.role);
            Error::NoiseAuthFail
        })?;
        buf.truncate(len);
        self.advance_after_read();
        Ok(buf)
    }

    fn advance_after_write(&mut self) {
        self.phase = match (self.role, self.phase) {
            (Role::Initiator, Phase::Init) => Phase::EphSent,
            (Role::Initiator, Phase::StaticRecv) => Phase::Established,
            (Role::Responder, Phase::EphRecv) => Phase::StaticSent,
            _ => unreachable!("write_message is guarded by can_write"),
        };
        self.capture_remote_static_if_established();
    }

    fn advance_after_read(&mut self) {
        self.phase = match (self.role, self.phase) {
            (Role::Initiator, Phase::EphSent) => Phase::StaticRecv,
            (Role::Responder, Phase::Init) => Phase::EphRecv,
            (Role::Responder, Phase::StaticSent) => Phase::Established,
            _ => unreachable!("read_message is guarded by can_read"),
        };
        self.capture_remote_static_if_established();
    }

    fn capture_remote_static_if_established(&mut self) {
        if self.phase == Phase::Established {
            self.remote_static = self
                .handshake
                .as_ref()
                .and_then(|h| h.get_remote_static())
                .map(|s| {
                    let mut out = [0u8; 32];
                    out.copy_from_slice(s);
                    out
                });
            log::trace!("noise handshake established as {:?}", self.role);
        }
    }

    /// Consumes the session, yielding the two directional ciphers and the
    /// peer's static public key. Valid only at `Established`.
    pub fn finish(mut self) -> Result<(Cipher, Cipher, [u8; 32]), Error> {
        if self.phase != Phase::Established {
            return Err(Error::NoiseOutOfTurn);
        }
        let handshake = self.handshake.take().expect("handshake present at Established");
        let transport = handshake
            .into_transport_mode()
            .map_err(|_| Error::NoiseAuthFail)?;
        let remote_static = self.remote_static.ok_or(Error::NoiseAuthFail)?;
        let shared = Rc::new(RefCell::new(transport));
        Ok((Cipher::new(shared.clone()), Cipher::new(shared), remote_static))
    }
}

fn parse_params() -> snow::params::NoiseParams {
    NOISE_PARAMS.parse().expect("Noise_XX_25519_ChaChaPoly_SHA256 is a well-formed params string")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn full_handshake_reaches_established_and_transfers_data() {
        let mut initiator = Session::initiate(b"", static_key(1)).unwrap();
        let mut responder = Session::respond(b"", static_key(2)).unwrap();

        let msg1 = initiator.write_message(&[]).unwrap();
        assert_eq!(initiator.phase(), Phase::EphSent);
        responder.read_message(&msg1).unwrap();
        assert_eq!(responder.phase(), Phase::EphRecv);

        let msg2 = responder.write_message(&[]).unwrap();
        assert_eq!(responder.phase(), Phase::StaticSent);
        initiator.read_message(&msg2).unwrap();
        assert_eq!(initiator.phase(), Phase::StaticRecv);

        let msg3 = initiator.write_message(&[]).unwrap();
        assert_eq!(initiator.phase(), Phase::Established);
        responder.read_message(&msg3).unwrap();
        assert_eq!(responder.phase(), Phase::Established);

        let (mut init_out, mut init_in, init_remote) = initiator.finish().unwrap();
        let (mut resp_out, mut resp_in, resp_remote) = responder.finish().unwrap();

        // Each side learned the other's static key.
        assert_ne!(init_remote, resp_remote);

        let ct = init_out.encrypt(b"hi").unwrap();
        let pt = resp_in.decrypt(&ct).unwrap();
        assert_eq!(pt, b"hi");

        let ct2 = resp_out.encrypt(b"yo").unwrap();
        let pt2 = init_in.decrypt(&ct2).unwrap();
        assert_eq!(pt2, b"yo");

        assert_eq!(init_out.nonce(), 1);
        assert_eq!(resp_in.nonce(), 1);
    }

    #[test]
    fn out_of_turn_write_fails() {
        let mut responder = Session::respond(b"", static_key(2)).unwrap();
        // Responder may not write first.
        assert_eq!(responder.write_message(&[]), Err(Error::NoiseOutOfTurn));
    }

    #[test]
    fn tampered_ciphertext_fails_auth_and_marks_session_failed() {
        let mut initiator = Session::initiate(b"", static_key(1)).unwrap();
        let mut responder = Session::respond(b"", static_key(2)).unwrap();
        let msg1 = initiator.write_message(&[]).unwrap();
        let mut tampered = msg1.clone();
        *tampered.last_mut().unwrap() ^= 0xff;
        assert_eq!(responder.read_message(&tampered), Err(Error::NoiseAuthFail));
        assert_eq!(responder.phase(), Phase::Failed);
    }
}
