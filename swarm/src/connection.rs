use rand::rngs::StdRng;
use sansp2p_core::{ConnectionId, Direction, Multiaddr};
use sansp2p_identify::{Identify, Info};
use sansp2p_identity::PeerId;
use sansp2p_multistream_select::{Client, ClientProgress, Listener, ListenerStatus};
use sansp2p_noise::{FramedChannel, Phase as NoisePhase, Session};
use sansp2p_ping::Ping;

use crate::error::Error;
use crate::event::CloseReason;

/// Security protocol negotiated during `RawNegotiating`. There is only one
/// option, but the negotiation still goes through multistream-select so the
/// component is exercised exactly as it would be with more options.
const PROTO_NOISE: &str = "/noise";

/// Fixed substream ids. The minimal core has no stream multiplexer, so each
/// connection demultiplexes its single encrypted byte stream into a handful
/// of well-known logical substreams by prefixing every framed record with a
/// varint substream id (see DESIGN.md for the rationale).
pub const SUBSTREAM_IDENTIFY: u32 = 0;
pub const SUBSTREAM_PING: u32 = 1;
pub const SUBSTREAM_GOSSIPSUB: u32 = 2;

const HANDSHAKE_LEN_PREFIX: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnPhase {
    RawNegotiating,
    Handshaking,
    Secured,
    Closed,
}

enum RawNegotiator {
    Client(Client),
    Listener(Listener),
}

/// One effect falling out of feeding bytes (or a timer) into a [`Connection`].
/// The [`crate::Swarm`] translates these into driver-facing `Action`s and
/// `Event`s, since some of them (gossipsub routing, peer bookkeeping) need
/// swarm-wide state this type doesn't have access to.
pub enum ConnOutput {
    SendRaw(Vec<u8>),
    Close(CloseReason),
    Secured(PeerId),
    Identified(Info),
    IdentifyFailed,
    Pong { latency_ms: u64 },
    GossipsubRpc(Vec<u8>),
    SetTimer { timer_id: u64, duration_ms: u64 },
    CancelTimer { timer_id: u64 },
}

pub struct Connection {
    pub id: ConnectionId,
    pub remote_addr: Option<Multiaddr>,
    pub remote_peer_id: Option<PeerId>,
    pub direction: Direction,
    pub phase: ConnPhase,
    inbound: Vec<u8>,
    max_inbound_buffer_bytes: usize,
    raw: Option<RawNegotiator>,
    static_key: [u8; 32],
    noise: Option<Session>,
    framed: Option<FramedChannel>,
    identify: Option<Identify>,
    ping: Option<Ping>,
    pub ping_timer_id: u64,
    pub handshake_timer_id: u64,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        remote_addr: Option<Multiaddr>,
        direction: Direction,
        static_key: [u8; 32],
        max_inbound_buffer_bytes: usize,
        ping_timer_id: u64,
        handshake_timer_id: u64,
    ) -> (Self, Vec<u8>) {
        let (raw, outbound) = match direction {
            Direction::Outbound => {
                let (client, out) = Client::new(vec![PROTO_NOISE.to_string()])
                    .expect("at least one proposal is always given");
                (RawNegotiator::Client(client), out)
            }
            Direction::Inbound => (RawNegotiator::Listener(Listener::new(vec![PROTO_NOISE.to_string()])), vec![]),
        };
        let conn = Connection {
            id,
            remote_addr,
            remote_peer_id: None,
            direction,
            phase: ConnPhase::RawNegotiating,
            inbound: Vec::new(),
            max_inbound_buffer_bytes,
            raw: Some(raw),
            static_key,
            noise: None,
            framed: None,
            identify: None,
            ping: None,
            ping_timer_id,
            handshake_timer_id,
        };
        (conn, outbound)
    }

    /// The handshake-timeout timer fired. A no-op if the connection already
    /// reached `Secured` and the timer should have been cancelled — belt and
    /// braces against a timer the driver failed to cancel in time.
    pub fn on_handshake_timeout(&mut self) -> ConnOutput {
        if self.phase == ConnPhase::Secured {
            return ConnOutput::CancelTimer { timer_id: self.handshake_timer_id };
        }
        self.phase = ConnPhase::Closed;
        ConnOutput::Close(CloseReason::HandshakeTimeout)
    }

    pub fn on_raw_bytes(
        &mut self,
        bytes: &[u8],
        now_ms: u64,
        rng: &mut StdRng,
        local_identify_info: &Info,
        ping_config: sansp2p_ping::Config,
    ) -> Result<Vec<ConnOutput>, Error> {
        self.inbound.extend_from_slice(bytes);
        if self.inbound.len() > self.max_inbound_buffer_bytes {
            self.phase = ConnPhase::Closed;
            return Ok(vec![ConnOutput::Close(CloseReason::BufferOverflow)]);
        }

        match self.phase {
            ConnPhase::RawNegotiating => self.drive_raw_negotiation(now_ms, rng, local_identify_info, ping_config),
            ConnPhase::Handshaking => self.drive_handshake(now_ms, rng, local_identify_info, ping_config),
            ConnPhase::Secured => self.drive_secured(now_ms),
            ConnPhase::Closed => Ok(vec![]),
        }
    }

    fn drive_raw_negotiation(
        &mut self,
        now_ms: u64,
        rng: &mut StdRng,
        local_identify_info: &Info,
        ping_config: sansp2p_ping::Config,
    ) -> Result<Vec<ConnOutput>, Error> {
        let data = std::mem::take(&mut self.inbound);
        let raw = self.raw.as_mut().expect("present while RawNegotiating");
        let mut out = Vec::new();
        let mut negotiated = false;

        match raw {
            RawNegotiator::Client(client) => match client.on_data(&data)? {
                ClientProgress::NeedMoreData => {}
                ClientProgress::SendNextProposal(bytes) => out.push(ConnOutput::SendRaw(bytes)),
                ClientProgress::Selected { leftover, .. } => {
                    self.inbound = leftover;
                    negotiated = true;
                }
                ClientProgress::Unsupported => {
                    self.phase = ConnPhase::Closed;
                    return Ok(vec![ConnOutput::Close(CloseReason::BadNegotiation)]);
                }
            },
            RawNegotiator::Listener(listener) => {
                let progress = listener.on_data(&data)?;
                for frame in progress.outbound {
                    out.push(ConnOutput::SendRaw(frame));
                }
                if let ListenerStatus::Selected { leftover, .. } = progress.status {
                    self.inbound = leftover;
                    negotiated = true;
                }
            }
        }

        if !negotiated {
            return Ok(out);
        }

        self.raw = None;
        self.phase = ConnPhase::Handshaking;
        let session = match self.direction {
            Direction::Outbound => Session::initiate(b"", self.static_key)?,
            Direction::Inbound => Session::respond(b"", self.static_key)?,
        };
        self.noise = Some(session);
        if self.direction == Direction::Outbound {
            let msg = self.noise.as_mut().expect("just set").write_message(&[])?;
            out.push(ConnOutput::SendRaw(frame_handshake_message(&msg)));
        }

        let leftover = std::mem::take(&mut self.inbound);
        if !leftover.is_empty() {
            out.extend(self.drive_handshake(now_ms, rng, local_identify_info, ping_config)?);
        }
        Ok(out)
    }

    fn drive_handshake(
        &mut self,
        now_ms: u64,
        rng: &mut StdRng,
        local_identify_info: &Info,
        ping_config: sansp2p_ping::Config,
    ) -> Result<Vec<ConnOutput>, Error> {
        let mut out = Vec::new();
        loop {
            let Some(msg) = take_handshake_frame(&mut self.inbound) else {
                return Ok(out);
            };
            let session = self.noise.as_mut().expect("present while Handshaking");
            session.read_message(&msg)?;

            if session.can_write() {
                let reply = session.write_message(&[])?;
                out.push(ConnOutput::SendRaw(frame_handshake_message(&reply)));
            }

            let session = self.noise.as_ref().expect("present while Handshaking");
            if session.phase() == NoisePhase::Established {
                let session = self.noise.take().expect("checked above");
                let (cipher_out, cipher_in, remote_static) = session.finish()?;
                let remote_key = sansp2p_identity::PublicKeyBytes::from_bytes(&remote_static)?;
                let peer_id = PeerId::from_public_key(&remote_key);
                self.remote_peer_id = Some(peer_id);
                self.framed = Some(FramedChannel::new(cipher_out, cipher_in));
                self.phase = ConnPhase::Secured;
                log::trace!("connection {:?} secured with {peer_id:?}", self.id);
                out.push(ConnOutput::CancelTimer { timer_id: self.handshake_timer_id });
                out.push(ConnOutput::Secured(peer_id));

                let mut identify = Identify::new(local_identify_info.clone());
                let identify_bytes = identify.start();
                self.identify = Some(identify);
                out.push(ConnOutput::SendRaw(self.send_on_substream(SUBSTREAM_IDENTIFY, &identify_bytes)?));

                let mut ping = Ping::new(ping_config, self.ping_timer_id);
                let ping_actions = ping.start(now_ms, rng);
                self.ping = Some(ping);
                for action in ping_actions {
                    out.extend(self.translate_ping_action(action)?);
                }

                let leftover = std::mem::take(&mut self.inbound);
                if !leftover.is_empty() {
                    self.inbound = leftover;
                    out.extend(self.drive_secured(now_ms)?);
                }
                return Ok(out);
            }
        }
    }

    fn drive_secured(&mut self, now_ms: u64) -> Result<Vec<ConnOutput>, Error> {
        let mut out = Vec::new();
        let data = std::mem::take(&mut self.inbound);
        let framed = self.framed.as_mut().expect("present while Secured");
        framed.feed(&data);
        while let Some(record) = framed.decode_next()? {
            let (substream_id, payload) =
                decode_substream_frame(&record).ok_or(sansp2p_noise::Error::MalformedFrame)?;
            match substream_id {
                SUBSTREAM_IDENTIFY => {
                    let identify = self.identify.as_mut().expect("set on reaching Secured");
                    match identify.on_data(payload) {
                        sansp2p_identify::Event::Identified(info) => out.push(ConnOutput::Identified(info)),
                        sansp2p_identify::Event::Failed => out.push(ConnOutput::IdentifyFailed),
                    }
                }
                SUBSTREAM_PING => out.extend(self.handle_ping_payload(payload, now_ms)?),
                SUBSTREAM_GOSSIPSUB => out.push(ConnOutput::GossipsubRpc(payload.to_vec())),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Pings are bidirectional on one shared substream with no stream
    /// multiplexer to tell request from reply apart structurally. Both ends
    /// start their own ping cycle as soon as the connection is `Secured`, so
    /// being `WaitingPong` locally does not by itself mean an incoming
    /// payload is the reply to it — it could just as well be the peer's own
    /// fresh challenge arriving while ours is outstanding too. The nonce is
    /// the real discriminator: only a match consumes it as our pong; a
    /// local-nonce mismatch falls through to echoing it back as a challenge.
    fn handle_ping_payload(&mut self, payload: &[u8], now_ms: u64) -> Result<Vec<ConnOutput>, Error> {
        let mut out = Vec::new();
        let waiting = self.ping.as_ref().expect("set on reaching Secured").state() == sansp2p_ping::State::WaitingPong;
        if waiting {
            let ping = self.ping.as_mut().expect("set on reaching Secured");
            let (event, actions) = ping.on_pong(payload, now_ms)?;
            if let Some(sansp2p_ping::Event::PongReceived { latency_ms }) = event {
                out.push(ConnOutput::Pong { latency_ms });
                for action in actions {
                    out.extend(self.translate_ping_action(action)?);
                }
                return Ok(out);
            }
        }
        let reply = sansp2p_ping::respond(payload);
        out.push(ConnOutput::SendRaw(self.send_on_substream(SUBSTREAM_PING, &reply)?));
        Ok(out)
    }

    /// The timer previously requested via `Action::SetTimer` for this
    /// connection's ping cycle fired.
    pub fn on_ping_timer(&mut self, now_ms: u64, rng: &mut StdRng) -> Result<Vec<ConnOutput>, Error> {
        let mut out = Vec::new();
        let Some(ping) = self.ping.as_mut() else { return Ok(out) };
        let (_event, actions) = ping.on_timer(now_ms, rng);
        for action in actions {
            out.extend(self.translate_ping_action(action)?);
        }
        Ok(out)
    }

    fn translate_ping_action(&mut self, action: sansp2p_ping::Action) -> Result<Vec<ConnOutput>, Error> {
        Ok(match action {
            sansp2p_ping::Action::Send(bytes) => {
                vec![ConnOutput::SendRaw(self.send_on_substream(SUBSTREAM_PING, &bytes)?)]
            }
            sansp2p_ping::Action::SetTimer { timer_id, duration_ms } => {
                vec![ConnOutput::SetTimer { timer_id, duration_ms }]
            }
            sansp2p_ping::Action::CancelTimer { timer_id } => vec![ConnOutput::CancelTimer { timer_id }],
            sansp2p_ping::Action::CloseConnection => vec![ConnOutput::Close(CloseReason::PingTimeout)],
        })
    }

    /// Wraps `payload` in its substream envelope and encrypts/frames it for
    /// the wire. Only valid once `Secured`.
    pub fn send_on_substream(&mut self, substream_id: u32, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut envelope = Vec::new();
        let mut buf = unsigned_varint::encode::u32_buffer();
        envelope.extend_from_slice(unsigned_varint::encode::u32(substream_id, &mut buf));
        envelope.extend_from_slice(payload);
        let framed = self.framed.as_mut().expect("only called once Secured");
        Ok(framed.encode(&envelope)?)
    }
}

fn frame_handshake_message(msg: &[u8]) -> Vec<u8> {
    let len = msg.len() as u16;
    let mut out = Vec::with_capacity(HANDSHAKE_LEN_PREFIX + msg.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(msg);
    out
}

fn take_handshake_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    if buf.len() < HANDSHAKE_LEN_PREFIX {
        return None;
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if buf.len() < HANDSHAKE_LEN_PREFIX + len {
        return None;
    }
    Some(buf.drain(0..HANDSHAKE_LEN_PREFIX + len).skip(HANDSHAKE_LEN_PREFIX).collect())
}

fn decode_substream_frame(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let (id, rest) = unsigned_varint::decode::u32(bytes).ok()?;
    Some((id, rest))
}
