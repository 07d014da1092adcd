use crate::error::Error;
use crate::line::{encode_line, try_decode_line};
use crate::HEADER;

#[derive(Debug)]
enum State {
    AwaitingHeader,
    AwaitingProposal,
    Done,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ListenerStatus {
    InProgress,
    Selected { protocol: String, leftover: Vec<u8> },
}

#[derive(Debug, PartialEq, Eq)]
pub struct ListenerProgress {
    /// Frames to send, in order, before re-polling.
    pub outbound: Vec<Vec<u8>>,
    pub status: ListenerStatus,
}

/// Server (listener) side of multistream-select: accepts the first proposed
/// protocol present in `supported`, replying `na` to everything else.
pub struct Listener {
    supported: Vec<String>,
    buffer: Vec<u8>,
    state: State,
    selected: Option<String>,
}

impl Listener {
    pub fn new(supported: Vec<String>) -> Self {
        Listener {
            supported,
            buffer: Vec::new(),
            state: State::AwaitingHeader,
            selected: None,
        }
    }

    pub fn on_data(&mut self, data: &[u8]) -> Result<ListenerProgress, Error> {
        self.buffer.extend_from_slice(data);
        let mut outbound = Vec::new();
        loop {
            let Some((line, consumed)) = try_decode_line(&self.buffer)? else {
                return Ok(ListenerProgress {
                    outbound,
                    status: ListenerStatus::InProgress,
                });
            };
            self.buffer.drain(0..consumed);

            match self.state {
                State::AwaitingHeader => {
                    if line != HEADER {
                        return Err(Error::BadNegotiation);
                    }
                    outbound.push(encode_line(HEADER));
                    self.state = State::AwaitingProposal;
                }
                State::AwaitingProposal => {
                    if self.supported.iter().any(|p| p == &line) {
                        outbound.push(encode_line(&line));
                        self.selected = Some(line);
                        self.state = State::Done;
                    } else {
                        log::debug!("rejecting unsupported protocol proposal {line:?}");
                        outbound.push(encode_line("na"));
                    }
                }
                State::Done => unreachable!("on_data called again after negotiation completed"),
            }

            if let State::Done = self.state {
                let leftover = std::mem::take(&mut self.buffer);
                return Ok(ListenerProgress {
                    outbound,
                    status: ListenerStatus::Selected {
                        protocol: self.selected.clone().expect("set when entering Done"),
                        leftover,
                    },
                });
            }
        }
    }
}
