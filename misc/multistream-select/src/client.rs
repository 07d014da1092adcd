use crate::error::Error;
use crate::line::{encode_line, try_decode_line};
use crate::HEADER;
use std::collections::VecDeque;

#[derive(Debug)]
enum State {
    AwaitingHeaderAck,
    AwaitingResponse,
    Done,
}

/// Outcome of feeding bytes into a [`Client`].
#[derive(Debug, PartialEq, Eq)]
pub enum ClientProgress {
    /// More bytes are needed before any decision can be made.
    NeedMoreData,
    /// The previous proposal was rejected (`na`); send these bytes to try the next one.
    SendNextProposal(Vec<u8>),
    /// Negotiation succeeded. `leftover` is application data that arrived
    /// pipelined after the accepted protocol line.
    Selected { protocol: String, leftover: Vec<u8> },
    /// Every proposal was rejected.
    Unsupported,
}

/// Client (dialer) side of multistream-select: proposes protocols in order
/// and accepts the first one the remote acknowledges.
pub struct Client {
    proposals: VecDeque<String>,
    current: Option<String>,
    buffer: Vec<u8>,
    state: State,
}

impl Client {
    /// Builds a client and returns the bytes to send immediately: the
    /// `/multistream/1.0.0` header pipelined with the first proposal.
    pub fn new(proposals: Vec<String>) -> Result<(Self, Vec<u8>), Error> {
        let mut proposals: VecDeque<String> = proposals.into_iter().collect();
        let first = proposals.pop_front().ok_or(Error::BadNegotiation)?;

        let mut out = encode_line(HEADER);
        out.extend(encode_line(&first));

        let client = Client {
            proposals,
            current: Some(first),
            buffer: Vec::new(),
            state: State::AwaitingHeaderAck,
        };
        Ok((client, out))
    }

    pub fn on_data(&mut self, data: &[u8]) -> Result<ClientProgress, Error> {
        self.buffer.extend_from_slice(data);
        loop {
            let Some((line, consumed)) = try_decode_line(&self.buffer)? else {
                return Ok(ClientProgress::NeedMoreData);
            };
            self.buffer.drain(0..consumed);

            match self.state {
                State::AwaitingHeaderAck => {
                    if line != HEADER {
                        return Err(Error::BadNegotiation);
                    }
                    self.state = State::AwaitingResponse;
                }
                State::AwaitingResponse => {
                    let proposed = self.current.clone().expect("proposal set while awaiting a response");
                    if line == proposed {
                        self.state = State::Done;
                        let leftover = std::mem::take(&mut self.buffer);
                        return Ok(ClientProgress::Selected {
                            protocol: proposed,
                            leftover,
                        });
                    } else if line == "na" {
                        match self.proposals.pop_front() {
                            Some(next) => {
                                let bytes = encode_line(&next);
                                self.current = Some(next);
                                return Ok(ClientProgress::SendNextProposal(bytes));
                            }
                            None => {
                                log::debug!("remote rejected all proposed protocols");
                                return Ok(ClientProgress::Unsupported);
                            }
                        }
                    } else {
                        return Err(Error::BadNegotiation);
                    }
                }
                State::Done => {
                    // Shouldn't be reachable: once Done we return immediately above.
                    unreachable!("on_data called again after negotiation completed")
                }
            }
        }
    }
}
