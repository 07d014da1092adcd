//! Sans-I/O identify: a one-shot metadata exchange run in both directions
//! over every newly-secured connection.

mod error;
mod proto;

pub use error::Error;
pub use proto::Info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Identified(Info),
    /// Decoding the peer's record failed. Non-fatal: the connection stays up.
    Failed,
}

/// One identify exchange for one connection. Sending and receiving are
/// independent: `start` doesn't wait on the peer, and `on_data` doesn't wait
/// on our own send having gone out.
pub struct Identify {
    local_info: Info,
    sent: bool,
    received: Option<Info>,
}

impl Identify {
    pub fn new(local_info: Info) -> Self {
        Identify {
            local_info,
            sent: false,
            received: None,
        }
    }

    /// Call once when the connection reaches `Secured`. Returns the bytes
    /// to send as our own identify record.
    pub fn start(&mut self) -> Vec<u8> {
        self.sent = true;
        self.local_info.encode()
    }

    pub fn on_data(&mut self, data: &[u8]) -> Event {
        match Info::decode(data) {
            Ok(info) => {
                self.received = Some(info.clone());
                Event::Identified(info)
            }
            Err(err) => {
                log::debug!("failed to decode identify record: {err}");
                Event::Failed
            }
        }
    }

    pub fn received(&self) -> Option<&Info> {
        self.received.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(agent: &str) -> Info {
        Info {
            public_key: [9u8; 32],
            listen_addrs: vec!["/ip4/127.0.0.1/tcp/4001".into()],
            observed_addr: "/ip4/1.2.3.4/tcp/9".into(),
            protocols: vec!["/bar/1".into()],
            agent_version: agent.into(),
        }
    }

    #[test]
    fn one_shot_exchange_both_ways() {
        let mut a = Identify::new(info("a/1.0"));
        let mut b = Identify::new(info("b/1.0"));

        let a_bytes = a.start();
        let b_bytes = b.start();

        let event_at_b = b.on_data(&a_bytes);
        assert_eq!(event_at_b, Event::Identified(info("a/1.0")));

        let event_at_a = a.on_data(&b_bytes);
        assert_eq!(event_at_a, Event::Identified(info("b/1.0")));
    }

    #[test]
    fn malformed_record_is_non_fatal() {
        let mut a = Identify::new(info("a/1.0"));
        assert_eq!(a.on_data(b"not a valid record"), Event::Failed);
    }
}
