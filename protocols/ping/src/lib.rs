//! Sans-I/O ping: periodic liveness and latency measurement.
//!
//! The active side cycles `Idle -> WaitingPong -> Cooldown -> WaitingPong -> ...`
//! once started. The passive side is stateless: it just echoes back whatever
//! 32 bytes it receives.

use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("pong received while not waiting for one")]
    UnexpectedPong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    WaitingPong,
    Cooldown,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Vec<u8>),
    SetTimer { timer_id: u64, duration_ms: u64 },
    CancelTimer { timer_id: u64 },
    CloseConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PongReceived { latency_ms: u64 },
    PingTimeout,
}

/// Active (dialing) side of the ping protocol for one connection.
pub struct Ping {
    config: Config,
    timer_id: u64,
    state: State,
    outstanding_nonce: Option<[u8; 32]>,
    sent_at_ms: Option<u64>,
}

impl Ping {
    pub fn new(config: Config, timer_id: u64) -> Self {
        Ping {
            config,
            timer_id,
            state: State::Idle,
            outstanding_nonce: None,
            sent_at_ms: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Begins the ping cycle. Call once the connection is `Secured`.
    pub fn start(&mut self, now_ms: u64, rng: &mut impl RngCore) -> Vec<Action> {
        self.enter_waiting(now_ms, rng)
    }

    fn enter_waiting(&mut self, now_ms: u64, rng: &mut impl RngCore) -> Vec<Action> {
        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);
        self.outstanding_nonce = Some(nonce);
        self.sent_at_ms = Some(now_ms);
        self.state = State::WaitingPong;
        vec![
            Action::Send(nonce.to_vec()),
            Action::SetTimer {
                timer_id: self.timer_id,
                duration_ms: self.config.timeout_ms,
            },
        ]
    }

    /// Feeds a received pong payload. Returns `Ok(None)` for a stale/foreign
    /// nonce (silently ignored rather than torn down, in case the peer is
    /// slow rather than misbehaving).
    pub fn on_pong(&mut self, data: &[u8], now_ms: u64) -> Result<(Option<Event>, Vec<Action>), Error> {
        if self.state != State::WaitingPong {
            return Err(Error::UnexpectedPong);
        }
        let nonce = self.outstanding_nonce.expect("set when entering WaitingPong");
        if data != nonce {
            return Ok((None, vec![]));
        }
        let latency_ms = now_ms.saturating_sub(self.sent_at_ms.expect("set with nonce"));
        self.state = State::Cooldown;
        self.outstanding_nonce = None;
        let actions = vec![
            Action::CancelTimer { timer_id: self.timer_id },
            Action::SetTimer {
                timer_id: self.timer_id,
                duration_ms: self.config.interval_ms,
            },
        ];
        Ok((Some(Event::PongReceived { latency_ms }), actions))
    }

    /// The timer previously set via [`Action::SetTimer`] for this
    /// connection fired.
    pub fn on_timer(&mut self, now_ms: u64, rng: &mut impl RngCore) -> (Option<Event>, Vec<Action>) {
        match self.state {
            State::WaitingPong => {
                self.state = State::Idle;
                self.outstanding_nonce = None;
                log::debug!("ping timer {} timed out waiting for pong", self.timer_id);
                (Some(Event::PingTimeout), vec![Action::CloseConnection])
            }
            State::Cooldown => (None, self.enter_waiting(now_ms, rng)),
            State::Idle => (None, vec![]),
        }
    }
}

/// Passive (listening) side: echo received bytes unchanged. Stateless.
pub fn respond(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> Config {
        Config { interval_ms: 1000, timeout_ms: 500 }
    }

    #[test]
    fn pong_within_timeout_reports_latency_and_schedules_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ping = Ping::new(config(), 1);
        let actions = ping.start(0, &mut rng);
        let nonce = match &actions[0] {
            Action::Send(bytes) => bytes.clone(),
            _ => panic!("expected Send first"),
        };
        assert_eq!(
            actions[1],
            Action::SetTimer { timer_id: 1, duration_ms: 500 }
        );

        let (event, actions) = ping.on_pong(&nonce, 200).unwrap();
        assert_eq!(event, Some(Event::PongReceived { latency_ms: 200 }));
        assert_eq!(ping.state(), State::Cooldown);
        assert!(actions.contains(&Action::SetTimer { timer_id: 1, duration_ms: 1000 }));
    }

    #[test]
    fn timeout_while_waiting_closes_connection() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ping = Ping::new(config(), 1);
        ping.start(0, &mut rng);
        let (event, actions) = ping.on_timer(500, &mut rng);
        assert_eq!(event, Some(Event::PingTimeout));
        assert_eq!(actions, vec![Action::CloseConnection]);
    }

    #[test]
    fn mismatched_nonce_is_ignored() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ping = Ping::new(config(), 1);
        ping.start(0, &mut rng);
        let (event, actions) = ping.on_pong(&[0u8; 32], 50).unwrap();
        assert_eq!(event, None);
        assert!(actions.is_empty());
        assert_eq!(ping.state(), State::WaitingPong);
    }

    #[test]
    fn responder_echoes_unchanged() {
        assert_eq!(respond(b"abcd"), b"abcd".to_vec());
    }
}
