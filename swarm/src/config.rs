/// Swarm-wide tunables, layered on top of each sub-protocol's own config.
#[derive(Debug, Clone)]
pub struct Config {
    pub ping: sansp2p_ping::Config,
    pub gossipsub: sansp2p_gossipsub::Config,
    /// Cap on a connection's undecoded inbound byte buffer; exceeding it
    /// closes the connection with `BufferOverflow`.
    pub max_inbound_buffer_bytes: usize,
    pub handshake_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ping: sansp2p_ping::Config { interval_ms: 15_000, timeout_ms: 20_000 },
            gossipsub: sansp2p_gossipsub::Config::default(),
            max_inbound_buffer_bytes: 1024 * 1024,
            handshake_timeout_ms: 10_000,
        }
    }
}
