/// Tunables for the mesh maintenance and message cache. Field names match
/// the public GossipSub vocabulary (`D`, `Dlo`, `Dhi`, `Dlazy`, ...).
#[derive(Debug, Clone)]
pub struct Config {
    /// Target mesh degree per topic.
    pub d: usize,
    /// Minimum mesh degree before a heartbeat grafts more peers in.
    pub d_lo: usize,
    /// Maximum mesh degree before a heartbeat prunes peers out.
    pub d_hi: usize,
    /// Number of peers an IHAVE gossip announcement is sent to, per topic.
    pub d_lazy: usize,
    pub heartbeat_interval_ms: u64,
    /// Number of mcache windows retained for deduplication.
    pub heartbeat_history: usize,
    /// Number of most-recent windows eligible for IHAVE announcements.
    /// Must be <= `heartbeat_history`.
    pub gossip_history: usize,
    /// How long a fanout entry survives without a publish before expiring.
    pub fanout_ttl_ms: u64,
    /// Suppression window for a message id after it is first seen.
    pub seen_ttl_ms: u64,
    pub max_messages_per_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            d: 6,
            d_lo: 4,
            d_hi: 12,
            d_lazy: 6,
            heartbeat_interval_ms: 1_000,
            heartbeat_history: 5,
            gossip_history: 3,
            fanout_ttl_ms: 60_000,
            seen_ttl_ms: 120_000,
            max_messages_per_window: 4096,
        }
    }
}
