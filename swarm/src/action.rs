use sansp2p_core::ConnectionId;

/// Core -> host action surface. The driver executes these against real
/// sockets and timers; the core never touches either directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Dial { pending_id: u64, addr: String },
    Listen { listener_id: u64, addr: String },
    /// Never emitted by this implementation: nothing in the minimal core
    /// needs to refuse an inbound connection before negotiating it. Kept as
    /// a tagged variant so the action surface matches the full contract.
    Accept { listener_id: u64 },
    CloseConnection { conn_id: ConnectionId },
    Send { conn_id: ConnectionId, bytes: Vec<u8> },
    SetTimer { timer_id: u64, duration_ms: u64 },
    CancelTimer { timer_id: u64 },
}
