//! Device side of the switch bank: live bank state, message dispatch, and the
//! async service that ties them to a bus.
pub mod service;
pub mod switch_bank;

/// Default period of the Binary Switch Bank Status broadcast (ms).
pub const DEFAULT_STATUS_PERIOD_MS: u32 = 2500;

/// Default phase offset of the status broadcast (ms).
pub const DEFAULT_STATUS_OFFSET_MS: u32 = 100;

/// Shortest transmission interval a peer may request (ms). `0` (disable) is
/// always accepted.
pub const MIN_TRANSMISSION_INTERVAL_MS: u32 = 50;

/// Longest wait of the service loop between two scheduler polls (ms).
pub const STATUS_POLL_INTERVAL_MS: u32 = 10;

/// Capacity of the outbound queue drained after each dispatch. One status burst
/// (every bank plus an acknowledgement) must fit.
pub const OUTBOX_CAPACITY: usize = 16;
