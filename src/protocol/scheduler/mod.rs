//! Periodic transmission scheduler synchronised to a common origin.
//!
//! Ticks fall on `origin + offset + k * period`. Keeping the phase anchored to
//! the origin (instead of "last send + period") lets several periodic PGNs be
//! spread over the bus with distinct offsets, and lets a remote node change the
//! period or offset through a group function request.
//!
//! The scheduler never reads a clock: every time-dependent call takes `now`.
use embassy_time::{Duration, Instant};

/// Periodic timer with a mutable period and phase offset.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    period_ms: u32,
    offset_ms: u32,
    origin: Option<Instant>,
    next: Option<Instant>,
    resync: bool,
}

impl SyncScheduler {
    /// Create a scheduler. It stays idle until [`start`](Self::start).
    pub const fn new(period_ms: u32, offset_ms: u32) -> Self {
        Self {
            period_ms,
            offset_ms,
            origin: None,
            next: None,
            resync: false,
        }
    }

    /// Anchor the schedule at `now`; the first tick is `now + offset`.
    pub fn start(&mut self, now: Instant) {
        self.origin = Some(now);
        self.resync = false;
        self.next = (self.period_ms != 0).then(|| now + Duration::from_millis(self.offset_ms as u64));
    }

    /// Replace period and offset. The next tick is recomputed on the next
    /// [`is_time`](Self::is_time) call; a period of `0` disables the schedule.
    pub fn set_period_and_offset(&mut self, period_ms: u32, offset_ms: u32) {
        self.period_ms = period_ms;
        self.offset_ms = offset_ms;
        self.resync = true;
    }

    /// Stop ticking until the next `start` or period change.
    pub fn disable(&mut self) {
        self.next = None;
        self.resync = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.next.is_some() || (self.resync && self.origin.is_some() && self.period_ms != 0)
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn offset_ms(&self) -> u32 {
        self.offset_ms
    }

    /// Next scheduled tick, if enabled.
    pub fn next_time(&self) -> Option<Instant> {
        self.next
    }

    /// Whether the scheduled tick has been reached.
    pub fn is_time(&mut self, now: Instant) -> bool {
        if self.resync {
            self.update_next_time(now);
        }
        matches!(self.next, Some(next) if next <= now)
    }

    /// Advance to the first tick strictly after `now`.
    pub fn update_next_time(&mut self, now: Instant) {
        self.resync = false;
        let Some(origin) = self.origin else {
            self.next = None;
            return;
        };
        if self.period_ms == 0 {
            self.next = None;
            return;
        }

        let first = origin + Duration::from_millis(self.offset_ms as u64);
        if now < first {
            self.next = Some(first);
            return;
        }

        let period = self.period_ms as u64;
        let elapsed = (now - first).as_millis();
        let ticks = elapsed / period + 1;
        self.next = Some(first + Duration::from_millis(ticks * period));
    }
}
