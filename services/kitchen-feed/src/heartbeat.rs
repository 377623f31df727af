//! Keep-alive tracking for display connections
//!
//! The session ticks the monitor on a fixed interval. Each tick sends a ping;
//! a pong clears the outstanding ping. If `max_missed` consecutive pings go
//! unanswered the connection is expired.

/// What the session should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping and keep going.
    SendPing,
    /// Too many pings unanswered: close the connection.
    Expire { missed: u32 },
}

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    max_missed: u32,
    missed: u32,
    awaiting_pong: bool,
}

impl HeartbeatMonitor {
    /// `max_missed` of zero is treated as one.
    pub fn new(max_missed: u32) -> Self {
        Self {
            max_missed: max_missed.max(1),
            missed: 0,
            awaiting_pong: false,
        }
    }

    /// Advance one interval.
    pub fn on_tick(&mut self) -> HeartbeatAction {
        if self.awaiting_pong {
            self.missed += 1;
            if self.missed >= self.max_missed {
                return HeartbeatAction::Expire {
                    missed: self.missed,
                };
            }
        }
        self.awaiting_pong = true;
        HeartbeatAction::SendPing
    }

    /// Any pong counts as a response to the outstanding ping.
    pub fn on_pong(&mut self) {
        self.missed = 0;
        self.awaiting_pong = false;
    }

    /// Consecutive pings that went unanswered.
    pub fn missed(&self) -> u32 {
        self.missed
    }
}
