//! Control-connection liveness.
//!
//! Every tick the server sends an empty text frame (the sender's watchdog
//! resets on any frame) plus a protocol ping. A connection that shows no
//! sign of life for a whole tick is terminated on the next one.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Still alive: send the keepalive and ping again.
    Ping,
    /// Nothing heard since the last ping.
    Dead,
}

#[derive(Debug)]
pub struct Heartbeat {
    alive: bool,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

impl Heartbeat {
    pub fn new() -> Self {
        Self { alive: true }
    }

    /// Any inbound message or pong.
    pub fn saw_traffic(&mut self) {
        self.alive = true;
    }

    pub fn tick(&mut self) -> Beat {
        if std::mem::replace(&mut self.alive, false) {
            Beat::Ping
        } else {
            Beat::Dead
        }
    }
}
