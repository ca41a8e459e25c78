//! Outbound control rate limiting.
//!
//! ```text
//! calls:   x  x   x x        x      x x
//! window:  [────100ms────]   [────100ms────]
//! sent:                  ▲ (last x)        ▲ (last x)
//! ```
//!
//! Trailing edge only: the first call opens a window, later calls overwrite
//! the pending payload, and whatever is pending when the window elapses is
//! sent. Nothing is sent without a call.

use std::time::{Duration, Instant};

use crate::protocol::MoveCommand;

/// Coalesces control updates into at most one message per interval.
#[derive(Clone, Debug)]
pub struct ControlThrottle {
    interval: Duration,
    pending: Option<MoveCommand>,
    window_opened: Option<Instant>,
    enabled: bool,
    submitted: u64,
    sent: u64,
}

impl ControlThrottle {
    /// Creates an enabled throttle.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            window_opened: None,
            enabled: true,
            submitted: 0,
            sent: 0,
        }
    }

    /// Records the latest control vector.
    ///
    /// Ignored while disabled.
    pub fn submit(&mut self, now: Instant, command: MoveCommand) {
        if !self.enabled {
            return;
        }
        self.submitted += 1;
        self.pending = Some(command);
        if self.window_opened.is_none() {
            self.window_opened = Some(now);
        }
    }

    /// Returns the payload to transmit, if its window has elapsed.
    ///
    /// Call once per frame. At most one command is released per window.
    pub fn poll(&mut self, now: Instant) -> Option<MoveCommand> {
        if !self.enabled {
            return None;
        }
        let opened = self.window_opened?;
        if now.saturating_duration_since(opened) < self.interval {
            return None;
        }
        self.window_opened = None;
        let command = self.pending.take()?;
        self.sent += 1;
        Some(command)
    }

    /// Drops any pending payload and refuses further submissions.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.clear();
    }

    /// Accepts submissions again.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Drops the pending payload without disabling.
    pub fn clear(&mut self) {
        self.pending = None;
        self.window_opened = None;
    }

    /// Returns true if submissions are accepted.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Payload waiting for its window, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&MoveCommand> {
        self.pending.as_ref()
    }

    /// Calls to [`Self::submit`] that were accepted.
    #[inline]
    #[must_use]
    pub const fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Commands released by [`Self::poll`].
    #[inline]
    #[must_use]
    pub const fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::Vec2;

    fn cmd(traction: f32) -> MoveCommand {
        MoveCommand {
            heading: Vec2::new(1.0, 0.0),
            traction,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_coalesces_within_window() {
        let t0 = Instant::now();
        let mut throttle = ControlThrottle::new(ms(100));
        for i in 0..5u8 {
            throttle.submit(t0 + ms(u64::from(i) * 10), cmd(f32::from(i) / 10.0));
            assert!(throttle.poll(t0 + ms(u64::from(i) * 10)).is_none());
        }
        let sent = throttle.poll(t0 + ms(100)).unwrap();
        assert!((sent.traction - 0.4).abs() < 1e-6);
        assert!(throttle.poll(t0 + ms(500)).is_none());
        assert_eq!(throttle.sent(), 1);
        assert_eq!(throttle.submitted(), 5);
    }

    #[test]
    fn test_one_message_per_window() {
        let t0 = Instant::now();
        let mut throttle = ControlThrottle::new(ms(100));
        let mut sent = 0;
        // A call every 10ms for one second.
        for i in 0..100u64 {
            let now = t0 + ms(i * 10);
            throttle.submit(now, cmd(1.0));
            if throttle.poll(now).is_some() {
                sent += 1;
            }
        }
        assert!((9..=10).contains(&sent), "sent {sent}");
    }

    #[test]
    fn test_idle_sends_nothing() {
        let t0 = Instant::now();
        let mut throttle = ControlThrottle::new(ms(100));
        assert!(throttle.poll(t0 + ms(1000)).is_none());
    }

    #[test]
    fn test_disable_drops_pending() {
        let t0 = Instant::now();
        let mut throttle = ControlThrottle::new(ms(100));
        throttle.submit(t0, cmd(1.0));
        throttle.disable();
        assert!(throttle.poll(t0 + ms(200)).is_none());
        throttle.submit(t0 + ms(210), cmd(1.0));
        assert!(throttle.pending().is_none());

        throttle.enable();
        throttle.submit(t0 + ms(300), cmd(0.5));
        assert_eq!(throttle.poll(t0 + ms(400)).map(|c| c.traction), Some(0.5));
    }
}
