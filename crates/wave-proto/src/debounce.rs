//! Input debouncing for search-as-you-type.
//!
//! Driven by the caller's clock: `push` on every keystroke, `poll` on every
//! UI tick.  The value fires once the input has been quiet for `quiet`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debounce<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Replace any pending value and restart the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the pending value if the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.quiet => {
                self.pending.take().map(|(v, _)| v)
            }
            _ => None,
        }
    }

    /// Take the pending value immediately (explicit submit).
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    /// Drop the pending value without firing.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(400);

    #[test]
    fn test_fires_after_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debounce::new(QUIET);
        d.push("a", t0);
        assert_eq!(d.poll(t0 + Duration::from_millis(399)), None);
        assert_eq!(d.poll(t0 + QUIET), Some("a"));
        assert_eq!(d.poll(t0 + QUIET * 2), None);
    }

    #[test]
    fn test_only_last_value_fires() {
        let t0 = Instant::now();
        let mut d = Debounce::new(QUIET);
        d.push("a", t0);
        d.push("ar", t0 + Duration::from_millis(200));
        d.push("ari", t0 + Duration::from_millis(350));
        // quiet period restarted by each keystroke
        assert_eq!(d.poll(t0 + Duration::from_millis(500)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(750)), Some("ari"));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_flush_and_cancel() {
        let t0 = Instant::now();
        let mut d = Debounce::new(QUIET);
        d.push(1, t0);
        assert_eq!(d.flush(), Some(1));
        assert_eq!(d.poll(t0 + QUIET), None);

        d.push(2, t0);
        d.cancel();
        assert_eq!(d.poll(t0 + QUIET), None);
    }
}
