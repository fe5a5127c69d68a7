//! Fixed-window rate limiting keyed by webhook identifier.
//!
//! Each key owns one window: a counter and the instant the window resets.
//! The first request after the reset instant opens a new window with a
//! count of one. Up to `max_requests` are admitted per window; further
//! requests are refused without touching the record. Because windows are
//! fixed, a burst straddling a boundary may see up to twice the limit.
//!
//! The budget is shared by every caller of an endpoint; source addresses
//! play no part in the key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::time::{Clock, SystemClock};

/// One key's current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

impl Window {
    fn open(now: Instant, length: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + length,
        }
    }
}

/// Outcome of [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request counts toward the window.
    Admitted { remaining: u32 },
    /// The window is full; it resets after `retry_after`.
    Refused { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Per-key fixed-window counter.
///
/// Expired windows are reset lazily on the next request for their key.
/// Nothing is evicted unless [`RateLimiter::prune_expired`] is called.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window(), Arc::new(SystemClock))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request against `key`.
    ///
    /// The read-modify-write runs under the map's shard lock for `key`, so
    /// concurrent callers can never both take the last slot of a window.
    pub fn admit(&self, key: &str) -> Admission {
        let now = self.clock.now();

        match self.windows.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(Window::open(now, self.window));
                Admission::Admitted {
                    remaining: self.max_requests.saturating_sub(1),
                }
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                if now > window.reset_at {
                    *window = Window::open(now, self.window);
                    return Admission::Admitted {
                        remaining: self.max_requests.saturating_sub(1),
                    };
                }

                if window.count >= self.max_requests {
                    return Admission::Refused {
                        retry_after: window.reset_at.saturating_duration_since(now),
                    };
                }

                window.count += 1;
                Admission::Admitted {
                    remaining: self.max_requests - window.count,
                }
            }
        }
    }

    /// Drop every record whose window has passed. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, window| now <= window.reset_at);
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Human-readable description of the limit, e.g. "60 requests per minute".
    pub fn describe(&self) -> String {
        let per = match self.window.as_secs() {
            1 => "second".to_string(),
            60 => "minute".to_string(),
            3600 => "hour".to_string(),
            secs => format!("{secs} seconds"),
        };
        format!("{} requests per {}", self.max_requests, per)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::Barrier;
    use std::thread;

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(max: u32) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        (RateLimiter::new(max, WINDOW, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn admits_up_to_max_then_refuses() {
        let (limiter, _clock) = limiter(60);

        for i in 0..60 {
            assert!(limiter.admit("abc123").is_admitted(), "request {} refused", i + 1);
        }
        assert!(!limiter.admit("abc123").is_admitted());
        assert!(!limiter.admit("abc123").is_admitted());
    }

    #[test]
    fn reports_remaining_budget() {
        let (limiter, _clock) = limiter(3);

        assert_eq!(limiter.admit("k"), Admission::Admitted { remaining: 2 });
        assert_eq!(limiter.admit("k"), Admission::Admitted { remaining: 1 });
        assert_eq!(limiter.admit("k"), Admission::Admitted { remaining: 0 });
    }

    #[test]
    fn refusal_reports_time_until_reset() {
        let (limiter, clock) = limiter(1);

        limiter.admit("k");
        clock.advance(Duration::from_secs(45));

        assert_eq!(
            limiter.admit("k"),
            Admission::Refused {
                retry_after: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn window_resets_only_after_reset_time() {
        let (limiter, clock) = limiter(2);

        limiter.admit("k");
        limiter.admit("k");
        assert!(!limiter.admit("k").is_admitted());

        // Exactly at the reset instant the old window still applies.
        clock.advance(WINDOW);
        assert!(!limiter.admit("k").is_admitted());

        clock.advance(Duration::from_millis(1));
        assert_eq!(limiter.admit("k"), Admission::Admitted { remaining: 1 });
        assert_eq!(limiter.admit("k"), Admission::Admitted { remaining: 0 });
        assert!(!limiter.admit("k").is_admitted());
    }

    #[test]
    fn refused_requests_do_not_extend_window() {
        let (limiter, clock) = limiter(1);

        limiter.admit("k");
        for _ in 0..10 {
            clock.advance(Duration::from_secs(5));
            assert!(!limiter.admit("k").is_admitted());
        }

        clock.advance(Duration::from_secs(11));
        assert!(limiter.admit("k").is_admitted());
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _clock) = limiter(1);

        assert!(limiter.admit("a").is_admitted());
        assert!(!limiter.admit("a").is_admitted());
        assert!(limiter.admit("b").is_admitted());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn boundary_burst_can_reach_twice_max() {
        let (limiter, clock) = limiter(5);

        clock.advance(Duration::from_secs(59));
        limiter.admit("k");
        clock.advance(Duration::from_secs(1));
        let late = (0..4).filter(|_| limiter.admit("k").is_admitted()).count();

        clock.advance(Duration::from_secs(60));
        let early = (0..5).filter(|_| limiter.admit("k").is_admitted()).count();

        assert_eq!(1 + late + early, 10);
    }

    #[test]
    fn prune_removes_only_expired_windows() {
        let (limiter, clock) = limiter(10);

        limiter.admit("old");
        clock.advance(Duration::from_secs(30));
        limiter.admit("fresh");
        clock.advance(Duration::from_secs(31));

        assert_eq!(limiter.prune_expired(), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.admit("fresh"), Admission::Admitted { remaining: 8 });
    }

    #[test]
    fn no_double_admission_at_last_slot() {
        for _ in 0..200 {
            let (limiter, _clock) = limiter(60);
            for _ in 0..59 {
                assert!(limiter.admit("hot").is_admitted());
            }

            let limiter = Arc::new(limiter);
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let limiter = limiter.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        limiter.admit("hot").is_admitted()
                    })
                })
                .collect();

            let admitted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|admitted| *admitted)
                .count();
            assert_eq!(admitted, 1);
        }
    }

    #[test]
    fn describes_limit() {
        let (limiter, _clock) = limiter(60);
        assert_eq!(limiter.describe(), "60 requests per minute");

        let limiter = RateLimiter::new(10, Duration::from_secs(30), Arc::new(ManualClock::new()));
        assert_eq!(limiter.describe(), "10 requests per 30 seconds");
    }
}
