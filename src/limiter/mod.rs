//! Sliding-window rate limiting for upload dispatch.
//!
//! A grant is a timestamp in a shared window. At most `capacity` grants may
//! be younger than `period`; callers over the cap wait until the oldest
//! grant ages out. One limiter is shared by every caller that competes for
//! the same upstream, so the window is global, not per-task.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Outcome of a single grant attempt.
enum Grant {
    /// Granted; the timestamp was recorded.
    Acquired,
    /// Window full; wait at least this long before retrying.
    Wait(Duration),
}

/// Sliding-window rate limiter.
///
/// Cheap to share behind an `Arc`; the lock is held only while pruning and
/// checking the window, never across a wait.
pub struct RateLimiter {
    capacity: usize,
    period: Duration,
    retry_interval: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `capacity` grants per `period`.
    ///
    /// `retry_interval` is the floor on how long a blocked caller sleeps
    /// between attempts.
    #[must_use]
    pub fn new(capacity: usize, period: Duration, retry_interval: Duration) -> Self {
        Self {
            capacity,
            period,
            retry_interval,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of grants currently inside the window.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        let mut grants = self.grants.lock();
        Self::prune(&mut grants, now, self.period);
        grants.len()
    }

    /// Block the current thread until a grant is available, then take it.
    pub fn acquire(&self) {
        loop {
            match self.try_grant() {
                Grant::Acquired => return,
                Grant::Wait(wait) => std::thread::sleep(wait),
            }
        }
    }

    /// Wait asynchronously until a grant is available, then take it.
    pub async fn acquire_async(&self) {
        loop {
            match self.try_grant() {
                Grant::Acquired => return,
                Grant::Wait(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    fn try_grant(&self) -> Grant {
        let now = Instant::now();
        let mut grants = self.grants.lock();
        Self::prune(&mut grants, now, self.period);

        if grants.len() < self.capacity {
            grants.push_back(now);
            tracing::debug!(in_flight = grants.len(), capacity = self.capacity, "grant acquired");
            return Grant::Acquired;
        }

        // Wait until the oldest grant ages out of the window.
        let wait = grants
            .front()
            .map_or(self.retry_interval, |oldest| {
                self.period.saturating_sub(now.duration_since(*oldest))
            })
            .max(self.retry_interval);

        tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
        Grant::Wait(wait)
    }

    fn prune(grants: &mut VecDeque<Instant>, now: Instant, period: Duration) {
        while let Some(oldest) = grants.front() {
            if now.duration_since(*oldest) > period {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_grants_under_capacity_are_immediate() {
        let limiter = RateLimiter::new(2, Duration::from_secs(5), Duration::from_millis(1));

        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();

        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.in_flight(), 2);
    }

    #[test]
    fn test_third_grant_waits_for_window() {
        let period = Duration::from_millis(100);
        let limiter = RateLimiter::new(2, period, Duration::from_millis(1));

        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();
        limiter.acquire();

        assert!(start.elapsed() >= period);
    }

    #[test]
    fn test_window_expiry_frees_capacity() {
        let limiter =
            RateLimiter::new(1, Duration::from_millis(50), Duration::from_millis(1));

        limiter.acquire();
        assert_eq!(limiter.in_flight(), 1);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_shared_window_across_threads() {
        let limiter = Arc::new(RateLimiter::new(
            2,
            Duration::from_millis(100),
            Duration::from_millis(1),
        ));

        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.acquire())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Four grants at capacity two require at least one full window.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_acquire_async() {
        let period = Duration::from_millis(100);
        let limiter = RateLimiter::new(2, period, Duration::from_millis(1));

        let start = Instant::now();
        limiter.acquire_async().await;
        limiter.acquire_async().await;
        limiter.acquire_async().await;

        assert!(start.elapsed() >= period);
    }
}
