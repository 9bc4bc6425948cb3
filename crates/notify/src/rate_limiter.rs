use std::time::{Duration, Instant};

/// Token bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_60s: u32) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec: refill_per_60s as f64 / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempt to take one token. Returns true on success.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Poll `try_acquire` until a token is available or `deadline` passes.
    pub async fn acquire_or_deadline(&mut self, deadline: Instant) -> bool {
        loop {
            let now = Instant::now();
            if self.try_acquire(now) {
                return true;
            }
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_drains() {
        let mut rl = RateLimiter::new(20, 20);
        let now = Instant::now();
        for _ in 0..20 {
            assert!(rl.try_acquire(now));
        }
        assert!(!rl.try_acquire(now));
    }

    #[test]
    fn refills_over_time() {
        let mut rl = RateLimiter::new(20, 20);
        let t0 = Instant::now();
        for _ in 0..20 {
            assert!(rl.try_acquire(t0));
        }
        assert!(!rl.try_acquire(t0));
        // refill rate is 20/60s = 1/3 per second; after 3s one token back
        let t1 = t0 + Duration::from_secs(3);
        assert!(rl.try_acquire(t1));
        assert!(!rl.try_acquire(t1));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut rl = RateLimiter::new(20, 20);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(3600);
        assert!(rl.try_acquire(t1));
        assert_eq!(rl.tokens, 19.0);
    }
}
