use std::{sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    time::{sleep_until, Instant},
};

/// Spaces calls to [`RateLimiter::acquire`] at a fixed interval. Clones share
/// the same schedule, so the limit holds across every task using them.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// `0` disables limiting.
    pub fn per_second(requests_per_second: u32) -> Self {
        let interval = if requests_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / requests_per_second
        };
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next free slot and claims it.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_are_spaced() {
        let limiter = RateLimiter::per_second(5);
        assert_eq!(limiter.interval(), Duration::from_millis(200));

        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // first slot is immediate
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(800));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_limit() {
        let limiter = RateLimiter::per_second(10);
        let start = Instant::now();

        let tasks = (0..10).map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire().await;
                start.elapsed()
            })
        });
        let mut elapsed: Vec<Duration> = join_all(tasks)
            .await
            .into_iter()
            .map(|res| res.unwrap())
            .collect();
        elapsed.sort();

        for pair in elapsed.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        assert!(elapsed[9] >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_disables_limiting() {
        let limiter = RateLimiter::per_second(0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
