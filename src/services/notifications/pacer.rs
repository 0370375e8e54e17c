use std::time::Duration;

use async_trait::async_trait;

/// Spaces out consecutive sends.
#[async_trait]
pub trait SendPacer: Send + Sync {
    /// Wait before the send at `index`; the first send is never delayed.
    async fn pace(&self, index: usize);
}

/// Fixed delay between sends
#[derive(Debug, Clone, Copy)]
pub struct IntervalPacer {
    interval: Duration,
}

impl IntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl SendPacer for IntervalPacer {
    async fn pace(&self, index: usize) {
        if index > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_interval_pacer_spaces_sends() {
        let pacer = IntervalPacer::from_millis(1000);
        let start = Instant::now();

        for index in 0..4 {
            pacer.pace(index).await;
        }

        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_sleeps() {
        let pacer = IntervalPacer::from_millis(0);
        let start = Instant::now();
        pacer.pace(5).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
