use std::time::Duration;

use chrono::Timelike;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Polling interval for an hour-of-day range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalBand {
    pub start_hour: u32,
    pub end_hour: u32,
    pub minutes: u64,
}

impl IntervalBand {
    /// `start <= hour < end`; a band with `start > end` spans midnight.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntervalScheduler {
    bands: Vec<IntervalBand>,
    default_interval: Duration,
    /// Replaces banding with a single base interval.
    fixed_base: Option<Duration>,
    paused_interval: Duration,
}

impl IntervalScheduler {
    pub fn new(bands: Vec<IntervalBand>, default_interval: Duration, paused_interval: Duration) -> Self {
        Self {
            bands,
            default_interval,
            fixed_base: None,
            paused_interval,
        }
    }

    pub fn with_fixed_base(mut self, base: Duration) -> Self {
        self.fixed_base = Some(base);
        self
    }

    /// Un-jittered interval for the given hour.
    pub fn base_interval(&self, hour: u32) -> Duration {
        if let Some(base) = self.fixed_base {
            return base;
        }
        self.bands
            .iter()
            .find(|b| b.contains(hour))
            .map(|b| Duration::from_secs(b.minutes * 60))
            .unwrap_or(self.default_interval)
    }

    pub fn next_wait<T: Timelike>(&self, now: &T, paused: bool) -> Duration {
        self.next_wait_with(now, paused, &mut rand::thread_rng())
    }

    pub fn next_wait_with<T: Timelike, R: Rng + ?Sized>(
        &self,
        now: &T,
        paused: bool,
        rng: &mut R,
    ) -> Duration {
        if paused {
            return self.paused_interval;
        }
        let base = self.base_interval(now.hour()).as_secs_f64();
        if base <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rng.gen_range(base * 0.9..=base * 1.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 30, 0).unwrap()
    }

    fn scheduler() -> IntervalScheduler {
        IntervalScheduler::new(
            vec![
                IntervalBand { start_hour: 7, end_hour: 19, minutes: 2 },
                IntervalBand { start_hour: 22, end_hour: 6, minutes: 30 },
            ],
            Duration::from_secs(60 * 60),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn picks_band_by_hour_with_default_fallback() {
        let s = scheduler();
        assert_eq!(s.base_interval(7), Duration::from_secs(120));
        assert_eq!(s.base_interval(18), Duration::from_secs(120));
        assert_eq!(s.base_interval(19), Duration::from_secs(3600));
        assert_eq!(s.base_interval(23), Duration::from_secs(1800));
        assert_eq!(s.base_interval(3), Duration::from_secs(1800));
        assert_eq!(s.base_interval(6), Duration::from_secs(3600));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let s = scheduler();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let w = s.next_wait_with(&at(10), false, &mut rng).as_secs_f64();
            assert!((107.999..=132.001).contains(&w), "wait {w} out of range");
        }
    }

    #[test]
    fn paused_returns_short_fixed_interval() {
        let s = scheduler();
        assert_eq!(s.next_wait(&at(10), true), Duration::from_secs(5));
    }

    #[test]
    fn fixed_base_overrides_bands() {
        let s = scheduler().with_fixed_base(Duration::from_secs(200));
        assert_eq!(s.base_interval(10), Duration::from_secs(200));
        assert_eq!(s.base_interval(23), Duration::from_secs(200));
    }
}
