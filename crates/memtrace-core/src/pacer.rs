//! Refresh pacing: more faces in view means faster sample turnover.

use std::time::{Duration, Instant};

pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_INTERVAL_STEP: Duration = Duration::from_millis(200);
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Interval with no faces counted.
    pub base_interval: Duration,
    /// Subtracted once per visible face.
    pub step: Duration,
    /// Floor; must not exceed `base_interval`.
    pub min_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            step: DEFAULT_INTERVAL_STEP,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshPacer {
    config: PacingConfig,
}

impl RefreshPacer {
    /// Build a pacer; a floor above the base interval is clamped down to it.
    pub fn new(config: PacingConfig) -> Self {
        let min_interval = config.min_interval.min(config.base_interval);
        Self {
            config: PacingConfig { min_interval, ..config },
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// `max(base - faces * step, min)`, saturating on large face counts.
    pub fn compute_interval(&self, face_count: usize) -> Duration {
        let faces = u32::try_from(face_count).unwrap_or(u32::MAX);
        let reduction = self.config.step.saturating_mul(faces);
        self.config
            .base_interval
            .saturating_sub(reduction)
            .max(self.config.min_interval)
    }
}

impl Default for RefreshPacer {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

/// True once strictly more than `interval` has passed since `last_change`.
pub fn should_resample(now: Instant, last_change: Instant, interval: Duration) -> bool {
    now.saturating_duration_since(last_change) > interval
}

/// When the sample set last changed and how long until it may change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingState {
    pub last_change: Instant,
    pub interval: Duration,
}

impl PacingState {
    pub fn new(started: Instant, interval: Duration) -> Self {
        Self {
            last_change: started,
            interval,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        should_resample(now, self.last_change, self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_scenarios() {
        let pacer = RefreshPacer::default();
        assert_eq!(pacer.compute_interval(0), Duration::from_millis(1000));
        assert_eq!(pacer.compute_interval(1), Duration::from_millis(800));
        assert_eq!(pacer.compute_interval(4), Duration::from_millis(200));
        assert_eq!(pacer.compute_interval(5), Duration::from_millis(100));
        assert_eq!(pacer.compute_interval(10), Duration::from_millis(100));
    }

    #[test]
    fn test_interval_monotone_and_bounded() {
        let pacer = RefreshPacer::default();
        let mut previous = pacer.compute_interval(0);
        for faces in 0..64 {
            let interval = pacer.compute_interval(faces);
            assert!(interval <= previous, "not monotone at {faces}");
            assert!(interval >= DEFAULT_MIN_INTERVAL);
            assert!(interval <= DEFAULT_BASE_INTERVAL);
            previous = interval;
        }
        assert_eq!(pacer.compute_interval(usize::MAX), DEFAULT_MIN_INTERVAL);
    }

    #[test]
    fn test_floor_clamped_to_base() {
        let pacer = RefreshPacer::new(PacingConfig {
            base_interval: Duration::from_millis(300),
            step: Duration::from_millis(50),
            min_interval: Duration::from_millis(900),
        });
        assert_eq!(pacer.compute_interval(0), Duration::from_millis(300));
        assert_eq!(pacer.compute_interval(3), Duration::from_millis(300));
    }

    #[test]
    fn test_should_resample_is_strict() {
        let start = Instant::now();
        let interval = Duration::from_millis(800);
        assert!(!should_resample(start + interval, start, interval));
        assert!(should_resample(start + interval + Duration::from_millis(1), start, interval));
        // Clock going backwards never triggers.
        assert!(!should_resample(start, start + Duration::from_secs(1), interval));
    }

    #[test]
    fn test_pacing_state_due() {
        let start = Instant::now();
        let state = PacingState::new(start, Duration::from_millis(100));
        assert!(!state.is_due(start + Duration::from_millis(50)));
        assert!(state.is_due(start + Duration::from_millis(101)));
    }
}
