//! The render loop's context: index snapshot, current sample set, pacing.
//!
//! Exactly one `Session` exists, owned by the render loop. Other threads only
//! hand it whole snapshots (index, detections); it hands out `Arc<SampleSet>`
//! snapshots in return.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::{EmotionClass, EmotionIndex};
use crate::emotion::resolve_dominant;
use crate::pacer::{PacingConfig, PacingState, RefreshPacer};
use crate::sampler::{sample, SampleSet};
use crate::types::DetectionFrame;

pub const DEFAULT_LINE_COUNT: usize = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lines per sample set.
    pub line_count: usize,
    pub pacing: PacingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_count: DEFAULT_LINE_COUNT,
            pacing: PacingConfig::default(),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub faces: usize,
    /// Class the new sample set was drawn for, if one was drawn.
    pub resampled: Option<EmotionClass>,
    /// Interval in force for the next tick.
    pub interval: Duration,
}

pub struct Session {
    index: Option<Arc<EmotionIndex>>,
    samples: Arc<SampleSet>,
    pacer: RefreshPacer,
    pacing: PacingState,
    line_count: usize,
    rng: StdRng,
}

impl Session {
    pub fn new(config: SessionConfig, started: Instant) -> Self {
        Self::with_rng(config, started, StdRng::from_entropy())
    }

    /// Deterministic session for reproducible runs and tests.
    pub fn seeded(config: SessionConfig, started: Instant, seed: u64) -> Self {
        Self::with_rng(config, started, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, started: Instant, rng: StdRng) -> Self {
        let pacer = RefreshPacer::new(config.pacing);
        Self {
            index: None,
            samples: Arc::new(SampleSet::default()),
            pacing: PacingState::new(started, pacer.config().base_interval),
            pacer,
            line_count: config.line_count,
            rng,
        }
    }

    pub fn index(&self) -> Option<&Arc<EmotionIndex>> {
        self.index.as_ref()
    }

    /// Current sample set snapshot.
    pub fn samples(&self) -> Arc<SampleSet> {
        Arc::clone(&self.samples)
    }

    pub fn pacing(&self) -> &PacingState {
        &self.pacing
    }

    /// Adopt a freshly loaded index and show the fallback set until the first
    /// face-driven resample.
    pub fn install_index(&mut self, index: Arc<EmotionIndex>) {
        tracing::info!(
            classes = index.class_count(),
            lines = index.total_lines(),
            "emotion index installed"
        );
        self.index = Some(index);
        self.samples = Arc::new(SampleSet::fallback(self.line_count));
    }

    /// Replace the sample set wholesale with lines for `class`.
    pub fn resample(&mut self, class: &EmotionClass) {
        let set = match &self.index {
            Some(index) => sample(index, class, self.line_count, &mut self.rng),
            None => SampleSet::fallback(self.line_count),
        };
        self.samples = Arc::new(set);
    }

    /// Advance one render tick.
    ///
    /// With no faces nothing changes: the last set stays on screen and the
    /// pacing state is frozen. Otherwise the set is redrawn once the current
    /// interval has elapsed, and the interval is recomputed from the face
    /// count for the next tick.
    pub fn tick(&mut self, now: Instant, detections: &DetectionFrame) -> TickReport {
        let faces = detections.face_count();
        if faces == 0 {
            return TickReport {
                faces,
                resampled: None,
                interval: self.pacing.interval,
            };
        }

        let mut resampled = None;
        if self.pacing.is_due(now) {
            let class = resolve_dominant(detections);
            self.resample(&class);
            self.pacing.last_change = now;
            tracing::debug!(class = %class, faces, "sample set refreshed");
            resampled = Some(class);
        }
        self.pacing.interval = self.pacer.compute_interval(faces);

        TickReport {
            faces,
            resampled,
            interval: self.pacing.interval,
        }
    }
}
