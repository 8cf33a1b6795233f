//! Dialogue sampling keyed by emotion class.

use std::ops::Deref;

use rand::Rng;

use crate::dataset::{EmotionClass, EmotionIndex};

/// Shown in every slot when the requested class has no lines.
pub const FALLBACK_LINE: &str = "Your memory will be preserved in jpegs and archived chat messages";

/// The lines currently on display, in draw order.
///
/// Always rebuilt as a whole; a set is never edited after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    lines: Vec<String>,
}

impl SampleSet {
    /// A set where every one of `count` slots holds [`FALLBACK_LINE`].
    pub fn fallback(count: usize) -> Self {
        Self {
            lines: vec![FALLBACK_LINE.to_string(); count],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Deref for SampleSet {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.lines
    }
}

impl FromIterator<String> for SampleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

/// Draw one line for `class`, uniformly from its pool, or the fallback line.
pub fn sample_line<'a, R>(index: &'a EmotionIndex, class: &EmotionClass, rng: &mut R) -> &'a str
where
    R: Rng + ?Sized,
{
    match index.pool(class) {
        Some(pool) if !pool.is_empty() => &pool[rng.gen_range(0..pool.len())],
        _ => FALLBACK_LINE,
    }
}

/// Build a set of exactly `count` lines for `class`.
///
/// Every slot is drawn independently with replacement, so small pools repeat.
pub fn sample<R>(index: &EmotionIndex, class: &EmotionClass, count: usize, rng: &mut R) -> SampleSet
where
    R: Rng + ?Sized,
{
    (0..count)
        .map(|_| sample_line(index, class, rng).to_string())
        .collect()
}
