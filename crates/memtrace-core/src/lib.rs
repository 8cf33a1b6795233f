//! memtrace-core: emotion-driven dialogue sampling and text-mask compositing.
//!
//! Groups a labeled dialogue dataset by emotion class, samples lines for the
//! viewer's dominant expression, paces refreshes by face count, and masks the
//! live video so it only shows through the rendered text.

pub mod compositor;
pub mod dataset;
pub mod emotion;
pub mod modes;
pub mod pacer;
pub mod sampler;
pub mod session;
pub mod text;
pub mod types;

pub use compositor::{apply_mask, composite_frame, CanvasSize, CompositeError, Compositor};
pub use dataset::{build_index, parse_dataset, DatasetError, DialogueRecord, EmotionClass, EmotionIndex};
pub use emotion::{dominant_expression, resolve_dominant, Expression};
pub use modes::{ModeKey, PresentationModes};
pub use pacer::{PacingConfig, PacingState, RefreshPacer};
pub use sampler::{sample, SampleSet, FALLBACK_LINE};
pub use session::{Session, SessionConfig, TickReport};
pub use text::{TextLayout, MAX_TEXT_SCALE};
pub use types::{BoundingBox, Detection, DetectionFrame, ExpressionScores};
