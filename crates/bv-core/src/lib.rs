//! Spatial semantic engine for the bubble-verse.
//!
//! Thoughts become bubbles at a position derived from their focal word.
//! Every client computes the same position for the same word, merges
//! remote bubble records into its own [`Universe`], and resolves search
//! queries back into the same coordinate space.
//!
//! Zero I/O. Storage, sync and rendering live outside this crate.

pub mod bubble;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod position;
pub mod projector;
pub mod reconciler;
pub mod similarity;
pub mod time;
pub mod tokenizer;

pub use bubble::{Bubble, BubbleRecord, visual_scale};
pub use config::UniverseConfig;
pub use constants::{NAMESPACE, SENTINEL_WORD, SPAN, STANDOFF_Z};
pub use error::{Result, UniverseError};
pub use lifecycle::LifecycleRules;
pub use navigation::{Navigator, WarpDrive};
pub use position::Position;
pub use projector::{Projector, project};
pub use reconciler::{Universe, UniverseEvent};
pub use similarity::{attraction, similarity};
pub use time::{millis_to_iso8601, now_unix_millis};
pub use tokenizer::{extract_label, focal_word, normalize};
