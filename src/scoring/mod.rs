//! Fixability scoring: text signals, the additive score engine, the batch
//! pipeline that keeps persisted scores fresh, and the display breakdown.

pub mod breakdown;
pub mod engine;
pub mod features;
pub mod pipeline;

pub use breakdown::compute_fixability_from_db;
pub use engine::{score, ScoreOutcome};
pub use features::extract_features;
pub use pipeline::{drain_dirty, score_all_dirty, score_all_dirty_at};
