//! PatternLab Core — template store, feature extraction, DTW distance, KNN matching.
//!
//! This crate contains the matching engine:
//! - Domain types (bars, labels, templates, match results)
//! - Feature extraction from OHLCV windows to normalized signals
//! - Derivative/standard DTW under Sakoe–Chiba, amercing, or no constraint
//! - LB_Keogh envelopes for candidate pruning
//! - Multi-signal confidence scoring
//! - Template library with augmentation, indexing, and JSON persistence
//! - KNN matcher over live libraries or read-only views

pub mod confidence;
pub mod config;
pub mod distance;
pub mod domain;
pub mod library;
pub mod matcher;
pub mod preprocess;

pub use confidence::{ConfidenceScorer, ConfidenceWeights};
pub use config::{ConfigError, EngineConfig};
pub use distance::{DistanceEngine, DtwAlgorithm};
pub use domain::{Bar, Label, MatchResult, Neighbor, Template, TemplateId, NO_MATCH};
pub use library::{IndexSnapshot, LibraryError, PatternLibrary, TemplateView};
pub use matcher::PatternMatcher;
pub use preprocess::{Normalization, Preprocessor};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine types can cross rayon worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Template>();
        require_sync::<domain::Template>();
        require_send::<domain::MatchResult>();
        require_sync::<domain::MatchResult>();
        require_send::<domain::Label>();
        require_sync::<domain::Label>();

        // Engine components
        require_send::<Preprocessor>();
        require_sync::<Preprocessor>();
        require_send::<DistanceEngine>();
        require_sync::<DistanceEngine>();
        require_send::<ConfidenceScorer>();
        require_sync::<ConfidenceScorer>();
        require_send::<PatternMatcher>();
        require_sync::<PatternMatcher>();
        require_send::<PatternLibrary>();
        require_sync::<PatternLibrary>();
        require_sync::<TemplateView<'static>>();
        require_sync::<IndexSnapshot<'static>>();
    }
}
