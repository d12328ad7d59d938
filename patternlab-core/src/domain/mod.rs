//! Domain types for PatternLab

pub mod bar;
pub mod ids;
pub mod label;
pub mod match_result;
pub mod template;

pub use bar::{closes, validate_window, Bar, WindowError};
pub use ids::TemplateId;
pub use label::{Label, INVERTED_SUFFIX};
pub use match_result::{ConfidenceBreakdown, MatchResult, MatchSummary, Neighbor};
pub use template::{
    AugmentationType, Envelope, Template, TemplateMetadata, TemplateSummary, UNKNOWN,
};

/// Sentinel label used by evaluation when no match clears the threshold.
pub const NO_MATCH: &str = "NO_MATCH";
