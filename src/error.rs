//! Error types for the merge-rule engine

use thiserror::Error;

/// Main error type for merge-rule operations
///
/// Configuration problems are reported during rule-set compilation and
/// abort construction; the `Evaluation` variant is the only one that can
/// surface while a record is being processed, and the driver recovers from
/// it per rule.
#[derive(Error, Debug)]
pub enum MergeError {
    /// A per-attribute include/exclude pattern failed to compile
    #[error("rule {rule}: invalid {attribute} pattern '{pattern}': {source}")]
    Pattern {
        /// ID of the rule carrying the pattern
        rule: u32,
        /// Attribute the pattern applies to (e.g. "url", "name exclude")
        attribute: &'static str,
        /// The offending pattern text
        pattern: String,
        /// Underlying regex compilation error
        source: regex::Error,
    },

    /// The output-name template could not be compiled
    #[error("invalid template '{template}': {message}")]
    Template {
        /// The offending template text
        template: String,
        /// What went wrong
        message: String,
    },

    /// Rule IDs in a set must be strictly increasing
    #[error("rule ids must be strictly increasing: rule {id} follows rule {previous}")]
    NonMonotonicId {
        /// The offending rule ID
        id: u32,
        /// The ID of the rule preceding it
        previous: u32,
    },

    /// A continue-at target must never point behind the rule itself
    #[error("rule {id}: jump target {target} lies behind the rule itself")]
    BackwardJump {
        /// ID of the rule carrying the jump
        id: u32,
        /// The offending target ID
        target: u32,
    },

    /// A placeholder requested a capture group its pattern does not have
    #[error(
        "rule {rule}: placeholder group {group} exceeds the {available} capture group(s) of the {attribute} pattern"
    )]
    CaptureGroupOutOfRange {
        /// ID of the rule carrying the placeholder
        rule: u32,
        /// Attribute the placeholder references
        attribute: &'static str,
        /// The requested group index
        group: usize,
        /// Number of groups the pattern actually provides (including group 0)
        available: usize,
    },

    /// Rule configuration is invalid or incomplete
    #[error("rule {id}: {message}")]
    Rule {
        /// ID of the offending rule
        id: u32,
        /// What went wrong
        message: String,
    },

    /// YAML parsing failed
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Unexpected failure while a record was being evaluated
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

/// Result type alias for merge-rule operations
pub type Result<T> = std::result::Result<T, MergeError>;
