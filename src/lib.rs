//! High-performance merge-rule engine for load-test result processing
//!
//! A load test produces millions of raw per-request samples whose names are
//! too fine-grained to aggregate (`Product.1.17`, `/item/482`, ...). This
//! library compiles an ordered set of **merge rules** (regex filters over
//! request attributes plus an output-name template with placeholders) and
//! runs each sample through them, renaming it into a small set of stable
//! bucket names (or dropping it) before statistics are computed.
//!
//! Rules chain by ID through a forward-only jump table, templates are
//! reduced to a literal skeleton with precomputed insertion positions at
//! compile time, and pattern results are memoized in bounded per-worker
//! caches, so the per-record path stays allocation-light and lock-free.
//!
//! # Example
//!
//! ```
//! use reqmerge::{ProcessorBuilder, RequestRecord, RuleSpec};
//!
//! # fn main() -> reqmerge::Result<()> {
//! let processor = ProcessorBuilder::new()
//!     .add_rule(RuleSpec {
//!         id: 0,
//!         new_name: "Item-{u:1}".to_string(),
//!         url_pattern: Some(r"/item/(\d+)".to_string()),
//!         ..RuleSpec::default()
//!     })
//!     .build()?;
//!
//! let mut ctx = processor.new_worker_context();
//! let mut record = RequestRecord::new("GetItem");
//! record.url = "/item/482".to_string();
//! processor.process(&mut record, &mut ctx);
//! assert_eq!(record.name, "Item-482");
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Rule sets can also be parsed from YAML or JSON:
//!
//! ```
//! # fn main() -> reqmerge::Result<()> {
//! let spec = reqmerge::rule_set_from_yaml(br#"
//! strip_name_index: true
//! rules:
//!   - id: 0
//!     drop_on_match: true
//!     content_type_pattern: '^image/'
//!   - id: 1
//!     new_name: "Product"
//!     name_pattern: 'Product\.\d+'
//! "#)?;
//! let processor = reqmerge::RequestProcessor::compile(&spec)?;
//! assert_eq!(processor.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use error::{MergeError, Result};
pub use filter::{Filter, FilterOutcome, MatchCaches, RequestAttribute};
pub use processor::{process_batch, BatchSummary, Disposition, RequestProcessor, WorkerContext};
pub use record::RequestRecord;
pub use rule::{
    rule_set_from_json, rule_set_from_yaml, JumpDirective, ProcessingRule, RuleSetSpec, RuleSpec,
};
pub use template::{CompiledTemplate, PlaceholderSlot};

/// Error types
pub mod error;

/// Attribute filters
pub mod filter;

/// Rule set driver and worker context
pub mod processor;

/// Request record handed over by the collector
pub mod record;

/// Rule configuration and compiled rules
pub mod rule;

/// Output-name template compiler
pub mod template;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with default settings
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Builder for configuring a [`RequestProcessor`]
#[derive(Debug, Clone, Default)]
pub struct ProcessorBuilder {
    rules: Vec<RuleSpec>,
    strip_name_index: bool,
    cache_capacity: Option<usize>,
}

impl ProcessorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one rule specification
    pub fn add_rule(mut self, spec: RuleSpec) -> Self {
        self.rules.push(spec);
        self
    }

    /// Append several rule specifications
    pub fn rules(mut self, specs: impl IntoIterator<Item = RuleSpec>) -> Self {
        self.rules.extend(specs);
        self
    }

    /// Truncate record names at the first `.` before rule evaluation
    pub fn strip_name_index(mut self, strip: bool) -> Self {
        self.strip_name_index = strip;
        self
    }

    /// Per-filter match-cache capacity; `0` disables caching
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Compile the processor
    pub fn build(self) -> Result<RequestProcessor> {
        RequestProcessor::compile(&RuleSetSpec {
            strip_name_index: self.strip_name_index,
            cache_capacity: self.cache_capacity,
            rules: self.rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ProcessorBuilder::new();
        assert!(builder.rules.is_empty());
        assert!(!builder.strip_name_index);
        assert!(builder.cache_capacity.is_none());
    }

    #[test]
    fn test_builder_configuration() {
        let processor = ProcessorBuilder::new()
            .strip_name_index(true)
            .cache_capacity(32)
            .add_rule(RuleSpec {
                id: 0,
                new_name: "X".to_string(),
                ..RuleSpec::default()
            })
            .build()
            .expect("valid configuration");
        assert_eq!(processor.len(), 1);
    }

    #[test]
    fn test_builder_rejects_invalid_configuration() {
        let result = ProcessorBuilder::new()
            .add_rule(RuleSpec {
                id: 1,
                new_name: "A".to_string(),
                ..RuleSpec::default()
            })
            .add_rule(RuleSpec {
                id: 0,
                new_name: "B".to_string(),
                ..RuleSpec::default()
            })
            .build();
        assert!(result.is_err());
    }
}
