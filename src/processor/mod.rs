//! Rule set driver
//!
//! [`RequestProcessor`] owns the compiled, ID-sorted rule array and runs
//! one record at a time through it under jump-table control. The processor
//! itself is immutable and shared read-only across workers; every worker
//! owns a private [`WorkerContext`] with its filter caches, created once
//! via [`RequestProcessor::new_worker_context`] and passed into each
//! [`RequestProcessor::process`] call. This trades duplicated cache memory
//! across workers for zero lock contention on the per-record path.

use std::num::NonZeroUsize;

use tracing::{error, info};

use crate::error::{MergeError, Result};
use crate::filter::cache::DEFAULT_CACHE_CAPACITY;
use crate::filter::MatchCaches;
use crate::record::RequestRecord;
use crate::rule::{JumpDirective, ProcessingRule, RuleSetSpec};

pub mod batch;

pub use batch::{process_batch, BatchSummary};

/// What became of a record after the full rule scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pass the (possibly renamed) record onward to aggregation
    Keep,
    /// The record matched a drop rule; aggregation must not see it
    Discard,
}

/// Per-worker mutable state: one private copy of the filter caches
///
/// Not shared between threads; construct one per worker via
/// [`RequestProcessor::new_worker_context`].
#[derive(Debug)]
pub struct WorkerContext {
    caches: MatchCaches,
}

impl WorkerContext {
    /// The worker's cache pool, e.g. for driving a single rule directly
    pub fn caches_mut(&mut self) -> &mut MatchCaches {
        &mut self.caches
    }
}

/// The compiled merge-rule engine
///
/// Immutable after compilation; `Send + Sync` and freely shared across
/// worker threads.
#[derive(Debug, Clone)]
pub struct RequestProcessor {
    rules: Vec<ProcessingRule>,
    strip_name_index: bool,
    cache_capacity: Option<NonZeroUsize>,
    cache_slots: usize,
}

impl RequestProcessor {
    /// Compile a full rule-set specification
    ///
    /// Rule IDs must be strictly increasing; every per-rule validation of
    /// [`ProcessingRule::compile`] applies. Any violation aborts
    /// compilation with the offending rule identified; configuration
    /// errors surface here, never during per-record evaluation.
    pub fn compile(spec: &RuleSetSpec) -> Result<Self> {
        let mut previous: Option<u32> = None;
        let mut rules = Vec::with_capacity(spec.rules.len());
        for rule_spec in &spec.rules {
            if let Some(previous) = previous {
                if rule_spec.id <= previous {
                    return Err(MergeError::NonMonotonicId {
                        id: rule_spec.id,
                        previous,
                    });
                }
            }
            previous = Some(rule_spec.id);
            rules.push(ProcessingRule::compile(rule_spec)?);
        }

        let capacity = spec.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
        let mut processor = Self {
            rules,
            strip_name_index: spec.strip_name_index,
            cache_capacity: NonZeroUsize::new(capacity),
            cache_slots: 0,
        };

        if processor.cache_capacity.is_some() {
            let mut next_slot = 0;
            for rule in &mut processor.rules {
                rule.assign_cache_slots(&mut next_slot);
            }
            processor.cache_slots = next_slot;
        }

        info!(
            "Compiled rule set: {} rules, {} cached filters, index stripping {}",
            processor.rules.len(),
            processor.cache_slots,
            if processor.strip_name_index { "on" } else { "off" }
        );

        Ok(processor)
    }

    #[cfg(test)]
    pub(crate) fn from_rules(rules: Vec<ProcessingRule>, strip_name_index: bool) -> Self {
        Self {
            rules,
            strip_name_index,
            cache_capacity: None,
            cache_slots: 0,
        }
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the processor holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Create the private per-worker state for one worker thread
    pub fn new_worker_context(&self) -> WorkerContext {
        let caches = match self.cache_capacity {
            Some(capacity) => MatchCaches::new(self.cache_slots, capacity),
            None => MatchCaches::disabled(),
        };
        WorkerContext { caches }
    }

    /// Run one record through the rule set
    ///
    /// Rules are visited in ascending-ID order; a rule whose ID lies below
    /// the current jump target is skipped without being evaluated. A rule
    /// that fails unexpectedly is logged, the record's name is restored to
    /// its original (pre-stripping) value, and the scan continues at the
    /// next array position, so one bad rule never aborts the record.
    pub fn process(&self, record: &mut RequestRecord, ctx: &mut WorkerContext) -> Disposition {
        let original_name = record.name.clone();
        if self.strip_name_index {
            if let Some(dot) = record.name.find('.') {
                record.name.truncate(dot);
            }
        }

        let mut next_id = 0u32;
        for rule in &self.rules {
            if rule.id() < next_id {
                continue;
            }
            match rule.apply(record, &mut ctx.caches) {
                Ok(JumpDirective::Drop) => return Disposition::Discard,
                Ok(JumpDirective::Stop) => break,
                Ok(JumpDirective::ContinueAt(id)) => next_id = id,
                Err(err) => {
                    error!("Failed to apply {}: {}", rule.describe(), err);
                    record.name = original_name.clone();
                }
            }
        }

        Disposition::Keep
    }
}

impl RuleSetSpec {
    /// Fail-fast configuration check: compile the specification and
    /// discard the result
    pub fn validate(&self) -> Result<()> {
        RequestProcessor::compile(self).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleSpec;
    use pretty_assertions::assert_eq;

    fn processor(specs: Vec<RuleSpec>) -> RequestProcessor {
        RequestProcessor::compile(&RuleSetSpec {
            rules: specs,
            ..RuleSetSpec::default()
        })
        .expect("rule set compiles")
    }

    #[test]
    fn test_end_to_end_rename_and_stop() {
        let engine = processor(vec![
            RuleSpec {
                id: 1,
                new_name: "Product".to_string(),
                name_pattern: Some(r"Product\.\d+".to_string()),
                ..RuleSpec::default()
            },
            RuleSpec {
                id: 2,
                new_name: "Fallback".to_string(),
                name_pattern: Some("^Cart$".to_string()),
                ..RuleSpec::default()
            },
        ]);
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Product.17");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Product");

        // No match on rule 1, falls through to rule 2.
        let mut record = RequestRecord::new("Cart");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Fallback");

        // Exhausts the array untouched.
        let mut record = RequestRecord::new("Login");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Login");
    }

    #[test]
    fn test_drop_consults_no_later_rule() {
        let engine = processor(vec![
            RuleSpec {
                id: 0,
                drop_on_match: true,
                content_type_pattern: Some("^image/".to_string()),
                ..RuleSpec::default()
            },
            RuleSpec {
                id: 1,
                new_name: "Renamed".to_string(),
                ..RuleSpec::default()
            },
        ]);
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Logo");
        record.content_type = "image/png".to_string();
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Discard);
        assert_eq!(record.name, "Logo");
    }

    #[test]
    fn test_jump_table_skips_rules() {
        let mut specs = vec![RuleSpec {
            id: 5,
            new_name: "Five".to_string(),
            name_pattern: Some("^Never$".to_string()),
            continue_on_no_match_at: Some(10),
            ..RuleSpec::default()
        }];
        // Rules 6 through 9 would all rename anything that reaches them.
        for id in 6..10 {
            specs.push(RuleSpec {
                id,
                new_name: format!("Swallowed-{id}"),
                ..RuleSpec::default()
            });
        }
        specs.push(RuleSpec {
            id: 10,
            new_name: "Ten".to_string(),
            ..RuleSpec::default()
        });

        let engine = processor(specs);
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Anything");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Ten");
    }

    #[test]
    fn test_non_monotonic_ids_fail_compilation() {
        let result = RequestProcessor::compile(&RuleSetSpec {
            rules: vec![
                RuleSpec {
                    id: 2,
                    new_name: "A".to_string(),
                    ..RuleSpec::default()
                },
                RuleSpec {
                    id: 2,
                    new_name: "B".to_string(),
                    ..RuleSpec::default()
                },
            ],
            ..RuleSetSpec::default()
        });
        assert!(matches!(
            result,
            Err(MergeError::NonMonotonicId { id: 2, previous: 2 })
        ));
    }

    #[test]
    fn test_index_stripping() {
        let engine = RequestProcessor::compile(&RuleSetSpec {
            strip_name_index: true,
            rules: vec![RuleSpec {
                id: 0,
                new_name: "Catalog".to_string(),
                name_pattern: Some("^Product$".to_string()),
                ..RuleSpec::default()
            }],
            ..RuleSetSpec::default()
        })
        .expect("rule set compiles");
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Product.1.2");
        engine.process(&mut record, &mut ctx);
        assert_eq!(record.name, "Catalog");

        // Stripping applies even when no rule matches.
        let mut record = RequestRecord::new("Cart.3");
        engine.process(&mut record, &mut ctx);
        assert_eq!(record.name, "Cart");
    }

    #[test]
    fn test_fault_isolation_restores_name_and_continues() {
        let engine = RequestProcessor::from_rules(
            vec![
                ProcessingRule::faulty_for_tests(0),
                ProcessingRule::compile(&RuleSpec {
                    id: 1,
                    new_name: "Recovered".to_string(),
                    ..RuleSpec::default()
                })
                .expect("rule compiles"),
            ],
            false,
        );
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Original");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        // The faulty rule's partial rename is rolled back before rule 1
        // runs and renames normally.
        assert_eq!(record.name, "Recovered");
    }

    #[test]
    fn test_fault_isolation_keeps_original_name_when_no_rule_matches() {
        let engine = RequestProcessor::from_rules(vec![ProcessingRule::faulty_for_tests(0)], false);
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Original");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Original");
    }

    #[test]
    fn test_empty_rule_set_passes_records_through() {
        let engine = processor(Vec::new());
        assert!(engine.is_empty());
        let mut ctx = engine.new_worker_context();

        let mut record = RequestRecord::new("Unchanged");
        assert_eq!(engine.process(&mut record, &mut ctx), Disposition::Keep);
        assert_eq!(record.name, "Unchanged");
    }

    #[test]
    fn test_validate_rejects_bad_configuration() {
        let spec = RuleSetSpec {
            rules: vec![RuleSpec {
                id: 3,
                new_name: "X".to_string(),
                continue_on_match_at: Some(1),
                ..RuleSpec::default()
            }],
            ..RuleSetSpec::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_caches_answer_repeated_source_text() {
        let engine = processor(vec![RuleSpec {
            id: 0,
            new_name: "Item-{u:1}".to_string(),
            url_pattern: Some(r"/item/(\d+)".to_string()),
            ..RuleSpec::default()
        }]);
        let mut ctx = engine.new_worker_context();

        for _ in 0..3 {
            let mut record = RequestRecord::new("GetItem");
            record.url = "/item/482".to_string();
            engine.process(&mut record, &mut ctx);
            assert_eq!(record.name, "Item-482");
        }
    }
}
