//! Merge rules: configuration compilation and per-record application
//!
//! A [`ProcessingRule`] is the compiled, immutable form of one
//! [`RuleSpec`]: its attribute patterns compiled, its output-name template
//! reduced to a skeleton plus insertion positions, its filter list pruned
//! to the filters that actually matter, and its jump targets normalized.
//! Everything that can be wrong with a rule is rejected here, at
//! compile time, with the offending rule identified; per-record
//! application is validation-free.

use regex::Regex;
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::filter::{Filter, FilterOutcome, MatchCaches, RequestAttribute, ResponseTimeFilter, TextFilter};
use crate::record::RequestRecord;
use crate::template::CompiledTemplate;

pub mod spec;

pub use spec::{rule_set_from_json, rule_set_from_yaml, RuleSetSpec, RuleSpec};

/// Control-flow directive returned by [`ProcessingRule::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpDirective {
    /// Discard the record; no further rules run
    Drop,
    /// Keep the record as named now; no further rules run
    Stop,
    /// Continue the scan at the first rule with at least this ID
    ContinueAt(u32),
}

/// A placeholder slot bound to its backing filter
#[derive(Debug, Clone)]
struct BoundSlot {
    filter_index: usize,
    group: Option<usize>,
    position: usize,
}

/// One compiled merge rule
///
/// Immutable after construction and freely shared across workers; all
/// mutable match state lives in the per-worker [`MatchCaches`].
#[derive(Debug, Clone)]
pub struct ProcessingRule {
    id: u32,
    template: String,
    filters: Vec<Filter>,
    skeleton: String,
    slots: Vec<BoundSlot>,
    drop_on_match: bool,
    stop_on_match: bool,
    continue_on_match: u32,
    continue_on_no_match: u32,
}

fn compile_pattern(id: u32, attribute: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| MergeError::Pattern {
        rule: id,
        attribute,
        pattern: pattern.to_string(),
        source,
    })
}

fn normalize(pattern: &Option<String>) -> Option<&str> {
    pattern.as_deref().filter(|pattern| !pattern.is_empty())
}

impl ProcessingRule {
    /// Compile a rule specification
    ///
    /// Fails with a descriptive error on an invalid pattern, an unknown or
    /// malformed placeholder, a capture group beyond the backing pattern's
    /// group count, a backward jump target, or a non-drop rule without an
    /// output name.
    pub fn compile(spec: &RuleSpec) -> Result<Self> {
        let id = spec.id;

        if spec.new_name.is_empty() && !spec.drop_on_match {
            return Err(MergeError::Rule {
                id,
                message: "new_name must not be empty unless drop_on_match is set".to_string(),
            });
        }

        let template = CompiledTemplate::compile(&spec.new_name)
            .map_err(|err| MergeError::Rule { id, message: err.to_string() })?;
        let (skeleton, raw_slots) = template.into_parts();

        // Text filters in declaration order, include before exclude per
        // attribute. An include filter exists when its pattern is set or a
        // placeholder references the attribute (pure data source); an
        // exclude filter exists exactly when its pattern is set. Attributes
        // with neither are skipped entirely.
        let attributes: [(RequestAttribute, fn(TextFilter) -> Filter, Option<&str>, Option<&str>); 7] = [
            (
                RequestAttribute::RequestName,
                Filter::RequestName,
                normalize(&spec.name_pattern),
                normalize(&spec.name_exclude_pattern),
            ),
            (
                RequestAttribute::Url,
                Filter::Url,
                normalize(&spec.url_pattern),
                normalize(&spec.url_exclude_pattern),
            ),
            (
                RequestAttribute::ContentType,
                Filter::ContentType,
                normalize(&spec.content_type_pattern),
                normalize(&spec.content_type_exclude_pattern),
            ),
            (
                RequestAttribute::StatusCode,
                Filter::StatusCode,
                normalize(&spec.status_code_pattern),
                normalize(&spec.status_code_exclude_pattern),
            ),
            (
                RequestAttribute::HttpMethod,
                Filter::HttpMethod,
                normalize(&spec.http_method_pattern),
                normalize(&spec.http_method_exclude_pattern),
            ),
            (
                RequestAttribute::TransactionName,
                Filter::TransactionName,
                normalize(&spec.transaction_pattern),
                normalize(&spec.transaction_exclude_pattern),
            ),
            (
                RequestAttribute::AgentName,
                Filter::AgentName,
                normalize(&spec.agent_pattern),
                normalize(&spec.agent_exclude_pattern),
            ),
        ];

        let mut filters = Vec::new();
        for (kind, make, include, exclude) in attributes {
            let referenced = raw_slots.iter().any(|slot| slot.kind == kind);
            if include.is_some() || referenced {
                let pattern = match include {
                    Some(pattern) => Some(compile_pattern(id, kind.name(), pattern)?),
                    None => None,
                };
                filters.push(make(TextFilter::new(pattern, false)));
            }
            if let Some(pattern) = exclude {
                let pattern = compile_pattern(id, kind.exclude_name(), pattern)?;
                filters.push(make(TextFilter::new(Some(pattern), true)));
            }
        }

        // Response-time boundaries are validated whenever configured, but
        // the filter is only retained when a {r} placeholder consumes it;
        // it matches everything and feeds nothing otherwise.
        let time_referenced = raw_slots
            .iter()
            .any(|slot| slot.kind == RequestAttribute::ResponseTime);
        if !spec.response_time_ranges.is_empty() {
            let filter = ResponseTimeFilter::new(spec.response_time_ranges.clone()).map_err(|message| {
                MergeError::Rule {
                    id,
                    message: format!("invalid response time ranges: {message}"),
                }
            })?;
            if time_referenced {
                filters.push(Filter::ResponseTimeRange(filter));
            } else {
                debug!("rule {}: response time ranges configured without a {{r}} placeholder", id);
            }
        }

        // Bind each slot to the include-side filter of its attribute and
        // validate requested capture groups against the pattern's actual
        // group count. A slot whose backing filter does not exist ({r}
        // without configured ranges) is pruned; its placeholder text is
        // already stripped from the skeleton.
        let mut slots = Vec::with_capacity(raw_slots.len());
        for raw in &raw_slots {
            let backing = filters.iter().position(|filter| {
                filter.kind() == raw.kind
                    && !filter.text_filter().map(TextFilter::exclude).unwrap_or(false)
            });
            let Some(filter_index) = backing else {
                debug!(
                    "rule {}: placeholder '{{{}}}' has no backing filter and was pruned",
                    id,
                    raw.kind.type_code()
                );
                continue;
            };

            if let Some(group) = raw.group {
                match &filters[filter_index] {
                    Filter::ResponseTimeRange(_) => {
                        return Err(MergeError::Rule {
                            id,
                            message: format!(
                                "placeholder '{{r:{group}}}' must not request a capture group"
                            ),
                        });
                    }
                    filter => match filter.text_filter().and_then(TextFilter::pattern) {
                        Some(pattern) => {
                            if group >= pattern.captures_len() {
                                return Err(MergeError::CaptureGroupOutOfRange {
                                    rule: id,
                                    attribute: raw.kind.name(),
                                    group,
                                    available: pattern.captures_len() - 1,
                                });
                            }
                        }
                        None => {
                            return Err(MergeError::Rule {
                                id,
                                message: format!(
                                    "placeholder '{{{}:{}}}' requests a capture group but no {} pattern is configured",
                                    raw.kind.type_code(),
                                    group,
                                    raw.kind.name()
                                ),
                            });
                        }
                    },
                }
            }

            slots.push(BoundSlot {
                filter_index,
                group: raw.group,
                position: raw.position,
            });
        }

        let continue_on_match = match spec.continue_on_match_at {
            Some(target) if target < id => return Err(MergeError::BackwardJump { id, target }),
            Some(target) => target,
            None => id.saturating_add(1),
        };
        let continue_on_no_match = match spec.continue_on_no_match_at {
            Some(target) if target < id => return Err(MergeError::BackwardJump { id, target }),
            Some(target) => target,
            None => id.saturating_add(1),
        };

        debug!(
            "rule {}: compiled with {} filter(s), {} placeholder slot(s)",
            id,
            filters.len(),
            slots.len()
        );

        Ok(Self {
            id,
            template: spec.new_name.clone(),
            filters,
            skeleton,
            slots,
            drop_on_match: spec.drop_on_match,
            stop_on_match: spec.stop_on_match,
            continue_on_match,
            continue_on_no_match,
        })
    }

    /// The rule's unique ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The active filters, in evaluation order
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// The output-name template with placeholders stripped
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }

    /// Short human-readable identification used in log messages
    pub fn describe(&self) -> String {
        format!("rule {} ('{}')", self.id, self.template)
    }

    pub(crate) fn assign_cache_slots(&mut self, next_slot: &mut usize) {
        for filter in &mut self.filters {
            if let Some(text) = filter.text_filter_mut() {
                if text.pattern().is_some() {
                    text.assign_cache_slot(*next_slot);
                    *next_slot += 1;
                }
            }
        }
    }

    /// Apply the rule to one record
    ///
    /// Filters are evaluated in declaration order with short-circuit AND
    /// semantics; the first rejecting filter ends the rule with the
    /// no-match jump and the record untouched. When every filter accepts,
    /// the record is dropped, renamed from the precompiled skeleton, or
    /// both left alone, and the matching jump directive is returned.
    pub fn apply(&self, record: &mut RequestRecord, caches: &mut MatchCaches) -> Result<JumpDirective> {
        let mut outcomes: Vec<FilterOutcome> = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            match filter.evaluate(record, caches) {
                Some(outcome) => outcomes.push(outcome),
                None => return Ok(JumpDirective::ContinueAt(self.continue_on_no_match)),
            }
        }

        if self.drop_on_match {
            return Ok(JumpDirective::Drop);
        }

        if self.slots.is_empty() {
            // Static rename: no data fields needed.
            record.name = self.skeleton.clone();
        } else {
            // Slot positions refer to the unmodified skeleton; processing
            // them position-ascending with a running inserted-length offset
            // keeps every insertion point correct without recomputation.
            let mut name = String::with_capacity(self.skeleton.len() + 16);
            name.push_str(&self.skeleton);
            let mut inserted = 0;
            for slot in &self.slots {
                let outcome = &outcomes[slot.filter_index];
                let text =
                    self.filters[slot.filter_index].replacement_text(record, slot.group, outcome)?;
                name.insert_str(slot.position + inserted, &text);
                inserted += text.len();
            }
            record.name = name;
        }

        if self.stop_on_match {
            Ok(JumpDirective::Stop)
        } else {
            Ok(JumpDirective::ContinueAt(self.continue_on_match))
        }
    }

    /// Build a rule that fails at replacement time: its only slot requests
    /// a capture group from a pattern-less filter, which compilation would
    /// normally reject.
    #[cfg(test)]
    pub(crate) fn faulty_for_tests(id: u32) -> Self {
        Self {
            id,
            template: "Broken-{n:1}".to_string(),
            filters: vec![Filter::RequestName(TextFilter::new(None, false))],
            skeleton: "Broken-".to_string(),
            slots: vec![BoundSlot {
                filter_index: 0,
                group: Some(1),
                position: 7,
            }],
            drop_on_match: false,
            stop_on_match: true,
            continue_on_match: id.saturating_add(1),
            continue_on_no_match: id.saturating_add(1),
        }
    }
}
