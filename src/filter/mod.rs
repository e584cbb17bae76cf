//! Attribute filters used by merge rules
//!
//! A filter is a single matching predicate over one attribute of a
//! [`RequestRecord`]. Text filters test a compiled regular expression
//! against the attribute's text (an absent pattern matches trivially and
//! the filter acts as a pure data source); the response-time filter never
//! rejects anything and only supplies a bucket label for the output name.
//!
//! Accepted matches are returned as owned, immutable snapshots with all
//! capture-group text extracted eagerly, so an outcome stays valid for as
//! long as the caller holds it, including across the per-worker bounded
//! match cache, where snapshots are shared via `Arc`.

use std::borrow::Cow;
use std::sync::Arc;

use regex::Regex;

use crate::error::{MergeError, Result};
use crate::record::RequestRecord;

pub mod cache;
pub mod time_range;

pub use cache::MatchCaches;
pub use time_range::ResponseTimeFilter;

/// The record attribute a filter or placeholder refers to
///
/// Each attribute has a stable single-letter type code that is part of the
/// configuration language (`{u:1}` in a template references the URL
/// filter's first capture group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestAttribute {
    /// Request name (`n`)
    RequestName,
    /// Request URL (`u`)
    Url,
    /// Response content type (`c`)
    ContentType,
    /// HTTP status code (`s`)
    StatusCode,
    /// HTTP method (`m`)
    HttpMethod,
    /// Transaction name (`t`)
    TransactionName,
    /// Agent name (`a`)
    AgentName,
    /// Response-time bucket (`r`)
    ResponseTime,
}

impl RequestAttribute {
    /// The single-letter type code used in templates and diagnostics
    pub fn type_code(&self) -> char {
        match self {
            Self::RequestName => 'n',
            Self::Url => 'u',
            Self::ContentType => 'c',
            Self::StatusCode => 's',
            Self::HttpMethod => 'm',
            Self::TransactionName => 't',
            Self::AgentName => 'a',
            Self::ResponseTime => 'r',
        }
    }

    /// Resolve a type code back to its attribute
    pub fn from_type_code(code: char) -> Option<Self> {
        match code {
            'n' => Some(Self::RequestName),
            'u' => Some(Self::Url),
            'c' => Some(Self::ContentType),
            's' => Some(Self::StatusCode),
            'm' => Some(Self::HttpMethod),
            't' => Some(Self::TransactionName),
            'a' => Some(Self::AgentName),
            'r' => Some(Self::ResponseTime),
            _ => None,
        }
    }

    /// Human-readable attribute name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestName => "name",
            Self::Url => "url",
            Self::ContentType => "content type",
            Self::StatusCode => "status code",
            Self::HttpMethod => "http method",
            Self::TransactionName => "transaction name",
            Self::AgentName => "agent name",
            Self::ResponseTime => "response time",
        }
    }

    /// Error-message name for the attribute's exclude twin
    pub fn exclude_name(&self) -> &'static str {
        match self {
            Self::RequestName => "name exclude",
            Self::Url => "url exclude",
            Self::ContentType => "content type exclude",
            Self::StatusCode => "status code exclude",
            Self::HttpMethod => "http method exclude",
            Self::TransactionName => "transaction name exclude",
            Self::AgentName => "agent name exclude",
            Self::ResponseTime => "response time exclude",
        }
    }

    /// Extract the attribute's text from a record
    ///
    /// Numeric attributes are rendered to decimal text; all others borrow
    /// directly from the record.
    pub fn source_text<'r>(&self, record: &'r RequestRecord) -> Cow<'r, str> {
        match self {
            Self::RequestName => Cow::Borrowed(&record.name),
            Self::Url => Cow::Borrowed(&record.url),
            Self::ContentType => Cow::Borrowed(&record.content_type),
            Self::StatusCode => Cow::Owned(record.status_code.to_string()),
            Self::HttpMethod => Cow::Borrowed(&record.http_method),
            Self::TransactionName => Cow::Borrowed(&record.transaction_name),
            Self::AgentName => Cow::Borrowed(&record.agent_name),
            Self::ResponseTime => Cow::Owned(record.response_time_millis.to_string()),
        }
    }
}

/// Immutable snapshot of a successful pattern match
///
/// Group 0 is the whole match; optional groups that did not participate in
/// the match are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    groups: Vec<Option<String>>,
}

impl MatchSnapshot {
    fn from_captures(captures: &regex::Captures<'_>) -> Self {
        Self {
            groups: captures
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    /// Text of the given capture group
    ///
    /// Returns `None` if the index is beyond the pattern's group count, and
    /// `Some(None)` for a group that exists but did not participate.
    pub fn group(&self, index: usize) -> Option<Option<&str>> {
        self.groups.get(index).map(|g| g.as_deref())
    }
}

/// Outcome of an accepted filter evaluation
///
/// `Trivial` carries no capture data: the filter either has no pattern, is
/// an exclude filter whose pattern did not match, or is the response-time
/// filter. Replacement text for those cases is derived from the record
/// itself.
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    /// Accepted without capture data
    Trivial,
    /// Accepted with an eagerly extracted capture snapshot
    Captures(Arc<MatchSnapshot>),
}

/// Regex predicate over one text attribute
///
/// `exclude` inverts the match decision: the filter accepts exactly when
/// the pattern does **not** match. A filter without a pattern always
/// accepts and only serves as a data source for placeholders.
#[derive(Debug, Clone)]
pub struct TextFilter {
    pattern: Option<Regex>,
    exclude: bool,
    cache_slot: Option<usize>,
}

impl TextFilter {
    pub(crate) fn new(pattern: Option<Regex>, exclude: bool) -> Self {
        Self {
            pattern,
            exclude,
            cache_slot: None,
        }
    }

    /// Whether this filter accepts everything (no pattern configured)
    pub fn is_trivial(&self) -> bool {
        self.pattern.is_none()
    }

    /// Whether the match decision is inverted
    pub fn exclude(&self) -> bool {
        self.exclude
    }

    pub(crate) fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Assign the worker-cache slot this filter's results are memoized in.
    /// Only pattern-bearing filters get a slot; trivial filters have
    /// nothing worth caching.
    pub(crate) fn assign_cache_slot(&mut self, slot: usize) {
        if self.pattern.is_some() {
            self.cache_slot = Some(slot);
        }
    }

    fn evaluate(&self, source: &str, caches: &mut MatchCaches) -> Option<FilterOutcome> {
        let Some(pattern) = &self.pattern else {
            return Some(FilterOutcome::Trivial);
        };

        if let Some(slot) = self.cache_slot {
            if let Some(hit) = caches.lookup(slot, source) {
                return hit;
            }
            let outcome = self.run_pattern(pattern, source);
            caches.store(slot, source.to_string(), outcome.clone());
            return outcome;
        }

        self.run_pattern(pattern, source)
    }

    fn run_pattern(&self, pattern: &Regex, source: &str) -> Option<FilterOutcome> {
        if self.exclude {
            // Exclude filters never feed capture groups, so the cheaper
            // boolean match suffices.
            if pattern.is_match(source) {
                None
            } else {
                Some(FilterOutcome::Trivial)
            }
        } else {
            pattern
                .captures(source)
                .map(|captures| FilterOutcome::Captures(Arc::new(MatchSnapshot::from_captures(&captures))))
        }
    }
}

/// A single-attribute predicate owned by a merge rule
///
/// Closed over the eight type codes so that attribute handling is
/// exhaustively checked; each variant carries only the state it needs.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Predicate over the request name (`n`)
    RequestName(TextFilter),
    /// Predicate over the request URL (`u`)
    Url(TextFilter),
    /// Predicate over the response content type (`c`)
    ContentType(TextFilter),
    /// Predicate over the HTTP status code (`s`)
    StatusCode(TextFilter),
    /// Predicate over the HTTP method (`m`)
    HttpMethod(TextFilter),
    /// Predicate over the transaction name (`t`)
    TransactionName(TextFilter),
    /// Predicate over the agent name (`a`)
    AgentName(TextFilter),
    /// Response-time bucket source (`r`); matches every record
    ResponseTimeRange(ResponseTimeFilter),
}

impl Filter {
    /// The attribute this filter evaluates
    pub fn kind(&self) -> RequestAttribute {
        match self {
            Self::RequestName(_) => RequestAttribute::RequestName,
            Self::Url(_) => RequestAttribute::Url,
            Self::ContentType(_) => RequestAttribute::ContentType,
            Self::StatusCode(_) => RequestAttribute::StatusCode,
            Self::HttpMethod(_) => RequestAttribute::HttpMethod,
            Self::TransactionName(_) => RequestAttribute::TransactionName,
            Self::AgentName(_) => RequestAttribute::AgentName,
            Self::ResponseTimeRange(_) => RequestAttribute::ResponseTime,
        }
    }

    pub(crate) fn text_filter(&self) -> Option<&TextFilter> {
        match self {
            Self::RequestName(f)
            | Self::Url(f)
            | Self::ContentType(f)
            | Self::StatusCode(f)
            | Self::HttpMethod(f)
            | Self::TransactionName(f)
            | Self::AgentName(f) => Some(f),
            Self::ResponseTimeRange(_) => None,
        }
    }

    pub(crate) fn text_filter_mut(&mut self) -> Option<&mut TextFilter> {
        match self {
            Self::RequestName(f)
            | Self::Url(f)
            | Self::ContentType(f)
            | Self::StatusCode(f)
            | Self::HttpMethod(f)
            | Self::TransactionName(f)
            | Self::AgentName(f) => Some(f),
            Self::ResponseTimeRange(_) => None,
        }
    }

    /// Evaluate the filter against a record
    ///
    /// Returns `None` when the filter rejects the record; otherwise an
    /// outcome that [`Filter::replacement_text`] can extract text from.
    pub fn evaluate(&self, record: &RequestRecord, caches: &mut MatchCaches) -> Option<FilterOutcome> {
        match self.text_filter() {
            Some(filter) => {
                let source = self.kind().source_text(record);
                filter.evaluate(&source, caches)
            }
            // The response-time filter matches every record.
            None => Some(FilterOutcome::Trivial),
        }
    }

    /// Text a placeholder bound to this filter substitutes into the name
    ///
    /// Exclude filters and placeholders without a capture group yield the
    /// raw attribute text; the response-time filter yields its bucket
    /// label. A requested capture group beyond the pattern's group count is
    /// rejected during rule compilation and can only surface here as an
    /// evaluation error if a rule was built bypassing validation.
    pub fn replacement_text<'a>(
        &'a self,
        record: &'a RequestRecord,
        group: Option<usize>,
        outcome: &'a FilterOutcome,
    ) -> Result<Cow<'a, str>> {
        match self {
            Self::ResponseTimeRange(filter) => {
                Ok(Cow::Borrowed(filter.bucket_label(record.response_time_millis)))
            }
            _ => {
                let Some(filter) = self.text_filter() else {
                    return Ok(self.kind().source_text(record));
                };
                let Some(group) = group else {
                    return Ok(self.kind().source_text(record));
                };
                if filter.exclude() {
                    return Ok(self.kind().source_text(record));
                }
                match outcome {
                    FilterOutcome::Captures(snapshot) => match snapshot.group(group) {
                        Some(Some(text)) => Ok(Cow::Borrowed(text)),
                        // Group exists but did not take part in the match,
                        // e.g. the unused side of an alternation.
                        Some(None) => Ok(Cow::Borrowed("")),
                        None => Err(MergeError::Evaluation(format!(
                            "capture group {} missing from {} match",
                            group,
                            self.kind().name()
                        ))),
                    },
                    FilterOutcome::Trivial => Err(MergeError::Evaluation(format!(
                        "capture group {} requested from a {} filter that matched without a pattern",
                        group,
                        self.kind().name()
                    ))),
                }
            }
        }
    }
}
