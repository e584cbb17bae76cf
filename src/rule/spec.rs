//! Raw merge-rule configuration
//!
//! These DTOs mirror the configuration contract one-to-one: an ordered list
//! of rule specifications, each carrying up to eight attribute patterns
//! (with optional exclude twins), response-time boundaries, an output-name
//! template and the control-flow directives. How the specification reaches
//! the process (file, environment, remote push) is the caller's concern;
//! this module only parses and represents it.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration of a single merge rule
///
/// All pattern fields are regular expressions; an absent or empty pattern
/// places no restriction on its attribute. `new_name` is the output-name
/// template with `{typeCode[:group]}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Unique rule ID; IDs must ascend across the rule set and double as
    /// jump-table targets
    pub id: u32,

    /// Output-name template applied when all filters accept
    #[serde(default)]
    pub new_name: String,

    /// Request-name include pattern (`n`)
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Request-name exclude pattern
    #[serde(default)]
    pub name_exclude_pattern: Option<String>,

    /// URL include pattern (`u`)
    #[serde(default)]
    pub url_pattern: Option<String>,
    /// URL exclude pattern
    #[serde(default)]
    pub url_exclude_pattern: Option<String>,

    /// Content-type include pattern (`c`)
    #[serde(default)]
    pub content_type_pattern: Option<String>,
    /// Content-type exclude pattern
    #[serde(default)]
    pub content_type_exclude_pattern: Option<String>,

    /// Status-code include pattern (`s`), matched against decimal text
    #[serde(default)]
    pub status_code_pattern: Option<String>,
    /// Status-code exclude pattern
    #[serde(default)]
    pub status_code_exclude_pattern: Option<String>,

    /// HTTP-method include pattern (`m`)
    #[serde(default)]
    pub http_method_pattern: Option<String>,
    /// HTTP-method exclude pattern
    #[serde(default)]
    pub http_method_exclude_pattern: Option<String>,

    /// Transaction-name include pattern (`t`)
    #[serde(default)]
    pub transaction_pattern: Option<String>,
    /// Transaction-name exclude pattern
    #[serde(default)]
    pub transaction_exclude_pattern: Option<String>,

    /// Agent-name include pattern (`a`)
    #[serde(default)]
    pub agent_pattern: Option<String>,
    /// Agent-name exclude pattern
    #[serde(default)]
    pub agent_exclude_pattern: Option<String>,

    /// Ascending response-time bucket boundaries in milliseconds, consumed
    /// by `{r}` placeholders
    #[serde(default)]
    pub response_time_ranges: Vec<u64>,

    /// Stop rule processing for the record once this rule matched
    #[serde(default = "default_stop_on_match")]
    pub stop_on_match: bool,

    /// Discard the record entirely once this rule matched
    #[serde(default)]
    pub drop_on_match: bool,

    /// Rule ID to continue at after a match (defaults to the next rule);
    /// must not lie behind this rule
    #[serde(default)]
    pub continue_on_match_at: Option<u32>,

    /// Rule ID to continue at after a failed match (defaults to the next
    /// rule); must not lie behind this rule
    #[serde(default)]
    pub continue_on_no_match_at: Option<u32>,
}

fn default_stop_on_match() -> bool {
    true
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            id: 0,
            new_name: String::new(),
            name_pattern: None,
            name_exclude_pattern: None,
            url_pattern: None,
            url_exclude_pattern: None,
            content_type_pattern: None,
            content_type_exclude_pattern: None,
            status_code_pattern: None,
            status_code_exclude_pattern: None,
            http_method_pattern: None,
            http_method_exclude_pattern: None,
            transaction_pattern: None,
            transaction_exclude_pattern: None,
            agent_pattern: None,
            agent_exclude_pattern: None,
            response_time_ranges: Vec::new(),
            stop_on_match: true,
            drop_on_match: false,
            continue_on_match_at: None,
            continue_on_no_match_at: None,
        }
    }
}

/// Configuration of a complete rule set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetSpec {
    /// Truncate each record's name at its first `.` before rule evaluation
    /// (e.g. `"Product.1.2"` becomes `"Product"`)
    #[serde(default)]
    pub strip_name_index: bool,

    /// Per-filter match-cache capacity; absent selects the default, `0`
    /// disables caching
    #[serde(default)]
    pub cache_capacity: Option<usize>,

    /// The rules, ordered by ascending ID
    pub rules: Vec<RuleSpec>,
}

/// Parse a rule-set specification from YAML data
pub fn rule_set_from_yaml(data: &[u8]) -> Result<RuleSetSpec> {
    Ok(serde_yaml::from_slice(data)?)
}

/// Parse a rule-set specification from JSON data
pub fn rule_set_from_json(data: &[u8]) -> Result<RuleSetSpec> {
    Ok(serde_json::from_slice(data)?)
}
