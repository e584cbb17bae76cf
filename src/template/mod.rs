//! Output-name template compiler
//!
//! A rule's output name is a template containing zero or more placeholders
//! of the form `{typeCode}` or `{typeCode:groupIndex}`, e.g.
//! `"Item-{u:1} ({r})"`. Compilation strips the placeholders out of the
//! template once, leaving a literal skeleton plus a table of insertion
//! positions, so renaming a record never re-parses the template.
//!
//! Positions are computed in a single pass: placeholders are deleted from a
//! mutable copy rightmost-first (so earlier spans keep their offsets while
//! the string shrinks), then each placeholder's original start offset is
//! corrected by the cumulative length of everything removed to its left.
//! Total work is linear in the template length.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MergeError, Result};
use crate::filter::RequestAttribute;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z])(?::([0-9]+))?\}").expect("placeholder pattern is valid"));

/// One placeholder extracted from a template
///
/// `position` is a byte offset into the stripped skeleton where the
/// placeholder's replacement text is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSlot {
    /// Attribute the placeholder references
    pub kind: RequestAttribute,
    /// Requested capture group, if the placeholder carries one
    pub group: Option<usize>,
    /// Insertion offset into the skeleton
    pub position: usize,
}

/// A template reduced to its literal skeleton and placeholder table
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    skeleton: String,
    slots: Vec<PlaceholderSlot>,
}

impl CompiledTemplate {
    /// Compile a template string
    ///
    /// Text that does not parse as a placeholder stays literal; a
    /// placeholder with an unknown type code fails compilation.
    pub fn compile(template: &str) -> Result<Self> {
        struct Raw {
            kind: RequestAttribute,
            group: Option<usize>,
            start: usize,
            end: usize,
        }

        let mut raw = Vec::new();
        for captures in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let code = &captures[1];
            let Some(kind) = code.chars().next().and_then(RequestAttribute::from_type_code) else {
                return Err(MergeError::Template {
                    template: template.to_string(),
                    message: format!("unknown placeholder type code '{}'", code),
                });
            };
            let group = match captures.get(2) {
                Some(digits) => {
                    Some(digits.as_str().parse::<usize>().map_err(|_| MergeError::Template {
                        template: template.to_string(),
                        message: format!("capture group index '{}' is out of range", digits.as_str()),
                    })?)
                }
                None => None,
            };
            raw.push(Raw {
                kind,
                group,
                start: whole.start(),
                end: whole.end(),
            });
        }

        // Delete rightmost-first so the remaining spans' offsets stay valid
        // while the copy shrinks.
        let mut skeleton = template.to_string();
        for placeholder in raw.iter().rev() {
            skeleton.replace_range(placeholder.start..placeholder.end, "");
        }

        // Each placeholder's skeleton position is its original start minus
        // the cumulative length removed to its left.
        let mut displacement = 0;
        let slots = raw
            .iter()
            .map(|placeholder| {
                let position = placeholder.start - displacement;
                displacement += placeholder.end - placeholder.start;
                PlaceholderSlot {
                    kind: placeholder.kind,
                    group: placeholder.group,
                    position,
                }
            })
            .collect();

        Ok(Self { skeleton, slots })
    }

    /// The template with all placeholders removed
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }

    /// Placeholders in template order (positions ascending)
    pub fn slots(&self) -> &[PlaceholderSlot] {
        &self.slots
    }

    pub(crate) fn into_parts(self) -> (String, Vec<PlaceholderSlot>) {
        (self.skeleton, self.slots)
    }
}
