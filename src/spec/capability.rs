// src/spec/capability.rs

//! Capability templates
//!
//! A template is a capability string with `$param` placeholders, e.g.
//! `org.server.interface.$name`. Substituting a feature's parameter values
//! yields concrete capability strings. A placeholder bound to a collection
//! produces one capability per element (the cartesian product when several
//! placeholders are collections). A leading `?` marks a requirement as
//! optional.

use super::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Param(String),
}

/// A template referenced a parameter that has no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundParameter(pub String);

/// A parsed capability template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CapabilityTemplate {
    raw: String,
    optional: bool,
    segments: Vec<TemplateSegment>,
}

impl CapabilityTemplate {
    /// Parse a template. A `$` not followed by a parameter name is literal.
    pub fn parse(s: &str) -> Self {
        let (optional, body) = match s.strip_prefix('?') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let is_name_char = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = body.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            let start = pos + 1;
            let mut end = start;
            while let Some(&(next_pos, next)) = chars.peek() {
                if !is_name_char(next) {
                    break;
                }
                end = next_pos + next.len_utf8();
                chars.next();
            }

            if end == start {
                literal.push('$');
                continue;
            }

            if !literal.is_empty() {
                segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(TemplateSegment::Param(body[start..end].to_string()));
        }

        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }

        Self {
            raw: s.to_string(),
            optional,
            segments,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Names of the referenced parameters, in order of appearance
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Param(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }

    /// Substitute parameter values, expanding collections
    ///
    /// Expansions are produced in element order, leftmost placeholder
    /// varying slowest. Duplicates are dropped.
    pub fn expand(
        &self,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<Vec<String>, UnboundParameter> {
        let mut results = vec![String::new()];

        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => {
                    for result in &mut results {
                        result.push_str(text);
                    }
                }
                TemplateSegment::Param(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| UnboundParameter(name.clone()))?;
                    let mut expanded = Vec::with_capacity(results.len());
                    for prefix in &results {
                        for element in value.values() {
                            expanded.push(format!("{}{}", prefix, element));
                        }
                    }
                    results = expanded;
                }
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        results.retain(|r| seen.insert(r.clone()));
        Ok(results)
    }
}

impl fmt::Display for CapabilityTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<String> for CapabilityTemplate {
    fn from(value: String) -> Self {
        CapabilityTemplate::parse(&value)
    }
}

impl From<CapabilityTemplate> for String {
    fn from(value: CapabilityTemplate) -> Self {
        value.raw
    }
}
