//! Full-match pattern lists for restriction rules.
//!
//! Patterns are compiled once, at configuration time, into a single
//! `RegexSet`. Wildcards are translated to regexes first. The `regex` crate
//! matches with finite automata (no backtracking, linear in the candidate),
//! so matching attacker-controlled strings has a bounded worst case.

use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the compiled size of one pattern list.
pub const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// How the strings of a pattern list are interpreted.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSyntax {
    /// Regular expressions (`regex` crate syntax).
    #[default]
    Regex,
    /// `*` matches any sequence, `?` any single character, everything else
    /// is literal.
    Wildcard,
}

/// A compiled list of patterns. A candidate matches the list when at least
/// one pattern matches the entire candidate.
#[derive(Debug, Clone)]
pub struct PatternList {
    set: RegexSet,
    sources: Vec<String>,
}

impl PatternList {
    /// Compile `patterns`. `field` names the configuration field in errors.
    pub fn compile<S: AsRef<str>>(
        field: &'static str,
        patterns: &[S],
        syntax: PatternSyntax,
    ) -> Result<Self, ConfigError> {
        let sources: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let regexes: Vec<String> = match syntax {
            PatternSyntax::Regex => sources.clone(),
            PatternSyntax::Wildcard => sources.iter().map(|p| wildcard_to_regex(p)).collect(),
        };
        let set = build_regex_set(field, &sources, &regexes)?;
        Ok(Self { set, sources })
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// The patterns as configured.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// `true` iff some pattern matches all of `candidate`. An empty list
    /// matches nothing.
    pub fn matches(&self, candidate: &str) -> bool {
        self.set.is_match(candidate)
    }
}

/// Escape the literal runs of `pattern` and turn `*` / `?` into their regex
/// equivalents. Both also match newlines.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();
    for c in pattern.chars() {
        let wildcard = match c {
            '*' => "(?s:.*)",
            '?' => "(?s:.)",
            _ => {
                literal.push(c);
                continue;
            }
        };
        regex.push_str(&regex::escape(&literal));
        literal.clear();
        regex.push_str(wildcard);
    }
    regex.push_str(&regex::escape(&literal));
    regex
}

/// Each pattern is first compiled on its own so that an unbalanced pattern
/// cannot escape the anchoring group it is wrapped in. Errors name the
/// pattern as configured.
fn build_regex_set(
    field: &'static str,
    sources: &[String],
    regexes: &[String],
) -> Result<RegexSet, ConfigError> {
    let invalid = |pattern: &str, source: regex::Error| ConfigError::InvalidRegex {
        field,
        pattern: pattern.to_string(),
        source,
    };

    for (source, regex) in sources.iter().zip(regexes) {
        RegexBuilder::new(regex)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| invalid(source.as_str(), e))?;
    }

    RegexSetBuilder::new(regexes.iter().map(|p| format!("^(?:{p})$")))
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| invalid(sources.join(", ").as_str(), e))
}
