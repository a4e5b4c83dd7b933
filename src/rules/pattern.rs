//! Directory patterns - prefix matchers over slash-separated relative paths
//!
//! A pattern is a directory path whose segments are either literals, `*`
//! (exactly one arbitrary segment) or `**` (zero or more arbitrary segments).
//! Patterns are anchored at the start of the candidate path and match
//! everything beneath the directory they describe.

use regex::Regex;
use std::fmt;

use super::RuleError;

/// A compiled directory pattern
#[derive(Debug, Clone)]
pub struct PathMatcher {
    /// Normalized pattern, always ending with `/`
    source: String,
    regex: Regex,
}

impl PathMatcher {
    /// Compile a directory pattern. A missing trailing `/` is added.
    pub fn compile(directory: &str) -> Result<Self, RuleError> {
        let source = if directory.ends_with('/') {
            directory.to_string()
        } else {
            format!("{}/", directory)
        };

        let mut expr = String::with_capacity(source.len() * 2);
        expr.push('^');
        // The final split item is the empty string after the trailing separator
        let segments: Vec<&str> = source.split('/').collect();
        for segment in &segments[..segments.len() - 1] {
            match *segment {
                "**" => expr.push_str("(?:[^/]+/)*"),
                "*" => expr.push_str("[^/]+/"),
                literal => {
                    expr.push_str(&regex::escape(literal));
                    expr.push('/');
                }
            }
        }

        let regex = Regex::new(&expr).map_err(|e| RuleError::InvalidPattern {
            pattern: source.clone(),
            source: e,
        })?;

        Ok(Self { source, regex })
    }

    /// Check whether a relative path starts with this pattern
    pub fn matches(&self, relative_path: &str) -> bool {
        self.regex.is_match(relative_path)
    }

    /// Get the normalized pattern string
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for PathMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathMatcher {}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
