//! Rule engine - compiling rule sets and picking the one that applies to a file

mod compiler;
mod dimensions;
mod engine;
mod expand;
mod pattern;
mod raw;

pub use compiler::{DEFAULT_RULE_NAME, RulesetCache, compile};
pub use dimensions::{ResizePlan, is_rotated_exif};
pub use engine::{FileFacts, RuleEngine, select};
pub use expand::{ExpandedNode, expand, parse_threshold, split_list};
pub use pattern::PathMatcher;
pub use raw::RawRuleNode;

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Group identifier of the uploading user
pub type GroupId = String;

/// Errors raised while compiling rule sets
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid directory pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A field value that is either explicitly set or left to the default rule
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Inherit,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_inherit(&self) -> bool {
        matches!(self, Field::Inherit)
    }

    /// Resolve against the parent's value for the same field
    pub fn or_inherit(self, parent: &Field<T>) -> Field<T>
    where
        T: Clone,
    {
        match self {
            Field::Inherit => parent.clone(),
            set => set,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Inherit => None,
            Field::Set(value) => Some(value),
        }
    }
}

impl<T: Default> Field<T> {
    /// Value once nothing is left to inherit from
    pub fn settle(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

/// A resolved rule: where it applies and what it asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Human-readable name
    pub name: String,

    /// Groups the rule applies to (empty = every user)
    pub groups: BTreeSet<GroupId>,

    /// Directories the file must live under (empty = never matches)
    pub directories: Vec<PathMatcher>,

    /// Lower-cased extensions without dot (empty = any)
    pub extensions: BTreeSet<String>,

    /// Files must be strictly larger than this many bytes
    pub threshold: u64,

    pub max_width: Option<u32>,

    pub max_height: Option<u32>,

    pub keep_metadata: bool,

    pub auto_orient: bool,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = |d: Option<u32>| d.map_or_else(|| "-".to_string(), |v| v.to_string());

        write!(
            f,
            "{}: groups [{}] directories [{}] types [{}] > {} bytes, max {}x{}",
            self.name,
            join_or_dash(self.groups.iter().map(String::as_str)),
            join_or_dash(self.directories.iter().map(PathMatcher::as_str)),
            join_or_dash(self.extensions.iter().map(String::as_str)),
            self.threshold,
            dim(self.max_width),
            dim(self.max_height),
        )?;
        if self.keep_metadata {
            write!(f, ", keep metadata")?;
        }
        if self.auto_orient {
            write!(f, ", auto-orient")?;
        }
        Ok(())
    }
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

/// The compiled, ordered rule list. The default rule is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    pub(crate) fn new(default: Rule, specific: Vec<Rule>) -> Self {
        let mut rules = Vec::with_capacity(specific.len() + 1);
        rules.push(default);
        rules.extend(specific);
        Self { rules }
    }

    /// All rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule built from the top-level configuration
    pub fn default_rule(&self) -> &Rule {
        &self.rules[0]
    }

    /// Rules compiled from child rule sets, in declaration order
    pub fn specific_rules(&self) -> &[Rule] {
        &self.rules[1..]
    }
}
