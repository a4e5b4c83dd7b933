//! Ruleset compiler - default rule, inheritance and de-duplication

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{RawRuleNode, RuleError, Ruleset, expand};

/// Name given to the rule built from the top-level configuration
pub const DEFAULT_RULE_NAME: &str = "Default";

/// Compile the default node and its already-flattened children into the
/// ordered rule list evaluated by the engine.
///
/// Children inherit every unset field from the default rule. A child that
/// still applies to every user only keeps directories the default rule does
/// not already cover, and any child left without directories is dropped.
pub fn compile(default: &RawRuleNode, children: &[RawRuleNode]) -> Result<Ruleset, RuleError> {
    let mut general = expand(default)?;
    // The default rule applies to every group
    general.groups.clear();
    let default_rule = general.clone().into_rule(DEFAULT_RULE_NAME);

    let mut specific = Vec::with_capacity(children.len());
    for (index, child) in children.iter().enumerate() {
        let expanded = expand(child)?.inherit_from(&general);
        let name = expanded
            .title
            .clone()
            .unwrap_or_else(|| format!("Rule set #{}", index + 1));
        let mut rule = expanded.into_rule(name);

        if rule.groups.is_empty() {
            rule.directories
                .retain(|dir| !default_rule.directories.contains(dir));
        }

        if rule.directories.is_empty() {
            debug!("Dropping rule '{}': no directories left to match", rule.name);
            continue;
        }

        trace!("Compiled rule {}", rule);
        specific.push(rule);
    }

    debug!(
        "Compiled {} rule(s) ({} specific)",
        specific.len() + 1,
        specific.len()
    );
    Ok(Ruleset::new(default_rule, specific))
}

/// Memoizes the compiled ruleset for the last raw configuration seen.
///
/// A different configuration replaces the entry; published rulesets are
/// shared through `Arc` and never mutated.
#[derive(Debug, Default)]
pub struct RulesetCache {
    entry: Option<(u64, Arc<Ruleset>)>,
}

impl RulesetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached ruleset for this configuration, compiling it if needed
    pub fn get_or_compile(
        &mut self,
        default: &RawRuleNode,
        children: &[RawRuleNode],
    ) -> Result<Arc<Ruleset>, RuleError> {
        let key = config_hash(default, children);
        if let Some((cached_key, ruleset)) = &self.entry
            && *cached_key == key
        {
            trace!("Ruleset cache hit");
            return Ok(Arc::clone(ruleset));
        }

        let ruleset = Arc::new(compile(default, children)?);
        self.entry = Some((key, Arc::clone(&ruleset)));
        Ok(ruleset)
    }
}

fn config_hash(default: &RawRuleNode, children: &[RawRuleNode]) -> u64 {
    let mut hasher = DefaultHasher::new();
    default.hash(&mut hasher);
    children.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::PathMatcher;

    fn raw(pairs: &[(&str, &str)]) -> RawRuleNode {
        let mut node = RawRuleNode::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "title" => node.title = value,
                "usergroup" => node.usergroup = value,
                "directories" => node.directories = value,
                "file_types" => node.file_types = value,
                "threshold" => node.threshold = value,
                "max_width" => node.max_width = value,
                "max_height" => node.max_height = value,
                "keep_metadata" => node.keep_metadata = value,
                "auto_orient" => node.auto_orient = value,
                other => panic!("unknown field {other}"),
            }
        }
        node
    }

    fn dirs(rule: &crate::rules::Rule) -> Vec<&str> {
        rule.directories.iter().map(PathMatcher::as_str).collect()
    }

    #[test]
    fn test_empty_configuration_yields_inert_default() {
        let ruleset = compile(&RawRuleNode::default(), &[]).unwrap();

        assert_eq!(ruleset.rules().len(), 1);
        let default = ruleset.default_rule();
        assert_eq!(default.name, DEFAULT_RULE_NAME);
        assert!(default.directories.is_empty());
        assert_eq!(default.max_width, None);
        assert_eq!(default.max_height, None);
        assert_eq!(default.threshold, 0);
    }

    #[test]
    fn test_default_ignores_usergroup() {
        let ruleset = compile(&raw(&[("usergroup", "admins")]), &[]).unwrap();
        assert!(ruleset.default_rule().groups.is_empty());
    }

    #[test]
    fn test_children_inherit_unset_fields() {
        let default = raw(&[
            ("directories", "fileadmin/"),
            ("file_types", "jpg,png"),
            ("threshold", "1M"),
            ("max_width", "1024"),
            ("max_height", "768"),
            ("auto_orient", "1"),
        ]);
        let child = raw(&[
            ("title", "Editors"),
            ("usergroup", "2"),
            ("max_width", "640"),
            ("keep_metadata", "1"),
        ]);
        let ruleset = compile(&default, &[child]).unwrap();

        let rule = &ruleset.specific_rules()[0];
        assert_eq!(rule.name, "Editors");
        assert_eq!(dirs(rule), vec!["fileadmin/"]);
        assert!(rule.extensions.contains("png"));
        assert_eq!(rule.threshold, 1024 * 1024);
        assert_eq!(rule.max_width, Some(640));
        assert_eq!(rule.max_height, Some(768));
        assert!(rule.keep_metadata);
        assert!(rule.auto_orient);
    }

    #[test]
    fn test_group_rule_without_any_directories_is_dropped() {
        let child = raw(&[("usergroup", "2"), ("max_width", "640")]);
        let ruleset = compile(&RawRuleNode::default(), &[child]).unwrap();

        assert!(ruleset.specific_rules().is_empty());
    }

    #[test]
    fn test_global_rule_keeps_only_new_directories() {
        let default = raw(&[("directories", "fileadmin/, uploads/")]);
        let children = [
            raw(&[("directories", "uploads, media/"), ("max_width", "300")]),
            raw(&[("directories", "fileadmin/"), ("max_width", "200")]),
            raw(&[("max_width", "100")]),
        ];
        let ruleset = compile(&default, &children).unwrap();

        assert_eq!(ruleset.specific_rules().len(), 1);
        let rule = &ruleset.specific_rules()[0];
        assert_eq!(rule.name, "Rule set #1");
        assert_eq!(dirs(rule), vec!["media/"]);
    }

    #[test]
    fn test_group_rule_keeps_overlapping_directories() {
        let default = raw(&[("directories", "fileadmin/")]);
        let child = raw(&[("usergroup", "5"), ("directories", "fileadmin/")]);
        let ruleset = compile(&default, &[child]).unwrap();

        assert_eq!(dirs(&ruleset.specific_rules()[0]), vec!["fileadmin/"]);
    }

    #[test]
    fn test_order_is_default_then_declaration() {
        let children = [
            raw(&[("title", "first"), ("directories", "a/")]),
            raw(&[("title", "second"), ("directories", "b/")]),
        ];
        let ruleset = compile(&RawRuleNode::default(), &children).unwrap();

        let names: Vec<_> = ruleset.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![DEFAULT_RULE_NAME, "first", "second"]);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let default = raw(&[("directories", "fileadmin/**/img/"), ("threshold", "2K")]);
        let children = [raw(&[("usergroup", "1,2"), ("file_types", "JPG")])];

        assert_eq!(
            compile(&default, &children).unwrap(),
            compile(&default, &children).unwrap()
        );
    }

    #[test]
    fn test_cache_reuses_and_invalidates() {
        let mut cache = RulesetCache::new();
        let default = raw(&[("directories", "fileadmin/")]);

        let first = cache.get_or_compile(&default, &[]).unwrap();
        let second = cache.get_or_compile(&default, &[]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let changed = raw(&[("directories", "uploads/")]);
        let third = cache.get_or_compile(&changed, &[]).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(dirs(third.default_rule()), vec!["uploads/"]);
        // The previously published ruleset is untouched
        assert_eq!(dirs(first.default_rule()), vec!["fileadmin/"]);
    }
}
