//! Value expansion - turning raw string fields into typed values

use std::collections::BTreeSet;

use super::{Field, GroupId, PathMatcher, RawRuleNode, Rule, RuleError};

/// A rule set with typed fields that may still defer to the default rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedNode {
    pub title: Option<String>,
    pub groups: BTreeSet<GroupId>,
    pub directories: Field<Vec<PathMatcher>>,
    pub extensions: Field<BTreeSet<String>>,
    pub threshold: Field<u64>,
    pub max_width: Field<u32>,
    pub max_height: Field<u32>,
    pub keep_metadata: Field<bool>,
    pub auto_orient: Field<bool>,
}

impl ExpandedNode {
    /// Fill every field left at inherit with the parent's value.
    /// Groups are never inherited.
    pub fn inherit_from(self, parent: &ExpandedNode) -> ExpandedNode {
        ExpandedNode {
            title: self.title,
            groups: self.groups,
            directories: self.directories.or_inherit(&parent.directories),
            extensions: self.extensions.or_inherit(&parent.extensions),
            threshold: self.threshold.or_inherit(&parent.threshold),
            max_width: self.max_width.or_inherit(&parent.max_width),
            max_height: self.max_height.or_inherit(&parent.max_height),
            keep_metadata: self.keep_metadata.or_inherit(&parent.keep_metadata),
            auto_orient: self.auto_orient.or_inherit(&parent.auto_orient),
        }
    }

    /// Settle whatever is still unresolved into "no constraint"
    pub fn into_rule(self, name: impl Into<String>) -> Rule {
        Rule {
            name: name.into(),
            groups: self.groups,
            directories: self.directories.settle(),
            extensions: self.extensions.settle(),
            threshold: self.threshold.settle(),
            max_width: self.max_width.into_option(),
            max_height: self.max_height.into_option(),
            keep_metadata: self.keep_metadata.settle(),
            auto_orient: self.auto_orient.settle(),
        }
    }
}

/// Expand every field of a raw rule set
pub fn expand(node: &RawRuleNode) -> Result<ExpandedNode, RuleError> {
    Ok(ExpandedNode {
        title: node
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        groups: split_list(node.usergroup.as_deref()).into_iter().collect(),
        directories: expand_directories(node.directories.as_deref())?,
        extensions: expand_extensions(node.file_types.as_deref()),
        threshold: expand_threshold(node.threshold.as_deref()),
        max_width: expand_dimension(node.max_width.as_deref()),
        max_height: expand_dimension(node.max_height.as_deref()),
        keep_metadata: expand_flag(node.keep_metadata.as_deref()),
        auto_orient: expand_flag(node.auto_orient.as_deref()),
    })
}

/// Split a comma-separated list, trimming items and dropping empty ones
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_directories(value: Option<&str>) -> Result<Field<Vec<PathMatcher>>, RuleError> {
    let directories = split_list(value);
    if directories.is_empty() {
        return Ok(Field::Inherit);
    }

    let matchers = directories
        .iter()
        .map(|dir| PathMatcher::compile(&format!("{}/", dir.trim_end_matches('/'))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Field::Set(matchers))
}

fn expand_extensions(value: Option<&str>) -> Field<BTreeSet<String>> {
    let extensions: BTreeSet<String> = split_list(value)
        .into_iter()
        .map(|ext| ext.to_lowercase())
        .collect();
    if extensions.is_empty() {
        Field::Inherit
    } else {
        Field::Set(extensions)
    }
}

fn expand_threshold(value: Option<&str>) -> Field<u64> {
    match parse_threshold(value.unwrap_or_default()) {
        bytes if bytes > 0 => Field::Set(bytes as u64),
        _ => Field::Inherit,
    }
}

fn expand_dimension(value: Option<&str>) -> Field<u32> {
    match value.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
        Some(px) if px > 0 => Field::Set(u32::try_from(px).unwrap_or(u32::MAX)),
        _ => Field::Inherit,
    }
}

fn expand_flag(value: Option<&str>) -> Field<bool> {
    match value.map(str::trim) {
        None | Some("") => Field::Inherit,
        Some(flag) => Field::Set(flag == "1"),
    }
}

/// Parse a size threshold into bytes.
///
/// Plain numbers are taken as bytes. Otherwise the last character is a unit:
/// `K` multiplies the leading integer by 1024, `M` by 1024², anything else
/// yields 0. The result may be zero or negative, which callers treat as
/// "not set".
pub fn parse_threshold(value: &str) -> i64 {
    let value = value.trim();
    if value.is_empty() {
        return 0;
    }
    if let Some(bytes) = parse_numeric(value) {
        return bytes;
    }

    let Some(unit) = value.chars().last() else {
        return 0;
    };
    let factor: i64 = match unit.to_ascii_uppercase() {
        'K' => 1024,
        'M' => 1024 * 1024,
        _ => 0,
    };
    let prefix = &value[..value.len() - unit.len_utf8()];
    leading_integer(prefix.trim()).saturating_mul(factor)
}

fn parse_numeric(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
    })
}

/// Leading optionally-signed integer of a string, 0 if there is none
fn leading_integer(value: &str) -> i64 {
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> RawRuleNode {
        RawRuleNode::default()
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("500"), 500);
        assert_eq!(parse_threshold("2K"), 2048);
        assert_eq!(parse_threshold("2k"), 2048);
        assert_eq!(parse_threshold("3M"), 3_145_728);
        assert_eq!(parse_threshold(" 10 M "), 10_485_760);
        assert_eq!(parse_threshold("abc"), 0);
        assert_eq!(parse_threshold("12G"), 0);
        assert_eq!(parse_threshold(""), 0);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some(" 1, 2,,3 ,")), vec!["1", "2", "3"]);
        assert!(split_list(Some(" , ")).is_empty());
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_empty_node_inherits_everything() {
        let expanded = expand(&node()).unwrap();

        assert!(expanded.groups.is_empty());
        assert!(expanded.directories.is_inherit());
        assert!(expanded.extensions.is_inherit());
        assert!(expanded.threshold.is_inherit());
        assert!(expanded.max_width.is_inherit());
        assert!(expanded.max_height.is_inherit());
        assert!(expanded.keep_metadata.is_inherit());
        assert!(expanded.auto_orient.is_inherit());
    }

    #[test]
    fn test_expand_typed_values() {
        let raw = RawRuleNode {
            usergroup: Some("editors, 7".to_string()),
            directories: Some("fileadmin//, uploads/*/images".to_string()),
            file_types: Some("JPG, png".to_string()),
            threshold: Some("400K".to_string()),
            max_width: Some("1024".to_string()),
            max_height: Some("0".to_string()),
            keep_metadata: Some("0".to_string()),
            auto_orient: Some("1".to_string()),
            ..node()
        };
        let expanded = expand(&raw).unwrap();

        assert_eq!(
            expanded.groups,
            BTreeSet::from(["7".to_string(), "editors".to_string()])
        );
        let Field::Set(dirs) = &expanded.directories else {
            panic!("directories should be set");
        };
        let dirs: Vec<_> = dirs.iter().map(PathMatcher::as_str).collect();
        assert_eq!(dirs, vec!["fileadmin/", "uploads/*/images/"]);
        assert_eq!(
            expanded.extensions,
            Field::Set(BTreeSet::from(["jpg".to_string(), "png".to_string()]))
        );
        assert_eq!(expanded.threshold, Field::Set(409_600));
        assert_eq!(expanded.max_width, Field::Set(1024));
        assert_eq!(expanded.max_height, Field::Inherit);
        assert_eq!(expanded.keep_metadata, Field::Set(false));
        assert_eq!(expanded.auto_orient, Field::Set(true));
    }

    #[test]
    fn test_non_positive_values_inherit() {
        let raw = RawRuleNode {
            threshold: Some("abc".to_string()),
            max_width: Some("-5".to_string()),
            max_height: Some("wide".to_string()),
            ..node()
        };
        let expanded = expand(&raw).unwrap();

        assert!(expanded.threshold.is_inherit());
        assert!(expanded.max_width.is_inherit());
        assert!(expanded.max_height.is_inherit());
    }
}
