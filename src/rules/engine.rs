//! Rule engine - selects the rule that applies to an uploaded file

use std::collections::BTreeSet;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{GroupId, Rule, Ruleset};

/// What the engine needs to know about a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    /// Path relative to the site root, `/`-separated
    pub relative_path: String,
    /// Lower-cased text after the last `.` of the file name (empty if none)
    pub extension: String,
    /// Size in bytes
    pub size: u64,
}

impl FileFacts {
    pub fn new(relative_path: impl Into<String>, size: u64) -> Self {
        let relative_path = relative_path.into();
        let extension = extension_of(&relative_path);
        Self {
            relative_path,
            extension,
            size,
        }
    }

    /// Gather facts from disk. Returns `None` when the path is not a regular file.
    pub fn from_path(path: &Path, site_root: &Path) -> Option<Self> {
        let metadata = match path.metadata() {
            Ok(m) => m,
            Err(e) => {
                trace!("Cannot stat {}: {}", path.display(), e);
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }
        Some(Self::new(relative_path(path, site_root), metadata.len()))
    }
}

/// Path relative to the site root; paths outside of it are kept as given
fn relative_path(path: &Path, site_root: &Path) -> String {
    let relative = path.strip_prefix(site_root).unwrap_or(path);
    let relative = relative.to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        relative.into_owned()
    } else {
        relative.replace(MAIN_SEPARATOR, "/")
    }
}

fn extension_of(relative_path: &str) -> String {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

impl Rule {
    /// Check if a file uploaded by a member of `groups` falls under this rule
    pub fn matches(&self, file: &FileFacts, groups: &BTreeSet<GroupId>) -> bool {
        if !self.groups.is_empty() && self.groups.is_disjoint(groups) {
            return false;
        }

        // A rule without directories never matches
        if !self
            .directories
            .iter()
            .any(|dir| dir.matches(&file.relative_path))
        {
            return false;
        }

        if !self.extensions.is_empty() && !self.extensions.contains(&file.extension) {
            return false;
        }

        file.size > self.threshold
    }
}

/// First rule, in list order, that applies to the file
pub fn select<'a>(
    rules: &'a [Rule],
    file: &FileFacts,
    groups: &BTreeSet<GroupId>,
) -> Option<&'a Rule> {
    for rule in rules {
        if rule.matches(file, groups) {
            debug!("Rule '{}' matched: {}", rule.name, file.relative_path);
            return Some(rule);
        }
        trace!("Rule '{}' skipped: {}", rule.name, file.relative_path);
    }
    None
}

/// Engine for evaluating a compiled ruleset against uploaded files
#[derive(Debug, Clone)]
pub struct RuleEngine {
    ruleset: Arc<Ruleset>,
    site_root: PathBuf,
}

impl RuleEngine {
    /// Create a new rule engine; file paths are made relative to `site_root`
    pub fn new(ruleset: Arc<Ruleset>, site_root: impl Into<PathBuf>) -> Self {
        Self {
            ruleset,
            site_root: site_root.into(),
        }
    }

    /// Evaluate rules for a file on disk and return the first matching rule
    pub fn evaluate(&self, path: &Path, groups: &BTreeSet<GroupId>) -> Option<&Rule> {
        let file = self.facts(path)?;
        self.select(&file, groups)
    }

    /// Evaluate rules for already gathered file facts
    pub fn select(&self, file: &FileFacts, groups: &BTreeSet<GroupId>) -> Option<&Rule> {
        select(self.ruleset.rules(), file, groups)
    }

    pub fn facts(&self, path: &Path) -> Option<FileFacts> {
        FileFacts::from_path(path, &self.site_root)
    }

    /// Get all rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        self.ruleset.rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{PathMatcher, RawRuleNode, compile};
    use assert_fs::prelude::*;

    fn rule(name: &str, directories: &[&str]) -> Rule {
        Rule {
            name: name.to_string(),
            groups: BTreeSet::new(),
            directories: directories
                .iter()
                .map(|d| PathMatcher::compile(d).unwrap())
                .collect(),
            extensions: BTreeSet::new(),
            threshold: 0,
            max_width: Some(800),
            max_height: Some(600),
            keep_metadata: false,
            auto_orient: false,
        }
    }

    fn groups(ids: &[&str]) -> BTreeSet<GroupId> {
        ids.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_file_facts_extension() {
        assert_eq!(FileFacts::new("a/photo.JPG", 1).extension, "jpg");
        assert_eq!(FileFacts::new("a/archive.tar.gz", 1).extension, "gz");
        assert_eq!(FileFacts::new("a.d/README", 1).extension, "");
    }

    #[test]
    fn test_inert_default_never_matches() {
        let rules = vec![rule("default", &[]), rule("R1", &["a/"])];
        let file = FileFacts::new("a/x.jpg", 1000);

        let matched = select(&rules, &file, &groups(&[])).unwrap();
        assert_eq!(matched.name, "R1");
        let matched = select(&rules, &file, &groups(&["9"])).unwrap();
        assert_eq!(matched.name, "R1");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![rule("first", &["a/"]), rule("second", &["a/"])];
        let file = FileFacts::new("a/x.jpg", 1000);

        assert_eq!(select(&rules, &file, &groups(&[])).unwrap().name, "first");
    }

    #[test]
    fn test_group_restriction() {
        let mut editors = rule("editors", &["a/"]);
        editors.groups = groups(&["1", "2"]);
        let rules = vec![editors];
        let file = FileFacts::new("a/x.jpg", 1000);

        assert!(select(&rules, &file, &groups(&["2", "3"])).is_some());
        assert!(select(&rules, &file, &groups(&["3"])).is_none());
        assert!(select(&rules, &file, &groups(&[])).is_none());
    }

    #[test]
    fn test_extension_restriction() {
        let mut images = rule("images", &["a/"]);
        images.extensions = ["jpg".to_string(), "png".to_string()].into();
        let rules = vec![images];

        assert!(select(&rules, &FileFacts::new("a/x.PNG", 1000), &groups(&[])).is_some());
        assert!(select(&rules, &FileFacts::new("a/x.gif", 1000), &groups(&[])).is_none());
        assert!(select(&rules, &FileFacts::new("a/x", 1000), &groups(&[])).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut large = rule("large", &["a/"]);
        large.threshold = 1000;
        let rules = vec![large];

        assert!(select(&rules, &FileFacts::new("a/x.jpg", 1000), &groups(&[])).is_none());
        assert!(select(&rules, &FileFacts::new("a/x.jpg", 1001), &groups(&[])).is_some());
    }

    #[test]
    fn test_outside_directory_does_not_match() {
        let rules = vec![rule("uploads", &["uploads/**/images/"])];

        assert!(
            select(
                &rules,
                &FileFacts::new("uploads/2024/03/images/photo.jpg", 10),
                &groups(&[])
            )
            .is_some()
        );
        assert!(
            select(
                &rules,
                &FileFacts::new("other/images/photo.jpg", 10),
                &groups(&[])
            )
            .is_none()
        );
    }

    #[test]
    fn test_evaluate_on_disk() {
        let root = assert_fs::TempDir::new().unwrap();
        let upload = root.child("fileadmin/photo.jpg");
        upload.write_binary(&[0u8; 2048]).unwrap();
        root.child("fileadmin/folder.jpg").create_dir_all().unwrap();

        let default = RawRuleNode {
            directories: Some("fileadmin/".to_string()),
            threshold: Some("1K".to_string()),
            ..Default::default()
        };
        let engine = RuleEngine::new(
            Arc::new(compile(&default, &[]).unwrap()),
            root.path(),
        );

        let matched = engine.evaluate(upload.path(), &groups(&[])).unwrap();
        assert_eq!(matched.name, crate::rules::DEFAULT_RULE_NAME);
        assert!(
            engine
                .evaluate(&root.path().join("fileadmin/folder.jpg"), &groups(&[]))
                .is_none()
        );
        assert!(
            engine
                .evaluate(&root.path().join("fileadmin/missing.jpg"), &groups(&[]))
                .is_none()
        );
    }
}
