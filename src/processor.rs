//! Upload processing - match, plan, convert, replace, notify

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::imaging::{self, ImageConverter, OrientationReader};
use crate::notifications::{self, Notifier, Severity};
use crate::rules::{FileFacts, GroupId, ResizePlan, Rule, RuleEngine};

/// What happened to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No rule applies (or the path is not a regular file)
    NoMatch,
    /// A rule applies but sets no maximum dimension
    Unconstrained { rule: String },
    /// The converter had nothing to do or could not read the file
    Unchanged { rule: String },
    /// The file was replaced by a resized version
    Resized {
        rule: String,
        relative_path: String,
        width: u32,
        height: u32,
    },
}

/// The matched rule and the plan derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planned<'a> {
    pub rule: &'a Rule,
    pub file: FileFacts,
    pub plan: ResizePlan,
}

/// Applies the compiled rules to uploaded files
pub struct Processor<'a> {
    engine: RuleEngine,
    converter: &'a dyn ImageConverter,
    orientation: &'a dyn OrientationReader,
    notifier: &'a dyn Notifier,
}

impl<'a> Processor<'a> {
    pub fn new(
        engine: RuleEngine,
        converter: &'a dyn ImageConverter,
        orientation: &'a dyn OrientationReader,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            engine,
            converter,
            orientation,
            notifier,
        }
    }

    /// Find the rule for a file and work out its target dimensions
    pub fn plan(&self, path: &Path, groups: &BTreeSet<GroupId>) -> Option<Planned<'_>> {
        let file = self.engine.facts(path)?;
        let rule = self.engine.select(&file, groups)?;

        // Orientation only matters when the converter is asked to rotate
        let is_rotated = rule.auto_orient && self.orientation.is_rotated(path);
        let plan = ResizePlan::resolve(rule, is_rotated);
        debug!(
            "Plan for {}: max {:?}x{:?} (rotated: {})",
            file.relative_path, plan.max_width, plan.max_height, is_rotated
        );

        Some(Planned { rule, file, plan })
    }

    /// Process one uploaded file
    pub fn process(&self, path: &Path, groups: &BTreeSet<GroupId>) -> Result<Outcome> {
        let Some(Planned { rule, file, plan }) = self.plan(path, groups) else {
            return Ok(Outcome::NoMatch);
        };
        let rule = rule.name.clone();

        if !plan.is_constrained() {
            debug!("Rule '{}' sets no maximum dimension, skipping", rule);
            return Ok(Outcome::Unconstrained { rule });
        }

        let converted = match self.converter.convert(path, &plan) {
            Ok(Some(converted)) => converted,
            Ok(None) => return Ok(Outcome::Unchanged { rule }),
            Err(e) => {
                warn!("Could not convert {}: {}", file.relative_path, e);
                return Ok(Outcome::Unchanged { rule });
            }
        };
        let (width, height) = (converted.width, converted.height);

        if let Err(e) = imaging::replace_original(converted, path) {
            warn!("{}", e);
            self.notifier.notify(
                Severity::Warning,
                &notifications::replace_failed(path, &e.to_string()),
            );
            return Err(e).context("Failed to replace original file");
        }

        info!("Resized {} to {}x{}", file.relative_path, width, height);
        self.notifier.notify(
            Severity::Info,
            &notifications::image_resized(&file.relative_path, width, height),
        );

        Ok(Outcome::Resized {
            rule,
            relative_path: file.relative_path,
            width,
            height,
        })
    }
}
