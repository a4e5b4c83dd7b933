//! Target dimensions for a matched rule

use super::Rule;

/// Parameters handed to the image converter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub strip_metadata: bool,
    pub auto_orient: bool,
}

impl ResizePlan {
    /// Derive the plan for a rule.
    ///
    /// Configured limits describe the upright image. When the converter is
    /// going to rotate a 90°-class image upright, the limits of the stored
    /// image are transposed.
    pub fn resolve(rule: &Rule, is_rotated: bool) -> Self {
        let (max_width, max_height) = if rule.auto_orient && is_rotated {
            (rule.max_height, rule.max_width)
        } else {
            (rule.max_width, rule.max_height)
        };

        Self {
            max_width,
            max_height,
            strip_metadata: !rule.keep_metadata,
            auto_orient: rule.auto_orient,
        }
    }

    /// Whether there is anything to clamp at all
    pub fn is_constrained(&self) -> bool {
        self.max_width.is_some() || self.max_height.is_some()
    }
}

/// EXIF orientation codes 5 to 8 describe a 90° or 270° rotation, with or
/// without a flip. Mirror-only and 180° codes do not swap the axes.
pub fn is_rotated_exif(orientation: Option<u16>) -> bool {
    matches!(orientation, Some(5..=8))
}
