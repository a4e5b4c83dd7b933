//! Image Autoresize - shrinks oversized uploaded images
//!
//! Rule sets decide, per uploaded file, whether it is resized and to which
//! maximum dimensions, based on its location, extension, size and the
//! uploading user's groups.

pub mod config;
pub mod imaging;
pub mod notifications;
pub mod processor;
pub mod rules;

pub use config::Config;
pub use imaging::{ImageConverter, ImageCrateBackend, OrientationReader};
pub use notifications::{DesktopNotifier, Notifier, Severity};
pub use processor::{Outcome, Processor};
pub use rules::{PathMatcher, RawRuleNode, ResizePlan, Rule, RuleEngine, Ruleset};

/// Current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
