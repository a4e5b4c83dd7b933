//! User-visible notifications
//!
//! Every message is logged. Desktop notifications are opt-in.

use notify_rust::{Notification, Timeout};
use std::fmt;
use std::path::Path;
use tracing::{error, info, warn};

/// Notification severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Ok,
    Warning,
    Error,
}

impl Severity {
    fn icon(&self) -> &'static str {
        match self {
            Severity::Info | Severity::Ok => "dialog-information",
            Severity::Warning => "dialog-warning",
            Severity::Error => "dialog-error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "Info",
            Severity::Ok => "OK",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        })
    }
}

/// Sink for messages aimed at the uploading user
pub trait Notifier {
    fn notify(&self, severity: Severity, message: &str);
}

/// Logs every message and optionally shows it as a desktop notification
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier {
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Notifier for DesktopNotifier {
    /// This is fire-and-forget - errors are logged but don't propagate.
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info | Severity::Ok => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }

        if !self.enabled {
            return;
        }

        let result = Notification::new()
            .appname("Image Autoresize")
            .summary(&format!("Image Autoresize: {}", severity))
            .body(message)
            .icon(severity.icon())
            .timeout(Timeout::Milliseconds(5000))
            .show();

        if let Err(e) = result {
            warn!("Failed to send notification: {}", e);
        }
    }
}

/// Message for a configuration that could not be loaded
pub fn configuration_missing(reason: &str) -> String {
    format!(
        "Image autoresize: configuration is missing or invalid ({}); uploads are left untouched",
        reason
    )
}

/// Message for a successfully resized upload
pub fn image_resized(relative_path: &str, width: u32, height: u32) -> String {
    format!(
        "Image {} has been resized to {}x{} px",
        relative_path, width, height
    )
}

/// Message for a resized image that could not replace its original
pub fn replace_failed(path: &Path, error: &str) -> String {
    format!(
        "Image {} could not be replaced, the original was kept: {}",
        path.display(),
        error
    )
}
