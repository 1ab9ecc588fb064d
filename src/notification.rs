use std::fmt::Debug;

/// Where user-visible failure notifications go.
pub trait NotificationSink: Debug + Send + Sync {
    /// Show an error `message` attributed to `source` (e.g. `"ASCOM driver"`).
    fn show_error(&self, message: &str, source: &str);
}

/// Notification sink that only writes a warning to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifications;

impl NotificationSink for LogNotifications {
    fn show_error(&self, message: &str, source: &str) {
        tracing::warn!(source, "{message}");
    }
}
