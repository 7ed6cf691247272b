//! Build notifications.
//!
//! Delivery is pluggable; the bundled `LogNotifier` emits a structured event
//! under the `reload::notify` target for a desktop bridge to pick up.

/// Receives user-facing build notifications.
pub trait Notifier: Send + Sync {
    fn push(&self, title: &str, body: &str);
}

#[derive(Debug, Default, Clone)]
pub struct LogNotifier {
    app_name: String,
}

impl LogNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn push(&self, title: &str, body: &str) {
        tracing::info!(target: "reload::notify", app = %self.app_name, title, body, "notification");
    }
}

/// Body for a "Build Failed" notification: the first diagnostic line after
/// the package header, or the header itself for one-line output.
pub fn failure_summary(diagnostics: &str) -> &str {
    let mut lines = diagnostics.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next().unwrap_or("");
    lines.next().unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_second_line() {
        let out = "# example.com/app\n./main.go:7:2: undefined: foo\n";
        assert_eq!(failure_summary(out), "./main.go:7:2: undefined: foo");
    }

    #[test]
    fn summary_falls_back_to_first_line() {
        assert_eq!(failure_summary("exit status 1"), "exit status 1");
        assert_eq!(failure_summary(""), "");
    }
}
