//! Engine diagnostics.
//!
//! Every warning, error and `INFO` message produced during a run is kept as a
//! [`Diagnostic`] and mirrored to the `tracing` channel at the same level.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
        }
    }

    /// Forward to the matching `tracing` macro.
    pub fn emit(&self) {
        match self.severity {
            Severity::Info => tracing::info!("{}", self.message),
            Severity::Warning => tracing::warn!("{}", self.message),
            Severity::Error => tracing::error!("{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let d = Diagnostic::new(Severity::Warning, "undefined variable 'x'");
        assert_eq!(d.to_string(), "warning: undefined variable 'x'");
    }

    #[test]
    fn severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
