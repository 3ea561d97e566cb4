use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Info,
    Warning,
    Unavailable,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Unavailable => "unavailable",
        }
    }

    /// Short tag used in the text report.
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Good => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Unavailable => "N/A",
        }
    }

    pub const fn is_bad(self) -> bool {
        matches!(self, Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
