use std::fmt;
use std::str::FromStr;

/// Severity attached to a [`LogRecord`](crate::LogRecord).
///
/// `Verbose` sits outside the severity ordering: verbose records are gated
/// by their numeric verbosity level rather than by the severity floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Verbose,
}

impl Default for Level {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Verbose => "VERBOSE",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            "VERBOSE" => Ok(Self::Verbose),
            _ => Err(()),
        }
    }
}

impl Level {
    /// Parse `s`, falling back to `Info` for unrecognised input.
    pub fn parse_or_info(s: &str) -> Self {
        s.parse().unwrap_or(Self::Info)
    }

    /// `true` for records filtered by verbosity instead of severity.
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }
}
