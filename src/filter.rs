//! Threshold filtering applied before dispatch.

use crate::config::SessionConfig;
use crate::level::Level;
use crate::log_record::LogRecord;

/// Session-configured severity floor and verbosity ceiling.
///
/// Normal records pass when their severity is at or above the configured
/// level. Verbose records ignore the severity floor and pass when their
/// verbosity level is within the configured ceiling.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdFilter {
    level: Level,
    max_verbose_level: u8,
}

impl ThresholdFilter {
    /// Build the filter from a session configuration.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            level: config.level,
            max_verbose_level: config.max_verbose_level,
        }
    }

    /// Return `true` if `record` should be forwarded to the collector.
    pub fn should_forward(&self, record: &LogRecord) -> bool {
        if record.level.is_verbose() {
            record.verbose_level <= self.max_verbose_level
        } else {
            record.level >= self.level
        }
    }
}
