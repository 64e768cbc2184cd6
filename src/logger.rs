//! Per-logger convenience handle.
//!
//! A [`Logger`] binds a logger id to a [`Client`](crate::Client) and
//! offers one method per severity, capturing the caller's source
//! location automatically.

use std::panic::Location;

use crate::client::Client;
use crate::level::Level;
use crate::log_record::LogRecord;

/// Writes records for a fixed logger id through a borrowed client.
pub struct Logger<'a> {
    client: &'a Client,
    id: String,
}

impl<'a> Logger<'a> {
    pub(crate) fn new(client: &'a Client, id: &str) -> Self {
        Self {
            client,
            id: id.to_owned(),
        }
    }

    /// Dispatch `message` at trace severity.
    #[track_caller]
    pub fn trace(&self, message: &str) {
        self.dispatch(Level::Trace, 0, message, Location::caller());
    }

    /// Dispatch `message` at debug severity.
    #[track_caller]
    pub fn debug(&self, message: &str) {
        self.dispatch(Level::Debug, 0, message, Location::caller());
    }

    /// Dispatch `message` at info severity.
    #[track_caller]
    pub fn info(&self, message: &str) {
        self.dispatch(Level::Info, 0, message, Location::caller());
    }

    /// Dispatch `message` at warning severity.
    #[track_caller]
    pub fn warning(&self, message: &str) {
        self.dispatch(Level::Warning, 0, message, Location::caller());
    }

    /// Dispatch `message` at error severity.
    #[track_caller]
    pub fn error(&self, message: &str) {
        self.dispatch(Level::Error, 0, message, Location::caller());
    }

    /// Dispatch `message` at fatal severity.
    #[track_caller]
    pub fn fatal(&self, message: &str) {
        self.dispatch(Level::Fatal, 0, message, Location::caller());
    }

    /// Dispatch a verbose `message` at the given verbosity level.
    #[track_caller]
    pub fn verbose(&self, verbose_level: u8, message: &str) {
        self.dispatch(Level::Verbose, verbose_level, message, Location::caller());
    }

    fn dispatch(&self, level: Level, verbose_level: u8, message: &str, location: &Location<'_>) {
        let record = LogRecord::new(&self.id, level, message)
            .with_verbose_level(verbose_level)
            .with_location(location.file(), location.line(), "");
        self.client.write(record);
    }
}
