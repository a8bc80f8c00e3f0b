/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Installs as the framework's log handler at probe startup, storing
//! newest-first into a bounded ring (spec.md §4.9).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;

use crate::errors::{ProbeError, ProbeResult};

const CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Critical,
    Fatal,
}

impl LogLevel {
    fn is_error(self) -> bool {
        matches!(self, LogLevel::Critical | LogLevel::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Critical => "critical",
            LogLevel::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A handler the host's own logging facility may already occupy; always
/// chained so host logging is never swallowed (spec.md §4.9).
pub type PriorLogHandler = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

pub struct LogSink {
    entries: Mutex<VecDeque<LogEntry>>,
    prior: Mutex<Option<PriorLogHandler>>,
}

impl LogSink {
    pub fn new() -> Self {
        LogSink {
            entries: Mutex::new(VecDeque::with_capacity(CAPACITY)),
            prior: Mutex::new(None),
        }
    }

    /// Installs `prior` as the handler to chain to; returns whatever was
    /// installed before (if any), mirroring the registry's hook-chaining.
    pub fn install(&self, prior: Option<PriorLogHandler>) -> Option<PriorLogHandler> {
        self.prior.lock().replace(prior.unwrap_or_else(|| Box::new(|_, _| {})))
    }

    /// Record one message, evicting the oldest entry once at capacity, then
    /// chain to the prior handler.
    pub fn record(&self, level: LogLevel, message: &str, timestamp: DateTime<Utc>) {
        {
            let mut entries = self.entries.lock();
            if entries.len() >= CAPACITY {
                entries.pop_back();
            }
            entries.push_front(LogEntry {
                level,
                message: message.to_string(),
                timestamp,
            });
        }
        if let Some(prior) = self.prior.lock().as_ref() {
            prior(level, message);
        }
    }

    pub fn query(&self, pattern: Option<&str>, errors_only: bool, clear: bool) -> ProbeResult<Vec<LogEntry>> {
        let regex = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| ProbeError::InvalidParams(format!("invalid pattern: {e}")))?;
        let entries = self.entries.lock();
        let filtered: Vec<LogEntry> = entries
            .iter()
            .filter(|e| !errors_only || e.level.is_error())
            .filter(|e| regex.as_ref().map(|r| r.is_match(&e.message)).unwrap_or(true))
            .cloned()
            .collect();
        drop(entries);
        if clear {
            self.entries.lock().clear();
        }
        Ok(filtered)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let sink = LogSink::new();
        for i in 0..(CAPACITY + 10) {
            sink.record(LogLevel::Info, &format!("msg {i}"), now());
        }
        assert_eq!(sink.len(), CAPACITY);
        let all = sink.query(None, false, false).unwrap();
        assert_eq!(all[0].message, format!("msg {}", CAPACITY + 9));
    }

    #[test]
    fn errors_only_filters_non_error_levels() {
        let sink = LogSink::new();
        sink.record(LogLevel::Info, "hello", now());
        sink.record(LogLevel::Critical, "boom", now());
        let errors = sink.query(None, true, false).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "boom");
    }

    #[test]
    fn pattern_filters_by_regex() {
        let sink = LogSink::new();
        sink.record(LogLevel::Info, "connected to host", now());
        sink.record(LogLevel::Info, "disconnected", now());
        let matched = sink.query(Some("^connected"), false, false).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn chained_handler_always_fires() {
        let sink = LogSink::new();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen2 = seen.clone();
        sink.install(Some(Box::new(move |_, _| {
            seen2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })));
        sink.record(LogLevel::Info, "hi", now());
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_empties_the_ring_after_query() {
        let sink = LogSink::new();
        sink.record(LogLevel::Info, "hi", now());
        let _ = sink.query(None, false, true).unwrap();
        assert!(sink.is_empty());
    }
}
