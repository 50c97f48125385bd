//! Log sinks for the provisioning run
//!
//! The runner writes through a [`LogSink`] handed to it at construction,
//! so tests can capture the run log without touching the filesystem.

use std::sync::{Arc, Mutex};
use tracing::Level;

/// Destination for provisioning log entries
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, message: &str);
}

/// Forwards entries to the global `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            Level::TRACE => tracing::trace!("{}", message),
        }
    }
}

/// Keeps entries in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Messages only, in write order
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, msg)| msg).collect()
    }

    /// Index of the first message containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.messages().iter().position(|m| m.contains(needle))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.write(Level::INFO, "first");
        sink.write(Level::ERROR, "second");

        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(sink.entries()[1].0, Level::ERROR);
        assert_eq!(sink.position("second"), Some(1));
        assert!(!sink.contains("third"));
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        handle.write(Level::WARN, "shared");

        assert!(sink.contains("shared"));
    }

    #[test]
    fn test_tracing_sink_without_subscriber() {
        // No subscriber installed: must not panic
        TracingSink.write(Level::INFO, "dropped");
    }
}
