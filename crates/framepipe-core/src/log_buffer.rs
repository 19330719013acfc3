//! Per-call diagnostic buffer and the sinks it flushes to.
//!
//! Every [`Stage::process`](crate::Stage::process) call owns one
//! [`ProcessLog`]. Records are buffered while the stage runs and flushed in
//! one go, so a stage's summary is never interleaved with another stage's.

use std::cell::RefCell;

use framepipe_model::LogLevel;

/// Destination for flushed diagnostic records.
pub trait LogSink {
    fn emit(&self, level: LogLevel, message: &str);
}

/// Forwards records to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Fatal => tracing::error!(fatal = true, "{message}"),
            LogLevel::Error => tracing::error!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
        }
    }
}

/// Collects records in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RefCell<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.borrow().clone()
    }

    /// Messages at `level` or more severe.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|(record_level, _)| *record_level <= level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// All records rendered as `[level] message`, one per line.
    pub fn render(&self) -> String {
        self.records
            .borrow()
            .iter()
            .map(|(level, message)| format!("[{level}] {message}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LogSink for MemorySink {
    fn emit(&self, level: LogLevel, message: &str) {
        self.records.borrow_mut().push((level, message.to_string()));
    }
}

/// Buffer of records for one `process` call.
///
/// Anything still buffered when the log is dropped is flushed, so records
/// reach the sink even when a transform fails half way.
pub struct ProcessLog<'a> {
    sink: &'a dyn LogSink,
    records: Vec<(LogLevel, String)>,
}

impl<'a> ProcessLog<'a> {
    pub fn new(sink: &'a dyn LogSink) -> Self {
        Self {
            sink,
            records: Vec::new(),
        }
    }

    /// The sink nested stages flush to.
    pub fn sink(&self) -> &'a dyn LogSink {
        self.sink
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.records.push((level, message.into()));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Emits every buffered record in order and clears the buffer.
    pub fn flush(&mut self) {
        for (level, message) in self.records.drain(..) {
            self.sink.emit(level, &message);
        }
    }
}

impl Drop for ProcessLog<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_preserves_order_and_clears() {
        let sink = MemorySink::new();
        let mut log = ProcessLog::new(&sink);
        log.info("first");
        log.debug("second");
        assert!(sink.records().is_empty());

        log.flush();
        assert!(log.is_empty());
        assert_eq!(
            sink.records(),
            vec![
                (LogLevel::Info, "first".to_string()),
                (LogLevel::Debug, "second".to_string())
            ]
        );
    }

    #[test]
    fn drop_flushes_pending_records() {
        let sink = MemorySink::new();
        {
            let mut log = ProcessLog::new(&sink);
            log.warning("pending");
        }
        assert_eq!(sink.messages_at(LogLevel::Warning), vec!["pending"]);
    }

    #[test]
    fn messages_at_filters_by_severity() {
        let sink = MemorySink::new();
        sink.emit(LogLevel::Debug, "noise");
        sink.emit(LogLevel::Error, "bad");
        assert_eq!(sink.messages_at(LogLevel::Info), vec!["bad"]);
    }
}
