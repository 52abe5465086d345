//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_field, strip_path, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[test]
fn test_global_init_forwards_filtered_events_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).unwrap();

    tracing::debug!(target: "core_sync::engine", "below the configured level");
    tracing::info!(target: "sqlx::query", "dependency noise");
    tracing::info!(
        target: "core_sync::engine",
        path = "/Users/jo/Books/novel.epub",
        "content record added"
    );

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "content record added");
        assert_eq!(entries[0].fields.get("path"), Some(&"novel.epub".to_string()));
    }

    // A second global subscriber is rejected.
    assert!(init_logging(config).is_err());
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/Books/novel.epub"), "novel.epub");
    assert_eq!(strip_path("C:\\Users\\Jo\\Books\\novel.epub"), "novel.epub");
    assert_eq!(strip_path("novel.epub"), "novel.epub");
    assert_eq!(strip_path("/var/log/"), "");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_field_redaction() {
    assert_eq!(redact_field("password", "hunter2"), "[REDACTED]");
    assert!(redact_field("email", "reader@example.com").starts_with("r***@"));
    assert_eq!(redact_field("title", "War and Peace"), "War and Peace");
    assert_eq!(
        redact_field("download_url", "https://example.com/b.epub?token=1"),
        "https://example.com/b.epub"
    );
}
