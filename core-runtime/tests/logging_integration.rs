//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
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

// Only one global subscriber per process, so initialization is exercised in
// a single test.
#[test]
fn test_init_forwards_to_sink_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("info")
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(queue_length = 3, "Engine playlist replaced");
    tracing::debug!("Filtered out");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "Engine playlist replaced");
        assert_eq!(
            entries[0].fields.get("queue_length").map(String::as_str),
            Some("3")
        );
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_playback=[");
    // Either the filter fails to parse or the subscriber is already set;
    // both surface as configuration errors.
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/storage/emulated/0/Music/song.mp3"), "song.mp3");
    assert_eq!(strip_path("content://media/external/audio/media/42"), "42");
    assert_eq!(strip_path("C:\\Users\\Music\\song.flac"), "song.flac");
    assert_eq!(strip_path("song.ogg"), "song.ogg");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
    assert!(config.logger_sink.is_none());
}
