use serde_json::Value;
use watermark_triggers::{JsonLineLogger, LogLevel, LogRotationPolicy, Timestamp, Window};

fn window() -> Window {
    Window::from_millis(0, 100)
}

#[test]
fn json_logger_serializes_entries() {
    let policy = LogRotationPolicy {
        max_bytes: 256,
        max_files: 2,
    };
    let mut logger = JsonLineLogger::new(policy);
    logger
        .log(
            Some(Timestamp::from_millis(42)),
            LogLevel::Info,
            "watermark_triggers::test",
            &window(),
            "first entry",
        )
        .unwrap();
    let lines: Vec<_> = logger.files().flat_map(|file| file.lines()).collect();
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(parsed["level"], "INFO");
    assert_eq!(parsed["module"], "watermark_triggers::test");
    assert_eq!(parsed["window"], "[0, 100)");
    assert_eq!(parsed["event_time_ms"], 42);
}

#[test]
fn missing_event_time_serializes_as_null() {
    let mut logger = JsonLineLogger::default();
    logger
        .log(None, LogLevel::Warn, "module", &window(), "before progress")
        .unwrap();
    let line = logger.files().flat_map(|file| file.lines()).next().unwrap();
    let parsed: Value = serde_json::from_str(line).unwrap();
    assert!(parsed["event_time_ms"].is_null());
}

#[test]
fn loglevel_override_filters_entries() {
    let policy = LogRotationPolicy {
        max_bytes: 512,
        max_files: 1,
    };
    let mut logger = JsonLineLogger::new(policy);
    logger.set_level(LogLevel::Warn);
    logger
        .log(None, LogLevel::Info, "triggers", &window(), "info suppressed")
        .unwrap();
    logger
        .log(None, LogLevel::Warn, "triggers", &window(), "warn visible")
        .unwrap();
    let lines: Vec<_> = logger.files().flat_map(|file| file.lines()).collect();
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(parsed["level"], "WARN");
    assert_eq!(parsed["message"], "warn visible");

    logger.set_level(LogLevel::Debug);
    logger
        .log(None, LogLevel::Debug, "triggers", &window(), "debug visible")
        .unwrap();
    assert_eq!(logger.level(), LogLevel::Debug);
    assert_eq!(logger.files().flat_map(|file| file.lines()).count(), 2);
}

#[test]
fn rotation_discards_old_segments() {
    let policy = LogRotationPolicy {
        max_bytes: 64,
        max_files: 2,
    };
    let mut logger = JsonLineLogger::new(policy);
    for idx in 0..10 {
        logger
            .log(
                Some(Timestamp::from_millis(idx)),
                LogLevel::Info,
                "module",
                &window(),
                "payload",
            )
            .unwrap();
    }
    let segments: Vec<_> = logger.files().collect();
    assert!(segments.len() <= 3, "active + rotated segments retained");
    assert!(segments.iter().any(|file| !file.lines().is_empty()));
    assert!(logger.files().flat_map(|file| file.lines()).count() < 10);
}

#[test]
fn oversized_entries_get_their_own_segment() {
    let policy = LogRotationPolicy {
        max_bytes: 10,
        max_files: 4,
    };
    let mut logger = JsonLineLogger::new(policy);
    for message in ["first", "second"] {
        logger
            .log(None, LogLevel::Error, "module", &window(), message)
            .unwrap();
    }
    let segments: Vec<_> = logger.files().collect();
    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|file| file.lines().len() == 1));
    assert!(segments[0].bytes_written() > 10);
}
