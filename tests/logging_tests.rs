use surplus_manager::config::LoggingConfig;
use surplus_manager::logging::{LogContext, get_logger_with_context, init_logging, min_level};
use tracing::Level;

#[test]
fn init_with_file_appender_in_temp_dir() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "DEBUG".to_string(),
        file: tmp_dir
            .path()
            .join("surplus_manager.log")
            .to_string_lossy()
            .to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };

    assert!(init_logging(&config).is_ok());
    // Second call is a no-op
    assert!(init_logging(&config).is_ok());

    let logger = get_logger_with_context(LogContext::new("test").with_manager_id("house"));
    logger.info("logging initialized for test");
}

#[test]
fn most_verbose_level_wins() {
    assert_eq!(min_level(Level::ERROR, Level::TRACE), Level::TRACE);
}
