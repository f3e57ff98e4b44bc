//! Integration tests for severity filtering.

mod helpers;

use helpers::buffered_logger;
use herald::testing::SharedBuffer;
use herald::Severity;

/// Emits one line per severity and returns the labels that made it out.
fn emitted_labels(threshold: Severity) -> Vec<String> {
    let buffer = SharedBuffer::new();
    let logger = buffered_logger(&buffer, "svc");
    logger.set_level(threshold);

    logger.debug(format_args!("d"));
    logger.warn(format_args!("w"));
    logger.info(format_args!("i"));
    logger.error(format_args!("e"));
    logger.fatal(format_args!("f"));

    buffer
        .lines()
        .into_iter()
        .map(|line| {
            line.trim_start_matches("[svc][")
                .split(']')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_threshold_info_suppresses_debug_and_warn() {
    assert_eq!(emitted_labels(Severity::Info), vec!["INFO", "ERROR", "FATAL"]);
}

#[tokio::test]
async fn test_threshold_ordering_for_every_severity() {
    let labels = ["DEBUG", "WARN", "INFO", "ERROR", "FATAL"];
    for (i, threshold) in Severity::ALL.into_iter().enumerate() {
        let expected: Vec<String> = labels[i..].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            emitted_labels(threshold),
            expected,
            "threshold {threshold} filtered incorrectly"
        );
    }
}

#[tokio::test]
async fn test_ln_variants_follow_the_threshold() {
    let buffer = SharedBuffer::new();
    let logger = buffered_logger(&buffer, "svc");
    logger.set_level(Severity::Error);

    logger.warn_ln(&[&"hidden"]);
    logger.error_ln(&[&"shown", &1]);

    assert_eq!(buffer.lines(), vec!["[svc][ERROR] shown 1"]);
}

#[tokio::test]
async fn test_out_of_range_codes_clamp_to_debug() {
    for code in [0, -1, 6, 100] {
        let buffer = SharedBuffer::new();
        let logger = buffered_logger(&buffer, "svc");
        logger.set_level(Severity::Fatal);

        logger.set_level_code(code);
        assert_eq!(logger.level(), Severity::Debug, "code {code}");

        logger.debug(format_args!("visible"));
        assert_eq!(buffer.lines(), vec!["[svc][DEBUG] visible"]);
    }
}

#[tokio::test]
async fn test_threshold_change_is_visible_across_threads() {
    let buffer = SharedBuffer::new();
    let logger = buffered_logger(&buffer, "svc");

    let writer = logger.clone();
    std::thread::spawn(move || writer.set_level(Severity::Error))
        .join()
        .unwrap();

    assert_eq!(logger.level(), Severity::Error);
    logger.info(format_args!("dropped"));
    assert!(buffer.contents().is_empty());
}
