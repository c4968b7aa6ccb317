use strum::IntoEnumIterator;

use super::*;

#[test]
fn test_success_is_zero() {
    assert_eq!(StatusCode::Success as i32, 0);
    assert!(StatusCode::is_success(0));
    assert!(!StatusCode::is_success(4000));
}

#[test]
fn test_retryable_codes() {
    // Only transport-level failures are worth another worker.
    assert!(StatusCode::ConnectionLost.is_retryable());
    assert!(StatusCode::Timeout.is_retryable());

    // A compile that failed on one worker fails on all of them.
    assert!(!StatusCode::RemoteCompileFailed.is_retryable());
    assert!(!StatusCode::NoWorkers.is_retryable());
    assert!(!StatusCode::QueueTimeout.is_retryable());
    assert!(!StatusCode::ParserRejected.is_retryable());
}

#[test]
fn test_categories() {
    assert_eq!(
        StatusCode::ConnectionLost.category(),
        StatusCategory::Network
    );
    assert_eq!(StatusCode::NoWorkers.category(), StatusCategory::Scheduling);
    assert_eq!(StatusCode::InvalidConfig.category(), StatusCategory::Config);
    assert_eq!(
        StatusCode::LocalSpawnFailed.category(),
        StatusCategory::IO
    );
}

#[test]
fn test_from_i32_round_trip() {
    for code in StatusCode::iter() {
        assert_eq!(StatusCode::from_i32(code as i32), Some(code));
    }
    assert_eq!(StatusCode::from_i32(99_999), None);
}

#[test]
fn test_name() {
    assert_eq!(StatusCode::QueueTimeout.name(), "QueueTimeout");
    assert_eq!(StatusCode::QueueTimeout.to_string(), "QueueTimeout");
}
