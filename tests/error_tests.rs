// Error handling tests
// Author: kelexine (https://github.com/kelexine)

use gemflow::batch::BatchStatus;
use gemflow::error::{extract_error_message, ErrorKind, GemflowError};
use gemflow::utils::retry::status_code_predicate;
use std::time::Duration;

#[test]
fn test_error_display_messages() {
    let errors = vec![
        GemflowError::Transport("connection reset".to_string()),
        GemflowError::Decoding("unexpected token".to_string()),
        GemflowError::EmptyBatch,
        GemflowError::BatchTooLarge { count: 150, max: 100 },
        GemflowError::JobFailed(BatchStatus::Cancelled),
        GemflowError::BatchTimeout(Duration::from_secs(3600)),
        GemflowError::StatusCheckFailed("batches/x: HTTP 404".to_string()),
        GemflowError::SafetyFilterBlocked("prompt blocked: SAFETY".to_string()),
    ];

    for error in errors {
        let display = format!("{}", error);
        assert!(!display.is_empty(), "Error should have display message");
    }
}

#[test]
fn test_batch_too_large_message() {
    let error = GemflowError::BatchTooLarge { count: 150, max: 100 };
    let message = error.to_string();
    assert!(message.contains("150"));
    assert!(message.contains("100"));
}

#[test]
fn test_job_failed_carries_status() {
    let error = GemflowError::JobFailed(BatchStatus::Failed);
    assert!(error.to_string().contains("failed"));
    assert_eq!(error.kind(), ErrorKind::JobFailed);
}

#[test]
fn test_status_mapping() {
    assert!(matches!(
        GemflowError::from_status(429, "slow down".into()),
        GemflowError::QuotaExceeded(_)
    ));
    assert!(matches!(
        GemflowError::from_status(401, "bad key".into()),
        GemflowError::HttpStatus { code: 401, .. }
    ));
}

#[test]
fn test_kind_tags_are_stable() {
    assert_eq!(GemflowError::EmptyBatch.kind().as_str(), "empty_batch");
    assert_eq!(
        GemflowError::from_status(429, String::new()).kind().as_str(),
        "quota_exceeded"
    );
    assert_eq!(
        GemflowError::Transport("x".into()).kind(),
        ErrorKind::Transport
    );
}

#[test]
fn test_configured_retryable_codes() {
    let only_503 = status_code_predicate(vec![503]);

    assert!(only_503(&GemflowError::HttpStatus { code: 503, body: String::new() }));
    assert!(!only_503(&GemflowError::HttpStatus { code: 500, body: String::new() }));
    assert!(!only_503(&GemflowError::from_status(429, String::new())));
    assert!(only_503(&GemflowError::Transport("reset".into())));
    assert!(!only_503(&GemflowError::Decoding("garbage".into())));
    assert!(!only_503(&GemflowError::SafetyFilterBlocked("blocked".into())));
}

#[test]
fn test_batch_errors_are_not_transient() {
    assert!(!GemflowError::EmptyBatch.is_transient());
    assert!(!GemflowError::BatchTimeout(Duration::from_secs(1)).is_transient());
    assert!(!GemflowError::JobFailed(BatchStatus::Failed).is_transient());
}

#[test]
fn test_extract_google_error_message() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_error_message(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_error_message("plain text"), None);
}
