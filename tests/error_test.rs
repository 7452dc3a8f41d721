//! Tests for error types

use predicate_db::Error;
use std::path::PathBuf;

#[test]
fn test_config_error() {
    let error = Error::Config("unknown backend 'cvc'".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Configuration error"));
    assert!(error_str.contains("cvc"));
}

#[test]
fn test_machine_access_error() {
    let error = Error::MachineAccess {
        machine: "Lift.mch".to_string(),
        reason: "not found".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Cannot access machine Lift.mch"));
    assert!(error_str.contains("not found"));
}

#[test]
fn test_format_corruption_error() {
    let error = Error::FormatCorruption {
        file: PathBuf::from("db/Lift.pdb"),
        line: 7,
        reason: "missing ':'".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("db/Lift.pdb"));
    assert!(error_str.contains("line 7"));
    assert!(error.is_record_level());
}

#[test]
fn test_file_io_error_keeps_source() {
    let error = Error::file_io(
        "db/Lift.jsonl",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    let error_str = format!("{error}");
    assert!(error_str.contains("I/O error on db/Lift.jsonl"));
    assert!(std::error::Error::source(&error).is_some());
    assert!(!error.is_record_level());
}

#[test]
fn test_fatal_io_error() {
    let error = Error::fatal_io("/db", "source does not exist");
    let error_str = format!("{error}");
    assert!(error_str.contains("Fatal I/O error on /db"));
    assert!(error_str.contains("source does not exist"));
}

#[test]
fn test_backend_not_evaluated_error() {
    let error = Error::BackendNotEvaluated("Z3[]".to_string());
    assert!(format!("{error}").contains("Z3[] was not evaluated"));
}

#[test]
fn test_unsupported_operation_error() {
    let error = Error::UnsupportedOperation("writing legacy".to_string());
    assert!(format!("{error}").contains("Unsupported operation: writing legacy"));
}

#[test]
fn test_engine_error() {
    let error = Error::Engine("probcli exited with 1".to_string());
    assert!(format!("{error}").contains("Engine error"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Config("test".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Config"));
}
