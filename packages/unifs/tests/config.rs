//! Descriptors loaded from JSON configuration.

use unifs::{Context, FileSystemBackend};

#[test]
fn test_camel_case_keys() {
    let backend: FileSystemBackend = serde_json::from_str(
        r#"{
            "backend": "s3://AKID:SECRET@s3.example.com/bucket/base?region=eu-west-1",
            "usernameOverwrite": "other",
            "passwordOverwrite": "p@ss",
            "pathOverwrite": "/elsewhere",
            "extraOverwrite": "region=us-west-2"
        }"#,
    )
    .unwrap();

    assert_eq!(backend.backend.scheme, "s3");
    assert_eq!(backend.backend.hostname, "s3.example.com");
    assert_eq!(backend.backend.extra("region"), Some("eu-west-1"));
    assert_eq!(backend.username_overwrite, "other");
    assert_eq!(backend.path_overwrite, "/elsewhere");

    let resolved = backend.resolved_endpoint().unwrap();
    assert_eq!(resolved.username, "other");
    assert_eq!(resolved.password, "p@ss");
    assert_eq!(resolved.path, "/elsewhere");
    assert_eq!(resolved.extra("region"), Some("us-west-2"));
    assert_eq!(resolved.extras.len(), 1);

    let shown = format!("{:?}", backend);
    assert!(!shown.contains("p@ss"));
    assert!(!shown.contains("SECRET"));
}

#[test]
fn test_all_keys_optional() {
    let backend: FileSystemBackend = serde_json::from_str("{}").unwrap();
    assert!(backend.disabled());

    let backend: FileSystemBackend = serde_json::from_str(r#"{"backend": ""}"#).unwrap();
    assert!(backend.disabled());
}

#[test]
fn test_invalid_endpoint_is_a_deserialisation_error() {
    let result: Result<FileSystemBackend, _> =
        serde_json::from_str(r#"{"backend": "no scheme here"}"#);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_loaded_local_backend_initialises() {
    let dir = tempfile::tempdir().unwrap();
    let config = serde_json::json!({ "backend": format!("file://{}", dir.path().display()) });
    let mut backend: FileSystemBackend = serde_json::from_value(config).unwrap();

    backend.init(&Context::background()).await.unwrap();
    let fs = backend.file_system().unwrap();
    assert_eq!(fs.name(), "local");
    assert!(fs.list(&Context::background(), "").await.unwrap().is_empty());
}
