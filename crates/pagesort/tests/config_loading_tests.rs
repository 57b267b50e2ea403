//! Table-driven tests for configuration loading and validation.

use pagesort::config::load_config_from_str;

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Substring of the error message when loading fails.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "extractor": {
                "binary": "/usr/local/bin/magick",
                "density": 200,
                "resize": "2000x2000",
                "min_batch_size": 2,
                "max_batch_size": 8,
                "batch_size": null,
                "max_retries": 5,
                "timeout_secs": 90
            },
            "classifier": {
                "endpoint": "http://localhost:8080/v1/messages",
                "model": "claude-3-haiku-20240307",
                "api_key_env": "MY_KEY",
                "api_version": "2023-06-01",
                "max_tokens": 1024,
                "temperature": 0.2,
                "timeout_secs": 30
            },
            "storage": { "done_directory": "filed" },
            "logging": { "level": "pagesort=debug,warn", "json": true }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "extractor": {} }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "unknown_field",
        config_json: r#"{ "version": "1.0", "storage": { "done_dir": "x" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "bad_resize_geometry",
        config_json: r#"{ "version": "1.0", "extractor": { "resize": "big" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "inverted_batch_bounds",
        config_json: r#"{ "version": "1.0", "extractor": { "min_batch_size": 10, "max_batch_size": 4 } }"#,
        should_succeed: false,
        expected_error: Some("batch"),
    },
    ConfigTestCase {
        name: "temperature_out_of_range",
        config_json: r#"{ "version": "1.0", "classifier": { "temperature": 3.5 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "not_json",
        config_json: "version = 1.0",
        should_succeed: false,
        expected_error: None,
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_config_field_values() {
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();

    assert_eq!(config.extractor.batch_size, None);
    assert!((2..=8).contains(&config.extractor.effective_batch_size()));
    assert_eq!(config.extractor.max_retries, 5);
    assert_eq!(config.classifier.model, "claude-3-haiku-20240307");
    assert_eq!(config.storage.done_directory, "filed");
    assert!(config.logging.json);
}
