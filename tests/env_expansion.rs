//! Integration tests for the full Config::from_file_with_env pipeline.
//!
//! TOML file -> raw parse -> env var expansion -> validated Config with
//! KeySource metadata.
//!
//! Each test uses its own backend names and env var names to avoid parallel
//! test interference.

use std::fs;

use vramroute::config::{Config, ConfigError, KeySource};

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("Failed to write temp config");
    path
}

fn key_source<'a>(sources: &'a [(String, KeySource)], backend: &str) -> &'a KeySource {
    sources
        .iter()
        .find(|(name, _)| name == backend)
        .map(|(_, source)| source)
        .expect("key source should exist for every backend")
}

#[test]
fn test_env_expansion_resolves_url_and_key() {
    let host_var = "VRAMROUTE_TEST_E2E_01_HOST";
    let key_var = "VRAMROUTE_TEST_E2E_01_KEY";
    unsafe { std::env::set_var(host_var, "gpu-box.local") };
    unsafe { std::env::set_var(key_var, "resolved-secret") };

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[constrained]
name = "e2e-01-cpu"
url = "http://cpu.local:11434"
model = "phi3:3.8b"
admission_threshold = 4000

[high_capacity]
name = "e2e-01-gpu"
url = "http://${{{}}}:11435"
api_key = "${{{}}}"
model = "gemma:2b"
"#,
            host_var, key_var
        ),
    );

    let (config, key_sources) = Config::from_file_with_env(&path).unwrap();

    assert_eq!(config.high_capacity.url, "http://gpu-box.local:11435");
    assert_eq!(
        config.high_capacity.api_key.as_ref().unwrap().expose_secret(),
        "resolved-secret"
    );
    assert_eq!(*key_source(&key_sources, "e2e-01-gpu"), KeySource::EnvExpanded);
    assert_eq!(*key_source(&key_sources, "e2e-01-cpu"), KeySource::None);

    unsafe { std::env::remove_var(host_var) };
    unsafe { std::env::remove_var(key_var) };
}

#[test]
fn test_env_expansion_missing_var_names_var_and_backend() {
    let var_name = "VRAMROUTE_TEST_E2E_02_MISSING";
    unsafe { std::env::remove_var(var_name) };

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[constrained]
name = "e2e-02-cpu"
url = "http://cpu.local:11434"
model = "phi3:3.8b"
admission_threshold = 4000
api_key = "${{{}}}"

[high_capacity]
name = "e2e-02-gpu"
url = "http://gpu.local:11435"
model = "gemma:2b"
"#,
            var_name
        ),
    );

    let err = Config::from_file_with_env(&path).unwrap_err();
    assert!(matches!(err, ConfigError::EnvVar { .. }));

    let message = err.to_string();
    assert!(message.contains(var_name), "Error should name the variable: {}", message);
    assert!(message.contains("e2e-02-cpu"), "Error should name the backend: {}", message);
}

#[test]
fn test_convention_key_discovered_when_api_key_absent() {
    // Backend "e2e-03-gpu" -> VRAMROUTE_E2E_03_GPU_API_KEY
    let var_name = "VRAMROUTE_E2E_03_GPU_API_KEY";
    unsafe { std::env::set_var(var_name, "convention-secret") };

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[constrained]
name = "e2e-03-cpu"
url = "http://cpu.local:11434"
model = "phi3:3.8b"
admission_threshold = 4000

[high_capacity]
name = "e2e-03-gpu"
url = "http://gpu.local:11435"
model = "gemma:2b"
"#,
    );

    let (config, key_sources) = Config::from_file_with_env(&path).unwrap();

    assert_eq!(
        config.high_capacity.api_key.as_ref().unwrap().expose_secret(),
        "convention-secret"
    );
    assert_eq!(
        *key_source(&key_sources, "e2e-03-gpu"),
        KeySource::Convention(var_name.to_string())
    );

    unsafe { std::env::remove_var(var_name) };
}

#[test]
fn test_literal_key_is_not_overridden_by_convention() {
    let var_name = "VRAMROUTE_E2E_04_GPU_API_KEY";
    unsafe { std::env::set_var(var_name, "from-env") };

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[constrained]
name = "e2e-04-cpu"
url = "http://cpu.local:11434"
model = "phi3:3.8b"
admission_threshold = 4000

[high_capacity]
name = "e2e-04-gpu"
url = "http://gpu.local:11435"
api_key = "from-file"
model = "gemma:2b"
"#,
    );

    let (config, key_sources) = Config::from_file_with_env(&path).unwrap();

    assert_eq!(
        config.high_capacity.api_key.as_ref().unwrap().expose_secret(),
        "from-file"
    );
    assert_eq!(*key_source(&key_sources, "e2e-04-gpu"), KeySource::Literal);

    unsafe { std::env::remove_var(var_name) };
}

#[test]
fn test_validation_runs_after_expansion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[constrained]
name = "e2e-05-cpu"
url = "http://cpu.local:11434"
model = "phi3:3.8b"

[high_capacity]
name = "e2e-05-gpu"
url = "http://gpu.local:11435"
model = "gemma:2b"
"#,
    );

    let err = Config::from_file_with_env(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "{:?}", err);
    assert!(err.to_string().contains("admission_threshold"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file_with_env(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
