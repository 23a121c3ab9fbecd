use serial_test::serial;
use sfn_local::core::config::{ConfigLoader, RuntimeConfig};
use sfn_local::core::state_machine::Runtime;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "SFN_LOCAL_LAMBDA_ENDPOINT",
    "SFN_LOCAL_LAMBDA_REGION",
    "SFN_LOCAL_ECS_ENDPOINT",
    "SFN_LOCAL_ECS_REGION",
    "SFN_LOCAL_ECS_POLL_INTERVAL",
    "SFN_LOCAL_ACTIVITY_POLL_INTERVAL",
    "SFN_LOCAL_MAX_TRANSITIONS",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn write_config(workspace: &Path, content: &str) {
    let dir = workspace.join(".sfn-local");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
#[serial]
fn test_workspace_config_is_loaded() {
    clear_env();
    let temp = TempDir::new().unwrap();
    write_config(
        temp.path(),
        r#"
[function]
endpoint = "http://localhost:3001"

[container]
region = "eu-central-1"
poll_interval = "500ms"

[execution]
max_transitions = 200
"#,
    );

    let config = ConfigLoader::load_from_workspace(temp.path()).unwrap();

    assert_eq!(config.function.resolved_endpoint(), "http://localhost:3001");
    assert_eq!(
        config.container.resolved_endpoint(),
        "https://ecs.eu-central-1.amazonaws.com"
    );
    assert_eq!(
        config.container.poll_interval().unwrap(),
        Duration::from_millis(500)
    );
    assert_eq!(config.activity.poll_interval().unwrap(), Duration::from_secs(1));
    assert_eq!(config.execution.max_transitions, 200);
}

#[test]
#[serial]
fn test_environment_overrides_workspace_values() {
    clear_env();
    let temp = TempDir::new().unwrap();
    write_config(
        temp.path(),
        "[container]\nendpoint = \"http://file:4000\"\npoll_interval = \"5s\"\n",
    );
    env::set_var("SFN_LOCAL_ECS_ENDPOINT", "http://env:4000");
    env::set_var("SFN_LOCAL_ECS_POLL_INTERVAL", "2s");
    env::set_var("SFN_LOCAL_ACTIVITY_POLL_INTERVAL", "250ms");

    let config = ConfigLoader::load_from_workspace(temp.path());
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.container.resolved_endpoint(), "http://env:4000");
    assert_eq!(config.container.poll_interval().unwrap(), Duration::from_secs(2));
    assert_eq!(
        config.activity.poll_interval().unwrap(),
        Duration::from_millis(250)
    );
}

#[test]
#[serial]
fn test_invalid_override_fails_validation() {
    clear_env();
    let temp = TempDir::new().unwrap();
    env::set_var("SFN_LOCAL_LAMBDA_ENDPOINT", "ftp://files.local");

    let result = ConfigLoader::load_from_workspace(temp.path());
    clear_env();

    let err = result.unwrap_err();
    assert_eq!(err.code, "SFN-CFG-004");
}

#[test]
#[serial]
fn test_bad_poll_interval_in_file_fails() {
    clear_env();
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "[activity]\npoll_interval = \"whenever\"\n");

    let err = ConfigLoader::load_from_workspace(temp.path()).unwrap_err();

    assert_eq!(err.code, "SFN-CFG-002");
}

#[test]
#[serial]
fn test_loaded_config_builds_runtime() {
    clear_env();
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "[execution]\ndefault_task_timeout_seconds = 30\n");

    let config: RuntimeConfig = ConfigLoader::load_from_workspace(temp.path()).unwrap();
    let runtime = Runtime::from_config(config);

    assert_eq!(
        runtime.config.execution.default_task_timeout(),
        Duration::from_secs(30)
    );
}

#[test]
fn test_env_documentation_lists_every_override() {
    let docs = ConfigLoader::env_var_documentation();
    for var in ENV_VARS {
        assert!(docs.iter().any(|line| line.starts_with(var)), "{var} undocumented");
    }
}
