//! Unit tests for configuration loading and key material resolution.

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use mistok::config::{DEFAULT_JUMP_POD_IMAGE, ConfigError, KubernetesConfig};
use mistok::keys::load_key_material;
use mistok::test_support::EnvGuard;
use rstest::*;
use tempfile::TempDir;

#[fixture]
fn valid_config() -> KubernetesConfig {
    KubernetesConfig {
        kubeconfig: None,
        namespace: String::from("default"),
        ssh_host: String::from("relay.example"),
        ssh_port: 32022,
        jump_pod_image: String::from(DEFAULT_JUMP_POD_IMAGE),
        ssh_bin: String::from("ssh"),
    }
}

#[test]
fn config_validation_rejects_missing_host_with_actionable_error() {
    let cfg = KubernetesConfig {
        ssh_host: String::new(),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("relay host is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(
        message.contains("MISTOK_SSH_HOST"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("mistok.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("ssh_host"),
        "error should mention TOML key: {message}"
    );
}

/// Verifies that validation produces actionable errors mentioning both the
/// environment variable and configuration file for each required field.
#[test]
fn config_validation_produces_actionable_errors_for_all_fields() {
    fn assert_actionable(
        mut cfg: KubernetesConfig,
        mutate: impl FnOnce(&mut KubernetesConfig),
        env_var: &str,
        toml_key: &str,
    ) {
        mutate(&mut cfg);
        let error = cfg.validate().expect_err("validation should fail");
        let message = error.to_string();
        assert!(
            message.contains(env_var),
            "error should mention env var {env_var}: {message}"
        );
        assert!(
            message.contains("mistok.toml"),
            "error should mention config file: {message}"
        );
        assert!(
            message.contains(toml_key),
            "error should mention TOML key {toml_key}: {message}"
        );
    }

    assert_actionable(
        valid_config(),
        |cfg| cfg.namespace.clear(),
        "MISTOK_NAMESPACE",
        "namespace",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.jump_pod_image.clear(),
        "MISTOK_JUMP_POD_IMAGE",
        "jump_pod_image",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.ssh_bin.clear(),
        "MISTOK_SSH_BIN",
        "ssh_bin",
    );
}

#[test]
fn config_rejects_a_zero_relay_port() {
    let cfg = KubernetesConfig {
        ssh_port: 0,
        ..valid_config()
    };

    let error = cfg.validate().expect_err("port zero should fail");
    assert!(
        matches!(error, ConfigError::InvalidField(ref message) if message.contains("MISTOK_SSH_PORT")),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn config_loads_from_environment_variables() {
    let _guard = EnvGuard::set_vars(&[
        ("MISTOK_SSH_HOST", "relay.test"),
        ("MISTOK_SSH_PORT", "30123"),
        ("MISTOK_NAMESPACE", "jobs"),
    ])
    .await;

    let cfg = KubernetesConfig::load_without_cli_args().expect("config should load");
    assert_eq!(cfg.ssh_host, "relay.test");
    assert_eq!(cfg.ssh_port, 30123);
    assert_eq!(cfg.namespace, "jobs");
    assert_eq!(cfg.jump_pod_image, DEFAULT_JUMP_POD_IMAGE);
    assert_eq!(cfg.ssh_bin, "ssh");
    cfg.validate().expect("loaded config should validate");
}

#[tokio::test]
async fn key_material_resolves_a_tilde_path() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let home = tmp.path().to_string_lossy().to_string();
    let _guard = EnvGuard::set_vars(&[("HOME", home.as_str())]).await;

    let tmp_root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp home dir should be utf8: {}", path.display()));
    let fs = Dir::open_ambient_dir(&tmp_root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp home dir: {err}"));
    fs.create_dir_all(".ssh")
        .unwrap_or_else(|err| panic!("create .ssh dir: {err}"));
    fs.write(".ssh/id_ed25519.pub", "ssh-ed25519 AAAA user@host\n")
        .unwrap_or_else(|err| panic!("write key file: {err}"));

    let content =
        load_key_material("~/.ssh/id_ed25519.pub").expect("tilde path should resolve");
    assert_eq!(content, "ssh-ed25519 AAAA user@host\n");
}
