//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default NodePort for the jump relay service.
pub const DEFAULT_JUMP_NODE_PORT: u16 = 32022;

/// Default container image for the jump relay. Any image providing
/// `/usr/sbin/sshd` works; deployments are expected to pin their own.
pub const DEFAULT_JUMP_POD_IMAGE: &str = "ghcr.io/mistok-dev/sshd:bookworm";

/// Kubernetes backend configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MISTOK",
    discovery(
        app_name = "mistok",
        env_var = "MISTOK_CONFIG_PATH",
        config_file_name = "mistok.toml",
        dotfile_name = ".mistok.toml",
        project_file_name = "mistok.toml"
    )
)]
pub struct KubernetesConfig {
    /// Path to a kubeconfig file. When unset the client infers its
    /// configuration from the environment, either an in-cluster service
    /// account or the default kubeconfig location.
    pub kubeconfig: Option<String>,
    /// Namespace all pods and services are created in.
    #[ortho_config(default = "default".to_owned())]
    pub namespace: String,
    /// Externally reachable address of the node fronting the jump relay.
    /// This value is required.
    #[ortho_config(default = String::new())]
    pub ssh_host: String,
    /// NodePort the jump relay service binds on every node.
    #[ortho_config(default = DEFAULT_JUMP_NODE_PORT)]
    pub ssh_port: u16,
    /// Container image for the jump relay pod.
    #[ortho_config(default = DEFAULT_JUMP_POD_IMAGE.to_owned())]
    pub jump_pod_image: String,
    /// SSH client binary used for key injection.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl KubernetesConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to mistok.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("mistok")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidField`] when the relay port is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.ssh_host,
            &FieldMetadata::new("jump relay host", "MISTOK_SSH_HOST", "ssh_host"),
        )?;
        Self::require_field(
            &self.namespace,
            &FieldMetadata::new("target namespace", "MISTOK_NAMESPACE", "namespace"),
        )?;
        Self::require_field(
            &self.jump_pod_image,
            &FieldMetadata::new("jump relay image", "MISTOK_JUMP_POD_IMAGE", "jump_pod_image"),
        )?;
        Self::require_field(
            &self.ssh_bin,
            &FieldMetadata::new("ssh client binary", "MISTOK_SSH_BIN", "ssh_bin"),
        )?;
        if self.ssh_port == 0 {
            return Err(ConfigError::InvalidField(
                "ssh_port must be non-zero: set MISTOK_SSH_PORT or add ssh_port to mistok.toml"
                    .to_owned(),
            ));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is outside the accepted range.
    #[error("invalid configuration field: {0}")]
    InvalidField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
