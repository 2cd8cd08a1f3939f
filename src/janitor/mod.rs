//! Kubernetes test-resource janitor.
//!
//! The janitor is designed for integration tests that provision real cluster
//! resources. It identifies pods and services belonging to a specific test
//! run via a label (`mistok.dev/test-run=<id>`) and deletes them, failing if
//! anything remains afterwards.

use std::ffi::OsString;

use serde::Deserialize;
use thiserror::Error;

use crate::naming::TEST_RUN_LABEL;
use crate::ssh::{CommandOutput, CommandRunner, ProcessCommandRunner, SshError};

/// Environment variable used by test harnesses to identify a test run.
pub const TEST_RUN_ID_ENV: &str = "MISTOK_TEST_RUN_ID";

/// Default `kubectl` binary name.
pub const DEFAULT_KUBECTL_BIN: &str = "kubectl";

/// Configuration for a janitor sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorConfig {
    /// Namespace to scope resource discovery.
    pub namespace: String,
    /// Test run identifier used to build the label selector.
    pub test_run_id: String,
    /// Path to the `kubectl` binary.
    pub kubectl_bin: String,
}

impl JanitorConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::InvalidConfig`] when any required field is blank.
    pub fn new(
        namespace: impl Into<String>,
        test_run_id: impl Into<String>,
        kubectl_bin: impl Into<String>,
    ) -> Result<Self, JanitorError> {
        let trimmed_namespace = namespace.into().trim().to_owned();
        let trimmed_test_run_id = test_run_id.into().trim().to_owned();
        let trimmed_kubectl_bin = kubectl_bin.into().trim().to_owned();
        if trimmed_namespace.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("namespace"),
            });
        }
        if trimmed_test_run_id.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("test_run_id"),
            });
        }
        if trimmed_kubectl_bin.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("kubectl_bin"),
            });
        }
        Ok(Self {
            namespace: trimmed_namespace,
            test_run_id: trimmed_test_run_id,
            kubectl_bin: trimmed_kubectl_bin,
        })
    }

    /// Returns the label selector matching this test run's resources.
    #[must_use]
    pub fn test_run_selector(&self) -> String {
        format!("{TEST_RUN_LABEL}={}", self.test_run_id)
    }
}

/// Summary of janitor work.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepSummary {
    /// Number of pods deleted during the sweep.
    pub deleted_pods: usize,
    /// Number of services deleted during the sweep.
    pub deleted_services: usize,
}

/// Errors returned by the janitor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JanitorError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when `kubectl` returns a non-zero exit status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `kubectl`).
        program: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when JSON output from the CLI cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource type being parsed (for example `pods`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when resources remain after the sweep.
    #[error("resources remain after janitor sweep: {message}")]
    NotClean {
        /// Human-readable description of what remains.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] SshError),
}

/// Deletes test-run-labelled cluster resources by shelling out to `kubectl`.
#[derive(Clone, Debug)]
pub struct Janitor<R: CommandRunner> {
    config: JanitorConfig,
    runner: R,
}

impl Janitor<ProcessCommandRunner> {
    /// Creates a janitor wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: JanitorConfig) -> Self {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> Janitor<R> {
    /// Creates a new janitor using the provided configuration and runner.
    #[must_use]
    pub const fn new(config: JanitorConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Performs a sweep and returns how many resources were deleted.
    ///
    /// The sweep is ordered: pods are deleted first (waiting for deletion),
    /// then services. The command fails if any labelled resources remain at
    /// the end.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when `kubectl` fails, output cannot be
    /// parsed, or resources remain after deletion attempts.
    pub fn sweep(&self) -> Result<SweepSummary, JanitorError> {
        let mut deleted_pods = 0;
        for pod in self.list_resources("pods")? {
            self.delete_resource("pod", &pod)?;
            deleted_pods += 1;
        }

        let mut deleted_services = 0;
        for service in self.list_resources("services")? {
            self.delete_resource("service", &service)?;
            deleted_services += 1;
        }

        let remaining_pods = self.list_resources("pods")?;
        let remaining_services = self.list_resources("services")?;
        if !remaining_pods.is_empty() || !remaining_services.is_empty() {
            let message = format!(
                "pods remaining: {}, services remaining: {}",
                remaining_pods.len(),
                remaining_services.len()
            );
            return Err(JanitorError::NotClean { message });
        }

        Ok(SweepSummary {
            deleted_pods,
            deleted_services,
        })
    }

    /// Checks command output and converts failure to `JanitorError`.
    fn check_kubectl_output(
        &self,
        output: CommandOutput,
        resource: &str,
    ) -> Result<CommandOutput, JanitorError> {
        if output.is_success() {
            return Ok(output);
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(JanitorError::CommandFailure {
            program: self.config.kubectl_bin.clone(),
            status: output.code,
            status_text,
            stderr: format!("{resource}: {}", output.stderr),
        })
    }

    fn run_kubectl(&self, args: &[OsString], resource: &str) -> Result<CommandOutput, JanitorError> {
        let output = self.runner.run(&self.config.kubectl_bin, args)?;
        self.check_kubectl_output(output, resource)
    }

    /// Lists names of labelled resources of `kind` in the configured namespace.
    fn list_resources(&self, kind: &str) -> Result<Vec<String>, JanitorError> {
        let args = vec![
            OsString::from("get"),
            OsString::from(kind),
            OsString::from("-n"),
            OsString::from(&self.config.namespace),
            OsString::from("-l"),
            OsString::from(self.config.test_run_selector()),
            OsString::from("-o"),
            OsString::from("json"),
        ];
        let output = self.run_kubectl(&args, kind)?;
        let list: KubectlList =
            serde_json::from_str(&output.stdout).map_err(|err| JanitorError::Parse {
                resource: kind.to_owned(),
                message: err.to_string(),
            })?;
        Ok(list
            .items
            .into_iter()
            .map(|item| item.metadata.name)
            .collect())
    }

    fn delete_resource(&self, kind: &str, name: &str) -> Result<CommandOutput, JanitorError> {
        let args = vec![
            OsString::from("delete"),
            OsString::from(kind),
            OsString::from(name),
            OsString::from("-n"),
            OsString::from(&self.config.namespace),
            OsString::from("--wait=true"),
        ];
        self.run_kubectl(&args, kind)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct KubectlList {
    items: Vec<KubectlItem>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct KubectlItem {
    metadata: KubectlMetadata,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct KubectlMetadata {
    name: String,
}

#[cfg(test)]
mod tests;
