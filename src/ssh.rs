//! One-shot remote command execution over SSH.
//!
//! Each call writes the caller's private key to a scoped temporary file,
//! invokes the SSH client once, and captures the outcome. No connection or
//! key material outlives the call.

use std::ffi::OsString;
use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;
use thiserror::Error;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Outcome of a remote command, as observed by the SSH client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Remote exit code, or the SSH client's own failure code.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the remote command exited zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Errors raised while executing a remote command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshError {
    /// The client binary could not be started.
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error text.
        message: String,
    },
    /// The ephemeral key file could not be created or written.
    #[error("failed to stage the private key: {message}")]
    KeyFile {
        /// Underlying I/O error text.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SshError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SshError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| SshError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs single commands on a remote host over SSH.
#[derive(Clone, Debug)]
pub struct SshExecutor<R: CommandRunner> {
    ssh_bin: String,
    username: String,
    runner: R,
}

impl SshExecutor<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub fn with_process_runner(ssh_bin: impl Into<String>, username: impl Into<String>) -> Self {
        Self::new(ssh_bin, username, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshExecutor<R> {
    /// Creates an executor using the provided runner.
    #[must_use]
    pub fn new(ssh_bin: impl Into<String>, username: impl Into<String>, runner: R) -> Self {
        Self {
            ssh_bin: ssh_bin.into(),
            username: username.into(),
            runner,
        }
    }

    /// Executes `remote_command` on `host:port`, authenticating with
    /// `private_key`.
    ///
    /// The key is staged in a temporary file readable only by the current
    /// user and removed when this call returns, success or not.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::KeyFile`] when the key cannot be staged and
    /// [`SshError::Spawn`] when the SSH client cannot be started. A remote
    /// command that runs and fails is not an error; inspect the returned
    /// [`RemoteCommandOutput`].
    pub fn run(
        &self,
        host: &str,
        port: u16,
        private_key: &str,
        remote_command: &str,
    ) -> Result<RemoteCommandOutput, SshError> {
        let key_file = stage_private_key(private_key)?;
        let args = self.build_args(key_file.path().as_os_str(), host, port, remote_command);
        let output = self.runner.run(&self.ssh_bin, &args)?;
        // key_file drops here, deleting the staged key.
        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_args(
        &self,
        key_path: &std::ffi::OsStr,
        host: &str,
        port: u16,
        remote_command: &str,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(port.to_string()),
            OsString::from("-i"),
            OsString::from(key_path),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from("StrictHostKeyChecking=no"),
            OsString::from("-o"),
            OsString::from("UserKnownHostsFile=/dev/null"),
        ];
        args.push(OsString::from(format!("{}@{host}", self.username)));
        args.push(OsString::from(remote_command));
        args
    }
}

/// Writes `private_key` to a freshly created temporary file.
///
/// `NamedTempFile` creates the file with mode 600 on Unix and deletes it on
/// drop. OpenSSH rejects key files without a trailing newline, so one is
/// appended when missing.
fn stage_private_key(private_key: &str) -> Result<NamedTempFile, SshError> {
    let key_file_error = |err: std::io::Error| SshError::KeyFile {
        message: err.to_string(),
    };
    let mut key_file = NamedTempFile::new().map_err(key_file_error)?;
    key_file
        .write_all(private_key.as_bytes())
        .map_err(key_file_error)?;
    if !private_key.ends_with('\n') {
        key_file.write_all(b"\n").map_err(key_file_error)?;
    }
    key_file.flush().map_err(key_file_error)?;
    Ok(key_file)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;

    /// Runner that inspects the staged key file while the call is in flight.
    struct KeyInspectingRunner {
        seen: Mutex<Vec<(PathBuf, String)>>,
    }

    impl KeyInspectingRunner {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for KeyInspectingRunner {
        fn run(&self, _program: &str, args: &[OsString]) -> Result<CommandOutput, SshError> {
            let key_path = args
                .iter()
                .skip_while(|arg| *arg != "-i")
                .nth(1)
                .map(PathBuf::from)
                .expect("args should include -i <key>");
            let contents =
                std::fs::read_to_string(&key_path).expect("key file should exist during the call");
            self.seen
                .lock()
                .expect("lock should not be poisoned")
                .push((key_path, contents));
            Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[rstest]
    fn stages_the_key_for_the_duration_of_the_call() {
        let runner = KeyInspectingRunner::new();
        let executor = SshExecutor::new("ssh", "root", runner);
        let output = executor
            .run("relay.example", 32022, "FAKE KEY MATERIAL", "true")
            .expect("execution should succeed");
        assert!(output.is_success());

        let seen = executor
            .runner
            .seen
            .lock()
            .expect("lock should not be poisoned");
        let (path, contents) = seen.first().expect("runner should have been invoked");
        assert_eq!(contents, "FAKE KEY MATERIAL\n");
        assert!(!path.exists(), "key file should be deleted after the call");
    }

    #[rstest]
    fn builds_ssh_arguments_in_order() {
        let executor = SshExecutor::new("ssh", "root", ProcessCommandRunner);
        let args = executor.build_args(
            std::ffi::OsStr::new("/tmp/key"),
            "relay.example",
            32022,
            "echo ready",
        );
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "-p",
                "32022",
                "-i",
                "/tmp/key",
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "root@relay.example",
                "echo ready",
            ]
        );
    }

    #[rstest]
    fn preserves_an_existing_trailing_newline() {
        let key_file = stage_private_key("KEY\n").expect("staging should succeed");
        let contents =
            std::fs::read_to_string(key_file.path()).expect("staged key should be readable");
        assert_eq!(contents, "KEY\n");
    }
}
