//! Command-line interface definitions for the `mistok` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `mistok` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mistok",
    about = "Provision SSH-reachable job pods on a Kubernetes cluster",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the instance offers this backend can serve.
    #[command(name = "offers", about = "List the instance offers this backend can serve")]
    Offers,
    /// Provision a job pod behind the project's jump relay.
    #[command(
        name = "launch",
        about = "Provision a job pod behind the project's jump relay"
    )]
    Launch(LaunchCommand),
    /// Acknowledge termination of a launched instance.
    #[command(
        name = "terminate",
        about = "Acknowledge termination of a launched instance"
    )]
    Terminate(TerminateCommand),
}

/// Arguments for the `mistok launch` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct LaunchCommand {
    /// Project the run belongs to. Lowercase DNS label, also names the
    /// project's jump relay.
    #[arg(long, value_name = "NAME")]
    pub(crate) project: String,
    /// Run name, unique within the project. Lowercase DNS label.
    #[arg(long, value_name = "NAME")]
    pub(crate) run_name: String,
    /// Ordinal of the job within its run.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub(crate) job_number: u32,
    /// Container image for the job. The image must provide an OpenSSH server.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: String,
    /// Path to the submitting user's public key.
    #[arg(long, value_name = "PATH")]
    pub(crate) user_public_key: String,
    /// Path to the project owner's public key.
    #[arg(long, value_name = "PATH")]
    pub(crate) project_public_key: String,
    /// Path to the project owner's private key, used to reach the jump relay.
    #[arg(long, value_name = "PATH")]
    pub(crate) project_private_key: String,
    /// Startup commands executed once the job pod's SSH daemon is running
    /// (use -- to separate). Without commands the pod idles until attached.
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `mistok terminate` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TerminateCommand {
    /// Instance identifier returned by launch.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: String,
    /// Region the instance was launched in.
    #[arg(long, value_name = "REGION", default_value = "local")]
    pub(crate) region: String,
}
