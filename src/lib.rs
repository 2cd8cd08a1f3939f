//! Core library for the Mistok Kubernetes compute backend.
//!
//! The crate exposes a compute abstraction for provisioning SSH-reachable
//! job pods and the Kubernetes implementation that powers it (ensure the
//! project's jump relay → wait for readiness → create the job pod and its
//! service).

pub mod cluster;
pub mod compute;
pub mod config;
pub mod janitor;
pub mod job;
pub mod keys;
pub mod kubernetes;
pub mod naming;
pub mod ssh;
pub mod test_support;

pub use cluster::{ClusterApi, ClusterError, KubeClusterApi, ResourceKind};
pub use compute::{
    Compute, ComputeFuture, InstanceAvailability, InstanceOffer, LaunchedInstance, OfferResources,
    ProjectKeys, Requirements, SshConnectionParams,
};
pub use config::{ConfigError, KubernetesConfig};
pub use janitor::{Janitor, JanitorConfig, JanitorError, SweepSummary, TEST_RUN_ID_ENV};
pub use job::{JobError, JobSpec, RunSpec};
pub use kubernetes::{JumpPodReadiness, KubernetesBackend, KubernetesBackendError};
pub use ssh::{CommandOutput, CommandRunner, ProcessCommandRunner, SshError, SshExecutor};
