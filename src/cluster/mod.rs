//! Cluster API seam for Pod and Service operations.
//!
//! Provisioning only ever creates and reads resources, so the seam stays
//! deliberately narrow. The production implementation in [`client`] talks to
//! a real control plane; tests substitute an in-memory fake.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::core::v1::{Pod, Service};
use thiserror::Error;

pub mod client;

pub use client::KubeClusterApi;

/// Future returned by cluster operations.
pub type ClusterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClusterError>> + Send + 'a>>;

/// Kind of cluster resource an operation acted on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// A `v1/Pod`.
    Pod,
    /// A `v1/Service`.
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pod => f.write_str("pod"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// Errors raised by cluster operations.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ClusterError {
    /// The requested resource does not exist. Expected during existence
    /// checks and readiness polling.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Name of the missing resource.
        name: String,
    },
    /// A resource with the same name already exists. Expected when two
    /// first jobs race to create the same jump relay.
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Kind of the conflicting resource.
        kind: ResourceKind,
        /// Name of the conflicting resource.
        name: String,
    },
    /// A cluster client could not be constructed.
    #[error("failed to construct a cluster client: {message}")]
    Connect {
        /// Underlying connection or kubeconfig error.
        message: String,
    },
    /// Any other control-plane failure. Always fatal to provisioning.
    #[error("cluster api error: {message}")]
    Api {
        /// Underlying API error.
        message: String,
    },
}

impl ClusterError {
    /// Returns whether the error is a not-found response.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns whether the error is an already-exists conflict.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Narrow interface over the Kubernetes control plane.
///
/// Implementations scope all operations to a single namespace fixed at
/// construction.
pub trait ClusterApi: Send + Sync {
    /// Creates `pod` and returns the server's view of it.
    fn create_pod<'a>(&'a self, pod: &'a Pod) -> ClusterFuture<'a, Pod>;

    /// Reads the pod named `name`.
    fn get_pod<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Pod>;

    /// Creates `service` and returns the server's view of it, including any
    /// assigned cluster IP.
    fn create_service<'a>(&'a self, service: &'a Service) -> ClusterFuture<'a, Service>;

    /// Reads the service named `name`.
    fn get_service<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Service>;
}

/// Returns whether `pod` has reached the running phase with every container
/// reporting ready.
///
/// A pod that has not yet published container statuses counts as not ready;
/// the poll loop keeps waiting rather than trusting a vacuous answer.
#[must_use]
pub fn pod_is_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    if status.phase.as_deref() != Some("Running") {
        return false;
    }
    status
        .container_statuses
        .as_ref()
        .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|cs| cs.ready))
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
    use rstest::rstest;

    use super::*;

    fn pod_with_status(phase: Option<&str>, ready: Option<Vec<bool>>) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: phase.map(str::to_owned),
                container_statuses: ready.map(|flags| {
                    flags
                        .into_iter()
                        .map(|flag| ContainerStatus {
                            ready: flag,
                            ..ContainerStatus::default()
                        })
                        .collect()
                }),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    #[rstest]
    fn statusless_pods_are_not_ready() {
        assert!(!pod_is_ready(&Pod::default()));
    }

    #[rstest]
    #[case(Some("Pending"), Some(vec![true]), false)]
    #[case(Some("Running"), None, false)]
    #[case(Some("Running"), Some(vec![]), false)]
    #[case(Some("Running"), Some(vec![true, false]), false)]
    #[case(Some("Running"), Some(vec![true, true]), true)]
    fn readiness_requires_running_and_all_containers_ready(
        #[case] phase: Option<&str>,
        #[case] ready: Option<Vec<bool>>,
        #[case] expected: bool,
    ) {
        assert_eq!(pod_is_ready(&pod_with_status(phase, ready)), expected);
    }

    #[rstest]
    fn not_found_helpers_classify_variants() {
        let missing = ClusterError::NotFound {
            kind: ResourceKind::Service,
            name: "p1-ssh-jump-pod-service".to_owned(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_already_exists());
        let conflict = ClusterError::AlreadyExists {
            kind: ResourceKind::Pod,
            name: "p1-ssh-jump-pod".to_owned(),
        };
        assert!(conflict.is_already_exists());
    }

    #[rstest]
    fn errors_render_resource_context() {
        let err = ClusterError::NotFound {
            kind: ResourceKind::Pod,
            name: "job-demo-0".to_owned(),
        };
        assert_eq!(err.to_string(), "pod job-demo-0 not found");
    }
}
