//! Kubernetes backend provisioning SSH-reachable job pods behind a
//! per-project jump relay.

mod bootstrap;
mod jump;
mod launch;
mod manifests;

use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

use crate::cluster::{ClusterApi, ClusterError, KubeClusterApi};
use crate::compute::{
    Compute, ComputeFuture, InstanceAvailability, InstanceOffer, LaunchedInstance, OfferResources,
    ProjectKeys, Requirements,
};
use crate::config::{ConfigError, KubernetesConfig};
use crate::job::{JobError, JobSpec, RunSpec};
use crate::naming;
use crate::ssh::{CommandRunner, ProcessCommandRunner, SshExecutor};

/// SSH port job pods listen on.
pub const JOB_SSH_PORT: u16 = 10022;
/// Port the jump relay's daemon listens on inside its pod. The NodePort
/// service maps this to the configured external port.
const JUMP_POD_SSH_PORT: u16 = 22;
/// Login user for every managed pod.
pub const SSH_USERNAME: &str = "root";
/// Region reported for all offers and launched instances.
pub const REGION: &str = "local";

const OFFER_INSTANCE_NAME: &str = "k8s-instance";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Readiness outcome for a polled pod.
///
/// A timed-out relay is not fatal: provisioning continues and SSH access
/// becomes available whenever the pod eventually starts serving.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JumpPodReadiness {
    /// The pod is running and every container reports ready.
    Ready,
    /// The timeout elapsed before the pod reported ready.
    TimedOut,
}

impl JumpPodReadiness {
    /// Returns `true` when the pod was confirmed ready.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Errors raised by the Kubernetes backend.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum KubernetesBackendError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a run or job description fails validation.
    #[error("invalid job request: {0}")]
    Validation(#[from] JobError),
    /// Control-plane failure outside the expected not-found and
    /// already-exists responses. Always aborts provisioning.
    #[error("cluster api error: {0}")]
    Cluster(#[from] ClusterError),
    /// Raised when the job service reports no cluster IP.
    #[error("service {service} has no cluster ip")]
    MissingClusterIp {
        /// Service that should have been assigned an address.
        service: String,
    },
    /// Raised when the assigned cluster IP is not a parseable address.
    #[error("service {service} reported an unusable cluster ip {address:?}")]
    InvalidClusterIp {
        /// Service the address came from.
        service: String,
        /// Address string reported by the control plane.
        address: String,
    },
}

impl From<ConfigError> for KubernetesBackendError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

/// Backend that provisions job pods and the per-project SSH relay.
#[derive(Clone)]
pub struct KubernetesBackend<C: ClusterApi, R: CommandRunner> {
    cluster: C,
    ssh: SshExecutor<R>,
    config: KubernetesConfig,
    test_run_id: Option<String>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl KubernetesBackend<KubeClusterApi, ProcessCommandRunner> {
    /// Connects to the configured cluster and wires the real SSH client.
    ///
    /// # Errors
    ///
    /// Returns [`KubernetesBackendError::Config`] when validation fails and
    /// [`KubernetesBackendError::Cluster`] when no client can be constructed.
    pub async fn connect(config: KubernetesConfig) -> Result<Self, KubernetesBackendError> {
        config.validate()?;
        let cluster = KubeClusterApi::connect(
            config.kubeconfig.as_deref().map(Utf8Path::new),
            &config.namespace,
        )
        .await?;
        Self::new(config, cluster, ProcessCommandRunner)
    }
}

impl<C: ClusterApi, R: CommandRunner> KubernetesBackend<C, R> {
    /// Creates a backend over an existing cluster handle and command runner.
    ///
    /// # Errors
    ///
    /// Returns [`KubernetesBackendError::Config`] when the configuration
    /// fails validation.
    pub fn new(
        config: KubernetesConfig,
        cluster: C,
        runner: R,
    ) -> Result<Self, KubernetesBackendError> {
        config.validate()?;
        let ssh = SshExecutor::new(config.ssh_bin.clone(), SSH_USERNAME, runner);
        Ok(Self {
            cluster,
            ssh,
            config,
            test_run_id: None,
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
        })
    }

    /// Overrides the readiness poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the overall readiness timeout.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Tags every created resource with a test-run id so the janitor can
    /// sweep it later.
    #[must_use]
    pub fn with_test_run_id(mut self, id: impl Into<String>) -> Self {
        self.test_run_id = Some(id.into());
        self
    }

    fn labels_for(&self, name: &str) -> BTreeMap<String, String> {
        naming::resource_labels(name, self.test_run_id.as_deref())
    }

    fn static_offer() -> InstanceOffer {
        InstanceOffer {
            instance_name: OFFER_INSTANCE_NAME.to_owned(),
            resources: OfferResources {
                cpus: 2,
                memory_mib: 8192,
                spot: false,
            },
            price: 0.0,
            region: REGION.to_owned(),
            availability: InstanceAvailability::Available,
        }
    }
}

impl<C, R> Compute for KubernetesBackend<C, R>
where
    C: ClusterApi,
    R: CommandRunner + Send + Sync,
{
    type Error = KubernetesBackendError;

    fn get_offers<'a>(
        &'a self,
        _requirements: Option<&'a Requirements>,
    ) -> ComputeFuture<'a, Vec<InstanceOffer>, Self::Error> {
        // Capacity discovery is a placeholder; one fixed offer regardless of
        // requirements.
        Box::pin(async move { Ok(vec![Self::static_offer()]) })
    }

    fn run_job<'a>(
        &'a self,
        run: &'a RunSpec,
        job: &'a JobSpec,
        _offer: &'a InstanceOffer,
        project_keys: &'a ProjectKeys,
    ) -> ComputeFuture<'a, LaunchedInstance, Self::Error> {
        Box::pin(async move {
            run.validate()?;
            job.validate()?;
            self.ensure_jump_pod(
                &run.project_name,
                project_keys.public_key.trim(),
                project_keys.private_key.trim(),
                run.user_public_key.trim(),
            )
            .await?;
            self.launch_job(run, job, project_keys.public_key.trim())
                .await
        })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
        region: &'a str,
        _backend_data: Option<&'a str>,
    ) -> ComputeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            // Termination is not implemented for this backend; pods and
            // services persist until removed externally.
            debug!(instance_id, region, "terminate request ignored");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests;
