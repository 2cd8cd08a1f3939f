//! Jump relay lifecycle: idempotent creation, readiness polling, and
//! authorized-key maintenance.

use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cluster::{ClusterApi, ClusterError, pod_is_ready};
use crate::naming;
use crate::ssh::{CommandRunner, RemoteCommandOutput, SshError};

use super::{
    JUMP_POD_SSH_PORT, JumpPodReadiness, KubernetesBackend, KubernetesBackendError, bootstrap,
    manifests,
};

/// Treats an already-exists conflict as success.
///
/// Two first jobs for the same project may race through the existence check;
/// whichever creation loses the race still leaves the cluster in the desired
/// state.
fn ignore_existing<T>(result: Result<T, ClusterError>) -> Result<(), ClusterError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => {
            debug!(%err, "lost a creation race; resource already present");
            Ok(())
        }
        Err(other) => Err(other),
    }
}

impl<C: ClusterApi, R: CommandRunner> KubernetesBackend<C, R> {
    /// Ensures the project's jump relay exists and is serving, then
    /// authorizes `user_public_key` on it.
    ///
    /// The relay pod and its NodePort service are created on first use and
    /// reused afterwards. Key injection is best effort: failures are logged
    /// and never abort provisioning, matching the relay's role as a shared
    /// convenience rather than a launch prerequisite.
    ///
    /// # Errors
    ///
    /// Returns [`KubernetesBackendError::Cluster`] for control-plane
    /// failures other than the expected not-found and already-exists
    /// responses. A readiness timeout is not an error; it is reported as
    /// [`JumpPodReadiness::TimedOut`].
    pub async fn ensure_jump_pod(
        &self,
        project_name: &str,
        owner_public_key: &str,
        owner_private_key: &str,
        user_public_key: &str,
    ) -> Result<JumpPodReadiness, KubernetesBackendError> {
        self.create_jump_pod_if_absent(project_name, owner_public_key)
            .await?;
        let readiness = self
            .wait_for_pod_ready(&naming::jump_pod_name(project_name))
            .await?;
        match self.authorize_user_key(owner_private_key, user_public_key) {
            Ok(output) if output.is_success() => {
                debug!(project = %project_name, "user key authorized on the jump relay");
            }
            Ok(output) => warn!(
                project = %project_name,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "key injection failed on the jump relay"
            ),
            Err(err) => warn!(
                project = %project_name,
                error = %err,
                "key injection could not reach the jump relay"
            ),
        }
        Ok(readiness)
    }

    /// Creates the relay pod and service unless the service already exists.
    ///
    /// The service is the existence marker, mirroring creation order: the
    /// pod is created first, so a visible service implies a full relay.
    async fn create_jump_pod_if_absent(
        &self,
        project_name: &str,
        owner_public_key: &str,
    ) -> Result<(), KubernetesBackendError> {
        let pod_name = naming::jump_pod_name(project_name);
        let service_name = naming::service_name(&pod_name);
        match self.cluster.get_service(&service_name).await {
            Ok(_) => {
                debug!(service = %service_name, "jump relay already provisioned");
                Ok(())
            }
            Err(err) if err.is_not_found() => self.create_jump_pod(&pod_name, owner_public_key).await,
            Err(other) => Err(other.into()),
        }
    }

    /// Creates the relay pod and its NodePort service, seeded with the
    /// project owner's key only.
    async fn create_jump_pod(
        &self,
        pod_name: &str,
        owner_public_key: &str,
    ) -> Result<(), KubernetesBackendError> {
        let script = bootstrap::bootstrap_script(
            &[owner_public_key.to_owned()],
            JUMP_POD_SSH_PORT,
            &[],
        );
        let pod = manifests::ssh_pod(
            pod_name,
            &self.config.jump_pod_image,
            script,
            JUMP_POD_SSH_PORT,
            self.labels_for(pod_name),
        );
        ignore_existing(self.cluster.create_pod(&pod).await)?;
        let service = manifests::node_port_service(
            pod_name,
            JUMP_POD_SSH_PORT,
            self.config.ssh_port,
            self.labels_for(pod_name),
        );
        ignore_existing(self.cluster.create_service(&service).await)?;
        debug!(pod = %pod_name, node_port = self.config.ssh_port, "jump relay provisioned");
        Ok(())
    }

    /// Polls `pod_name` until it is ready or the timeout elapses.
    ///
    /// The first check happens immediately, so an already-ready pod costs no
    /// sleep at all. A not-found response means the pod is still being
    /// scheduled and keeps the loop waiting; any other failure aborts.
    pub(crate) async fn wait_for_pod_ready(
        &self,
        pod_name: &str,
    ) -> Result<JumpPodReadiness, KubernetesBackendError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match self.cluster.get_pod(pod_name).await {
                Ok(pod) if pod_is_ready(&pod) => return Ok(JumpPodReadiness::Ready),
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(other) => return Err(other.into()),
            }
            if Instant::now() >= deadline {
                warn!(
                    pod = %pod_name,
                    timeout = ?self.wait_timeout,
                    "timed out waiting for pod readiness"
                );
                return Ok(JumpPodReadiness::TimedOut);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Runs the idempotent authorized-key append on the relay over SSH.
    fn authorize_user_key(
        &self,
        owner_private_key: &str,
        user_public_key: &str,
    ) -> Result<RemoteCommandOutput, SshError> {
        let command = bootstrap::authorize_key_command(user_public_key);
        self.ssh.run(
            &self.config.ssh_host,
            self.config.ssh_port,
            owner_private_key,
            &command,
        )
    }
}
