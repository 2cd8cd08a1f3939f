//! Job pod provisioning.

use std::net::IpAddr;

use k8s_openapi::api::core::v1::Service;
use tracing::debug;

use crate::cluster::ClusterApi;
use crate::compute::{LaunchedInstance, SshConnectionParams};
use crate::job::{JobSpec, RunSpec};
use crate::naming;
use crate::ssh::CommandRunner;

use super::{
    JOB_SSH_PORT, KubernetesBackend, KubernetesBackendError, REGION, SSH_USERNAME, bootstrap,
    manifests,
};

/// Extracts a usable cluster IP from a created service.
///
/// Headless services report the literal string `None`; treat that and an
/// empty string as missing.
fn cluster_ip(service: &Service) -> Option<&str> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != "None")
}

impl<C: ClusterApi, R: CommandRunner> KubernetesBackend<C, R> {
    /// Creates the job pod and its ClusterIP service, returning connection
    /// details routed through the jump relay.
    ///
    /// Job pods get no readiness wait; the scheduler monitors their startup
    /// out of band. Both the submitting user's key and the project owner's
    /// key are authorized so either side can attach.
    pub(crate) async fn launch_job(
        &self,
        run: &RunSpec,
        job: &JobSpec,
        owner_public_key: &str,
    ) -> Result<LaunchedInstance, KubernetesBackendError> {
        let instance_name = naming::instance_name(run, job);
        let authorized_keys = [
            run.user_public_key.trim().to_owned(),
            owner_public_key.to_owned(),
        ];
        let script = bootstrap::bootstrap_script(&authorized_keys, JOB_SSH_PORT, &job.commands);
        let pod = manifests::ssh_pod(
            &instance_name,
            &job.image_name,
            script,
            JOB_SSH_PORT,
            self.labels_for(&instance_name),
        );
        self.cluster.create_pod(&pod).await?;

        let service =
            manifests::cluster_ip_service(&instance_name, JOB_SSH_PORT, self.labels_for(&instance_name));
        let created = self.cluster.create_service(&service).await?;

        let service_name = naming::service_name(&instance_name);
        let address = cluster_ip(&created).ok_or_else(|| KubernetesBackendError::MissingClusterIp {
            service: service_name.clone(),
        })?;
        let ip_address: IpAddr =
            address
                .parse()
                .map_err(|_| KubernetesBackendError::InvalidClusterIp {
                    service: service_name,
                    address: address.to_owned(),
                })?;

        debug!(instance = %instance_name, ip = %ip_address, "job pod and service provisioned");
        Ok(LaunchedInstance {
            instance_id: instance_name,
            ip_address,
            region: REGION.to_owned(),
            username: SSH_USERNAME.to_owned(),
            ssh_port: JOB_SSH_PORT,
            ssh_proxy: SshConnectionParams {
                hostname: self.config.ssh_host.clone(),
                username: SSH_USERNAME.to_owned(),
                port: self.config.ssh_port,
            },
        })
    }
}
