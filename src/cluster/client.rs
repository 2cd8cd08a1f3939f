//! Production [`ClusterApi`] backed by a [`kube`] client.

use camino::Utf8Path;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};

use super::{ClusterApi, ClusterError, ClusterFuture, ResourceKind};

/// Namespaced Pod and Service handles over one authenticated client.
#[derive(Clone)]
pub struct KubeClusterApi {
    pods: Api<Pod>,
    services: Api<Service>,
}

impl KubeClusterApi {
    /// Wraps an existing client, scoping operations to `namespace`.
    #[must_use]
    pub fn new(client: kube::Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client.clone(), namespace),
            services: Api::namespaced(client, namespace),
        }
    }

    /// Connects to the cluster described by `kubeconfig`, or by the ambient
    /// environment (in-cluster service account or default kubeconfig) when
    /// `kubeconfig` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Connect`] when the kubeconfig cannot be read
    /// or no client can be constructed from it.
    pub async fn connect(
        kubeconfig: Option<&Utf8Path>,
        namespace: &str,
    ) -> Result<Self, ClusterError> {
        let client = match kubeconfig {
            Some(path) => {
                let parsed = Kubeconfig::read_from(path).map_err(connect_error)?;
                let config =
                    kube::Config::from_custom_kubeconfig(parsed, &KubeConfigOptions::default())
                        .await
                        .map_err(connect_error)?;
                kube::Client::try_from(config).map_err(connect_error)?
            }
            None => kube::Client::try_default().await.map_err(connect_error)?,
        };
        Ok(Self::new(client, namespace))
    }
}

fn connect_error(err: impl std::error::Error) -> ClusterError {
    ClusterError::Connect {
        message: err.to_string(),
    }
}

fn map_kube_error(kind: ResourceKind, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
            kind,
            name: name.to_owned(),
        },
        kube::Error::Api(ae) if ae.code == 409 => ClusterError::AlreadyExists {
            kind,
            name: name.to_owned(),
        },
        other => ClusterError::Api {
            message: other.to_string(),
        },
    }
}

fn resource_name(metadata: &kube::api::ObjectMeta) -> &str {
    metadata.name.as_deref().unwrap_or_default()
}

impl ClusterApi for KubeClusterApi {
    fn create_pod<'a>(&'a self, pod: &'a Pod) -> ClusterFuture<'a, Pod> {
        Box::pin(async move {
            self.pods
                .create(&PostParams::default(), pod)
                .await
                .map_err(|err| map_kube_error(ResourceKind::Pod, resource_name(&pod.metadata), err))
        })
    }

    fn get_pod<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Pod> {
        Box::pin(async move {
            self.pods
                .get(name)
                .await
                .map_err(|err| map_kube_error(ResourceKind::Pod, name, err))
        })
    }

    fn create_service<'a>(&'a self, service: &'a Service) -> ClusterFuture<'a, Service> {
        Box::pin(async move {
            self.services
                .create(&PostParams::default(), service)
                .await
                .map_err(|err| {
                    map_kube_error(ResourceKind::Service, resource_name(&service.metadata), err)
                })
        })
    }

    fn get_service<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Service> {
        Box::pin(async move {
            self.services
                .get(name)
                .await
                .map_err(|err| map_kube_error(ResourceKind::Service, name, err))
        })
    }
}
