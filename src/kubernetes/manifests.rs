//! Typed Pod and Service manifests for managed resources.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Pod, PodSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::naming;

/// Selector matching the pod named `pod_name`.
fn selector(pod_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(naming::NAME_LABEL.to_owned(), pod_name.to_owned());
    labels
}

/// Pod running `image` under a single bootstrap shell command.
///
/// The whole startup sequence is handed to `/bin/sh -c` so the container
/// image's own entrypoint never runs.
pub(crate) fn ssh_pod(
    name: &str,
    image: &str,
    bootstrap: String,
    ssh_port: u16,
    labels: BTreeMap<String, String>,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: naming::container_name(name),
                image: Some(image.to_owned()),
                command: Some(vec!["/bin/sh".to_owned()]),
                args: Some(vec!["-c".to_owned(), bootstrap]),
                ports: Some(vec![ContainerPort {
                    container_port: i32::from(ssh_port),
                    ..ContainerPort::default()
                }]),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

/// NodePort service exposing the jump pod's SSH daemon on `node_port`.
pub(crate) fn node_port_service(
    pod_name: &str,
    ssh_port: u16,
    node_port: u16,
    labels: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(naming::service_name(pod_name)),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_owned()),
            selector: Some(selector(pod_name)),
            ports: Some(vec![ServicePort {
                port: i32::from(ssh_port),
                target_port: Some(IntOrString::Int(i32::from(ssh_port))),
                node_port: Some(i32::from(node_port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// ClusterIP service exposing a job pod's SSH port inside the cluster.
pub(crate) fn cluster_ip_service(
    pod_name: &str,
    ssh_port: u16,
    labels: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(naming::service_name(pod_name)),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_owned()),
            selector: Some(selector(pod_name)),
            ports: Some(vec![ServicePort {
                port: i32::from(ssh_port),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
