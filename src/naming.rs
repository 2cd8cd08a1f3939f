//! Derived resource names and labels.
//!
//! Every cluster resource name is a deterministic function of run, job, or
//! project identity so that repeat provisioning finds existing resources
//! instead of minting duplicates. Input names are bounded by
//! [`MAX_PROJECT_NAME_LENGTH`] and [`MAX_RUN_NAME_LENGTH`] so every derived
//! pod, service, and container name fits the cluster's label limit.

use std::collections::BTreeMap;

use crate::job::{JobSpec, RunSpec};

/// Label recording which tool created a resource.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Value stored under [`MANAGED_BY_LABEL`].
pub const MANAGED_BY: &str = "mistok";
/// Label carrying the resource's own name, used as the service selector.
pub const NAME_LABEL: &str = "app.kubernetes.io/name";
/// Label scoping resources to a test run so the janitor can sweep them.
pub const TEST_RUN_LABEL: &str = "mistok.dev/test-run";

/// Upper bound Kubernetes places on DNS label names. Service and container
/// names and label values are all validated against it by the API server.
pub const MAX_DNS_LABEL_LENGTH: usize = 63;

const JUMP_POD_SUFFIX: &str = "-ssh-jump-pod";
const SERVICE_SUFFIX: &str = "-service";
const CONTAINER_SUFFIX: &str = "-container";
const INSTANCE_PREFIX: &str = "job-";

/// Decimal width of the largest job number.
const MAX_JOB_NUMBER_DIGITS: usize = 10;

/// Longest project name whose relay pod, service, and container names all
/// fit [`MAX_DNS_LABEL_LENGTH`].
pub const MAX_PROJECT_NAME_LENGTH: usize =
    MAX_DNS_LABEL_LENGTH - JUMP_POD_SUFFIX.len() - CONTAINER_SUFFIX.len();

/// Longest run name whose job pod, service, and container names all fit
/// [`MAX_DNS_LABEL_LENGTH`] for any job number.
pub const MAX_RUN_NAME_LENGTH: usize = MAX_DNS_LABEL_LENGTH
    - INSTANCE_PREFIX.len()
    - "-".len()
    - MAX_JOB_NUMBER_DIGITS
    - CONTAINER_SUFFIX.len();

/// Name of the project's SSH relay pod.
#[must_use]
pub fn jump_pod_name(project_name: &str) -> String {
    format!("{project_name}{JUMP_POD_SUFFIX}")
}

/// Name of the service paired with `pod_name`.
#[must_use]
pub fn service_name(pod_name: &str) -> String {
    format!("{pod_name}{SERVICE_SUFFIX}")
}

/// Name of the pod provisioned for `job` within `run`.
#[must_use]
pub fn instance_name(run: &RunSpec, job: &JobSpec) -> String {
    format!("{INSTANCE_PREFIX}{}-{}", run.run_name, job.job_number)
}

/// Name of the single container inside `pod_name`.
#[must_use]
pub fn container_name(pod_name: &str) -> String {
    format!("{pod_name}{CONTAINER_SUFFIX}")
}

/// Labels applied to every managed pod and service.
///
/// The name label doubles as the service selector; the test-run label is only
/// present when provisioning under an explicit test-run id.
#[must_use]
pub fn resource_labels(name: &str, test_run_id: Option<&str>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(NAME_LABEL.to_owned(), name.to_owned());
    labels.insert(MANAGED_BY_LABEL.to_owned(), MANAGED_BY.to_owned());
    if let Some(id) = test_run_id {
        labels.insert(TEST_RUN_LABEL.to_owned(), id.to_owned());
    }
    labels
}
