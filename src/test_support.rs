//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus, Service};

use crate::cluster::{ClusterApi, ClusterError, ClusterFuture, ResourceKind};
use crate::ssh::{CommandOutput, CommandRunner, SshError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        relock(&self.invocations).clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        relock(&self.responses).push_back(CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        relock(&self.responses).push_back(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: String::from("simulated failure"),
        });
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        relock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SshError> {
        relock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        relock(&self.responses)
            .pop_front()
            .ok_or_else(|| SshError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

#[derive(Debug)]
struct ClusterState {
    pods: BTreeMap<String, Pod>,
    services: BTreeMap<String, Service>,
    pod_creates: usize,
    service_creates: usize,
    pending_polls: BTreeMap<String, usize>,
    service_get_failure: Option<String>,
    cluster_ip: String,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            pods: BTreeMap::new(),
            services: BTreeMap::new(),
            pod_creates: 0,
            service_creates: 0,
            pending_polls: BTreeMap::new(),
            service_get_failure: None,
            cluster_ip: String::from("10.96.0.1"),
        }
    }
}

/// In-memory [`ClusterApi`] double backed by name-keyed resource maps.
///
/// Created services are returned with an assigned cluster IP, and pods report
/// a running, all-ready status on reads unless a test delays them with
/// [`FakeCluster::hold_pod_pending`].
#[derive(Clone, Debug, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    /// Creates an empty fake cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster IP assigned to subsequently created services.
    #[must_use]
    pub fn with_cluster_ip(self, cluster_ip: &str) -> Self {
        cluster_ip.clone_into(&mut relock(&self.state).cluster_ip);
        self
    }

    /// Makes the pod named `name` report a pending status for the next
    /// `polls` reads before turning ready.
    pub fn hold_pod_pending(&self, name: &str, polls: usize) {
        relock(&self.state)
            .pending_polls
            .insert(name.to_owned(), polls);
    }

    /// Makes the next service read fail with an API error.
    pub fn fail_next_service_get(&self, message: &str) {
        relock(&self.state).service_get_failure = Some(message.to_owned());
    }

    /// Returns how many pods have been created.
    #[must_use]
    pub fn pod_create_count(&self) -> usize {
        relock(&self.state).pod_creates
    }

    /// Returns how many services have been created.
    #[must_use]
    pub fn service_create_count(&self) -> usize {
        relock(&self.state).service_creates
    }

    /// Returns the names of all pods in creation-independent sorted order.
    #[must_use]
    pub fn pod_names(&self) -> Vec<String> {
        relock(&self.state).pods.keys().cloned().collect()
    }

    /// Returns the names of all services in sorted order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        relock(&self.state).services.keys().cloned().collect()
    }

    /// Returns a copy of the stored pod manifest, if present.
    #[must_use]
    pub fn pod(&self, name: &str) -> Option<Pod> {
        relock(&self.state).pods.get(name).cloned()
    }

    /// Returns a copy of the stored service manifest, if present.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<Service> {
        relock(&self.state).services.get(name).cloned()
    }
}

fn manifest_name(name: Option<&String>, kind: ResourceKind) -> Result<String, ClusterError> {
    name.cloned().ok_or_else(|| ClusterError::Api {
        message: format!("{kind} manifest has no name"),
    })
}

fn with_observed_status(pod: Pod, pending: bool) -> Pod {
    let status = if pending {
        PodStatus {
            phase: Some(String::from("Pending")),
            ..PodStatus::default()
        }
    } else {
        PodStatus {
            phase: Some(String::from("Running")),
            container_statuses: Some(vec![ContainerStatus {
                ready: true,
                ..ContainerStatus::default()
            }]),
            ..PodStatus::default()
        }
    };
    Pod {
        status: Some(status),
        ..pod
    }
}

impl ClusterApi for FakeCluster {
    fn create_pod<'a>(&'a self, pod: &'a Pod) -> ClusterFuture<'a, Pod> {
        Box::pin(async move {
            let name = manifest_name(pod.metadata.name.as_ref(), ResourceKind::Pod)?;
            let mut state = relock(&self.state);
            if state.pods.contains_key(&name) {
                return Err(ClusterError::AlreadyExists {
                    kind: ResourceKind::Pod,
                    name,
                });
            }
            state.pod_creates += 1;
            state.pods.insert(name, pod.clone());
            Ok(pod.clone())
        })
    }

    fn get_pod<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Pod> {
        Box::pin(async move {
            let mut state = relock(&self.state);
            let Some(pod) = state.pods.get(name).cloned() else {
                return Err(ClusterError::NotFound {
                    kind: ResourceKind::Pod,
                    name: name.to_owned(),
                });
            };
            let pending = match state.pending_polls.get_mut(name) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            Ok(with_observed_status(pod, pending))
        })
    }

    fn create_service<'a>(&'a self, service: &'a Service) -> ClusterFuture<'a, Service> {
        Box::pin(async move {
            let name = manifest_name(service.metadata.name.as_ref(), ResourceKind::Service)?;
            let mut state = relock(&self.state);
            if state.services.contains_key(&name) {
                return Err(ClusterError::AlreadyExists {
                    kind: ResourceKind::Service,
                    name,
                });
            }
            let mut stored = service.clone();
            if let Some(spec) = stored.spec.as_mut() {
                spec.cluster_ip = Some(state.cluster_ip.clone());
            }
            state.service_creates += 1;
            state.services.insert(name, stored.clone());
            Ok(stored)
        })
    }

    fn get_service<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, Service> {
        Box::pin(async move {
            let mut state = relock(&self.state);
            if let Some(message) = state.service_get_failure.take() {
                return Err(ClusterError::Api { message });
            }
            state
                .services
                .get(name)
                .cloned()
                .ok_or_else(|| ClusterError::NotFound {
                    kind: ResourceKind::Service,
                    name: name.to_owned(),
                })
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Produces a minimal JSON payload matching `kubectl get <kind> -o json`.
#[must_use]
pub fn json_resource_list(names: &[&str]) -> String {
    let items = names
        .iter()
        .map(|name| format!("{{\"metadata\":{{\"name\":\"{name}\"}}}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"items\":[{items}]}}")
}
