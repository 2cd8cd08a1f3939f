//! Compute abstraction for provisioning SSH-reachable job instances.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use crate::job::{JobSpec, RunSpec};

/// Hardware resources advertised by an instance offer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OfferResources {
    /// Number of virtual CPUs.
    pub cpus: u32,
    /// Memory in mebibytes.
    pub memory_mib: u64,
    /// Whether the capacity is preemptible.
    pub spot: bool,
}

/// Whether an offered instance type can currently be provisioned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceAvailability {
    /// Capacity is available and a launch is expected to succeed.
    Available,
    /// Capacity is known to be exhausted or the type is disabled.
    Unavailable,
}

/// A provisionable instance type with pricing and placement data.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceOffer {
    /// Provider specific name for the instance type.
    pub instance_name: String,
    /// Resources backing the offer.
    pub resources: OfferResources,
    /// Hourly price in currency units. Zero for backends without billing.
    pub price: f64,
    /// Region the offer applies to.
    pub region: String,
    /// Current availability of the offered capacity.
    pub availability: InstanceAvailability,
}

/// Connection parameters for a single SSH hop.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshConnectionParams {
    /// Host name or address accepting SSH connections.
    pub hostname: String,
    /// Login user on the host.
    pub username: String,
    /// TCP port the SSH daemon listens on.
    pub port: u16,
}

/// Key material identifying the project owner.
///
/// The public half seeds new pods' authorized keys; the private half
/// authenticates the one-shot sessions that maintain the jump relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectKeys {
    /// OpenSSH-format public key.
    pub public_key: String,
    /// PEM-encoded private key matching [`Self::public_key`].
    pub private_key: String,
}

/// Result of launching a job instance.
///
/// The instance has no externally routable address; callers must connect
/// through [`Self::ssh_proxy`], which points at the project's jump relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchedInstance {
    /// Identifier for subsequent terminate calls.
    pub instance_id: String,
    /// Cluster-internal address of the instance's SSH service.
    pub ip_address: IpAddr,
    /// Region the instance was placed in.
    pub region: String,
    /// Login user inside the instance.
    pub username: String,
    /// SSH port the instance listens on.
    pub ssh_port: u16,
    /// Mandatory proxy hop through the project's jump relay.
    pub ssh_proxy: SshConnectionParams,
}

/// Scheduler-supplied constraints on acceptable offers.
///
/// Accepted by [`Compute::get_offers`] for interface compatibility; backends
/// without capacity discovery ignore the constraints.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Requirements {
    /// Minimum virtual CPU count.
    pub min_cpus: Option<u32>,
    /// Minimum memory in mebibytes.
    pub min_memory_mib: Option<u64>,
}

/// Future returned by compute operations.
pub type ComputeFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by compute backends on behalf of the scheduler.
pub trait Compute {
    /// Backend specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists instance types the backend can provision right now.
    fn get_offers<'a>(
        &'a self,
        requirements: Option<&'a Requirements>,
    ) -> ComputeFuture<'a, Vec<InstanceOffer>, Self::Error>;

    /// Provisions an instance for `job`, returning connection details routed
    /// through the project's SSH relay.
    fn run_job<'a>(
        &'a self,
        run: &'a RunSpec,
        job: &'a JobSpec,
        offer: &'a InstanceOffer,
        project_keys: &'a ProjectKeys,
    ) -> ComputeFuture<'a, LaunchedInstance, Self::Error>;

    /// Releases the instance's resources.
    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
        region: &'a str,
        backend_data: Option<&'a str>,
    ) -> ComputeFuture<'a, (), Self::Error>;
}
