//! Binary entry point for the Mistok CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mistok::cluster::KubeClusterApi;
use mistok::compute::{Compute, InstanceAvailability, InstanceOffer, LaunchedInstance, ProjectKeys};
use mistok::config::KubernetesConfig;
use mistok::janitor::TEST_RUN_ID_ENV;
use mistok::job::{JobError, JobSpec, RunSpec};
use mistok::keys::{KeyMaterialError, load_key_material};
use mistok::kubernetes::{KubernetesBackend, KubernetesBackendError};
use mistok::ssh::ProcessCommandRunner;

mod cli;

use cli::{Cli, LaunchCommand, TerminateCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid job request: {0}")]
    Request(#[from] JobError),
    #[error(transparent)]
    Keys(#[from] KeyMaterialError),
    #[error("backend error: {0}")]
    Backend(#[from] KubernetesBackendError),
    #[error("no instance offers available")]
    NoOffers,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Offers => offers_command().await,
        Cli::Launch(args) => launch_command(args).await,
        Cli::Terminate(args) => terminate_command(args).await,
    }
}

/// Builds the real backend from discovered configuration, tagging resources
/// with the ambient test run id when one is set.
async fn connect_backend()
-> Result<KubernetesBackend<KubeClusterApi, ProcessCommandRunner>, CliError> {
    let config =
        KubernetesConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let mut backend = KubernetesBackend::connect(config).await?;
    if let Ok(id) = env::var(TEST_RUN_ID_ENV)
        && !id.trim().is_empty()
    {
        backend = backend.with_test_run_id(id.trim());
    }
    Ok(backend)
}

async fn offers_command() -> Result<(), CliError> {
    let backend = connect_backend().await?;
    let offers = backend.get_offers(None).await?;
    let mut stdout = io::stdout();
    for offer in &offers {
        writeln!(stdout, "{}", render_offer(offer)).ok();
    }
    Ok(())
}

async fn launch_command(args: LaunchCommand) -> Result<(), CliError> {
    let user_key = load_key_material(&args.user_public_key)?;
    let project_public_key = load_key_material(&args.project_public_key)?;
    let project_private_key = load_key_material(&args.project_private_key)?;

    let run = RunSpec::builder()
        .project_name(args.project)
        .run_name(args.run_name)
        .user_public_key(user_key)
        .build()?;
    let job = JobSpec::builder()
        .job_number(args.job_number)
        .image_name(args.image)
        .commands(args.command)
        .build()?;
    let keys = ProjectKeys {
        public_key: project_public_key,
        private_key: project_private_key,
    };

    let backend = connect_backend().await?;
    let offers = backend.get_offers(None).await?;
    let offer = offers.first().ok_or(CliError::NoOffers)?;
    let launched = backend.run_job(&run, &job, offer, &keys).await?;
    print_launched(&launched);
    Ok(())
}

async fn terminate_command(args: TerminateCommand) -> Result<(), CliError> {
    let backend = connect_backend().await?;
    backend
        .terminate_instance(&args.instance_id, &args.region, None)
        .await?;
    writeln!(
        io::stdout(),
        "terminate acknowledged for {}",
        args.instance_id
    )
    .ok();
    Ok(())
}

fn render_offer(offer: &InstanceOffer) -> String {
    let availability = match offer.availability {
        InstanceAvailability::Available => "available",
        InstanceAvailability::Unavailable => "unavailable",
    };
    format!(
        "{} region={} cpus={} memory_mib={} price={:.2} {availability}",
        offer.instance_name,
        offer.region,
        offer.resources.cpus,
        offer.resources.memory_mib,
        offer.price,
    )
}

fn print_launched(launched: &LaunchedInstance) {
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "instance {} at {}:{} (region {})",
        launched.instance_id, launched.ip_address, launched.ssh_port, launched.region
    )
    .ok();
    writeln!(
        stdout,
        "connect via {}@{}:{}",
        launched.ssh_proxy.username, launched.ssh_proxy.hostname, launched.ssh_proxy.port
    )
    .ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
