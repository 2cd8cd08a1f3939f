//! Kubernetes test-run janitor for Mistok.
//!
//! This binary deletes any cluster resources labelled with
//! `mistok.dev/test-run=<MISTOK_TEST_RUN_ID>` and then verifies the set is
//! empty.

use clap::Parser;
use mistok::janitor::{DEFAULT_KUBECTL_BIN, Janitor, JanitorConfig, TEST_RUN_ID_ENV};
use std::io::Write as _;

#[derive(Debug, Parser)]
#[command(
    name = "mistok-janitor",
    about = "Delete Kubernetes test resources for a single test run"
)]
struct Cli {
    /// Namespace used to scope discovery.
    #[arg(long, env = "MISTOK_NAMESPACE", default_value = "default")]
    namespace: String,
    /// Test run id used to compute the label selector
    /// (`mistok.dev/test-run=<id>`).
    #[arg(long, env = TEST_RUN_ID_ENV)]
    test_run_id: String,
    /// Path to the kubectl binary.
    #[arg(long, default_value = DEFAULT_KUBECTL_BIN)]
    kubectl_bin: String,
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();
    let config = JanitorConfig::new(cli.namespace, cli.test_run_id, cli.kubectl_bin)
        .map_err(|err| err.to_string())?;
    let janitor = Janitor::with_process_runner(config);
    let summary = janitor.sweep().map_err(|err| err.to_string())?;
    writeln!(
        std::io::stdout(),
        "janitor sweep complete: deleted_pods={}, deleted_services={}",
        summary.deleted_pods,
        summary.deleted_services
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
