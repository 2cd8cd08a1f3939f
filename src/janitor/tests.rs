//! Unit tests for the janitor module.

use super::*;
use crate::test_support::{ScriptedRunner, json_resource_list};
use rstest::rstest;

#[rstest]
fn janitor_config_builds_the_label_selector() {
    let cfg = JanitorConfig::new("default", "abc", DEFAULT_KUBECTL_BIN).expect("config should build");
    assert_eq!(cfg.test_run_selector(), "mistok.dev/test-run=abc");
}

#[rstest]
#[case("namespace", " ", "run-1", DEFAULT_KUBECTL_BIN)]
#[case("test_run_id", "default", " ", DEFAULT_KUBECTL_BIN)]
#[case("kubectl_bin", "default", "run-1", "  ")]
fn janitor_config_rejects_blank_fields(
    #[case] expected_field: &str,
    #[case] namespace: &str,
    #[case] test_run_id: &str,
    #[case] kubectl_bin: &str,
) {
    let err = JanitorConfig::new(namespace, test_run_id, kubectl_bin)
        .expect_err("expected invalid config");
    assert_eq!(
        err,
        JanitorError::InvalidConfig {
            field: expected_field.to_owned()
        }
    );
}

#[rstest]
fn sweep_deletes_labelled_pods_then_services() {
    let cfg = JanitorConfig::new("default", "run-1", DEFAULT_KUBECTL_BIN).expect("config");
    let runner = ScriptedRunner::new();

    // list pods (pre)
    runner.push_output(
        Some(0),
        json_resource_list(&["p1-ssh-jump-pod", "job-demo-0"]),
        "",
    );
    // delete both pods
    runner.push_success();
    runner.push_success();
    // list services (pre)
    runner.push_output(Some(0), json_resource_list(&["job-demo-0-service"]), "");
    // delete service
    runner.push_success();
    // list pods (post)
    runner.push_output(Some(0), json_resource_list(&[]), "");
    // list services (post)
    runner.push_output(Some(0), json_resource_list(&[]), "");

    let janitor = Janitor::new(cfg, runner.clone());
    let summary = janitor.sweep().expect("sweep should succeed");
    assert_eq!(
        summary,
        SweepSummary {
            deleted_pods: 2,
            deleted_services: 1
        }
    );

    let invocations = runner.invocations();
    let first = invocations.first().expect("at least one invocation");
    let list_command = first.command_string();
    assert!(
        list_command.contains("-l mistok.dev/test-run=run-1"),
        "list should be label-scoped: {list_command}"
    );
    let delete_calls = invocations
        .iter()
        .filter(|call| {
            call.args
                .iter()
                .any(|arg| arg.to_string_lossy() == "delete")
        })
        .collect::<Vec<_>>();
    assert_eq!(delete_calls.len(), 3, "expected two pod + one service delete");
    let pod_delete = delete_calls.first().expect("first delete").command_string();
    assert_eq!(
        pod_delete,
        "kubectl delete pod p1-ssh-jump-pod -n default --wait=true"
    );
}

#[rstest]
fn sweep_errors_when_labelled_resources_remain() {
    let cfg = JanitorConfig::new("default", "run-1", DEFAULT_KUBECTL_BIN).expect("config");
    let runner = ScriptedRunner::new();

    // list pods (pre): one labelled pod
    runner.push_output(Some(0), json_resource_list(&["job-demo-0"]), "");
    // delete reports success but the pod survives
    runner.push_success();
    // list services (pre)
    runner.push_output(Some(0), json_resource_list(&[]), "");
    // list pods (post): still present
    runner.push_output(Some(0), json_resource_list(&["job-demo-0"]), "");
    // list services (post)
    runner.push_output(Some(0), json_resource_list(&[]), "");

    let janitor = Janitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    let JanitorError::NotClean { message } = err else {
        panic!("expected NotClean, got {err:?}");
    };
    assert!(
        message.contains("pods remaining: 1"),
        "expected remaining pod count, got: {message}"
    );
}

#[rstest]
fn sweep_surfaces_kubectl_command_failures() {
    let cfg = JanitorConfig::new("default", "run-1", DEFAULT_KUBECTL_BIN).expect("config");
    let runner = ScriptedRunner::new();

    runner.push_output(Some(2), "", "permission denied");

    let janitor = Janitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    assert!(matches!(err, JanitorError::CommandFailure { .. }));
}

#[rstest]
#[case("malformed JSON", "not-json", None)]
#[case("missing items field", "{}", Some("missing field"))]
#[case("unexpected JSON shape", "true", Some("invalid type"))]
fn sweep_surfaces_parse_failures(
    #[case] scenario: &str,
    #[case] json_output: &str,
    #[case] expected_message_fragment: Option<&str>,
) {
    let cfg = JanitorConfig::new("default", "run-1", DEFAULT_KUBECTL_BIN).expect("config");
    let runner = ScriptedRunner::new();

    runner.push_output(Some(0), json_output, "");

    let janitor = Janitor::new(cfg, runner);
    let err = janitor
        .sweep()
        .expect_err(&format!("sweep should fail for {scenario}"));

    let JanitorError::Parse { message, .. } = err else {
        panic!("expected Parse error for {scenario}, got {err:?}");
    };
    if let Some(fragment) = expected_message_fragment {
        assert!(
            message.contains(fragment),
            "expected message to contain '{fragment}' for {scenario}, got: {message}"
        );
    }
}

#[rstest]
fn sweep_surfaces_runner_failures() {
    let cfg = JanitorConfig::new("default", "run-1", DEFAULT_KUBECTL_BIN).expect("config");
    let runner = ScriptedRunner::new();

    let janitor = Janitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    assert!(matches!(err, JanitorError::Runner(_)));
}
