//! Bootstrap scripts for SSH-serving pods.
//!
//! Every managed pod starts the same way: harden and launch an OpenSSH
//! daemon seeded with the supplied authorized keys, then either block
//! forever (jump relay) or hand over to the job's own startup commands.

use std::borrow::Cow;

use shell_escape::unix::escape;

/// Final command for pods that have no workload of their own.
const BLOCK_FOREVER: &str = "sleep infinity";

/// Commands that configure and start the SSH daemon on `ssh_port`.
///
/// Password logins are disabled before the daemon ever starts; host keys are
/// regenerated so relaunched pods never reuse a baked-in identity.
fn sshd_commands(authorized_keys: &[String], ssh_port: u16) -> Vec<String> {
    let keys_content = authorized_keys
        .iter()
        .map(|key| key.trim())
        .filter(|key| !key.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    vec![
        r#"sed -i "s/.*PasswordAuthentication.*/PasswordAuthentication no/g" /etc/ssh/sshd_config"#
            .to_owned(),
        "mkdir -p /run/sshd ~/.ssh".to_owned(),
        "chmod 700 ~/.ssh".to_owned(),
        format!(
            "echo {} > ~/.ssh/authorized_keys",
            escape(Cow::from(keys_content))
        ),
        "chmod 600 ~/.ssh/authorized_keys".to_owned(),
        "rm -rf /etc/ssh/ssh_host_*".to_owned(),
        "ssh-keygen -A > /dev/null".to_owned(),
        format!("/usr/sbin/sshd -p {ssh_port} -o PermitUserEnvironment=yes"),
    ]
}

/// Builds the single shell command a pod runs at startup.
///
/// The daemon setup runs first; `startup_commands` follow once SSH is
/// serving, and an empty list falls back to blocking forever. Commands are
/// chained with `&&` under `/bin/sh -c`, so any failing step halts the pod.
pub(crate) fn bootstrap_script(
    authorized_keys: &[String],
    ssh_port: u16,
    startup_commands: &[String],
) -> String {
    let mut commands = sshd_commands(authorized_keys, ssh_port);
    if startup_commands.is_empty() {
        commands.push(BLOCK_FOREVER.to_owned());
    } else {
        commands.extend(startup_commands.iter().cloned());
    }
    commands.join(" && ")
}

/// Remote conditional that appends `public_key` to the authorized keys only
/// when it is not already present.
///
/// Runs on an already-bootstrapped pod over SSH; the file is guaranteed to
/// exist because the bootstrap script created it.
pub(crate) fn authorize_key_command(public_key: &str) -> String {
    let key = escape(Cow::from(public_key.trim()));
    format!(
        "if ! grep -qF {key} ~/.ssh/authorized_keys; then echo {key} >> ~/.ssh/authorized_keys; fi"
    )
}
