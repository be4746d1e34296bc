use std::{collections::BTreeMap, path::Path, process::Stdio, time::Duration};

use nag_core::{DeliveryError, ExecContext};
use nag_model::Payload;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, trace};

use crate::error::ExecError;

/// Substitute `{message}`, `{tags}`, `{uniqid}` and `{source}` in one argument.
pub fn render(template: &str, payload: &Payload) -> String {
    template
        .replace("{message}", &payload.message)
        .replace("{tags}", &payload.tags.join(","))
        .replace("{uniqid}", &payload.uniqid)
        .replace("{source}", payload.originated_from.as_deref().unwrap_or(""))
}

pub fn cmd_program(program: &str, args: &[String], payload: &Payload) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|a| render(a, payload)));
    cmd
}

/// Static env, working dir and the `NAG_*` variables describing the payload.
pub fn apply_env(
    cmd: &mut Command,
    env: &BTreeMap<String, String>,
    cwd: Option<&Path>,
    payload: &Payload,
) {
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.env("NAG_MESSAGE", &payload.message);
    cmd.env("NAG_TAGS", payload.tags.join(","));
    cmd.env("NAG_UNIQID", &payload.uniqid);
    if let Some(source) = &payload.originated_from {
        cmd.env("NAG_SOURCE", source);
    }
}

/// Spawn `cmd` and wait for it, killing the child when the execution is cancelled.
///
/// The execution stays busy while the child is alive.
pub async fn run_child(
    mut cmd: Command,
    ctx: &ExecContext,
    backend: &str,
    fail_on_non_zero: bool,
    kill_grace: Duration,
) -> Result<(), DeliveryError> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::inherit());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
    let _busy = ctx.busy_guard();
    if let Some(pid) = child.id() {
        ctx.report_pid(pid);
        trace!(target: "nag.exec.proc", %backend, pid, "spawned");
    }

    let stdout = child.stdout.take();
    let out_backend = backend.to_string();
    let reader = tokio::spawn(async move {
        let Some(stdout) = stdout else { return };
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "nag.exec.proc.out", backend = %out_backend, %line);
        }
    });

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(ExecError::from)?;
            let _ = reader.await;

            if !status.success() && fail_on_non_zero {
                return Err(match status.code() {
                    Some(code) => ExecError::NonZeroExit { code },
                    None => ExecError::KilledBySignal,
                }
                .into());
            }
            debug!(target: "nag.exec.proc", %backend, "exit success");
            Ok(())
        }
        _ = ctx.cancelled() => {
            debug!(target: "nag.exec.proc", %backend, "cancelled; killing child");
            let _ = kill_graceful(&mut child, kill_grace).await;
            reader.abort();
            Err(DeliveryError::Cancelled)
        }
    }
}

/// SIGTERM first, then a hard kill once `grace` runs out.
#[cfg(unix)]
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => {
                if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                    return status.map(|_| ());
                }
            }
            Err(e) => trace!(target: "nag.exec.proc", pid, error = %e, "SIGTERM failed"),
        }
    }
    child.kill().await
}

#[cfg(not(unix))]
pub async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    child.kill().await
}
