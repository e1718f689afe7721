//! `rebootmgrctl` commands.
//!
//! Each command performs at most one protocol call, writes its report to
//! `out` and returns the process exit code. Errors are returned to the caller,
//! which prints them and exits with 1.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use rebootmgr_config::{Codec, RebootMethod, SystemdCalendar, format_duration};
use rebootmgr_core::ipc::RebootReply;
use rebootmgr_core::{IpcClient, RebootOutcome};

use crate::args::{Command, When};

/// Process exit code for the outcome of [`run`]. Errors are printed to `err`
/// and map to 1.
pub fn exit_code(result: Result<u8>, err: &mut impl Write) -> u8 {
    match result {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(err, "Error: {e:#}");
            1
        }
    }
}

/// Run one command against the daemon behind `client`.
pub async fn run(client: &IpcClient, command: &Command, out: &mut impl Write) -> Result<u8> {
    debug!(?command, socket = %client.socket_path().display(), "Running command");

    match command {
        Command::Reboot { when } => reboot(client, RebootMethod::Hard, *when, out).await,
        Command::SoftReboot { when } => reboot(client, RebootMethod::Soft, *when, out).await,
        Command::Cancel => cancel(client, out).await,
        Command::Status { quiet, full } => status(client, *quiet, *full, out).await,
        Command::IsActive { quiet } => is_active(client, *quiet, out).await,
        Command::SetStrategy { strategy } => set_strategy(client, strategy, out).await,
        Command::GetStrategy => get_strategy(client, out).await,
        Command::SetWindow { start, duration } => set_window(client, start, duration, out).await,
        Command::GetWindow => get_window(client, out).await,
    }
}

fn method_label(method: RebootMethod) -> &'static str {
    match method {
        RebootMethod::Soft => "Soft-reboot",
        _ => "Reboot",
    }
}

fn describe_pending(reply: &RebootReply) -> String {
    match &reply.scheduled {
        Some(at) => format!("{} scheduled for {at}", method_label(reply.method)),
        None => format!("{} scheduled", method_label(reply.method)),
    }
}

async fn reboot(
    client: &IpcClient,
    method: RebootMethod,
    when: Option<When>,
    out: &mut impl Write,
) -> Result<u8> {
    let force = when == Some(When::Now);
    match client.reboot(method, force).await? {
        RebootOutcome::Scheduled(reply) => {
            writeln!(out, "{}", describe_pending(&reply))?;
        }
        RebootOutcome::AlreadyScheduled(Some(existing)) => {
            writeln!(
                out,
                "A reboot is already scheduled ({}), request ignored",
                describe_pending(&existing)
            )?;
        }
        RebootOutcome::AlreadyScheduled(None) => {
            writeln!(out, "A reboot is already scheduled, request ignored")?;
        }
    }
    Ok(0)
}

async fn cancel(client: &IpcClient, out: &mut impl Write) -> Result<u8> {
    if client.cancel().await? {
        writeln!(out, "Reboot cancelled")?;
    } else {
        writeln!(out, "No reboot was requested")?;
    }
    Ok(0)
}

async fn status(client: &IpcClient, quiet: bool, full: bool, out: &mut impl Write) -> Result<u8> {
    if full {
        let reply = client.full_status().await?;
        writeln!(out, "Status: {}", reply.describe())?;
        if let Some(at) = &reply.reboot_time {
            writeln!(out, "Reboot time: {at}")?;
        }
        writeln!(out, "Strategy: {}", reply.reboot_strategy.as_str())?;
        write_window(
            out,
            &reply.maintenance_window_start,
            reply.maintenance_window_duration,
        )?;
        return Ok(0);
    }

    let reply = client.status().await?;
    if quiet {
        return Ok(reply.reboot_status.code());
    }
    writeln!(out, "Status: {}", reply.describe())?;
    if let Some(at) = &reply.reboot_time {
        writeln!(out, "Reboot time: {at}")?;
    }
    Ok(0)
}

async fn is_active(client: &IpcClient, quiet: bool, out: &mut impl Write) -> Result<u8> {
    match client.status().await {
        Ok(_) => {
            if !quiet {
                writeln!(out, "rebootmgrd is active")?;
            }
            Ok(0)
        }
        Err(e) => {
            debug!(error = %e, "Daemon did not answer");
            if !quiet {
                writeln!(out, "rebootmgrd is not running")?;
            }
            Ok(1)
        }
    }
}

async fn set_strategy(client: &IpcClient, name: &str, out: &mut impl Write) -> Result<u8> {
    let strategy = client.set_strategy(name).await?;
    writeln!(out, "Reboot strategy set to {}", strategy.as_str())?;
    Ok(0)
}

async fn get_strategy(client: &IpcClient, out: &mut impl Write) -> Result<u8> {
    let reply = client.full_status().await?;
    writeln!(out, "Reboot strategy: {}", reply.reboot_strategy.as_str())?;
    Ok(0)
}

async fn set_window(
    client: &IpcClient,
    start: &str,
    duration: &str,
    out: &mut impl Write,
) -> Result<u8> {
    let params = client.set_window(start, duration, &SystemdCalendar).await?;
    if params.start.is_empty() {
        writeln!(out, "Maintenance window cleared")?;
    } else {
        writeln!(
            out,
            "Maintenance window set to {}, lasting {}",
            params.start,
            format_duration(Duration::from_secs(params.duration))
        )?;
    }
    Ok(0)
}

async fn get_window(client: &IpcClient, out: &mut impl Write) -> Result<u8> {
    let reply = client.full_status().await?;
    write_window(
        out,
        &reply.maintenance_window_start,
        reply.maintenance_window_duration,
    )?;
    Ok(0)
}

fn write_window(out: &mut impl Write, start: &str, secs: u64) -> std::io::Result<()> {
    if start.is_empty() {
        writeln!(out, "No maintenance window")
    } else {
        writeln!(
            out,
            "Maintenance window: {start}, lasting {}",
            format_duration(Duration::from_secs(secs))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rebootmgr_core::ipc::{error_id, method};
    use rebootmgr_test_utils::daemon::TestDaemon;
    use rebootmgr_test_utils::layers::{ConfigTree, Root};
    use rebootmgr_test_utils::stub::StubDaemon;
    use serde_json::json;

    async fn exec(client: &IpcClient, command: Command) -> (Result<u8>, String) {
        let mut out = Vec::new();
        let code = run(client, &command, &mut out).await;
        (code, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_reboot_already_in_progress_is_informational() {
        let stub = StubDaemon::start([(
            method::REBOOT,
            json!({
                "error": error_id::ALREADY_IN_PROGRESS,
                "parameters": {"Method": 1, "Scheduled": "Sat 04:00"},
            }),
        )])
        .await;

        let (code, out) = exec(&stub.client(), Command::Reboot { when: None }).await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(
            out,
            "A reboot is already scheduled (Soft-reboot scheduled for Sat 04:00), request ignored\n"
        );
    }

    #[tokio::test]
    async fn test_reboot_other_error_fails() {
        rebootmgr_test_utils::tracing_setup::init_test_tracing();
        let stub = StubDaemon::start([(
            method::REBOOT,
            json!({"error": error_id::INVALID_PARAMETER}),
        )])
        .await;

        let (code, _) = exec(&stub.client(), Command::Reboot { when: None }).await;
        let err = code.unwrap_err();
        assert!(err.to_string().contains("InvalidParameter"));
    }

    #[tokio::test]
    async fn test_full_status_missing_strategy_fails() {
        let stub = StubDaemon::start([(
            method::FULL_STATUS,
            json!({"parameters": {
                "RebootStatus": 0,
                "MaintenanceWindowStart": "",
                "MaintenanceWindowDuration": 0,
            }}),
        )])
        .await;

        let (code, out) = exec(
            &stub.client(),
            Command::Status {
                quiet: false,
                full: true,
            },
        )
        .await;
        assert_eq!(out, "");

        let mut stderr = Vec::new();
        assert_eq!(exit_code(code, &mut stderr), 1);
        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.starts_with("Error: "), "{stderr}");
        assert!(stderr.contains("RebootStrategy"), "{stderr}");
    }

    #[test]
    fn test_exit_code_passes_through_success() {
        let mut stderr = Vec::new();
        assert_eq!(exit_code(Ok(2), &mut stderr), 2);
        assert!(stderr.is_empty());
    }

    #[tokio::test]
    async fn test_set_window_without_start_is_rejected_locally() {
        let stub = StubDaemon::start([(method::SET_WINDOW, json!({"parameters": {}}))]).await;

        let (code, _) = exec(
            &stub.client(),
            Command::SetWindow {
                start: String::new(),
                duration: "1h".to_string(),
            },
        )
        .await;
        assert!(code.is_err());
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_strategy_rejects_unknown_name_locally() {
        let stub = StubDaemon::start([(method::SET_STRATEGY, json!({"parameters": {}}))]).await;

        let (code, _) = exec(
            &stub.client(),
            Command::SetStrategy {
                strategy: "sometimes".to_string(),
            },
        )
        .await;
        assert!(code.is_err());
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_strategy_sends_integer() {
        let stub = StubDaemon::start([(method::SET_STRATEGY, json!({"parameters": {}}))]).await;

        let (code, out) = exec(
            &stub.client(),
            Command::SetStrategy {
                strategy: "maint_window".to_string(),
            },
        )
        .await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(out, "Reboot strategy set to maint-window\n");
        assert_eq!(stub.last_parameters(), Some(json!({"Strategy": 2})));
    }

    #[tokio::test]
    async fn test_status_quiet_exit_code() {
        let stub = StubDaemon::start([(
            method::STATUS,
            json!({"parameters": {"RebootStatus": 2, "RequestedMethod": 0}}),
        )])
        .await;

        let (code, out) = exec(
            &stub.client(),
            Command::Status {
                quiet: true,
                full: false,
            },
        )
        .await;
        assert_eq!(code.unwrap(), 2);
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_is_active_without_daemon() {
        let client = IpcClient::new("/tmp/rebootmgr-test-absent.sock");
        let (code, out) = exec(&client, Command::IsActive { quiet: false }).await;
        assert_eq!(code.unwrap(), 1);
        assert_eq!(out, "rebootmgrd is not running\n");

        let (code, out) = exec(&client, Command::IsActive { quiet: true }).await;
        assert_eq!(code.unwrap(), 1);
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_status_against_unconfigured_daemon() {
        let daemon = TestDaemon::start().await;

        let (code, out) = exec(
            &daemon.client(),
            Command::Status {
                quiet: false,
                full: true,
            },
        )
        .await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(
            out,
            "Status: Reboot not requested\nStrategy: best-effort\nNo maintenance window\n"
        );

        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_dropin_overrides_vendor_strategy() {
        let tree = ConfigTree::new();
        tree.write_pairs(Root::Vendor, &[("strategy", "instantly")]);
        tree.write_dropin(Root::Admin, "60-local.conf", "[rebootmgr]\nstrategy=off\n");
        let daemon = TestDaemon::start_with(tree).await;

        let (code, out) = exec(&daemon.client(), Command::GetStrategy).await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(out, "Reboot strategy: off\n");

        daemon.stop().await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_session_against_real_daemon() {
        let tree = ConfigTree::new();
        tree.write_pairs(Root::Vendor, &[("strategy", "instantly")]);
        let daemon = TestDaemon::start_with(tree).await;
        let client = daemon.client();

        let (code, out) = exec(&client, Command::IsActive { quiet: false }).await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(out, "rebootmgrd is active\n");

        let (_, out) = exec(&client, Command::GetStrategy).await;
        assert_eq!(out, "Reboot strategy: instantly\n");

        let (_, out) = exec(&client, Command::GetWindow).await;
        assert_eq!(out, "No maintenance window\n");

        let (code, out) = exec(
            &client,
            Command::SetWindow {
                start: "Sat 04:00".to_string(),
                duration: "1h30m".to_string(),
            },
        )
        .await;
        assert_eq!(code.unwrap(), 0);
        assert_eq!(out, "Maintenance window set to Sat 04:00, lasting 01h30m\n");

        let (_, out) = exec(&client, Command::GetWindow).await;
        assert_eq!(out, "Maintenance window: Sat 04:00, lasting 01h30m\n");

        let (code, out) = exec(&client, Command::SoftReboot { when: Some(When::Now) }).await;
        assert_eq!(code.unwrap(), 0);
        assert!(out.starts_with("Soft-reboot scheduled for "), "{out}");

        let (code, _) = exec(
            &client,
            Command::Status {
                quiet: true,
                full: false,
            },
        )
        .await;
        assert_eq!(code.unwrap(), 1);

        let (_, out) = exec(
            &client,
            Command::Status {
                quiet: false,
                full: true,
            },
        )
        .await;
        assert!(out.starts_with("Status: Soft-reboot requested\n"), "{out}");
        assert!(out.contains("Strategy: instantly\n"));

        let (_, out) = exec(&client, Command::Cancel).await;
        assert_eq!(out, "Reboot cancelled\n");
        let (_, out) = exec(&client, Command::Cancel).await;
        assert_eq!(out, "No reboot was requested\n");

        let override_file = daemon
            .tree
            .override_dir()
            .join("50-maintenance-window.conf");
        assert!(override_file.exists());

        daemon.stop().await.unwrap();
    }
}
