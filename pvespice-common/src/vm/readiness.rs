//! Make sure the target VM is running before asking for a display session.
//!
//! A stopped VM gets one start request followed by a fixed wait. The status is
//! not queried again after the wait: a VM that is slow to boot, or that never
//! starts, is only noticed when the spice proxy request fails.

use crate::error::{Error, Result};
use crate::pve::VmApi;
use crate::settings::VmId;
use hyper::Method;
use serde_json::Value;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Status reported by the QEMU monitor for a powered-off VM
pub const STOPPED: &str = "stopped";

/// Number of progress ticks in the post-start wait
pub const START_WAIT_TICKS: u32 = 15;

/// Length of one progress tick
pub const START_WAIT_TICK: Duration = Duration::from_millis(250);

/// Source of delays, replaceable in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Real delays on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// What the readiness check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The VM was not stopped; carries the observed status.
    AlreadyRunning(String),
    /// A start request was issued and the fixed wait elapsed.
    StartIssued,
}

/// Query the VM status and start it when it is stopped.
///
/// Progress for the operator is written to `progress`.
#[tracing::instrument(name = "vm.ensure_running", skip(api, sleeper, progress), fields(vmid = %vmid))]
pub async fn ensure_running<A, S, W>(
    api: &A,
    vmid: VmId,
    sleeper: &S,
    progress: &mut W,
) -> Result<Readiness>
where
    A: VmApi,
    S: Sleeper,
    W: Write,
{
    let body = api
        .call(Method::GET, "/status/current", &[])
        .await
        .map_err(|source| Error::StatusTransport {
            vmid: vmid.get(),
            endpoint: "current",
            source,
        })?;

    let status = parse_qmp_status(&body).map_err(|reason| Error::StatusMissing {
        vmid: vmid.get(),
        reason,
    })?;
    debug!(status = %status, "Current VM status");

    if status != STOPPED {
        return Ok(Readiness::AlreadyRunning(status));
    }

    info!("VM is stopped, requesting start");
    // Progress output is best effort.
    let _ = write!(progress, "VM {vmid} is not running. Attempting to start it");
    let _ = progress.flush();

    // The start response is not inspected.
    api.call(Method::GET, "/status/start", &[])
        .await
        .map_err(|source| Error::StatusTransport {
            vmid: vmid.get(),
            endpoint: "start",
            source,
        })?;

    for _ in 0..START_WAIT_TICKS {
        let _ = write!(progress, ".");
        let _ = progress.flush();
        sleeper.sleep(START_WAIT_TICK).await;
    }
    let _ = writeln!(progress);

    info!("Start wait elapsed; VM status is not re-checked");
    Ok(Readiness::StartIssued)
}

/// Extract `data.qmpstatus` from a status response.
fn parse_qmp_status(body: &[u8]) -> std::result::Result<String, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("malformed response: {e}"))?;

    match value.pointer("/data/qmpstatus") {
        None | Some(Value::Null) => Err("response missing data.qmpstatus".to_string()),
        Some(Value::String(status)) => Ok(status.clone()),
        Some(other) => Ok(other.to_string()),
    }
}
