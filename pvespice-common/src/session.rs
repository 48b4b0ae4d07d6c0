use crate::error::Result;
use crate::pve::{ApiEndpoint, PveClient, SessionCredentials, TlsPolicy};
use crate::settings::{Settings, VmId};
use crate::spice::fetch_descriptor;
use crate::viewer::ViewerLauncher;
use crate::vm::{ensure_running, Readiness, Sleeper};
use std::io::Write;
use tokio::process::Child;
use tracing::info;

/// How to reach the management API
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub endpoint: ApiEndpoint,
    pub tls: TlsPolicy,
}

impl ConnectOptions {
    /// HTTPS on `port` of the settings host
    pub fn for_host(host: &str, port: u16, tls: TlsPolicy) -> Self {
        Self {
            endpoint: ApiEndpoint::https(host, port),
            tls,
        }
    }
}

/// A viewer that has been started and handed its connection file
#[derive(Debug)]
pub struct LaunchedViewer {
    pub readiness: Readiness,
    pub child: Child,
}

/// Run the whole bootstrap: login, readiness, descriptor, viewer.
///
/// Stages run strictly in order and the first failure is returned as is.
#[tracing::instrument(
    name = "session.bootstrap",
    skip_all,
    fields(node = %settings.node, host = %settings.host, vmid = %vmid)
)]
pub async fn bootstrap<S, W>(
    settings: &Settings,
    vmid: VmId,
    options: ConnectOptions,
    sleeper: &S,
    progress: &mut W,
) -> Result<LaunchedViewer>
where
    S: Sleeper,
    W: Write,
{
    let credentials = SessionCredentials::new(
        settings.host.as_str(),
        settings.username.as_str(),
        settings.secret.as_str(),
    );
    let mut client = PveClient::new(
        options.endpoint,
        credentials,
        settings.node.as_str(),
        vmid,
        &options.tls,
    )?;

    client.authenticate().await?;

    let readiness = ensure_running(&client, vmid, sleeper, progress).await?;
    info!(?readiness, "VM ready");

    let descriptor = fetch_descriptor(&client, &settings.host).await?;

    let child = ViewerLauncher::new(&settings.viewer_path)
        .launch(&descriptor)
        .await?;

    Ok(LaunchedViewer { readiness, child })
}
