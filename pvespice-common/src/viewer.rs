//! Hand a spice proxy descriptor to the external viewer.
//!
//! The viewer (`remote-viewer` from virt-viewer) is started with `-` and reads
//! a `[virt-viewer]` connection file from its standard input.

use crate::error::{Error, LaunchStep, Result};
use crate::pve::SpiceProxy;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Argument telling the viewer to read its connection file from stdin
pub const STDIN_ARG: &str = "-";

/// Render the `[virt-viewer]` connection file for `proxy`.
///
/// Key order is fixed; the viewer relies on it.
pub fn render_config(proxy: &SpiceProxy) -> String {
    let mut out = String::with_capacity(512 + proxy.ca.len());
    // Writing to a String cannot fail.
    let _ = writeln!(out, "[virt-viewer]");
    let _ = writeln!(out, "tls-port={}", proxy.tls_port);
    let _ = writeln!(out, "delete-this-file={}", proxy.delete_this_file);
    let _ = writeln!(out, "title={}", proxy.title);
    let _ = writeln!(out, "proxy={}", proxy.proxy);
    let _ = writeln!(out, "toggle-fullscreen={}", proxy.toggle_fullscreen);
    let _ = writeln!(out, "type={}", proxy.kind);
    let _ = writeln!(out, "host-subject={}", proxy.host_subject);
    let _ = writeln!(out, "release-cursor={}", proxy.release_cursor);
    let _ = writeln!(out, "password={}", proxy.password);
    let _ = writeln!(out, "secure-attention={}", proxy.secure_attention);
    let _ = writeln!(out, "host={}", proxy.host);
    let _ = writeln!(out, "ca={}", proxy.ca);
    out
}

/// Starts the viewer and feeds it a connection file.
#[derive(Debug, Clone)]
pub struct ViewerLauncher {
    program: PathBuf,
}

impl ViewerLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Start the viewer and stream the connection file for `proxy` to it.
    ///
    /// The configuration is rendered before the process is spawned. The
    /// stdin handle is owned here and dropped (closed) on every return path,
    /// so the viewer sees EOF once the file is written. The returned child is
    /// not waited on; the viewer is expected to outlive the caller.
    #[tracing::instrument(name = "viewer.launch", skip_all, fields(program = %self.program.display()))]
    pub async fn launch(&self, proxy: &SpiceProxy) -> Result<Child> {
        let config = render_config(proxy);

        let mut child = Command::new(&self.program)
            .arg(STDIN_ARG)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| self.error(LaunchStep::Start, source))?;
        debug!(pid = child.id(), "Viewer process spawned");

        let mut stdin = child.stdin.take().ok_or_else(|| {
            self.error(
                LaunchStep::Stdin,
                std::io::Error::other("stdin was not captured"),
            )
        })?;

        stdin
            .write_all(config.as_bytes())
            .await
            .map_err(|source| self.error(LaunchStep::Write, source))?;
        stdin
            .shutdown()
            .await
            .map_err(|source| self.error(LaunchStep::Write, source))?;
        drop(stdin);

        info!("Viewer started");
        Ok(child)
    }

    fn error(&self, step: LaunchStep, source: std::io::Error) -> Error {
        Error::Launch {
            step,
            path: self.program.clone(),
            source,
        }
    }
}
