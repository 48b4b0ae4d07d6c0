mod telemetry;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{ArgAction, Parser};
use pvespice_common::pve::{ApiEndpoint, TlsPolicy};
use pvespice_common::vm::TokioSleeper;
use pvespice_common::{bootstrap, ConnectOptions, Error, Settings, VmId};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pvespice")]
#[command(version)]
#[command(about = "Open a SPICE console to a cluster VM in remote-viewer", long_about = None)]
struct Cli {
    /// VM ID (100 or greater)
    #[arg(allow_negative_numbers = true)]
    vmid: String,

    /// Settings file (default: .pve next to the executable)
    #[arg(long, env = "PVESPICE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Management API port
    #[arg(long, env = "PVESPICE_PORT", default_value_t = ApiEndpoint::DEFAULT_PORT)]
    port: u16,

    /// Verify the API certificate against this PEM CA bundle
    #[arg(long, value_name = "PATH", conflicts_with = "verify_tls")]
    ca_file: Option<PathBuf>,

    /// Verify the API certificate against the bundled public roots
    #[arg(long)]
    verify_tls: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn tls_policy(&self) -> TlsPolicy {
        match (&self.ca_file, self.verify_tls) {
            (Some(path), _) => TlsPolicy::CustomCa(path.clone()),
            (None, true) => TlsPolicy::WebPki,
            (None, false) => TlsPolicy::AcceptInvalidCerts,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return report(&usage_error(&e)),
    };

    telemetry::init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run(cli: Cli) -> pvespice_common::Result<()> {
    let vmid = VmId::parse(&cli.vmid)?;

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&settings_path)?;
    info!(path = %settings_path.display(), node = %settings.node, "Settings loaded");

    let options = ConnectOptions::for_host(&settings.host, cli.port, cli.tls_policy());
    let launched = bootstrap(
        &settings,
        vmid,
        options,
        &TokioSleeper,
        &mut std::io::stdout(),
    )
    .await?;

    info!(pid = launched.child.id(), "Viewer launched");
    Ok(())
}

/// Print the one-line diagnostic and map to the failure exit code.
fn report(err: &Error) -> ExitCode {
    println!("error({}): {}", err.stage(), err);
    ExitCode::FAILURE
}

fn usage_error(err: &clap::Error) -> Error {
    if err.kind() == ClapErrorKind::MissingRequiredArgument {
        return Error::InvalidArgument("you must supply a VM ID".to_string());
    }

    let rendered = err.render().to_string();
    let first_line = rendered.lines().next().unwrap_or_default();
    Error::InvalidArgument(
        first_line
            .trim_start_matches("error: ")
            .trim()
            .to_string(),
    )
}
