//! Error taxonomy for the session bootstrap.
//!
//! Every variant is fatal: the binary reports it once, prefixed with the
//! stage label from [`Error::stage`], and exits with status 1. Messages are
//! lowercase and carry the identifier (path, VM ID, field) when one exists.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using pvespice's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a bootstrap failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing CLI argument, settings file or TLS material.
    Configuration,
    /// Credential exchange rejected or malformed.
    Auth,
    /// VM status could not be determined.
    StatusQuery,
    /// Spice proxy descriptor missing or malformed.
    Decode,
    /// Viewer process or its input stream failed.
    Launch,
}

/// Step of the viewer launch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStep {
    /// Spawning the viewer process.
    Start,
    /// Taking the viewer's standard input.
    Stdin,
    /// Writing the configuration to the viewer.
    Write,
}

impl std::fmt::Display for LaunchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchStep::Start => write!(f, "start"),
            LaunchStep::Stdin => write!(f, "stdin"),
            LaunchStep::Write => write!(f, "write"),
        }
    }
}

/// Errors that can occur while bootstrapping a viewer session.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid command line input.
    #[error("{0}")]
    InvalidArgument(String),

    /// The settings file could not be read.
    #[error("settings file read failed: {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is missing a required line.
    #[error("settings file incomplete: {path}: missing {field} (line {line})")]
    SettingsIncomplete {
        path: PathBuf,
        field: &'static str,
        line: usize,
    },

    /// TLS trust material could not be loaded.
    #[error("tls setup failed: {0:#}")]
    Tls(anyhow::Error),

    /// Credential exchange failed.
    #[error("could not authenticate: {0}")]
    Auth(String),

    /// Credential exchange failed at the transport level.
    #[error("could not authenticate: {0:#}")]
    AuthTransport(anyhow::Error),

    /// The status response did not carry the expected field.
    #[error("could not get current status of {vmid}: {reason}")]
    StatusMissing { vmid: u32, reason: String },

    /// A status or start request failed at the transport level.
    #[error("{endpoint} request for {vmid} failed: {source:#}")]
    StatusTransport {
        vmid: u32,
        endpoint: &'static str,
        source: anyhow::Error,
    },

    /// The spice proxy descriptor could not be decoded.
    #[error("spice proxy descriptor decode failed: {0}")]
    Decode(String),

    /// The spiceproxy request failed at the transport level.
    #[error("spiceproxy request failed: {0:#}")]
    DecodeTransport(anyhow::Error),

    /// The viewer process could not be started or fed.
    #[error("viewer {step} failed: {path}: {source}")]
    Launch {
        step: LaunchStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_)
            | Error::SettingsRead { .. }
            | Error::SettingsIncomplete { .. }
            | Error::Tls(_) => ErrorKind::Configuration,
            Error::Auth(_) | Error::AuthTransport(_) => ErrorKind::Auth,
            Error::StatusMissing { .. } | Error::StatusTransport { .. } => ErrorKind::StatusQuery,
            Error::Decode(_) | Error::DecodeTransport(_) => ErrorKind::Decode,
            Error::Launch { .. } => ErrorKind::Launch,
        }
    }

    /// Label identifying the failing stage in the one-line diagnostic.
    pub fn stage(&self) -> String {
        match self {
            Error::InvalidArgument(_) => "init".to_string(),
            Error::SettingsRead { .. } | Error::SettingsIncomplete { .. } => {
                "readFile".to_string()
            }
            Error::Tls(_) => "tls".to_string(),
            Error::Auth(_) | Error::AuthTransport(_) => "auth".to_string(),
            Error::StatusMissing { .. } => "status".to_string(),
            Error::StatusTransport { endpoint, .. } => format!("status.{endpoint}"),
            Error::Decode(_) | Error::DecodeTransport(_) => "spice".to_string(),
            Error::Launch { step, .. } => format!("viewer.{step}"),
        }
    }
}
