pub mod client;
pub mod models;
pub mod tls;

pub use client::{ApiEndpoint, PveClient, SessionCredentials, VmApi};
pub use models::*;
pub use tls::TlsPolicy;
