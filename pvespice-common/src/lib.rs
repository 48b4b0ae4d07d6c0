pub mod error;
pub mod pve;
pub mod session;
pub mod settings;
pub mod spice;
pub mod viewer;
pub mod vm;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use session::{bootstrap, ConnectOptions, LaunchedViewer};
pub use settings::{Settings, VmId};
