use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the settings file looked up next to the executable.
pub const SETTINGS_FILE_NAME: &str = ".pve";

/// Smallest VM ID the cluster hands out.
pub const MIN_VMID: i64 = 100;

/// Validated QEMU VM identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmId(u32);

impl VmId {
    /// Parse and validate a VM ID taken from the command line.
    ///
    /// Non-integers and anything below 100 (including the -1 sentinel)
    /// are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let id: i64 = raw
            .parse()
            .map_err(|_| Error::InvalidArgument("vm id must be an integer".to_string()))?;

        if id == -1 || id < MIN_VMID {
            return Err(Error::InvalidArgument(format!("invalid vmid: {id}")));
        }

        let id = u32::try_from(id)
            .map_err(|_| Error::InvalidArgument(format!("invalid vmid: {id}")))?;
        Ok(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local settings: cluster coordinates, login and viewer location.
#[derive(Clone)]
pub struct Settings {
    /// Cluster node hosting the VM
    pub node: String,
    /// Management API host, also sent as the spice proxy
    pub host: String,
    /// Login name, including the realm (e.g. `root@pam`)
    pub username: String,
    /// Login secret
    pub secret: String,
    /// Viewer executable (usually `remote-viewer`)
    pub viewer_path: PathBuf,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("node", &self.node)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("viewer_path", &self.viewer_path)
            .finish()
    }
}

impl Settings {
    /// Default settings location: `.pve` beside the running executable.
    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().map_err(|source| Error::SettingsRead {
            path: PathBuf::from(SETTINGS_FILE_NAME),
            source,
        })?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(SETTINGS_FILE_NAME))
    }

    /// Read the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Parse settings text. `path` is only used for error messages.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let mut lines = contents.lines().map(|l| l.trim_end_matches('\r'));
        let mut line = 0;
        let mut next = |field: &'static str| {
            line += 1;
            lines
                .next()
                .map(str::to_string)
                .ok_or_else(|| Error::SettingsIncomplete {
                    path: path.to_path_buf(),
                    field,
                    line,
                })
        };

        Ok(Self {
            node: next("node")?,
            host: next("host")?,
            username: next("username")?,
            secret: next("secret")?,
            viewer_path: PathBuf::from(next("viewer path")?),
        })
    }
}
