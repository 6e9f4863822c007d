//! Bus connection settings resolved from defaults, configuration, and
//! command-line overrides.

use serde::Serialize;
use tracing::{debug, warn};

use crate::entry::EntryKind;
use crate::traits::ConfigSource;

/// Port the daemon listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 14452;

/// Configuration key holding the port.
pub const PORT_KEY: &str = "port";
/// Configuration key holding the host.
pub const HOST_KEY: &str = "host";

/// Which side of the bus the settings are for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends to and subscribes on a running daemon.
    Client,
    /// Binds the request and publish sockets.
    Daemon,
}

impl Role {
    pub fn default_host(self) -> &'static str {
        match self {
            Self::Client => "openblox.org",
            Self::Daemon => "*",
        }
    }

    /// File loaded when no `--config` is given.
    pub fn default_config_file(self) -> &'static str {
        match self {
            Self::Client => "obus.conf",
            Self::Daemon => "obusd.conf",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Daemon => write!(f, "daemon"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BusSettings {
    pub role: Role,
    pub host: String,
    pub port: u16,
}

impl BusSettings {
    pub fn defaults(role: Role) -> Self {
        Self {
            role,
            host: role.default_host().to_owned(),
            port: DEFAULT_PORT,
        }
    }

    /// Resolve settings: built-in defaults, then configuration, then
    /// explicit overrides.
    pub fn resolve(
        role: Role,
        source: &dyn ConfigSource,
        host: Option<String>,
        port: Option<u16>,
    ) -> Self {
        let mut settings = Self::defaults(role);
        settings.apply_config(source);
        settings.apply_overrides(host, port);
        settings
    }

    /// Take `port` and `host` from the configuration when they have a usable
    /// type and value. Anything else is logged and skipped.
    pub fn apply_config(&mut self, source: &dyn ConfigSource) {
        if let Some(entry) = source.get(PORT_KEY) {
            match entry.as_integer().map(u16::try_from) {
                Some(Ok(port)) => self.port = port,
                Some(Err(_)) => {
                    warn!(value = %entry.entry(), "configured port is out of range, ignoring")
                }
                None => warn!(
                    expected = %EntryKind::Integer,
                    found = %entry.kind(),
                    "configured port has the wrong type, ignoring"
                ),
            }
            source.release(entry);
        }

        if let Some(entry) = source.get(HOST_KEY) {
            match entry.as_str() {
                Some(host) if !host.is_empty() => self.host = host.to_owned(),
                Some(_) => {}
                None if entry.kind() == EntryKind::String => {
                    warn!("configured host is not valid UTF-8, ignoring")
                }
                None => warn!(
                    expected = %EntryKind::String,
                    found = %entry.kind(),
                    "configured host has the wrong type, ignoring"
                ),
            }
            source.release(entry);
        }
        debug!(host = %self.host, port = self.port, "applied configuration");
    }

    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }

    /// Endpoint of the request socket: bound by the daemon, connected to by
    /// senders.
    pub fn request_endpoint(&self) -> String {
        endpoint(&self.host, self.port)
    }

    /// Endpoint of the publish socket, one port above the request socket.
    /// `None` when the request port is the highest port.
    pub fn publish_endpoint(&self) -> Option<String> {
        self.port
            .checked_add(1)
            .map(|port| endpoint(&self.host, port))
    }
}

fn endpoint(host: &str, port: u16) -> String {
    format!("tcp://{host}:{port}")
}
