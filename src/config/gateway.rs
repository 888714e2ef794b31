use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};
use thiserror::Error;
use tokio::fs;

use crate::gateway::ListenerSettings;

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_SESSION_COUNT: usize = 2;
pub const DEFAULT_ENDPOINT: &str = "udp";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65_535;
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

// -----------------------------------------------------------------------------
// ----- GatewaySettings -------------------------------------------------------

/// Fully resolved gateway configuration; every default already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub bind_addr: SocketAddr,
    pub session_count: usize,
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub max_datagram_size: usize,
    pub stop_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            session_count: DEFAULT_SESSION_COUNT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl GatewaySettings {
    pub fn listener(&self) -> ListenerSettings {
        ListenerSettings {
            bind_addr: self.bind_addr,
            max_datagram_size: self.max_datagram_size,
            stop_timeout: self.stop_timeout,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewaySettings: Static -----------------------------------------------

impl GatewaySettings {
    pub async fn from_file_async(path: &Path) -> Result<GatewaySettings, GatewayConfigError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| GatewayConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<GatewaySettings, GatewayConfigError> {
        let doc: GatewayFile =
            toml::from_str(raw).map_err(|e| GatewayConfigError::Toml { source: e })?;
        Self::resolve(doc)
    }
}

// -----------------------------------------------------------------------------
// ----- GatewaySettings: Private ----------------------------------------------

impl GatewaySettings {
    fn resolve(doc: GatewayFile) -> Result<GatewaySettings, GatewayConfigError> {
        let defaults = GatewaySettings::default();

        let port = doc.port.unwrap_or(DEFAULT_PORT);

        let ip = match doc.ip_addr.as_deref().map(str::trim) {
            None | Some("") => defaults.bind_addr.ip(),
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|_| GatewayConfigError::InvalidField("IPAddr".into()))?,
        };

        // Unset, zero and negative all mean "use the default".
        let session_count = match doc.server_connections {
            Some(n) if n >= 1 => usize::try_from(n)
                .map_err(|_| GatewayConfigError::InvalidField("ServerConnections".into()))?,
            _ => DEFAULT_SESSION_COUNT,
        };

        let endpoint = match doc.endpoint {
            Some(e) if !e.trim().is_empty() => e,
            _ => defaults.endpoint,
        };

        let reconnect_delay = match doc.reconnect_delay.as_deref() {
            Some(raw) => humantime::parse_duration(raw)
                .map_err(|_| GatewayConfigError::InvalidField("ReconnectDelay".into()))?,
            None => defaults.reconnect_delay,
        };

        let stop_timeout = match doc.stop_timeout.as_deref() {
            Some(raw) => humantime::parse_duration(raw)
                .map_err(|_| GatewayConfigError::InvalidField("StopTimeout".into()))?,
            None => defaults.stop_timeout,
        };

        let max_datagram_size = match doc.max_datagram_size {
            None => defaults.max_datagram_size,
            Some(0) => return Err(GatewayConfigError::InvalidField("MaxDatagramSize".into())),
            Some(n) => n.min(DEFAULT_MAX_DATAGRAM_SIZE),
        };

        Ok(GatewaySettings {
            bind_addr: SocketAddr::new(ip, port),
            session_count,
            endpoint,
            reconnect_delay,
            max_datagram_size,
            stop_timeout,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GatewayFile {
    #[serde(default)]
    port: Option<u16>,

    #[serde(default, rename = "IPAddr")]
    ip_addr: Option<String>,

    #[serde(default)]
    server_connections: Option<i64>,

    #[serde(default)]
    endpoint: Option<String>,

    #[serde(default)]
    reconnect_delay: Option<String>,

    #[serde(default)]
    max_datagram_size: Option<usize>,

    #[serde(default)]
    stop_timeout: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tmp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = GatewaySettings::parse("").unwrap();
        assert_eq!(settings, GatewaySettings::default());
        assert_eq!(settings.bind_addr.to_string(), "0.0.0.0:9999");
        assert_eq!(settings.session_count, 2);
        assert_eq!(settings.endpoint, "udp");
    }

    #[tokio::test]
    async fn reads_every_field_from_disk() {
        let toml = r#"
            Port = 7777
            IPAddr = "127.0.0.1"
            ServerConnections = 5
            Endpoint = "ingest"
            ReconnectDelay = "2s 500ms"
            MaxDatagramSize = 1500
            StopTimeout = "250ms"
        "#;

        let tmp = write_tmp(toml);
        let settings = GatewaySettings::from_file_async(tmp.path()).await.unwrap();

        assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:7777");
        assert_eq!(settings.session_count, 5);
        assert_eq!(settings.endpoint, "ingest");
        assert_eq!(settings.reconnect_delay, Duration::from_millis(2_500));
        assert_eq!(settings.max_datagram_size, 1500);
        assert_eq!(settings.stop_timeout, Duration::from_millis(250));
    }

    #[test]
    fn non_positive_session_count_falls_back() {
        for raw in ["ServerConnections = 0", "ServerConnections = -3"] {
            let settings = GatewaySettings::parse(raw).unwrap();
            assert_eq!(settings.session_count, DEFAULT_SESSION_COUNT, "{raw}");
        }
    }

    #[test]
    fn ipv6_bind_address() {
        let settings = GatewaySettings::parse("IPAddr = \"::1\"\nPort = 0").unwrap();
        assert_eq!(settings.bind_addr.to_string(), "[::1]:0");
    }

    #[test]
    fn rejects_bad_values() {
        for raw in [
            "IPAddr = \"not-an-ip\"",
            "ReconnectDelay = \"soon\"",
            "MaxDatagramSize = 0",
        ] {
            let err = GatewaySettings::parse(raw).unwrap_err();
            assert!(matches!(err, GatewayConfigError::InvalidField(_)), "{raw}");
        }

        let err = GatewaySettings::parse("Port = \"high\"").unwrap_err();
        assert!(matches!(err, GatewayConfigError::Toml { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = GatewaySettings::from_file_async(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayConfigError::Io { .. }));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
