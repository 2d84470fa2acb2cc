//! Client configuration loading (`interclust.toml`).

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use interclust_protocol::{Algorithm, FeatureMethod};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ClientError;
use crate::tree::LayoutConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "interclust.toml";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CLIENT_PREFIX: &str = "interclust";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    pub broker: BrokerConfig,
    pub dataset: DatasetConfig,
    pub view: ViewConfig,
    pub layout: LayoutConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerConfig {
    pub host: SmolStr,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub connect_timeout_ms: u64,
    /// MQTT quality of service, 0 to 2.
    pub qos: u8,
    pub client_prefix: SmolStr,
}

impl BrokerConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetConfig {
    /// Dataset path as seen by the engine.
    pub path: Option<String>,
    pub separator: String,
    pub algorithm: Algorithm,
    pub method: FeatureMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewConfig {
    pub panels: usize,
    pub recommend_limit: usize,
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    pub level: SmolStr,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig {
                host: SmolStr::new_static(DEFAULT_HOST),
                port: DEFAULT_PORT,
                keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
                connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
                qos: 0,
                client_prefix: SmolStr::new_static(DEFAULT_CLIENT_PREFIX),
            },
            dataset: DatasetConfig {
                path: None,
                separator: ",".into(),
                algorithm: Algorithm::Pckmeans,
                method: FeatureMethod::Method1,
            },
            view: ViewConfig {
                panels: 1,
                recommend_limit: 1,
                download_dir: PathBuf::from("."),
            },
            layout: LayoutConfig::default(),
            log: LogConfig {
                level: SmolStr::new_static("info"),
            },
        }
    }
}

impl ClientConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ClientError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        Self::parse(&text)
            .map_err(|err| ClientError::InvalidConfig(format!("{}: {err}", path.display()).into()))
    }

    /// Loads `path`, or `interclust.toml` from the working directory when it
    /// exists, or falls back to defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ClientError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        let raw: ClientToml = toml::from_str(text)
            .map_err(|err| ClientError::InvalidConfig(err.to_string().into()))?;
        raw.into_config()
    }

    /// Applies command line broker overrides.
    #[must_use]
    pub fn with_broker(mut self, host: Option<&str>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.broker.host = host.into();
        }
        if let Some(port) = port {
            self.broker.port = port;
        }
        self
    }

    /// Effective configuration rendered back as TOML.
    pub fn to_toml(&self) -> Result<String, ClientError> {
        toml::to_string(self).map_err(|err| ClientError::InvalidConfig(err.to_string().into()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientToml {
    broker: Option<BrokerSection>,
    dataset: Option<DatasetSection>,
    view: Option<ViewSection>,
    layout: Option<LayoutSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Default, Deserialize)]
struct BrokerSection {
    host: Option<String>,
    port: Option<u16>,
    keep_alive_secs: Option<u64>,
    connect_timeout_ms: Option<u64>,
    qos: Option<u8>,
    client_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetSection {
    path: Option<String>,
    separator: Option<String>,
    algorithm: Option<String>,
    method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ViewSection {
    panels: Option<usize>,
    recommend_limit: Option<usize>,
    download_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSection {
    node_width: Option<f64>,
    node_height: Option<f64>,
    dist_top: Option<f64>,
    dist_neighbor: Option<f64>,
    canvas_width: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    level: Option<String>,
}

impl ClientToml {
    fn into_config(self) -> Result<ClientConfig, ClientError> {
        let defaults = ClientConfig::default();
        let broker = self.broker.unwrap_or_default();
        let dataset = self.dataset.unwrap_or_default();
        let view = self.view.unwrap_or_default();
        let layout = self.layout.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        let qos = broker.qos.unwrap_or(defaults.broker.qos);
        if qos > 2 {
            return Err(ClientError::InvalidConfig(
                format!("broker.qos must be 0, 1 or 2 (got {qos})").into(),
            ));
        }
        let connect_timeout_ms = broker
            .connect_timeout_ms
            .unwrap_or(defaults.broker.connect_timeout_ms);
        if connect_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "broker.connect_timeout_ms must be positive".into(),
            ));
        }
        let algorithm = match dataset.algorithm.as_deref() {
            Some(text) => Algorithm::parse(text).ok_or_else(|| {
                ClientError::InvalidConfig(format!("invalid dataset.algorithm '{text}'").into())
            })?,
            None => defaults.dataset.algorithm,
        };
        let method = match dataset.method.as_deref() {
            Some(text) => match FeatureMethod::parse(text) {
                Some(method) if method != FeatureMethod::ModifiedMethod3 => method,
                _ => {
                    return Err(ClientError::InvalidConfig(
                        format!("invalid dataset.method '{text}'").into(),
                    ))
                }
            },
            None => defaults.dataset.method,
        };
        let panels = view.panels.unwrap_or(defaults.view.panels);
        if panels == 0 {
            return Err(ClientError::InvalidConfig(
                "view.panels must be at least 1".into(),
            ));
        }
        let layout = LayoutConfig {
            node_width: layout.node_width.unwrap_or(defaults.layout.node_width),
            node_height: layout.node_height.unwrap_or(defaults.layout.node_height),
            dist_top: layout.dist_top.unwrap_or(defaults.layout.dist_top),
            dist_neighbor: layout.dist_neighbor.unwrap_or(defaults.layout.dist_neighbor),
            canvas_width: layout.canvas_width.unwrap_or(defaults.layout.canvas_width),
        };
        if layout.node_width <= 0.0 || layout.node_height <= 0.0 {
            return Err(ClientError::InvalidConfig(
                "layout node size must be positive".into(),
            ));
        }

        Ok(ClientConfig {
            broker: BrokerConfig {
                host: broker.host.map_or(defaults.broker.host, SmolStr::new),
                port: broker.port.unwrap_or(defaults.broker.port),
                keep_alive_secs: broker
                    .keep_alive_secs
                    .unwrap_or(defaults.broker.keep_alive_secs),
                connect_timeout_ms,
                qos,
                client_prefix: broker
                    .client_prefix
                    .map_or(defaults.broker.client_prefix, SmolStr::new),
            },
            dataset: DatasetConfig {
                path: dataset.path,
                separator: dataset.separator.unwrap_or(defaults.dataset.separator),
                algorithm,
                method,
            },
            view: ViewConfig {
                panels,
                recommend_limit: view
                    .recommend_limit
                    .unwrap_or(defaults.view.recommend_limit),
                download_dir: view
                    .download_dir
                    .map_or(defaults.view.download_dir, PathBuf::from),
            },
            layout,
            log: LogConfig {
                level: log.level.map_or(defaults.log.level, SmolStr::new),
            },
        })
    }
}
