use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

/// Errors that can occur while loading a topology file
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid topology JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid topology YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Cluster layout produced by host discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub cluster_name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub ip: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// One running service instance on a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: ComponentKind,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub deploy_dir: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub status_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Status {
    #[serde(rename = "success")]
    #[default]
    Success,
    #[serde(rename = "exception")]
    Exception,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Tidb,
    Tikv,
    Pd,
    Prometheus,
    Alertmanager,
    Grafana,
    NodeExporter,
    BlackboxExporter,
    Pushgateway,
    #[serde(other)]
    Unknown,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Tidb => "tidb",
            ComponentKind::Tikv => "tikv",
            ComponentKind::Pd => "pd",
            ComponentKind::Prometheus => "prometheus",
            ComponentKind::Alertmanager => "alertmanager",
            ComponentKind::Grafana => "grafana",
            ComponentKind::NodeExporter => "node_exporter",
            ComponentKind::BlackboxExporter => "blackbox_exporter",
            ComponentKind::Pushgateway => "pushgateway",
            ComponentKind::Unknown => "unknown",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tidb" => Some(ComponentKind::Tidb),
            "tikv" => Some(ComponentKind::Tikv),
            "pd" => Some(ComponentKind::Pd),
            "prometheus" => Some(ComponentKind::Prometheus),
            "alertmanager" => Some(ComponentKind::Alertmanager),
            "grafana" => Some(ComponentKind::Grafana),
            "node_exporter" => Some(ComponentKind::NodeExporter),
            "blackbox_exporter" => Some(ComponentKind::BlackboxExporter),
            "pushgateway" => Some(ComponentKind::Pushgateway),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Component {
    /// Port serving the HTTP status/pprof API. TiDB exposes it on its
    /// status port, every other service on its main port.
    pub fn status_addr_port(&self) -> Option<u16> {
        match self.name {
            ComponentKind::Tidb => self.status_port.or(self.port),
            _ => self.port.or(self.status_port),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == Status::Success
    }
}

impl Topology {
    /// Load a topology from a JSON or YAML file, chosen by extension
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        info!("Loading topology from {}", path.display());
        let content = fs::read_to_string(path)?;

        let topology: Topology = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        info!(
            "Cluster '{}' with {} hosts, {} components",
            topology.cluster_name,
            topology.hosts.len(),
            topology.hosts.iter().map(|h| h.components.len()).sum::<usize>()
        );
        Ok(topology)
    }
}
