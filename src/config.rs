use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};

use crate::clients::broadcaster::DEFAULT_INTERVAL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
    #[error("loading kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),
    #[error("loading in-cluster service account: {0}")]
    InCluster(#[from] InClusterError),
}

/// Where API server credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KubeMode {
    /// Service account mounted into the pod.
    #[default]
    InCluster,
    /// A kubeconfig file, for running outside the cluster.
    Kubeconfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default)]
    pub mode: KubeMode,
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    #[serde(default = "default_stream_interval_secs")]
    pub stream_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_listen_port() -> u16 {
    3000
}

fn default_stream_interval_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./frontend/dist")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            mode: KubeMode::default(),
            kubeconfig: None,
            context: None,
            insecure_skip_tls_verify: false,
            stream_interval_secs: default_stream_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            static_dir: default_static_dir(),
        }
    }
}

impl Config {
    /// Loads the YAML file at `path` (defaults if it does not exist) and
    /// applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = match std::fs::read_to_string(path) {
            Ok(data) => Self::parse(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    fn parse(data: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// `K8S_MODE=dev` switches to the local kubeconfig with TLS verification
    /// off; `KUBECONFIG` points at a specific file.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if env("K8S_MODE").as_deref() == Some("dev") {
            self.mode = KubeMode::Kubeconfig;
            self.insecure_skip_tls_verify = true;
        }

        if let Some(path) = env("KUBECONFIG").filter(|p| !p.is_empty()) {
            self.kubeconfig = Some(PathBuf::from(path));
        } else if self.kubeconfig.is_none() {
            self.kubeconfig = env("HOME")
                .or_else(|| env("USERPROFILE"))
                .map(|home| Path::new(&home).join(".kube").join("config"));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_interval_secs == 0 {
            return Err(ConfigError::Invalid("stream_interval_secs must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// API server connection settings for the selected mode, with the
    /// request timeout and TLS override applied.
    pub async fn kube_config(&self) -> Result<kube::Config, ConfigError> {
        let mut kc = match self.mode {
            KubeMode::InCluster => kube::Config::incluster()?,
            KubeMode::Kubeconfig => {
                let path = self
                    .kubeconfig
                    .as_deref()
                    .ok_or(ConfigError::Invalid("kubeconfig mode needs a kubeconfig path"))?;
                let kubeconfig = Kubeconfig::read_from(path)?;
                let options = KubeConfigOptions {
                    context: self.context.clone(),
                    ..Default::default()
                };
                kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
        };

        if self.insecure_skip_tls_verify {
            kc.accept_invalid_certs = true;
        }
        kc.connect_timeout = Some(self.request_timeout());
        kc.read_timeout = Some(self.request_timeout());
        Ok(kc)
    }
}
