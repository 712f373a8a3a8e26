//! Application configuration.
//!
//! Settings come from an optional `verdict.toml` file merged with
//! `VERDICT__`-prefixed environment variables (e.g.
//! `VERDICT__SERVER__PORT=9090`, `VERDICT__POLICY__EXTERNAL_HOSTNAME=...`).

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }

        let hostname = &self.policy.external_hostname;
        if hostname.is_empty() {
            return Err("policy.external_hostname is required".into());
        }
        if !hostname.starts_with("http://") && !hostname.starts_with("https://") {
            return Err("policy.external_hostname must be an absolute URL".into());
        }

        // a hot poll loop would hammer storage and the bundle hosts
        if self.policy.import_poll_interval_secs < 5 {
            return Err("policy.import_poll_interval_secs must be >= 5".into());
        }
        if self.policy.http_timeout_secs == 0 {
            return Err("policy.http_timeout_secs must be > 0".into());
        }

        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn import_poll_interval(&self) -> Duration {
        Duration::from_secs(self.policy.import_poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.policy.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8081
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Absolute URL under which this instance is reachable from the public
    /// internet. Exported bundles embed it as the base of the
    /// verification-key URL, so verifiers can fetch the public key.
    #[serde(default)]
    pub external_hostname: String,
    /// Lock a policy automatically when its output fails schema validation.
    #[serde(default)]
    pub validation_lock: bool,
    /// Tick period of the bundle auto importer, in seconds.
    #[serde(default = "default_import_poll_interval_secs")]
    pub import_poll_interval_secs: u64,
    /// Timeout of the outbound HTTP client, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_import_poll_interval_secs() -> u64 {
    60
}
fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            external_hostname: String::new(),
            validation_lock: false,
            import_poll_interval_secs: default_import_poll_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("verdict.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("VERDICT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
