use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use shelfscan_core::{PipelineConfig, StorageLayout};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub pipeline: PipelineConfig,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").or_else(|| lookup("SHELFSCAN_DATABASE_URL"));
        let bind = parse_or(&lookup, "SHELFSCAN_BIND", || {
            SocketAddr::from_str(DEFAULT_BIND).context("default bind address")
        })?;
        let data_dir = lookup("SHELFSCAN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            scan_batch_size: parse_or(&lookup, "SHELFSCAN_SCAN_BATCH_SIZE", || {
                Ok(defaults.scan_batch_size)
            })?,
            export_page_size: parse_or(&lookup, "SHELFSCAN_EXPORT_PAGE_SIZE", || {
                Ok(defaults.export_page_size)
            })?,
            reference_channel_capacity: defaults.reference_channel_capacity,
        }
        .normalized();
        let max_upload_bytes = parse_or(&lookup, "SHELFSCAN_MAX_UPLOAD_BYTES", || {
            Ok(DEFAULT_MAX_UPLOAD_BYTES)
        })?;

        Ok(Self {
            database_url,
            bind,
            data_dir,
            pipeline,
            max_upload_bytes,
        })
    }

    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::under(&self.data_dir)
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL (or SHELFSCAN_DATABASE_URL) must be set")
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: impl FnOnce() -> Result<T>,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        None => default(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).expect("defaults");
        assert_eq!(config.database_url, None);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("SHELFSCAN_DATABASE_URL", "postgres://localhost/shelfscan"),
            ("SHELFSCAN_BIND", "127.0.0.1:9000"),
            ("SHELFSCAN_DATA_DIR", "/srv/shelfscan"),
            ("SHELFSCAN_SCAN_BATCH_SIZE", "0"),
            ("SHELFSCAN_EXPORT_PAGE_SIZE", " 200 "),
        ])
        .expect("valid overrides");

        assert_eq!(config.require_database_url().expect("url"), "postgres://localhost/shelfscan");
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.pipeline.scan_batch_size, 1);
        assert_eq!(config.pipeline.export_page_size, 200);
        assert_eq!(
            config.storage_layout().exports_dir,
            PathBuf::from("/srv/shelfscan/exported-reports")
        );
    }

    #[test]
    fn database_url_takes_precedence() {
        let config = config(&[
            ("DATABASE_URL", "postgres://primary/db"),
            ("SHELFSCAN_DATABASE_URL", "postgres://fallback/db"),
        ])
        .expect("config");
        assert_eq!(config.database_url.as_deref(), Some("postgres://primary/db"));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = config(&[("SHELFSCAN_MAX_UPLOAD_BYTES", "lots")]).expect_err("invalid size");
        assert!(err.to_string().contains("SHELFSCAN_MAX_UPLOAD_BYTES"));
    }
}
