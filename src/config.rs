//! Daemon configuration.
//!
//! A flat JSON document next to the binary. A missing file is replaced with
//! defaults so a fresh deployment starts with something editable; a corrupt
//! file is logged, removed and rewritten the same way.

use crate::pricing::StoreMarkup;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// MySQL host.
    pub host: String,
    /// Source database name.
    pub database: String,
    pub user: String,
    pub password: String,
    /// Poll interval in seconds.
    pub check_time: u64,
    /// Store markup percentage applied on top of the vendor cost.
    pub markup: f64,
    /// `dir_goods` column holding per-good weight data.
    pub weight_table_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            database: "easytrade_db".to_string(),
            user: "easytrade".to_string(),
            password: "masterkey".to_string(),
            check_time: 10,
            markup: 5.0,
            weight_table_name: "gd_articul".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration, creating the file with defaults when it is
    /// absent or unreadable.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Config> {
        if path.exists() {
            let body = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;

            match serde_json::from_str::<Config>(&body) {
                Ok(config) => {
                    config.validate()?;
                    return Ok(config);
                }
                Err(e) => {
                    warn!(
                        "config file {} contains invalid JSON ({e}), rewriting defaults",
                        path.display()
                    );
                    let _ = fs::remove_file(path);
                }
            }
        }

        let config = Config::default();
        let body = serde_json::to_string_pretty(&config)?;
        fs::write(path, body)
            .with_context(|| format!("failed to write default config to {}", path.display()))?;
        Ok(config)
    }

    /// The weight column name is interpolated into SQL, so it must be a bare
    /// identifier. The poll interval must not busy-loop.
    fn validate(&self) -> anyhow::Result<()> {
        if self.weight_table_name.is_empty()
            || !self
                .weight_table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!(
                "weight_table_name '{}' is not a valid column identifier",
                self.weight_table_name
            );
        }
        if self.check_time == 0 {
            bail!("check_time must be at least 1 second");
        }
        Ok(())
    }

    /// Store markup as a multiplicative factor.
    pub fn store_markup(&self) -> StoreMarkup {
        StoreMarkup::from_percent(self.markup)
    }

    /// Connection options for the configured store.
    pub fn mysql_opts(&self) -> mysql_async::Opts {
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .db_name(Some(self.database.clone()))
            .into()
    }
}
